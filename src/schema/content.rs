use serde::{Deserialize, Serialize};

/// Opening or closing narration: either an event to run or literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Narration {
    Event(String),
    Text(String),
}

/// Immutable campaign definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prologue: Option<Narration>,
    #[serde(default)]
    pub epilogue: Option<Narration>,
    /// Per-floor rules, indexed by floor. Floor 0 is the briefing stage.
    pub stages: Vec<StageConfig>,
    /// Overrides the number of floors; defaults to `stages.len()`.
    #[serde(default)]
    pub floor_count: Option<u32>,
    #[serde(default)]
    pub victory_text: Option<String>,
    /// Event run when a floor's pool has nothing to offer.
    #[serde(default)]
    pub filler_event: Option<String>,
}

impl Scenario {
    pub fn max_floor(&self) -> u32 {
        self.floor_count.unwrap_or(self.stages.len() as u32)
    }

    pub fn stage(&self, floor: u32) -> Option<&StageConfig> {
        self.stages.get(floor as usize)
    }
}

/// Rules for a single floor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageConfig {
    /// Candidate maps for random selection.
    #[serde(default)]
    pub map_pool: Vec<String>,
    /// Offer `map_choices` to the player instead of picking at random.
    #[serde(default)]
    pub player_choice: bool,
    #[serde(default)]
    pub map_choices: Vec<String>,
    /// Keep the previous floor's map and skip its entry event.
    #[serde(default)]
    pub inherit_map: bool,
    /// Suppress the map's own entry event.
    #[serde(default)]
    pub suppress_entry_event: bool,
    #[serde(default)]
    pub entry_event: Option<String>,
    #[serde(default)]
    pub event_pool: Option<String>,
}

/// A location the player can be sent to on a floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapDef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub backgrounds: Vec<String>,
    /// Single background used by content predating `backgrounds`.
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub sub_image: Option<String>,
    #[serde(default)]
    pub entry_event: Option<String>,
}

/// A named bucket of event ids eligible for random draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPool {
    pub id: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl Default for Rarity {
    fn default() -> Self {
        Self::Common
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rarity: Rarity,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEffectDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Floors the effect lasts when applied without an explicit duration.
    #[serde(default)]
    pub default_duration: Option<u32>,
}
