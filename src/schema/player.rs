use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Newtype wrapper for saved-character identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric player attributes addressable from event scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    Hp,
    MaxHp,
    Ap,
    MaxAp,
    Attack,
    Defense,
    Agility,
    Gold,
}

impl Stat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hp => "HP",
            Self::MaxHp => "Max HP",
            Self::Ap => "AP",
            Self::MaxAp => "Max AP",
            Self::Attack => "Attack",
            Self::Defense => "Defense",
            Self::Agility => "Agility",
            Self::Gold => "Gold",
        }
    }
}

/// Vital resources and derived combat stats.
///
/// HP and AP are kept within `0..=max`; every other stat is floored at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub hp: i64,
    pub max_hp: i64,
    pub ap: i64,
    pub max_ap: i64,
    #[serde(default)]
    pub attack: i64,
    #[serde(default)]
    pub defense: i64,
    #[serde(default)]
    pub agility: i64,
    #[serde(default)]
    pub gold: i64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            hp: 100,
            max_hp: 100,
            ap: 50,
            max_ap: 50,
            attack: 10,
            defense: 10,
            agility: 10,
            gold: 0,
        }
    }
}

impl Stats {
    pub fn get(&self, stat: Stat) -> i64 {
        match stat {
            Stat::Hp => self.hp,
            Stat::MaxHp => self.max_hp,
            Stat::Ap => self.ap,
            Stat::MaxAp => self.max_ap,
            Stat::Attack => self.attack,
            Stat::Defense => self.defense,
            Stat::Agility => self.agility,
            Stat::Gold => self.gold,
        }
    }

    /// Add `delta` to a stat and return the clamped result.
    pub fn adjust(&mut self, stat: Stat, delta: i64) -> i64 {
        let value = self.get(stat).saturating_add(delta);
        self.set(stat, value)
    }

    /// Overwrite a stat, clamping it, and return the stored value.
    pub fn set(&mut self, stat: Stat, value: i64) -> i64 {
        let value = value.max(0);
        match stat {
            Stat::Hp => {
                self.hp = value.min(self.max_hp);
                self.hp
            }
            Stat::Ap => {
                self.ap = value.min(self.max_ap);
                self.ap
            }
            Stat::MaxHp => {
                self.max_hp = value;
                self.hp = self.hp.min(value);
                self.max_hp
            }
            Stat::MaxAp => {
                self.max_ap = value;
                self.ap = self.ap.min(value);
                self.max_ap
            }
            Stat::Attack => {
                self.attack = value;
                value
            }
            Stat::Defense => {
                self.defense = value;
                value
            }
            Stat::Agility => {
                self.agility = value;
                value
            }
            Stat::Gold => {
                self.gold = value;
                value
            }
        }
    }
}

/// A status effect currently affecting a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStatus {
    pub id: String,
    /// Remaining floors before the effect wears off; `None` lasts until removed.
    #[serde(default)]
    pub turns_remaining: Option<u32>,
}

/// The player character carried through a campaign.
///
/// Owned by the session for the duration of play and persisted by the
/// external character store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub race_name: Option<String>,
    #[serde(default)]
    pub body_type: Option<String>,
    #[serde(default)]
    pub clothing: Option<String>,
    #[serde(default)]
    pub personality_id: Option<String>,
    #[serde(default)]
    pub skills: HashMap<String, i64>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub inventory: Vec<String>,
    #[serde(default)]
    pub status_effects: Vec<ActiveStatus>,
    /// Marks the character as eligible for revival after death.
    #[serde(default)]
    pub fated: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: CharacterId::new(id),
            name: name.into(),
            race_name: None,
            body_type: None,
            clothing: None,
            personality_id: None,
            skills: HashMap::new(),
            stats: Stats::default(),
            inventory: Vec::new(),
            status_effects: Vec::new(),
            fated: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.stats.hp > 0
    }

    pub fn has_item(&self, item_id: &str) -> bool {
        self.inventory.iter().any(|i| i == item_id)
    }

    pub fn add_item(&mut self, item_id: &str) {
        self.inventory.push(item_id.to_string());
    }

    /// Remove one copy of an item. Returns false if the player had none.
    pub fn remove_item(&mut self, item_id: &str) -> bool {
        match self.inventory.iter().position(|i| i == item_id) {
            Some(index) => {
                self.inventory.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn has_status(&self, status_id: &str) -> bool {
        self.status_effects.iter().any(|s| s.id == status_id)
    }

    /// Apply a status effect. Re-applying an active effect refreshes its duration.
    pub fn apply_status(&mut self, status_id: &str, turns: Option<u32>) {
        if let Some(active) = self.status_effects.iter_mut().find(|s| s.id == status_id) {
            active.turns_remaining = turns;
            return;
        }
        self.status_effects.push(ActiveStatus {
            id: status_id.to_string(),
            turns_remaining: turns,
        });
    }

    pub fn remove_status(&mut self, status_id: &str) -> bool {
        let before = self.status_effects.len();
        self.status_effects.retain(|s| s.id != status_id);
        self.status_effects.len() != before
    }

    /// Count down timed status effects by one floor, dropping expired ones.
    /// Returns the ids that wore off.
    pub fn tick_statuses(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        self.status_effects.retain_mut(|status| match status.turns_remaining {
            Some(0) | Some(1) => {
                expired.push(status.id.clone());
                false
            }
            Some(ref mut turns) => {
                *turns -= 1;
                true
            }
            None => true,
        });
        expired
    }
}

/// A personality: a named bundle of dialogue lines keyed by canonical
/// dialogue category (see `core::dialogue`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personality {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub lines: HashMap<String, Vec<String>>,
}

impl Personality {
    pub fn lines_for(&self, key: &str) -> &[String] {
        self.lines.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}
