use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::player::Stat;

/// Tag prefix carrying the cause of death reported when an event kills the player.
pub const DEATH_CAUSE_TAG: &str = "death_cause:";

/// A content-authored event: a small script plus tags consumed downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub script: Vec<ScriptNode>,
    #[serde(default)]
    pub tags: FxHashSet<String>,
    /// Mandatory events are never drawn from a pool; they only run through
    /// map entry or chaining.
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub min_floor: Option<u32>,
    #[serde(default)]
    pub max_floor: Option<u32>,
}

impl Event {
    /// The `death_cause:` tag value, if the event declares one.
    pub fn death_cause(&self) -> Option<&str> {
        self.tags
            .iter()
            .find_map(|tag| tag.strip_prefix(DEATH_CAUSE_TAG))
    }

    /// Whether the event may be drawn from a pool on the given floor.
    pub fn drawable_on(&self, floor: u32) -> bool {
        !self.mandatory
            && self.min_floor.map_or(true, |min| floor >= min)
            && self.max_floor.map_or(true, |max| floor <= max)
    }
}

/// One step of an event script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScriptNode {
    /// Templated text shown to the player.
    Display {
        text: String,
        #[serde(default)]
        wait: bool,
    },
    /// A 1..N selection, each option owning its own continuation.
    Choice {
        #[serde(default)]
        prompt: Option<String>,
        options: Vec<ChoiceOption>,
    },
    Condition {
        test: Predicate,
        #[serde(default)]
        then: Vec<ScriptNode>,
        #[serde(default)]
        otherwise: Vec<ScriptNode>,
    },
    Effect(Effect),
    /// Marks the player as lost.
    DeathTrigger { cause: String },
    /// Run another event to completion before continuing.
    Chain { event: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    #[serde(default)]
    pub nodes: Vec<ScriptNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn holds(&self, left: i64, right: i64) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
        }
    }
}

/// Descriptive player fields usable in equality tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerField {
    Name,
    Race,
    BodyType,
    Clothing,
    Personality,
}

/// A boolean test over session flags/counters or player attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Predicate {
    HasFlag(String),
    /// Missing counters read as zero.
    Counter {
        name: String,
        cmp: Comparison,
        value: i64,
    },
    Stat {
        stat: Stat,
        cmp: Comparison,
        value: i64,
    },
    HasItem(String),
    HasStatus(String),
    Attribute {
        field: PlayerField,
        equals: String,
    },
    Fated,
    Floor {
        cmp: Comparison,
        value: i64,
    },
    /// Passes with the given percent chance, rolled at evaluation time.
    Chance(u32),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// An atomic mutation of the player or the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Effect {
    AddItem(String),
    RemoveItem(String),
    /// Lose one inventory entry, optionally restricted to a rarity.
    LoseRandomItem {
        #[serde(default)]
        rarity: Option<super::content::Rarity>,
    },
    ApplyStatus {
        id: String,
        #[serde(default)]
        turns: Option<u32>,
    },
    RemoveStatus(String),
    AdjustStat {
        stat: Stat,
        delta: i64,
    },
    SetFlag(String),
    ClearFlag(String),
    IncrementCounter {
        name: String,
        #[serde(default = "default_increment")]
        by: i64,
    },
    SetCounter {
        name: String,
        value: i64,
    },
    SetSubImage(Option<String>),
    SetExpression(Option<String>),
    /// Leave the floor loop through the named ending event.
    AlternateEnding(String),
}

fn default_increment() -> i64 {
    1
}
