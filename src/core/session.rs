/// Per-attempt mutable campaign state.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::deck::EventDeck;
use crate::schema::content::Scenario;
use crate::schema::player::Player;

/// Counter bumped once per top-level pool draw.
pub const EVENTS_COMPLETED: &str = "events_completed";
/// Counter bumped each time the player dies during the attempt.
pub const DEATHS: &str = "deaths";

/// How the attempt was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    /// The player picked a saved character at startup.
    Selected,
    /// A front end handed the engine a ready-made player. Floor 0 is a
    /// briefing stage and does not count toward floors cleared.
    Supplied,
}

/// Why and where the player was lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathNotice {
    pub cause: String,
    pub floor: u32,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub floor: u32,
    pub max_floor: u32,
    pub scenario_id: String,
    pub mode: GameMode,
    pub player: Player,
    pub active_map: Option<String>,
    pub background: Option<String>,
    pub sub_image: Option<String>,
    /// Transient portrait expression, reset when the floor advances.
    pub expression: Option<String>,
    pub game_over: bool,
    pub victory: bool,
    pub alternate_ending: Option<String>,
    pub flags: FxHashSet<String>,
    pub counters: HashMap<String, i64>,
    /// Set while a chained event runs so completions are not double counted.
    pub in_recursion: bool,
    pub deck: EventDeck,
    pub last_logged_floor: Option<u32>,
    pub death: Option<DeathNotice>,
}

impl SessionState {
    pub fn new(scenario: &Scenario, player: Player, mode: GameMode) -> Self {
        Self {
            floor: 0,
            max_floor: scenario.max_floor(),
            scenario_id: scenario.id.clone(),
            mode,
            player,
            active_map: None,
            background: None,
            sub_image: None,
            expression: None,
            game_over: false,
            victory: false,
            alternate_ending: None,
            flags: FxHashSet::default(),
            counters: HashMap::new(),
            in_recursion: false,
            deck: EventDeck::default(),
            last_logged_floor: None,
            death: None,
        }
    }

    /// True once the floor loop must stop: the player is lost or an
    /// alternate ending is pending.
    pub fn is_halted(&self) -> bool {
        self.game_over || self.alternate_ending.is_some()
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: &str) {
        self.flags.insert(flag.to_string());
    }

    pub fn clear_flag(&mut self, flag: &str) {
        self.flags.remove(flag);
    }

    /// Missing counters read as zero.
    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn increment_counter(&mut self, name: &str, by: i64) -> i64 {
        let value = self.counters.entry(name.to_string()).or_insert(0);
        *value += by;
        *value
    }

    pub fn set_counter(&mut self, name: &str, value: i64) {
        self.counters.insert(name.to_string(), value);
    }

    /// Mark the player as lost on the current floor.
    pub fn mark_dead(&mut self, cause: &str) {
        if self.death.is_none() {
            self.death = Some(DeathNotice {
                cause: cause.to_string(),
                floor: self.floor,
            });
            self.increment_counter(DEATHS, 1);
        }
        self.game_over = true;
    }

    /// Clear a death so the attempt can continue after a revival.
    pub fn clear_death(&mut self) {
        self.death = None;
        self.game_over = false;
    }

    /// Log arrival on the current floor once.
    pub fn log_floor_arrival(&mut self) {
        if self.last_logged_floor != Some(self.floor) {
            log::info!(
                "floor {}/{} of '{}' ({})",
                self.floor,
                self.max_floor,
                self.scenario_id,
                self.player.name
            );
            self.last_logged_floor = Some(self.floor);
        }
    }

    pub fn statistics(&self) -> RunStatistics {
        let briefing = match self.mode {
            GameMode::Supplied => 1,
            GameMode::Selected => 0,
        };
        let mut counters: Vec<(String, i64)> = self
            .counters
            .iter()
            .filter(|(name, _)| name.as_str() != EVENTS_COMPLETED && name.as_str() != DEATHS)
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        counters.sort();
        RunStatistics {
            player_name: self.player.name.clone(),
            floors_cleared: self.floor.saturating_sub(briefing),
            total_floors: self.max_floor.saturating_sub(briefing),
            events_completed: self.counter(EVENTS_COMPLETED),
            deaths: self.counter(DEATHS),
            items_held: self.player.inventory.len(),
            flags_set: self.flags.len(),
            counters,
        }
    }
}

/// Summary shown when a run ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatistics {
    pub player_name: String,
    pub floors_cleared: u32,
    pub total_floors: u32,
    pub events_completed: i64,
    pub deaths: i64,
    pub items_held: usize,
    pub flags_set: usize,
    pub counters: Vec<(String, i64)>,
}

impl RunStatistics {
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("== Run summary: {} ==", self.player_name),
            format!("Floors cleared: {}/{}", self.floors_cleared, self.total_floors),
            format!("Events completed: {}", self.events_completed),
            format!("Deaths: {}", self.deaths),
            format!("Items held: {}", self.items_held),
        ];
        for (name, value) in &self.counters {
            lines.push(format!("{}: {}", name, value));
        }
        lines
    }
}
