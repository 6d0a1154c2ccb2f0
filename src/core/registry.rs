/// Content library and definition registries.
///
/// Content is authored as RON `ContentPack` files. Packs are merged into a
/// `ContentLibrary`, which serves lookups by id for the rest of the engine.
/// Item and status-effect definitions are resolved through owned registries
/// built once per engine and passed by reference.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::ports::ContentLoader;
use crate::schema::content::{
    EventPool, ItemDef, MapDef, Narration, Rarity, Scenario, StatusEffectDef,
};
use crate::schema::event::{Effect, Event, ScriptNode};
use crate::schema::player::Personality;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("content path not found: {0}")]
    NotFound(PathBuf),
}

/// One RON content file. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentPack {
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub maps: Vec<MapDef>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub pools: Vec<EventPool>,
    #[serde(default)]
    pub personalities: Vec<Personality>,
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub status_effects: Vec<StatusEffectDef>,
}

/// In-memory content, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ContentLibrary {
    scenarios: HashMap<String, Scenario>,
    maps: HashMap<String, MapDef>,
    events: HashMap<String, Event>,
    pools: HashMap<String, EventPool>,
    personalities: HashMap<String, Personality>,
    items: Vec<ItemDef>,
    status_effects: Vec<StatusEffectDef>,
}

impl ContentLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a single content pack from a RON string.
    pub fn parse_ron(input: &str) -> Result<ContentLibrary, ContentError> {
        let pack: ContentPack = ron::from_str(input)?;
        let mut library = ContentLibrary::new();
        library.merge(pack);
        Ok(library)
    }

    /// Load a content pack file and merge it in.
    pub fn load_from_ron(&mut self, path: &Path) -> Result<(), ContentError> {
        let contents = std::fs::read_to_string(path)?;
        let pack: ContentPack = ron::from_str(&contents)?;
        log::debug!("loaded content pack {}", path.display());
        self.merge(pack);
        Ok(())
    }

    /// Load every `.ron` file in a directory, in file-name order.
    pub fn load_dir(dir: &Path) -> Result<ContentLibrary, ContentError> {
        let mut library = ContentLibrary::new();
        library.load_dir_into(dir)?;
        Ok(library)
    }

    /// Merge every `.ron` file in a directory into this library. Later
    /// files override earlier ones by id.
    pub fn load_dir_into(&mut self, dir: &Path) -> Result<(), ContentError> {
        if !dir.is_dir() {
            return Err(ContentError::NotFound(dir.to_path_buf()));
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_from_ron(path)?;
        }
        log::info!(
            "content loaded from {}: {} scenarios, {} maps, {} events, {} pools",
            dir.display(),
            self.scenarios.len(),
            self.maps.len(),
            self.events.len(),
            self.pools.len()
        );
        Ok(())
    }

    /// Merge a pack into this library. Entries from `pack` replace
    /// existing entries with the same id.
    pub fn merge(&mut self, pack: ContentPack) {
        for scenario in pack.scenarios {
            self.scenarios.insert(scenario.id.clone(), scenario);
        }
        for map in pack.maps {
            self.maps.insert(map.id.clone(), map);
        }
        for event in pack.events {
            self.events.insert(event.id.clone(), event);
        }
        for pool in pack.pools {
            self.pools.insert(pool.id.clone(), pool);
        }
        for personality in pack.personalities {
            self.personalities
                .insert(personality.id.clone(), personality);
        }
        for item in pack.items {
            match self.items.iter_mut().find(|i| i.id == item.id) {
                Some(existing) => *existing = item,
                None => self.items.push(item),
            }
        }
        for status in pack.status_effects {
            match self.status_effects.iter_mut().find(|s| s.id == status.id) {
                Some(existing) => *existing = status,
                None => self.status_effects.push(status),
            }
        }
    }

    pub fn add_scenario(&mut self, scenario: Scenario) {
        self.scenarios.insert(scenario.id.clone(), scenario);
    }

    pub fn add_map(&mut self, map: MapDef) {
        self.maps.insert(map.id.clone(), map);
    }

    pub fn add_event(&mut self, event: Event) {
        self.events.insert(event.id.clone(), event);
    }

    pub fn add_pool(&mut self, pool: EventPool) {
        self.pools.insert(pool.id.clone(), pool);
    }

    pub fn add_personality(&mut self, personality: Personality) {
        self.personalities
            .insert(personality.id.clone(), personality);
    }

    pub fn scenario_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.scenarios.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    pub fn pools(&self) -> impl Iterator<Item = &EventPool> {
        self.pools.values()
    }

    pub fn personalities(&self) -> impl Iterator<Item = &Personality> {
        self.personalities.values()
    }

    /// Report dangling references between content entries.
    pub fn validate(&self) -> Vec<ContentIssue> {
        let mut issues = Vec::new();

        let mut scenario_ids: Vec<&String> = self.scenarios.keys().collect();
        scenario_ids.sort();
        for id in scenario_ids {
            let scenario = &self.scenarios[id];
            let location = format!("scenario '{}'", id);
            for narration in [&scenario.prologue, &scenario.epilogue].into_iter().flatten() {
                if let Narration::Event(event_id) = narration {
                    self.check_event(&location, event_id, &mut issues);
                }
            }
            if let Some(filler) = &scenario.filler_event {
                self.check_event(&location, filler, &mut issues);
            }
            if scenario.max_floor() as usize > scenario.stages.len() {
                issues.push(ContentIssue::new(
                    &location,
                    format!(
                        "floor_count {} exceeds the {} configured stages",
                        scenario.max_floor(),
                        scenario.stages.len()
                    ),
                ));
            }
            for (floor, stage) in scenario.stages.iter().enumerate() {
                let location = format!("scenario '{}' floor {}", id, floor);
                for map_id in stage.map_pool.iter().chain(&stage.map_choices) {
                    if !self.maps.contains_key(map_id) {
                        issues.push(ContentIssue::new(
                            &location,
                            format!("unknown map '{}'", map_id),
                        ));
                    }
                }
                if stage.player_choice && stage.map_choices.is_empty() {
                    issues.push(ContentIssue::new(
                        &location,
                        "player_choice is set but map_choices is empty; falls back to map_pool",
                    ));
                }
                if let Some(entry) = &stage.entry_event {
                    self.check_event(&location, entry, &mut issues);
                }
                if let Some(pool) = &stage.event_pool {
                    if !self.pools.contains_key(pool) {
                        issues.push(ContentIssue::new(
                            &location,
                            format!("unknown event pool '{}'", pool),
                        ));
                    }
                }
            }
        }

        let mut map_ids: Vec<&String> = self.maps.keys().collect();
        map_ids.sort();
        for id in map_ids {
            if let Some(entry) = &self.maps[id].entry_event {
                self.check_event(&format!("map '{}'", id), entry, &mut issues);
            }
        }

        let mut pool_ids: Vec<&String> = self.pools.keys().collect();
        pool_ids.sort();
        for id in pool_ids {
            let location = format!("pool '{}'", id);
            for event_id in &self.pools[id].events {
                self.check_event(&location, event_id, &mut issues);
            }
        }

        let mut event_ids: Vec<&String> = self.events.keys().collect();
        event_ids.sort();
        for id in event_ids {
            let location = format!("event '{}'", id);
            self.check_script(&location, &self.events[id].script, &mut issues);
        }

        issues
    }

    fn check_event(&self, location: &str, event_id: &str, issues: &mut Vec<ContentIssue>) {
        if !self.events.contains_key(event_id) {
            issues.push(ContentIssue::new(
                location,
                format!("unknown event '{}'", event_id),
            ));
        }
    }

    fn check_script(&self, location: &str, nodes: &[ScriptNode], issues: &mut Vec<ContentIssue>) {
        for node in nodes {
            match node {
                ScriptNode::Chain { event } => self.check_event(location, event, issues),
                ScriptNode::Choice { options, .. } => {
                    if options.is_empty() {
                        issues.push(ContentIssue::new(location, "choice with no options"));
                    }
                    for option in options {
                        self.check_script(location, &option.nodes, issues);
                    }
                }
                ScriptNode::Condition {
                    then, otherwise, ..
                } => {
                    self.check_script(location, then, issues);
                    self.check_script(location, otherwise, issues);
                }
                ScriptNode::Effect(effect) => self.check_effect(location, effect, issues),
                ScriptNode::Display { .. } | ScriptNode::DeathTrigger { .. } => {}
            }
        }
    }

    fn check_effect(&self, location: &str, effect: &Effect, issues: &mut Vec<ContentIssue>) {
        match effect {
            Effect::AddItem(id) | Effect::RemoveItem(id) => {
                if !self.items.iter().any(|i| &i.id == id) {
                    issues.push(ContentIssue::new(location, format!("unknown item '{}'", id)));
                }
            }
            Effect::ApplyStatus { id, .. } | Effect::RemoveStatus(id) => {
                if !self.status_effects.iter().any(|s| &s.id == id) {
                    issues.push(ContentIssue::new(
                        location,
                        format!("unknown status effect '{}'", id),
                    ));
                }
            }
            Effect::AlternateEnding(event_id) => self.check_event(location, event_id, issues),
            _ => {}
        }
    }
}

impl ContentLoader for ContentLibrary {
    fn load_scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.get(id)
    }

    fn load_map(&self, id: &str) -> Option<&MapDef> {
        self.maps.get(id)
    }

    fn load_event(&self, id: &str) -> Option<&Event> {
        self.events.get(id)
    }

    fn load_pool(&self, id: &str) -> Option<&EventPool> {
        self.pools.get(id)
    }

    fn load_personality(&self, id: &str) -> Option<&Personality> {
        self.personalities.get(id)
    }

    fn load_items(&self) -> Vec<ItemDef> {
        self.items.clone()
    }

    fn load_status_effects(&self) -> Vec<StatusEffectDef> {
        self.status_effects.clone()
    }
}

/// A dangling or suspicious reference found by `ContentLibrary::validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentIssue {
    pub location: String,
    pub message: String,
}

impl ContentIssue {
    fn new(location: &str, message: impl Into<String>) -> Self {
        Self {
            location: location.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ContentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

/// Item definitions by id.
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    items: HashMap<String, ItemDef>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, item: ItemDef) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    /// Rarity of a registered item; unregistered items count as common.
    pub fn rarity_of(&self, id: &str) -> Rarity {
        self.items.get(id).map(|i| i.rarity).unwrap_or_default()
    }

    /// Display name of an item, falling back to its id.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.items.get(id).map(|i| i.name.as_str()).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Status-effect definitions by id.
#[derive(Debug, Clone, Default)]
pub struct StatusRegistry {
    statuses: HashMap<String, StatusEffectDef>,
}

impl StatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, status: StatusEffectDef) {
        self.statuses.insert(status.id.clone(), status);
    }

    pub fn get(&self, id: &str) -> Option<&StatusEffectDef> {
        self.statuses.get(id)
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

/// Lookup tables built once at content-load time.
#[derive(Debug, Clone, Default)]
pub struct Registries {
    pub items: ItemRegistry,
    pub statuses: StatusRegistry,
}

impl Registries {
    pub fn from_loader(loader: &dyn ContentLoader) -> Self {
        let mut registries = Registries::default();
        for item in loader.load_items() {
            registries.items.register(item);
        }
        for status in loader.load_status_effects() {
            registries.statuses.register(status);
        }
        log::debug!(
            "registered {} items and {} status effects",
            registries.items.len(),
            registries.statuses.len()
        );
        registries
    }
}
