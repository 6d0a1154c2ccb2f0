/// Collaborator interfaces consumed by the engine, plus small in-memory
/// implementations for headless runs.

use rand::rngs::StdRng;
use std::collections::{BTreeMap, VecDeque};

use crate::schema::content::{EventPool, ItemDef, MapDef, Scenario, StatusEffectDef};
use crate::schema::event::Event;
use crate::schema::player::{CharacterId, Personality, Player};

/// Read-only access to authored content, looked up by id.
pub trait ContentLoader {
    fn load_scenario(&self, id: &str) -> Option<&Scenario>;
    fn load_map(&self, id: &str) -> Option<&MapDef>;
    fn load_event(&self, id: &str) -> Option<&Event>;
    fn load_pool(&self, id: &str) -> Option<&EventPool>;
    fn load_personality(&self, id: &str) -> Option<&Personality>;
    /// All item definitions, in registration order.
    fn load_items(&self) -> Vec<ItemDef>;
    /// All status-effect definitions, in registration order.
    fn load_status_effects(&self) -> Vec<StatusEffectDef>;
    /// Drop anything cached between runs.
    fn clear_cache(&mut self) {}
}

/// Saved characters, owned by an external store.
pub trait CharacterStore {
    fn list_saved_characters(&self) -> Vec<CharacterId>;
    fn load_character(&self, id: &CharacterId) -> Option<Player>;
}

/// Image layers a front end may draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Background,
    SubImage,
    Expression,
}

/// The presentation surface. Input methods block until a value is available;
/// everything else is fire-and-forget.
pub trait Presenter {
    fn display(&mut self, text: &str);
    /// Wait for the player to acknowledge the last display, when supported.
    fn acknowledge(&mut self) {}
    /// Returns a 1-based selection. Out-of-range values are handled by the caller.
    fn get_choice(&mut self, max: usize) -> usize;
    fn get_free_text_input(&mut self, prompt: &str) -> String;
    fn show_image(&mut self, _slot: ImageSlot, _id: Option<&str>) {}
    fn show_floor_info(&mut self, floor: u32, map_name: &str);
    fn show_player_status(&mut self, player: &Player);
}

/// Supplies words for `{category}` template placeholders.
pub trait WordProvider {
    fn random_word(&self, category: &str, rng: &mut StdRng) -> Option<String>;
}

/// Character store backed by a map, in id order.
#[derive(Debug, Clone, Default)]
pub struct MemoryCharacterStore {
    characters: BTreeMap<CharacterId, Player>,
}

impl MemoryCharacterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, player: Player) {
        self.characters.insert(player.id.clone(), player);
    }
}

impl CharacterStore for MemoryCharacterStore {
    fn list_saved_characters(&self) -> Vec<CharacterId> {
        self.characters.keys().cloned().collect()
    }

    fn load_character(&self, id: &CharacterId) -> Option<Player> {
        self.characters.get(id).cloned()
    }
}

/// Presenter fed from queued answers that records everything shown.
///
/// Once the queued choices run out every prompt answers `1`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPresenter {
    choices: VecDeque<usize>,
    text_inputs: VecDeque<String>,
    pub transcript: Vec<String>,
    pub images: Vec<(ImageSlot, Option<String>)>,
    pub floors: Vec<(u32, String)>,
    pub prompts: usize,
    pub acknowledgements: usize,
}

impl ScriptedPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_choices(choices: impl IntoIterator<Item = usize>) -> Self {
        Self {
            choices: choices.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn push_choice(&mut self, choice: usize) {
        self.choices.push_back(choice);
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.text_inputs.push_back(text.into());
    }

    /// True if any displayed line contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        self.transcript.iter().any(|line| line.contains(needle))
    }
}

impl Presenter for ScriptedPresenter {
    fn display(&mut self, text: &str) {
        self.transcript.push(text.to_string());
    }

    fn acknowledge(&mut self) {
        self.acknowledgements += 1;
    }

    fn get_choice(&mut self, _max: usize) -> usize {
        self.prompts += 1;
        self.choices.pop_front().unwrap_or(1)
    }

    fn get_free_text_input(&mut self, prompt: &str) -> String {
        self.transcript.push(prompt.to_string());
        self.text_inputs.pop_front().unwrap_or_default()
    }

    fn show_image(&mut self, slot: ImageSlot, id: Option<&str>) {
        self.images.push((slot, id.map(str::to_string)));
    }

    fn show_floor_info(&mut self, floor: u32, map_name: &str) {
        self.floors.push((floor, map_name.to_string()));
    }

    fn show_player_status(&mut self, player: &Player) {
        self.transcript.push(format!(
            "[status] {} HP {}/{}",
            player.name, player.stats.hp, player.stats.max_hp
        ));
    }
}
