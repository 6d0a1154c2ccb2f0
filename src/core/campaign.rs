/// The campaign state machine: floor progression from prologue to a
/// terminal outcome.
///
/// Each floor runs map selection, imagery, floor info, the map-entry event,
/// the pool-drawn floor event and the advance step, in that order. The loop
/// checks the session after every step and stops as soon as the player is
/// lost or an alternate ending is pending.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::deck::select_and_trigger_event;
use crate::core::dialogue::DialogueRules;
use crate::core::graveyard::Graveyard;
use crate::core::interpreter::{read_selection, EventOrigin, EventRunner};
use crate::core::ports::{CharacterStore, ContentLoader, ImageSlot, MemoryCharacterStore, Presenter, WordProvider};
use crate::core::registry::{ContentError, ContentLibrary, Registries};
use crate::core::session::{GameMode, SessionState};
use crate::core::templater::TextTemplater;
use crate::schema::content::{MapDef, Narration, Scenario, StageConfig};
use crate::schema::player::{CharacterId, Player};

/// Shown when a map has no display name.
pub const UNNAMED_MAP: &str = "Uncharted Floor";

pub const DEFAULT_VICTORY_TEXT: &str = "[Name] has conquered the depths. Victory!";

#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),
    #[error("no stage configured for floor {0}")]
    StageConfigMissing(u32),
    #[error("no map could be selected for floor {0}")]
    MapUnavailable(u32),
    #[error("no saved characters to choose from")]
    NoCharacters,
    #[error("character not found: {0}")]
    CharacterNotFound(CharacterId),
    #[error("content error: {0}")]
    Content(#[from] ContentError),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignOutcome {
    Victory,
    /// Ended through the named alternate-ending event.
    AlternateEnding(String),
    /// The player was lost and not revived.
    Defeat { cause: String, floor: u32 },
    /// Content was missing for a floor; the run ended without victory.
    Aborted { floor: u32, reason: String },
}

enum LoopExit {
    Victory,
    AlternateEnding(String),
    Defeat,
    Aborted(CampaignError),
}

/// Drives campaigns against a content loader and a presenter.
/// Built via `CampaignEngine::builder(presenter)`.
pub struct CampaignEngine<P: Presenter> {
    content: Box<dyn ContentLoader>,
    registries: Registries,
    templater: TextTemplater,
    characters: Box<dyn CharacterStore>,
    graveyard: Graveyard,
    presenter: P,
    rng: StdRng,
    session: Option<SessionState>,
}

/// Builder for constructing a `CampaignEngine`.
pub struct CampaignEngineBuilder<P: Presenter> {
    presenter: P,
    seed: u64,
    content_dirs: Vec<PathBuf>,
    /// Directly provided content (for testing without files).
    content: Option<ContentLibrary>,
    /// A custom loader; replaces any library or directories.
    loader: Option<Box<dyn ContentLoader>>,
    characters: Option<Box<dyn CharacterStore>>,
    word_provider: Option<Box<dyn WordProvider>>,
    dialogue: Option<DialogueRules>,
    graveyard: Option<Graveyard>,
}

impl<P: Presenter> CampaignEngine<P> {
    pub fn builder(presenter: P) -> CampaignEngineBuilder<P> {
        CampaignEngineBuilder {
            presenter,
            seed: 0,
            content_dirs: Vec::new(),
            content: None,
            loader: None,
            characters: None,
            word_provider: None,
            dialogue: None,
            graveyard: None,
        }
    }

    /// Let the player pick a saved character, then play the scenario.
    pub fn start_with_selection(&mut self, scenario_id: &str) -> Result<CampaignOutcome, CampaignError> {
        let ids = self.characters.list_saved_characters();
        if ids.is_empty() {
            return Err(CampaignError::NoCharacters);
        }
        self.presenter.display("Choose your adventurer:");
        for (i, id) in ids.iter().enumerate() {
            let label = self
                .characters
                .load_character(id)
                .map(|p| p.name)
                .unwrap_or_else(|| id.to_string());
            self.presenter.display(&format!("{}. {}", i + 1, label));
        }
        let id = &ids[read_selection(&mut self.presenter, ids.len())];
        let player = self
            .characters
            .load_character(id)
            .ok_or_else(|| CampaignError::CharacterNotFound(id.clone()))?;
        self.begin(scenario_id, player, GameMode::Selected)
    }

    /// Play the scenario with a player supplied by the front end.
    pub fn start_with_player(&mut self, player: Player, scenario_id: &str) -> Result<CampaignOutcome, CampaignError> {
        self.begin(scenario_id, player, GameMode::Supplied)
    }

    /// State of the current or most recent run.
    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn graveyard(&self) -> &Graveyard {
        &self.graveyard
    }

    pub fn graveyard_mut(&mut self) -> &mut Graveyard {
        &mut self.graveyard
    }

    pub fn content(&self) -> &dyn ContentLoader {
        self.content.as_ref()
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    fn runner(&mut self) -> EventRunner<'_> {
        EventRunner::new(
            self.content.as_ref(),
            &self.registries,
            &self.templater,
            &mut self.presenter,
            &mut self.rng,
        )
    }

    fn begin(&mut self, scenario_id: &str, player: Player, mode: GameMode) -> Result<CampaignOutcome, CampaignError> {
        self.content.clear_cache();
        let scenario = self
            .content
            .load_scenario(scenario_id)
            .cloned()
            .ok_or_else(|| CampaignError::ScenarioNotFound(scenario_id.to_string()))?;
        log::info!(
            "starting '{}' ({} floors) with '{}'",
            scenario.id,
            scenario.max_floor(),
            player.name
        );

        let mut session = SessionState::new(&scenario, player, mode);
        self.play_narration(&mut session, scenario.prologue.as_ref());
        let outcome = self.run(&scenario, &mut session);
        log::info!("run of '{}' ended: {:?}", scenario.id, outcome);
        self.session = Some(session);
        Ok(outcome)
    }

    fn run(&mut self, scenario: &Scenario, session: &mut SessionState) -> CampaignOutcome {
        loop {
            match self.run_floors(scenario, session) {
                LoopExit::Victory => return self.finish_victory(scenario, session),
                LoopExit::AlternateEnding(ending) => return self.finish_alternate(session, ending),
                LoopExit::Aborted(reason) => {
                    log::error!("run aborted on floor {}: {}", session.floor, reason);
                    self.presenter.display("The way forward is lost. The run ends here.");
                    self.report_fate(session);
                    self.show_statistics(session);
                    return CampaignOutcome::Aborted {
                        floor: session.floor,
                        reason: reason.to_string(),
                    };
                }
                LoopExit::Defeat => {
                    if self.handle_defeat(session) {
                        continue;
                    }
                    self.show_statistics(session);
                    let (cause, floor) = match &session.death {
                        Some(notice) => (notice.cause.clone(), notice.floor),
                        None => (String::new(), session.floor),
                    };
                    return CampaignOutcome::Defeat { cause, floor };
                }
            }
        }
    }

    fn run_floors(&mut self, scenario: &Scenario, session: &mut SessionState) -> LoopExit {
        loop {
            if session.floor >= session.max_floor {
                return LoopExit::Victory;
            }
            session.log_floor_arrival();

            let Some(stage) = scenario.stage(session.floor) else {
                return LoopExit::Aborted(CampaignError::StageConfigMissing(session.floor));
            };
            let Some(map) = self.select_map(stage, session) else {
                return LoopExit::Aborted(CampaignError::MapUnavailable(session.floor));
            };
            self.show_map(&map, session);
            self.run_entry_event(stage, &map, session);
            if let Some(exit) = halted(session) {
                return exit;
            }

            let mut runner = self.runner();
            select_and_trigger_event(&mut runner, stage, session, scenario.filler_event.as_deref());
            if let Some(exit) = halted(session) {
                return exit;
            }

            self.advance(scenario, session);
        }
    }

    /// Pick the floor's map: the inherited one, a player choice, or a random
    /// draw from the stage's map pool.
    fn select_map(&mut self, stage: &StageConfig, session: &mut SessionState) -> Option<MapDef> {
        let content = self.content.as_ref();
        if stage.inherit_map {
            if let Some(map) = session.active_map.as_deref().and_then(|id| content.load_map(id)) {
                return Some(map.clone());
            }
            log::warn!("floor {} inherits a map but none is active", session.floor);
        }

        let map_id = if stage.player_choice && !stage.map_choices.is_empty() {
            let choices = &stage.map_choices;
            self.presenter.display("Where will you go?");
            for (i, id) in choices.iter().enumerate() {
                let name = content
                    .load_map(id)
                    .and_then(|m| m.name.as_deref())
                    .unwrap_or(id.as_str());
                self.presenter.display(&format!("{}. {}", i + 1, name));
            }
            let choice = self.presenter.get_choice(choices.len());
            let index = if (1..=choices.len()).contains(&choice) {
                choice - 1
            } else {
                log::warn!("map selection {} out of range, taking the first option", choice);
                0
            };
            Some(choices[index].clone())
        } else {
            let loadable: Vec<&String> = stage
                .map_pool
                .iter()
                .filter(|id| {
                    let found = content.load_map(id).is_some();
                    if !found {
                        log::warn!("map pool lists missing map '{}'", id);
                    }
                    found
                })
                .collect();
            loadable.choose(&mut self.rng).map(|id| id.to_string())
        };

        let Some(map_id) = map_id else {
            log::error!("floor {} has no selectable map", session.floor);
            return None;
        };
        match content.load_map(&map_id) {
            Some(map) => {
                session.active_map = Some(map_id);
                Some(map.clone())
            }
            None => {
                log::error!("map '{}' not found", map_id);
                None
            }
        }
    }

    /// Set up imagery and show the floor header and player status.
    fn show_map(&mut self, map: &MapDef, session: &mut SessionState) {
        session.background = if map.backgrounds.is_empty() {
            map.background.clone()
        } else {
            map.backgrounds.choose(&mut self.rng).cloned()
        };
        session.sub_image = map.sub_image.clone();
        self.presenter
            .show_image(ImageSlot::Background, session.background.as_deref());
        self.presenter
            .show_image(ImageSlot::SubImage, session.sub_image.as_deref());

        let name = map.name.as_deref().unwrap_or(UNNAMED_MAP);
        self.presenter.show_floor_info(session.floor, name);
        self.presenter.show_player_status(&session.player);
    }

    fn run_entry_event(&mut self, stage: &StageConfig, map: &MapDef, session: &mut SessionState) {
        if stage.inherit_map {
            return;
        }
        let map_default = if stage.suppress_entry_event {
            None
        } else {
            map.entry_event.as_deref()
        };
        let Some(event_id) = stage.entry_event.as_deref().or(map_default) else {
            return;
        };
        let mut runner = self.runner();
        if let Err(e) = runner.trigger(session, event_id, EventOrigin::MapEntry) {
            log::warn!("entry event skipped on floor {}: {}", session.floor, e);
        }
    }

    fn advance(&mut self, scenario: &Scenario, session: &mut SessionState) {
        for expired in session.player.tick_statuses() {
            let name = self
                .registries
                .statuses
                .get(&expired)
                .map_or(expired.as_str(), |def| def.name.as_str());
            self.presenter.display(&format!("{} wears off.", name));
        }
        session.floor += 1;
        let inherits = scenario.stage(session.floor).is_some_and(|s| s.inherit_map);
        if !inherits {
            session.active_map = None;
        }
        if session.expression.take().is_some() {
            self.presenter.show_image(ImageSlot::Expression, None);
        }
    }

    fn play_narration(&mut self, session: &mut SessionState, narration: Option<&Narration>) {
        let mut runner = self.runner();
        match narration {
            Some(Narration::Event(id)) => {
                if let Err(e) = runner.trigger(session, id, EventOrigin::Narration) {
                    log::warn!("narration skipped: {}", e);
                }
            }
            Some(Narration::Text(text)) => runner.say(session, text),
            None => {}
        }
    }

    fn finish_victory(&mut self, scenario: &Scenario, session: &mut SessionState) -> CampaignOutcome {
        session.victory = true;
        let text = scenario.victory_text.as_deref().unwrap_or(DEFAULT_VICTORY_TEXT);
        self.runner().say(session, text);
        self.play_narration(session, scenario.epilogue.as_ref());
        self.show_statistics(session);
        CampaignOutcome::Victory
    }

    fn finish_alternate(&mut self, session: &mut SessionState, ending: String) -> CampaignOutcome {
        session.alternate_ending = None;
        let mut runner = self.runner();
        if let Err(e) = runner.trigger(session, &ending, EventOrigin::Narration) {
            log::warn!("alternate ending event skipped: {}", e);
        }
        session.alternate_ending = None;
        self.show_statistics(session);
        CampaignOutcome::AlternateEnding(ending)
    }

    /// Record the loss and offer a revival to fated players. Returns true if
    /// the player was revived and the run should continue.
    /// Fate check for a run that ended without a death. The player is still
    /// alive, so nothing is written to the graveyard.
    fn report_fate(&mut self, session: &SessionState) {
        let name = &session.player.name;
        if self.graveyard.check_fate(&session.player) {
            self.presenter
                .display(&format!("Fate is not finished with {}.", name));
        } else {
            self.presenter
                .display(&format!("{} will not pass this way again.", name));
        }
    }

    fn handle_defeat(&mut self, session: &mut SessionState) -> bool {
        let (cause, floor) = match &session.death {
            Some(notice) => (notice.cause.clone(), notice.floor),
            None => ("lost in the depths".to_string(), session.floor),
        };
        let name = session.player.name.clone();
        self.graveyard.record_loss(&session.player, &cause, floor);
        self.presenter
            .display(&format!("{} has fallen on floor {}: {}.", name, floor, cause));

        if !self.graveyard.check_fate(&session.player) {
            self.presenter.display(&format!("{} is lost forever.", name));
            return false;
        }

        self.presenter.display("Fate is not finished with you.");
        self.presenter.display(&format!("1. Let {} rest", name));
        self.presenter.display(&format!("2. Call {} back", name));
        if read_selection(&mut self.presenter, 2) != 1 {
            return false;
        }

        let id = session.player.id.clone();
        if self.graveyard.revive(&id, self.characters.as_ref(), session) {
            self.presenter.display(&format!("{} rises again.", name));
            true
        } else {
            self.presenter.display("The call goes unanswered.");
            false
        }
    }

    fn show_statistics(&mut self, session: &SessionState) {
        for line in session.statistics().lines() {
            self.presenter.display(&line);
        }
    }
}

fn halted(session: &SessionState) -> Option<LoopExit> {
    if session.game_over {
        return Some(LoopExit::Defeat);
    }
    session.alternate_ending.clone().map(LoopExit::AlternateEnding)
}

impl<P: Presenter> CampaignEngineBuilder<P> {
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Load content packs from a directory. May be given more than once;
    /// later directories override earlier ones.
    pub fn content_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.content_dirs.push(path.as_ref().to_path_buf());
        self
    }

    /// Provide content directly (for testing without files).
    pub fn with_content(mut self, content: ContentLibrary) -> Self {
        self.content = Some(content);
        self
    }

    /// Use a custom content loader instead of a `ContentLibrary`.
    pub fn with_loader(mut self, loader: Box<dyn ContentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn with_characters(mut self, characters: impl CharacterStore + 'static) -> Self {
        self.characters = Some(Box::new(characters));
        self
    }

    pub fn with_word_provider(mut self, provider: impl WordProvider + 'static) -> Self {
        self.word_provider = Some(Box::new(provider));
        self
    }

    pub fn with_dialogue_rules(mut self, rules: DialogueRules) -> Self {
        self.dialogue = Some(rules);
        self
    }

    pub fn with_graveyard(mut self, graveyard: Graveyard) -> Self {
        self.graveyard = Some(graveyard);
        self
    }

    pub fn build(self) -> Result<CampaignEngine<P>, CampaignError> {
        let content: Box<dyn ContentLoader> = match self.loader {
            Some(loader) => loader,
            None => {
                let mut library = self.content.unwrap_or_default();
                for dir in &self.content_dirs {
                    library.load_dir_into(dir)?;
                }
                Box::new(library)
            }
        };
        let registries = Registries::from_loader(content.as_ref());

        let mut templater = TextTemplater::with_rules(self.dialogue.unwrap_or_default());
        if let Some(provider) = self.word_provider {
            templater.set_word_provider(provider);
        }

        Ok(CampaignEngine {
            content,
            registries,
            templater,
            characters: self
                .characters
                .unwrap_or_else(|| Box::new(MemoryCharacterStore::new())),
            graveyard: self.graveyard.unwrap_or_default(),
            presenter: self.presenter,
            rng: StdRng::seed_from_u64(self.seed),
            session: None,
        })
    }
}
