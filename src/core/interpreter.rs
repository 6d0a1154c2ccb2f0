/// Event script interpreter.
///
/// Walks an event's node list in order, dispatching each node to the
/// presenter, the templater, or a mutation of the session. Execution stops
/// as soon as the session is halted (the player died or an alternate ending
/// was requested). Chained events run to completion before the calling
/// script continues.

use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

use crate::core::ports::{ContentLoader, ImageSlot, Presenter};
use crate::core::registry::Registries;
use crate::core::session::{SessionState, EVENTS_COMPLETED};
use crate::core::templater::{PlayerContext, TextTemplater};
use crate::schema::event::{ChoiceOption, Effect, Event, PlayerField, Predicate, ScriptNode};
use crate::schema::player::Stat;

/// Cause reported when hit points reach zero without a `death_cause:` tag.
pub const DEFAULT_WOUND_CAUSE: &str = "succumbed to wounds";

/// Invalid answers tolerated before a choice falls back to its first option.
pub const MAX_CHOICE_ATTEMPTS: usize = 3;

/// Deepest chain nesting followed before a chain is refused.
pub const MAX_CHAIN_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("event not found: {0}")]
    EventNotFound(String),
}

/// Whether the caller may keep going after a script returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Halt,
}

/// Why an event was started. Only top-level pool draws count as completed
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    Pool,
    MapEntry,
    Narration,
    Chained,
}

impl EventOrigin {
    fn counts_completion(self) -> bool {
        self == EventOrigin::Pool
    }
}

/// Everything a script needs while it runs, borrowed from the engine for
/// the duration of one event.
pub struct EventRunner<'a> {
    pub content: &'a dyn ContentLoader,
    pub registries: &'a Registries,
    pub templater: &'a TextTemplater,
    pub presenter: &'a mut dyn Presenter,
    pub rng: &'a mut StdRng,
    depth: usize,
}

impl<'a> EventRunner<'a> {
    pub fn new(
        content: &'a dyn ContentLoader,
        registries: &'a Registries,
        templater: &'a TextTemplater,
        presenter: &'a mut dyn Presenter,
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            content,
            registries,
            templater,
            presenter,
            rng,
            depth: 0,
        }
    }

    /// Run the event with the given id to completion.
    ///
    /// A pool-origin event bumps the completed-events counter once, unless
    /// it runs inside a chain.
    pub fn trigger(
        &mut self,
        session: &mut SessionState,
        event_id: &str,
        origin: EventOrigin,
    ) -> Result<Flow, InterpreterError> {
        let content = self.content;
        let event = content
            .load_event(event_id)
            .ok_or_else(|| InterpreterError::EventNotFound(event_id.to_string()))?;
        log::debug!("event '{}' ({:?}) on floor {}", event_id, origin, session.floor);

        let flow = self.run_nodes(session, event, &event.script);
        if origin.counts_completion() && !session.in_recursion {
            session.increment_counter(EVENTS_COMPLETED, 1);
        }
        Ok(flow)
    }

    /// Render text against the session's player and personality.
    pub fn render(&mut self, session: &SessionState, text: &str) -> String {
        let content = self.content;
        let personality = session
            .player
            .personality_id
            .as_deref()
            .and_then(|id| content.load_personality(id));
        let ctx = PlayerContext::new(&session.player, personality);
        self.templater.render(text, &ctx, self.rng)
    }

    /// Render and display a line of text.
    pub fn say(&mut self, session: &SessionState, text: &str) {
        let rendered = self.render(session, text);
        self.presenter.display(&rendered);
    }

    fn run_nodes(&mut self, session: &mut SessionState, event: &Event, nodes: &[ScriptNode]) -> Flow {
        for node in nodes {
            if session.is_halted() || self.run_node(session, event, node) == Flow::Halt {
                return Flow::Halt;
            }
        }
        if session.is_halted() {
            Flow::Halt
        } else {
            Flow::Continue
        }
    }

    fn run_node(&mut self, session: &mut SessionState, event: &Event, node: &ScriptNode) -> Flow {
        match node {
            ScriptNode::Display { text, wait } => {
                self.say(session, text);
                if *wait {
                    self.presenter.acknowledge();
                }
                Flow::Continue
            }
            ScriptNode::Choice { prompt, options } => self.run_choice(session, event, prompt.as_deref(), options),
            ScriptNode::Condition {
                test,
                then,
                otherwise,
            } => {
                if self.evaluate(session, test) {
                    self.run_nodes(session, event, then)
                } else {
                    self.run_nodes(session, event, otherwise)
                }
            }
            ScriptNode::Effect(effect) => {
                self.apply_effect(session, event, effect);
                Flow::Continue
            }
            ScriptNode::DeathTrigger { cause } => {
                let cause = self.render(session, cause);
                log::info!("'{}' died on floor {}: {}", session.player.name, session.floor, cause);
                session.mark_dead(&cause);
                Flow::Halt
            }
            ScriptNode::Chain { event: next } => self.run_chain(session, next),
        }
    }

    fn run_choice(
        &mut self,
        session: &mut SessionState,
        event: &Event,
        prompt: Option<&str>,
        options: &[ChoiceOption],
    ) -> Flow {
        if options.is_empty() {
            log::warn!("event '{}' has a choice with no options", event.id);
            return Flow::Continue;
        }
        if let Some(prompt) = prompt {
            self.say(session, prompt);
        }
        for (i, option) in options.iter().enumerate() {
            let label = self.render(session, &option.label);
            self.presenter.display(&format!("{}. {}", i + 1, label));
        }
        let index = read_selection(self.presenter, options.len());
        self.run_nodes(session, event, &options[index].nodes)
    }

    fn run_chain(&mut self, session: &mut SessionState, event_id: &str) -> Flow {
        if self.depth >= MAX_CHAIN_DEPTH {
            log::error!("chain to '{}' refused: nesting deeper than {}", event_id, MAX_CHAIN_DEPTH);
            return Flow::Continue;
        }
        let previous = session.in_recursion;
        session.in_recursion = true;
        self.depth += 1;
        let result = self.trigger(session, event_id, EventOrigin::Chained);
        self.depth -= 1;
        session.in_recursion = previous;

        match result {
            Ok(flow) => flow,
            Err(e) => {
                log::warn!("chain skipped: {}", e);
                Flow::Continue
            }
        }
    }

    /// Evaluate a predicate against the session. `Chance` rolls here.
    pub fn evaluate(&mut self, session: &SessionState, predicate: &Predicate) -> bool {
        let player = &session.player;
        match predicate {
            Predicate::HasFlag(flag) => session.has_flag(flag),
            Predicate::Counter { name, cmp, value } => cmp.holds(session.counter(name), *value),
            Predicate::Stat { stat, cmp, value } => cmp.holds(player.stats.get(*stat), *value),
            Predicate::HasItem(id) => player.has_item(id),
            Predicate::HasStatus(id) => player.has_status(id),
            Predicate::Attribute { field, equals } => {
                let actual = match field {
                    PlayerField::Name => Some(player.name.as_str()),
                    PlayerField::Race => player.race_name.as_deref(),
                    PlayerField::BodyType => player.body_type.as_deref(),
                    PlayerField::Clothing => player.clothing.as_deref(),
                    PlayerField::Personality => player.personality_id.as_deref(),
                };
                actual == Some(equals.as_str())
            }
            Predicate::Fated => player.fated,
            Predicate::Floor { cmp, value } => cmp.holds(i64::from(session.floor), *value),
            Predicate::Chance(percent) => self.rng.gen_range(0..100) < *percent,
            Predicate::All(tests) => tests.iter().all(|p| self.evaluate(session, p)),
            Predicate::Any(tests) => tests.iter().any(|p| self.evaluate(session, p)),
            Predicate::Not(test) => !self.evaluate(session, test),
        }
    }

    /// Apply one effect. Unknown item and status ids are logged and skipped.
    pub fn apply_effect(&mut self, session: &mut SessionState, event: &Event, effect: &Effect) {
        match effect {
            Effect::AddItem(id) => {
                if !self.registries.items.contains(id) {
                    log::warn!("event '{}' grants unknown item '{}'", event.id, id);
                    return;
                }
                session.player.add_item(id);
            }
            Effect::RemoveItem(id) => {
                if !session.player.remove_item(id) {
                    log::debug!("'{}' not held, nothing removed", id);
                }
            }
            Effect::LoseRandomItem { rarity } => {
                let items = &self.registries.items;
                let eligible: Vec<usize> = session
                    .player
                    .inventory
                    .iter()
                    .enumerate()
                    .filter(|(_, id)| rarity.map_or(true, |r| items.rarity_of(id) == r))
                    .map(|(i, _)| i)
                    .collect();
                if eligible.is_empty() {
                    log::debug!("no eligible item to lose");
                    return;
                }
                let index = eligible[self.rng.gen_range(0..eligible.len())];
                let lost = session.player.inventory.remove(index);
                log::debug!("'{}' lost '{}'", session.player.name, lost);
            }
            Effect::ApplyStatus { id, turns } => {
                let Some(def) = self.registries.statuses.get(id) else {
                    log::warn!("event '{}' applies unknown status '{}'", event.id, id);
                    return;
                };
                session.player.apply_status(id, turns.or(def.default_duration));
            }
            Effect::RemoveStatus(id) => {
                session.player.remove_status(id);
            }
            Effect::AdjustStat { stat, delta } => {
                let value = session.player.stats.adjust(*stat, *delta);
                let lethal = matches!(stat, Stat::Hp | Stat::MaxHp);
                if lethal && session.player.stats.hp <= 0 {
                    let cause = event.death_cause().unwrap_or(DEFAULT_WOUND_CAUSE);
                    log::info!(
                        "'{}' reduced to 0 HP on floor {}: {}",
                        session.player.name,
                        session.floor,
                        cause
                    );
                    session.mark_dead(cause);
                } else {
                    log::trace!("{} -> {}", stat.name(), value);
                }
            }
            Effect::SetFlag(flag) => session.set_flag(flag),
            Effect::ClearFlag(flag) => session.clear_flag(flag),
            Effect::IncrementCounter { name, by } => {
                session.increment_counter(name, *by);
            }
            Effect::SetCounter { name, value } => session.set_counter(name, *value),
            Effect::SetSubImage(image) => {
                session.sub_image = image.clone();
                self.presenter.show_image(ImageSlot::SubImage, image.as_deref());
            }
            Effect::SetExpression(image) => {
                session.expression = image.clone();
                self.presenter.show_image(ImageSlot::Expression, image.as_deref());
            }
            Effect::AlternateEnding(ending) => {
                log::info!("event '{}' requests ending '{}'", event.id, ending);
                session.alternate_ending = Some(ending.clone());
            }
        }
    }
}

/// Read a 1-based selection and return it as an index. Re-prompts on
/// out-of-range answers, then falls back to the first option.
pub fn read_selection(presenter: &mut dyn Presenter, max: usize) -> usize {
    for _ in 0..MAX_CHOICE_ATTEMPTS {
        let choice = presenter.get_choice(max);
        if (1..=max).contains(&choice) {
            return choice - 1;
        }
        log::warn!("selection {} outside 1..={}", choice, max);
        presenter.display(&format!("Please choose a number from 1 to {}.", max));
    }
    log::warn!("no valid selection after {} attempts, taking option 1", MAX_CHOICE_ATTEMPTS);
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ports::ScriptedPresenter;
    use crate::core::registry::ContentLibrary;
    use crate::core::session::GameMode;
    use crate::schema::content::{Scenario, StageConfig};
    use crate::schema::player::Player;
    use rand::SeedableRng;

    const EVENTS: &str = r#"(
        events: [
            (
                id: "trap",
                tags: ["death_cause:crushed by a falling block"],
                script: [
                    Display(text: "The ceiling shifts above [Name]."),
                    Effect(AdjustStat(stat: Hp, delta: -500)),
                    Display(text: "unreachable"),
                ],
            ),
            (
                id: "outer",
                script: [
                    Display(text: "outer start"),
                    Chain(event: "inner"),
                    Display(text: "outer end"),
                ],
            ),
            (
                id: "inner",
                script: [
                    Effect(IncrementCounter(name: "inner_runs")),
                    Chain(event: "missing"),
                    Display(text: "inner end"),
                ],
            ),
            (
                id: "fork",
                script: [
                    Choice(
                        prompt: Some("Which way?"),
                        options: [
                            (label: "Left", nodes: [Effect(SetFlag("went_left"))]),
                            (label: "Right", nodes: [Effect(SetFlag("went_right"))]),
                        ],
                    ),
                ],
            ),
            (
                id: "gate",
                script: [
                    Condition(
                        test: All([HasItem("key"), Not(HasFlag("gate_open"))]),
                        then: [Effect(SetFlag("gate_open")), Effect(RemoveItem("key"))],
                        otherwise: [Display(text: "The gate stays shut.")],
                    ),
                ],
            ),
            (
                id: "curse",
                script: [
                    Effect(ApplyStatus(id: "poison")),
                    Effect(ApplyStatus(id: "bogus")),
                    Effect(AddItem("relic")),
                    Effect(AddItem("nonexistent")),
                ],
            ),
            (
                id: "thief",
                script: [Effect(LoseRandomItem(rarity: Some(Rare)))],
            ),
            (
                id: "exit",
                script: [
                    Effect(AlternateEnding("escape")),
                    Display(text: "unreachable"),
                ],
            ),
            (
                id: "doom",
                script: [DeathTrigger(cause: "devoured by [Name]'s shadow")],
            ),
        ],
        items: [
            (id: "relic", name: "Relic", rarity: Rare),
            (id: "key", name: "Key"),
            (id: "bread", name: "Bread"),
        ],
        status_effects: [
            (id: "poison", name: "Poison", default_duration: Some(3)),
        ],
    )"#;

    struct Fixture {
        content: ContentLibrary,
        registries: Registries,
        templater: TextTemplater,
        presenter: ScriptedPresenter,
        rng: StdRng,
        session: SessionState,
    }

    impl Fixture {
        fn new() -> Self {
            let content = ContentLibrary::parse_ron(EVENTS).unwrap();
            let registries = Registries::from_loader(&content);
            let scenario = Scenario {
                id: "s".to_string(),
                name: "S".to_string(),
                prologue: None,
                epilogue: None,
                stages: vec![StageConfig::default(); 3],
                floor_count: None,
                victory_text: None,
                filler_event: None,
            };
            Self {
                content,
                registries,
                templater: TextTemplater::new(),
                presenter: ScriptedPresenter::new(),
                rng: StdRng::seed_from_u64(42),
                session: SessionState::new(&scenario, Player::new("p", "Ayla"), GameMode::Selected),
            }
        }

        fn run(&mut self, id: &str, origin: EventOrigin) -> Result<Flow, InterpreterError> {
            let mut runner = EventRunner::new(
                &self.content,
                &self.registries,
                &self.templater,
                &mut self.presenter,
                &mut self.rng,
            );
            runner.trigger(&mut self.session, id, origin)
        }
    }

    #[test]
    fn lethal_damage_uses_death_cause_tag_and_halts() {
        let mut fx = Fixture::new();
        let flow = fx.run("trap", EventOrigin::Pool).unwrap();
        assert_eq!(flow, Flow::Halt);
        assert_eq!(fx.session.player.stats.hp, 0);
        assert_eq!(
            fx.session.death.as_ref().map(|d| d.cause.as_str()),
            Some("crushed by a falling block")
        );
        assert!(fx.presenter.saw("The ceiling shifts above Ayla."));
        assert!(!fx.presenter.saw("unreachable"));
    }

    #[test]
    fn chained_events_count_once_and_missing_chains_are_skipped() {
        let mut fx = Fixture::new();
        fx.run("outer", EventOrigin::Pool).unwrap();
        assert_eq!(
            fx.presenter.transcript,
            vec!["outer start", "inner end", "outer end"]
        );
        assert_eq!(fx.session.counter(EVENTS_COMPLETED), 1);
        assert_eq!(fx.session.counter("inner_runs"), 1);
        assert!(!fx.session.in_recursion);
    }

    #[test]
    fn non_pool_origins_do_not_count() {
        let mut fx = Fixture::new();
        fx.run("outer", EventOrigin::MapEntry).unwrap();
        fx.run("outer", EventOrigin::Narration).unwrap();
        assert_eq!(fx.session.counter(EVENTS_COMPLETED), 0);
    }

    #[test]
    fn missing_event_is_an_error() {
        let mut fx = Fixture::new();
        assert!(matches!(
            fx.run("nope", EventOrigin::Pool),
            Err(InterpreterError::EventNotFound(id)) if id == "nope"
        ));
    }

    #[test]
    fn choice_runs_selected_branch() {
        let mut fx = Fixture::new();
        fx.presenter.push_choice(2);
        fx.run("fork", EventOrigin::Pool).unwrap();
        assert!(fx.session.has_flag("went_right"));
        assert!(!fx.session.has_flag("went_left"));
        assert!(fx.presenter.saw("1. Left"));
        assert!(fx.presenter.saw("Which way?"));
    }

    #[test]
    fn invalid_choices_fall_back_to_first_option() {
        let mut fx = Fixture::new();
        fx.presenter = ScriptedPresenter::with_choices([0, 7, 9]);
        fx.run("fork", EventOrigin::Pool).unwrap();
        assert!(fx.session.has_flag("went_left"));
        assert_eq!(fx.presenter.prompts, MAX_CHOICE_ATTEMPTS);
    }

    #[test]
    fn condition_takes_each_branch() {
        let mut fx = Fixture::new();
        fx.run("gate", EventOrigin::Pool).unwrap();
        assert!(fx.presenter.saw("The gate stays shut."));

        fx.session.player.add_item("key");
        fx.run("gate", EventOrigin::Pool).unwrap();
        assert!(fx.session.has_flag("gate_open"));
        assert!(!fx.session.player.has_item("key"));
    }

    #[test]
    fn unknown_registry_ids_are_skipped() {
        let mut fx = Fixture::new();
        fx.run("curse", EventOrigin::Pool).unwrap();
        let player = &fx.session.player;
        assert_eq!(player.inventory, vec!["relic".to_string()]);
        assert_eq!(player.status_effects.len(), 1);
        assert_eq!(player.status_effects[0].turns_remaining, Some(3));
    }

    #[test]
    fn lose_random_item_respects_rarity() {
        let mut fx = Fixture::new();
        fx.session.player.add_item("bread");
        fx.run("thief", EventOrigin::Pool).unwrap();
        assert_eq!(fx.session.player.inventory, vec!["bread".to_string()]);

        fx.session.player.add_item("relic");
        fx.run("thief", EventOrigin::Pool).unwrap();
        assert_eq!(fx.session.player.inventory, vec!["bread".to_string()]);
    }

    #[test]
    fn alternate_ending_halts_script() {
        let mut fx = Fixture::new();
        assert_eq!(fx.run("exit", EventOrigin::Pool).unwrap(), Flow::Halt);
        assert_eq!(fx.session.alternate_ending.as_deref(), Some("escape"));
        assert!(!fx.presenter.saw("unreachable"));
    }

    #[test]
    fn death_trigger_renders_cause() {
        let mut fx = Fixture::new();
        fx.run("doom", EventOrigin::Pool).unwrap();
        assert!(fx.session.game_over);
        assert_eq!(
            fx.session.death.as_ref().map(|d| d.cause.as_str()),
            Some("devoured by Ayla's shadow")
        );
    }

    #[test]
    fn chance_predicate_bounds() {
        let mut fx = Fixture::new();
        let mut runner = EventRunner::new(
            &fx.content,
            &fx.registries,
            &fx.templater,
            &mut fx.presenter,
            &mut fx.rng,
        );
        for _ in 0..20 {
            assert!(!runner.evaluate(&fx.session, &Predicate::Chance(0)));
            assert!(runner.evaluate(&fx.session, &Predicate::Chance(100)));
        }
    }
}
