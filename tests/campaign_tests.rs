/// Campaign integration tests: full runs over the fixture content pack.

use descent_engine::core::campaign::{CampaignEngine, CampaignOutcome};
use descent_engine::core::ports::{ImageSlot, MemoryCharacterStore, ScriptedPresenter};
use descent_engine::core::registry::ContentLibrary;
use descent_engine::core::session::{DEATHS, EVENTS_COMPLETED};
use descent_engine::schema::player::{CharacterId, Player};
use std::path::Path;

fn fixture_content() -> ContentLibrary {
    let mut library = ContentLibrary::new();
    library
        .load_from_ron(Path::new("tests/fixtures/campaign.ron"))
        .unwrap();
    library
}

fn engine_with(presenter: ScriptedPresenter) -> CampaignEngine<ScriptedPresenter> {
    CampaignEngine::builder(presenter)
        .seed(42)
        .with_content(fixture_content())
        .build()
        .unwrap()
}

fn fated_hero() -> Player {
    let mut player = Player::new("hero", "Hero");
    player.fated = true;
    player
}

#[test]
fn victory_exactly_after_last_stage() {
    let mut engine = engine_with(ScriptedPresenter::new());
    let outcome = engine
        .start_with_player(Player::new("p", "Hero"), "three_floors")
        .unwrap();
    assert_eq!(outcome, CampaignOutcome::Victory);

    let session = engine.session().unwrap();
    assert_eq!(session.floor, 3);
    assert_eq!(session.counter(EVENTS_COMPLETED), 3);
    assert_eq!(
        engine.presenter().floors.iter().map(|(f, _)| *f).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );

    let transcript = &engine.presenter().transcript;
    let daylight = transcript
        .iter()
        .position(|l| l == "Hero walks out into daylight.")
        .unwrap();
    let epilogue = transcript
        .iter()
        .position(|l| l == "The keep falls silent behind Hero.")
        .unwrap();
    assert!(daylight < epilogue);
    assert!(engine.presenter().saw("Floors cleared: 2/2"));
}

#[test]
fn deck_cycles_through_every_eligible_event_before_repeating() {
    let mut engine = engine_with(ScriptedPresenter::new());
    engine
        .start_with_player(Player::new("p", "Hero"), "long_hall")
        .unwrap();
    let session = engine.session().unwrap();

    // Eight floors over four drawable events: two full cycles.
    assert_eq!(session.counter(EVENTS_COMPLETED), 8);
    assert_eq!(session.counter("rats"), 2);
    assert_eq!(session.counter("bats"), 2);
    assert_eq!(session.counter("chests"), 2);
    assert_eq!(
        session.player.inventory.iter().filter(|i| *i == "potion").count(),
        2
    );
    // Mandatory events never come out of the pool.
    assert!(!engine.presenter().saw("The guardian stirs."));
    // Decks are rebuilt on floors 0 and 4. The deep event unlocks on
    // floor 5, so neither cycle includes it.
    assert_eq!(session.counter("deep"), 0);
}

#[test]
fn expired_events_are_not_drawn_on_later_floors() {
    for seed in 0..30 {
        let mut engine = CampaignEngine::builder(ScriptedPresenter::new())
            .seed(seed)
            .with_content(fixture_content())
            .build()
            .unwrap();
        let outcome = engine
            .start_with_player(Player::new("p", "Hero"), "fading")
            .unwrap();
        assert_eq!(outcome, CampaignOutcome::Victory);

        let session = engine.session().unwrap();
        assert_eq!(session.counter(EVENTS_COMPLETED), 4, "seed {}", seed);
        assert!(session.counter("early") <= 1, "seed {}", seed);
        assert_eq!(session.counter("early_out_of_window"), 0, "seed {}", seed);
    }
}

#[test]
fn map_choice_falls_back_to_first_option() {
    let mut engine = engine_with(ScriptedPresenter::with_choices([2, 5]));
    engine
        .start_with_player(Player::new("p", "Hero"), "crossroads")
        .unwrap();
    let session = engine.session().unwrap();
    assert!(session.has_flag("visited_cave"));
    assert!(session.has_flag("visited_grove"));

    let presenter = engine.presenter();
    assert_eq!(
        presenter.floors,
        vec![(0, "Uncharted Floor".to_string()), (1, "Grove".to_string())]
    );
    assert!(presenter.saw("2. cave"));
    assert!(presenter
        .images
        .contains(&(ImageSlot::Background, Some("grove_bg".to_string()))));
}

#[test]
fn player_choice_without_choices_uses_map_pool() {
    let mut engine = engine_with(ScriptedPresenter::new());
    let outcome = engine
        .start_with_player(Player::new("p", "Hero"), "open_choice")
        .unwrap();
    assert_eq!(outcome, CampaignOutcome::Victory);

    let presenter = engine.presenter();
    assert!(!presenter.saw("Where will you go?"));
    assert_eq!(presenter.floors, vec![(0, "Great Hall".to_string())]);
    assert!(presenter.saw("Water drips in the dark."));
}

#[test]
fn pool_switch_and_entry_event_suppression() {
    let mut engine = engine_with(ScriptedPresenter::new());
    let outcome = engine
        .start_with_player(Player::new("p", "Hero"), "switchback")
        .unwrap();
    assert_eq!(outcome, CampaignOutcome::Victory);

    let session = engine.session().unwrap();
    // Floor 1 suppresses the cave's own entry event.
    assert!(!session.has_flag("visited_cave"));
    // Floor 2 suppresses it too, but its stage override still runs.
    assert!(session.has_flag("stage_override"));
    assert!(engine.presenter().saw("Water drips in the dark."));
    assert_eq!(session.deck.pool_id(), Some("empty_pool"));
    // The empty pool has no filler to fall back on.
    assert_eq!(session.counter(EVENTS_COMPLETED), 2);
}

#[test]
fn hall_backgrounds_are_drawn_from_the_list() {
    let mut engine = engine_with(ScriptedPresenter::new());
    engine
        .start_with_player(Player::new("p", "Hero"), "three_floors")
        .unwrap();
    let backgrounds: Vec<_> = engine
        .presenter()
        .images
        .iter()
        .filter(|(slot, _)| *slot == ImageSlot::Background)
        .map(|(_, id)| id.clone().unwrap())
        .collect();
    assert_eq!(backgrounds.len(), 3);
    assert!(backgrounds
        .iter()
        .all(|b| b == "hall_day" || b == "hall_dusk"));
}

#[test]
fn chained_events_count_once_and_filler_runs_on_empty_pool() {
    let mut engine = engine_with(ScriptedPresenter::new());
    engine
        .start_with_player(Player::new("p", "Hero"), "nested")
        .unwrap();
    let session = engine.session().unwrap();
    assert_eq!(session.counter("inner_runs"), 1);
    assert_eq!(session.counter("middle_runs"), 1);
    assert_eq!(session.counter(EVENTS_COMPLETED), 2);
    assert!(!session.in_recursion);

    let transcript = &engine.presenter().transcript;
    let begins = transcript.iter().position(|l| l == "outer begins").unwrap();
    let ends = transcript.iter().position(|l| l == "outer ends").unwrap();
    assert!(begins < ends);
    assert!(engine.presenter().saw("Nothing happens."));
}

#[test]
fn alternate_ending_bypasses_victory() {
    let mut engine = engine_with(ScriptedPresenter::new());
    let outcome = engine
        .start_with_player(Player::new("p", "Hero"), "escape_route")
        .unwrap();
    assert_eq!(outcome, CampaignOutcome::AlternateEnding("ending_door".to_string()));

    let session = engine.session().unwrap();
    assert_eq!(session.floor, 0);
    assert!(session.alternate_ending.is_none());
    assert!(!session.victory);

    let presenter = engine.presenter();
    assert!(presenter.saw("Hero steps through and is gone."));
    assert!(!presenter.saw("never shown"));
    assert!(!presenter.saw("conquered the depths"));
}

#[test]
fn unfated_death_is_final() {
    let mut engine = engine_with(ScriptedPresenter::new());
    let outcome = engine
        .start_with_player(Player::new("p", "Hero"), "pitfall")
        .unwrap();
    assert_eq!(
        outcome,
        CampaignOutcome::Defeat {
            cause: "fell into the pit".to_string(),
            floor: 1
        }
    );
    let record = engine.graveyard().get(&CharacterId::new("p")).unwrap();
    assert_eq!(record.floor, 1);
    assert!(!record.fated);
    assert!(!record.revived);
    assert!(engine.presenter().saw("Hero is lost forever."));
}

#[test]
fn fated_player_may_decline_revival() {
    let mut store = MemoryCharacterStore::new();
    store.insert(fated_hero());
    let mut engine = CampaignEngine::builder(ScriptedPresenter::new())
        .with_content(fixture_content())
        .with_characters(store)
        .build()
        .unwrap();
    let outcome = engine.start_with_player(fated_hero(), "pitfall").unwrap();
    assert!(matches!(outcome, CampaignOutcome::Defeat { floor: 1, .. }));
    assert!(engine.graveyard().can_revive(&CharacterId::new("hero")));
}

#[test]
fn fated_player_revives_and_resumes_same_floor() {
    let mut store = MemoryCharacterStore::new();
    store.insert(fated_hero());
    let mut engine = CampaignEngine::builder(ScriptedPresenter::with_choices([2]))
        .seed(3)
        .with_content(fixture_content())
        .with_characters(store)
        .build()
        .unwrap();
    let outcome = engine.start_with_player(fated_hero(), "pitfall").unwrap();
    assert_eq!(outcome, CampaignOutcome::Victory);

    let session = engine.session().unwrap();
    assert_eq!(session.counter(DEATHS), 1);
    assert!(session.player.is_alive());
    assert_eq!(session.floor, 3);

    let presenter = engine.presenter();
    assert!(presenter.saw("Hero rises again."));
    assert!(presenter.saw("Hero catches the ledge this time."));
    // The pit floor is shown twice: before the fall and after the revival.
    assert_eq!(
        presenter.floors.iter().filter(|(f, _)| *f == 1).count(),
        2
    );

    let id = CharacterId::new("hero");
    assert!(engine.graveyard().get(&id).unwrap().revived);
    assert!(!engine.graveyard().can_revive(&id));
}

#[test]
fn missing_map_runs_fate_check_before_statistics() {
    let mut engine = engine_with(ScriptedPresenter::new());
    let outcome = engine.start_with_player(fated_hero(), "missing_map").unwrap();
    match outcome {
        CampaignOutcome::Aborted { floor, reason } => {
            assert_eq!(floor, 0);
            assert!(reason.contains("floor 0"), "reason: {}", reason);
        }
        other => panic!("expected abort, got {:?}", other),
    }

    let transcript = &engine.presenter().transcript;
    let fate = transcript
        .iter()
        .position(|l| l == "Fate is not finished with Hero.")
        .unwrap();
    let summary = transcript
        .iter()
        .position(|l| l.starts_with("== Run summary"))
        .unwrap();
    assert!(fate < summary);
    // The player never died, so there is nothing to bury.
    assert!(engine.graveyard().is_empty());
}

#[test]
fn missing_map_without_fate_ends_for_good() {
    let mut engine = engine_with(ScriptedPresenter::new());
    engine
        .start_with_player(Player::new("p", "Hero"), "missing_map")
        .unwrap();
    assert!(engine.presenter().saw("Hero will not pass this way again."));
    assert!(!engine.presenter().saw("Fate is not finished with Hero."));
}

#[test]
fn same_seed_same_run() {
    let run = || {
        let mut engine = engine_with(ScriptedPresenter::new());
        engine
            .start_with_player(Player::new("p", "Hero"), "long_hall")
            .unwrap();
        engine.presenter().images.clone()
    };
    assert_eq!(run(), run());
}

#[test]
fn fixture_content_validates_except_deliberate_gaps() {
    let issues = fixture_content().validate();
    assert_eq!(issues.len(), 2, "issues: {:?}", issues);
    assert!(issues[0].to_string().contains("unknown map 'nowhere'"));
    assert!(issues[1].to_string().contains("map_choices is empty"));
}
