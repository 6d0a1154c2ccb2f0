/// Shipped content tests: the demo campaign loads, validates and plays.

use descent_engine::core::campaign::{CampaignEngine, CampaignOutcome};
use descent_engine::core::ports::{
    CharacterStore, ContentLoader, MemoryCharacterStore, ScriptedPresenter,
};
use descent_engine::core::registry::ContentLibrary;
use descent_engine::schema::player::Player;
use std::path::Path;

const DEMO_DIR: &str = "content/demo";
const CHARACTER_DIR: &str = "content/characters";

fn demo_characters() -> MemoryCharacterStore {
    let mut store = MemoryCharacterStore::new();
    let mut paths: Vec<_> = std::fs::read_dir(CHARACTER_DIR)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("ron"))
        .collect();
    paths.sort();
    for path in paths {
        let contents = std::fs::read_to_string(&path).unwrap();
        let player: Player = ron::from_str(&contents)
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        store.insert(player);
    }
    store
}

#[test]
fn demo_content_is_consistent() {
    let library = ContentLibrary::load_dir(Path::new(DEMO_DIR)).unwrap();
    assert_eq!(library.scenario_ids(), vec!["sunken_keep"]);
    let issues = library.validate();
    assert!(issues.is_empty(), "issues: {:?}", issues);
    assert!(library.load_personality("stoic").is_some());
    assert!(library.load_personality("cheerful").is_some());
}

#[test]
fn demo_characters_reference_demo_personalities() {
    let library = ContentLibrary::load_dir(Path::new(DEMO_DIR)).unwrap();
    let store = demo_characters();
    let ids = store.list_saved_characters();
    assert_eq!(ids.len(), 2);
    for id in ids {
        let player = store.load_character(&id).unwrap();
        let personality = player.personality_id.as_deref().unwrap();
        assert!(library.load_personality(personality).is_some());
    }
}

#[test]
fn demo_campaign_plays_to_an_ending() {
    for seed in 0..8 {
        let mut engine = CampaignEngine::builder(ScriptedPresenter::new())
            .seed(seed)
            .content_dir(DEMO_DIR)
            .with_characters(demo_characters())
            .build()
            .unwrap();
        let outcome = engine.start_with_selection("sunken_keep").unwrap();
        assert!(
            !matches!(outcome, CampaignOutcome::Aborted { .. }),
            "seed {}: {:?}",
            seed,
            outcome
        );
        let presenter = engine.presenter();
        assert!(presenter.saw("Brann the Dwarf has come for the Sunken Crown."));
        assert!(presenter.saw("== Run summary: Brann =="));
    }
}
