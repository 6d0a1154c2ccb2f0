/// Console front end: plays a scenario over stdin/stdout.
///
/// Usage: play --content <dir> --scenario <id> [--characters <dir>] [--graveyard <file>]

use clap::Parser;
use descent_engine::core::campaign::{CampaignEngine, CampaignError, CampaignOutcome};
use descent_engine::core::graveyard::Graveyard;
use descent_engine::core::ports::{MemoryCharacterStore, Presenter};
use descent_engine::core::registry::{ContentLibrary, Registries};
use descent_engine::schema::player::Player;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "play")]
#[command(about = "Play a campaign scenario in the terminal")]
#[command(version)]
struct Args {
    /// Directory of content packs (*.ron)
    #[arg(short, long, default_value = "content/demo")]
    content: PathBuf,

    /// Scenario id to play
    #[arg(short, long, default_value = "sunken_keep")]
    scenario: String,

    /// Directory of saved characters, one Player per *.ron file
    #[arg(long)]
    characters: Option<PathBuf>,

    /// Graveyard ledger file, read before play and written after
    #[arg(long)]
    graveyard: Option<PathBuf>,

    /// Random seed; defaults to the current time
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

struct ConsolePresenter {
    input: io::StdinLock<'static>,
    /// Item and status names for the status line.
    registries: Registries,
}

impl ConsolePresenter {
    fn new(registries: Registries) -> Self {
        Self {
            input: io::stdin().lock(),
            registries,
        }
    }

    fn read_line(&mut self) -> String {
        let mut line = String::new();
        if let Err(e) = self.input.read_line(&mut line) {
            log::warn!("failed to read input: {}", e);
        }
        line.trim().to_string()
    }
}

impl Presenter for ConsolePresenter {
    fn display(&mut self, text: &str) {
        println!("{}", text);
    }

    fn acknowledge(&mut self) {
        print!("  [enter]");
        let _ = io::stdout().flush();
        self.read_line();
    }

    fn get_choice(&mut self, max: usize) -> usize {
        print!("> (1-{}) ", max);
        let _ = io::stdout().flush();
        self.read_line().parse().unwrap_or(0)
    }

    fn get_free_text_input(&mut self, prompt: &str) -> String {
        print!("{} ", prompt);
        let _ = io::stdout().flush();
        self.read_line()
    }

    fn show_floor_info(&mut self, floor: u32, map_name: &str) {
        println!();
        println!("=== Floor {}: {} ===", floor, map_name);
    }

    fn show_player_status(&mut self, player: &Player) {
        let stats = &player.stats;
        println!(
            "{}  HP {}/{}  AP {}/{}  ATK {}  DEF {}  AGI {}  Gold {}",
            player.name,
            stats.hp,
            stats.max_hp,
            stats.ap,
            stats.max_ap,
            stats.attack,
            stats.defense,
            stats.agility,
            stats.gold
        );
        if !player.inventory.is_empty() {
            let items: Vec<&str> = player
                .inventory
                .iter()
                .map(|id| self.registries.items.display_name(id))
                .collect();
            println!("  Items: {}", items.join(", "));
        }
        if !player.status_effects.is_empty() {
            let statuses: Vec<&str> = player
                .status_effects
                .iter()
                .map(|s| {
                    self.registries
                        .statuses
                        .get(&s.id)
                        .map_or(s.id.as_str(), |def| def.name.as_str())
                })
                .collect();
            println!("  Status: {}", statuses.join(", "));
        }
    }
}

fn load_characters(dir: &Path) -> Result<MemoryCharacterStore, Box<dyn std::error::Error>> {
    let mut store = MemoryCharacterStore::new();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("ron"))
        .collect();
    paths.sort();
    for path in paths {
        let contents = std::fs::read_to_string(&path)?;
        let player: Player = ron::from_str(&contents)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        log::debug!("loaded character '{}' from {}", player.id, path.display());
        store.insert(player);
    }
    Ok(store)
}

fn run(args: &Args) -> Result<CampaignOutcome, Box<dyn std::error::Error>> {
    let seed = args
        .seed
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().unsigned_abs());
    log::info!("seed {}", seed);

    let graveyard = match &args.graveyard {
        Some(path) => Graveyard::load(path)?,
        None => Graveyard::new(),
    };
    let characters = match &args.characters {
        Some(dir) => load_characters(dir)?,
        None => MemoryCharacterStore::new(),
    };

    let library = ContentLibrary::load_dir(&args.content)?;
    let registries = Registries::from_loader(&library);
    let mut engine = CampaignEngine::builder(ConsolePresenter::new(registries))
        .seed(seed)
        .with_content(library)
        .with_characters(characters)
        .with_graveyard(graveyard)
        .build()?;

    let outcome = match engine.start_with_selection(&args.scenario) {
        Err(CampaignError::NoCharacters) => {
            let name = engine
                .presenter_mut()
                .get_free_text_input("No saved characters. Name your adventurer:");
            let name = if name.is_empty() { "Wanderer".to_string() } else { name };
            engine.start_with_player(Player::new("wanderer", name), &args.scenario)?
        }
        other => other?,
    };

    if let Some(path) = &args.graveyard {
        engine.graveyard().save(path)?;
    }
    Ok(outcome)
}

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    match run(&args) {
        Ok(outcome) => {
            log::info!("finished: {:?}", outcome);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
