/// Content Linter: checks a content directory for dangling references and
/// thin authoring.
///
/// Usage: content_linter <content_dir>

use clap::Parser;
use descent_engine::core::dialogue::keys;
use descent_engine::core::registry::ContentLibrary;
use descent_engine::schema::event::ScriptNode;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[command(name = "content_linter")]
#[command(about = "Validate campaign content packs")]
struct Args {
    /// Directory of content packs (*.ron)
    content_dir: PathBuf,

    /// Treat warnings as errors
    #[arg(long)]
    strict: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    let library = match ContentLibrary::load_dir(&args.content_dir) {
        Ok(library) => library,
        Err(e) => {
            eprintln!("ERROR: Failed to load content: {}", e);
            process::exit(1);
        }
    };

    println!("Loaded scenarios: {}", library.scenario_ids().join(", "));

    let errors: Vec<String> = library.validate().iter().map(|i| i.to_string()).collect();
    let warnings = lint_authoring(&library);

    println!("\n=== Content Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    let failed = !errors.is_empty() || (args.strict && !warnings.is_empty());
    process::exit(if failed { 1 } else { 0 });
}

/// Problems that do not break a run but usually mean unfinished content.
fn lint_authoring(library: &ContentLibrary) -> Vec<String> {
    let mut warnings = Vec::new();

    let mut pools: Vec<_> = library.pools().collect();
    pools.sort_by(|a, b| a.id.cmp(&b.id));
    for pool in pools {
        if pool.events.len() < 2 {
            warnings.push(format!(
                "pool '{}' has {} event(s); every floor will repeat it",
                pool.id,
                pool.events.len()
            ));
        }
    }

    let mut events: Vec<_> = library.events().collect();
    events.sort_by(|a, b| a.id.cmp(&b.id));
    for event in events {
        if event.script.is_empty() {
            warnings.push(format!("event '{}' has an empty script", event.id));
        }
        if let (Some(min), Some(max)) = (event.min_floor, event.max_floor) {
            if min > max {
                warnings.push(format!(
                    "event '{}' can never be drawn: min_floor {} > max_floor {}",
                    event.id, min, max
                ));
            }
        }
        if has_empty_choice(&event.script) {
            warnings.push(format!("event '{}' has a choice with no options", event.id));
        }
    }

    let mut personalities: Vec<_> = library.personalities().collect();
    personalities.sort_by(|a, b| a.id.cmp(&b.id));
    for personality in personalities {
        for key in [keys::DEATH, keys::SCREAM, keys::ATTACK] {
            if personality.lines_for(key).is_empty() {
                warnings.push(format!(
                    "personality '{}' has no '{}' lines",
                    personality.id, key
                ));
            }
        }
    }

    warnings
}

fn has_empty_choice(nodes: &[ScriptNode]) -> bool {
    nodes.iter().any(|node| match node {
        ScriptNode::Choice { options, .. } => {
            options.is_empty() || options.iter().any(|o| has_empty_choice(&o.nodes))
        }
        ScriptNode::Condition {
            then, otherwise, ..
        } => has_empty_choice(then) || has_empty_choice(otherwise),
        _ => false,
    })
}
