//! Descent Engine: a floor-by-floor roguelike campaign runtime.
//!
//! Drives a player through a fixed number of floors. Each floor picks a map,
//! runs entry and pool-drawn events from declarative content, and applies
//! their effects to persistent player state until the run ends in victory,
//! an alternate ending, or death.

pub mod core;
pub mod schema;
