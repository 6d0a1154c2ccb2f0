/// Event pool draws without replacement.
///
/// Each session keeps one deck for the active pool. A deck is a shuffled
/// copy of the pool's drawable event ids; ids are taken from the front until
/// it runs dry, then it is rebuilt and reshuffled. Every pool event therefore
/// runs once per cycle before any repeats. Switching to a different pool
/// discards whatever was left of the old deck.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rustc_hash::FxHashSet;
use std::collections::VecDeque;

use crate::core::interpreter::{EventOrigin, EventRunner};
use crate::core::ports::ContentLoader;
use crate::core::session::SessionState;
use crate::schema::content::StageConfig;

/// Filler event id used when a scenario does not name one.
pub const DEFAULT_FILLER_EVENT: &str = "filler";

/// The undrawn remainder of the active pool for the current cycle.
#[derive(Debug, Clone, Default)]
pub struct EventDeck {
    pool_id: Option<String>,
    remaining: VecDeque<String>,
}

impl EventDeck {
    pub fn pool_id(&self) -> Option<&str> {
        self.pool_id.as_deref()
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn remaining(&self) -> impl Iterator<Item = &str> {
        self.remaining.iter().map(String::as_str)
    }

    /// Make `pool_id` the active pool. Switching pools clears the deck.
    /// Returns true if the pool changed.
    pub fn adopt(&mut self, pool_id: &str) -> bool {
        if self.pool_id.as_deref() == Some(pool_id) {
            return false;
        }
        if let Some(previous) = &self.pool_id {
            log::debug!(
                "event pool '{}' -> '{}', dropping {} undrawn events",
                previous,
                pool_id,
                self.remaining.len()
            );
        }
        self.pool_id = Some(pool_id.to_string());
        self.remaining.clear();
        true
    }

    /// Draw the next id from `pool_id`, rebuilding from `candidates` when
    /// the deck is empty. Duplicate candidates are collapsed.
    pub fn draw_from<F>(&mut self, pool_id: &str, rng: &mut StdRng, candidates: F) -> Option<String>
    where
        F: FnOnce() -> Vec<String>,
    {
        self.adopt(pool_id);
        if self.remaining.is_empty() {
            let mut ids = candidates();
            let mut seen = FxHashSet::default();
            ids.retain(|id| seen.insert(id.clone()));
            ids.shuffle(rng);
            log::debug!("rebuilt deck for pool '{}' with {} events", pool_id, ids.len());
            self.remaining = ids.into();
        }
        self.remaining.pop_front()
    }
}

/// Drawable event ids of a pool on the given floor, in pool order.
pub fn pool_candidates(content: &dyn ContentLoader, pool_id: &str, floor: u32) -> Vec<String> {
    let Some(pool) = content.load_pool(pool_id) else {
        log::warn!("event pool '{}' not found", pool_id);
        return Vec::new();
    };
    pool.events
        .iter()
        .filter(|id| match content.load_event(id) {
            Some(event) => event.drawable_on(floor),
            None => {
                log::warn!("pool '{}' lists missing event '{}'", pool_id, id);
                false
            }
        })
        .cloned()
        .collect()
}

/// Draw the next id that is still drawable on `floor`.
///
/// Ids left in the deck were filtered on the floor the deck was built, so
/// each one is checked again here. Stale ids are discarded; if the deck runs
/// dry the rebuild uses the current floor. Returns `None` only when the pool
/// has nothing drawable on this floor.
pub fn draw_drawable(
    deck: &mut EventDeck,
    content: &dyn ContentLoader,
    pool_id: &str,
    floor: u32,
    rng: &mut StdRng,
) -> Option<String> {
    loop {
        let rebuilds = deck.pool_id() != Some(pool_id) || deck.is_empty();
        let id = deck.draw_from(pool_id, rng, || pool_candidates(content, pool_id, floor))?;
        if content.load_event(&id).is_some_and(|e| e.drawable_on(floor)) {
            return Some(id);
        }
        log::debug!("discarding '{}' from pool '{}': not drawable on floor {}", id, pool_id, floor);
        if rebuilds {
            return None;
        }
    }
}

/// Pick the floor's event from the stage's pool and run it.
///
/// Falls back to the filler event when the pool has nothing drawable, and
/// does nothing when neither exists. A drawn id is consumed even if it
/// fails to run. Returns the id that was triggered.
pub fn select_and_trigger_event(
    runner: &mut EventRunner<'_>,
    stage: &StageConfig,
    session: &mut SessionState,
    filler_event: Option<&str>,
) -> Option<String> {
    let Some(pool_id) = stage.event_pool.as_deref() else {
        log::debug!("floor {} has no event pool", session.floor);
        return None;
    };

    let content = runner.content;
    let floor = session.floor;
    let drawn = draw_drawable(&mut session.deck, content, pool_id, floor, runner.rng);

    let event_id = match drawn {
        Some(id) => id,
        None => {
            let filler = filler_event.unwrap_or(DEFAULT_FILLER_EVENT);
            if content.load_event(filler).is_none() {
                log::info!(
                    "pool '{}' is empty and no filler event '{}' exists; floor {} has no event",
                    pool_id,
                    filler,
                    floor
                );
                return None;
            }
            log::debug!("pool '{}' is empty, running filler '{}'", pool_id, filler);
            filler.to_string()
        }
    };

    if let Err(e) = runner.trigger(session, &event_id, EventOrigin::Pool) {
        log::warn!("floor {} event skipped: {}", floor, e);
    }
    Some(event_id)
}
