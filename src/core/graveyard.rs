/// Graveyard ledger: who died, where, and whether fate allows a revival.
///
/// Records are keyed by character id and overwritten on repeated deaths.
/// A record can be spent on exactly one revival; a later death writes a
/// fresh record and makes the character eligible again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::core::ports::CharacterStore;
use crate::core::session::SessionState;
use crate::schema::player::{CharacterId, Player};

#[derive(Debug, Error)]
pub enum GraveyardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraveRecord {
    pub player_id: CharacterId,
    pub name: String,
    pub fated: bool,
    pub cause: String,
    pub floor: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub revived: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graveyard {
    records: BTreeMap<CharacterId, GraveRecord>,
}

impl Graveyard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the player is marked for revival.
    pub fn check_fate(&self, player: &Player) -> bool {
        player.fated
    }

    /// Record a death, replacing any earlier record for the same character.
    pub fn record_loss(&mut self, player: &Player, cause: &str, floor: u32) -> &GraveRecord {
        log::info!(
            "graveyard: '{}' lost on floor {} ({})",
            player.name,
            floor,
            cause
        );
        let record = GraveRecord {
            player_id: player.id.clone(),
            name: player.name.clone(),
            fated: player.fated,
            cause: cause.to_string(),
            floor,
            timestamp: Utc::now(),
            revived: false,
        };
        self.records.insert(player.id.clone(), record);
        &self.records[&player.id]
    }

    /// Whether a revival would currently succeed for this id, ignoring
    /// whether the character store still has the character.
    pub fn can_revive(&self, id: &CharacterId) -> bool {
        self.records
            .get(id)
            .is_some_and(|record| record.fated && !record.revived)
    }

    /// Bring a fated character back into the session.
    ///
    /// Succeeds at most once per recorded death. On success the character is
    /// reloaded from the store, installed in the session, and the session's
    /// death is cleared so play continues on the same floor.
    pub fn revive(
        &mut self,
        id: &CharacterId,
        characters: &dyn CharacterStore,
        session: &mut SessionState,
    ) -> bool {
        if !self.can_revive(id) {
            log::debug!("'{}' cannot be revived", id);
            return false;
        }
        let Some(mut player) = characters.load_character(id) else {
            log::warn!("revival failed: character '{}' is no longer stored", id);
            return false;
        };
        if let Some(record) = self.records.get_mut(id) {
            record.revived = true;
        }
        // Returning characters need at least one hit point to continue.
        if player.stats.hp <= 0 {
            player.stats.hp = player.stats.max_hp.max(1);
        }
        log::info!("'{}' revived on floor {}", player.name, session.floor);
        session.player = player;
        session.clear_death();
        true
    }

    pub fn get(&self, id: &CharacterId) -> Option<&GraveRecord> {
        self.records.get(id)
    }

    /// All records in character-id order.
    pub fn records(&self) -> impl Iterator<Item = &GraveRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_ron(&self) -> Result<String, GraveyardError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    pub fn from_ron(input: &str) -> Result<Self, GraveyardError> {
        Ok(ron::from_str(input)?)
    }

    /// Load a ledger file. A missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self, GraveyardError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    pub fn save(&self, path: &Path) -> Result<(), GraveyardError> {
        std::fs::write(path, self.to_ron()?)?;
        log::debug!("graveyard saved to {}", path.display());
        Ok(())
    }
}
