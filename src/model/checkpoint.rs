use crate::basis::{Lot, LotKey};
use crate::model::symbol::Symbol;
use crate::util::fifo::FIFO;
use chrono::{DateTime, Utc};
use ron::{de::SpannedError, ser::PrettyConfig};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use thiserror::Error;

pub const CHECKPOINT_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Unable to deserialize")]
    Deserialize(#[from] SpannedError),

    #[error("Unable to serialize")]
    Serialize(#[from] ron::Error),

    #[error("Expected version `{CHECKPOINT_VERSION}`, found `{0}`")]
    Version(String),
}

/// Header for checkpoints.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CheckpointHeader {
    /// Checkpoint version.
    pub semver: String,

    /// Timestamp of the latest transaction applied before the checkpoint was taken.
    pub latest_row_time: Option<DateTime<Utc>>,
}

impl Default for CheckpointHeader {
    fn default() -> Self {
        Self {
            semver: CHECKPOINT_VERSION.to_string(),
            latest_row_time: None,
        }
    }
}

/// Open lots carried from one reporting year into the next.
#[derive(Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct LotsCheckpoint {
    header: CheckpointHeader,
    accounts: Vec<CheckpointAccount>,
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
struct CheckpointAccount {
    account: String,
    asset: Symbol,
    lots: Vec<Lot>,
}

impl LotsCheckpoint {
    /// Snapshot the open lots of a ledger.
    pub fn new(
        lots: &BTreeMap<LotKey, FIFO<Lot>>,
        latest_row_time: Option<DateTime<Utc>>,
    ) -> Self {
        let accounts = lots
            .iter()
            .map(|(key, lots)| CheckpointAccount {
                account: key.account.clone(),
                asset: key.asset.clone(),
                lots: lots.iter().cloned().collect(),
            })
            .collect();

        Self {
            header: CheckpointHeader {
                latest_row_time,
                ..Default::default()
            },
            accounts,
        }
    }

    pub fn header(&self) -> &CheckpointHeader {
        &self.header
    }

    /// Number of lots held across all accounts.
    pub fn len(&self) -> usize {
        self.accounts.iter().map(|account| account.lots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into `(key, lot)` pairs, suitable for [`Ledger::with_lots`].
    ///
    /// [`Ledger::with_lots`]: crate::basis::Ledger::with_lots
    pub fn into_lots(self) -> impl Iterator<Item = (LotKey, Lot)> {
        self.accounts.into_iter().flat_map(|entry| {
            let key = LotKey::new(entry.account, entry.asset);

            entry
                .lots
                .into_iter()
                .map(move |lot| (key.clone(), lot))
        })
    }

    /// Parse a checkpoint, rejecting any other checkpoint version.
    pub fn from_ron(serialized: &str) -> Result<Self, CheckpointError> {
        let checkpoint: Self = ron::from_str(serialized)?;

        // Validate header.
        if checkpoint.header.semver == CHECKPOINT_VERSION {
            Ok(checkpoint)
        } else {
            Err(CheckpointError::Version(checkpoint.header.semver))
        }
    }

    pub fn to_ron(&self) -> Result<String, CheckpointError> {
        Ok(ron::ser::to_string_pretty(self, PrettyConfig::default())?)
    }

    /// Load a checkpoint from the given path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let serialized = std::fs::read_to_string(path)?;

        Self::from_ron(&serialized)
    }

    /// Save a checkpoint to the given path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        std::fs::write(path, self.to_ron()?)?;

        Ok(())
    }
}
