pub mod allocate;
pub mod build;
pub mod classify;
pub mod consolidate;
pub mod model;
pub mod pipeline;
pub mod profile;

// Re-export the working set most adapters need.
pub use crate::allocate::{allocate, is_aggregate_total};
pub use crate::classify::{KindMap, TxnKind};
pub use crate::consolidate::{Consolidator, OrderGroup};
pub use crate::model::{Amount, Charge, Posting, Row, Transaction};
pub use crate::pipeline::{import_rows, Diagnostics, ImportResult};
pub use crate::profile::{AccountTemplates, BrokerProfile};

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    /// The file does not match the shape this adapter expects (bad header,
    /// account-number mismatch). The adapter declines the file; another may
    /// still claim it. Other files in the batch are unaffected.
    #[error("{importer}: file does not match expected layout: {reason}")]
    Format { importer: &'static str, reason: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
}

impl ImportError {
    pub fn format(importer: &'static str, reason: impl Into<String>) -> Self {
        ImportError::Format {
            importer,
            reason: reason.into(),
        }
    }
}

/// One statement-format adapter: a cheap structural check plus extraction.
///
/// `identify` returning false means the adapter declines the file so a
/// different adapter can be tried; `extract` on a claimed file that turns
/// out malformed is an `ImportError::Format`.
pub trait StatementImporter {
    fn name(&self) -> &'static str;
    fn identify(&self, path: &Path) -> bool;
    fn extract(&self, path: &Path) -> Result<ImportResult, ImportError>;
}
