//! Outcome of a reconciliation run.

use chrono::{DateTime, Utc};

use crate::command::MutationCommand;
use crate::error::{ConfigurationError, ProviderError};

/// A non-fatal problem found during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A primary names a failover group that was not listed. The pair is dropped.
    MissingFailoverTarget { primary: String, failover: String },

    /// Bad tagging or conflicting claims. The affected pair or resource is skipped.
    Configuration(ConfigurationError),

    /// A provider call after the catalog fetch failed. Only its scope is skipped.
    Provider { scope: String, error: ProviderError },
}

impl From<ConfigurationError> for Diagnostic {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub groups: usize,
    pub pairs: usize,
    /// Commands sent to the provider (or only logged, in dry-run mode).
    pub issued: Vec<MutationCommand>,
    pub failed: Vec<(MutationCommand, ProviderError)>,
    pub diagnostics: Vec<Diagnostic>,
    pub dry_run: bool,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            groups: 0,
            pairs: 0,
            issued: Vec::new(),
            failed: Vec::new(),
            diagnostics: Vec::new(),
            dry_run,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Returns true if nothing needed to change.
    pub fn is_converged(&self) -> bool {
        self.issued.is_empty() && self.failed.is_empty()
    }

    pub fn missing_failover_targets(&self) -> impl Iterator<Item = (&str, &str)> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::MissingFailoverTarget { primary, failover } => {
                Some((primary.as_str(), failover.as_str()))
            }
            _ => None,
        })
    }
}
