//! Run report: the outcome counters of one pass, folded from per-item results.

use serde::Serialize;
use std::fmt;

use crate::mirror::{MirrorOutcome, MirrorResult};
use crate::reconcile::{DecodeFailure, Reconciliation};

/// Aggregate result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// First block queried (the checkpoint the run started from).
    pub from_block: u64,
    /// Chain head at the start of the run; the new checkpoint.
    pub up_to_block: u64,
    pub total_events: u64,
    /// `decode_failed + mirror_failed`.
    pub failed: u64,
    pub decode_failed: u64,
    pub mirror_failed: u64,
    pub mirrored: u64,
    pub too_large: u64,
    pub overridden: u64,
    /// Events without fields plus latest updates without a `content` field.
    pub no_content: u64,
    pub alt_content: u64,
    pub decode_failures: Vec<DecodeFailure>,
    pub items: Vec<MirrorResult>,
}

impl RunReport {
    /// Start a report from the reconciliation counters.
    pub fn from_reconciliation(from_block: u64, up_to_block: u64, rec: &Reconciliation) -> Self {
        Self {
            from_block,
            up_to_block,
            total_events: rec.total_events,
            failed: rec.decode_failed(),
            decode_failed: rec.decode_failed(),
            overridden: rec.overridden,
            no_content: rec.no_content,
            decode_failures: rec.failures.clone(),
            ..Default::default()
        }
    }

    /// Fold one mirror result into the report.
    pub fn record(mut self, result: MirrorResult) -> Self {
        match &result.outcome {
            MirrorOutcome::Mirrored { .. } => self.mirrored += 1,
            MirrorOutcome::TooLarge { .. } => self.too_large += 1,
            MirrorOutcome::AltContent => self.alt_content += 1,
            MirrorOutcome::NoContent => self.no_content += 1,
            MirrorOutcome::Failed { .. } => {
                self.mirror_failed += 1;
                self.failed += 1;
            }
        }
        self.items.push(result);
        self
    }

    /// Names whose mirror failed, with the reason.
    pub fn failed_items(&self) -> impl Iterator<Item = (&str, &str)> {
        self.items.iter().filter_map(|item| match &item.outcome {
            MirrorOutcome::Failed { reason } => Some((item.name.as_str(), reason.as_str())),
            _ => None,
        })
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data updates:           {}", self.total_events)?;
        writeln!(f, "Sites failed:           {}", self.failed)?;
        writeln!(f, "Sites mirrored:         {}", self.mirrored)?;
        writeln!(f, "Sites too large:        {}", self.too_large)?;
        writeln!(f, "Sites overridden:       {}", self.overridden)?;
        writeln!(f, "Sites without content:  {}", self.no_content)?;
        writeln!(f, "Sites with alt-content: {}", self.alt_content)?;
        write!(f, "Mirrored up to block: #{}", self.up_to_block)
    }
}
