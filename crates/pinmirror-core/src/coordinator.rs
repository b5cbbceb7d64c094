//! Run coordinator: one full, sequential mirroring pass.
//!
//! ```text
//! Idle → FetchingEvents → Reconciling → Mirroring → Checkpointing → Idle
//! ```
//!
//! The checkpoint is written once, after every name has been mirrored, and
//! advances to the head observed at the start of the pass regardless of
//! per-item failures. Nothing is resumable mid-pass: a crash before
//! `Checkpointing` reprocesses the whole range next time.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::checkpoint::CheckpointManager;
use crate::error::RunError;
use crate::mirror::MirrorEngine;
use crate::reconcile::Reconciler;
use crate::report::RunReport;
use crate::source::{EventSource, UpdateDecoder};
use crate::types::{ChangeEvent, FetchedEvent};

/// Phase of the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Idle,
    FetchingEvents,
    Reconciling,
    Mirroring,
    Checkpointing,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FetchingEvents => write!(f, "fetching-events"),
            Self::Reconciling => write!(f, "reconciling"),
            Self::Mirroring => write!(f, "mirroring"),
            Self::Checkpointing => write!(f, "checkpointing"),
        }
    }
}

/// Wires the event source, decoder, mirror engine and checkpoint together.
pub struct RunCoordinator {
    source: Arc<dyn EventSource>,
    decoder: Arc<dyn UpdateDecoder>,
    engine: MirrorEngine,
    checkpoint: CheckpointManager,
    phase: RunPhase,
}

impl RunCoordinator {
    pub fn new(
        source: Arc<dyn EventSource>,
        decoder: Arc<dyn UpdateDecoder>,
        engine: MirrorEngine,
        checkpoint: CheckpointManager,
    ) -> Self {
        Self {
            source,
            decoder,
            engine,
            checkpoint,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run one pass and return its report.
    ///
    /// Fails only if the mirror root, the checkpoint, the chain head or the
    /// event list cannot be read, or the final checkpoint cannot be saved.
    pub async fn run(&mut self) -> Result<RunReport, RunError> {
        let result = self.run_pass().await;
        self.enter(RunPhase::Idle);
        result
    }

    async fn run_pass(&mut self) -> Result<RunReport, RunError> {
        let base_dir = self.engine.settings().base_dir.clone();
        info!(path = %base_dir, "preparing mirror root");
        self.engine
            .prepare()
            .await
            .map_err(|source| RunError::MirrorRoot {
                path: base_dir,
                source,
            })?;

        let from = self
            .checkpoint
            .load_block()
            .await
            .map_err(RunError::CheckpointLoad)?;

        self.enter(RunPhase::FetchingEvents);
        let head = self.source.current_height().await?;
        if from > head {
            warn!(checkpoint = from, head, "checkpoint is ahead of the chain head");
        }
        info!(from, to = head, "querying change events");
        let events = self.source.query_events(from, head).await?;
        let fetched = self.fetch_payloads(events).await;

        self.enter(RunPhase::Reconciling);
        let reconciliation = Reconciler::new(self.decoder.as_ref()).reconcile(fetched);
        info!(
            events = reconciliation.total_events,
            sites = reconciliation.latest.len(),
            overridden = reconciliation.overridden,
            decode_failed = reconciliation.decode_failed(),
            "reconciled events"
        );

        self.enter(RunPhase::Mirroring);
        let mut report = RunReport::from_reconciliation(from, head, &reconciliation);
        let total = reconciliation.latest.len();
        for (i, update) in reconciliation.latest.into_iter().enumerate() {
            let result = self.engine.mirror(&update).await;
            debug!(
                progress = %format!("{}/{total}", i + 1),
                site = %result.name,
                outcome = ?result.outcome,
                "processed site"
            );
            report = report.record(result);
        }

        self.enter(RunPhase::Checkpointing);
        self.checkpoint
            .save_block(head)
            .await
            .map_err(|source| RunError::CheckpointSave {
                block: head,
                source,
            })?;

        info!(
            mirrored = report.mirrored,
            failed = report.failed,
            up_to_block = head,
            "mirror complete"
        );
        Ok(report)
    }

    /// Fetch each event's transaction payload. A failed fetch is kept with
    /// its event and counted as a decode failure downstream.
    async fn fetch_payloads(&self, events: Vec<ChangeEvent>) -> Vec<FetchedEvent> {
        let mut fetched = Vec::with_capacity(events.len());
        for event in events {
            let payload = self.source.transaction_payload(&event.tx_ref).await;
            fetched.push(FetchedEvent { event, payload });
        }
        fetched
    }

    fn enter(&mut self, phase: RunPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "run phase");
            self.phase = phase;
        }
    }
}
