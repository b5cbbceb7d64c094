//! Event reconciler: collapses an ordered event batch into the latest
//! update per name.
//!
//! The reduction is explicit: every event is classified into a
//! [`ReconcileStep`] and folded into a [`Reconciliation`]. For a name seen
//! more than once, the update with the highest block number wins; on equal
//! block numbers the later-delivered event wins, since delivery order within
//! a block is log order. Every update that loses counts as overridden.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::source::UpdateDecoder;
use crate::types::{FetchedEvent, ParsedUpdate, TxRef};

// ─── LatestState ──────────────────────────────────────────────────────────────

/// What happened when an update was applied to [`LatestState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// First update for this name.
    Inserted,
    /// Replaced an update from the same or an earlier block.
    Replaced,
    /// Older than the stored update; dropped.
    Discarded,
}

impl Applied {
    /// Returns `true` if some update for the name lost.
    pub fn overrides(self) -> bool {
        !matches!(self, Self::Inserted)
    }
}

/// The single most recent update per name, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestState {
    entries: IndexMap<String, ParsedUpdate>,
}

impl LatestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `update`, keeping the highest-block update for its name.
    pub fn apply(&mut self, update: ParsedUpdate) -> Applied {
        match self.entries.get_mut(&update.name) {
            None => {
                self.entries.insert(update.name.clone(), update);
                Applied::Inserted
            }
            Some(current) if update.block_number >= current.block_number => {
                *current = update;
                Applied::Replaced
            }
            Some(_) => Applied::Discarded,
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParsedUpdate> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParsedUpdate> {
        self.entries.values()
    }
}

impl IntoIterator for LatestState {
    type Item = ParsedUpdate;
    type IntoIter = indexmap::map::IntoValues<String, ParsedUpdate>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_values()
    }
}

// ─── Reconciliation ───────────────────────────────────────────────────────────

/// Context for an event whose payload could not be turned into an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeFailure {
    /// Position of the event in the batch (0-based).
    pub index: usize,
    pub tx_ref: TxRef,
    pub block_number: u64,
    pub reason: String,
}

/// Classification of a single event.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileStep {
    Update(ParsedUpdate),
    /// Decoded, but carried no fields.
    NoContent { name: String },
    Failed(DecodeFailure),
}

/// Output of reconciling one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub latest: LatestState,
    pub failures: Vec<DecodeFailure>,
    pub no_content: u64,
    pub overridden: u64,
    pub total_events: u64,
}

impl Reconciliation {
    pub fn decode_failed(&self) -> u64 {
        self.failures.len() as u64
    }

    /// Fold one classified event into the result.
    pub fn absorb(mut self, step: ReconcileStep) -> Self {
        self.total_events += 1;
        match step {
            ReconcileStep::Update(update) => {
                if self.latest.apply(update).overrides() {
                    self.overridden += 1;
                }
            }
            ReconcileStep::NoContent { .. } => self.no_content += 1,
            ReconcileStep::Failed(failure) => self.failures.push(failure),
        }
        self
    }
}

// ─── Reconciler ───────────────────────────────────────────────────────────────

/// Turns fetched events into a [`Reconciliation`] using an [`UpdateDecoder`].
pub struct Reconciler<'a> {
    decoder: &'a dyn UpdateDecoder,
}

impl<'a> Reconciler<'a> {
    pub fn new(decoder: &'a dyn UpdateDecoder) -> Self {
        Self { decoder }
    }

    /// Reconcile a batch in delivery order. Never fails as a whole.
    pub fn reconcile(&self, events: Vec<FetchedEvent>) -> Reconciliation {
        let total = events.len();
        events
            .into_iter()
            .enumerate()
            .map(|(index, fetched)| {
                let step = self.classify(index, fetched);
                if let ReconcileStep::Update(u) = &step {
                    debug!(
                        progress = %format!("{}/{total}", index + 1),
                        site = %u.name,
                        block = u.block_number,
                        "found data update"
                    );
                }
                step
            })
            .fold(Reconciliation::default(), Reconciliation::absorb)
    }

    /// Classify one event.
    pub fn classify(&self, index: usize, fetched: FetchedEvent) -> ReconcileStep {
        let FetchedEvent { event, payload } = fetched;
        let fail = |reason: String| {
            warn!(
                index,
                tx = %event.tx_ref,
                block = event.block_number,
                %reason,
                "skipping undecodable event"
            );
            ReconcileStep::Failed(DecodeFailure {
                index,
                tx_ref: event.tx_ref.clone(),
                block_number: event.block_number,
                reason,
            })
        };

        let payload = match payload {
            Ok(p) => p,
            Err(e) => return fail(format!("transaction unavailable: {e}")),
        };
        let decoded = match self.decoder.decode(&payload) {
            Ok(d) => d,
            Err(e) => return fail(e.to_string()),
        };

        let update = ParsedUpdate::new(decoded, event.block_number);
        if update.has_no_fields() {
            ReconcileStep::NoContent { name: update.name }
        } else {
            ReconcileStep::Update(update)
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
