//! Instrument directory: the holder's selectable cards and the selection.
//!
//! State lives in one [`DirectorySnapshot`] published through a `watch`
//! channel. Every transition replaces the snapshot in a single
//! `send_modify`/`send_if_modified`, so no reader can observe the
//! selected card and its account id out of step.
//!
//! Loads are versioned by a generation counter held inside the snapshot.
//! A load whose generation is no longer current when its gateway call
//! returns is discarded.

use std::sync::Arc;

use tokio::sync::watch;

use crate::core::*;
use crate::gateway::Gateway;

/// Directory lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadState {
    /// Nothing requested yet, or cleared.
    #[default]
    Idle,
    /// A load is in flight.
    Loading,
    /// The last load succeeded.
    Loaded,
    /// The last load failed; see [`DirectorySnapshot::error`].
    Error,
}

/// The selected card together with the account it implies.
///
/// Only constructible from an instrument, so the pair cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    instrument: Instrument,
    account_id: AccountId,
}

impl Selection {
    /// Select `instrument`; its account id follows from it.
    pub fn of(instrument: Instrument) -> Self {
        let account_id = instrument.account_id.clone();
        Self {
            instrument,
            account_id,
        }
    }

    /// The selected card.
    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Id of the selected card.
    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument.instrument_id
    }

    /// Account of the selected card.
    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }
}

/// Immutable view of the directory at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectorySnapshot {
    /// Normalized document of the holder these cards belong to.
    pub holder: Option<String>,
    /// Where the most recent load stands.
    pub load_state: LoadState,
    /// Selectable cards (`status == Normal`), in backend order.
    pub instruments: Vec<Instrument>,
    /// Selected card, always one of `instruments`.
    pub selection: Option<Selection>,
    /// Error of the most recent failed load. Stale instruments may remain.
    pub error: Option<ApiError>,
    generation: u64,
}

impl DirectorySnapshot {
    /// Selected card, if any.
    pub fn selected_instrument(&self) -> Option<&Instrument> {
        self.selection.as_ref().map(Selection::instrument)
    }

    /// Account of the selected card, if any.
    pub fn selected_account_id(&self) -> Option<&AccountId> {
        self.selection.as_ref().map(Selection::account_id)
    }

    /// Load generation this snapshot belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `id` is among the selectable cards.
    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.instruments.iter().any(|i| &i.instrument_id == id)
    }

    /// Keep the current selection if its card is still present (taking
    /// the fresh object), otherwise fall back to the first card.
    fn reconcile_selection(&mut self) {
        let kept = self.selection.as_ref().and_then(|s| {
            self.instruments
                .iter()
                .find(|i| i.instrument_id == *s.instrument_id())
                .cloned()
        });
        self.selection = kept
            .or_else(|| self.instruments.first().cloned())
            .map(Selection::of);
    }
}

/// Whether a load's result was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The directory now reflects this load (Loaded or Error).
    Applied(LoadState),
    /// A newer load or a `clear()` started meanwhile; the result was dropped.
    Superseded,
}

/// Cards of one holder plus the single selected card.
pub struct InstrumentDirectory {
    gateway: Arc<Gateway>,
    state: watch::Sender<DirectorySnapshot>,
}

impl InstrumentDirectory {
    /// Empty directory in [`LoadState::Idle`].
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let (state, _) = watch::channel(DirectorySnapshot::default());
        Self { gateway, state }
    }

    /// Current state.
    pub fn snapshot(&self) -> DirectorySnapshot {
        self.state.borrow().clone()
    }

    /// Observe every published state.
    pub fn subscribe(&self) -> watch::Receiver<DirectorySnapshot> {
        self.state.subscribe()
    }

    /// Fetch the cards of `document` and replace the directory contents.
    ///
    /// A different holder than the current one clears everything first.
    /// On failure the error is stored and the previous cards of the same
    /// holder stay visible.
    pub async fn load_for_holder(&self, document: &str) -> LoadOutcome {
        let holder = normalize_tax_id(document);
        let mut generation = 0;
        self.state.send_modify(|s| {
            if s.holder.as_deref() != Some(holder.as_str()) {
                s.instruments.clear();
                s.selection = None;
                s.holder = Some(holder.clone());
            }
            s.generation += 1;
            s.load_state = LoadState::Loading;
            s.error = None;
            generation = s.generation;
        });
        tracing::debug!(generation, "directory load started");

        let result = self.gateway.list_instruments_by_holder(&holder).await;
        self.apply_load(generation, result)
    }

    /// Reload the current holder. `None` when no holder was ever loaded.
    pub async fn refresh(&self) -> Option<LoadOutcome> {
        let holder = self.state.borrow().holder.clone()?;
        Some(self.load_for_holder(&holder).await)
    }

    fn apply_load(&self, generation: u64, result: ApiResult<Vec<Instrument>>) -> LoadOutcome {
        let mut outcome = LoadOutcome::Superseded;
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            match &result {
                Ok(all) => {
                    s.instruments = all.iter().filter(|i| i.is_selectable()).cloned().collect();
                    s.reconcile_selection();
                    s.load_state = LoadState::Loaded;
                    s.error = None;
                }
                Err(e) => {
                    s.load_state = LoadState::Error;
                    s.error = Some(e.clone());
                }
            }
            outcome = LoadOutcome::Applied(s.load_state);
            true
        });

        match (&outcome, &result) {
            (LoadOutcome::Superseded, _) => {
                tracing::debug!(generation, "discarding superseded directory load");
            }
            (_, Ok(all)) => {
                tracing::info!(generation, total = all.len(), "directory loaded");
            }
            (_, Err(e)) => {
                tracing::warn!(generation, code = e.code(), "directory load failed");
            }
        }
        outcome
    }

    /// Select a card by id. Returns `false` (and changes nothing) if it is
    /// not in the current set.
    pub fn select(&self, instrument_id: &InstrumentId) -> bool {
        let mut found = false;
        self.state.send_if_modified(|s| {
            let Some(instrument) = s
                .instruments
                .iter()
                .find(|i| &i.instrument_id == instrument_id)
                .cloned()
            else {
                return false;
            };
            found = true;
            let next = Selection::of(instrument);
            if s.selection.as_ref() == Some(&next) {
                return false;
            }
            s.selection = Some(next);
            true
        });
        if found {
            tracing::debug!(instrument_id = %instrument_id, "instrument selected");
        }
        found
    }

    /// Replace one card after a write (activation, block, contactless...).
    ///
    /// A card that is no longer `Normal` leaves the set; if it was
    /// selected, selection falls back to the first remaining card. Cards
    /// not in the set are ignored. Returns whether anything changed.
    pub fn apply_update(&self, instrument: Instrument) -> bool {
        self.state.send_if_modified(|s| {
            let Some(pos) = s
                .instruments
                .iter()
                .position(|i| i.instrument_id == instrument.instrument_id)
            else {
                return false;
            };
            if s.instruments[pos] == instrument {
                return false;
            }
            if instrument.is_selectable() {
                s.instruments[pos] = instrument;
            } else {
                s.instruments.remove(pos);
            }
            s.reconcile_selection();
            true
        })
    }

    /// Back to `Idle` with nothing loaded. In-flight loads are superseded.
    pub fn clear(&self) {
        self.state.send_modify(|s| {
            let generation = s.generation + 1;
            *s = DirectorySnapshot {
                generation,
                ..DirectorySnapshot::default()
            };
        });
        tracing::info!("directory cleared");
    }
}
