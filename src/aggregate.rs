//! Balance aggregation across a holder's cards.
//!
//! A run fetches one balance per distinct account referenced by a
//! snapshot of instruments. Fetches are driven concurrently from the
//! calling task and fail independently: one failed account never stops
//! its siblings.
//!
//! Each run bumps a generation counter kept inside the published
//! [`AggregateSnapshot`]. Results are applied only while their run is
//! still current, so a newer run always wins over a slower older one.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use rust_decimal::Decimal;
use tokio::sync::watch;

use crate::core::*;
use crate::gateway::Gateway;

/// Per-account fetch status within one run.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountStatus {
    /// Fetch issued or queued, no result yet.
    Pending,
    /// Balance fetched.
    Resolved(BalanceSnapshot),
    /// Fetch failed; the account is excluded from the total.
    Failed(ApiError),
}

impl AccountStatus {
    /// `true` until the account's result arrives.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Aggregate view of the current run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateSnapshot {
    generation: u64,
    accounts: BTreeMap<AccountId, AccountStatus>,
}

impl AggregateSnapshot {
    /// Snapshot for a fresh run: every distinct account pending.
    pub fn start<'a>(generation: u64, accounts: impl IntoIterator<Item = &'a AccountId>) -> Self {
        Self {
            generation,
            accounts: accounts
                .into_iter()
                .map(|a| (a.clone(), AccountStatus::Pending))
                .collect(),
        }
    }

    /// Run this snapshot belongs to. `0` before any run.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Record one account's result.
    ///
    /// Ignored (returns `false`) if `generation` is not this run's or the
    /// account is not part of it. Applying the same result again leaves
    /// the snapshot unchanged.
    pub fn apply(
        &mut self,
        generation: u64,
        account_id: &AccountId,
        result: ApiResult<BalanceSnapshot>,
    ) -> bool {
        if generation != self.generation {
            return false;
        }
        let Some(slot) = self.accounts.get_mut(account_id) else {
            return false;
        };
        let next = match result {
            Ok(balance) => AccountStatus::Resolved(balance),
            Err(e) => AccountStatus::Failed(e),
        };
        if *slot == next {
            return false;
        }
        *slot = next;
        true
    }

    /// Sum of resolved balances.
    pub fn total(&self) -> Decimal {
        self.accounts
            .values()
            .filter_map(|s| match s {
                AccountStatus::Resolved(b) => Some(b.available),
                _ => None,
            })
            .sum()
    }

    /// Accounts whose balance arrived.
    pub fn resolved_count(&self) -> usize {
        self.count(|s| matches!(s, AccountStatus::Resolved(_)))
    }

    /// Accounts whose fetch failed.
    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, AccountStatus::Failed(_)))
    }

    /// Accounts still waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.count(AccountStatus::is_pending)
    }

    /// No account is pending. An empty run is complete.
    pub fn is_complete(&self) -> bool {
        self.pending_count() == 0
    }

    /// Status of one account, `None` if it is not part of this run.
    pub fn status(&self, account_id: &AccountId) -> Option<&AccountStatus> {
        self.accounts.get(account_id)
    }

    /// Accounts in this run, in id order.
    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &AccountStatus)> {
        self.accounts.iter()
    }

    /// Number of distinct accounts in this run.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// `true` for a run over no accounts.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    fn count(&self, pred: impl Fn(&AccountStatus) -> bool) -> usize {
        self.accounts.values().filter(|s| pred(s)).count()
    }
}

/// How an aggregation run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every account of this run reached Resolved or Failed.
    Completed(AggregateSnapshot),
    /// A newer run started before this one finished. Its fetches still ran
    /// to the end, but none of their late results were applied.
    Superseded,
}

/// Distinct accounts of `instruments`, in first-seen order.
pub fn distinct_accounts(instruments: &[Instrument]) -> Vec<AccountId> {
    let mut seen = HashSet::new();
    let mut accounts = Vec::new();
    for instrument in instruments {
        if seen.insert(&instrument.account_id) {
            accounts.push(instrument.account_id.clone());
        }
    }
    accounts
}

/// Resolves the balances behind a list of cards.
pub struct BalanceAggregator {
    gateway: Arc<Gateway>,
    max_concurrent: usize,
    state: watch::Sender<AggregateSnapshot>,
}

impl BalanceAggregator {
    const DEFAULT_CONCURRENCY: usize = 8;

    /// Aggregator with the default concurrency bound and an empty snapshot.
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let (state, _) = watch::channel(AggregateSnapshot::default());
        Self {
            gateway,
            max_concurrent: Self::DEFAULT_CONCURRENCY,
            state,
        }
    }

    /// Bound the number of balance fetches in flight.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    /// Aggregator configured from `config.max_concurrent_fetches`.
    pub fn from_config(gateway: Arc<Gateway>, config: &ClientConfig) -> Self {
        Self::new(gateway).with_max_concurrent(config.max_concurrent_fetches)
    }

    /// Current aggregate view.
    pub fn snapshot(&self) -> AggregateSnapshot {
        self.state.borrow().clone()
    }

    /// Observe every applied result.
    pub fn subscribe(&self) -> watch::Receiver<AggregateSnapshot> {
        self.state.subscribe()
    }

    /// Fetch every distinct account of `instruments` and publish results
    /// as they arrive.
    ///
    /// `instruments` is read once; later directory changes do not affect
    /// this run. Starting another run supersedes this one: every fetch of
    /// the old run is still issued and awaited, and results arriving after
    /// the newer run started are discarded at apply time.
    pub async fn run(&self, instruments: &[Instrument]) -> RunOutcome {
        let accounts = distinct_accounts(instruments);
        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = s.generation + 1;
            *s = AggregateSnapshot::start(generation, &accounts);
        });
        tracing::debug!(generation, accounts = accounts.len(), "aggregation started");

        let gateway = &self.gateway;
        let mut results = stream::iter(accounts)
            .map(|account_id| async move {
                let result = gateway.get_account_balance(&account_id).await;
                (account_id, result)
            })
            .buffer_unordered(self.max_concurrent);

        let mut discarded = 0usize;
        while let Some((account_id, result)) = results.next().await {
            if let Err(e) = &result {
                tracing::warn!(
                    generation,
                    account_id = %account_id,
                    code = e.code(),
                    "balance fetch failed"
                );
            }
            if !self.apply(generation, &account_id, result) && self.is_superseded(generation) {
                discarded += 1;
            }
        }

        let snapshot = self.snapshot();
        if snapshot.generation() != generation {
            tracing::debug!(generation, discarded, "aggregation superseded");
            return RunOutcome::Superseded;
        }
        tracing::info!(
            generation,
            resolved = snapshot.resolved_count(),
            failed = snapshot.failed_count(),
            total = %snapshot.total(),
            "aggregation complete"
        );
        RunOutcome::Completed(snapshot)
    }

    /// Apply one result to the published snapshot if its run is current.
    pub fn apply(
        &self,
        generation: u64,
        account_id: &AccountId,
        result: ApiResult<BalanceSnapshot>,
    ) -> bool {
        self.state
            .send_if_modified(|s| s.apply(generation, account_id, result))
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.state.borrow().generation() != generation
    }
}
