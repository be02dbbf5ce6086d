//! Deterministic in-memory backend used in fixture mode.
//!
//! Each method mirrors one endpoint, including the rules the real backend
//! enforces server-side (holder filtering, statement windows and paging,
//! funds checks). Writes replace stored instruments wholesale.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::core::*;

/// Fixture clock origin: 2024-06-15T12:00:00Z.
const FIXTURE_EPOCH_SECS: i64 = 1_718_452_800;

/// Holder document of the seeded individual customer.
pub const SEED_INDIVIDUAL: &str = "52998224725";
/// Holder document of the seeded company customer.
pub const SEED_COMPANY: &str = "11222333000181";
/// Password accepted for every seeded holder.
pub const SEED_PASSWORD: &str = "123456";

/// State of the simulated backend.
#[derive(Debug, Clone, Default)]
pub struct FixtureData {
    holders: BTreeMap<String, Vec<Instrument>>,
    balances: BTreeMap<AccountId, Decimal>,
    statements: HashMap<AccountId, Vec<StatementEntry>>,
    passwords: HashMap<String, String>,
    failing_accounts: HashMap<AccountId, ApiError>,
    failing_holders: HashMap<String, ApiError>,
    sequence: u64,
}

fn at(offset: Duration) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXTURE_EPOCH_SECS, 0).unwrap_or_default() + offset
}

/// Seed card builder: normal, activated, physical unless told otherwise.
struct SeedCard(Instrument);

impl SeedCard {
    fn new(id: &str, account: &str, holder: &str, last4: &str) -> Self {
        Self(Instrument {
            instrument_id: InstrumentId::new(id),
            account_id: AccountId::new(account),
            status: InstrumentStatus::Normal,
            stage: InstrumentStage::Activated,
            alias: None,
            masked_number: format!("**** **** **** {last4}"),
            holder_name: holder.to_string(),
            expiry: "09/29".to_string(),
            contactless_enabled: true,
            kind: InstrumentKind::Physical,
        })
    }

    fn status(mut self, status: InstrumentStatus) -> Self {
        self.0.status = status;
        self
    }

    fn stage(mut self, stage: InstrumentStage) -> Self {
        self.0.stage = stage;
        self
    }

    fn virtual_card(mut self) -> Self {
        self.0.kind = InstrumentKind::Virtual;
        self.0.contactless_enabled = false;
        self
    }

    fn alias(mut self, alias: &str) -> Self {
        self.0.alias = Some(alias.to_string());
        self
    }

    fn build(self) -> Instrument {
        self.0
    }
}

fn entry(
    id: &str,
    description: &str,
    amount: Decimal,
    direction: EntryDirection,
    days_ago: i64,
) -> StatementEntry {
    StatementEntry {
        entry_id: id.to_string(),
        description: description.to_string(),
        amount,
        direction,
        posted_at: at(Duration::days(-days_ago)),
    }
}

impl FixtureData {
    /// No holders, no accounts.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The canned data set served by default in fixture mode.
    pub fn seeded() -> Self {
        use InstrumentStage::*;
        use InstrumentStatus::*;

        let mut data = Self::empty();

        let ana = "ANA P SOUZA";
        data.add_holder(
            SEED_INDIVIDUAL,
            SEED_PASSWORD,
            vec![
                SeedCard::new("c-100", "acc-1", ana, "4821").alias("Main").build(),
                SeedCard::new("c-101", "acc-1", ana, "7310")
                    .virtual_card()
                    .alias("Online")
                    .build(),
                SeedCard::new("c-102", "acc-2", ana, "0094").status(Blocked).build(),
                SeedCard::new("c-103", "acc-3", ana, "5566")
                    .stage(Delivered)
                    .alias("Travel")
                    .build(),
                SeedCard::new("c-104", "acc-4", ana, "1200").status(Cancelled).build(),
            ],
        );
        let acme = "ACME COMERCIO LTDA";
        data.add_holder(
            SEED_COMPANY,
            SEED_PASSWORD,
            vec![
                SeedCard::new("c-200", "acc-10", acme, "9001").alias("Corporate").build(),
                SeedCard::new("c-201", "acc-10", acme, "3141").status(Expired).build(),
            ],
        );

        data.set_balance("acc-1", dec!(1520.75));
        data.set_balance("acc-2", dec!(310.00));
        data.set_balance("acc-3", dec!(0.00));
        data.set_balance("acc-4", dec!(12.30));
        data.set_balance("acc-10", dec!(98000.00));

        data.statements.insert(
            AccountId::new("acc-1"),
            vec![
                entry("e-1", "Salary", dec!(4200.00), EntryDirection::Credit, 14),
                entry("e-2", "Rent", dec!(1800.00), EntryDirection::Debit, 13),
                entry("e-3", "Supermarket", dec!(312.45), EntryDirection::Debit, 9),
                entry("e-4", "Pharmacy", dec!(48.90), EntryDirection::Debit, 6),
                entry("e-5", "Transfer received", dec!(150.00), EntryDirection::Credit, 3),
                entry("e-6", "Streaming subscription", dec!(39.90), EntryDirection::Debit, 1),
            ],
        );
        data.statements.insert(
            AccountId::new("acc-10"),
            vec![entry("e-100", "Supplier payment", dec!(12500.00), EntryDirection::Debit, 2)],
        );

        data
    }

    /// Register a holder with its cards and login password.
    pub fn add_holder(&mut self, document: &str, password: &str, instruments: Vec<Instrument>) {
        let document = normalize_tax_id(document);
        for instrument in &instruments {
            self.balances
                .entry(instrument.account_id.clone())
                .or_insert(Decimal::ZERO);
        }
        self.passwords.insert(document.clone(), password.to_string());
        self.holders.insert(document, instruments);
    }

    /// Set the available balance of `account`, creating it if needed.
    pub fn set_balance(&mut self, account: impl Into<AccountId>, available: Decimal) {
        self.balances.insert(account.into(), available);
    }

    /// Make every balance fetch for `account` fail with `error`.
    pub fn fail_account(&mut self, account: impl Into<AccountId>, error: ApiError) {
        self.failing_accounts.insert(account.into(), error);
    }

    /// Make card listing for `document` fail with `error`.
    pub fn fail_holder(&mut self, document: &str, error: ApiError) {
        self.failing_holders.insert(normalize_tax_id(document), error);
    }

    /// Remove all injected failures.
    pub fn heal(&mut self) {
        self.failing_accounts.clear();
        self.failing_holders.clear();
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{prefix}-{:04}", self.sequence)
    }

    fn now(&self) -> DateTime<Utc> {
        at(Duration::minutes(self.sequence as i64))
    }

    // --- reads ---

    /// Every card of a holder, any status. Unknown holders have none.
    pub fn instruments_for_holder(&self, document: &str) -> ApiResult<Vec<Instrument>> {
        let document = normalize_tax_id(document);
        if let Some(err) = self.failing_holders.get(&document) {
            return Err(err.clone());
        }
        Ok(self.holders.get(&document).cloned().unwrap_or_default())
    }

    /// One card by id.
    pub fn instrument(&self, id: &InstrumentId) -> ApiResult<Instrument> {
        self.holders
            .values()
            .flatten()
            .find(|i| &i.instrument_id == id)
            .cloned()
            .ok_or_else(|| ApiError::not_found("card"))
    }

    /// Balance of one account.
    pub fn balance(&self, account: &AccountId) -> ApiResult<BalanceSnapshot> {
        if let Some(err) = self.failing_accounts.get(account) {
            return Err(err.clone());
        }
        let available = self
            .balances
            .get(account)
            .copied()
            .ok_or_else(|| ApiError::not_found("account"))?;
        Ok(BalanceSnapshot {
            account_id: account.clone(),
            available,
            as_of: Some(self.now()),
        })
    }

    /// One page of an account's entries inside the query window, newest first.
    pub fn statement(&self, query: &StatementQuery) -> ApiResult<Statement> {
        if !self.balances.contains_key(&query.account_id) {
            return Err(ApiError::not_found("account"));
        }
        if query.page_size == 0 {
            return Err(ApiError::bad_request("page size must be at least 1"));
        }
        if query.from > query.to {
            return Err(ApiError::bad_request("start date is after end date"));
        }

        let in_range = |d: NaiveDate| d >= query.from && d <= query.to;
        let mut entries: Vec<StatementEntry> = self
            .statements
            .get(&query.account_id)
            .map(|all| {
                all.iter()
                    .filter(|e| in_range(e.posted_at.date_naive()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));

        let size = query.page_size as usize;
        let start = query.page as usize * size;
        let has_more = entries.len() > start + size;
        let page = entries.into_iter().skip(start).take(size).collect();

        Ok(Statement {
            account_id: query.account_id.clone(),
            entries: page,
            page: query.page,
            has_more,
        })
    }

    // --- card writes ---

    fn replace(
        &mut self,
        id: &InstrumentId,
        update: impl FnOnce(&Instrument) -> ApiResult<Instrument>,
    ) -> ApiResult<Instrument> {
        let slot = self
            .holders
            .values_mut()
            .flatten()
            .find(|i| &i.instrument_id == id)
            .ok_or_else(|| ApiError::not_found("card"))?;
        let updated = update(slot)?;
        *slot = updated.clone();
        Ok(updated)
    }

    /// Activate a delivered card after checking its last four digits.
    pub fn activate(
        &mut self,
        id: &InstrumentId,
        req: &ActivationRequest,
    ) -> ApiResult<Instrument> {
        self.replace(id, |card| {
            if card.stage == InstrumentStage::Activated {
                return Err(ApiError::bad_request("card is already active"));
            }
            if card.status != InstrumentStatus::Normal {
                return Err(ApiError::bad_request("card cannot be activated"));
            }
            if !card.masked_number.ends_with(&req.last_digits) || req.last_digits.len() != 4 {
                return Err(ApiError::bad_request("card digits do not match"));
            }
            Ok(Instrument {
                stage: InstrumentStage::Activated,
                ..card.clone()
            })
        })
    }

    /// Block a card. Lost or stolen cards are cancelled for good.
    pub fn block(&mut self, id: &InstrumentId, req: &BlockRequest) -> ApiResult<Instrument> {
        self.replace(id, |card| {
            if card.status != InstrumentStatus::Normal {
                return Err(ApiError::bad_request("card is not active"));
            }
            let status = match req.reason {
                BlockReason::Temporary => InstrumentStatus::Blocked,
                BlockReason::Lost | BlockReason::Stolen => InstrumentStatus::Cancelled,
            };
            Ok(Instrument {
                status,
                ..card.clone()
            })
        })
    }

    /// Lift a temporary block.
    pub fn unblock(&mut self, id: &InstrumentId) -> ApiResult<Instrument> {
        self.replace(id, |card| {
            if card.status != InstrumentStatus::Blocked {
                return Err(ApiError::bad_request("card is not blocked"));
            }
            Ok(Instrument {
                status: InstrumentStatus::Normal,
                ..card.clone()
            })
        })
    }

    /// Toggle contactless payments on a physical card.
    pub fn set_contactless(&mut self, id: &InstrumentId, enabled: bool) -> ApiResult<Instrument> {
        self.replace(id, |card| {
            if card.status != InstrumentStatus::Normal {
                return Err(ApiError::bad_request("card is not active"));
            }
            if card.kind == InstrumentKind::Virtual {
                return Err(ApiError::bad_request("virtual cards have no contactless chip"));
            }
            Ok(Instrument {
                contactless_enabled: enabled,
                ..card.clone()
            })
        })
    }

    /// Issue a virtual card on an existing account.
    pub fn create_virtual(&mut self, req: &NewVirtualInstrument) -> ApiResult<Instrument> {
        let (document, holder_name) = self
            .holders
            .iter()
            .find_map(|(doc, cards)| {
                cards
                    .iter()
                    .find(|c| c.account_id == req.account_id)
                    .map(|c| (doc.clone(), c.holder_name.clone()))
            })
            .ok_or_else(|| ApiError::not_found("account"))?;

        let id = self.next_id("v");
        let last4 = format!("{:04}", self.sequence % 10_000);
        let instrument = Instrument {
            instrument_id: InstrumentId::new(id),
            account_id: req.account_id.clone(),
            status: InstrumentStatus::Normal,
            stage: InstrumentStage::Activated,
            alias: req.alias.clone(),
            masked_number: format!("**** **** **** {last4}"),
            holder_name,
            expiry: "12/30".to_string(),
            contactless_enabled: false,
            kind: InstrumentKind::Virtual,
        };
        if let Some(cards) = self.holders.get_mut(&document) {
            cards.push(instrument.clone());
        }
        Ok(instrument)
    }

    // --- session ---

    /// Check a holder's password and mint a token.
    pub fn authenticate(&mut self, req: &LoginRequest) -> ApiResult<AuthToken> {
        if req.password.is_empty() {
            return Err(ApiError::bad_request("password is required"));
        }
        let document = normalize_tax_id(&req.document);
        match self.passwords.get(&document) {
            Some(expected) if *expected == req.password => {
                let token = self.next_id(&format!("fixture-{document}"));
                Ok(AuthToken {
                    token,
                    expires_at: Some(self.now() + Duration::hours(1)),
                })
            }
            _ => Err(ApiError::Unauthorized),
        }
    }

    // --- money movement ---

    fn debit(&mut self, account: &AccountId, amount: Decimal, description: &str) -> ApiResult<()> {
        let balance = self
            .balances
            .get_mut(account)
            .ok_or_else(|| ApiError::not_found("account"))?;
        if *balance < amount {
            return Err(ApiError::bad_request("insufficient funds"));
        }
        *balance -= amount;
        self.post_entry(account, amount, EntryDirection::Debit, description);
        Ok(())
    }

    fn credit(&mut self, account: &AccountId, amount: Decimal, description: &str) -> ApiResult<()> {
        let balance = self
            .balances
            .get_mut(account)
            .ok_or_else(|| ApiError::not_found("account"))?;
        *balance += amount;
        self.post_entry(account, amount, EntryDirection::Credit, description);
        Ok(())
    }

    fn post_entry(
        &mut self,
        account: &AccountId,
        amount: Decimal,
        direction: EntryDirection,
        description: &str,
    ) {
        let entry_id = self.next_id("e");
        let posted_at = self.now();
        self.statements
            .entry(account.clone())
            .or_default()
            .push(StatementEntry {
                entry_id,
                description: description.to_string(),
                amount,
                direction,
                posted_at,
            });
    }

    /// Debit a bill payment, rejecting it on insufficient funds.
    pub fn pay_bill(&mut self, req: &BillPayment) -> ApiResult<PaymentReceipt> {
        if req.amount <= Decimal::ZERO {
            return Err(ApiError::bad_request("amount must be positive"));
        }
        let digits = req.barcode.chars().filter(char::is_ascii_digit).count();
        if ![44, 47, 48].contains(&digits) {
            return Err(ApiError::bad_request("invalid barcode"));
        }
        self.debit(&req.account_id, req.amount, "Bill payment")?;
        Ok(PaymentReceipt {
            receipt_id: self.next_id("r"),
            account_id: req.account_id.clone(),
            amount: req.amount,
            paid_at: self.now(),
        })
    }

    /// Move funds between two known accounts.
    pub fn transfer(&mut self, req: &TransferRequest) -> ApiResult<TransferReceipt> {
        if req.amount <= Decimal::ZERO {
            return Err(ApiError::bad_request("amount must be positive"));
        }
        if req.from_account_id == req.to_account_id {
            return Err(ApiError::bad_request("source and destination must differ"));
        }
        if !self.balances.contains_key(&req.to_account_id) {
            return Err(ApiError::not_found("account"));
        }
        let description = req.description.as_deref().unwrap_or("Transfer");
        self.debit(&req.from_account_id, req.amount, description)?;
        self.credit(&req.to_account_id, req.amount, description)?;
        Ok(TransferReceipt {
            transfer_id: self.next_id("t"),
            from_account_id: req.from_account_id.clone(),
            to_account_id: req.to_account_id.clone(),
            amount: req.amount,
            executed_at: self.now(),
        })
    }
}
