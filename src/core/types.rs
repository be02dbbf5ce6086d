use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier of a card.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(pub String);

/// Identifier of the account a card draws on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(InstrumentId);
string_id!(AccountId);

/// Card lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentStatus {
    /// Usable; the only status visible to selection.
    Normal,
    /// Temporarily blocked by the holder or the issuer.
    Blocked,
    /// Permanently cancelled.
    Cancelled,
    /// Past its expiry date.
    Expired,
}

/// Activation sub-state, finer-grained than [`InstrumentStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentStage {
    Requested,
    Embossed,
    Shipped,
    Delivered,
    Activated,
    /// A stage this client does not know yet.
    #[serde(other)]
    Unknown,
}

/// Physical plastic or virtual card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentKind {
    Physical,
    Virtual,
}

/// A card owned by a holder, as returned by the backend.
///
/// Value data: updates replace the whole object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub instrument_id: InstrumentId,
    pub account_id: AccountId,
    pub status: InstrumentStatus,
    pub stage: InstrumentStage,
    /// Holder-chosen nickname.
    pub alias: Option<String>,
    /// Masked PAN, e.g. "**** **** **** 1234".
    pub masked_number: String,
    pub holder_name: String,
    /// Expiry as printed on the card ("MM/YY").
    pub expiry: String,
    pub contactless_enabled: bool,
    pub kind: InstrumentKind,
}

impl Instrument {
    /// Whether the card may be offered for selection.
    pub fn is_selectable(&self) -> bool {
        self.status == InstrumentStatus::Normal
    }
}

/// Available balance of one account at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub account_id: AccountId,
    pub available: Decimal,
    pub as_of: Option<DateTime<Utc>>,
}

/// Direction of a statement entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryDirection {
    Credit,
    Debit,
}

/// One posted movement on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementEntry {
    pub entry_id: String,
    pub description: String,
    /// Always positive; the sign is carried by `direction`.
    pub amount: Decimal,
    pub direction: EntryDirection,
    pub posted_at: DateTime<Utc>,
}

impl StatementEntry {
    /// Amount with the direction applied (debits negative).
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            EntryDirection::Credit => self.amount,
            EntryDirection::Debit => -self.amount,
        }
    }
}

/// One page of an account statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub account_id: AccountId,
    pub entries: Vec<StatementEntry>,
    /// Zero-based page index.
    pub page: u32,
    pub has_more: bool,
}

/// Statement request: inclusive date range plus pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementQuery {
    pub account_id: AccountId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub page: u32,
    pub page_size: u32,
}

impl StatementQuery {
    /// Page size when none is given.
    pub const DEFAULT_PAGE_SIZE: u32 = 20;

    /// First page of the statement between `from` and `to`.
    pub fn new(account_id: impl Into<AccountId>, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            account_id: account_id.into(),
            from,
            to,
            page: 0,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Zero-based page to fetch.
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Entries per page.
    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }
}

/// Card activation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRequest {
    /// Last four digits printed on the plastic, proving possession.
    pub last_digits: String,
}

/// Card block request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub reason: BlockReason,
}

/// Why a card is being blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockReason {
    /// Temporary, holder-initiated; can be unblocked.
    Temporary,
    Lost,
    Stolen,
}

/// Creation DTO for a virtual card. The backend assigns every other field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVirtualInstrument {
    pub account_id: AccountId,
    pub alias: Option<String>,
}

/// Bill payment by barcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPayment {
    pub account_id: AccountId,
    pub barcode: String,
    pub amount: Decimal,
}

/// Confirmation of a bill payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub receipt_id: String,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Funds transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub description: Option<String>,
}

/// Confirmation of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Login credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub document: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("document", &self.document)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token issued by a successful login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
