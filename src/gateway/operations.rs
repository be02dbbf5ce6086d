//! The fixed set of named gateway operations.
//!
//! Each operation knows its REST route and how to resolve itself against
//! [`FixtureData`], so callers never see which source served them.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::fixtures::FixtureData;
use super::transport::TransportRequest;
use crate::core::*;

/// A named read or write served by the [`Gateway`](super::Gateway).
pub trait Operation: Send + Sync {
    /// Decoded success payload.
    type Output: DeserializeOwned + Send + 'static;

    /// Operation name for logs (e.g. `"list-instruments-by-holder"`).
    const NAME: &'static str;

    /// What a 404 from this operation refers to.
    const RESOURCE: &'static str;

    /// The REST request, without credentials. Fails only if the body
    /// cannot be serialized.
    fn request(&self) -> ApiResult<TransportRequest>;

    /// Resolve against fixture data with the real endpoint's rules.
    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output>;

    /// Whether the current session credential is attached.
    fn requires_session(&self) -> bool {
        true
    }
}

/// All cards of a holder, unfiltered by status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListInstrumentsByHolder {
    pub document: String,
}

impl Operation for ListInstrumentsByHolder {
    type Output = Vec<Instrument>;
    const NAME: &'static str = "list-instruments-by-holder";
    const RESOURCE: &'static str = "holder";

    fn request(&self) -> ApiResult<TransportRequest> {
        let document = normalize_tax_id(&self.document);
        Ok(TransportRequest::get(["holders", document.as_str(), "cards"]))
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.instruments_for_holder(&self.document)
    }
}

/// One card by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetInstrument {
    pub instrument_id: InstrumentId,
}

impl Operation for GetInstrument {
    type Output = Instrument;
    const NAME: &'static str = "get-instrument";
    const RESOURCE: &'static str = "card";

    fn request(&self) -> ApiResult<TransportRequest> {
        Ok(TransportRequest::get(["cards", self.instrument_id.as_str()]))
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.instrument(&self.instrument_id)
    }
}

/// Available balance of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAccountBalance {
    pub account_id: AccountId,
}

impl Operation for GetAccountBalance {
    type Output = BalanceSnapshot;
    const NAME: &'static str = "get-account-balance";
    const RESOURCE: &'static str = "account";

    fn request(&self) -> ApiResult<TransportRequest> {
        Ok(TransportRequest::get(["accounts", self.account_id.as_str(), "balance"]))
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.balance(&self.account_id)
    }
}

/// A page of account entries within a date window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetStatement {
    pub query: StatementQuery,
}

impl Operation for GetStatement {
    type Output = Statement;
    const NAME: &'static str = "get-statement";
    const RESOURCE: &'static str = "account";

    fn request(&self) -> ApiResult<TransportRequest> {
        let q = &self.query;
        Ok(
            TransportRequest::get(["accounts", q.account_id.as_str(), "statement"])
                .query("from", q.from.format("%Y-%m-%d"))
                .query("to", q.to.format("%Y-%m-%d"))
                .query("page", q.page)
                .query("pageSize", q.page_size),
        )
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.statement(&self.query)
    }
}

/// Activate a delivered card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateInstrument {
    pub instrument_id: InstrumentId,
    pub request: ActivationRequest,
}

impl Operation for ActivateInstrument {
    type Output = Instrument;
    const NAME: &'static str = "activate-instrument";
    const RESOURCE: &'static str = "card";

    fn request(&self) -> ApiResult<TransportRequest> {
        TransportRequest::post(["cards", self.instrument_id.as_str(), "activation"])
            .json(&self.request)
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.activate(&self.instrument_id, &self.request)
    }
}

/// Block a card for a given reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInstrument {
    pub instrument_id: InstrumentId,
    pub request: BlockRequest,
}

impl Operation for BlockInstrument {
    type Output = Instrument;
    const NAME: &'static str = "block-instrument";
    const RESOURCE: &'static str = "card";

    fn request(&self) -> ApiResult<TransportRequest> {
        TransportRequest::post(["cards", self.instrument_id.as_str(), "block"]).json(&self.request)
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.block(&self.instrument_id, &self.request)
    }
}

/// Lift a temporary block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnblockInstrument {
    pub instrument_id: InstrumentId,
}

impl Operation for UnblockInstrument {
    type Output = Instrument;
    const NAME: &'static str = "unblock-instrument";
    const RESOURCE: &'static str = "card";

    fn request(&self) -> ApiResult<TransportRequest> {
        Ok(TransportRequest::post(["cards", self.instrument_id.as_str(), "unblock"]))
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.unblock(&self.instrument_id)
    }
}

/// Enable or disable contactless payments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetContactless {
    pub instrument_id: InstrumentId,
    pub enabled: bool,
}

#[derive(Serialize)]
struct ContactlessBody {
    enabled: bool,
}

impl Operation for SetContactless {
    type Output = Instrument;
    const NAME: &'static str = "set-contactless";
    const RESOURCE: &'static str = "card";

    fn request(&self) -> ApiResult<TransportRequest> {
        TransportRequest::put(["cards", self.instrument_id.as_str(), "contactless"]).json(
            &ContactlessBody {
                enabled: self.enabled,
            },
        )
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.set_contactless(&self.instrument_id, self.enabled)
    }
}

/// Issue a virtual card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVirtualInstrument {
    pub request: NewVirtualInstrument,
}

impl Operation for CreateVirtualInstrument {
    type Output = Instrument;
    const NAME: &'static str = "create-virtual-instrument";
    const RESOURCE: &'static str = "account";

    fn request(&self) -> ApiResult<TransportRequest> {
        TransportRequest::post(["cards"]).json(&self.request)
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.create_virtual(&self.request)
    }
}

/// Exchange holder credentials for a token. Sent without a bearer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticate {
    pub request: LoginRequest,
}

impl Operation for Authenticate {
    type Output = AuthToken;
    const NAME: &'static str = "authenticate";
    const RESOURCE: &'static str = "holder";

    fn request(&self) -> ApiResult<TransportRequest> {
        TransportRequest::post(["auth", "login"]).json(&self.request)
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.authenticate(&self.request)
    }

    fn requires_session(&self) -> bool {
        false
    }
}

/// Pay a bill from an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayBill {
    pub payment: BillPayment,
}

impl Operation for PayBill {
    type Output = PaymentReceipt;
    const NAME: &'static str = "pay-bill";
    const RESOURCE: &'static str = "account";

    fn request(&self) -> ApiResult<TransportRequest> {
        TransportRequest::post(["accounts", self.payment.account_id.as_str(), "bill-payments"])
            .json(&self.payment)
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.pay_bill(&self.payment)
    }
}

/// Transfer between accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub transfer: TransferRequest,
}

impl Operation for Transfer {
    type Output = TransferReceipt;
    const NAME: &'static str = "transfer";
    const RESOURCE: &'static str = "account";

    fn request(&self) -> ApiResult<TransportRequest> {
        TransportRequest::post(["accounts", self.transfer.from_account_id.as_str(), "transfers"])
            .json(&self.transfer)
    }

    fn resolve_fixture(&self, data: &mut FixtureData) -> ApiResult<Self::Output> {
        data.transfer(&self.transfer)
    }
}
