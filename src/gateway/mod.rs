//! Data source gateway.
//!
//! One seam for every backend operation. The `use_fixtures` flag picks,
//! per call, between the in-memory [`FixtureData`] (after a simulated
//! latency) and a real [`Transport`]; callers cannot tell the difference.
//!
//! Every failure leaving this module is an [`ApiError`]. An
//! [`ApiError::Unauthorized`] from any real call also signs the session
//! out, once, however many calls fail together.
//!
//! # Example
//!
//! ```ignore
//! use cardwise::gateway::*;
//!
//! let gateway = Gateway::fixtures(&ClientConfig::default(), SessionHolder::new());
//! let cards = gateway.list_instruments_by_holder("52998224725").await?;
//! ```

pub mod fixtures;
#[cfg(feature = "http")]
pub mod http;
pub mod operations;
pub mod transport;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use fixtures::FixtureData;
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use operations::*;
pub use transport::{Method, Transport, TransportError, TransportRequest, TransportResponse};

use crate::core::*;
use crate::session::SessionHolder;

/// Serves [`Operation`]s from fixtures or the network.
pub struct Gateway {
    use_fixtures: AtomicBool,
    fixture_latency: Duration,
    fixtures: Mutex<FixtureData>,
    transport: Option<Arc<dyn Transport>>,
    session: SessionHolder,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("use_fixtures", &self.use_fixtures())
            .field("fixture_latency", &self.fixture_latency)
            .field("has_transport", &self.transport.is_some())
            .field("session", &self.session)
            .finish()
    }
}

impl Gateway {
    /// Gateway over an explicit transport, starting in the configured mode
    /// with the seeded fixture data.
    pub fn new(
        config: &ClientConfig,
        session: SessionHolder,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            use_fixtures: AtomicBool::new(config.use_fixtures),
            fixture_latency: config.fixture_latency(),
            fixtures: Mutex::new(FixtureData::seeded()),
            transport: Some(transport),
            session,
        }
    }

    /// Fixture-only gateway. Switching it to real mode makes every call
    /// fail with [`ApiError::Unexpected`].
    pub fn fixtures(config: &ClientConfig, session: SessionHolder) -> Self {
        Self {
            use_fixtures: AtomicBool::new(true),
            fixture_latency: config.fixture_latency(),
            fixtures: Mutex::new(FixtureData::seeded()),
            transport: None,
            session,
        }
    }

    /// Gateway with an [`HttpTransport`] built from `config`.
    #[cfg(feature = "http")]
    pub fn from_config(config: &ClientConfig, session: SessionHolder) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(config, session, Arc::new(transport)))
    }

    /// Replace the fixture data set.
    pub fn with_fixture_data(self, data: FixtureData) -> Self {
        self.replace_fixture_data(data);
        self
    }

    /// Swap in a new fixture data set for subsequent fixture calls.
    pub fn replace_fixture_data(&self, data: FixtureData) {
        self.edit_fixtures(|current| *current = data);
    }

    /// Mutate fixture data in place (e.g. to inject failures).
    pub fn edit_fixtures<R>(&self, edit: impl FnOnce(&mut FixtureData) -> R) -> R {
        let mut guard = self
            .fixtures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        edit(&mut guard)
    }

    /// Whether calls are currently served from fixtures.
    pub fn use_fixtures(&self) -> bool {
        self.use_fixtures.load(Ordering::Acquire)
    }

    /// Switch the data source for subsequent calls.
    pub fn set_use_fixtures(&self, enabled: bool) {
        let previous = self.use_fixtures.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            tracing::info!(use_fixtures = enabled, "gateway data source switched");
        }
    }

    /// The session this gateway reads credentials from.
    pub fn session(&self) -> &SessionHolder {
        &self.session
    }

    /// Run one operation against the active data source.
    pub async fn call<O: Operation>(&self, op: &O) -> ApiResult<O::Output> {
        if self.use_fixtures() {
            self.call_fixture(op).await
        } else {
            self.call_remote(op).await
        }
    }

    async fn call_fixture<O: Operation>(&self, op: &O) -> ApiResult<O::Output> {
        tracing::debug!(operation = O::NAME, source = "fixture", "gateway call");
        if !self.fixture_latency.is_zero() {
            tokio::time::sleep(self.fixture_latency).await;
        }
        let result = self.edit_fixtures(|data| op.resolve_fixture(data));
        if let Err(e) = &result {
            tracing::debug!(operation = O::NAME, code = e.code(), "fixture call failed");
        }
        result
    }

    async fn call_remote<O: Operation>(&self, op: &O) -> ApiResult<O::Output> {
        let Some(transport) = &self.transport else {
            return Err(ApiError::unexpected("no transport configured for real mode"));
        };

        let credential = if op.requires_session() {
            self.session.current()
        } else {
            None
        };
        let request = op.request()?.bearer(credential);
        tracing::debug!(operation = O::NAME, route = %request.route(), "gateway call");

        let response = match transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(operation = O::NAME, error = %e, "transport failure");
                return Err(e.into());
            }
        };

        if response.is_success() {
            return serde_json::from_str::<O::Output>(&response.body).map_err(|e| {
                tracing::warn!(operation = O::NAME, error = %e, "undecodable response body");
                ApiError::wrap(e)
            });
        }

        let err = match ApiError::from_status(response.status, &response.body) {
            ApiError::NotFound { .. } => ApiError::not_found(O::RESOURCE),
            other => other,
        };
        tracing::warn!(
            operation = O::NAME,
            status = response.status,
            code = err.code(),
            "gateway call failed"
        );

        if err.is_unauthorized() {
            self.session.invalidate();
        }
        Err(err)
    }

    // --- convenience wrappers, one per operation ---

    pub async fn list_instruments_by_holder(&self, document: &str) -> ApiResult<Vec<Instrument>> {
        self.call(&ListInstrumentsByHolder {
            document: document.to_string(),
        })
        .await
    }

    pub async fn get_instrument(&self, instrument_id: &InstrumentId) -> ApiResult<Instrument> {
        self.call(&GetInstrument {
            instrument_id: instrument_id.clone(),
        })
        .await
    }

    pub async fn get_account_balance(&self, account_id: &AccountId) -> ApiResult<BalanceSnapshot> {
        self.call(&GetAccountBalance {
            account_id: account_id.clone(),
        })
        .await
    }

    pub async fn get_statement(&self, query: StatementQuery) -> ApiResult<Statement> {
        self.call(&GetStatement { query }).await
    }

    pub async fn activate_instrument(
        &self,
        instrument_id: &InstrumentId,
        last_digits: impl Into<String>,
    ) -> ApiResult<Instrument> {
        self.call(&ActivateInstrument {
            instrument_id: instrument_id.clone(),
            request: ActivationRequest {
                last_digits: last_digits.into(),
            },
        })
        .await
    }

    pub async fn block_instrument(
        &self,
        instrument_id: &InstrumentId,
        reason: BlockReason,
    ) -> ApiResult<Instrument> {
        self.call(&BlockInstrument {
            instrument_id: instrument_id.clone(),
            request: BlockRequest { reason },
        })
        .await
    }

    pub async fn unblock_instrument(&self, instrument_id: &InstrumentId) -> ApiResult<Instrument> {
        self.call(&UnblockInstrument {
            instrument_id: instrument_id.clone(),
        })
        .await
    }

    pub async fn set_contactless(
        &self,
        instrument_id: &InstrumentId,
        enabled: bool,
    ) -> ApiResult<Instrument> {
        self.call(&SetContactless {
            instrument_id: instrument_id.clone(),
            enabled,
        })
        .await
    }

    pub async fn create_virtual_instrument(
        &self,
        request: NewVirtualInstrument,
    ) -> ApiResult<Instrument> {
        self.call(&CreateVirtualInstrument { request }).await
    }

    /// Exchange credentials for a token. Installing it in the session is
    /// the login flow's job.
    pub async fn authenticate(
        &self,
        document: impl Into<String>,
        password: impl Into<String>,
    ) -> ApiResult<AuthToken> {
        self.call(&Authenticate {
            request: LoginRequest {
                document: document.into(),
                password: password.into(),
            },
        })
        .await
    }

    pub async fn pay_bill(&self, payment: BillPayment) -> ApiResult<PaymentReceipt> {
        self.call(&PayBill { payment }).await
    }

    pub async fn transfer(&self, transfer: TransferRequest) -> ApiResult<TransferReceipt> {
        self.call(&Transfer { transfer }).await
    }
}
