//! Shared helpers for the async integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cardwise::core::*;
use cardwise::gateway::*;
use cardwise::session::SessionHolder;

pub const HOLDER: &str = fixtures::SEED_INDIVIDUAL;
pub const COMPANY: &str = fixtures::SEED_COMPANY;

/// Route tests' `tracing` output through the libtest writer.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

type Handler =
    dyn Fn(&TransportRequest) -> Result<TransportResponse, TransportError> + Send + Sync;

/// Transport answering from a closure, recording every request.
pub struct ScriptedTransport {
    handler: Box<Handler>,
    delay: Duration,
    requests: Mutex<Vec<TransportRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(
        handler: impl Fn(&TransportRequest) -> Result<TransportResponse, TransportError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Same status and body for every request.
    pub fn always(status: u16, body: &'static str) -> Self {
        Self::new(move |_| Ok(TransportResponse::new(status, body)))
    }

    /// Answer the way the seeded fixture backend would, over the wire.
    pub fn mirroring_fixtures() -> Self {
        let data = Mutex::new(FixtureData::seeded());
        Self::new(move |req| {
            let mut data = data.lock().unwrap();
            let body = match req.segments.iter().map(String::as_str).collect::<Vec<_>>()[..] {
                ["holders", doc, "cards"] => to_body(data.instruments_for_holder(doc)),
                ["cards", id] => to_body(data.instrument(&InstrumentId::new(id))),
                ["accounts", id, "balance"] => to_body(data.balance(&AccountId::new(id))),
                ["cards", id, "block"] => {
                    let request = serde_json::from_value(req.body.clone().unwrap()).unwrap();
                    to_body(data.block(&InstrumentId::new(id), &request))
                }
                _ => return Ok(TransportResponse::new(404, "")),
            };
            Ok(body)
        })
    }

    /// Hold every request for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn routes(&self) -> Vec<String> {
        self.requests().iter().map(TransportRequest::route).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn to_body<T: serde::Serialize>(result: ApiResult<T>) -> TransportResponse {
    match result {
        Ok(value) => TransportResponse::new(200, serde_json::to_string(&value).unwrap()),
        Err(e) => TransportResponse::new(
            e.status().unwrap_or(500),
            serde_json::json!({ "message": e.technical_detail() }).to_string(),
        ),
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.handler)(&request)
    }
}

/// Fixture-mode gateway with the default simulated latency.
pub fn fixture_gateway() -> Arc<Gateway> {
    Arc::new(Gateway::fixtures(&ClientConfig::default(), SessionHolder::new()))
}

/// Real-mode gateway over `transport`, signed in with `token`.
pub fn remote_gateway(transport: Arc<ScriptedTransport>, token: &str) -> Arc<Gateway> {
    let session = SessionHolder::new();
    session.set(token);
    let config = ClientConfig::default().with_fixtures(false);
    Arc::new(Gateway::new(&config, session, transport))
}

pub fn card(id: &str, account: &str, status: InstrumentStatus) -> Instrument {
    Instrument {
        instrument_id: InstrumentId::new(id),
        account_id: AccountId::new(account),
        status,
        stage: InstrumentStage::Activated,
        alias: None,
        masked_number: "**** **** **** 0000".into(),
        holder_name: "TEST HOLDER".into(),
        expiry: "01/30".into(),
        contactless_enabled: false,
        kind: InstrumentKind::Physical,
    }
}

/// The selection pair agrees with itself and refers to a listed card.
pub fn assert_selection_consistent(snapshot: &cardwise::directory::DirectorySnapshot) {
    match (snapshot.selected_instrument(), snapshot.selected_account_id()) {
        (Some(card), Some(account)) => {
            assert_eq!(&card.account_id, account);
            assert!(snapshot.contains(&card.instrument_id));
        }
        (None, None) => {}
        other => panic!("selection pair out of step: {other:?}"),
    }
}
