use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickload_common::TicketRequest;
use tokio::sync::Mutex;
use tracing::debug;

pub mod config;
use config::{DEFAULT_DELAY, DEFAULT_STATUS};

/// Ticket as returned by the stub on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: u64,
    pub shop_slug: String,
    pub service_id: u64,
    pub customer_name: String,
}

/// JSON error envelope returned for every non-success status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// What the stub has observed so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StubStats {
    pub received: u64,
    pub peak_in_flight: u64,
    pub distinct_customers: u64,
}

/// Decrements the in-flight gauge when the handler returns.
struct InFlightGuard<'a>(&'a AtomicU64);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub status: StatusCode,
    pub delay: Duration,
    received: Arc<AtomicU64>,
    in_flight: Arc<AtomicU64>,
    peak_in_flight: Arc<AtomicU64>,
    customers: Arc<Mutex<HashSet<String>>>,
}

impl AppState {
    pub fn new(status: StatusCode, delay: Duration) -> Self {
        Self {
            status,
            delay,
            received: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            peak_in_flight: Arc::new(AtomicU64::new(0)),
            customers: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn stats(&self) -> StubStats {
        StubStats {
            received: self.received.load(Ordering::SeqCst),
            peak_in_flight: self.peak_in_flight.load(Ordering::SeqCst),
            distinct_customers: self.customers.lock().await.len() as u64,
        }
    }
}

/// Stub server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub status: StatusCode,
    pub delay: Duration,
}

impl ServerConfig {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            status: DEFAULT_STATUS,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Stand-in for the ticket service.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let state = AppState::new(config.status, config.delay);
        Self { config, state }
    }

    /// Get the server's configured address
    pub fn address(&self) -> SocketAddr {
        self.config.address
    }

    /// Handle to the shared state, usable after the server has been moved into `run`.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Create the application router with the given state
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/api/shops/:shop/tickets", post(handle_create_ticket))
            .with_state(state)
    }

    /// Run the server, signalling `ready_tx` with the bound address once accepting connections
    pub async fn run(
        self,
        ready_tx: tokio::sync::oneshot::Sender<SocketAddr>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let app = Self::create_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.config.address).await?;
        let local_addr = listener.local_addr()?;
        ready_tx.send(local_addr).ok();
        axum::serve(listener, app).await?;
        Ok(())
    }
}

/// Handler for POST /api/shops/:shop/tickets: waits the configured delay, then
/// answers with the configured status.
pub async fn handle_create_ticket(
    State(state): State<AppState>,
    Path(shop): Path<String>,
    Json(request): Json<TicketRequest>,
) -> Response {
    let id = state.received.fetch_add(1, Ordering::SeqCst) + 1;
    let now_in_flight = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    let _guard = InFlightGuard(&state.in_flight);
    state.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

    debug!(id, shop = %shop, customer = %request.customer_name, "ticket request");

    state.customers.lock().await.insert(request.customer_name.clone());

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    if state.status.as_u16() >= 400 {
        let error = ErrorResponse {
            error: format!("stub configured to fail with {}", state.status),
        };
        return (state.status, Json(error)).into_response();
    }

    let ticket = Ticket {
        id,
        shop_slug: shop,
        service_id: request.service_id,
        customer_name: request.customer_name,
    };
    (state.status, Json(ticket)).into_response()
}
