use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use super::{Gateway, GatewayError};
use crate::models::{
    AccountSnapshot, Candle, Fill, InstrumentSpec, OpenPosition, OrderRequest, Tick, Timeframe,
};
use crate::settings::BridgeConfig;

type BridgeRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct StopUpdate {
    stop_loss: f64,
}

/// JSON-over-HTTP client for the terminal-side bridge
///
/// Every request waits on a shared rate limiter and is bounded by the client
/// timeout. Failures are returned as-is; the engine decides what to skip.
#[derive(Clone)]
pub struct BridgeGateway {
    client: Client,
    base_url: String,
    rate_limiter: Arc<BridgeRateLimiter>,
}

impl BridgeGateway {
    /// Build the client and check `/health`
    pub async fn connect(config: &BridgeConfig) -> Result<Self, GatewayError> {
        let base_url = config.url.trim_end_matches('/').to_string();
        let connect_err = |reason: String| GatewayError::Connect {
            url: base_url.clone(),
            reason,
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| connect_err(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        let gateway = Self {
            client,
            base_url: base_url.clone(),
            rate_limiter,
        };

        let health: HealthResponse = gateway
            .get("/health", &[])
            .await
            .map_err(|e| connect_err(e.to_string()))?;
        if health.status != "ok" {
            return Err(connect_err(format!("bridge status {}", health.status)));
        }

        tracing::info!("Connected to terminal bridge at {}", base_url);
        Ok(gateway)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.rate_limiter.until_ready().await;
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// 2xx → body as `T`; 409/422 → broker rejection; anything else → unavailable
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return serde_json::from_str(&body)
                .map_err(|e| GatewayError::Decode(format!("{} in {:?}", e, body)));
        }

        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        match status {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(GatewayError::Rejected(message))
            }
            _ => Err(GatewayError::Unavailable(format!("{}: {}", status, message))),
        }
    }
}

impl Gateway for BridgeGateway {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        self.get(
            "/candles",
            &[
                ("symbol", symbol.to_string()),
                ("timeframe", timeframe.to_string()),
                ("count", count.to_string()),
            ],
        )
        .await
    }

    async fn current_tick(&self, symbol: &str) -> Result<Tick, GatewayError> {
        self.get("/tick", &[("symbol", symbol.to_string())]).await
    }

    async fn account_snapshot(&self) -> Result<AccountSnapshot, GatewayError> {
        self.get("/account", &[]).await
    }

    async fn instrument_spec(&self, symbol: &str) -> Result<InstrumentSpec, GatewayError> {
        self.get("/symbol", &[("symbol", symbol.to_string())]).await
    }

    async fn submit_market_order(&self, order: &OrderRequest) -> Result<Fill, GatewayError> {
        self.post("/orders", order).await
    }

    async fn modify_position_stop(&self, ticket: u64, stop_loss: f64) -> Result<(), GatewayError> {
        let _: IgnoredAny = self
            .post(&format!("/positions/{}/stop", ticket), &StopUpdate { stop_loss })
            .await?;
        Ok(())
    }

    async fn list_open_positions(&self, symbol: &str) -> Result<Vec<OpenPosition>, GatewayError> {
        self.get("/positions", &[("symbol", symbol.to_string())]).await
    }
}
