//! Upstream HTTP access: tile fetching and link probing.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use overlay_protocol::LinkProber;
use tile_common::{TileError, TileResult};

/// Default per-fetch timeout. A slow upstream otherwise occupies a worker
/// for the networking stack's full default, which can saturate the pool.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches raw tile bytes from an upstream source.
///
/// Injectable so tests can run the compositor without a network.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> TileResult<Bytes>;
}

/// reqwest-backed fetcher with a bounded per-request timeout.
pub struct HttpTileFetcher {
    client: Client,
}

impl HttpTileFetcher {
    pub fn new(timeout: Duration) -> TileResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TileError::InternalError(format!("http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TileFetcher for HttpTileFetcher {
    async fn fetch(&self, url: &str) -> TileResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TileError::FetchFailed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TileError::FetchFailed(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        response
            .bytes()
            .await
            .map_err(|e| TileError::FetchFailed(e.to_string()))
    }
}

/// reqwest-backed reachability probe. Best-effort: any transport error or
/// non-success status counts as unreachable.
pub struct HttpLinkProber {
    client: Client,
}

impl HttpLinkProber {
    pub fn new(timeout: Duration) -> TileResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TileError::InternalError(format!("http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LinkProber for HttpLinkProber {
    async fn is_reachable(&self, url: &str) -> bool {
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "probe failed");
                false
            }
        }
    }
}
