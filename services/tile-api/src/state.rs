//! Application state and shared resources.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;

use overlay_protocol::{Endpoints, LinkProber, RandomServerPart, ServerPartPicker};

use crate::compositor::TileCompositor;
use crate::fetch::{HttpLinkProber, HttpTileFetcher, FETCH_TIMEOUT};
use crate::warp::{DefaultImageOps, ImageWarper};

/// Requests admitted beyond the worker count before the service starts
/// rejecting with 503.
pub const QUEUE_FACTOR: usize = 4;

/// Shared application state.
pub struct AppState {
    pub endpoints: Endpoints,
    pub compositor: TileCompositor,
    pub picker: Arc<dyn ServerPartPicker>,
    pub prober: Arc<dyn LinkProber>,
    /// Bounded admission: workers × queue factor permits.
    pub limiter: Semaphore,
}

impl AppState {
    pub fn new(public_url: &str, workers: usize) -> Result<Self> {
        let picker: Arc<dyn ServerPartPicker> = Arc::new(RandomServerPart);
        let fetcher = Arc::new(HttpTileFetcher::new(FETCH_TIMEOUT)?);
        let prober: Arc<dyn LinkProber> = Arc::new(HttpLinkProber::new(FETCH_TIMEOUT)?);

        let compositor = TileCompositor::new(
            fetcher,
            Arc::new(ImageWarper),
            Arc::new(DefaultImageOps),
            picker.clone(),
        );

        Ok(Self {
            endpoints: Endpoints::from_base(public_url),
            compositor,
            picker,
            prober,
            limiter: Semaphore::new(workers * QUEUE_FACTOR),
        })
    }
}
