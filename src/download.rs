//! Batched area download pipeline.
//!
//! Given a center point and radius, enumerates the covering tile set
//! across the configured zoom range and pulls the missing tiles from the
//! network in bounded-concurrency batches, reporting cumulative progress
//! after each batch. Per-tile failures are counted and logged, never
//! fatal: the operation always completes, and partial failure only shows
//! up as fewer tiles ending up cached than were requested.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::OfflineConfig;
use crate::error::OfflineError;
use crate::projection::{bounds_around_point, tiles_for_area, TileAddress};
use crate::tiles::TileCache;

/// Network seam for fetching one tile image. The production
/// implementation is `HttpTileFetcher`; tests substitute their own.
pub trait TileFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, OfflineError>>;
}

/// reqwest-backed tile fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling.
#[derive(Clone)]
pub struct HttpTileFetcher {
    client: Client,
}

impl HttpTileFetcher {
    pub fn new(timeout: Duration) -> Result<Self, OfflineError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Build from an existing client, sharing its connection pool.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl TileFetcher for HttpTileFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, OfflineError>> {
        Box::pin(async move {
            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(OfflineError::from_tile_status(response.status(), url));
            }
            Ok(response.bytes().await?.to_vec())
        })
    }
}

enum TileOutcome {
    /// Present before this run; no network call issued.
    AlreadyCached,
    /// Fetched and stored during this run.
    Fetched,
    /// Fetch or store failed; counted and skipped.
    Failed,
}

/// Pre-populates the tile cache for a bounding region around a
/// destination.
#[derive(Clone)]
pub struct AreaDownloader {
    tiles: TileCache,
    fetcher: Arc<dyn TileFetcher>,
    config: OfflineConfig,
}

impl AreaDownloader {
    pub fn new(tiles: TileCache, fetcher: Arc<dyn TileFetcher>, config: OfflineConfig) -> Self {
        Self {
            tiles,
            fetcher,
            config,
        }
    }

    /// Download every tile covering `radius_km` around the center point,
    /// across the configured zoom range.
    ///
    /// Tiles already cached are counted as done without a network call,
    /// so re-running over the same area performs no redundant traffic.
    /// `on_progress` receives cumulative (completed, total) after each
    /// batch; completed includes failed tiles and always ends at total.
    ///
    /// No cap is placed on the enumerated tile count; the total is logged
    /// before the first fetch so a host can impose its own policy.
    ///
    /// Returns the number of tiles confirmed present in the cache after
    /// the run (pre-existing plus newly downloaded).
    pub async fn download_area(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        mut on_progress: impl FnMut(usize, usize) + Send,
    ) -> usize {
        let bounds = bounds_around_point(lat, lng, radius_km);
        let tiles = tiles_for_area(
            bounds.north,
            bounds.south,
            bounds.east,
            bounds.west,
            self.config.min_zoom,
            self.config.max_zoom,
        );
        let total = tiles.len();
        debug!(total, lat, lng, radius_km, "Starting area download");

        let mut present = 0usize;
        let mut failed = 0usize;
        let mut completed = 0usize;

        for batch in tiles.chunks(self.config.batch_size.max(1)) {
            let outcomes = join_all(batch.iter().map(|tile| self.fetch_one(*tile))).await;

            for outcome in outcomes {
                completed += 1;
                match outcome {
                    TileOutcome::AlreadyCached | TileOutcome::Fetched => present += 1,
                    TileOutcome::Failed => failed += 1,
                }
            }
            on_progress(completed, total);

            // Politeness throttle against the tile source, skipped after
            // the final batch.
            if completed < total {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        if failed > 0 {
            warn!(failed, total, "Area download finished with failed tiles");
        }
        debug!(present, total, "Area download complete");
        present
    }

    async fn fetch_one(&self, tile: TileAddress) -> TileOutcome {
        match self.tiles.get(tile).await {
            Ok(Some(_)) => return TileOutcome::AlreadyCached,
            Ok(None) => {}
            // An unreadable cache entry still leaves the network path.
            Err(e) => warn!(key = %tile.key(), error = %e, "Tile cache read failed"),
        }

        let url = self.config.tile_url(tile.z, tile.x, tile.y);
        let bytes = match self.fetcher.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %tile.key(), error = %e, "Tile fetch failed");
                return TileOutcome::Failed;
            }
        };

        match self.tiles.put(tile, bytes, &url).await {
            Ok(()) => TileOutcome::Fetched,
            Err(e) => {
                warn!(key = %tile.key(), error = %e, "Tile store failed");
                TileOutcome::Failed
            }
        }
    }
}
