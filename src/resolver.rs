//! Runtime tile resolver.
//!
//! Invoked once per visible map tile by the rendering layer. Resolution
//! is cache-first: a cached image that decodes cleanly wins; a corrupted
//! payload is treated as a miss; on a miss the resolver fetches from the
//! network when connectivity allows (persisting the result in a detached
//! task) and otherwise hands back a generated "Offline" placeholder.
//! Resolution never fails and performs no retries - the next request for
//! the same tile starts over from the cache step.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::OfflineConfig;
use crate::connectivity::ConnectivityTracker;
use crate::download::TileFetcher;
use crate::projection::TileAddress;
use crate::tiles::TileCache;

/// Neutral 256x256 tile shown when a tile is uncached and the network is
/// unavailable. Matches the raster tile footprint so the map never shows
/// a blank or broken cell.
const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="256" height="256"><rect fill="#f1f5f9" width="256" height="256"/><text x="128" y="128" text-anchor="middle" fill="#94a3b8" font-family="sans-serif" font-size="12">Offline</text></svg>"##;

/// Where a resolved tile image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOrigin {
    Cache,
    Network,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTile {
    pub bytes: Vec<u8>,
    pub origin: TileOrigin,
}

impl ResolvedTile {
    fn placeholder() -> Self {
        Self {
            bytes: PLACEHOLDER_SVG.as_bytes().to_vec(),
            origin: TileOrigin::Placeholder,
        }
    }

    /// The MIME type of `bytes` as handed to the rendering layer.
    pub fn content_type(&self) -> &'static str {
        match self.origin {
            TileOrigin::Placeholder => "image/svg+xml",
            _ => "image/png",
        }
    }
}

#[derive(Clone)]
pub struct TileResolver {
    tiles: TileCache,
    fetcher: Arc<dyn TileFetcher>,
    connectivity: ConnectivityTracker,
    config: OfflineConfig,
}

impl TileResolver {
    pub fn new(
        tiles: TileCache,
        fetcher: Arc<dyn TileFetcher>,
        connectivity: ConnectivityTracker,
        config: OfflineConfig,
    ) -> Self {
        Self {
            tiles,
            fetcher,
            connectivity,
            config,
        }
    }

    /// Resolve one tile address to renderable image bytes.
    pub async fn resolve(&self, tile: TileAddress) -> ResolvedTile {
        match self.tiles.get(tile).await {
            Ok(Some(bytes)) => {
                if image::load_from_memory(&bytes).is_ok() {
                    return ResolvedTile {
                        bytes,
                        origin: TileOrigin::Cache,
                    };
                }
                // Corrupted cache entry: fall through to the network as
                // if it were a miss.
                warn!(key = %tile.key(), "Cached tile failed to decode, refetching");
            }
            Ok(None) => {}
            Err(e) => {
                // Store unreachable: skip straight to the network path.
                warn!(key = %tile.key(), error = %e, "Tile cache unreachable");
            }
        }

        if self.connectivity.is_online() {
            let url = self.config.tile_url(tile.z, tile.x, tile.y);
            match self.fetcher.fetch(&url).await {
                Ok(bytes) => {
                    self.persist_detached(tile, bytes.clone(), url);
                    return ResolvedTile {
                        bytes,
                        origin: TileOrigin::Network,
                    };
                }
                Err(e) => {
                    warn!(key = %tile.key(), error = %e, "Tile network fallback failed");
                }
            }
        } else {
            debug!(key = %tile.key(), "Offline with no cached tile, using placeholder");
        }

        ResolvedTile::placeholder()
    }

    /// Persist a freshly fetched tile without coupling render latency to
    /// cache-write latency: the task is detached and its failure is only
    /// logged.
    fn persist_detached(&self, tile: TileAddress, bytes: Vec<u8>, url: String) {
        let tiles = self.tiles.clone();
        tokio::spawn(async move {
            if let Err(e) = tiles.put(tile, bytes, &url).await {
                warn!(key = %tile.key(), error = %e, "Detached tile persist failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    use futures::future::BoxFuture;

    use crate::error::OfflineError;
    use crate::store::OfflineStore;

    struct StaticFetcher {
        response: Result<Vec<u8>, ()>,
    }

    impl TileFetcher for StaticFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, OfflineError>> {
            let response = self.response.clone().map_err(|_| OfflineError::TileStatus {
                status: 500,
                url: url.to_string(),
            });
            Box::pin(async move { response })
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::new_rgba8(1, 1);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn resolver(online: bool, response: Result<Vec<u8>, ()>) -> (TileResolver, TileCache) {
        let store = Arc::new(OfflineStore::open_in_memory().unwrap());
        let tiles = TileCache::new(store);
        let resolver = TileResolver::new(
            tiles.clone(),
            Arc::new(StaticFetcher { response }),
            ConnectivityTracker::new(online),
            OfflineConfig::default(),
        );
        (resolver, tiles)
    }

    fn addr() -> TileAddress {
        TileAddress { z: 12, x: 1943, y: 1568 }
    }

    #[tokio::test]
    async fn test_cached_tile_wins_without_network() {
        // Fetcher would fail; the cache hit means it is never consulted.
        let (resolver, tiles) = resolver(true, Err(()));
        let png = png_bytes();
        tiles.put(addr(), png.clone(), "u").await.unwrap();

        let resolved = resolver.resolve(addr()).await;
        assert_eq!(resolved.origin, TileOrigin::Cache);
        assert_eq!(resolved.bytes, png);
    }

    #[tokio::test]
    async fn test_offline_uncached_yields_placeholder() {
        let (resolver, _) = resolver(false, Ok(png_bytes()));
        let resolved = resolver.resolve(addr()).await;
        assert_eq!(resolved.origin, TileOrigin::Placeholder);
        assert_eq!(resolved.content_type(), "image/svg+xml");
        assert!(String::from_utf8_lossy(&resolved.bytes).contains("Offline"));
    }

    #[tokio::test]
    async fn test_miss_online_fetches_and_persists_detached() {
        let png = png_bytes();
        let (resolver, tiles) = resolver(true, Ok(png.clone()));

        let resolved = resolver.resolve(addr()).await;
        assert_eq!(resolved.origin, TileOrigin::Network);
        assert_eq!(resolved.bytes, png);

        // The persist is fire-and-forget; poll briefly for it to land.
        for _ in 0..100 {
            if tiles.get(addr()).await.unwrap().is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("detached persist never landed");
    }

    #[tokio::test]
    async fn test_corrupted_cache_falls_through_to_network() {
        let png = png_bytes();
        let (resolver, tiles) = resolver(true, Ok(png.clone()));
        tiles
            .put(addr(), b"definitely not an image".to_vec(), "u")
            .await
            .unwrap();

        let resolved = resolver.resolve(addr()).await;
        assert_eq!(resolved.origin, TileOrigin::Network);
        assert_eq!(resolved.bytes, png);
    }

    #[tokio::test]
    async fn test_corrupted_cache_offline_yields_placeholder() {
        let (resolver, tiles) = resolver(false, Ok(png_bytes()));
        tiles.put(addr(), vec![0, 1, 2], "u").await.unwrap();

        let resolved = resolver.resolve(addr()).await;
        assert_eq!(resolved.origin, TileOrigin::Placeholder);
    }

    #[tokio::test]
    async fn test_online_fetch_failure_degrades_to_placeholder() {
        let (resolver, _) = resolver(true, Err(()));
        let resolved = resolver.resolve(addr()).await;
        assert_eq!(resolved.origin, TileOrigin::Placeholder);
    }
}
