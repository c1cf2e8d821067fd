//! Offline service façade.
//!
//! `OfflineService` wires the store, managers, downloader, resolver, and
//! connectivity tracker together and exposes the operations the host
//! application calls: save/remove/list offline trips (with staged
//! progress including the optional map download), storage usage, tile
//! resolution, eviction, bulk clear, and the last-sync marker.
//!
//! The host's in-memory view (the offline-trips list shown in UI) is a
//! read-through cache of this service and must be refreshed after every
//! mutating call; it is not an independent source of truth.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::OfflineConfig;
use crate::connectivity::ConnectivityTracker;
use crate::download::{AreaDownloader, HttpTileFetcher, TileFetcher};
use crate::projection::TileAddress;
use crate::resolver::{ResolvedTile, TileResolver};
use crate::store::OfflineStore;
use crate::tiles::TileCache;
use crate::trips::{SavedTrip, StorageUsage, TripManager, TripSnapshot};

/// Meta key holding the last successful sync timestamp (epoch millis).
const LAST_SYNC_KEY: &str = "lastSync";

/// Progress percentages for the staged save-offline flow.
const PROGRESS_SAVING: u32 = 10;
const PROGRESS_TRIP_SAVED: u32 = 30;
const PROGRESS_MAPS_START: u32 = 40;
const PROGRESS_MAPS_SPAN: u32 = 55;
const PROGRESS_DONE: u32 = 100;

pub struct OfflineService {
    store: Arc<OfflineStore>,
    trips: TripManager,
    tiles: TileCache,
    downloader: AreaDownloader,
    resolver: TileResolver,
    connectivity: ConnectivityTracker,
    config: OfflineConfig,
}

impl OfflineService {
    /// Open the on-disk store and build the full subsystem with the
    /// reqwest-backed fetcher. `initially_online` is the platform's
    /// current connectivity signal.
    pub fn open(config: OfflineConfig, initially_online: bool) -> Result<Self> {
        let path = config.resolved_db_path()?;
        let store =
            Arc::new(OfflineStore::open(&path).context("Failed to open offline store")?);
        let fetcher: Arc<dyn TileFetcher> = Arc::new(
            HttpTileFetcher::new(config.request_timeout)
                .context("Failed to build tile fetcher")?,
        );
        Ok(Self::with_parts(store, fetcher, config, initially_online))
    }

    /// Build from explicit parts. Lets tests inject an in-memory store
    /// and a fake fetcher.
    pub fn with_parts(
        store: Arc<OfflineStore>,
        fetcher: Arc<dyn TileFetcher>,
        config: OfflineConfig,
        initially_online: bool,
    ) -> Self {
        let connectivity = ConnectivityTracker::new(initially_online);
        let trips = TripManager::new(store.clone());
        let tiles = TileCache::new(store.clone());
        let downloader = AreaDownloader::new(tiles.clone(), fetcher.clone(), config.clone());
        let resolver = TileResolver::new(
            tiles.clone(),
            fetcher,
            connectivity.clone(),
            config.clone(),
        );

        Self {
            store,
            trips,
            tiles,
            downloader,
            resolver,
            connectivity,
            config,
        }
    }

    pub fn trips(&self) -> &TripManager {
        &self.trips
    }

    pub fn tiles(&self) -> &TileCache {
        &self.tiles
    }

    pub fn connectivity(&self) -> &ConnectivityTracker {
        &self.connectivity
    }

    /// Save a trip snapshot and, when coordinates are available and
    /// `download_maps` is set, pre-download the surrounding map tiles.
    ///
    /// `on_progress` receives `(stage, percent)` pairs; a failed or
    /// partial map download is logged and does not fail the save.
    pub async fn save_trip_offline(
        &self,
        trip: &TripSnapshot,
        download_maps: bool,
        mut on_progress: impl FnMut(&str, u32) + Send,
    ) -> Result<()> {
        on_progress("Saving trip data...", PROGRESS_SAVING);
        self.trips
            .save(trip)
            .await
            .with_context(|| format!("Failed to save trip {}", trip.id))?;
        on_progress("Trip data saved", PROGRESS_TRIP_SAVED);

        if download_maps {
            if let (Some(lat), Some(lng)) = (trip.destination_lat, trip.destination_lng) {
                on_progress("Downloading map tiles...", PROGRESS_MAPS_START);
                self.downloader
                    .download_area(lat, lng, self.config.default_radius_km, |completed, total| {
                        let fraction = completed as f64 / total.max(1) as f64;
                        let percent =
                            PROGRESS_MAPS_START + (fraction * PROGRESS_MAPS_SPAN as f64).round() as u32;
                        on_progress(
                            &format!("Downloading maps: {}/{} tiles", completed, total),
                            percent,
                        );
                    })
                    .await;
            }
        }

        on_progress("Complete!", PROGRESS_DONE);
        Ok(())
    }

    /// Pre-populate the tile cache around a point. Returns the count of
    /// tiles confirmed present after the run.
    pub async fn download_map_tiles_for_area(
        &self,
        lat: f64,
        lng: f64,
        radius_km: Option<f64>,
        on_progress: impl FnMut(usize, usize) + Send,
    ) -> usize {
        let radius = radius_km.unwrap_or(self.config.default_radius_km);
        self.downloader.download_area(lat, lng, radius, on_progress).await
    }

    /// All offline-saved trips, most recently saved first.
    pub async fn offline_trips(&self) -> Result<Vec<SavedTrip>> {
        self.trips
            .list_all()
            .await
            .context("Failed to list offline trips")
    }

    pub async fn remove_trip_offline(&self, trip_id: &str) -> Result<()> {
        self.trips
            .remove(trip_id)
            .await
            .with_context(|| format!("Failed to remove trip {}", trip_id))
    }

    pub async fn is_trip_saved(&self, trip_id: &str) -> Result<bool> {
        self.trips
            .is_saved(trip_id)
            .await
            .with_context(|| format!("Failed to check trip {}", trip_id))
    }

    pub async fn storage_usage(&self) -> Result<StorageUsage> {
        self.trips
            .estimate_usage()
            .await
            .context("Failed to estimate storage usage")
    }

    /// Resolve one map tile for rendering. Never fails; degrades to a
    /// placeholder when offline and uncached.
    pub async fn resolve_tile(&self, z: u8, x: u32, y: u32) -> ResolvedTile {
        self.resolver.resolve(TileAddress { z, x, y }).await
    }

    /// Sweep cached tiles older than the configured max age. Intended
    /// for an explicit "free up space" action.
    pub async fn evict_stale_tiles(&self) -> Result<u64> {
        self.tiles
            .evict_older_than(self.config.tile_max_age)
            .await
            .context("Failed to evict stale tiles")
    }

    /// Unconditionally empty all three collections.
    pub async fn clear_all_offline_data(&self) -> Result<()> {
        self.store
            .clear_all()
            .await
            .context("Failed to clear offline data")
    }

    /// Record now as the last successful sync time.
    pub async fn set_last_sync(&self) -> Result<()> {
        let millis = Utc::now().timestamp_millis();
        self.store
            .put_meta(LAST_SYNC_KEY, &millis.to_string())
            .await
            .context("Failed to record last sync time")
    }

    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        let value = self
            .store
            .get_meta(LAST_SYNC_KEY)
            .await
            .context("Failed to read last sync time")?;
        Ok(value.and_then(|raw| {
            raw.parse::<i64>()
                .map_err(|e| warn!(raw = %raw, error = %e, "Unparseable last sync value"))
                .ok()
                .and_then(DateTime::from_timestamp_millis)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;

    use crate::error::OfflineError;

    struct CountingFetcher {
        calls: AtomicUsize,
    }

    impl TileFetcher for CountingFetcher {
        fn fetch<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, OfflineError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![0x89, 0x50])
            })
        }
    }

    fn service() -> (OfflineService, Arc<CountingFetcher>) {
        let fetcher = Arc::new(CountingFetcher {
            calls: AtomicUsize::new(0),
        });
        let config = OfflineConfig {
            min_zoom: 2,
            max_zoom: 3,
            batch_pause: std::time::Duration::from_millis(0),
            ..Default::default()
        };
        let store = Arc::new(OfflineStore::open_in_memory().unwrap());
        let service = OfflineService::with_parts(store, fetcher.clone(), config, true);
        (service, fetcher)
    }

    fn lisbon() -> TripSnapshot {
        TripSnapshot {
            id: "t1".to_string(),
            destination_name: "Lisbon".to_string(),
            destination_lat: Some(38.72),
            destination_lng: Some(-9.14),
            photo_url: None,
            days: 4,
            start_location: "Boston".to_string(),
            itinerary: vec![],
            checklist: vec![],
            is_public: None,
            share_id: None,
        }
    }

    #[tokio::test]
    async fn test_save_trip_offline_with_maps_reports_stages() {
        let (service, fetcher) = service();

        let mut percents: Vec<u32> = Vec::new();
        service
            .save_trip_offline(&lisbon(), true, |_stage, percent| percents.push(percent))
            .await
            .unwrap();

        assert_eq!(percents.first(), Some(&10));
        assert_eq!(percents.last(), Some(&100));
        for pair in percents.windows(2) {
            assert!(pair[1] >= pair[0], "progress must never decrease");
        }

        assert!(fetcher.calls.load(Ordering::SeqCst) > 0);
        assert!(service.tiles().count().await.unwrap() > 0);
        assert!(service.is_trip_saved("t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_save_without_coordinates_skips_map_download() {
        let (service, fetcher) = service();
        let mut trip = lisbon();
        trip.destination_lat = None;
        trip.destination_lng = None;

        service
            .save_trip_offline(&trip, true, |_, _| {})
            .await
            .unwrap();

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(service.is_trip_saved("t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_all_resets_usage_to_zero() {
        let (service, _) = service();
        service
            .save_trip_offline(&lisbon(), true, |_, _| {})
            .await
            .unwrap();
        service.set_last_sync().await.unwrap();

        service.clear_all_offline_data().await.unwrap();

        let usage = service.storage_usage().await.unwrap();
        assert_eq!(usage.trip_count, 0);
        assert_eq!(usage.tile_count, 0);
        assert_eq!(usage.total_mb, 0.0);
        assert_eq!(service.last_sync().await.unwrap(), None);
        assert!(service.offline_trips().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_sync_roundtrip() {
        let (service, _) = service();
        assert_eq!(service.last_sync().await.unwrap(), None);

        let before = Utc::now();
        service.set_last_sync().await.unwrap();
        let recorded = service.last_sync().await.unwrap().unwrap();
        assert!(recorded >= before - chrono::Duration::milliseconds(1));
        assert!(recorded <= Utc::now());
    }

    #[tokio::test]
    async fn test_download_uses_default_radius_when_unset() {
        let (service, fetcher) = service();
        let count = service
            .download_map_tiles_for_area(38.72, -9.14, None, |_, _| {})
            .await;
        assert!(count > 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), count);
    }

    #[tokio::test]
    async fn test_resolve_tile_offline_is_placeholder() {
        let (service, _) = service();
        service.connectivity().set_online(false);

        let resolved = service.resolve_tile(12, 1, 1).await;
        assert_eq!(resolved.origin, crate::resolver::TileOrigin::Placeholder);
    }
}
