//! Trip snapshot manager.
//!
//! CRUD over offline trip snapshots plus the aggregate storage-usage
//! estimate. The snapshot DTO mirrors what the host application passes
//! in; the itinerary and packing checklist are opaque to this subsystem
//! and carried as raw JSON values.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OfflineError;
use crate::store::{OfflineStore, TripRow};

/// The offline-readable copy of one trip, as supplied by the host on
/// save. The trip id is externally assigned and unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TripSnapshot {
    pub id: String,
    pub destination_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub days: u32,
    pub start_location: String,
    #[serde(default)]
    pub itinerary: Vec<serde_json::Value>,
    #[serde(default)]
    pub checklist: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
}

/// A stored snapshot: the trip as passed in, plus the save timestamp
/// stamped at write time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SavedTrip {
    #[serde(flatten)]
    pub trip: TripSnapshot,
    #[serde(rename = "savedAt", with = "chrono::serde::ts_milliseconds")]
    pub saved_at: DateTime<Utc>,
}

/// Aggregate storage usage across the whole offline store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub trip_count: u64,
    pub tile_count: u64,
    pub total_mb: f64,
}

/// Manager for trip snapshots. Clone is cheap - the store handle is an
/// Arc.
#[derive(Clone)]
pub struct TripManager {
    store: Arc<OfflineStore>,
}

impl TripManager {
    pub fn new(store: Arc<OfflineStore>) -> Self {
        Self { store }
    }

    /// Stamp the current time and upsert by trip id. Re-saving the same
    /// id overwrites the earlier record.
    pub async fn save(&self, trip: &TripSnapshot) -> Result<(), OfflineError> {
        let saved_at = Utc::now();
        let row = TripRow {
            id: trip.id.clone(),
            body: serde_json::to_string(trip)?,
            saved_at: saved_at.timestamp_millis(),
        };
        self.store.put_trip(&row).await?;
        debug!(trip_id = %trip.id, "Trip snapshot saved");
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<SavedTrip>, OfflineError> {
        match self.store.get_trip(id).await? {
            Some(row) => Ok(Some(Self::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// All saved trips, most recently saved first.
    pub async fn list_all(&self) -> Result<Vec<SavedTrip>, OfflineError> {
        self.store
            .list_trips_newest_first()
            .await?
            .into_iter()
            .map(Self::from_row)
            .collect()
    }

    /// Remove one snapshot. Removing an absent id is a no-op, not an
    /// error.
    pub async fn remove(&self, id: &str) -> Result<(), OfflineError> {
        self.store.delete_trip(id).await
    }

    pub async fn is_saved(&self, id: &str) -> Result<bool, OfflineError> {
        Ok(self.get(id).await?.is_some())
    }

    /// Full-scan usage estimate: store cardinalities plus the summed
    /// serialized trip bytes and tile payload bytes, in megabytes rounded
    /// to two decimals. O(n) over the store - callers wanting frequent
    /// display should cache the result, not call this per render.
    pub async fn estimate_usage(&self) -> Result<StorageUsage, OfflineError> {
        let trip_count = self.store.count_trips().await?;
        let tile_count = self.store.count_tiles().await?;
        let total_bytes = self.store.sum_trip_bytes().await? + self.store.sum_tile_bytes().await?;
        let total_mb = (total_bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;

        Ok(StorageUsage {
            trip_count,
            tile_count,
            total_mb,
        })
    }

    fn from_row(row: TripRow) -> Result<SavedTrip, OfflineError> {
        let trip: TripSnapshot = serde_json::from_str(&row.body)?;
        let saved_at = DateTime::from_timestamp_millis(row.saved_at).unwrap_or_default();
        Ok(SavedTrip { trip, saved_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TileRow;

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

    fn manager() -> TripManager {
        TripManager::new(Arc::new(OfflineStore::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_save_list_check_remove_scenario() {
        let trips = manager();
        trips.save(&lisbon()).await.unwrap();

        let all = trips.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].trip.id, "t1");
        assert_eq!(all[0].trip.destination_name, "Lisbon");

        assert!(trips.is_saved("t1").await.unwrap());
        trips.remove("t1").await.unwrap();
        assert!(!trips.is_saved("t1").await.unwrap());
    }

    #[tokio::test]
    async fn test_resave_overwrites_not_appends() {
        let trips = manager();
        trips.save(&lisbon()).await.unwrap();

        let mut updated = lisbon();
        updated.destination_name = "Porto".to_string();
        updated.days = 7;
        trips.save(&updated).await.unwrap();

        let all = trips.list_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].trip.destination_name, "Porto");
        assert_eq!(all[0].trip.days, 7);
    }

    #[tokio::test]
    async fn test_list_all_most_recent_first() {
        let trips = manager();
        for id in ["a", "b", "c"] {
            let mut trip = lisbon();
            trip.id = id.to_string();
            trips.save(&trip).await.unwrap();
            // Distinct millisecond timestamps.
            std::thread::sleep(std::time::Duration::from_millis(3));
        }
        let ids: Vec<String> = trips
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.trip.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let trips = manager();
        trips.remove("never-saved").await.unwrap();
        assert!(!trips.is_saved("never-saved").await.unwrap());
    }

    #[tokio::test]
    async fn test_saved_at_serializes_as_epoch_millis() {
        let trips = manager();
        trips.save(&lisbon()).await.unwrap();
        let saved = trips.get("t1").await.unwrap().unwrap();

        let json = serde_json::to_value(&saved).unwrap();
        assert_eq!(json["id"], "t1");
        assert!(json["savedAt"].is_i64() || json["savedAt"].is_u64());
        // Optional fields stay absent rather than null.
        assert!(json.get("photoUrl").is_none());
    }

    #[tokio::test]
    async fn test_estimate_usage_counts_trips_and_tiles() {
        let store = Arc::new(OfflineStore::open_in_memory().unwrap());
        let trips = TripManager::new(store.clone());
        trips.save(&lisbon()).await.unwrap();

        store
            .put_tile(&TileRow {
                key: "10/1/1".to_string(),
                image: vec![0u8; 2 * 1024 * 1024],
                source_url: String::new(),
                saved_at: 1,
            })
            .await
            .unwrap();

        let usage = trips.estimate_usage().await.unwrap();
        assert_eq!(usage.trip_count, 1);
        assert_eq!(usage.tile_count, 1);
        // 2 MiB of tile payload dominates the tiny trip body.
        assert_eq!(usage.total_mb, 2.0);
    }

    #[tokio::test]
    async fn test_estimate_usage_empty_store_is_zero() {
        let trips = manager();
        let usage = trips.estimate_usage().await.unwrap();
        assert_eq!(
            usage,
            StorageUsage {
                trip_count: 0,
                tile_count: 0,
                total_mb: 0.0
            }
        );
    }
}
