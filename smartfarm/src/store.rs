//! Durable store abstraction for readings and crops.
//!
//! Handlers and the subscriber only see `Arc<dyn Store>`; the backend is
//! picked at startup (`PgStore` in production, `MemoryStore` for tests and
//! broker-only runs).

use crate::errors::Result;
use crate::model::{Crop, NewCrop, Reading};
use crate::validate::validate_crop_name;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[async_trait]
pub trait Store: Send + Sync {
    /// Appends a reading. No deduplication is performed.
    async fn insert_reading(&self, reading: &Reading) -> Result<()>;

    /// Persists a crop and returns it with its assigned identifier.
    async fn insert_crop(&self, crop: &NewCrop) -> Result<Crop>;

    /// All crops, in insertion order.
    async fn query_crops(&self) -> Result<Vec<Crop>>;

    /// Up to `limit` readings, newest first. Readings sharing a timestamp are
    /// returned most recently inserted first.
    async fn query_recent_readings(&self, limit: usize) -> Result<Vec<Reading>>;
}

pub type SharedStore = Arc<dyn Store>;

#[derive(Default)]
struct Tables {
    // (insertion sequence, reading)
    readings: Vec<(u64, Reading)>,
    crops: Vec<Crop>,
    next_seq: u64,
}

/// In-process store. The mutex serializes every write, so id assignment and
/// insertion sequence stay consistent under concurrent callers.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let seq = tables.next_seq;
        tables.next_seq += 1;
        tables.readings.push((seq, reading.clone()));
        Ok(())
    }

    async fn insert_crop(&self, crop: &NewCrop) -> Result<Crop> {
        validate_crop_name(&crop.name)?;

        let mut tables = self.tables.lock().await;
        let mut id = Uuid::new_v4();
        while tables.crops.iter().any(|c| c.id == id) {
            id = Uuid::new_v4();
        }

        let created = Crop {
            id,
            name: crop.name.clone(),
            sow_date: crop.sow_date,
            harvest_date: crop.harvest_date,
        };
        tables.crops.push(created.clone());
        Ok(created)
    }

    async fn query_crops(&self) -> Result<Vec<Crop>> {
        Ok(self.tables.lock().await.crops.clone())
    }

    async fn query_recent_readings(&self, limit: usize) -> Result<Vec<Reading>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<&(u64, Reading)> = tables.readings.iter().collect();
        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.timestamp.cmp(&a.timestamp).then(seq_b.cmp(seq_a))
        });

        Ok(rows
            .into_iter()
            .take(limit)
            .map(|(_, reading)| reading.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    fn reading(offset_secs: i64, value: f64) -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + Duration::seconds(offset_secs),
            value,
        }
    }

    #[tokio::test]
    async fn test_recent_readings_newest_first() {
        let store = MemoryStore::new();
        store.insert_reading(&reading(10, 1.0)).await.unwrap();
        store.insert_reading(&reading(30, 3.0)).await.unwrap();
        store.insert_reading(&reading(20, 2.0)).await.unwrap();

        let values: Vec<f64> = store
            .query_recent_readings(10)
            .await
            .unwrap()
            .iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![3.0, 2.0, 1.0]);
    }

    #[tokio::test]
    async fn test_recent_readings_limit_and_ties() {
        let store = MemoryStore::new();
        store.insert_reading(&reading(0, 1.0)).await.unwrap();
        store.insert_reading(&reading(5, 2.0)).await.unwrap();
        store.insert_reading(&reading(5, 3.0)).await.unwrap();

        let recent = store.query_recent_readings(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        // same timestamp: later insertion wins
        assert_eq!(recent[0].value, 3.0);
        assert_eq!(recent[1].value, 2.0);

        assert!(store.query_recent_readings(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_readings_are_not_deduplicated() {
        let store = MemoryStore::new();
        let r = reading(0, 55.0);
        store.insert_reading(&r).await.unwrap();
        store.insert_reading(&r).await.unwrap();
        assert_eq!(store.query_recent_readings(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_crop_assigns_id() {
        let store = MemoryStore::new();
        let crop = store
            .insert_crop(&NewCrop {
                name: "Wheat".to_string(),
                sow_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                harvest_date: None,
            })
            .await
            .unwrap();

        assert!(!crop.id.is_nil());
        assert_eq!(store.query_crops().await.unwrap(), vec![crop]);
    }

    #[tokio::test]
    async fn test_insert_crop_rejects_blank_name() {
        let store = MemoryStore::new();
        let err = store
            .insert_crop(&NewCrop {
                name: " ".to_string(),
                sow_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                harvest_date: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(store.query_crops().await.unwrap().is_empty());
    }
}
