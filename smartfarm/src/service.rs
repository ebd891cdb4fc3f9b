use crate::errors::Result;
use crate::model::{Crop, CropInput, Reading};
use crate::store::SharedStore;
use crate::validate::validate_crop;

/// Number of readings served by `list_recent_readings`.
pub const RECENT_READINGS_LIMIT: usize = 10;

/// Request-facing operations, read-through to the store
#[derive(Clone)]
pub struct QueryService {
    store: SharedStore,
}

impl QueryService {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn create_crop(&self, input: CropInput) -> Result<Crop> {
        let crop = validate_crop(input)?;
        self.store.insert_crop(&crop).await
    }

    pub async fn list_crops(&self) -> Result<Vec<Crop>> {
        self.store.query_crops().await
    }

    pub async fn list_recent_readings(&self) -> Result<Vec<Reading>> {
        self.store.query_recent_readings(RECENT_READINGS_LIMIT).await
    }
}
