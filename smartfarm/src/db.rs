use crate::errors::Result;
use crate::model::{Crop, NewCrop, Reading};
use crate::store::Store;
use crate::validate::validate_crop_name;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

pub async fn make_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        sqlx::query("INSERT INTO readings (ts, value) VALUES ($1, $2)")
            .bind(reading.timestamp)
            .bind(reading.value)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_crop(&self, crop: &NewCrop) -> Result<Crop> {
        validate_crop_name(&crop.name)?;

        // id comes from the column default, so concurrent inserts never collide
        let created = sqlx::query_as::<_, Crop>(
            r#"
            INSERT INTO crops (name, sow_date, harvest_date)
            VALUES ($1, $2, $3)
            RETURNING id, name, sow_date, harvest_date
            "#,
        )
        .bind(&crop.name)
        .bind(crop.sow_date)
        .bind(crop.harvest_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn query_crops(&self) -> Result<Vec<Crop>> {
        let crops = sqlx::query_as::<_, Crop>(
            r#"
            SELECT id, name, sow_date, harvest_date
            FROM crops
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(crops)
    }

    async fn query_recent_readings(&self, limit: usize) -> Result<Vec<Reading>> {
        let readings = sqlx::query_as::<_, Reading>(
            r#"
            SELECT ts AS timestamp, value
            FROM readings
            ORDER BY ts DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(readings)
    }
}
