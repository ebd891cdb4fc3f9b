use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Soil moisture reading as persisted by the subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A crop record managed through the REST API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    pub id: Uuid,
    pub name: String,
    pub sow_date: NaiveDate,
    pub harvest_date: Option<NaiveDate>,
}

/// Validated crop fields, ready to be handed to a store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCrop {
    pub name: String,
    pub sow_date: NaiveDate,
    pub harvest_date: Option<NaiveDate>,
}

/// Body of `POST /api/crops`.
///
/// Every field is optional on the wire so that missing values reach
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropInput {
    pub name: Option<String>,
    pub sow_date: Option<String>,
    pub harvest_date: Option<String>,
}

/// A raw message as delivered on the telemetry topic.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl ChannelMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}
