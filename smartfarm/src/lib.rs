//! Soil moisture telemetry pipeline: a simulated sensor publishing over MQTT,
//! a subscriber persisting readings, and a small REST API over the stored
//! readings and crop records.

pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod mqtt;
pub mod publisher;
pub mod rest;
pub mod service;
pub mod store;
pub mod subscriber;
pub mod validate;

pub use errors::{Error, ErrorKind, Result};
pub use model::{ChannelMessage, Crop, CropInput, NewCrop, Reading};
pub use service::QueryService;
pub use store::{MemoryStore, SharedStore, Store};
