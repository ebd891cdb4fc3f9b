use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("MQTT broker is not connected")]
    Disconnected,

    #[error("Channel send error")]
    ChannelSend,
}

/// Coarse failure classes used to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed user input, reported back to the caller.
    Validation,
    /// Broker or payload trouble; logged and the message is dropped.
    Transport,
    /// Durable store failure.
    Storage,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Mqtt(_) | Error::Disconnected | Error::Payload(_) | Error::ChannelSend => {
                ErrorKind::Transport
            }
            Error::Database(_) | Error::Migration(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
