/// # Notifier
///
/// A notifier pushes a short text to a user. Delivery is best effort: the
/// distribution coordinator logs failures and carries on.
use crate::primitives::{StoreError, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fmt::Display,
    io::{self, Write},
    sync::{Arc, Mutex},
};

/// Trait which must be implemented by message transports. The transport is
/// assumed to route `to` to the right user.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Error raised when a message cannot be delivered
    type Error: Display + Send;

    /// Sends `text` to the user `to`
    async fn notify(&self, to: UserId, text: &str) -> Result<(), Self::Error>;
}

/// One delivered message, as written by the [`Outbox`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub to: UserId,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Notifier appending every message as a JSON line to a writer, e.g. a file
/// picked up by the actual messaging bridge.
///
/// Writes run on tokio's blocking pool, so a slow writer never stalls the
/// runtime and the caller's timeout still applies.
#[derive(Debug)]
pub struct Outbox<W> {
    writer: Arc<Mutex<W>>,
}

impl<W: Write> Outbox<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Returns the writer, or `None` while a write is still in flight.
    pub fn into_inner(self) -> Option<W> {
        Arc::try_unwrap(self.writer).ok()?.into_inner().ok()
    }
}

#[async_trait]
impl<W> Notifier for Outbox<W>
where
    W: Write + Send + 'static,
{
    type Error = StoreError;

    async fn notify(&self, to: UserId, text: &str) -> Result<(), Self::Error> {
        let msg = OutboxMessage {
            to,
            text: text.to_string(),
            sent_at: Utc::now(),
        };
        let mut line = serde_json::to_vec(&msg)?;
        line.push(b'\n');

        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut writer = writer.lock().map_err(|_| StoreError::Poisoned("outbox"))?;
            writer.write_all(&line)?;
            writer.flush()?;
            Ok(())
        })
        .await
        .map_err(|err| StoreError::Io(io::Error::new(io::ErrorKind::Other, err)))?
    }
}
