use super::backend::Collection;
use super::notifier::Notifier;
use super::primitives::{StoreError, StoreResult, UserId};
use async_trait::async_trait;
use std::{
    io,
    sync::{Arc, Mutex},
};

/// A backend which loads as empty and refuses every write
#[derive(Debug, Default)]
pub struct FailingCollection;

impl<T> Collection<T> for FailingCollection {
    fn load(&self) -> StoreResult<Vec<T>> {
        Ok(Vec::new())
    }

    fn replace_all(&self, _: &[T]) -> StoreResult<()> {
        Err(StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full")))
    }
}

/// A notifier keeping every message in memory. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(UserId, String)>>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(UserId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    type Error = StoreError;

    async fn notify(&self, to: UserId, text: &str) -> Result<(), Self::Error> {
        self.sent.lock().unwrap().push((to, text.to_string()));
        Ok(())
    }
}

/// A notifier whose transport is always down
#[derive(Debug)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    type Error = String;

    async fn notify(&self, to: UserId, _: &str) -> Result<(), Self::Error> {
        Err(format!("user {} is unreachable", to))
    }
}

/// A notifier which never answers
#[derive(Debug)]
pub struct StalledNotifier;

#[async_trait]
impl Notifier for StalledNotifier {
    type Error = String;

    async fn notify(&self, _: UserId, _: &str) -> Result<(), Self::Error> {
        futures::future::pending().await
    }
}
