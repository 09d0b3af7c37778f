/// # Backend
///
/// A backend is where a collection of records is durably kept. The registry
/// and the secret store cache their collection in memory. Every mutation
/// takes the backend lock, reloads the collection, applies the change and
/// writes it back before the lock is released, so several processes may
/// share one backend.
use crate::primitives::{StoreError, StoreResult};
use fs2::FileExt;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Exclusive hold on a collection, released when dropped.
#[derive(Debug)]
pub struct CollectionLock(Option<File>);

impl CollectionLock {
    /// A lock for collections which live in a single process, where the
    /// owner's own lock already serializes writers
    pub fn local() -> Self {
        Self(None)
    }
}

impl Drop for CollectionLock {
    fn drop(&mut self) {
        if let Some(file) = &self.0 {
            // closing the file releases the lock anyway
            let _ = file.unlock();
        }
    }
}

/// Trait which must be implemented by durable stores of a record collection.
pub trait Collection<T>: Send + Sync {
    /// Returns every record, in insertion order
    fn load(&self) -> StoreResult<Vec<T>>;

    /// Replaces the whole collection with `records`
    fn replace_all(&self, records: &[T]) -> StoreResult<()>;

    /// Locks the collection against every other writer until the returned
    /// guard is dropped. Backends reachable from several processes must
    /// lock across processes.
    fn lock(&self) -> StoreResult<CollectionLock> {
        Ok(CollectionLock::local())
    }
}

impl<T, C> Collection<T> for Arc<C>
where
    C: Collection<T> + ?Sized,
{
    fn load(&self) -> StoreResult<Vec<T>> {
        (**self).load()
    }

    fn replace_all(&self, records: &[T]) -> StoreResult<()> {
        (**self).replace_all(records)
    }

    fn lock(&self) -> StoreResult<CollectionLock> {
        (**self).lock()
    }
}

/// A collection kept in memory, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryCollection<T> {
    records: Mutex<Vec<T>>,
}

impl<T> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn with(records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl<T> Collection<T> for MemoryCollection<T>
where
    T: Clone + Send + Sync,
{
    fn load(&self) -> StoreResult<Vec<T>> {
        let records = self
            .records
            .lock()
            .map_err(|_| StoreError::Poisoned("memory"))?;
        Ok(records.clone())
    }

    fn replace_all(&self, records: &[T]) -> StoreResult<()> {
        let mut stored = self
            .records
            .lock()
            .map_err(|_| StoreError::Poisoned("memory"))?;
        *stored = records.to_vec();
        Ok(())
    }
}

/// A collection stored as a pretty-printed JSON array in a single file.
///
/// A missing file is an empty collection. Writes go to a sibling temporary
/// file which is then renamed over the target, so a crash mid-write never
/// leaves a truncated file behind. The lock is an advisory lock on a sibling
/// `.lock` file, shared by every process opening the same path.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create_parent(&self) -> StoreResult<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl<T> Collection<T> for JsonFile
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> StoreResult<Vec<T>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let data = fs::read(&self.path)?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    fn replace_all(&self, records: &[T]) -> StoreResult<()> {
        self.create_parent()?;

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            serde_json::to_writer_pretty(&mut f, records)?;
            f.write_all(b"\n")?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<CollectionLock> {
        self.create_parent()?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.path.with_extension("json.lock"))?;
        file.lock_exclusive()?;
        Ok(CollectionLock(Some(file)))
    }
}
