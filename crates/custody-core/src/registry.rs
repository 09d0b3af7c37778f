use crate::backend::Collection;
use crate::primitives::{
    Custodian, CustodyError, CustodyResult, SecretId, StoreError, StoreResult, UserId,
};
use chrono::Utc;
use std::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

/// Most dummy custodians a single call may register.
pub const MAX_DUMMY_BATCH: usize = 1000;

/// The set of registered custodians and the shares they hold.
///
/// The collection is cached behind a lock and reads are served from the
/// cache. Every mutation runs under the write lock and the backend lock,
/// starts from a fresh load of the backend and is persisted before the locks
/// are released. A mutation that fails, or whose persistence fails, leaves
/// the backend as it was.
pub struct CustodianRegistry<B> {
    backend: B,
    custodians: RwLock<Vec<Custodian>>,
    capacity: usize,
}

/// Indices of the custodians which may receive a share of `secret_id`,
/// least loaded first. Ties keep registration order since the sort is stable.
fn eligible(
    custodians: &[Custodian],
    secret_id: &SecretId,
    owner: UserId,
    capacity: usize,
) -> Vec<usize> {
    let mut idx = custodians
        .iter()
        .enumerate()
        .filter(|(_, c)| c.id != owner && !c.holds(secret_id) && c.total_shards_held < capacity)
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    idx.sort_by_key(|i| custodians[*i].total_shards_held);
    idx
}

fn assign_to(custodian: &mut Custodian, secret_id: SecretId, share: String) -> CustodyResult<()> {
    if custodian.holds(&secret_id) {
        return Err(CustodyError::AlreadyAssigned {
            custodian: custodian.id,
            secret_id,
        });
    }
    custodian.shards.insert(secret_id, share);
    custodian.total_shards_held += 1;
    custodian.last_assignment_date = Some(Utc::now());
    Ok(())
}

impl<B> CustodianRegistry<B>
where
    B: Collection<Custodian>,
{
    /// Loads the registry from its backend.
    pub fn open(backend: B, capacity: usize) -> StoreResult<Self> {
        let custodians = backend.load()?;
        debug!(custodians = custodians.len(), "custodian registry loaded");
        Ok(Self {
            backend,
            custodians: RwLock::new(custodians),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<Custodian>>> {
        self.custodians
            .read()
            .map_err(|_| StoreError::Poisoned("custodians"))
    }

    /// Applies `f` to the collection and persists the result, atomically.
    fn mutate<R, F>(&self, f: F) -> CustodyResult<R>
    where
        F: FnOnce(&mut Vec<Custodian>) -> CustodyResult<R>,
    {
        let mut custodians = self
            .custodians
            .write()
            .map_err(|_| StoreError::Poisoned("custodians"))?;
        let _lock = self.backend.lock()?;

        // another process may have written since the last load
        *custodians = self.backend.load()?;
        let snapshot = custodians.clone();

        let res = match f(&mut custodians) {
            Ok(res) => res,
            Err(err) => {
                *custodians = snapshot;
                return Err(err);
            }
        };

        if let Err(err) = self.backend.replace_all(&custodians) {
            *custodians = snapshot;
            return Err(err.into());
        }

        Ok(res)
    }

    /// Registers a new custodian. Registering an existing id again fails
    /// with `AlreadyRegistered` and changes nothing.
    pub fn register(&self, id: UserId, username: Option<String>) -> CustodyResult<Custodian> {
        let custodian = self.mutate(|custodians| {
            if custodians.iter().any(|c| c.id == id) {
                return Err(CustodyError::AlreadyRegistered(id));
            }
            let custodian = Custodian::new(id, username);
            custodians.push(custodian.clone());
            Ok(custodian)
        })?;

        info!(custodian = id, "new custodian registered");
        Ok(custodian)
    }

    pub fn get(&self, id: UserId) -> CustodyResult<Custodian> {
        self.read()?
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(CustodyError::CustodianNotFound(id))
    }

    /// Returns every custodian, in registration order
    pub fn list(&self) -> CustodyResult<Vec<Custodian>> {
        Ok(self.read()?.clone())
    }

    /// Number of custodians that could hold a share of a new secret of `owner`.
    pub fn available_count(&self, owner: UserId) -> CustodyResult<usize> {
        Ok(self
            .read()?
            .iter()
            .filter(|c| c.id != owner && c.total_shards_held < self.capacity)
            .count())
    }

    /// Returns up to `count` custodians eligible for a share of `secret_id`:
    /// not the owner, not already holding a share of it and under capacity,
    /// least loaded first and in registration order among equals.
    pub fn list_eligible(
        &self,
        secret_id: &SecretId,
        owner: UserId,
        count: usize,
    ) -> CustodyResult<Vec<UserId>> {
        let custodians = self.read()?;
        Ok(eligible(&custodians, secret_id, owner, self.capacity)
            .into_iter()
            .take(count)
            .map(|i| custodians[i].id)
            .collect())
    }

    /// Hands `share` of `secret_id` to the given custodian.
    pub fn assign(&self, custodian: UserId, secret_id: SecretId, share: String) -> CustodyResult<()> {
        self.mutate(|custodians| {
            let c = custodians
                .iter_mut()
                .find(|c| c.id == custodian)
                .ok_or(CustodyError::CustodianNotFound(custodian))?;
            assign_to(c, secret_id, share)
        })?;
        debug!(custodian, %secret_id, "share assigned");
        Ok(())
    }

    /// Selects one eligible custodian per share and assigns the shares in
    /// order, as a single atomic step. If there are fewer eligible
    /// custodians than shares, nothing is assigned.
    ///
    /// Returns the custodians in the order of the shares they received.
    pub fn assign_batch(
        &self,
        secret_id: SecretId,
        owner: UserId,
        shares: Vec<String>,
    ) -> CustodyResult<Vec<UserId>> {
        let required = shares.len();
        let capacity = self.capacity;

        self.mutate(|custodians| {
            let picked = eligible(custodians, &secret_id, owner, capacity);
            if picked.len() < required {
                return Err(CustodyError::InsufficientCustodians {
                    available: picked.len(),
                    required,
                });
            }

            let mut holders = Vec::with_capacity(required);
            for (i, share) in picked.into_iter().zip(shares) {
                assign_to(&mut custodians[i], secret_id, share)?;
                holders.push(custodians[i].id);
            }
            Ok(holders)
        })
    }

    /// Takes the shares of `secret_id` back from the given custodians. Used
    /// to undo a batch whose secret could not be marked as distributed.
    pub fn release(&self, secret_id: &SecretId, holders: &[UserId]) -> CustodyResult<()> {
        self.mutate(|custodians| {
            for c in custodians.iter_mut().filter(|c| holders.contains(&c.id)) {
                if c.shards.remove(secret_id).is_some() {
                    c.total_shards_held = c.total_shards_held.saturating_sub(1);
                }
            }
            Ok(())
        })
    }

    /// All shares held for `secret_id`, with their holder, in registry order.
    pub fn shares_for(&self, secret_id: &SecretId) -> CustodyResult<Vec<(UserId, String)>> {
        Ok(self
            .read()?
            .iter()
            .filter_map(|c| c.shards.get(secret_id).map(|s| (c.id, s.clone())))
            .collect())
    }

    /// The custodians holding a share of `secret_id`, with their usernames.
    pub fn holders_of(&self, secret_id: &SecretId) -> CustodyResult<Vec<(UserId, Option<String>)>> {
        Ok(self
            .read()?
            .iter()
            .filter(|c| c.holds(secret_id))
            .map(|c| (c.id, c.username.clone()))
            .collect())
    }

    /// Registers `count` dummy custodians with ids starting at `base`,
    /// skipping ids that already exist. Returns how many were added.
    ///
    /// `count` must be between 1 and [`MAX_DUMMY_BATCH`], and every id of the
    /// batch must fit in a [`UserId`].
    pub fn generate_dummy(&self, count: usize, base: UserId) -> CustodyResult<usize> {
        if count == 0 || count > MAX_DUMMY_BATCH {
            return Err(CustodyError::Validation(format!(
                "dummy custodian count must be between 1 and {}",
                MAX_DUMMY_BATCH
            )));
        }
        let ids = (0..count as UserId)
            .map(|i| base.checked_add(i))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                CustodyError::Validation(format!(
                    "{} dummy custodians starting at {} overflow the id space",
                    count, base
                ))
            })?;

        let added = self.mutate(|custodians| {
            let mut added = 0;
            for (i, id) in ids.into_iter().enumerate() {
                if custodians.iter().any(|c| c.id == id) {
                    continue;
                }
                custodians.push(Custodian::new(id, Some(format!("custodian_{}", i + 1))));
                added += 1;
            }
            Ok(added)
        })?;
        info!(requested = count, added, "generated dummy custodians");
        Ok(added)
    }

    /// Removes every custodian whose id is at or above `base`, together with
    /// the shares they hold. Only meant for clearing test fixtures.
    pub fn clear_dummy(&self, base: UserId) -> CustodyResult<usize> {
        let removed = self.mutate(|custodians| {
            let before = custodians.len();
            custodians.retain(|c| c.id < base);
            Ok(before - custodians.len())
        })?;
        info!(removed, "cleared dummy custodians");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{JsonFile, MemoryCollection};
    use crate::test_helpers::FailingCollection;
    use static_assertions::assert_impl_all;
    use std::sync::Arc;

    assert_impl_all!(CustodianRegistry<MemoryCollection<Custodian>>: Send, Sync);

    fn registry(ids: &[UserId]) -> CustodianRegistry<Arc<MemoryCollection<Custodian>>> {
        let reg = CustodianRegistry::open(Arc::new(MemoryCollection::new()), 100).unwrap();
        for id in ids {
            reg.register(*id, None).unwrap();
        }
        reg
    }

    fn shares(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("share-{}", i)).collect()
    }

    #[test]
    fn register_is_idempotent() {
        let reg = registry(&[]);
        let first = reg.register(1, Some("alice".into())).unwrap();

        let err = reg.register(1, Some("mallory".into())).unwrap_err();
        assert!(matches!(err, CustodyError::AlreadyRegistered(1)));
        assert_eq!(reg.get(1).unwrap(), first);
        assert_eq!(reg.list().unwrap().len(), 1);
    }

    #[test]
    fn eligibility_rules() {
        let reg = registry(&[1, 2, 3, 4]);
        let secret = SecretId::generate();

        // owner excluded
        assert_eq!(reg.list_eligible(&secret, 1, 10).unwrap(), vec![2, 3, 4]);

        // holder of the secret excluded
        reg.assign(3, secret, "s".into()).unwrap();
        assert_eq!(reg.list_eligible(&secret, 1, 10).unwrap(), vec![2, 4]);

        // count caps the result
        assert_eq!(reg.list_eligible(&secret, 1, 1).unwrap(), vec![2]);
    }

    #[test]
    fn eligibility_orders_by_load_then_registration() {
        let reg = registry(&[1, 2, 3, 4]);
        reg.assign(1, SecretId::generate(), "a".into()).unwrap();
        reg.assign(1, SecretId::generate(), "b".into()).unwrap();
        reg.assign(3, SecretId::generate(), "c".into()).unwrap();

        let fresh = SecretId::generate();
        assert_eq!(reg.list_eligible(&fresh, 99, 4).unwrap(), vec![2, 4, 3, 1]);
    }

    #[test]
    fn custodians_at_capacity_are_skipped() {
        let reg = CustodianRegistry::open(MemoryCollection::new(), 2).unwrap();
        reg.register(1, None).unwrap();
        reg.register(2, None).unwrap();
        reg.assign(1, SecretId::generate(), "a".into()).unwrap();
        reg.assign(1, SecretId::generate(), "b".into()).unwrap();

        assert_eq!(reg.list_eligible(&SecretId::generate(), 0, 5).unwrap(), vec![2]);
        assert_eq!(reg.available_count(0).unwrap(), 1);
        assert_eq!(reg.available_count(2).unwrap(), 0);
    }

    #[test]
    fn assign_updates_counters() {
        let reg = registry(&[1]);
        let secret = SecretId::generate();
        reg.assign(1, secret, "share".into()).unwrap();

        let c = reg.get(1).unwrap();
        assert_eq!(c.total_shards_held, 1);
        assert_eq!(c.shards.get(&secret).map(String::as_str), Some("share"));
        assert!(c.last_assignment_date.is_some());

        let err = reg.assign(1, secret, "again".into()).unwrap_err();
        assert!(matches!(err, CustodyError::AlreadyAssigned { custodian: 1, .. }));
        assert_eq!(reg.get(1).unwrap(), c);

        assert!(matches!(
            reg.assign(42, secret, "x".into()),
            Err(CustodyError::CustodianNotFound(42))
        ));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let backend = Arc::new(MemoryCollection::new());
        let reg = CustodianRegistry::open(backend.clone(), 100).unwrap();
        for id in 1..=3 {
            reg.register(id, None).unwrap();
        }
        let before = serde_json::to_vec(&backend.load().unwrap()).unwrap();

        let secret = SecretId::generate();
        let err = reg.assign_batch(secret, 1, shares(3)).unwrap_err();
        assert!(matches!(
            err,
            CustodyError::InsufficientCustodians {
                available: 2,
                required: 3
            }
        ));

        let after = serde_json::to_vec(&backend.load().unwrap()).unwrap();
        assert_eq!(before, after);
        assert!(reg.shares_for(&secret).unwrap().is_empty());
    }

    #[test]
    fn batch_assigns_in_order() {
        let reg = registry(&[1, 2, 3, 4]);
        let secret = SecretId::generate();
        let holders = reg.assign_batch(secret, 1, shares(3)).unwrap();
        assert_eq!(holders, vec![2, 3, 4]);

        let held = reg.shares_for(&secret).unwrap();
        assert_eq!(
            held,
            vec![
                (2, "share-0".to_string()),
                (3, "share-1".to_string()),
                (4, "share-2".to_string())
            ]
        );
    }

    #[test]
    fn release_undoes_a_batch() {
        let reg = registry(&[1, 2, 3]);
        let secret = SecretId::generate();
        let holders = reg.assign_batch(secret, 1, shares(2)).unwrap();
        reg.release(&secret, &holders).unwrap();

        assert!(reg.shares_for(&secret).unwrap().is_empty());
        assert!(reg.list().unwrap().iter().all(|c| c.total_shards_held == 0));
    }

    #[test]
    fn failed_persistence_rolls_back() {
        let reg = CustodianRegistry::open(FailingCollection::default(), 100).unwrap();
        assert!(matches!(
            reg.register(1, None),
            Err(CustodyError::Storage(_))
        ));
        assert!(reg.list().unwrap().is_empty());
    }

    #[test]
    fn dummy_fixtures() {
        let reg = registry(&[5]);
        assert_eq!(reg.generate_dummy(3, 1_000_000).unwrap(), 3);
        // existing ids are skipped
        assert_eq!(reg.generate_dummy(4, 1_000_000).unwrap(), 1);

        let dummy = reg.get(1_000_000).unwrap();
        assert_eq!(dummy.username.as_deref(), Some("custodian_1"));
        assert_eq!(reg.list().unwrap().len(), 5);

        assert_eq!(reg.clear_dummy(1_000_000).unwrap(), 4);
        let left = reg.list().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, 5);
    }

    #[test]
    fn dummy_batches_are_bounded() {
        let backend = Arc::new(MemoryCollection::new());
        let reg = CustodianRegistry::open(backend.clone(), 100).unwrap();
        reg.register(5, None).unwrap();
        let before = serde_json::to_vec(&backend.load().unwrap()).unwrap();

        for (count, base) in [(2, u64::MAX), (3, u64::MAX - 1), (0, 1_000_000), (1001, 1_000_000)] {
            let err = reg.generate_dummy(count, base).unwrap_err();
            assert!(matches!(err, CustodyError::Validation(_)), "{} at {}", count, base);
        }

        let after = serde_json::to_vec(&backend.load().unwrap()).unwrap();
        assert_eq!(before, after);
        assert_eq!(reg.list().unwrap().len(), 1);

        // the last id of the space is still usable
        assert_eq!(reg.generate_dummy(2, u64::MAX - 1).unwrap(), 2);
        assert_eq!(reg.generate_dummy(MAX_DUMMY_BATCH, 1_000_000).unwrap(), MAX_DUMMY_BATCH);
    }

    #[test]
    fn registries_sharing_a_file_see_each_others_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custodians.json");

        let a = CustodianRegistry::open(JsonFile::new(&path), 100).unwrap();
        for id in 1..=4 {
            a.register(id, None).unwrap();
        }
        let b = CustodianRegistry::open(JsonFile::new(&path), 100).unwrap();

        let first = SecretId::generate();
        let second = SecretId::generate();
        assert_eq!(a.assign_batch(first, 1, shares(2)).unwrap(), vec![2, 3]);
        // b's cache predates the first batch, the least loaded are now 4 then 2
        assert_eq!(b.assign_batch(second, 1, shares(2)).unwrap(), vec![4, 2]);

        let fresh = CustodianRegistry::open(JsonFile::new(&path), 100).unwrap();
        assert_eq!(fresh.shares_for(&first).unwrap().len(), 2);
        assert_eq!(fresh.shares_for(&second).unwrap().len(), 2);
        for c in fresh.list().unwrap() {
            assert_eq!(c.total_shards_held, c.shards.len());
        }
        assert_eq!(fresh.get(2).unwrap().total_shards_held, 2);
    }

    #[test]
    fn concurrent_writers_on_one_file_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custodians.json");

        let seed = CustodianRegistry::open(JsonFile::new(&path), 1000).unwrap();
        for id in 1..=8 {
            seed.register(id, None).unwrap();
        }

        let secrets = std::thread::scope(|s| {
            let workers = (0..4)
                .map(|_| {
                    let path = &path;
                    s.spawn(move || {
                        let reg = CustodianRegistry::open(JsonFile::new(path), 1000).unwrap();
                        (0..5)
                            .map(|_| {
                                let secret = SecretId::generate();
                                reg.assign_batch(secret, 1, shares(3)).unwrap();
                                secret
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap())
                .collect::<Vec<_>>()
        });

        let fresh = CustodianRegistry::open(JsonFile::new(&path), 1000).unwrap();
        for secret in &secrets {
            assert_eq!(fresh.shares_for(secret).unwrap().len(), 3);
        }
        let held = fresh
            .list()
            .unwrap()
            .iter()
            .map(|c| c.total_shards_held)
            .sum::<usize>();
        assert_eq!(held, secrets.len() * 3);
    }

    #[test]
    fn reopen_reads_persisted_state() {
        let backend = Arc::new(MemoryCollection::new());
        let secret = SecretId::generate();
        {
            let reg = CustodianRegistry::open(backend.clone(), 100).unwrap();
            reg.register(1, Some("alice".into())).unwrap();
            reg.assign(1, secret, "kept".into()).unwrap();
        }

        let reg = CustodianRegistry::open(backend, 100).unwrap();
        assert_eq!(reg.shares_for(&secret).unwrap(), vec![(1, "kept".to_string())]);
        assert_eq!(
            reg.holders_of(&secret).unwrap(),
            vec![(1, Some("alice".to_string()))]
        );
    }
}
