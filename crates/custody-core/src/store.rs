use crate::backend::Collection;
use crate::primitives::{
    CustodyError, CustodyResult, NewSecret, Secret, SecretId, SecretStatus, StoreError,
    StoreResult, UserId,
};
use chrono::Utc;
use std::sync::{RwLock, RwLockReadGuard};
use threshold_sss::{MAX_SHARES, MIN_THRESHOLD};
use tracing::{debug, info};

/// Durable records of the secrets that were shared, without their content.
///
/// Mutations reload the backend under its lock before applying, so stores
/// in several processes may share one backend.
pub struct SecretStore<B> {
    backend: B,
    secrets: RwLock<Vec<Secret>>,
}

/// Checks that `2 <= threshold <= total_shares <= 255`
pub fn validate_parameters(total_shares: usize, threshold: usize) -> CustodyResult<()> {
    if threshold < MIN_THRESHOLD {
        return Err(CustodyError::Validation(format!(
            "threshold must be at least {}, got {}",
            MIN_THRESHOLD, threshold
        )));
    }
    if total_shares > MAX_SHARES {
        return Err(CustodyError::Validation(format!(
            "at most {} shares are supported, got {}",
            MAX_SHARES, total_shares
        )));
    }
    if threshold > total_shares {
        return Err(CustodyError::Validation(format!(
            "threshold {} exceeds the number of shares {}",
            threshold, total_shares
        )));
    }
    Ok(())
}

impl<B> SecretStore<B>
where
    B: Collection<Secret>,
{
    pub fn open(backend: B) -> StoreResult<Self> {
        let secrets = backend.load()?;
        debug!(secrets = secrets.len(), "secret store loaded");
        Ok(Self {
            backend,
            secrets: RwLock::new(secrets),
        })
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<Secret>>> {
        self.secrets
            .read()
            .map_err(|_| StoreError::Poisoned("secrets"))
    }

    fn mutate<R, F>(&self, f: F) -> CustodyResult<R>
    where
        F: FnOnce(&mut Vec<Secret>) -> CustodyResult<R>,
    {
        let mut secrets = self
            .secrets
            .write()
            .map_err(|_| StoreError::Poisoned("secrets"))?;
        let _lock = self.backend.lock()?;
        *secrets = self.backend.load()?;
        let snapshot = secrets.clone();

        let res = match f(&mut secrets) {
            Ok(res) => res,
            Err(err) => {
                *secrets = snapshot;
                return Err(err);
            }
        };

        if let Err(err) = self.backend.replace_all(&secrets) {
            *secrets = snapshot;
            return Err(err.into());
        }
        Ok(res)
    }

    /// Records a new pending secret and returns its fresh id.
    pub fn create(&self, meta: NewSecret) -> CustodyResult<SecretId> {
        validate_parameters(meta.total_shares, meta.threshold)?;

        let secret = Secret {
            secret_id: SecretId::generate(),
            owner_id: meta.owner_id,
            owner_name: meta.owner_name,
            total_shares: meta.total_shares,
            threshold: meta.threshold,
            created_at: Utc::now(),
            status: SecretStatus::Pending,
        };
        let id = secret.secret_id;

        self.mutate(|secrets| {
            secrets.push(secret);
            Ok(())
        })?;

        info!(secret_id = %id, owner = meta.owner_id, "secret recorded");
        Ok(id)
    }

    /// Every secret of `owner`, oldest first
    pub fn get_by_owner(&self, owner: UserId) -> CustodyResult<Vec<Secret>> {
        Ok(self
            .read()?
            .iter()
            .filter(|s| s.owner_id == owner)
            .cloned()
            .collect())
    }

    /// Fetches a secret. When `require_owner` is set, the secret must belong
    /// to that user or `Unauthorized` is returned.
    pub fn get_by_id(&self, id: &SecretId, require_owner: Option<UserId>) -> CustodyResult<Secret> {
        let secret = self
            .read()?
            .iter()
            .find(|s| &s.secret_id == id)
            .cloned()
            .ok_or(CustodyError::SecretNotFound(*id))?;

        match require_owner {
            Some(requester) if requester != secret.owner_id => Err(CustodyError::Unauthorized {
                secret_id: *id,
                requester,
            }),
            _ => Ok(secret),
        }
    }

    /// Moves a secret to `status`, if its lifecycle allows it.
    pub fn update_status(&self, id: &SecretId, status: SecretStatus) -> CustodyResult<()> {
        self.mutate(|secrets| {
            let secret = secrets
                .iter_mut()
                .find(|s| &s.secret_id == id)
                .ok_or(CustodyError::SecretNotFound(*id))?;
            if !secret.status.can_become(status) {
                return Err(CustodyError::InvalidTransition {
                    secret_id: *id,
                    from: secret.status,
                    to: status,
                });
            }
            secret.status = status;
            Ok(())
        })?;
        debug!(secret_id = %id, %status, "secret status updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{JsonFile, MemoryCollection};
    use crate::test_helpers::FailingCollection;
    use static_assertions::assert_impl_all;

    assert_impl_all!(SecretStore<MemoryCollection<Secret>>: Send, Sync);

    fn meta(owner: UserId, n: usize, t: usize) -> NewSecret {
        NewSecret {
            owner_id: owner,
            owner_name: None,
            total_shares: n,
            threshold: t,
        }
    }

    fn store() -> SecretStore<MemoryCollection<Secret>> {
        SecretStore::open(MemoryCollection::new()).unwrap()
    }

    #[test]
    fn create_validates() {
        let store = store();
        for (n, t) in &[(3, 1), (2, 3), (256, 2), (0, 0)] {
            let err = store.create(meta(1, *n, *t)).unwrap_err();
            assert!(err.is_validation(), "({}, {}) accepted", n, t);
        }
        assert!(store.get_by_owner(1).unwrap().is_empty());

        store.create(meta(1, 255, 255)).unwrap();
        store.create(meta(1, 2, 2)).unwrap();
    }

    #[test]
    fn created_secret_is_pending() {
        let store = store();
        let id = store.create(meta(7, 5, 3)).unwrap();

        let secret = store.get_by_id(&id, Some(7)).unwrap();
        assert_eq!(secret.status, SecretStatus::Pending);
        assert_eq!(secret.total_shares, 5);
        assert_eq!(secret.threshold, 3);
        assert_eq!(secret.owner_id, 7);
    }

    #[test]
    fn lookup_by_owner() {
        let store = store();
        let a = store.create(meta(1, 3, 2)).unwrap();
        let b = store.create(meta(1, 4, 2)).unwrap();
        store.create(meta(2, 3, 2)).unwrap();

        let ids = store
            .get_by_owner(1)
            .unwrap()
            .into_iter()
            .map(|s| s.secret_id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![a, b]);
        assert!(store.get_by_owner(3).unwrap().is_empty());
    }

    #[test]
    fn ownership_is_enforced() {
        let store = store();
        let id = store.create(meta(1, 3, 2)).unwrap();

        assert!(store.get_by_id(&id, None).is_ok());
        assert!(matches!(
            store.get_by_id(&id, Some(2)),
            Err(CustodyError::Unauthorized { requester: 2, .. })
        ));
        let missing = SecretId::generate();
        assert!(matches!(
            store.get_by_id(&missing, Some(1)),
            Err(CustodyError::SecretNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn status_lifecycle() {
        let store = store();
        let id = store.create(meta(1, 3, 2)).unwrap();

        assert!(matches!(
            store.update_status(&id, SecretStatus::Pending),
            Err(CustodyError::InvalidTransition { .. })
        ));
        store.update_status(&id, SecretStatus::Distributed).unwrap();
        store.update_status(&id, SecretStatus::Compromised).unwrap();
        assert!(matches!(
            store.update_status(&id, SecretStatus::Distributed),
            Err(CustodyError::InvalidTransition {
                from: SecretStatus::Compromised,
                ..
            })
        ));
        assert_eq!(
            store.get_by_id(&id, None).unwrap().status,
            SecretStatus::Compromised
        );
    }

    #[test]
    fn stores_sharing_a_file_keep_every_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");

        let a = SecretStore::open(JsonFile::new(&path)).unwrap();
        let b = SecretStore::open(JsonFile::new(&path)).unwrap();

        let first = a.create(meta(1, 3, 2)).unwrap();
        let second = b.create(meta(1, 3, 2)).unwrap();
        // b never saw `first` being created, yet it can update it
        b.update_status(&first, SecretStatus::Distributed).unwrap();
        a.update_status(&second, SecretStatus::Distributed).unwrap();

        let fresh = SecretStore::open(JsonFile::new(&path)).unwrap();
        let secrets = fresh.get_by_owner(1).unwrap();
        assert_eq!(
            secrets.iter().map(|s| s.secret_id).collect::<Vec<_>>(),
            vec![first, second]
        );
        assert!(secrets.iter().all(|s| s.status == SecretStatus::Distributed));
    }

    #[test]
    fn failed_write_is_not_visible() {
        let store = SecretStore::open(FailingCollection::default()).unwrap();
        assert!(matches!(
            store.create(meta(1, 3, 2)),
            Err(CustodyError::Storage(_))
        ));
        assert!(store.get_by_owner(1).unwrap().is_empty());
    }
}
