use crate::backend::Collection;
use crate::notifier::Notifier;
use crate::primitives::{
    Custodian, CustodyError, CustodyResult, Secret, SecretId, SecretStatus, UserId,
};
use crate::registry::CustodianRegistry;
use crate::store::SecretStore;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use threshold_sss::Share;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Outcome of a successful distribution.
#[derive(Debug)]
pub struct DistributionReport {
    pub secret_id: SecretId,
    /// Custodians in the order of the shares they received
    pub holders: Vec<UserId>,
    /// Background task delivering the notifications. Resolves to the number
    /// of custodians which were notified. Dropping it does not cancel it.
    pub notifications: JoinHandle<usize>,
}

/// Hands the shares of a secret to custodians, all of them or none.
pub struct DistributionCoordinator<R, S, N> {
    registry: Arc<CustodianRegistry<R>>,
    store: Arc<SecretStore<S>>,
    notifier: Arc<N>,
    notify_timeout: Duration,
}

impl<R, S, N> DistributionCoordinator<R, S, N>
where
    R: Collection<Custodian>,
    S: Collection<Secret>,
    N: Notifier + 'static,
{
    pub fn new(
        registry: Arc<CustodianRegistry<R>>,
        store: Arc<SecretStore<S>>,
        notifier: Arc<N>,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            notifier,
            notify_timeout,
        }
    }

    /// Assigns one share to each of `shares.len()` eligible custodians and
    /// marks the secret distributed.
    ///
    /// If not enough custodians are eligible, nothing is assigned and the
    /// secret stays pending. Custodians are notified in the background once
    /// the assignment is stored; delivery failures are only logged.
    ///
    /// Must be called from within a tokio runtime, otherwise `NoRuntime` is
    /// returned before anything is assigned.
    pub fn distribute(&self, secret: &Secret, shares: &[Share]) -> CustodyResult<DistributionReport> {
        let runtime = current_runtime()?;
        let secret_id = secret.secret_id;
        if secret.status != SecretStatus::Pending {
            return Err(CustodyError::InvalidTransition {
                secret_id,
                from: secret.status,
                to: SecretStatus::Distributed,
            });
        }
        if shares.len() != secret.total_shares {
            return Err(CustodyError::Validation(format!(
                "secret {} expects {} shares, got {}",
                secret_id,
                secret.total_shares,
                shares.len()
            )));
        }

        let encoded = shares.iter().map(Share::encode).collect();
        let holders = match self.registry.assign_batch(secret_id, secret.owner_id, encoded) {
            Ok(holders) => holders,
            Err(err) => {
                warn!(%secret_id, error = %err, "could not distribute shares");
                return Err(err);
            }
        };

        if let Err(err) = self.store.update_status(&secret_id, SecretStatus::Distributed) {
            error!(%secret_id, error = %err, "could not mark secret distributed, releasing shares");
            if let Err(release) = self.registry.release(&secret_id, &holders) {
                error!(%secret_id, error = %release, "could not release shares");
            }
            return Err(err);
        }

        info!(
            %secret_id,
            shares = holders.len(),
            threshold = secret.threshold,
            "shares distributed"
        );

        let notifications = runtime.spawn(notify_all(
            self.notifier.clone(),
            holders.clone(),
            assignment_message(&secret_id),
            self.notify_timeout,
        ));

        Ok(DistributionReport {
            secret_id,
            holders,
            notifications,
        })
    }
}

/// Handle of the runtime notifications are spawned on
pub(crate) fn current_runtime() -> CustodyResult<Handle> {
    Handle::try_current().map_err(|_| CustodyError::NoRuntime)
}

fn assignment_message(secret_id: &SecretId) -> String {
    format!(
        "You have been assigned a new share to protect.\n\n\
         Secret ID: {}\n\
         Assignment Date: {}\n\n\
         Please keep this share safe. You will be notified when it is needed for reconstruction.",
        secret_id,
        Utc::now().to_rfc3339()
    )
}

async fn notify_all<N: Notifier>(
    notifier: Arc<N>,
    holders: Vec<UserId>,
    text: String,
    timeout: Duration,
) -> usize {
    let mut delivered = 0;
    for to in holders {
        match tokio::time::timeout(timeout, notifier.notify(to, &text)).await {
            Ok(Ok(())) => {
                debug!(custodian = to, "custodian notified");
                delivered += 1;
            }
            Ok(Err(err)) => warn!(custodian = to, error = %err, "failed to notify custodian"),
            Err(_) => warn!(custodian = to, "notifying custodian timed out"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryCollection;
    use crate::primitives::NewSecret;
    use crate::test_helpers::{FailingNotifier, RecordingNotifier, StalledNotifier};
    use threshold_sss::split;

    type Coordinator<N> =
        DistributionCoordinator<MemoryCollection<Custodian>, MemoryCollection<Secret>, N>;

    fn setup<N: Notifier + 'static>(
        custodians: &[UserId],
        notifier: N,
    ) -> (Coordinator<N>, Arc<CustodianRegistry<MemoryCollection<Custodian>>>, Arc<SecretStore<MemoryCollection<Secret>>>) {
        let registry = Arc::new(CustodianRegistry::open(MemoryCollection::new(), 100).unwrap());
        for id in custodians {
            registry.register(*id, None).unwrap();
        }
        let store = Arc::new(SecretStore::open(MemoryCollection::new()).unwrap());
        let coordinator = DistributionCoordinator::new(
            registry.clone(),
            store.clone(),
            Arc::new(notifier),
            Duration::from_millis(50),
        );
        (coordinator, registry, store)
    }

    fn pending<B: Collection<Secret>>(store: &SecretStore<B>, owner: UserId, n: usize, t: usize) -> Secret {
        let id = store
            .create(NewSecret {
                owner_id: owner,
                owner_name: None,
                total_shares: n,
                threshold: t,
            })
            .unwrap();
        store.get_by_id(&id, None).unwrap()
    }

    #[tokio::test]
    async fn distributes_and_notifies() {
        let notifier = RecordingNotifier::default();
        let (coordinator, registry, store) = setup(&[1, 2, 3, 4], notifier.clone());
        let secret = pending(&store, 1, 3, 2);
        let shares = split(b"hello", 3, 2).unwrap();

        let report = coordinator.distribute(&secret, &shares).unwrap();
        assert_eq!(report.holders, vec![2, 3, 4]);
        assert_eq!(report.notifications.await.unwrap(), 3);

        let held = registry.shares_for(&secret.secret_id).unwrap();
        let expected = shares.iter().map(Share::encode).collect::<Vec<_>>();
        assert_eq!(held.into_iter().map(|(_, s)| s).collect::<Vec<_>>(), expected);

        assert_eq!(
            store.get_by_id(&secret.secret_id, None).unwrap().status,
            SecretStatus::Distributed
        );
        let sent = notifier.messages();
        assert_eq!(sent.iter().map(|(to, _)| *to).collect::<Vec<_>>(), vec![2, 3, 4]);
        assert!(sent[0].1.contains(&secret.secret_id.to_string()));
    }

    #[tokio::test]
    async fn too_few_custodians_keeps_secret_pending() {
        let (coordinator, registry, store) = setup(&[1, 2, 3], RecordingNotifier::default());
        let secret = pending(&store, 1, 3, 2);
        let shares = split(b"hello", 3, 2).unwrap();

        let err = coordinator.distribute(&secret, &shares).unwrap_err();
        assert!(matches!(
            err,
            CustodyError::InsufficientCustodians {
                available: 2,
                required: 3
            }
        ));
        assert!(registry.shares_for(&secret.secret_id).unwrap().is_empty());
        assert_eq!(
            store.get_by_id(&secret.secret_id, None).unwrap().status,
            SecretStatus::Pending
        );
    }

    #[tokio::test]
    async fn notification_failures_are_swallowed() {
        let (coordinator, _, store) = setup(&[1, 2, 3], FailingNotifier);
        let secret = pending(&store, 1, 2, 2);
        let shares = split(b"hello", 2, 2).unwrap();

        let report = coordinator.distribute(&secret, &shares).unwrap();
        assert_eq!(report.notifications.await.unwrap(), 0);
        assert_eq!(
            store.get_by_id(&secret.secret_id, None).unwrap().status,
            SecretStatus::Distributed
        );
    }

    #[tokio::test]
    async fn stalled_notifier_times_out() {
        let (coordinator, _, store) = setup(&[1, 2, 3], StalledNotifier);
        let secret = pending(&store, 1, 2, 2);
        let shares = split(b"hello", 2, 2).unwrap();

        let report = coordinator.distribute(&secret, &shares).unwrap();
        assert_eq!(report.notifications.await.unwrap(), 0);
    }

    #[tokio::test]
    async fn only_pending_secrets_are_distributed() {
        let (coordinator, _, store) = setup(&[1, 2, 3, 4, 5], RecordingNotifier::default());
        let secret = pending(&store, 1, 2, 2);
        let shares = split(b"hello", 2, 2).unwrap();
        coordinator.distribute(&secret, &shares).unwrap();

        let secret = store.get_by_id(&secret.secret_id, None).unwrap();
        assert!(matches!(
            coordinator.distribute(&secret, &shares),
            Err(CustodyError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn unrecorded_secret_releases_the_batch() {
        let (coordinator, registry, _) = setup(&[1, 2, 3], RecordingNotifier::default());
        let secret = Secret {
            secret_id: SecretId::generate(),
            owner_id: 1,
            owner_name: None,
            total_shares: 2,
            threshold: 2,
            created_at: Utc::now(),
            status: SecretStatus::Pending,
        };
        let shares = split(b"hello", 2, 2).unwrap();

        let err = coordinator.distribute(&secret, &shares).unwrap_err();
        assert!(matches!(err, CustodyError::SecretNotFound(_)));
        assert!(registry.shares_for(&secret.secret_id).unwrap().is_empty());
        assert!(registry
            .list()
            .unwrap()
            .iter()
            .all(|c| c.total_shards_held == 0));
    }

    #[test]
    fn no_runtime_leaves_everything_untouched() {
        let (coordinator, registry, store) = setup(&[1, 2, 3], RecordingNotifier::default());
        let secret = pending(&store, 1, 2, 2);
        let shares = split(b"hello", 2, 2).unwrap();

        let err = coordinator.distribute(&secret, &shares).unwrap_err();
        assert!(matches!(err, CustodyError::NoRuntime));
        assert!(registry.shares_for(&secret.secret_id).unwrap().is_empty());
        assert_eq!(
            store.get_by_id(&secret.secret_id, None).unwrap().status,
            SecretStatus::Pending
        );
    }

    #[tokio::test]
    async fn share_count_must_match() {
        let (coordinator, _, store) = setup(&[1, 2, 3, 4], RecordingNotifier::default());
        let secret = pending(&store, 1, 3, 2);
        let shares = split(b"hello", 2, 2).unwrap();
        let err = coordinator.distribute(&secret, &shares).unwrap_err();
        assert!(err.is_validation());
    }
}
