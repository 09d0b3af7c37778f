use crate::backend::Collection;
use crate::config::CustodyConfig;
use crate::distribution::{current_runtime, DistributionCoordinator, DistributionReport};
use crate::notifier::Notifier;
use crate::primitives::{
    compute_optimal, Allocation, Custodian, CustodyError, CustodyResult, NewSecret, Secret,
    SecretId, StoreResult, UserId,
};
use crate::reconstruction::ReconstructionCoordinator;
use crate::registry::CustodianRegistry;
use crate::store::{validate_parameters, SecretStore};
use std::sync::Arc;
use threshold_sss::split;
use tracing::info;

/// A secret which was shared and handed to its custodians.
#[derive(Debug)]
pub struct Submission {
    pub secret: Secret,
    pub report: DistributionReport,
}

/// Entry point of the custody system, wiring the registry, the secret store
/// and both coordinators together.
pub struct CustodyService<R, S, N> {
    config: CustodyConfig,
    registry: Arc<CustodianRegistry<R>>,
    store: Arc<SecretStore<S>>,
    distribution: DistributionCoordinator<R, S, N>,
    reconstruction: ReconstructionCoordinator<R, S>,
}

impl<R, S, N> CustodyService<R, S, N>
where
    R: Collection<Custodian>,
    S: Collection<Secret>,
    N: Notifier + 'static,
{
    /// Loads both collections from their backends.
    pub fn open(config: CustodyConfig, custodians: R, secrets: S, notifier: N) -> StoreResult<Self> {
        let registry = Arc::new(CustodianRegistry::open(custodians, config.capacity)?);
        let store = Arc::new(SecretStore::open(secrets)?);
        let distribution = DistributionCoordinator::new(
            registry.clone(),
            store.clone(),
            Arc::new(notifier),
            config.notify_timeout(),
        );
        let reconstruction = ReconstructionCoordinator::new(registry.clone(), store.clone());

        Ok(Self {
            config,
            registry,
            store,
            distribution,
            reconstruction,
        })
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    pub fn registry(&self) -> &CustodianRegistry<R> {
        &self.registry
    }

    pub fn register_custodian(&self, id: UserId, username: Option<String>) -> CustodyResult<Custodian> {
        self.registry.register(id, username)
    }

    /// Number of custodians who could hold a share of a new secret of `owner`
    pub fn available_custodians(&self, owner: UserId) -> CustodyResult<usize> {
        self.registry.available_count(owner)
    }

    /// The share count and threshold `submit_secret` would use for `owner`
    pub fn recommended_allocation(&self, owner: UserId) -> CustodyResult<Allocation> {
        Ok(compute_optimal(self.available_custodians(owner)?))
    }

    /// Shares `secret` with the share count and threshold recommended for
    /// the current custodian pool.
    pub fn submit_secret(
        &self,
        owner: UserId,
        owner_name: Option<String>,
        secret: &[u8],
    ) -> CustodyResult<Submission> {
        if secret.is_empty() {
            return Err(CustodyError::Validation("the secret is empty".into()));
        }
        let allocation = self.recommended_allocation(owner)?;
        info!(
            owner,
            total_shares = allocation.total_shares,
            threshold = allocation.threshold,
            reason = %allocation.reason,
            "using recommended allocation"
        );
        self.submit_secret_with(
            owner,
            owner_name,
            secret,
            allocation.total_shares,
            allocation.threshold,
        )
    }

    /// Splits `secret` into `total_shares` shares, records it and hands the
    /// shares to custodians. If the distribution fails the secret stays
    /// recorded as pending and no custodian holds any of its shares.
    ///
    /// Must be called from within a tokio runtime, otherwise `NoRuntime` is
    /// returned and nothing is recorded.
    pub fn submit_secret_with(
        &self,
        owner: UserId,
        owner_name: Option<String>,
        secret: &[u8],
        total_shares: usize,
        threshold: usize,
    ) -> CustodyResult<Submission> {
        if secret.is_empty() {
            return Err(CustodyError::Validation("the secret is empty".into()));
        }
        validate_parameters(total_shares, threshold)?;
        current_runtime()?;

        let shares = split(secret, total_shares, threshold)
            .map_err(|err| CustodyError::Validation(err.to_string()))?;

        let secret_id = self.store.create(NewSecret {
            owner_id: owner,
            owner_name,
            total_shares,
            threshold,
        })?;
        let pending = self.store.get_by_id(&secret_id, None)?;

        let report = self.distribution.distribute(&pending, &shares)?;
        let secret = self.store.get_by_id(&secret_id, None)?;
        Ok(Submission { secret, report })
    }

    pub fn list_secrets(&self, owner: UserId) -> CustodyResult<Vec<Secret>> {
        self.store.get_by_owner(owner)
    }

    pub fn retrieve_secret(&self, secret_id: &SecretId, owner: UserId) -> CustodyResult<Vec<u8>> {
        self.reconstruction.reconstruct(secret_id, owner)
    }

    /// Who holds the shares of a secret. Only its owner may ask.
    pub fn secret_custodians(
        &self,
        secret_id: &SecretId,
        owner: UserId,
    ) -> CustodyResult<Vec<(UserId, Option<String>)>> {
        self.store.get_by_id(secret_id, Some(owner))?;
        self.registry.holders_of(secret_id)
    }

    pub fn generate_dummy_custodians(&self, count: usize) -> CustodyResult<usize> {
        self.registry.generate_dummy(count, self.config.dummy_id_base)
    }

    pub fn clear_dummy_custodians(&self) -> CustodyResult<usize> {
        self.registry.clear_dummy(self.config.dummy_id_base)
    }
}
