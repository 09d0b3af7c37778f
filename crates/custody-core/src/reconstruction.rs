use crate::backend::Collection;
use crate::primitives::{Custodian, CustodyError, CustodyResult, Secret, SecretId, UserId};
use crate::registry::CustodianRegistry;
use crate::store::SecretStore;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use threshold_sss::{combine, Share};
use tracing::{info, warn};

/// Collects the shares of a secret back from its custodians and combines them.
pub struct ReconstructionCoordinator<R, S> {
    registry: Arc<CustodianRegistry<R>>,
    store: Arc<SecretStore<S>>,
}

impl<R, S> ReconstructionCoordinator<R, S>
where
    R: Collection<Custodian>,
    S: Collection<Secret>,
{
    pub fn new(registry: Arc<CustodianRegistry<R>>, store: Arc<SecretStore<S>>) -> Self {
        Self { registry, store }
    }

    /// Reconstructs the secret `secret_id` for its owner.
    ///
    /// Ownership is checked before any share is looked at. Shares are taken
    /// in registry order; tokens which do not decode, or whose index was
    /// already seen, are skipped. Exactly `threshold` shares of one length
    /// are combined, shares of any other length are left out.
    pub fn reconstruct(&self, secret_id: &SecretId, requester: UserId) -> CustodyResult<Vec<u8>> {
        let secret = self.store.get_by_id(secret_id, Some(requester))?;
        let required = secret.threshold;

        info!(
            %secret_id,
            requester,
            threshold = required,
            total = secret.total_shares,
            "reconstructing secret"
        );

        // shares of differing lengths cannot belong to the same secret, so
        // they are grouped by length and the first complete group wins
        let mut groups: HashMap<usize, (HashSet<u8>, Vec<Share>)> = HashMap::new();
        let mut chosen = None;
        for (holder, token) in self.registry.shares_for(secret_id)? {
            let share = match Share::decode(&token) {
                Ok(share) => share,
                Err(err) => {
                    warn!(%secret_id, custodian = holder, error = %err, "skipping undecodable share");
                    continue;
                }
            };

            let len = share.secret_len();
            let (seen, group) = groups.entry(len).or_default();
            if !seen.insert(share.index()) {
                warn!(%secret_id, custodian = holder, index = share.index(), "skipping duplicate share");
                continue;
            }
            group.push(share);
            if group.len() == required {
                chosen = Some(len);
                break;
            }
        }

        if groups.len() > 1 {
            warn!(%secret_id, lengths = groups.len(), "shares of differing lengths were found");
        }

        let shares = match chosen.and_then(|len| groups.remove(&len)) {
            Some((_, shares)) => shares,
            None => {
                let found = groups.values().map(|(_, g)| g.len()).max().unwrap_or(0);
                warn!(%secret_id, found, required, "not enough shares");
                return Err(CustodyError::InsufficientShares { found, required });
            }
        };

        let plain = combine(&shares).map_err(CustodyError::Reconstruction)?;
        info!(%secret_id, "secret reconstructed");
        Ok(plain)
    }
}
