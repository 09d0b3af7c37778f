//! Splitting a secret into shares and combining shares back into the secret.
use crate::field::Block;
use crate::group::Idx;
use crate::poly::{Eval, Poly, PolyError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::seq::SliceRandom;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// The smallest threshold (and share count) accepted by [`split`].
pub const MIN_THRESHOLD: usize = 2;

/// Share indices are nonzero elements of GF(2^8), so at most 255 shares exist.
pub const MAX_SHARES: usize = 255;

#[derive(Debug, Error)]
pub enum SharingError {
    #[error("the secret is empty")]
    EmptySecret,

    #[error("invalid parameters: need 2 <= threshold ({threshold}) <= shares ({shares}) <= 255")]
    InvalidParameters { shares: usize, threshold: usize },

    #[error("at least 2 shares are required, got {0}")]
    NotEnoughShares(usize),

    #[error("share index {0} appears more than once")]
    DuplicateIndex(Idx),

    #[error("shares have different lengths ({0} and {1})")]
    InconsistentLength(usize, usize),

    #[error("malformed share: {0}")]
    Malformed(&'static str),

    #[error("could not decode share: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("interpolation failed: {0}")]
    PolyError(#[from] PolyError),
}

/// A share of a secret: the evaluation of the sharing polynomial at a
/// nonzero field point.
///
/// Its storage form is the base64 encoding of the value bytes followed by
/// the index byte.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share(Eval<Block>);

impl Share {
    pub fn index(&self) -> Idx {
        self.0.index
    }

    /// Length in bytes of the secret this share belongs to.
    pub fn secret_len(&self) -> usize {
        self.0.value.len()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.0.value.to_bytes();
        bytes.push(self.0.index);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SharingError> {
        let (index, value) = bytes
            .split_last()
            .ok_or(SharingError::Malformed("empty share"))?;
        if value.is_empty() {
            return Err(SharingError::Malformed("share carries no value"));
        }
        if *index == 0 {
            return Err(SharingError::Malformed("share index is zero"));
        }
        Ok(Self(Eval {
            value: Block::from(value),
            index: *index,
        }))
    }

    /// Returns the printable storage form of the share.
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn decode(encoded: &str) -> Result<Self, SharingError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_bytes(&bytes)
    }
}

// share values are secret material, only the index is printed
impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Share")
            .field("index", &self.0.index)
            .field("len", &self.0.value.len())
            .finish()
    }
}

fn check_parameters(shares: usize, threshold: usize) -> Result<(), SharingError> {
    if threshold < MIN_THRESHOLD || threshold > shares || shares > MAX_SHARES {
        return Err(SharingError::InvalidParameters { shares, threshold });
    }
    Ok(())
}

/// Splits `secret` into `n` shares, any `t` of which reconstruct it.
pub fn split(secret: &[u8], n: usize, t: usize) -> Result<Vec<Share>, SharingError> {
    split_from(secret, n, t, &mut rand::thread_rng())
}

/// Same as [`split`] with an explicit source of randomness. Both the
/// polynomial coefficients and the evaluation points are drawn from `rng`.
pub fn split_from<R: RngCore + ?Sized>(
    secret: &[u8],
    n: usize,
    t: usize,
    rng: &mut R,
) -> Result<Vec<Share>, SharingError> {
    if secret.is_empty() {
        return Err(SharingError::EmptySecret);
    }
    check_parameters(n, t)?;

    let poly = Poly::hiding(Block::from(secret), t - 1, rng);

    let mut points = (1..=MAX_SHARES as u16).map(|x| x as Idx).collect::<Vec<_>>();
    points.shuffle(rng);

    Ok(points
        .into_iter()
        .take(n)
        .map(|x| Share(poly.eval(x)))
        .collect())
}

/// Interpolates the secret from the given shares.
///
/// Every share supplied takes part in the interpolation. The result only
/// equals the original secret when at least the original threshold of
/// genuine shares of a single split are given; with fewer, some unrelated
/// bytes come out.
pub fn combine(shares: &[Share]) -> Result<Vec<u8>, SharingError> {
    if shares.len() < MIN_THRESHOLD {
        return Err(SharingError::NotEnoughShares(shares.len()));
    }

    let len = shares[0].secret_len();
    let mut seen = HashSet::with_capacity(shares.len());
    for share in shares {
        if share.secret_len() != len {
            return Err(SharingError::InconsistentLength(len, share.secret_len()));
        }
        if !seen.insert(share.index()) {
            return Err(SharingError::DuplicateIndex(share.index()));
        }
    }

    let evals = shares.iter().map(|s| s.0.clone()).collect::<Vec<_>>();
    let secret = Poly::<Block>::recover(evals.len(), evals)?;
    Ok(secret.to_bytes())
}

/// Decodes the storage form of each share and combines them.
pub fn combine_encoded<S: AsRef<str>>(encoded: &[S]) -> Result<Vec<u8>, SharingError> {
    let shares = encoded
        .iter()
        .map(|s| Share::decode(s.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    combine(&shares)
}
