//! # Threshold Secret Sharing
//!
//! Shamir secret sharing over GF(2^8). A secret of any length is split into
//! `n` shares such that any `t` of them reconstruct it, while fewer reveal
//! nothing about it.
//!
//! ```rust
//! use threshold_sss::{combine, split, Share};
//!
//! let secret = b"correct horse battery staple";
//! let shares = split(&secret[..], 5, 3).unwrap();
//!
//! // shares are stored and transported in their base64 form
//! let stored = shares.iter().map(Share::encode).collect::<Vec<_>>();
//!
//! // any 3 of them give the secret back
//! let picked = stored[1..4]
//!     .iter()
//!     .map(|s| Share::decode(s).unwrap())
//!     .collect::<Vec<_>>();
//! assert_eq!(combine(&picked).unwrap(), secret.to_vec());
//! ```
//!
//! The whole secret is treated as a single [`Block`](field::Block) of field
//! elements and shared with one polynomial whose coefficients are blocks;
//! this is the same as sharing every byte with its own polynomial, with all
//! bytes evaluated at the same point.

/// Arithmetic over GF(2^8) and blocks of GF(2^8) elements.
pub mod field;

/// Definitions of generic traits for field scalars and the elements they multiply.
pub mod group;

/// Implementation of a polynomial suitable to be used for secret sharing schemes.
/// It can evaluate and interpolate shares to their corresponding polynomial.
pub mod poly;

mod share;
pub use share::{
    combine, combine_encoded, split, split_from, Share, SharingError, MAX_SHARES, MIN_THRESHOLD,
};
