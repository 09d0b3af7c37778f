//! Traits for operating on finite field elements and on the values shared
//! with them.

use rand_core::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::{Debug, Display};

/// Index of a share, i.e. the field point at which the sharing polynomial is
/// evaluated. Index 0 is reserved for the secret itself.
pub type Idx = u8;

/// Element represents an element of an additive group which is also
/// equipped with a multiplication by a scalar of its field.
/// Two implementations exist: the field [`Scalar`] itself, where RHS is the
/// same type, and blocks of scalars which are multiplied coordinate-wise.
pub trait Element:
    Clone + Display + Debug + Eq + Serialize + DeserializeOwned + PartialEq + Send + Sync
{
    /// The right-hand-side argument for multiplication
    type RHS;

    /// Returns the zero element of the group
    fn zero() -> Self;

    /// Adds the RHS element to the LHS element in place
    fn add(&mut self, s2: &Self);

    /// Multiplies the LHS element by the RHS element in place
    fn mul(&mut self, mul: &Self::RHS);
}

/// Scalar is an element of the field. It can only be multiplied by another
/// Scalar.
pub trait Scalar: Element<RHS = Self> + Copy {
    /// Returns the one element of the field
    fn one() -> Self;

    /// Samples a random element using the provided RNG
    fn rand<R: RngCore + ?Sized>(rng: &mut R) -> Self;

    /// Maps a share index to the field point it stands for
    fn from_index(i: Idx) -> Self;

    /// Returns the multiplicative inverse, or `None` for zero
    fn inverse(&self) -> Option<Self>;

    fn sub(&mut self, other: &Self);
}
