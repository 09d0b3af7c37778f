use crate::field::Block;
use crate::group::{Element, Idx, Scalar};
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eval<A> {
    pub value: A,
    pub index: Idx,
}

impl<A: fmt::Display> fmt::Display for Eval<A> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{ idx: {}, value: {} }}", self.index, self.value)
    }
}

/// A polynomial that is using a scalar for the variable x and a generic
/// element for the coefficients. The coefficients must be able to multiply
/// the type of the variable, which is always a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poly<C>(Vec<C>);

impl<C> Poly<C> {
    /// Returns the degree of the polynomial
    pub fn degree(&self) -> usize {
        // e.g. c_3 * x^3 + c_2 * x^2 + c_1 * x + c_0
        // ^ 4 coefficients correspond to a 3rd degree poly
        self.0.len() - 1
    }
}

impl<C: Element> Poly<C> {
    /// Returns the constant term of the polynomial, i.e. the shared secret.
    pub fn secret(&self) -> &C {
        &self.0[0]
    }
}

impl Poly<Block> {
    /// Returns a polynomial of the given degree whose constant term is
    /// `secret` and whose other coefficients are random blocks of the same
    /// length.
    pub fn hiding<R: RngCore + ?Sized>(secret: Block, degree: usize, rng: &mut R) -> Self {
        let len = secret.len();
        let mut coeffs = Vec::with_capacity(degree + 1);
        coeffs.push(secret);
        coeffs.extend((0..degree).map(|_| Block::random(len, rng)));
        Self::from(coeffs)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolyError {
    #[error("Invalid recovery: only has {0}/{1} shares")]
    InvalidRecovery(usize, usize),
    #[error("Share index {0} appears more than once")]
    DuplicateIndex(Idx),
    #[error("Share index 0 is reserved for the secret")]
    ZeroIndex,
    #[error("Could not invert scalar")]
    NoInverse,
}

impl<C> Poly<C>
where
    C: Element,
    C::RHS: Scalar,
{
    /// Evaluates the polynomial at the field point of the given index.
    ///
    /// Index 0 is the secret itself; callers that hand out evaluations must
    /// never use it.
    pub fn eval(&self, i: Idx) -> Eval<C> {
        let xi = C::RHS::from_index(i);

        let res = self.0.iter().rev().fold(C::zero(), |mut sum, coeff| {
            sum.mul(&xi);
            sum.add(coeff);
            sum
        });

        Eval {
            value: res,
            index: i,
        }
    }

    /// Given at least `t` polynomial evaluations, it will recover the polynomial's
    /// constant term.
    ///
    /// Only the first `t` evaluations (by index) are used. When they come from
    /// a polynomial of degree `>= t` the result is some value unrelated to the
    /// real constant term; nothing here can detect that.
    pub fn recover(t: usize, shares: Vec<Eval<C>>) -> Result<C, PolyError> {
        let xs = Self::share_map(t, shares)?;

        // iterate over all indices and for each multiply the lagrange basis
        // with the value of the share
        let mut acc = C::zero();
        for (i, xi) in &xs {
            let mut yi = xi.1.clone();
            let mut num = C::RHS::one();
            let mut den = C::RHS::one();

            for (j, xj) in &xs {
                if i == j {
                    continue;
                }

                // xj - 0
                num.mul(&xj.0);

                // 1 / (xj - xi)
                let mut tmp = xj.0;
                tmp.sub(&xi.0);
                den.mul(&tmp);
            }

            let inv = den.inverse().ok_or(PolyError::NoInverse)?;
            num.mul(&inv);
            yi.mul(&num);
            acc.add(&yi);
        }

        Ok(acc)
    }

    fn share_map(
        t: usize,
        mut shares: Vec<Eval<C>>,
    ) -> Result<BTreeMap<Idx, (C::RHS, C)>, PolyError> {
        if shares.len() < t {
            return Err(PolyError::InvalidRecovery(shares.len(), t));
        }

        // first sort the shares as it can happens recovery happens for
        // non-correlated shares so the subset chosen becomes important
        shares.sort_by(|a, b| a.index.cmp(&b.index));

        let mut xs = BTreeMap::new();
        for sh in shares.into_iter().take(t) {
            if sh.index == 0 {
                return Err(PolyError::ZeroIndex);
            }
            let xi = C::RHS::from_index(sh.index);
            if xs.insert(sh.index, (xi, sh.value)).is_some() {
                return Err(PolyError::DuplicateIndex(sh.index));
            }
        }

        debug_assert_eq!(xs.len(), t);

        Ok(xs)
    }
}

impl<C: Element> From<Vec<C>> for Poly<C> {
    fn from(c: Vec<C>) -> Self {
        Self(c)
    }
}

impl<C: Element> From<Poly<C>> for Vec<C> {
    fn from(poly: Poly<C>) -> Self {
        poly.0
    }
}

impl<C: fmt::Display> fmt::Display for Poly<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = self
            .0
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}: {}", i, c))
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "[deg: {}, coeffs: [{}]]", self.degree(), s)
    }
}
