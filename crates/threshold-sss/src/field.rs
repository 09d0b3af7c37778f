//! Arithmetic over GF(2^8) and over blocks of GF(2^8) elements.
//!
//! The field uses the AES reduction polynomial `x^8 + x^4 + x^3 + x + 1`
//! (0x11B). Multiplication and inversion go through exp/log tables built at
//! compile time from the generator `0x03`. Addition and subtraction are both
//! XOR.

use crate::group::{Element, Idx, Scalar};
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

const fn build_tables() -> ([u8; 256], [u8; 256]) {
    let mut exp = [0u8; 256];
    let mut log = [0u8; 256];
    let mut x: u8 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x;
        log[x as usize] = i as u8;
        // x * 3 = x * 2 + x, reducing by 0x11B on overflow
        let mut double = x << 1;
        if x & 0x80 != 0 {
            double ^= 0x1b;
        }
        x = double ^ x;
        i += 1;
    }
    exp[255] = exp[0];
    (exp, log)
}

const TABLES: ([u8; 256], [u8; 256]) = build_tables();
const EXP: [u8; 256] = TABLES.0;
const LOG: [u8; 256] = TABLES.1;

/// An element of GF(2^8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Gf256(u8);

impl Gf256 {
    pub const fn new(b: u8) -> Self {
        Self(b)
    }

    pub fn to_byte(self) -> u8 {
        self.0
    }

    fn product(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let l = LOG[a as usize] as usize + LOG[b as usize] as usize;
        EXP[l % 255]
    }
}

impl From<u8> for Gf256 {
    fn from(b: u8) -> Self {
        Self(b)
    }
}

impl fmt::Display for Gf256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

impl Element for Gf256 {
    type RHS = Gf256;

    fn zero() -> Self {
        Self(0)
    }

    fn add(&mut self, s2: &Self) {
        self.0 ^= s2.0;
    }

    fn mul(&mut self, mul: &Gf256) {
        self.0 = Self::product(self.0, mul.0);
    }
}

impl Scalar for Gf256 {
    fn one() -> Self {
        Self(1)
    }

    fn rand<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let mut b = [0u8; 1];
        rng.fill_bytes(&mut b);
        Self(b[0])
    }

    fn from_index(i: Idx) -> Self {
        Self(i)
    }

    fn inverse(&self) -> Option<Self> {
        if self.0 == 0 {
            return None;
        }
        let l = LOG[self.0 as usize] as usize;
        Some(Self(EXP[(255 - l) % 255]))
    }

    // characteristic 2: subtraction is addition
    fn sub(&mut self, other: &Self) {
        self.0 ^= other.0;
    }
}

/// A block is a vector of field elements which is added coordinate-wise and
/// multiplied by a single scalar. A secret of `L` bytes is one block of
/// length `L`, so a single polynomial with block coefficients shares every
/// byte of it at once.
///
/// The zero block is empty; adding blocks of different lengths pads the
/// shorter one with zeros.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block(Vec<Gf256>);

impl Block {
    /// Returns a block of `len` uniformly random elements.
    pub fn random<R: RngCore + ?Sized>(len: usize, rng: &mut R) -> Self {
        Self((0..len).map(|_| Gf256::rand(rng)).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().map(|e| e.to_byte()).collect()
    }
}

impl From<&[u8]> for Block {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.iter().copied().map(Gf256::from).collect())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl Element for Block {
    type RHS = Gf256;

    fn zero() -> Self {
        Self(vec![])
    }

    fn add(&mut self, s2: &Self) {
        if self.0.len() < s2.0.len() {
            self.0.resize(s2.0.len(), Gf256::zero());
        }
        self.0.iter_mut().zip(&s2.0).for_each(|(a, b)| a.add(b));
    }

    fn mul(&mut self, mul: &Gf256) {
        self.0.iter_mut().for_each(|a| a.mul(mul));
    }
}
