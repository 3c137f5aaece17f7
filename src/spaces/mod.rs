//! Space descriptors for actions and observations.
//!
//! The dimensions of every space in this crate depend on how many vehicles
//! the simulation currently holds, so `BoxSpace` carries runtime-sized
//! bounds rather than a compile-time length. Environments rebuild their
//! spaces on demand instead of caching them across entity-count changes.

pub mod space;

use rand::Rng;
use rand::distributions::{Distribution, Uniform};

pub use space::Space;

use crate::core::{Result, TrafficError};

/// A box-shaped continuous space with per-dimension inclusive bounds.
///
/// An upper bound of `f32::INFINITY` marks a dimension as unbounded above
/// (used for positions and speeds); lower bounds must be finite.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

impl BoxSpace {
    /// Build a space from per-dimension bounds. Fails if the vectors differ
    /// in length, contain NaN, have a non-finite lower bound, or violate
    /// `low[i] <= high[i]`.
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(TrafficError::InvalidSpace(format!(
                "bound lengths differ: {} vs {}",
                low.len(),
                high.len()
            )));
        }
        for (i, (&lo, &hi)) in low.iter().zip(high.iter()).enumerate() {
            if lo.is_nan() || hi.is_nan() {
                return Err(TrafficError::InvalidSpace(format!("NaN bound at dimension {i}")));
            }
            if !lo.is_finite() {
                return Err(TrafficError::InvalidSpace(format!(
                    "non-finite lower bound at dimension {i}"
                )));
            }
            if lo > hi {
                return Err(TrafficError::InvalidSpace(format!(
                    "low[{i}] = {lo} exceeds high[{i}] = {hi}"
                )));
            }
        }
        Ok(Self { low, high })
    }

    /// Build a `dim`-dimensional space with the same bounds on every
    /// dimension.
    pub fn uniform(low: f32, high: f32, dim: usize) -> Result<Self> {
        Self::new(vec![low; dim], vec![high; dim])
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize { self.low.len() }

    pub fn low(&self) -> &[f32] { &self.low }
    pub fn high(&self) -> &[f32] { &self.high }
}

impl Space for BoxSpace {
    type Element = Vec<f32>;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Element {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(&lo, &hi)| {
                if hi.is_finite() {
                    if lo == hi {
                        lo
                    } else {
                        Uniform::new_inclusive(lo, hi).sample(rng)
                    }
                } else {
                    // Unbounded above: exponential offset from the lower
                    // bound via inverse CDF.
                    let u: f32 = rng.gen_range(0.0f32..1.0f32);
                    lo - (1.0 - u).ln()
                }
            })
            .collect()
    }

    fn contains(&self, elem: &Self::Element) -> bool {
        elem.len() == self.low.len()
            && elem
                .iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(&v, (&lo, &hi))| !v.is_nan() && lo <= v && v <= hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::rng::rng_from_seed;

    #[test]
    fn bounded_sampling_stays_in_bounds() {
        let mut rng = rng_from_seed(42);
        let b = BoxSpace::new(vec![-3.0, -1.0, 2.5], vec![3.0, 1.0, 3.5]).unwrap();
        for _ in 0..100 {
            let v = b.sample(&mut rng);
            assert!(b.contains(&v));
            assert!(v[0] >= -3.0 && v[0] <= 3.0);
        }
    }

    #[test]
    fn unbounded_sampling_is_above_low() {
        let mut rng = rng_from_seed(7);
        let b = BoxSpace::uniform(0.0, f32::INFINITY, 8).unwrap();
        for _ in 0..100 {
            let v = b.sample(&mut rng);
            assert_eq!(v.len(), 8);
            assert!(b.contains(&v));
            assert!(v.iter().all(|&x| x >= 0.0 && x.is_finite()));
        }
    }

    #[test]
    fn degenerate_dimension_samples_its_only_member() {
        let mut rng = rng_from_seed(0);
        let b = BoxSpace::new(vec![1.5], vec![1.5]).unwrap();
        assert_eq!(b.sample(&mut rng), vec![1.5]);
    }

    #[test]
    fn invalid_bounds_are_rejected() {
        assert!(BoxSpace::new(vec![0.0], vec![1.0, 2.0]).is_err());
        assert!(BoxSpace::new(vec![2.0], vec![1.0]).is_err());
        assert!(BoxSpace::new(vec![f32::NAN], vec![1.0]).is_err());
        assert!(BoxSpace::new(vec![f32::NEG_INFINITY], vec![1.0]).is_err());
    }

    #[test]
    fn contains_rejects_wrong_length_and_nan() {
        let b = BoxSpace::uniform(0.0, 1.0, 3).unwrap();
        assert!(!b.contains(&vec![0.5, 0.5]));
        assert!(!b.contains(&vec![0.5, f32::NAN, 0.5]));
        assert!(b.contains(&vec![0.0, 0.5, 1.0]));
    }
}
