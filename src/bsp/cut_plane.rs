//! Cut-plane construction strategies.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::collection::PriorityQueue;
use crate::error::{Error, Result};
use crate::features::Features;
use crate::linalg::LinAlg;
use crate::scalar::Scalar;

const RP_DEFAULT_SAMPLE_FEATURES: usize = 32;
const RP_CENTER_ITERATIONS: usize = 8;

/// Splitting hyperplane stored on internal tree nodes.
///
/// A closed set of variants rather than trait objects: serialization needs a
/// tag anyway, and the hot evaluation path stays monomorphic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CutPlane {
    /// Axis-aligned plane from the randomized KD construction.
    Kd { axis: u32, value: f64 },
    /// Oblique plane from the two-center random-projection construction.
    Rp { normal: Vec<f32>, a: f64 },
}

impl CutPlane {
    /// Signed distance from `feature` to the plane.
    pub fn distance<T: Scalar>(&self, feature: &[T], env: &LinAlg<T>) -> f64 {
        match self {
            CutPlane::Kd { axis, value } => {
                f64::from(feature[*axis as usize].to_f32()) - value
            }
            CutPlane::Rp { normal, a } => a + f64::from(env.dot_mixed(feature, normal)),
        }
    }

    /// True when `feature` falls on the non-negative side.
    pub fn evaluate<T: Scalar>(&self, feature: &[T], env: &LinAlg<T>) -> bool {
        0.0 <= self.distance(feature, env)
    }
}

/// Strategy for constructing cut planes during tree builds.
///
/// `indice` selects the sub-range of the corpus under the current node and
/// may be reordered in place by the factory.
pub trait CutPlaneFactory: Clone + Send + Sync {
    fn build<T: Scalar>(
        &self,
        features: &Features<T>,
        indice: &mut [u32],
        env: &LinAlg<T>,
        rng: &mut StdRng,
    ) -> Result<CutPlane>;
}

/// Randomized KD plane selection, after FLANN's randomized KD forests:
/// split at the mean of one of the highest-variance axes, chosen uniformly
/// among the top candidates so that forest members decorrelate.
#[derive(Debug, Clone, Copy, Default)]
pub struct KdCutPlaneFactory {
    sample_features: usize,
    top_k_candidates: usize,
}

impl KdCutPlaneFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the variance estimate to the first `n` indices (0 = all).
    pub fn with_sample_features(mut self, n: usize) -> Self {
        self.sample_features = n;
        self
    }

    /// Pick uniformly among the `n` highest-variance axes (0 = always the
    /// top axis).
    pub fn with_top_k_candidates(mut self, n: usize) -> Self {
        self.top_k_candidates = n;
        self
    }
}

impl CutPlaneFactory for KdCutPlaneFactory {
    fn build<T: Scalar>(
        &self,
        features: &Features<T>,
        indice: &mut [u32],
        _env: &LinAlg<T>,
        rng: &mut StdRng,
    ) -> Result<CutPlane> {
        if indice.is_empty() {
            return Err(Error::EmptyElements);
        }

        let dim = features.dim();
        let mut accs = vec![0.0f64; dim];
        let mut sq_accs = vec![0.0f64; dim];
        let mut n_samples = indice.len();
        if self.sample_features > 0 && self.sample_features < n_samples {
            n_samples = self.sample_features;
        }
        for &i in &indice[..n_samples] {
            for (j, v) in features.get(i as usize).iter().enumerate() {
                let v = f64::from(v.to_f32());
                accs[j] += v;
                sq_accs[j] += v * v;
            }
        }

        let inv_n = 1.0 / n_samples as f64;
        let mut queue = PriorityQueue::with_capacity(dim);
        for axis in 0..dim {
            let mean = accs[axis] * inv_n;
            let sq_mean = sq_accs[axis] * inv_n;
            let variance = sq_mean - mean * mean;
            queue.push(
                CutPlane::Kd {
                    axis: axis as u32,
                    value: mean,
                },
                -(variance as f32),
            );
        }

        // Randomly take one of the best candidates.
        let n_candidates = self.top_k_candidates.min(queue.len().saturating_sub(1));
        if n_candidates > 0 {
            for _ in 0..rng.gen_range(0..n_candidates) {
                queue.pop()?;
            }
        }
        Ok(queue.pop()?.item)
    }
}

/// Two-center random projection plane: seed two centroids at random corpus
/// points, refine them with a few sampled assignment passes, and cut halfway
/// between them along their difference vector.
#[derive(Debug, Clone, Copy)]
pub struct RpCutPlaneFactory {
    sample_features: usize,
}

impl Default for RpCutPlaneFactory {
    fn default() -> Self {
        Self {
            sample_features: RP_DEFAULT_SAMPLE_FEATURES,
        }
    }
}

impl RpCutPlaneFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample size per refinement pass (0 = all indices).
    pub fn with_sample_features(mut self, n: usize) -> Self {
        self.sample_features = n;
        self
    }
}

impl CutPlaneFactory for RpCutPlaneFactory {
    fn build<T: Scalar>(
        &self,
        features: &Features<T>,
        indice: &mut [u32],
        env: &LinAlg<T>,
        rng: &mut StdRng,
    ) -> Result<CutPlane> {
        if indice.is_empty() {
            return Err(Error::EmptyElements);
        }

        let lhs_index = rng.gen_range(0..indice.len());
        let rhs_index = if indice.len() < 2 {
            lhs_index
        } else {
            let mut r = rng.gen_range(0..indice.len() - 1);
            if lhs_index <= r {
                r += 1;
            }
            r
        };

        let dim = features.dim();
        let mut lhs_center: Vec<f32> = features
            .get(indice[lhs_index] as usize)
            .iter()
            .map(|v| v.to_f32())
            .collect();
        let mut rhs_center: Vec<f32> = features
            .get(indice[rhs_index] as usize)
            .iter()
            .map(|v| v.to_f32())
            .collect();
        let mut lhs_count = 1usize;
        let mut rhs_count = 1usize;

        let n_samples = if self.sample_features > 0 {
            self.sample_features.min(indice.len())
        } else {
            indice.len()
        };

        for _ in 0..RP_CENTER_ITERATIONS {
            indice.shuffle(rng);
            for &k in &indice[..n_samples] {
                let feature = features.get(k as usize);
                let lhs_sq_dist = env.sq_l2_mixed(feature, &lhs_center);
                let rhs_sq_dist = env.sq_l2_mixed(feature, &rhs_center);

                if lhs_sq_dist < rhs_sq_dist {
                    let inv = 1.0 / (lhs_count + 1) as f32;
                    for (c, v) in lhs_center.iter_mut().zip(feature) {
                        *c = (*c * lhs_count as f32 + v.to_f32()) * inv;
                    }
                    lhs_count += 1;
                } else {
                    let inv = 1.0 / (rhs_count + 1) as f32;
                    for (c, v) in rhs_center.iter_mut().zip(feature) {
                        *c = (*c * rhs_count as f32 + v.to_f32()) * inv;
                    }
                    rhs_count += 1;
                }
            }
        }

        let mut acc_sq_diff = 0.0f32;
        let mut normal = vec![0.0f32; dim];
        for i in 0..dim {
            let diff = lhs_center[i] - rhs_center[i];
            normal[i] = diff;
            acc_sq_diff += diff * diff;
        }
        let inv_norm = 1.0 / (f64::from(acc_sq_diff).sqrt() + 1e-10);
        for v in normal.iter_mut() {
            *v = (f64::from(*v) * inv_norm) as f32;
        }

        let mut a = 0.0f64;
        for i in 0..dim {
            a -= f64::from(normal[i]) * f64::from(lhs_center[i] + rhs_center[i]);
        }
        a /= 2.0;

        Ok(CutPlane::Rp { normal, a })
    }
}
