//! Distance kernels with a runtime-selected SIMD backend.
//!
//! Every operation accumulates in `f32` regardless of the element type. The
//! backend is resolved once per [`LinAlg`] value rather than per call: `f32`
//! corpora get AVX2 fused-multiply-add kernels when the running CPU supports
//! them, everything else falls back to portable scalar code. The two
//! backends agree to within `1e-4` relative error on any input.
//!
//! Callers guarantee equal slice lengths; the kernels are pure and have no
//! failure mode.

#[cfg(target_arch = "x86_64")]
mod avx2;

use crate::scalar::Scalar;

/// Kernel backend configuration, carried by the build/search context.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinAlgConfig {
    /// Force the scalar backend even when AVX2 is available.
    pub disable_avx2: bool,
}

/// Resolved kernel set for element type `T`.
///
/// A plain bundle of function pointers; selection happens in
/// [`LinAlg::new`] and the value is freely copyable afterwards.
#[derive(Debug)]
pub struct LinAlg<T: Scalar> {
    sq_l2_fn: fn(&[T], &[T]) -> f32,
    sq_l2_mixed_fn: fn(&[T], &[f32]) -> f32,
    dot_fn: fn(&[T], &[T]) -> f32,
    dot_mixed_fn: fn(&[T], &[f32]) -> f32,
}

impl<T: Scalar> Clone for LinAlg<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Scalar> Copy for LinAlg<T> {}

impl<T: Scalar> LinAlg<T> {
    /// Select a backend for `T` under `config`.
    pub fn new(config: &LinAlgConfig) -> Self {
        T::select_backend(config)
    }

    /// Squared Euclidean distance `Σ (x_i - y_i)²`.
    #[inline]
    #[must_use]
    pub fn sq_l2(&self, x: &[T], y: &[T]) -> f32 {
        (self.sq_l2_fn)(x, y)
    }

    /// Squared Euclidean distance against an `f32` vector.
    #[inline]
    #[must_use]
    pub fn sq_l2_mixed(&self, x: &[T], y: &[f32]) -> f32 {
        (self.sq_l2_mixed_fn)(x, y)
    }

    /// Dot product `Σ x_i · y_i`.
    #[inline]
    #[must_use]
    pub fn dot(&self, x: &[T], y: &[T]) -> f32 {
        (self.dot_fn)(x, y)
    }

    /// Dot product against an `f32` vector.
    #[inline]
    #[must_use]
    pub fn dot_mixed(&self, x: &[T], y: &[f32]) -> f32 {
        (self.dot_mixed_fn)(x, y)
    }
}

/// Portable backend for any scalar type. Public so callers can compare
/// against the selected backend.
pub fn scalar_backend<T: Scalar>() -> LinAlg<T> {
    LinAlg {
        sq_l2_fn: sq_l2_scalar::<T, T>,
        sq_l2_mixed_fn: sq_l2_scalar::<T, f32>,
        dot_fn: dot_scalar::<T, T>,
        dot_mixed_fn: dot_scalar::<T, f32>,
    }
}

/// Backend for `f32` corpora: AVX2 when detected and permitted, scalar
/// otherwise.
pub(crate) fn f32_backend(config: &LinAlgConfig) -> LinAlg<f32> {
    #[cfg(target_arch = "x86_64")]
    if !config.disable_avx2
        && is_x86_feature_detected!("avx2")
        && is_x86_feature_detected!("fma")
    {
        return avx2::backend();
    }

    #[cfg(not(target_arch = "x86_64"))]
    let _ = config;

    scalar_backend()
}

/// Scalar squared L2, unrolled four-wide.
pub fn sq_l2_scalar<T: Scalar, U: Scalar>(x: &[T], y: &[U]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    let mut acc = [0.0f32; 4];
    let mut i = 0;
    while i + 4 <= n {
        for lane in 0..4 {
            let d = x[i + lane].to_f32() - y[i + lane].to_f32();
            acc[lane] += d * d;
        }
        i += 4;
    }

    let mut sum = (acc[0] + acc[1]) + (acc[2] + acc[3]);
    while i < n {
        let d = x[i].to_f32() - y[i].to_f32();
        sum += d * d;
        i += 1;
    }
    sum
}

/// Scalar dot product, unrolled four-wide.
pub fn dot_scalar<T: Scalar, U: Scalar>(x: &[T], y: &[U]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    let mut acc = [0.0f32; 4];
    let mut i = 0;
    while i + 4 <= n {
        for lane in 0..4 {
            acc[lane] += x[i + lane].to_f32() * y[i + lane].to_f32();
        }
        i += 4;
    }

    let mut sum = (acc[0] + acc[1]) + (acc[2] + acc[3]);
    while i < n {
        sum += x[i].to_f32() * y[i].to_f32();
        i += 1;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sq_l2_known_values() {
        let env = scalar_backend::<f32>();
        assert_eq!(env.sq_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
        assert_eq!(env.sq_l2(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn dot_known_values() {
        let env = scalar_backend::<f32>();
        assert_eq!(env.dot(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]), 32.0);
    }

    #[test]
    fn u8_kernels_accumulate_in_f32() {
        let env = scalar_backend::<u8>();
        assert_eq!(env.sq_l2(&[0u8, 255], &[255, 0]), 2.0 * 255.0 * 255.0);
        assert_eq!(env.dot(&[2u8, 3], &[4, 5]), 23.0);
    }

    #[test]
    fn mixed_kernels_match_widened_input() {
        let env = scalar_backend::<u8>();
        let x = [1u8, 2, 3, 4, 5, 6, 7];
        let y = [0.5f32, 1.5, 2.5, 3.5, 4.5, 5.5, 6.5];
        let widened: Vec<f32> = x.iter().map(|&v| f32::from(v)).collect();
        let f32_env = scalar_backend::<f32>();
        assert!((env.sq_l2_mixed(&x, &y) - f32_env.sq_l2(&widened, &y)).abs() < 1e-6);
        assert!((env.dot_mixed(&x, &y) - f32_env.dot(&widened, &y)).abs() < 1e-6);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn backends_agree_on_random_lengths() {
        if !is_x86_feature_detected!("avx2") || !is_x86_feature_detected!("fma") {
            return;
        }

        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let simd = f32_backend(&LinAlgConfig::default());
        let scalar = scalar_backend::<f32>();
        for len in [1usize, 2, 3, 7, 8, 9, 15, 16, 17, 63, 64, 65, 255, 1024] {
            let x: Vec<f32> = (0..len).map(|_| rng.gen_range(-10.0..10.0)).collect();
            let y: Vec<f32> = (0..len).map(|_| rng.gen_range(-10.0..10.0)).collect();

            let a = scalar.sq_l2(&x, &y);
            let b = simd.sq_l2(&x, &y);
            assert!((a - b).abs() / (1.0 + a) < 1e-4, "sq_l2 mismatch at len {len}: {a} vs {b}");

            let a = scalar.dot(&x, &y);
            let b = simd.dot(&x, &y);
            assert!((a - b).abs() / (1.0 + a.abs()) < 1e-4, "dot mismatch at len {len}: {a} vs {b}");
        }
    }

    #[test]
    fn disable_avx2_forces_scalar_selection() {
        let env = f32_backend(&LinAlgConfig { disable_avx2: true });
        let scalar = scalar_backend::<f32>();
        assert_eq!(env.sq_l2_fn as usize, scalar.sq_l2_fn as usize);
        assert_eq!(env.dot_fn as usize, scalar.dot_fn as usize);
    }
}
