//! AVX2 kernels for `f32` slices.
//!
//! Eight-lane fused-multiply-add main loop with a scalar tail. The safe
//! wrappers assume feature detection already happened in
//! [`super::f32_backend`]; this module is never reachable otherwise.

use std::arch::x86_64::*;

use super::LinAlg;

pub(super) fn backend() -> LinAlg<f32> {
    LinAlg {
        sq_l2_fn: sq_l2,
        sq_l2_mixed_fn: sq_l2,
        dot_fn: dot,
        dot_mixed_fn: dot,
    }
}

fn sq_l2(x: &[f32], y: &[f32]) -> f32 {
    unsafe { sq_l2_avx2(x, y) }
}

fn dot(x: &[f32], y: &[f32]) -> f32 {
    unsafe { dot_avx2(x, y) }
}

#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn sq_l2_avx2(x: &[f32], y: &[f32]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    let blocks = n / 8;

    let mut acc = _mm256_setzero_ps();
    for b in 0..blocks {
        let xv = _mm256_loadu_ps(x.as_ptr().add(b * 8));
        let yv = _mm256_loadu_ps(y.as_ptr().add(b * 8));
        let d = _mm256_sub_ps(xv, yv);
        acc = _mm256_fmadd_ps(d, d, acc);
    }

    let mut sum = horizontal_sum(acc);
    for i in blocks * 8..n {
        let d = x[i] - y[i];
        sum += d * d;
    }
    sum
}

#[target_feature(enable = "avx2", enable = "fma")]
unsafe fn dot_avx2(x: &[f32], y: &[f32]) -> f32 {
    debug_assert_eq!(x.len(), y.len());
    let n = x.len();
    let blocks = n / 8;

    let mut acc = _mm256_setzero_ps();
    for b in 0..blocks {
        let xv = _mm256_loadu_ps(x.as_ptr().add(b * 8));
        let yv = _mm256_loadu_ps(y.as_ptr().add(b * 8));
        acc = _mm256_fmadd_ps(xv, yv, acc);
    }

    let mut sum = horizontal_sum(acc);
    for i in blocks * 8..n {
        sum += x[i] * y[i];
    }
    sum
}

#[target_feature(enable = "avx2")]
unsafe fn horizontal_sum(v: __m256) -> f32 {
    let hi = _mm256_extractf128_ps(v, 1);
    let lo = _mm256_castps256_ps128(v);
    let sum4 = _mm_add_ps(lo, hi);
    let sum2 = _mm_add_ps(sum4, _mm_movehl_ps(sum4, sum4));
    let sum1 = _mm_add_ss(sum2, _mm_shuffle_ps(sum2, sum2, 0x1));
    _mm_cvtss_f32(sum1)
}
