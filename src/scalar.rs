//! Scalar element types accepted by the index engines.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::linalg::{LinAlg, LinAlgConfig};
use crate::persistence::ScalarKind;

/// Element type of corpus and query vectors.
///
/// The engines are generic over the element type; all distance arithmetic
/// accumulates in `f32`, so supported scalars are those whose squared
/// differences fit that domain. The set is closed (`f32`, `u8`) because the
/// persisted format tags the element type.
pub trait Scalar:
    Copy + Send + Sync + Serialize + DeserializeOwned + 'static + private::Sealed
{
    /// Tag recorded in persisted index headers.
    const KIND: ScalarKind;

    /// Widen to the `f32` accumulation domain.
    fn to_f32(self) -> f32;

    /// Resolve the kernel backend for this element type.
    fn select_backend(config: &LinAlgConfig) -> LinAlg<Self>;
}

mod private {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for u8 {}
}

impl Scalar for f32 {
    const KIND: ScalarKind = ScalarKind::F32;

    #[inline]
    fn to_f32(self) -> f32 {
        self
    }

    fn select_backend(config: &LinAlgConfig) -> LinAlg<f32> {
        crate::linalg::f32_backend(config)
    }
}

impl Scalar for u8 {
    const KIND: ScalarKind = ScalarKind::U8;

    #[inline]
    fn to_f32(self) -> f32 {
        f32::from(self)
    }

    fn select_backend(_config: &LinAlgConfig) -> LinAlg<u8> {
        crate::linalg::scalar_backend()
    }
}
