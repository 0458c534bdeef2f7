#![recursion_limit = "256"]

//! Training and evaluation orchestration for SFCN brain-age models.
//!
//! `loop2d` runs the 2D slice pipeline end to end (split, train, validate,
//! checkpoint, test, CSV export); `eval3d` runs inference over 3D volumes with
//! separately loaded weights. Everything file-writing goes through the main
//! rank only.

pub mod checkpoint;
pub mod cli;
pub mod context;
pub mod eval3d;
pub mod export;
pub mod loop2d;
pub mod metrics;

pub use checkpoint::{checkpoint_decision, CheckpointIoError};
pub use cli::{Eval3dArgs, Train2dArgs};
pub use context::{validate_backend_choice, BackendKind, RunContext};
pub use eval3d::{run_eval3d, EvalConfig};
pub use export::{PredictionRow, PredictionTable};
pub use loop2d::{run_train2d, TrainConfig};
pub use metrics::{EpochAccumulator, ScalarLog};

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

/// Autodiff wrapper used by the training pass.
pub type AutodiffTrainBackend = burn::backend::Autodiff<TrainBackend>;

/// Device for the execution context's device index.
///
/// The NdArray backend has a single CPU device; the index only selects real
/// hardware under `backend-wgpu`.
#[cfg(feature = "backend-wgpu")]
pub fn backend_device(ctx: &context::RunContext) -> <TrainBackend as burn::tensor::backend::Backend>::Device {
    burn_wgpu::WgpuDevice::DiscreteGpu(ctx.device_index)
}
#[cfg(not(feature = "backend-wgpu"))]
pub fn backend_device(_ctx: &context::RunContext) -> <TrainBackend as burn::tensor::backend::Backend>::Device {
    Default::default()
}
