//! Execution context for (potentially) multi-process runs.
//!
//! Rank and world size come from the `RANK` / `WORLD_SIZE` environment
//! variables that a distributed launcher exports; a plain invocation runs as
//! rank 0 of 1. The context is passed explicitly to every component that
//! needs it instead of being queried ambiently, and rank 0 is the only
//! process allowed to write checkpoints, manifests, metrics, and CSV output.

use clap::ValueEnum;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    /// Index of this process within the training group.
    pub rank: usize,
    /// Total process count in the group.
    pub world_size: usize,
    /// Accelerator selected for this process (`rank % devices`).
    pub device_index: usize,
    /// Verbose per-batch printing.
    pub debug: bool,
}

impl RunContext {
    pub fn new(rank: usize, world_size: usize, devices: usize, debug: bool) -> Self {
        let device_index = if devices > 0 { rank % devices } else { 0 };
        Self {
            rank,
            world_size: world_size.max(1),
            device_index,
            debug,
        }
    }

    /// Builds the context from the launcher environment; absent variables mean
    /// a single-process run.
    pub fn from_env(devices: usize, debug: bool) -> Self {
        let rank = env_usize("RANK").unwrap_or(0);
        let world_size = env_usize("WORLD_SIZE").unwrap_or(1);
        Self::new(rank, world_size, devices, debug)
    }

    /// Only the main rank writes files.
    pub fn is_main(&self) -> bool {
        self.rank == 0
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

pub fn validate_backend_choice(kind: BackendKind) -> anyhow::Result<()> {
    let built_wgpu = cfg!(feature = "backend-wgpu");
    match (kind, built_wgpu) {
        (BackendKind::Wgpu, false) => {
            anyhow::bail!("backend-wgpu feature not enabled; rebuild with --features backend-wgpu or choose ndarray backend")
        }
        (BackendKind::NdArray, true) => {
            println!("note: built with backend-wgpu; the WGPU backend will be used despite --backend ndarray");
        }
        _ => {}
    }
    Ok(())
}
