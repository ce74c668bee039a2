//! pfasst: spectral deferred corrections and PFASST in Rust
//!
//! This crate provides collocation-based time integrators (SDC) together
//! with their multilevel (MLSDC), multistep (MSSDC) and parallel-in-time
//! (PFASST) controllers, over pluggable problem, sweeper and space-transfer
//! collaborators.

pub mod parallel;

pub mod collocation;
pub mod config;
pub mod controller;
pub mod core;
pub mod error;
pub mod hooks;
pub mod level;
pub mod problem;
pub mod qdelta;
pub mod step;
pub mod sweeper;
pub mod transfer;
pub mod utils;

// Re-exports for convenience
pub use collocation::*;
pub use config::*;
pub use controller::*;
pub use core::*;
pub use error::*;
pub use hooks::*;
pub use level::*;
pub use problem::*;
pub use step::*;
pub use sweeper::*;
pub use transfer::*;

// Re-export StepStats at the crate root for convenience
pub use utils::convergence::StepStats;
