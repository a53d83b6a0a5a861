//! cldrive: differential driver for OpenCL kernels
//!
//! cldrive builds an OpenCL program, synthesizes inputs for every kernel it
//! contains and runs each kernel under a matrix of launch configurations.
//! Outputs are read back and compared between runs and between
//! configurations to flag nondeterministic and divergent kernels.
//!
//! # Architecture
//!
//! - **opencl_type**: numeric type catalog (sizes, construction, equality, formatting)
//! - **arg_value**: kernel argument values and ordered value sets
//! - **kernel_arg**: kernel signatures read from argument info
//! - **kernel_driver**: per-kernel execution across configurations
//! - **runner**: program build, kernel enumeration and overall verdict
//! - **device**: device selection, context and profiling queue
//! - **config**: the serializable [`Instance`] record
//! - **logger**: outcome sinks

// ============================================================================
// Core Modules
// ============================================================================

pub mod arg_value;
pub mod config;
pub mod device;
pub mod error;
pub mod kernel_arg;
pub mod kernel_driver;
pub mod logger;
pub mod opencl_type;
pub mod profiling;
pub mod runner;

// ============================================================================
// Re-exports
// ============================================================================

pub use arg_value::{GlobalArg, KernelArgValue, KernelArgValuesSet, LocalArg, ScalarArg};
pub use config::{DeviceSelector, DynamicParams, Instance, ValuePolicy};
pub use device::OpenClEnv;
pub use error::{CldriveError, Result};
pub use kernel_driver::{KernelDriver, KernelResult, KernelRun, KernelRunOutcome, WorkGroupLimits};
pub use logger::{FacadeLogger, JsonLinesLogger, LogRecord, Logger, RecordingLogger};
pub use opencl_type::{OpenClType, ScalarKind, Value};
pub use profiling::{ProfilingData, ProfilingStage};
pub use runner::{RunOutcome, RunResult, Runner, run_or_die};
