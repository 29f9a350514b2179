#![deny(unsafe_code)]
//! Automated test pipeline for approved upgrade proposals.
//!
//! Stage execution is delegated to a [`StageExecutor`]; the
//! [`TestPipelineRunner`] owns ordering, gating, timeouts and cancellation.

pub mod cancel;
pub mod executor;
pub mod runner;

pub use cancel::CancellationSignal;
pub use executor::{SimulatedStageExecutor, StageContext, StageExecutor};
pub use runner::{PipelineConfig, PipelineReport, PipelineVerdict, TestPipelineRunner, EXECUTION_PLAN};
