//! # Pipeline Orchestration
//!
//! Le tre fasi del run (select, dispatch, aggregate) e il worker per-job.
//! Modulo separato dai componenti foglia per tenere l'orchestrazione in un
//! posto solo.

pub mod dispatcher;
pub mod runner;
pub mod worker;

pub use dispatcher::{clamp_workers, dispatch};
pub use runner::PipelineRunner;
pub use worker::JobWorker;
