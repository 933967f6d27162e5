//! karat-worker: appraisal write path
//!
//! Consumes the durable job queue: clones the project, delegates to the
//! contribution analyzer, and writes the resulting appraisal (success or
//! captured failure) back into the cache, reporting progress throughout.

pub mod analyzer;
pub mod consumer;
pub mod git;
pub mod pipeline;
