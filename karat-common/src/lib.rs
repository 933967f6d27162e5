//! # Karat Common Library
//!
//! Shared code for the karat services including:
//! - Appraisal domain models (Appraisal, FolderNode, AppraisalJob)
//! - Cache store with per-entry TTL
//! - Durable job queue (dispatch and claim sides)
//! - Progress phase table and reporter
//! - Configuration loading
//! - Database pool and schema initialization

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod progress;
pub mod queue;

pub use error::{Error, Result};
