//! Shared test utilities for bibload integration tests.
//!
//! This module provides:
//! - `TestHarness` for running an `IngestService` against temp directories
//!   and a recording index
//! - Builders for configurations and upload files

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{wait, IndexCall, RecordingIndex, TestHarness, CORE, USER};
