//! Shared test utilities for kubesync integration tests.
//!
//! This module provides:
//! - `SyncHarness` for running a sync manager against temp directories
//! - `CountingFactory` for observing connection lifecycle calls
//! - `KubeconfigBuilder` for writing kubeconfig files programmatically

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{CountingFactory, SyncHarness};
