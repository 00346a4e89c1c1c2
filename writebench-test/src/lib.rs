//! Test utilities for the write benchmark and its storage layer.
//!
//! This crate provides utilities to facilitate testing of the benchmark harness without a real
//! storage service. See the modules for all available utilities.

pub mod backend;
pub mod server;
pub mod tracing;
