//! Shared test utilities for docusearch integration tests.

pub mod harness;

pub use harness::TestHarness;
