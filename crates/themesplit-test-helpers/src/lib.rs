//! Test utilities and fixtures for themesplit
//!
//! Shared by the integration tests of every crate in the workspace.

pub mod compile;
pub mod fixtures;
pub mod mocks;
