//! Test Module
//!
//! Cross-module test suite for the response pipeline. Unit tests live in
//! `#[cfg(test)]` modules next to the code they cover; this directory
//! holds the pieces that span components.
//!
//! ## Test Categories
//! - `support`: shared mock collaborators and fixtures
//! - `pipeline_tests`: end-to-end pre → generate → post flows, fallback
//!   levels, profile caching, request derivation

pub mod support;
