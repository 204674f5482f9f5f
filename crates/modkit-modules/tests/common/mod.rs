//! Common test utilities for modkit-modules
//!
//! This module provides shared test infrastructure including:
//! - Constants naming the fixture modules
//! - A temporary project fixture with packages, catalog and manifest
//! - Mock collaborators for observing side effects

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod constants;
pub mod fixtures;
pub mod mocks;

pub use constants::*;
pub use fixtures::*;
pub use mocks::*;
