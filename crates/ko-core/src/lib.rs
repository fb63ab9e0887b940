//! ko-core: Shared types for Knowledge OS
//!
//! This crate has zero internal crate dependencies and defines the
//! canonical types used across all other ko-* crates.

pub mod mode;
pub mod note;
pub mod policy;
