// ABOUTME: Field extraction for caller-configured selectors.
// ABOUTME: Holds the selector configuration types, the first-match extractor and compiled selector sets.

//! Field extraction module.
//!
//! Submodules:
//! - `select`: selector configuration and first-match field extraction.
//! - `compiled`: selector configurations compiled for reuse across pages.

pub mod compiled;
pub mod select;
