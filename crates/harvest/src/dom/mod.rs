// ABOUTME: DOM manipulation utilities for text extraction and cleaning.
// ABOUTME: Provides visible-text collection and content cleaning helpers.

//! DOM utilities module.

pub mod text;
