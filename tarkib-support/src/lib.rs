//! # Tarkib Support
//!
//! Shared utilities for the Tarkib DI framework.
//!
//! This crate provides:
//! - Text rendering for error messages
//! - Type-name helpers shared between tarkib crates

pub mod rendering;
