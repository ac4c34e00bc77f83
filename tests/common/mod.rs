//! Shared test utilities for the relay
//!
//! This module provides common helpers for integration tests:
//! - A scripted upstream standing in for the OpenCode backend
//! - Panel fixtures that collect everything posted to a panel

pub mod panels;

pub use panels::*;
pub use upstream::*;
