//! Integration tests for the panel relay
//!
//! These tests drive the proxy, bridge and activity monitor together
//! against a scripted backend.

#[path = "../common/mod.rs"]
pub mod common;

pub mod activity_monitor;
pub mod bridge_flow;
