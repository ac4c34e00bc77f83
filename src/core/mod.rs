//! Core module containing shared infrastructure for the relay.
//!
//! This module wires together the foundational components used by the web
//! server: backend connection, panel registry, bridge and activity monitor.

mod relay_core;

pub use relay_core::RelayCore;
