//! HTTP request handlers for the relay web API.

pub mod panels;
