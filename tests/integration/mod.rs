//! Integration tests for examroom
//!
//! These tests drive the HTTP API end to end, through the router and through
//! a real listener with the API client.

#[path = "../common/mod.rs"]
pub mod common;

pub mod client_dedup;
pub mod exam_flow;
pub mod tracking_persistence;
