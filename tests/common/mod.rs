//! Shared test utilities for examroom
//!
//! This module provides common helpers for integration tests:
//! - An in-process app with seeded accounts and a manual clock
//! - A real TCP server for exercising the API client

pub mod app;
pub mod server;
