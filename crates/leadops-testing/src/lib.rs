//! Test utilities for leadops services.
//!
//! Provides shared-secret request headers and the contract fixture loader.
//! Import from tests only, never in production code.

pub mod auth;
pub mod fixture;
