//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: Unified error type and HTTP mapping
//! - `metrics`: Prometheus metrics helpers
//! - `postgres`: PostgreSQL connection pool
//! - `telemetry`: Tracing subscriber setup

pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod telemetry;
