//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the library sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Scan event bus
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other crates depend on. It
//! establishes the logging conventions, the configuration builder hosts use
//! to wire their bridges, and the broadcast channel scan progress flows
//! through.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
