//! # Common Components
//!
//! Shared utilities used by the services and the binary.
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing utilities
//! - [`logging`]: Logger initialization

pub mod config;
pub mod logging;
