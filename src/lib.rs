//! Pricewise: grocery price comparison across quick-commerce platforms.
//!
//! This crate is the host around [`pricewise_search`]: it loads the TOML
//! configuration, registers the enabled providers and hands back a
//! [`ComparisonService`] that route handlers or the CLI share by reference.
//!
//! # Architecture
//!
//! - **Config**: [`PricewiseConfig`], one section per provider plus health,
//!   currency, query and cache settings
//! - **Registry**: [`registry::build_service`] turns a config into a service
//! - **CLI**: the `pricewise` binary prints search results, provider status
//!   and diagnostics as JSON

pub mod config;
pub mod error;
pub mod registry;

pub use config::PricewiseConfig;
pub use error::{PricewiseError, Result};
pub use pricewise_search::ComparisonService;
pub use registry::build_service;
