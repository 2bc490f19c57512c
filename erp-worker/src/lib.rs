//! # ERP Worker Library
//!
//! Background jobs of the ERP backend.
//!
//! ## Modules
//!
//! - `config`: Worker configuration
//! - `sweeper`: Expiry and auto-renewal of module subscriptions

pub mod config;
pub mod sweeper;
