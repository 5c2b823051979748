//! Seedns - a lightweight authoritative DNS server for peer-discovery
//! seed zones.
//!
//! This crate provides the core functionality for the seedns server,
//! exposed as a library for testing and integration purposes.

pub mod config;
pub mod dns;
pub mod error;
pub mod logging;
pub mod seeds;
