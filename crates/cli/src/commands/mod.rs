//! CLI command handlers

pub mod cashout;
pub mod compliance;
pub mod config;
pub mod customer;
pub mod reconcile;
