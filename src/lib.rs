//! Proof-of-work token ledger
//!
//! The [`blockchain`] module holds the ledger engine; [`api`] exposes it over
//! HTTP and [`config`] reads runtime settings from the environment.

pub mod api;
pub mod blockchain;
pub mod config;
