//! Core types and trait definitions for the Kindred identity store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod contact;
pub mod engine;
pub mod error;
pub mod observation;
pub mod store;
pub mod view;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Error, Result};
