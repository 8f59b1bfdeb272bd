//! # causerie-store
//!
//! Durable local key-value storage for the chat client: the private key
//! hex and the display nick live here. The crate exposes a small
//! [`KeyValueStore`] trait with a SQLite-backed [`Database`] for real
//! use and an in-memory implementation for tests.

pub mod database;
pub mod kv;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use kv::{KeyValueStore, MemoryStore};
