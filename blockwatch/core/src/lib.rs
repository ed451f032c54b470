//! # Blockwatch
//!
//! Blockwatch ingests the block stream of a Hyperledger Fabric channel, one
//! subscription per participating organization, and indexes the block history
//! as paginated records. The `blockwatch-core` crate provides the pipeline
//! components for embedding the indexer into other applications. Refer to the
//! `blockwatch` crate for the executable binary.

/// Configuration surface consumed by the indexer.
pub mod config;

/// Raw block events and their normalization into [`storage::BlockRecord`]s.
pub mod event;

/// Gateway connection abstraction, block event subscriptions and the built-in
/// HTTP client.
pub mod gateway;

/// Canonical block identifier computation.
pub mod hash;

/// Per-organization block listeners.
pub mod listener;

/// Storage backend abstraction and the built-in SQLite implementation.
pub mod storage;

/// Types related to handling long-running background services.
pub mod service;

mod errors;
pub use errors::Error;
