use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Error;

mod sql_lite;
pub use sql_lite::SqliteBlockStore;


/// One ingested ledger block, scoped to an organization.
///
/// A record is created exactly once, when its block is first observed on the
/// stream, and is never updated or deleted afterwards. `block_hash` is always
/// derived from the three header fields by [`crate::hash::block_header_hash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRecord {
    pub block_num: u64,
    pub block_hash: String,
    pub data_hash: String,
    pub prev_hash: String,
    pub tx_count: u64,
    pub save_time: DateTime<Utc>,
}

/// A page of block history, newest first. Serializes into the shape the REST
/// facade exposes to HTTP clients.
#[derive(Debug, Clone, Serialize)]
pub struct BlockPage {
    pub blocks: Vec<BlockRecord>,
    pub total: u64,
    pub page_size: u64,
    pub page_num: u64,
    pub has_more: bool,
}

/// Persistence for per-organization block history and resume cursors.
///
/// The store is the only resource shared between organization listeners; all
/// mutation goes through [`BlockStore::save_block`], whose two writes (block
/// row, cursor row) are applied as one atomic unit.
pub trait BlockStore {
    /// Current resume cursor: the highest block number ever saved for the
    /// organization, `None` if no block was saved yet.
    fn latest_block_num(
        &self,
        org_name: &str,
    ) -> impl Future<Output = Result<Option<u64>, Error>> + Send;

    /// Upserts the block row keyed by `(org_name, block_num)` and advances
    /// the cursor if `record.block_num` exceeds it. Re-delivering an
    /// already-seen block overwrites the row rather than duplicating it, so
    /// crash/restart replays are harmless.
    fn save_block(
        &self,
        org_name: &str,
        record: &BlockRecord,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Pages through the organization's block history, newest first.
    ///
    /// `page_num` is 1-indexed; callers normalize non-positive inputs before
    /// this point. Fails with [`Error::OrganizationNotFound`] when no block
    /// was ever saved for the organization.
    fn query_blocks(
        &self,
        org_name: &str,
        page_size: u64,
        page_num: u64,
    ) -> impl Future<Output = Result<BlockPage, Error>> + Send;
}
