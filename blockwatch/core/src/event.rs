use chrono::Utc;
use num_traits::ToPrimitive;

use crate::hash;
use crate::storage::BlockRecord;
use crate::Error;

/// A block event as delivered by the gateway stream.
///
/// Gateway client versions disagree on the event's shape: some wrap the block
/// in an envelope, others deliver the block object directly. Every accessor is
/// therefore optional, and [`block_record_from_event`] probes them in a fixed
/// preference order. One adapter exists per known upstream shape (see
/// [`crate::gateway::http`] for the JSON feed adapter).
pub trait RawBlockEvent: Send {
    /// The wrapped block, for envelope-shaped events.
    fn nested_block(&self) -> Option<&dyn RawBlock>;

    /// The event itself viewed as a block, for flat-shaped events.
    fn direct_block(&self) -> Option<&dyn RawBlock>;
}

impl std::fmt::Debug for dyn RawBlockEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawBlockEvent").finish_non_exhaustive()
    }
}

pub trait RawBlock {
    fn header(&self) -> Option<&dyn RawBlockHeader>;

    fn data(&self) -> Option<&dyn RawBlockData>;
}

pub trait RawBlockHeader {
    fn number(&self) -> Option<RawBlockNumber>;

    fn previous_hash(&self) -> Option<Vec<u8>>;

    fn data_hash(&self) -> Option<Vec<u8>>;
}

pub trait RawBlockData {
    /// Explicit transaction count, where the upstream shape exposes one.
    fn transaction_count(&self) -> Option<u64>;

    /// Length of an explicit transaction list, for shapes without a count.
    fn transaction_list_len(&self) -> Option<u64>;
}

/// The block number representations observed across upstream client versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBlockNumber {
    Plain(u64),
    Big(i128),
    Text(String),
}

impl RawBlockNumber {
    fn to_u64(&self) -> Option<u64> {
        match self {
            Self::Plain(num) => Some(*num),
            Self::Big(num) => num.to_u64(),
            Self::Text(text) => text.parse().ok(),
        }
    }
}

/// Normalizes a raw block event into a [`BlockRecord`].
///
/// The block number is required: an event whose header or number cannot be
/// located fails extraction instead of defaulting, since a record with a wrong
/// number would corrupt the per-organization ordering. Hashes and transaction
/// counts degrade to empty/zero when absent.
pub fn block_record_from_event(event: &dyn RawBlockEvent) -> Result<BlockRecord, Error> {
    let block = event
        .nested_block()
        .or_else(|| event.direct_block())
        .ok_or_else(|| Error::Extraction("event carries no block".into()))?;
    let header = block
        .header()
        .ok_or_else(|| Error::Extraction("block carries no header".into()))?;
    let block_num = header
        .number()
        .ok_or_else(|| Error::Extraction("block header carries no number".into()))?
        .to_u64()
        .ok_or_else(|| Error::Extraction("block number is not a valid u64".into()))?;

    let prev_hash = header.previous_hash().unwrap_or_default();
    let data_hash = header.data_hash().unwrap_or_default();

    let tx_count = match block.data() {
        Some(data) => data
            .transaction_count()
            .or_else(|| data.transaction_list_len())
            .unwrap_or(0),
        None => 0,
    };

    Ok(BlockRecord {
        block_num,
        block_hash: hash::block_header_hash(block_num, &prev_hash, &data_hash),
        data_hash: hash::to_hex(&data_hash),
        prev_hash: hash::to_hex(&prev_hash),
        tx_count,
        save_time: Utc::now(),
    })
}
