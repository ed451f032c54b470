/// Default location of the block index database.
pub const BLOCKWATCH_DB_PATH: &str = "data/blockwatch.db";

/// Query parameters arrive from operators and HTTP clients; anything
/// non-positive falls back to the default.
pub fn normalize_positive(value: u64, default: u64) -> u64 {
    if value > 0 {
        value
    } else {
        default
    }
}
