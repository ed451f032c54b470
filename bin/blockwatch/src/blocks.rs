use std::path::PathBuf;

use anyhow::Result;
use blockwatch_core::storage::{BlockStore, SqliteBlockStore};
use clap::Parser;

use crate::common::{normalize_positive, BLOCKWATCH_DB_PATH};

const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_PAGE_NUM: u64 = 1;

#[derive(Debug, Parser)]
pub struct Blocks {
    /// Path to the SQLite database file
    #[clap(long, env, default_value = BLOCKWATCH_DB_PATH)]
    db: PathBuf,
    /// Organization whose block history to query
    #[clap(long)]
    org: String,
    /// Blocks per page; non-positive values fall back to the default
    #[clap(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u64,
    /// 1-indexed page number, counted from the newest block
    #[clap(long, default_value_t = DEFAULT_PAGE_NUM)]
    page_num: u64,
}

impl Blocks {
    pub async fn run(self) -> Result<()> {
        let store = SqliteBlockStore::new(&self.db.to_string_lossy()).await?;

        let page_size = normalize_positive(self.page_size, DEFAULT_PAGE_SIZE);
        let page_num = normalize_positive(self.page_num, DEFAULT_PAGE_NUM);
        let page = store.query_blocks(&self.org, page_size, page_num).await?;

        println!("{}", serde_json::to_string_pretty(&page)?);
        Ok(())
    }
}
