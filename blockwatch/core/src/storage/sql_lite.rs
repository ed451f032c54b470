use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::trace;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{query, Pool, Row, Sqlite};

use super::{BlockPage, BlockRecord, BlockStore};
use crate::Error;

/// Block store backed by a SQLite database file.
///
/// Organization listeners write concurrently; rows are keyed by organization
/// so writers never contend on each other's data, and each save runs in its
/// own transaction.
#[derive(Clone)]
pub struct SqliteBlockStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl SqliteBlockStore {
    pub async fn new(path: &str) -> Result<Self, Error> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !Path::new(path).try_exists()? {
            trace!("Database file not found. A new one will be created at: {}", path);
            fs::File::create(path)?;
        } else {
            trace!("Database file found at: {}", path);
        }

        let pool = SqlitePoolOptions::new().connect(&format!("sqlite:{}", path)).await?;
        Self::create_tables(&pool).await?;
        Ok(Self { pool })
    }

    pub(crate) async fn create_tables(pool: &Pool<Sqlite>) -> Result<(), Error> {
        query(
            "CREATE TABLE IF NOT EXISTS blocks (
                org_name TEXT NOT NULL,
                block_num INTEGER NOT NULL,
                block_hash TEXT NOT NULL,
                data_hash TEXT NOT NULL,
                prev_hash TEXT NOT NULL,
                tx_count INTEGER NOT NULL,
                save_time TEXT NOT NULL,
                PRIMARY KEY (org_name, block_num)
        );",
        )
        .execute(pool)
        .await?;
        query(
            "CREATE TABLE IF NOT EXISTS latest_blocks (
                org_name TEXT NOT NULL PRIMARY KEY,
                block_num INTEGER NOT NULL,
                save_time TEXT NOT NULL
        );",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

impl BlockStore for SqliteBlockStore {
    async fn latest_block_num(&self, org_name: &str) -> Result<Option<u64>, Error> {
        let row = query("SELECT block_num FROM latest_blocks WHERE org_name = ?1")
            .bind(org_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<i64, _>("block_num") as u64))
    }

    async fn save_block(&self, org_name: &str, record: &BlockRecord) -> Result<(), Error> {
        let mut transaction = self.pool.begin().await?;

        query(
            "INSERT INTO blocks (org_name, block_num, block_hash, data_hash, prev_hash, tx_count, save_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(org_name, block_num) DO UPDATE SET
                block_hash = excluded.block_hash,
                data_hash = excluded.data_hash,
                prev_hash = excluded.prev_hash,
                tx_count = excluded.tx_count,
                save_time = excluded.save_time",
        )
        .bind(org_name)
        .bind(record.block_num as i64)
        .bind(&record.block_hash)
        .bind(&record.data_hash)
        .bind(&record.prev_hash)
        .bind(record.tx_count as i64)
        .bind(record.save_time)
        .execute(&mut *transaction)
        .await?;

        // The cursor only ever moves forward; a replayed old block must not
        // regress the resume point.
        query(
            "INSERT INTO latest_blocks (org_name, block_num, save_time)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(org_name) DO UPDATE SET
                block_num = excluded.block_num,
                save_time = excluded.save_time
            WHERE excluded.block_num > latest_blocks.block_num",
        )
        .bind(org_name)
        .bind(record.block_num as i64)
        .bind(record.save_time)
        .execute(&mut *transaction)
        .await?;

        transaction.commit().await?;
        Ok(())
    }

    async fn query_blocks(
        &self,
        org_name: &str,
        page_size: u64,
        page_num: u64,
    ) -> Result<BlockPage, Error> {
        let latest = self
            .latest_block_num(org_name)
            .await?
            .ok_or_else(|| Error::OrganizationNotFound(org_name.to_string()))?;
        let total = latest + 1;

        let start_idx = total.saturating_sub(page_num.saturating_mul(page_size));
        let end_idx = total.saturating_sub(page_num.saturating_sub(1).saturating_mul(page_size));
        let has_more = start_idx > 0;

        let rows = query(
            "SELECT block_num, block_hash, data_hash, prev_hash, tx_count, save_time
            FROM blocks
            WHERE org_name = ?1 AND block_num >= ?2 AND block_num < ?3
            ORDER BY block_num DESC",
        )
        .bind(org_name)
        .bind(start_idx as i64)
        .bind(end_idx as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut blocks = Vec::with_capacity(rows.len());
        for row in rows {
            blocks.push(BlockRecord {
                block_num: row.get::<i64, _>("block_num") as u64,
                block_hash: row.get("block_hash"),
                data_hash: row.get("data_hash"),
                prev_hash: row.get("prev_hash"),
                tx_count: row.get::<i64, _>("tx_count") as u64,
                save_time: row.get::<DateTime<Utc>, _>("save_time"),
            });
        }

        Ok(BlockPage {
            blocks,
            total,
            page_size,
            page_num,
            has_more,
        })
    }
}
