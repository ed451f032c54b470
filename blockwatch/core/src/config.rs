use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

const DEFAULT_RETRY_SECONDS: u64 = 5;

/// Indexer configuration, typically deserialized from a JSON file by the host
/// process.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    /// Name of the channel whose blocks are ingested.
    pub channel_name: String,
    /// Seconds to wait before reconnecting after any listener failure.
    #[serde(default = "default_retry_seconds")]
    pub block_retry_seconds: u64,
    /// Organizations to ingest for, keyed by organization name. An empty map
    /// leaves the indexer idle.
    #[serde(default)]
    pub organizations: BTreeMap<String, OrganizationConfig>,
}

/// Per-organization connection settings. Identity and TLS material are the
/// gateway's concern; the indexer only needs to know where its block feed
/// lives.
#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationConfig {
    /// Base URL of the organization's gateway endpoint.
    pub gateway_url: Url,
}

impl IndexerConfig {
    /// Retry interval with the 1-second floor applied.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.block_retry_seconds.max(1))
    }

    pub fn organization_names(&self) -> Vec<String> {
        self.organizations.keys().cloned().collect()
    }
}

fn default_retry_seconds() -> u64 {
    DEFAULT_RETRY_SECONDS
}
