use std::collections::{BTreeMap, HashMap};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures_util::{Stream, StreamExt};
use log::info;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{
    BlockEventStream, ConnectionProvider, EventResult, LedgerConnection, NullBlockEventsRequest,
};
use crate::config::OrganizationConfig;
use crate::event::{RawBlock, RawBlockData, RawBlockEvent, RawBlockHeader, RawBlockNumber};
use crate::Error;

/// Gateway client consuming the block event feed of an organization's gateway
/// proxy as a newline-delimited JSON stream.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: Client,
    events_url: Url,
}

impl HttpGateway {
    pub fn new(gateway_url: Url, channel_name: &str) -> Result<Self, Error> {
        let events_url = gateway_url.join(&format!("channels/{}/blocks", channel_name))?;
        Ok(Self {
            http: Client::new(),
            events_url,
        })
    }

    async fn subscribe(&self, start_block: u64) -> Result<BlockEventStream, Error> {
        let mut url = self.events_url.clone();
        url.query_pairs_mut().append_pair("start", &start_block.to_string());

        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(BlockEventStream::new(ndjson_events(response.bytes_stream())))
    }
}

impl LedgerConnection for HttpGateway {
    type Request = NullBlockEventsRequest;

    async fn block_events(&self, start_block: u64) -> Result<BlockEventStream, Error> {
        self.subscribe(start_block).await
    }

    fn block_events_request(&self) -> Option<Self::Request> {
        None
    }
}

/// Connection provider holding one [`HttpGateway`] per configured
/// organization, all initialized up front.
#[derive(Debug, Clone)]
pub struct HttpGatewayProvider {
    gateways: HashMap<String, HttpGateway>,
}

impl HttpGatewayProvider {
    pub fn new(
        channel_name: &str,
        organizations: &BTreeMap<String, OrganizationConfig>,
    ) -> Result<Self, Error> {
        let mut gateways = HashMap::new();
        for (org_name, org) in organizations {
            let gateway = HttpGateway::new(org.gateway_url.clone(), channel_name)?;
            info!(
                "Gateway client initialized: org={}, endpoint={}",
                org_name, org.gateway_url
            );
            gateways.insert(org_name.clone(), gateway);
        }
        Ok(Self { gateways })
    }
}

impl ConnectionProvider for HttpGatewayProvider {
    type Connection = HttpGateway;

    fn connection(&self, org_name: &str) -> Result<&Self::Connection, Error> {
        self.gateways
            .get(org_name)
            .ok_or_else(|| Error::UnknownOrganization(org_name.to_string()))
    }
}

/// Splits a live byte stream into newline-delimited JSON block events.
///
/// Lines may span chunk boundaries and the final line may lack a trailing
/// newline. Blank lines (keep-alives) are skipped. Transport and parse
/// failures surface as stream items so the consumer decides how to recover.
fn ndjson_events<S, B, E>(bytes: S) -> impl Stream<Item = EventResult> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<Error> + Send + 'static,
{
    let state = (Box::pin(bytes), Vec::new(), false);
    futures_util::stream::unfold(state, |(mut bytes, mut buffer, mut done)| async move {
        loop {
            if let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = buffer.drain(..=pos).collect();
                line.pop();
                if line.iter().all(|b| b.is_ascii_whitespace()) {
                    continue;
                }
                return Some((parse_event(&line), (bytes, buffer, done)));
            }
            if done {
                if buffer.iter().all(|b| b.is_ascii_whitespace()) {
                    return None;
                }
                let line = std::mem::take(&mut buffer);
                return Some((parse_event(&line), (bytes, buffer, done)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => return Some((Err(err.into()), (bytes, buffer, done))),
                None => done = true,
            }
        }
    })
}

fn parse_event(line: &[u8]) -> EventResult {
    let value: Value = serde_json::from_slice(line)?;
    Ok(Box::new(value))
}

// The JSON feed adapter. Gateway proxy versions disagree on whether the event
// wraps the block in an envelope and on field naming; each accessor probes
// the shapes seen in the wild.

impl RawBlockEvent for Value {
    fn nested_block(&self) -> Option<&dyn RawBlock> {
        self.get("block").map(|block| block as &dyn RawBlock)
    }

    fn direct_block(&self) -> Option<&dyn RawBlock> {
        self.get("header").is_some().then_some(self as &dyn RawBlock)
    }
}

impl RawBlock for Value {
    fn header(&self) -> Option<&dyn RawBlockHeader> {
        self.get("header").map(|header| header as &dyn RawBlockHeader)
    }

    fn data(&self) -> Option<&dyn RawBlockData> {
        self.get("data").map(|data| data as &dyn RawBlockData)
    }
}

impl RawBlockHeader for Value {
    fn number(&self) -> Option<RawBlockNumber> {
        // Protobuf's JSON mapping renders uint64 as a string; older proxies
        // emit a plain number.
        match self.get("number")? {
            Value::Number(num) => num
                .as_u64()
                .map(RawBlockNumber::Plain)
                .or_else(|| num.as_i64().map(|num| RawBlockNumber::Big(num.into()))),
            Value::String(text) => Some(RawBlockNumber::Text(text.clone())),
            _ => None,
        }
    }

    fn previous_hash(&self) -> Option<Vec<u8>> {
        self.get("previous_hash")
            .or_else(|| self.get("previousHash"))
            .and_then(decode_bytes)
    }

    fn data_hash(&self) -> Option<Vec<u8>> {
        self.get("data_hash")
            .or_else(|| self.get("dataHash"))
            .and_then(decode_bytes)
    }
}

impl RawBlockData for Value {
    fn transaction_count(&self) -> Option<u64> {
        self.get("count").and_then(Value::as_u64)
    }

    fn transaction_list_len(&self) -> Option<u64> {
        self.get("data")
            .and_then(Value::as_array)
            .map(|list| list.len() as u64)
    }
}

// Byte fields arrive base64-encoded (the protobuf JSON rendering); some
// proxies emit hex instead.
fn decode_bytes(value: &Value) -> Option<Vec<u8>> {
    let text = value.as_str()?;
    if text.is_empty() {
        return Some(Vec::new());
    }
    BASE64
        .decode(text)
        .ok()
        .or_else(|| hex::decode(text).ok())
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use serde_json::json;

    use super::*;
    use crate::event::block_record_from_event;
    use crate::hash;

    #[test]
    fn envelope_shaped_event_extracts() {
        let event = json!({
            "block": {
                "header": {
                    "number": 12,
                    "previous_hash": BASE64.encode([0x11; 32]),
                    "data_hash": BASE64.encode([0x22; 32]),
                },
                "data": {"data": [{}, {}, {}]},
            }
        });

        let record = block_record_from_event(&event).unwrap();
        assert_eq!(record.block_num, 12);
        assert_eq!(record.prev_hash, hash::to_hex(&[0x11; 32]));
        assert_eq!(record.data_hash, hash::to_hex(&[0x22; 32]));
        assert_eq!(record.tx_count, 3);
        assert_eq!(
            record.block_hash,
            hash::block_header_hash(12, &[0x11; 32], &[0x22; 32])
        );
    }

    #[test]
    fn flat_shaped_event_extracts() {
        let event = json!({
            "header": {"number": 3},
            "data": {"count": 2},
        });

        let record = block_record_from_event(&event).unwrap();
        assert_eq!(record.block_num, 3);
        assert_eq!(record.tx_count, 2);
        assert_eq!(record.prev_hash, "");
        assert_eq!(record.block_hash, hash::block_header_hash(3, &[], &[]));
    }

    #[test]
    fn stringly_number_and_camel_case_fields_extract() {
        let event = json!({
            "header": {
                "number": "47",
                "previousHash": BASE64.encode([0xAA; 4]),
                "dataHash": hex::encode([0xBB; 4]),
            }
        });

        let record = block_record_from_event(&event).unwrap();
        assert_eq!(record.block_num, 47);
        assert_eq!(record.prev_hash, "aaaaaaaa");
        assert_eq!(record.data_hash, "bbbbbbbb");
    }

    #[test]
    fn event_without_header_fails_extraction() {
        let event = json!({"payload": {}});

        assert!(block_record_from_event(&event).is_err());
    }

    #[tokio::test]
    async fn ndjson_reassembles_lines_across_chunks() {
        let chunks: Vec<Result<Vec<u8>, Error>> = vec![
            Ok(b"{\"header\":{\"number\":0}}\n{\"header\":".to_vec()),
            Ok(b"{\"number\":1}}\n".to_vec()),
            Ok(b"{\"header\":{\"number\":2}}".to_vec()),
        ];
        let mut events = Box::pin(ndjson_events(stream::iter(chunks)));

        for expected in 0..3u64 {
            let event = events.next().await.unwrap().unwrap();
            let record = block_record_from_event(event.as_ref()).unwrap();
            assert_eq!(record.block_num, expected);
        }
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn ndjson_skips_blank_keepalive_lines() {
        let chunks: Vec<Result<Vec<u8>, Error>> =
            vec![Ok(b"\n\n{\"header\":{\"number\":5}}\n\n".to_vec())];
        let mut events = Box::pin(ndjson_events(stream::iter(chunks)));

        let event = events.next().await.unwrap().unwrap();
        let record = block_record_from_event(event.as_ref()).unwrap();
        assert_eq!(record.block_num, 5);
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn ndjson_surfaces_parse_failures_as_items() {
        let chunks: Vec<Result<Vec<u8>, Error>> = vec![Ok(b"not-json\n".to_vec())];
        let mut events = Box::pin(ndjson_events(stream::iter(chunks)));

        assert!(events.next().await.unwrap().is_err());
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn ndjson_surfaces_transport_failures_as_items() {
        let chunks: Vec<Result<Vec<u8>, Error>> = vec![
            Ok(b"{\"header\":{\"number\":0}}\n".to_vec()),
            Err(Error::Transport("connection reset".into())),
        ];
        let mut events = Box::pin(ndjson_events(stream::iter(chunks)));

        assert!(events.next().await.unwrap().is_ok());
        let err = events.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn events_url_targets_the_channel_feed() {
        let gateway = HttpGateway::new(
            Url::parse("https://gateway.org1.example.com:7051").unwrap(),
            "mychannel",
        )
        .unwrap();
        assert_eq!(
            gateway.events_url.as_str(),
            "https://gateway.org1.example.com:7051/channels/mychannel/blocks"
        );
    }

    #[test]
    fn provider_rejects_unknown_organizations() {
        let mut organizations = BTreeMap::new();
        organizations.insert(
            "org1".to_string(),
            OrganizationConfig {
                gateway_url: Url::parse("https://gateway.org1.example.com:7051").unwrap(),
            },
        );
        let provider = HttpGatewayProvider::new("mychannel", &organizations).unwrap();

        assert!(provider.connection("org1").is_ok());
        let err = provider.connection("org9").unwrap_err();
        assert!(matches!(err, Error::UnknownOrganization(org) if org == "org9"));
    }
}
