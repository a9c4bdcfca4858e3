//! Relay query boundary
//!
//! The pipeline never speaks the relay protocol itself; it shells out to the
//! `nak` CLI and parses the newline-delimited JSON events it prints. The
//! `EventSource` trait keeps that detail out of the core so tests can feed
//! fixture events instead.

use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::process::Command;

use crate::constants::RELAY_TIMEOUT_SECS;
use crate::models::NostrEvent;

/// Subset of a relay filter the pipeline needs
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kinds: Vec<u32>,
    pub authors: Vec<String>,
    /// Match events carrying an `e` tag referencing this id
    pub ref_event: Option<String>,
    pub since: Option<i64>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn kinds(kinds: &[u32]) -> Self {
        EventFilter {
            kinds: kinds.to_vec(),
            ..Default::default()
        }
    }

    pub fn author(mut self, pubkey: &str) -> Self {
        self.authors.push(pubkey.to_string());
        self
    }

    pub fn referencing(mut self, id: &str) -> Self {
        self.ref_event = Some(id.to_string());
        self
    }

    pub fn since(mut self, ts: i64) -> Self {
        self.since = Some(ts);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Read-only event feed. Both calls are total: failures and timeouts
/// degrade to an empty result so scoring never blocks the pipeline.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn query(&self, filter: &EventFilter) -> Vec<NostrEvent>;

    async fn search(&self, phrase: &str, limit: usize) -> Vec<NostrEvent>;
}

/// `EventSource` backed by the `nak` relay query tool
pub struct NakEventSource {
    bin: String,
    relays: Vec<String>,
    search_relay: String,
}

impl NakEventSource {
    pub fn new(bin: &str, relays: &[String], search_relay: &str) -> Self {
        NakEventSource {
            bin: bin.to_string(),
            relays: relays.to_vec(),
            search_relay: search_relay.to_string(),
        }
    }

    async fn run(&self, args: Vec<String>) -> Vec<NostrEvent> {
        debug!("nak {}", args.join(" "));

        let output = tokio::time::timeout(
            Duration::from_secs(RELAY_TIMEOUT_SECS),
            Command::new(&self.bin).args(&args).output(),
        )
        .await;

        let output = match output {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => {
                warn!("relay query failed to launch {}: {}", self.bin, e);
                return Vec::new();
            }
            Err(_) => {
                warn!("relay query timed out after {}s", RELAY_TIMEOUT_SECS);
                return Vec::new();
            }
        };

        if !output.status.success() {
            warn!(
                "relay query exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Vec::new();
        }

        parse_ndjson(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse newline-delimited JSON events, dropping lines that do not parse
pub fn parse_ndjson(raw: &str) -> Vec<NostrEvent> {
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<NostrEvent>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                debug!("dropping unparseable event line: {}", e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl EventSource for NakEventSource {
    async fn query(&self, filter: &EventFilter) -> Vec<NostrEvent> {
        let mut args = vec!["req".to_string()];
        for kind in &filter.kinds {
            args.push("-k".into());
            args.push(kind.to_string());
        }
        for author in &filter.authors {
            args.push("-a".into());
            args.push(author.clone());
        }
        if let Some(id) = &filter.ref_event {
            args.push("-e".into());
            args.push(id.clone());
        }
        if let Some(since) = filter.since {
            args.push("--since".into());
            args.push(since.to_string());
        }
        if let Some(limit) = filter.limit {
            args.push("--limit".into());
            args.push(limit.to_string());
        }
        args.extend(self.relays.iter().cloned());

        self.run(args).await
    }

    async fn search(&self, phrase: &str, limit: usize) -> Vec<NostrEvent> {
        let args = vec![
            "req".to_string(),
            "--search".into(),
            phrase.to_string(),
            "--limit".into(),
            limit.to_string(),
            self.search_relay.clone(),
        ];

        self.run(args).await
    }
}
