//! Environment-backed configuration and credentials

use anyhow::{Context, Result};
use std::env;

use crate::constants::*;
use crate::models::Platform;

#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LinkedinCredentials {
    pub access_token: String,
    /// URN of the member posting, e.g. `urn:li:person:abc123`
    pub author_urn: String,
}

/// Per-platform publish policy
#[derive(Debug, Clone, Copy)]
pub struct PlatformPolicy {
    pub min_score: u32,
    pub daily_cap: u32,
    pub cooldown_secs: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Hex pubkey of the single author whose feed is scanned
    pub author_pubkey: String,
    pub relays: Vec<String>,
    pub search_relay: String,
    /// Path of the `nak` relay query binary
    pub nak_bin: String,
    pub twitter: TwitterCredentials,
    pub linkedin: LinkedinCredentials,
    pub twitter_policy: PlatformPolicy,
    pub linkedin_policy: PlatformPolicy,
}

fn require(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("{name} is not set; export it before running"))
}

fn override_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from the environment. Missing credentials are a
    /// setup error and abort the run before any publish attempt.
    pub fn from_env() -> Result<Config> {
        let author_pubkey = require("NOSTR_AUTHOR_PUBKEY")?;

        let relays = match env::var("NOSTR_RELAYS") {
            Ok(v) if !v.trim().is_empty() => v
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            _ => DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
        };

        let twitter = TwitterCredentials {
            client_id: require("TWITTER_CLIENT_ID")?,
            client_secret: require("TWITTER_CLIENT_SECRET")?,
            access_token: require("TWITTER_ACCESS_TOKEN")?,
            refresh_token: env::var("TWITTER_REFRESH_TOKEN").ok(),
        };

        let linkedin = LinkedinCredentials {
            access_token: require("LINKEDIN_ACCESS_TOKEN")?,
            author_urn: require("LINKEDIN_AUTHOR_URN")?,
        };

        Ok(Config {
            author_pubkey,
            relays,
            search_relay: env::var("NOSTR_SEARCH_RELAY").unwrap_or_else(|_| SEARCH_RELAY.into()),
            nak_bin: env::var("NAK_BIN").unwrap_or_else(|_| "nak".into()),
            twitter,
            linkedin,
            twitter_policy: PlatformPolicy {
                min_score: override_u32("TWITTER_MIN_SCORE", TWITTER_MIN_SCORE),
                daily_cap: override_u32("TWITTER_DAILY_CAP", TWITTER_DAILY_CAP),
                cooldown_secs: TWITTER_COOLDOWN_SECS,
            },
            linkedin_policy: PlatformPolicy {
                min_score: override_u32("LINKEDIN_MIN_SCORE", LINKEDIN_MIN_SCORE),
                daily_cap: override_u32("LINKEDIN_DAILY_CAP", LINKEDIN_DAILY_CAP),
                cooldown_secs: LINKEDIN_COOLDOWN_SECS,
            },
        })
    }

    pub fn policy(&self, platform: Platform) -> PlatformPolicy {
        match platform {
            Platform::Twitter => self.twitter_policy,
            Platform::Linkedin => self.linkedin_policy,
        }
    }
}
