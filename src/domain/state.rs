//! Persistent cross-post state
//!
//! A single JSON document, loaded once at the start of a run, mutated in
//! memory and written back in full at the end. Records are merged, never
//! replaced wholesale, and a real publish result is sticky: a later dry
//! run can never overwrite it.

use chrono::Local;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::constants::STORED_CONTENT_PREFIX_LEN;
use crate::models::{EngagementSnapshot, Note, NoteKind, Platform};
use crate::services::PublishOutcome;

/// One platform's publish (or flag) result for one note
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossPostEntry {
    pub at: i64,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub flagged_for_rewrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default)]
    pub cross_posted: BTreeMap<Platform, CrossPostEntry>,
    pub score: u32,
    pub engagement: EngagementSnapshot,
    /// Bounded prefix of the original body, enough for the duplicate check
    pub content: String,
    pub kind: NoteKind,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipRecord {
    pub reason: String,
    pub at: i64,
}

/// Per-calendar-day publish counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyCounts {
    pub date: String,
    pub twitter: u32,
    pub linkedin: u32,
}

impl DailyCounts {
    pub fn today() -> String {
        Local::now().format("%Y-%m-%d").to_string()
    }

    /// Reset the counters when the wall-clock date has rolled over
    pub fn roll(&mut self, today: &str) {
        if self.date != today {
            *self = DailyCounts {
                date: today.to_string(),
                ..Default::default()
            };
        }
    }

    pub fn count(&self, platform: Platform) -> u32 {
        match platform {
            Platform::Twitter => self.twitter,
            Platform::Linkedin => self.linkedin,
        }
    }

    pub fn increment(&mut self, platform: Platform) {
        match platform {
            Platform::Twitter => self.twitter += 1,
            Platform::Linkedin => self.linkedin += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossPostState {
    pub last_check: i64,
    pub posted: BTreeMap<String, PostRecord>,
    pub skipped: BTreeMap<String, SkipRecord>,
    pub daily_counts: DailyCounts,
}

impl CrossPostState {
    /// Load state from disk. A missing file is the first run; a malformed
    /// file is logged and treated as empty rather than aborting.
    pub fn load(path: &Path) -> CrossPostState {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return CrossPostState::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "state file {} is malformed, starting from empty state: {}",
                    path.display(),
                    e
                );
                CrossPostState::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Create or refresh the record for a note. Score and engagement are
    /// updated every run; the stored body prefix and kind are set once.
    pub fn upsert_record(&mut self, note: &Note, engagement: &EngagementSnapshot) -> &mut PostRecord {
        let record = self
            .posted
            .entry(note.id.clone())
            .or_insert_with(|| PostRecord {
                cross_posted: BTreeMap::new(),
                score: 0,
                engagement: EngagementSnapshot::default(),
                content: note.content.chars().take(STORED_CONTENT_PREFIX_LEN).collect(),
                kind: note.kind,
                deleted: false,
            });
        record.score = engagement.score();
        record.engagement = *engagement;
        record
    }

    /// Merge a publish result. Real results are sticky: an existing
    /// non-dry-run entry is never overwritten by a dry-run one.
    pub fn record_publish(
        &mut self,
        note: &Note,
        engagement: &EngagementSnapshot,
        platform: Platform,
        at: i64,
        dry_run: bool,
        outcome: Option<&PublishOutcome>,
    ) {
        let record = self.upsert_record(note, engagement);
        if let Some(existing) = record.cross_posted.get(&platform) {
            if !existing.dry_run && !existing.flagged_for_rewrite && dry_run {
                return;
            }
        }
        record.cross_posted.insert(
            platform,
            CrossPostEntry {
                at,
                dry_run,
                post_id: outcome.map(|o| o.post_id.clone()),
                url: outcome.and_then(|o| o.url.clone()),
                flagged_for_rewrite: false,
            },
        );
    }

    /// Record that a platform needs a manual rewrite before publishing.
    /// Existing entries of any kind are left alone.
    pub fn record_flagged(
        &mut self,
        note: &Note,
        engagement: &EngagementSnapshot,
        platform: Platform,
        at: i64,
    ) {
        let record = self.upsert_record(note, engagement);
        record.cross_posted.entry(platform).or_insert(CrossPostEntry {
            at,
            dry_run: false,
            post_id: None,
            url: None,
            flagged_for_rewrite: true,
        });
    }

    pub fn record_skip(&mut self, id: &str, reason: &str, at: i64) {
        self.skipped.insert(
            id.to_string(),
            SkipRecord {
                reason: reason.to_string(),
                at,
            },
        );
    }

    /// Whether a genuine (non-dry-run, non-flagged) publish exists
    pub fn has_real_post(&self, id: &str, platform: Platform) -> bool {
        self.posted
            .get(id)
            .and_then(|r| r.cross_posted.get(&platform))
            .is_some_and(|e| !e.dry_run && !e.flagged_for_rewrite)
    }

    pub fn is_flagged(&self, id: &str, platform: Platform) -> bool {
        self.posted
            .get(id)
            .and_then(|r| r.cross_posted.get(&platform))
            .is_some_and(|e| e.flagged_for_rewrite)
    }

    /// Mark a note as deleted at the source. Returns whether a record was
    /// actually updated.
    pub fn mark_deleted(&mut self, id: &str) -> bool {
        match self.posted.get_mut(id) {
            Some(record) if !record.deleted => {
                record.deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Timestamp of the most recent real publish to a platform, for the
    /// cooldown check
    pub fn last_publish_at(&self, platform: Platform) -> Option<i64> {
        self.posted
            .values()
            .filter_map(|r| r.cross_posted.get(&platform))
            .filter(|e| !e.dry_run && !e.flagged_for_rewrite)
            .map(|e| e.at)
            .max()
    }
}
