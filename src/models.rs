//! Shared data models used across modules

use serde::{Deserialize, Serialize};

/// Destination platform for a cross-post
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Linkedin,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
        }
    }

    /// All platforms the pipeline targets, in evaluation order
    pub fn all() -> [Platform; 2] {
        [Platform::Twitter, Platform::Linkedin]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw Nostr event as returned by the relay query tool (one NDJSON line)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NostrEvent {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u32,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    #[serde(default)]
    pub content: String,
}

impl NostrEvent {
    /// First value of the first tag with the given name
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.first().map(String::as_str) == Some(name))
    }
}

/// Long-form article metadata carried in kind-30023 tags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleMeta {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub image: Option<String>,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Note,
    Article,
}

/// One candidate post, built from a raw event fetched this run
#[derive(Debug, Clone)]
pub struct Note {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: NoteKind,
    pub content: String,
    pub is_reply: bool,
    pub is_repost: bool,
    pub has_quote_ref: bool,
    pub article: Option<ArticleMeta>,
}

impl Note {
    /// Build a candidate from a raw event. Kinds other than 1, 6 and 30023
    /// are not candidates.
    pub fn from_event(event: &NostrEvent) -> Option<Note> {
        let kind = match event.kind {
            1 | 6 => NoteKind::Note,
            30023 => NoteKind::Article,
            _ => return None,
        };

        let article = (kind == NoteKind::Article).then(|| ArticleMeta {
            title: event.tag_value("title").map(str::to_string),
            summary: event.tag_value("summary").map(str::to_string),
            image: event.tag_value("image").map(str::to_string),
            topics: event
                .tags
                .iter()
                .filter(|t| t.first().map(String::as_str) == Some("t"))
                .filter_map(|t| t.get(1).cloned())
                .collect(),
        });

        Some(Note {
            id: event.id.clone(),
            pubkey: event.pubkey.clone(),
            created_at: event.created_at,
            kind,
            content: event.content.clone(),
            is_reply: event.kind == 1 && event.has_tag("e"),
            is_repost: event.kind == 6,
            has_quote_ref: event.content.contains("nostr:note1")
                || event.content.contains("nostr:nevent1"),
            article,
        })
    }
}

/// Outcome of running the pattern classifier over a note body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Skip {
        reason: String,
    },
    Eligible {
        platforms: Vec<Platform>,
        needs_manual_rewrite: bool,
    },
}

impl Classification {
    pub fn skip(reason: impl Into<String>) -> Self {
        Classification::Skip {
            reason: reason.into(),
        }
    }
}

/// Engagement counts for one note, recomputed fresh each run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    pub reactions: u32,
    pub reposts: u32,
    pub zaps: u32,
    pub replies: u32,
    #[serde(default)]
    pub trending_bonus: u32,
}

impl EngagementSnapshot {
    pub fn score(&self) -> u32 {
        self.reactions * crate::constants::REACTION_WEIGHT
            + self.reposts * crate::constants::REPOST_WEIGHT
            + self.zaps * crate::constants::ZAP_WEIGHT
            + self.replies * crate::constants::REPLY_WEIGHT
            + self.trending_bonus
    }
}

/// Per-platform rendering of a note, ready for the publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPost {
    pub segments: Vec<String>,
    pub media: Vec<String>,
}

/// One per-platform action line of the final run report
#[derive(Debug, Clone, Serialize)]
pub struct ActionLine {
    pub id: String,
    pub platform: Platform,
    pub detail: String,
}

/// One skipped-candidate line of the final run report
#[derive(Debug, Clone, Serialize)]
pub struct SkipLine {
    pub id: String,
    pub reason: String,
}

/// Structured result emitted as JSON on stdout at the end of a run
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub dry_run: bool,
    pub scanned: usize,
    pub posted: Vec<ActionLine>,
    pub flagged: Vec<ActionLine>,
    pub below_threshold: Vec<ActionLine>,
    pub skipped: Vec<SkipLine>,
    pub errors: Vec<String>,
}
