//! Engagement scoring
//!
//! Counts reaction-like events referencing a note, weighted by how much
//! each engagement type costs the engager. Every relay query degrades to
//! zero on failure; scoring never blocks the pipeline.

use log::debug;

use crate::constants::*;
use crate::domain::formatter::strip_content;
use crate::models::{EngagementSnapshot, Note};
use crate::services::relay::{EventFilter, EventSource};

/// Compute a fresh engagement snapshot for a note
pub async fn score_note(source: &dyn EventSource, note: &Note) -> EngagementSnapshot {
    let reactions = count_kind(source, 7, &note.id).await;
    let reposts = count_kind(source, 6, &note.id).await;
    let zaps = count_kind(source, 9735, &note.id).await;

    // Replies from the author don't count as engagement
    let replies = source
        .query(
            &EventFilter::kinds(&[1])
                .referencing(&note.id)
                .limit(ENGAGEMENT_QUERY_LIMIT),
        )
        .await
        .iter()
        .filter(|e| e.pubkey != note.pubkey)
        .count() as u32;

    let trending_bonus = trending_bonus(source, &note.content).await;

    let snapshot = EngagementSnapshot {
        reactions,
        reposts,
        zaps,
        replies,
        trending_bonus,
    };
    debug!(
        "note {}: {}r/{}rp/{}z/{}re (+{}) = {}",
        note.id,
        reactions,
        reposts,
        zaps,
        replies,
        trending_bonus,
        snapshot.score()
    );
    snapshot
}

async fn count_kind(source: &dyn EventSource, kind: u32, id: &str) -> u32 {
    source
        .query(
            &EventFilter::kinds(&[kind])
                .referencing(id)
                .limit(ENGAGEMENT_QUERY_LIMIT),
        )
        .await
        .len() as u32
}

/// The 3 longest words of at least 5 characters, as one search phrase
pub fn trending_phrase(body: &str) -> Option<String> {
    let stripped = strip_content(body);
    let mut words: Vec<&str> = stripped
        .text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() >= TRENDING_WORD_MIN_LEN)
        .collect();
    words.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
    words.truncate(TRENDING_WORD_COUNT);
    (!words.is_empty()).then(|| words.join(" "))
}

/// Noisy best-effort signal: any hit on the search relay earns the bonus,
/// anything else (including failure) earns nothing
async fn trending_bonus(source: &dyn EventSource, body: &str) -> u32 {
    let Some(phrase) = trending_phrase(body) else {
        return 0;
    };
    if source.search(&phrase, TRENDING_SEARCH_LIMIT).await.is_empty() {
        0
    } else {
        TRENDING_BONUS
    }
}
