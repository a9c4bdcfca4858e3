//! Dedup and recency gating
//!
//! Runs before classification. Most skips here are terminal and get a
//! persistent skip record; the "too young" case deliberately does not,
//! since age resolves itself and the note deserves a second look once it
//! has had time to accrue engagement.

use crate::constants::{DUP_PREFIX_LEN, MIN_AGE_SECS};
use crate::domain::state::CrossPostState;
use crate::models::{Note, Platform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Proceed,
    Skip {
        reason: String,
        /// Whether the caller should write a skip record
        persist: bool,
    },
}

impl Gate {
    fn skip(reason: impl Into<String>, persist: bool) -> Gate {
        Gate::Skip {
            reason: reason.into(),
            persist,
        }
    }
}

/// Lowercase, collapse whitespace and truncate to a fixed prefix. Two
/// bodies normalizing to the same or contained strings are treated as the
/// same content.
pub fn normalize_body(body: &str) -> String {
    body.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(DUP_PREFIX_LEN)
        .collect()
}

pub fn check(note: &Note, state: &CrossPostState, targets: &[Platform], now: i64) -> Gate {
    if let Some(record) = state.skipped.get(&note.id) {
        return Gate::skip(format!("previously skipped: {}", record.reason), false);
    }

    if let Some(record) = state.posted.get(&note.id) {
        if record.deleted {
            return Gate::skip("source note was deleted", false);
        }
    }

    if !targets.is_empty() && targets.iter().all(|p| state.has_real_post(&note.id, *p)) {
        return Gate::skip("already cross-posted everywhere", false);
    }

    if note.is_reply {
        return Gate::skip("reply", true);
    }
    if note.is_repost {
        return Gate::skip("repost", true);
    }

    if note.has_quote_ref {
        return Gate::skip("contains a quote reference", true);
    }

    let age = now - note.created_at;
    if age < MIN_AGE_SECS {
        return Gate::skip(
            format!("too young: {}s old (minimum {}s)", age, MIN_AGE_SECS),
            false,
        );
    }

    let normalized = normalize_body(&note.content);
    if !normalized.is_empty() {
        for (other_id, record) in &state.posted {
            if *other_id == note.id {
                continue;
            }
            let other = normalize_body(&record.content);
            if other.is_empty() {
                continue;
            }
            if normalized == other || normalized.contains(&other) || other.contains(&normalized) {
                return Gate::skip(format!("duplicate of {}", other_id), true);
            }
        }
    }

    Gate::Proceed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EngagementSnapshot, NoteKind};

    const NOW: i64 = 1_700_000_000;

    fn note(id: &str, content: &str) -> Note {
        Note {
            id: id.to_string(),
            pubkey: "p".repeat(64),
            created_at: NOW - MIN_AGE_SECS - 100,
            kind: NoteKind::Note,
            content: content.to_string(),
            is_reply: false,
            is_repost: false,
            has_quote_ref: false,
            article: None,
        }
    }

    fn state_with_posted(id: &str, content: &str) -> CrossPostState {
        let mut state = CrossPostState::default();
        state.upsert_record(&note(id, content), &EngagementSnapshot::default());
        state
    }

    #[test]
    fn test_fresh_note_proceeds() {
        let state = CrossPostState::default();
        let gate = check(&note("n1", "some content"), &state, &Platform::all(), NOW);
        assert_eq!(gate, Gate::Proceed);
    }

    #[test]
    fn test_existing_skip_record_short_circuits() {
        let mut state = CrossPostState::default();
        state.record_skip("n1", "reply", NOW - 100);
        let gate = check(&note("n1", "anything"), &state, &Platform::all(), NOW);
        match gate {
            Gate::Skip { reason, persist } => {
                assert!(reason.contains("previously skipped"));
                assert!(!persist);
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_and_repost_are_terminal() {
        let state = CrossPostState::default();
        let mut reply = note("n1", "content");
        reply.is_reply = true;
        assert_eq!(
            check(&reply, &state, &Platform::all(), NOW),
            Gate::skip("reply", true)
        );

        let mut repost = note("n2", "content");
        repost.is_repost = true;
        assert_eq!(
            check(&repost, &state, &Platform::all(), NOW),
            Gate::skip("repost", true)
        );
    }

    #[test]
    fn test_quote_ref_is_terminal() {
        let state = CrossPostState::default();
        let mut quoting = note("n1", "look at this nostr:nevent1qqs");
        quoting.has_quote_ref = true;
        assert_eq!(
            check(&quoting, &state, &Platform::all(), NOW),
            Gate::skip("contains a quote reference", true)
        );
    }

    #[test]
    fn test_young_note_skip_is_not_persisted() {
        let state = CrossPostState::default();
        let mut young = note("n1", "content");
        young.created_at = NOW - 60;
        match check(&young, &state, &Platform::all(), NOW) {
            Gate::Skip { reason, persist } => {
                assert!(reason.contains("too young"));
                assert!(!persist);
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_exact_and_containment() {
        let state = state_with_posted("old", "Bitcoin fixes the money. Nostr fixes the feed.");

        let exact = note("n1", "bitcoin fixes the money.  nostr fixes the feed.");
        match check(&exact, &state, &Platform::all(), NOW) {
            Gate::Skip { reason, persist } => {
                assert_eq!(reason, "duplicate of old");
                assert!(persist);
            }
            other => panic!("expected skip, got {:?}", other),
        }

        // Substring containment in either direction also counts
        let shorter = note("n2", "Bitcoin fixes the money.");
        assert!(matches!(
            check(&shorter, &state, &Platform::all(), NOW),
            Gate::Skip { .. }
        ));
    }

    #[test]
    fn test_distinct_content_is_not_duplicate() {
        let state = state_with_posted("old", "Bitcoin fixes the money. Nostr fixes the feed.");
        let fresh = note("n1", "Relay operators deserve more credit than they get.");
        assert_eq!(check(&fresh, &state, &Platform::all(), NOW), Gate::Proceed);
    }

    #[test]
    fn test_deleted_record_blocks_forever() {
        let mut state = state_with_posted("n1", "some content");
        assert!(state.mark_deleted("n1"));
        match check(&note("n1", "some content"), &state, &Platform::all(), NOW) {
            Gate::Skip { reason, persist } => {
                assert!(reason.contains("deleted"));
                assert!(!persist);
            }
            other => panic!("expected skip, got {:?}", other),
        }
    }
}
