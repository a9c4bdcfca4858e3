//! Cross-post decision engine
//!
//! Orchestrates filtering, classification, scoring and publishing for one
//! batch run. Each platform attempt is independent: a failure or skip on
//! one platform never blocks the other, and every decision is recorded in
//! the state store at most once per note per platform.

use log::{debug, error, info};
use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::constants::{SCAN_LIMIT, SCAN_LOOKBACK_SECS};
use crate::domain::dedup::{self, Gate};
use crate::domain::formatter::{self, FormatOptions};
use crate::domain::state::{CrossPostState, DailyCounts};
use crate::domain::{classifier, engagement};
use crate::models::{
    ActionLine, Classification, EngagementSnapshot, Note, Platform, RunReport, SkipLine,
};
use crate::services::nip19;
use crate::services::relay::{EventFilter, EventSource};
use crate::services::{PublishContext, Publisher};

pub struct Engine<'a> {
    pub config: &'a Config,
    pub source: &'a dyn EventSource,
    pub publishers: &'a [Box<dyn Publisher>],
    pub dry_run: bool,
}

struct Candidate {
    note: Note,
    platforms: Vec<Platform>,
    needs_manual_rewrite: bool,
    engagement: EngagementSnapshot,
}

impl Engine<'_> {
    /// One full scan-and-decide pass over the author's recent feed
    pub async fn run_scan(&self, state: &mut CrossPostState) -> RunReport {
        let mut report = RunReport {
            dry_run: self.dry_run,
            ..Default::default()
        };
        let now = chrono::Utc::now().timestamp();
        state.daily_counts.roll(&DailyCounts::today());

        self.sweep_deletions(state, now).await;

        let events = self
            .source
            .query(
                &EventFilter::kinds(&[1, 6, 30023])
                    .author(&self.config.author_pubkey)
                    .since(now - SCAN_LOOKBACK_SECS)
                    .limit(SCAN_LIMIT),
            )
            .await;
        let notes: Vec<Note> = events.iter().filter_map(Note::from_event).collect();
        report.scanned = notes.len();
        info!("scanned {} candidate notes", report.scanned);

        // Gate and classify before paying for any engagement queries
        let mut eligible = Vec::new();
        for note in notes {
            match dedup::check(&note, state, &Platform::all(), now) {
                Gate::Skip { reason, persist } => {
                    debug!("skipping {}: {}", note.id, reason);
                    if persist {
                        state.record_skip(&note.id, &reason, now);
                    }
                    report.skipped.push(SkipLine {
                        id: note.id.clone(),
                        reason,
                    });
                }
                Gate::Proceed => match classifier::classify(&note.content) {
                    Classification::Skip { reason } => {
                        debug!("classifier skipped {}: {}", note.id, reason);
                        state.record_skip(&note.id, &reason, now);
                        report.skipped.push(SkipLine {
                            id: note.id.clone(),
                            reason,
                        });
                    }
                    Classification::Eligible {
                        platforms,
                        needs_manual_rewrite,
                    } => {
                        // Already live everywhere it can go: nothing to rescore
                        if platforms.iter().all(|p| state.has_real_post(&note.id, *p)) {
                            debug!("{} already posted on all eligible platforms", note.id);
                            continue;
                        }
                        eligible.push((note, platforms, needs_manual_rewrite));
                    }
                },
            }
        }

        // Score survivors and rank best-first
        let mut candidates = Vec::new();
        for (note, platforms, needs_manual_rewrite) in eligible {
            let engagement = engagement::score_note(self.source, &note).await;
            candidates.push(Candidate {
                note,
                platforms,
                needs_manual_rewrite,
                engagement,
            });
        }
        candidates.sort_by(|a, b| {
            b.engagement
                .score()
                .cmp(&a.engagement.score())
                .then(a.note.created_at.cmp(&b.note.created_at))
        });

        let mut cooled_off: HashSet<Platform> = HashSet::new();
        let mut last_publish: HashMap<Platform, i64> = Platform::all()
            .iter()
            .filter_map(|p| state.last_publish_at(*p).map(|t| (*p, t)))
            .collect();

        for candidate in &candidates {
            for platform in Platform::all() {
                self.attempt(
                    candidate,
                    platform,
                    state,
                    &mut report,
                    &mut cooled_off,
                    &mut last_publish,
                    now,
                )
                .await;
            }
        }

        state.last_check = now;
        report
    }

    /// Evaluate one candidate for one platform and publish when everything
    /// lines up
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        candidate: &Candidate,
        platform: Platform,
        state: &mut CrossPostState,
        report: &mut RunReport,
        cooled_off: &mut HashSet<Platform>,
        last_publish: &mut HashMap<Platform, i64>,
        now: i64,
    ) {
        if !candidate.platforms.contains(&platform) {
            return;
        }
        let note = &candidate.note;
        let policy = self.config.policy(platform);
        let score = candidate.engagement.score();

        if score < policy.min_score {
            report.below_threshold.push(ActionLine {
                id: note.id.clone(),
                platform,
                detail: format!("score {} below threshold {}", score, policy.min_score),
            });
            return;
        }

        if state.daily_counts.count(platform) >= policy.daily_cap {
            debug!("daily cap reached for {}", platform);
            return;
        }

        if state.has_real_post(&note.id, platform) {
            return;
        }
        if state.is_flagged(&note.id, platform) {
            debug!("{} still awaiting manual rewrite for {}", note.id, platform);
            return;
        }

        if cooled_off.contains(&platform) {
            return;
        }
        if let Some(last) = last_publish.get(&platform) {
            if now - last < policy.cooldown_secs {
                info!("{} cooldown active, no more posts there this run", platform);
                cooled_off.insert(platform);
                return;
            }
        }

        if candidate.needs_manual_rewrite && platform == Platform::Linkedin {
            state.record_flagged(note, &candidate.engagement, platform, now);
            report.flagged.push(ActionLine {
                id: note.id.clone(),
                platform,
                detail: "casual tone needs a manual rewrite".to_string(),
            });
            return;
        }

        let reference = nip19::event_reference(&note.id, &note.pubkey, &self.config.relays);
        let footer = format!("🔗 {}", reference);
        let stripped = formatter::strip_content(&note.content);
        let options = FormatOptions {
            footer: Some(footer),
        };
        let post = match platform {
            Platform::Twitter => formatter::format_for_twitter(&stripped, &options),
            Platform::Linkedin => {
                formatter::format_for_linkedin(&stripped, note.article.as_ref(), &options)
            }
        };

        if self.dry_run {
            state.record_publish(note, &candidate.engagement, platform, now, true, None);
            report.posted.push(ActionLine {
                id: note.id.clone(),
                platform,
                detail: "dry run".to_string(),
            });
            return;
        }

        let Some(publisher) = self.publishers.iter().find(|p| p.platform() == platform) else {
            return;
        };
        let context = PublishContext {
            article: note.article.as_ref(),
            source_url: Some(&reference),
        };
        match publisher.publish(&post, context).await {
            Ok(outcome) => {
                info!("posted {} to {} as {}", note.id, platform, outcome.post_id);
                state.record_publish(
                    note,
                    &candidate.engagement,
                    platform,
                    now,
                    false,
                    Some(&outcome),
                );
                state.daily_counts.increment(platform);
                last_publish.insert(platform, now);
                report.posted.push(ActionLine {
                    id: note.id.clone(),
                    platform,
                    detail: outcome.url.unwrap_or(outcome.post_id),
                });
            }
            Err(e) => {
                // Abandon this platform attempt only; the note stays
                // eligible for a retry next run
                error!("publish to {} failed for {}: {}", platform, note.id, e);
                report.errors.push(format!("{} {}: {}", note.id, platform, e));
            }
        }
    }

    /// Mark state records whose source notes were since deleted so they are
    /// never attempted again
    async fn sweep_deletions(&self, state: &mut CrossPostState, now: i64) {
        let deletions = self
            .source
            .query(
                &EventFilter::kinds(&[5])
                    .author(&self.config.author_pubkey)
                    .since(now - SCAN_LOOKBACK_SECS)
                    .limit(SCAN_LIMIT),
            )
            .await;
        for event in deletions {
            for tag in &event.tags {
                if tag.first().map(String::as_str) != Some("e") {
                    continue;
                }
                if let Some(id) = tag.get(1) {
                    if state.mark_deleted(id) {
                        info!("source note {} was deleted, will not repost", id);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LinkedinCredentials, PlatformPolicy, TwitterCredentials};
    use crate::models::NostrEvent;
    use crate::services::relay::testing::FixtureEventSource;
    use crate::services::{PublishError, PublishOutcome};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    const DUAL_TOPIC: &str =
        "Nostr gives you sovereign identity and Bitcoin gives you sound money.";

    fn test_config() -> Config {
        Config {
            author_pubkey: "f".repeat(64),
            relays: vec!["wss://relay.damus.io".to_string()],
            search_relay: "wss://relay.nostr.band".to_string(),
            nak_bin: "nak".to_string(),
            twitter: TwitterCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                access_token: "token".to_string(),
                refresh_token: None,
            },
            linkedin: LinkedinCredentials {
                access_token: "token".to_string(),
                author_urn: "urn:li:person:test".to_string(),
            },
            twitter_policy: PlatformPolicy {
                min_score: 10,
                daily_cap: 5,
                cooldown_secs: 0,
            },
            linkedin_policy: PlatformPolicy {
                min_score: 15,
                daily_cap: 2,
                cooldown_secs: 0,
            },
        }
    }

    fn feed_event(id: &str, content: &str) -> NostrEvent {
        NostrEvent {
            id: id.to_string(),
            pubkey: "f".repeat(64),
            created_at: chrono::Utc::now().timestamp() - crate::constants::MIN_AGE_SECS - 600,
            kind: 1,
            tags: Vec::new(),
            content: content.to_string(),
        }
    }

    /// Gives every feed note enough reactions to clear both thresholds
    fn hot_source(feed: Vec<NostrEvent>) -> FixtureEventSource {
        let mut engagement = HashMap::new();
        for event in &feed {
            engagement.insert((event.id.clone(), 7), 20);
        }
        FixtureEventSource {
            feed,
            engagement,
            ..Default::default()
        }
    }

    struct StubPublisher {
        platform: Platform,
        calls: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl StubPublisher {
        fn boxed(platform: Platform, calls: Arc<Mutex<Vec<String>>>) -> Box<dyn Publisher> {
            Box::new(StubPublisher {
                platform,
                calls,
                fail: false,
            })
        }

        fn failing(platform: Platform, calls: Arc<Mutex<Vec<String>>>) -> Box<dyn Publisher> {
            Box::new(StubPublisher {
                platform,
                calls,
                fail: true,
            })
        }
    }

    #[async_trait]
    impl Publisher for StubPublisher {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn publish(
            &self,
            post: &crate::models::FormattedPost,
            _context: PublishContext<'_>,
        ) -> Result<PublishOutcome, PublishError> {
            self.calls
                .lock()
                .unwrap()
                .push(post.segments.first().cloned().unwrap_or_default());
            if self.fail {
                return Err(PublishError::Api("simulated failure".to_string()));
            }
            Ok(PublishOutcome {
                post_id: format!("{}-{}", self.platform, self.calls.lock().unwrap().len()),
                url: None,
            })
        }
    }

    fn stub_publishers(
        calls: &Arc<Mutex<Vec<String>>>,
    ) -> Vec<Box<dyn Publisher>> {
        vec![
            StubPublisher::boxed(Platform::Twitter, calls.clone()),
            StubPublisher::boxed(Platform::Linkedin, calls.clone()),
        ]
    }

    #[tokio::test]
    async fn test_back_to_back_runs_never_double_publish() {
        let config = test_config();
        let source = hot_source(vec![feed_event("n1", DUAL_TOPIC)]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers = stub_publishers(&calls);
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: false,
        };

        let mut state = CrossPostState::default();
        let first = engine.run_scan(&mut state).await;
        assert_eq!(first.posted.len(), 2);
        assert_eq!(calls.lock().unwrap().len(), 2);

        let second = engine.run_scan(&mut state).await;
        assert!(second.posted.is_empty());
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_daily_cap_is_enforced() {
        let mut config = test_config();
        config.twitter_policy.daily_cap = 1;
        // Distinct bodies so the duplicate check stays out of the way
        let source = hot_source(vec![
            feed_event("n1", "Bitcoin custody is a skill every user eventually needs to learn."),
            feed_event("n2", "Nostr relays are cheaper to run than most people assume."),
            feed_event("n3", "Lightning channels teach you the real cost of liquidity."),
        ]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers = vec![StubPublisher::boxed(Platform::Twitter, calls.clone())];
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: false,
        };

        let mut state = CrossPostState::default();
        let report = engine.run_scan(&mut state).await;
        assert_eq!(report.posted.len(), 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(state.daily_counts.count(Platform::Twitter), 1);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing_real() {
        let config = test_config();
        let source = hot_source(vec![feed_event("n1", DUAL_TOPIC)]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers = stub_publishers(&calls);
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: true,
        };

        let mut state = CrossPostState::default();
        let report = engine.run_scan(&mut state).await;
        assert_eq!(report.posted.len(), 2);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(state.daily_counts.count(Platform::Twitter), 0);
        assert!(!state.has_real_post("n1", Platform::Twitter));

        // A later real run replaces the dry entries and counts for real
        let real_engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: false,
        };
        let report = real_engine.run_scan(&mut state).await;
        assert_eq!(report.posted.len(), 2);
        assert!(state.has_real_post("n1", Platform::Twitter));
        assert_eq!(state.daily_counts.count(Platform::Twitter), 1);
    }

    #[tokio::test]
    async fn test_casual_tone_is_flagged_not_published_on_linkedin() {
        let config = test_config();
        let body = "tbh bitcoin payments infrastructure adoption is moving faster than the \
                    industry press realizes these days";
        let source = hot_source(vec![feed_event("n1", body)]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers = stub_publishers(&calls);
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: false,
        };

        let mut state = CrossPostState::default();
        let report = engine.run_scan(&mut state).await;

        assert_eq!(report.flagged.len(), 1);
        assert_eq!(report.flagged[0].platform, Platform::Linkedin);
        assert!(state.is_flagged("n1", Platform::Linkedin));
        // X still went out
        assert_eq!(report.posted.len(), 1);
        assert_eq!(report.posted[0].platform, Platform::Twitter);

        // Next run leaves the flag alone and does not publish
        let report = engine.run_scan(&mut state).await;
        assert!(report.flagged.is_empty());
        assert!(state.is_flagged("n1", Platform::Linkedin));
    }

    #[tokio::test]
    async fn test_publish_failure_leaves_note_retryable() {
        let config = test_config();
        let source = hot_source(vec![feed_event("n1", DUAL_TOPIC)]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers = vec![StubPublisher::failing(Platform::Twitter, calls.clone())];
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: false,
        };

        let mut state = CrossPostState::default();
        let report = engine.run_scan(&mut state).await;

        assert!(report.posted.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(!state.has_real_post("n1", Platform::Twitter));
        assert!(!state.skipped.contains_key("n1"));
        assert_eq!(state.daily_counts.count(Platform::Twitter), 0);
    }

    #[tokio::test]
    async fn test_cooldown_stops_the_platform_for_the_run() {
        let mut config = test_config();
        config.twitter_policy.cooldown_secs = 3600;
        let source = hot_source(vec![
            feed_event("n1", "Bitcoin custody is a skill every user eventually needs to learn."),
            feed_event("n2", "Nostr relays are cheaper to run than most people assume."),
        ]);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers = vec![StubPublisher::boxed(Platform::Twitter, calls.clone())];
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: false,
        };

        // A real publish ten seconds ago puts the platform in cooldown
        let mut state = CrossPostState::default();
        let prior = Note::from_event(&feed_event("n0", "Prior content about sats entirely."))
            .unwrap();
        state.record_publish(
            &prior,
            &EngagementSnapshot::default(),
            Platform::Twitter,
            chrono::Utc::now().timestamp() - 10,
            false,
            None,
        );

        let report = engine.run_scan(&mut state).await;
        assert!(report.posted.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deletion_sweep_blocks_reposting() {
        let config = test_config();
        let mut source = hot_source(vec![feed_event("n1", DUAL_TOPIC)]);
        source.deletions = vec![NostrEvent {
            id: "d1".to_string(),
            pubkey: "f".repeat(64),
            created_at: chrono::Utc::now().timestamp() - 60,
            kind: 5,
            tags: vec![vec!["e".to_string(), "n1".to_string()]],
            content: String::new(),
        }];
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers = stub_publishers(&calls);
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: false,
        };

        // The note was posted to X in an earlier run, then deleted at the
        // source
        let mut state = CrossPostState::default();
        let note = Note::from_event(&feed_event("n1", DUAL_TOPIC)).unwrap();
        state.record_publish(
            &note,
            &EngagementSnapshot::default(),
            Platform::Twitter,
            100,
            false,
            None,
        );

        let report = engine.run_scan(&mut state).await;
        assert!(report.posted.is_empty());
        assert!(calls.lock().unwrap().is_empty());
        assert!(state.posted["n1"].deleted);
    }

    #[tokio::test]
    async fn test_below_threshold_is_reported_not_persisted() {
        let config = test_config();
        let mut source = hot_source(vec![feed_event("n1", DUAL_TOPIC)]);
        // 3 reactions = score 3, under both thresholds
        source.engagement.insert(("n1".to_string(), 7), 3);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let publishers = stub_publishers(&calls);
        let engine = Engine {
            config: &config,
            source: &source,
            publishers: &publishers,
            dry_run: false,
        };

        let mut state = CrossPostState::default();
        let report = engine.run_scan(&mut state).await;

        assert_eq!(report.below_threshold.len(), 2);
        assert!(report.posted.is_empty());
        assert!(state.skipped.is_empty());
        assert!(state.posted.is_empty());
    }
}
