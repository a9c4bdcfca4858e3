//! Pre-authored content queue
//!
//! The `--queue` mode publishes hand-written entries from a JSON file
//! instead of scanning the live feed. Caps, cooldowns and dry-run behave
//! exactly as in the live pipeline; entries are removed from the file only
//! after every platform they name has really been published.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::domain::formatter::{self, FormatOptions};
use crate::domain::state::{CrossPostState, DailyCounts};
use crate::models::{ActionLine, Platform, RunReport};
use crate::services::{PublishContext, Publisher};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub text: String,
    pub platforms: Vec<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Load the queue file. Missing or malformed files degrade to an empty
/// queue, matching the state store's behavior.
pub fn load_queue(path: &Path) -> Vec<QueueItem> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(_) => return Vec::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!("queue file {} is malformed, ignoring it: {}", path.display(), e);
            Vec::new()
        }
    }
}

pub fn save_queue(path: &Path, items: &[QueueItem]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(items)?)?;
    Ok(())
}

/// Publish queued entries in order, honoring caps and cooldowns. Returns
/// the run report; the queue file is rewritten without fully-published
/// entries unless this is a dry run.
pub async fn run_queue(
    config: &Config,
    publishers: &[Box<dyn Publisher>],
    dry_run: bool,
    state: &mut CrossPostState,
    path: &Path,
) -> RunReport {
    let mut report = RunReport {
        dry_run,
        ..Default::default()
    };
    let now = chrono::Utc::now().timestamp();
    state.daily_counts.roll(&DailyCounts::today());

    let items = load_queue(path);
    report.scanned = items.len();
    info!("processing {} queued entries", items.len());

    let mut cooled_off: HashSet<Platform> = HashSet::new();
    let mut last_publish: HashMap<Platform, i64> = Platform::all()
        .iter()
        .filter_map(|p| state.last_publish_at(*p).map(|t| (*p, t)))
        .collect();

    let mut remaining: Vec<QueueItem> = Vec::new();
    for (index, mut item) in items.into_iter().enumerate() {
        let label = item
            .title
            .clone()
            .unwrap_or_else(|| format!("queue item {}", index + 1));
        let stripped = formatter::strip_content(&item.text);
        let mut published: Vec<Platform> = Vec::new();

        for platform in item.platforms.clone() {
            let policy = config.policy(platform);
            if state.daily_counts.count(platform) >= policy.daily_cap {
                continue;
            }
            if cooled_off.contains(&platform) {
                continue;
            }
            if let Some(last) = last_publish.get(&platform) {
                if now - last < policy.cooldown_secs {
                    info!("{} cooldown active, skipping queued entries", platform);
                    cooled_off.insert(platform);
                    continue;
                }
            }

            // Pre-authored content carries no source attribution
            let options = FormatOptions::default();
            let post = match platform {
                Platform::Twitter => formatter::format_for_twitter(&stripped, &options),
                Platform::Linkedin => formatter::format_for_linkedin(&stripped, None, &options),
            };

            if dry_run {
                report.posted.push(ActionLine {
                    id: label.clone(),
                    platform,
                    detail: "dry run".to_string(),
                });
                continue;
            }

            let Some(publisher) = publishers.iter().find(|p| p.platform() == platform) else {
                continue;
            };
            match publisher.publish(&post, PublishContext::default()).await {
                Ok(outcome) => {
                    info!("posted {} to {} as {}", label, platform, outcome.post_id);
                    state.daily_counts.increment(platform);
                    last_publish.insert(platform, now);
                    published.push(platform);
                    report.posted.push(ActionLine {
                        id: label.clone(),
                        platform,
                        detail: outcome.url.unwrap_or(outcome.post_id),
                    });
                }
                Err(e) => {
                    error!("publish to {} failed for {}: {}", platform, label, e);
                    report.errors.push(format!("{} {}: {}", label, platform, e));
                }
            }
        }

        item.platforms.retain(|p| !published.contains(p));
        if !item.platforms.is_empty() {
            remaining.push(item);
        }
    }

    if !dry_run {
        if let Err(e) = save_queue(path, &remaining) {
            error!("failed to rewrite queue file: {:#}", e);
            report.errors.push(format!("queue file: {:#}", e));
        }
    }

    report
}
