//! Per-platform text formatting
//!
//! The strip routine is shared with the classifier's length check: both need
//! the body with cross-platform artifacts (image URLs, `nostr:` references,
//! a previously appended attribution footer) removed.

use regex::Regex;
use std::sync::LazyLock;

use crate::constants::*;
use crate::models::{ArticleMeta, FormattedPost};

static IMAGE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\S+\.(?:png|jpe?g|gif|webp)(?:\?\S*)?").unwrap()
});
static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static NOSTR_REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"nostr:[a-z0-9]+").unwrap());
static FOOTER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^🔗 .*$").unwrap());
static MULTI_NEWLINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static MULTI_SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Keyword triggers for trailing hashtags, per platform
const TWITTER_HASHTAGS: &[(&str, &str)] = &[
    ("bitcoin", "#Bitcoin"),
    ("nostr", "#Nostr"),
    ("lightning", "#Lightning"),
    ("privacy", "#Privacy"),
    ("open source", "#OpenSource"),
    ("self-custody", "#SelfCustody"),
];
const LINKEDIN_HASHTAGS: &[(&str, &str)] = &[
    ("bitcoin", "#Bitcoin"),
    ("fintech", "#Fintech"),
    ("payments", "#Payments"),
    ("identity", "#DigitalIdentity"),
    ("innovation", "#Innovation"),
    ("infrastructure", "#Infrastructure"),
];

/// Reserve for the ` (i/N)` position indicator on thread segments
const THREAD_INDICATOR_RESERVE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedContent {
    pub text: String,
    pub media: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FormatOptions {
    /// Source-attribution footer, rendered as the last line
    pub footer: Option<String>,
}

/// Remove cross-platform artifact syntax from a note body. Image URLs are
/// captured into `media` rather than discarded.
pub fn strip_content(body: &str) -> StrippedContent {
    let media = IMAGE_URL_RE
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect();

    let text = IMAGE_URL_RE.replace_all(body, "");
    let text = NOSTR_REF_RE.replace_all(&text, "");
    let text = FOOTER_RE.replace_all(&text, "");
    let text = MULTI_NEWLINE_RE.replace_all(&text, "\n\n");
    let text = MULTI_SPACE_RE.replace_all(&text, " ");

    StrippedContent {
        text: text.trim().to_string(),
        media,
    }
}

/// Effective character count on X, where every link occupies a fixed-width
/// t.co token regardless of its true length.
pub fn twitter_len(text: &str) -> usize {
    let mut len = 0;
    let mut last = 0;
    for m in URL_RE.find_iter(text) {
        len += text[last..m.start()].chars().count() + TWITTER_LINK_LEN;
        last = m.end();
    }
    len + text[last..].chars().count()
}

/// Byte index where the effective budget runs out. Never lands inside a
/// URL: a link that does not fit whole is pushed past the cut.
fn cut_index(text: &str, budget: usize) -> usize {
    let mut eff = 0;
    let mut pos = 0;
    let mut urls = URL_RE.find_iter(text).peekable();

    while pos < text.len() {
        if let Some(m) = urls.peek() {
            if m.start() == pos {
                if eff + TWITTER_LINK_LEN > budget {
                    return pos;
                }
                eff += TWITTER_LINK_LEN;
                pos = m.end();
                urls.next();
                continue;
            }
        }
        if eff + 1 > budget {
            return pos;
        }
        eff += 1;
        pos += text[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
    }
    text.len()
}

/// Last sentence-ending period within the window, returned as a cut that
/// keeps the period on the left side.
fn rfind_sentence_end(window: &str) -> Option<usize> {
    for (idx, ch) in window.char_indices().rev() {
        if ch != '.' || idx == 0 {
            continue;
        }
        let after = &window[idx + 1..];
        if after.is_empty() || after.starts_with(char::is_whitespace) {
            return Some(idx + 1);
        }
    }
    None
}

/// Pick a split point for one thread chunk: last paragraph break past half
/// the budget, else last sentence end, else last whitespace, else hard cut.
fn split_point(text: &str, budget: usize) -> usize {
    let limit = cut_index(text, budget);
    if limit >= text.len() {
        return text.len();
    }
    let window = &text[..limit];

    if let Some(idx) = window.rfind("\n\n") {
        if idx >= limit / 2 {
            return idx;
        }
    }
    if let Some(idx) = rfind_sentence_end(window) {
        return idx;
    }
    if let Some(idx) = window.rfind(char::is_whitespace) {
        if idx > 0 {
            return idx;
        }
    }
    limit.max(1)
}

fn compose(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render a note for X: one segment when everything fits, otherwise a
/// reply-chain thread with ` (i/N)` indicators and the footer on the final
/// segment only.
pub fn format_for_twitter(stripped: &StrippedContent, opts: &FormatOptions) -> FormattedPost {
    let text = stripped.text.as_str();
    let footer = opts.footer.as_deref().unwrap_or("");

    // Hashtags are best-effort: dropped before they push a single segment
    // over the ceiling or into threading
    let tags = pick_hashtags(text, TWITTER_HASHTAGS).unwrap_or_default();

    let with_tags = compose(&[text, tags.as_str(), footer]);
    if twitter_len(&with_tags) <= TWITTER_CHAR_LIMIT {
        return FormattedPost {
            segments: vec![with_tags],
            media: stripped.media.clone(),
        };
    }
    let without_tags = compose(&[text, footer]);
    if twitter_len(&without_tags) <= TWITTER_CHAR_LIMIT {
        return FormattedPost {
            segments: vec![without_tags],
            media: stripped.media.clone(),
        };
    }

    // Thread. Each chunk reserves room for its position indicator; the
    // final chunk must also fit the footer.
    let budget = TWITTER_CHAR_LIMIT - THREAD_INDICATOR_RESERVE;
    let footer_len = if footer.is_empty() {
        0
    } else {
        twitter_len(footer) + 2
    };

    let mut chunks: Vec<String> = Vec::new();
    let mut rest = text.to_string();
    loop {
        if twitter_len(&rest) + footer_len <= budget {
            chunks.push(rest);
            break;
        }
        let cut = split_point(&rest, budget);
        let head = rest[..cut].trim_end().to_string();
        let tail = rest[cut..].trim_start().to_string();
        chunks.push(head);
        if tail.is_empty() {
            break;
        }
        rest = tail;
    }

    let total = chunks.len();
    let segments = chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let numbered = format!("{} ({}/{})", chunk, i + 1, total);
            if i + 1 == total && !footer.is_empty() {
                format!("{}\n\n{}", numbered, footer)
            } else {
                numbered
            }
        })
        .collect();

    FormattedPost {
        segments,
        media: stripped.media.clone(),
    }
}

/// Render a note for LinkedIn: single segment, word-boundary truncation
/// after reserving room for the title line, hashtags and footer.
pub fn format_for_linkedin(
    stripped: &StrippedContent,
    article: Option<&ArticleMeta>,
    opts: &FormatOptions,
) -> FormattedPost {
    let title = article
        .and_then(|a| a.title.as_deref())
        .unwrap_or_default();
    let tags = pick_hashtags(&stripped.text, LINKEDIN_HASHTAGS).unwrap_or_default();
    let footer = opts.footer.as_deref().unwrap_or("");

    let reserve = [title, tags.as_str(), footer]
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.chars().count() + 2)
        .sum::<usize>();
    let budget = LINKEDIN_CHAR_LIMIT.saturating_sub(reserve);

    let body = truncate_words(&stripped.text, budget);
    let segment = compose(&[title, body.as_str(), tags.as_str(), footer]);

    FormattedPost {
        segments: vec![segment],
        media: stripped.media.clone(),
    }
}

/// Truncate at a word boundary with a trailing ellipsis
fn truncate_words(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let prefix: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    let cut = prefix
        .rfind(char::is_whitespace)
        .filter(|idx| *idx > 0)
        .unwrap_or(prefix.len());
    format!("{}…", prefix[..cut].trim_end())
}

/// Up to `MAX_HASHTAGS` distinct tags triggered by keywords in the text,
/// joined as one trailing line
fn pick_hashtags(text: &str, map: &[(&str, &str)]) -> Option<String> {
    let lower = text.to_lowercase();
    let mut tags: Vec<&str> = Vec::new();
    for &(keyword, tag) in map {
        if tags.len() == MAX_HASHTAGS {
            break;
        }
        if lower.contains(keyword) && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    (!tags.is_empty()).then(|| tags.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_captures_media_and_refs() {
        let stripped = strip_content(
            "Check this out\n\n\n\nmore  text nostr:npub1xyz here https://cdn.example.com/pic.png",
        );
        assert_eq!(stripped.media, vec!["https://cdn.example.com/pic.png"]);
        assert_eq!(stripped.text, "Check this out\n\nmore text here");
    }

    #[test]
    fn test_strip_removes_attribution_footer() {
        let stripped = strip_content("Real content here\n\n🔗 https://njump.me/nevent1abc");
        assert_eq!(stripped.text, "Real content here");
    }

    #[test]
    fn test_twitter_len_counts_links_fixed() {
        let text = "read https://example.com/a/very/long/path/that/goes/on/forever ok";
        // "read " + 23 + " ok"
        assert_eq!(twitter_len(text), 5 + TWITTER_LINK_LEN + 3);
    }

    #[test]
    fn test_short_body_is_single_segment() {
        let stripped = strip_content("A short thought about relays.");
        let post = format_for_twitter(&stripped, &FormatOptions::default());
        assert_eq!(post.segments.len(), 1);
        assert!(!post.segments[0].contains("(1/"));
    }

    #[test]
    fn test_hard_cut_produces_two_segments_with_footer_on_last() {
        let body = "x".repeat(281);
        let stripped = strip_content(&body);
        let opts = FormatOptions {
            footer: Some("🔗 https://njump.me/nevent1abc".to_string()),
        };
        let post = format_for_twitter(&stripped, &opts);

        assert_eq!(post.segments.len(), 2);
        assert!(post.segments[0].ends_with("(1/2)"));
        assert!(!post.segments[0].contains("🔗"));
        assert!(post.segments[1].contains("(2/2)"));
        assert!(post.segments[1].contains("🔗"));
        for segment in &post.segments {
            assert!(twitter_len(segment) <= TWITTER_CHAR_LIMIT);
        }
    }

    #[test]
    fn test_thread_round_trip() {
        let paragraphs: Vec<String> = (0..8)
            .map(|i| format!("Paragraph {} talks about relay economics in moderate depth.", i))
            .collect();
        let body = paragraphs.join("\n\n");
        let stripped = strip_content(&body);
        let opts = FormatOptions {
            footer: Some("🔗 https://njump.me/nevent1abc".to_string()),
        };
        let post = format_for_twitter(&stripped, &opts);
        assert!(post.segments.len() > 1);

        let indicator = Regex::new(r" \(\d+/\d+\)").unwrap();
        let reconstructed = post
            .segments
            .iter()
            .map(|s| {
                let without_footer = s.split("\n\n🔗 ").next().unwrap_or(s);
                indicator.replace_all(without_footer, "").into_owned()
            })
            .collect::<Vec<_>>()
            .join(" ");

        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(normalize(&reconstructed), normalize(&stripped.text));
    }

    #[test]
    fn test_thread_prefers_paragraph_breaks() {
        let body = format!("{}\n\n{}", "a".repeat(200), "b".repeat(200));
        let stripped = strip_content(&body);
        let post = format_for_twitter(&stripped, &FormatOptions::default());
        assert_eq!(post.segments.len(), 2);
        assert!(post.segments[0].starts_with(&"a".repeat(200)));
        assert!(post.segments[1].starts_with(&"b".repeat(200)));
    }

    #[test]
    fn test_hashtags_appended_when_they_fit() {
        let stripped = strip_content("Running my own nostr relay taught me a lot about bitcoin.");
        let post = format_for_twitter(&stripped, &FormatOptions::default());
        assert_eq!(post.segments.len(), 1);
        assert!(post.segments[0].contains("#Bitcoin #Nostr"));
    }

    #[test]
    fn test_hashtags_never_force_threading() {
        // Fits alone, would not fit with a hashtag line
        let body = format!("bitcoin {}", "y".repeat(TWITTER_CHAR_LIMIT - 10));
        let stripped = strip_content(&body);
        let post = format_for_twitter(&stripped, &FormatOptions::default());
        assert_eq!(post.segments.len(), 1);
        assert!(!post.segments[0].contains("#Bitcoin"));
    }

    #[test]
    fn test_linkedin_truncates_at_word_boundary() {
        let body = "word ".repeat(800);
        let stripped = strip_content(&body);
        let post = format_for_linkedin(&stripped, None, &FormatOptions::default());
        assert_eq!(post.segments.len(), 1);
        let segment = &post.segments[0];
        assert!(segment.chars().count() <= LINKEDIN_CHAR_LIMIT);
        assert!(segment.ends_with('…'));
        assert!(!segment.contains("wor…"));
    }

    #[test]
    fn test_linkedin_article_title_leads() {
        let article = ArticleMeta {
            title: Some("Payments at the Edge".to_string()),
            ..Default::default()
        };
        let stripped = strip_content("A long-form look at payments infrastructure.");
        let post = format_for_linkedin(&stripped, Some(&article), &FormatOptions::default());
        assert!(post.segments[0].starts_with("Payments at the Edge\n\n"));
    }
}
