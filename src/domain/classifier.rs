//! Pattern classifier
//!
//! Deterministic, ordered rule evaluation over a raw note body. The rule
//! tables are data, not scattered conditionals, so the first-match-wins
//! policy stays auditable. Everything here is a pure function of the text.

use regex::Regex;
use std::sync::LazyLock;

use crate::constants::{LONG_CONTENT_PROMOTION_LEN, MIN_CONTENT_LENGTH};
use crate::domain::formatter::strip_content;
use crate::models::{Classification, Platform};

/// One skip rule: a predicate over the raw body and the stable reason
/// recorded when it fires.
struct SkipRule {
    reason: &'static str,
    hit: fn(&str) -> bool,
}

/// Absolute deny rules, evaluated before everything else. A body matching
/// any of these is never posted regardless of topic or engagement.
const BLOCKLIST_RULES: &[SkipRule] = &[
    SkipRule {
        reason: "blocklist: trading language",
        hit: trading_language,
    },
    SkipRule {
        reason: "blocklist: bot command",
        hit: bot_command,
    },
    SkipRule {
        reason: "blocklist: shouting",
        hit: shouting,
    },
    SkipRule {
        reason: "blocklist: direct reply",
        hit: direct_reply,
    },
    SkipRule {
        reason: "blocklist: image-only post",
        hit: image_only,
    },
    SkipRule {
        reason: "blocklist: low-substance slang",
        hit: low_substance_slang,
    },
];

const CASUAL_RULES: &[SkipRule] = &[
    SkipRule {
        reason: "casual/personal: greeting",
        hit: greeting,
    },
    SkipRule {
        reason: "casual/personal: family or personal life",
        hit: personal_life,
    },
    SkipRule {
        reason: "casual/personal: short informal reply",
        hit: informal_reply,
    },
];

static TRADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(price target|leverage|long position|short position|buy the dip|pump|dump|bull run|bear market|altcoins?|shitcoins?|100x|to the moon)\b",
    )
    .unwrap()
});
static BOT_COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[!/][a-zA-Z]").unwrap());
static SLANG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(wen|ser|ngmi|wagmi|lfg|hfsp|probably nothing|few understand)[\s!?.…🚀🔥]*$")
        .unwrap()
});
static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(gm|gn|good (morning|night|evening)|hello|hey|yo)[\s,!?.]*(everyone|all|frens?|friends|fam|world|nostr)?[\s!?.☀️🌙👋🫡]*$",
    )
    .unwrap()
});
static PERSONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(my (wife|husband|kids?|daughter|son|mom|dad|parents|family)|birthday|anniversary|date night)\b",
    )
    .unwrap()
});
static INFORMAL_REPLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(this|lol|lmao|haha+|nice|same|true|based|thanks?|thank you|congrats|welcome)[\s!?.]*$",
    )
    .unwrap()
});

/// Punchy/technical topics worth a post on X
static TWITTER_TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(bitcoin|btc|sats?|nostr|lightning|zaps?|relays?|self[- ]custody|seed phrase|private keys?|privacy|encryption|open[- ]source|decentrali[sz]ed?|censorship|permissionless|protocols?|freedom tech|sovereign\w*)\b",
    )
    .unwrap()
});

/// Professional/industry topics worth a post on LinkedIn
static LINKEDIN_TOPIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(fintech|payments?|banking|regulation|compliance|enterprise|institutional|adoption|infrastructure|digital identity|identity|innovation|strategy|markets?|treasury|monetary|sound money|economy)\b",
    )
    .unwrap()
});

static CASUAL_TONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(lol|lmao|rofl|imo|imho|tbh|ngl|btw|kinda|sorta|gonna|wanna|gotta|dunno)\b|😂|🤣|haha")
        .unwrap()
});

fn trading_language(body: &str) -> bool {
    TRADING_RE.is_match(body)
}

fn bot_command(body: &str) -> bool {
    BOT_COMMAND_RE.is_match(body.trim_start())
}

fn shouting(body: &str) -> bool {
    let trimmed = body.trim();
    if trimmed.chars().count() > 40 {
        return false;
    }
    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 3 && letters.iter().all(|c| c.is_uppercase())
}

fn direct_reply(body: &str) -> bool {
    body.trim_start().starts_with('@')
}

fn image_only(body: &str) -> bool {
    let stripped = strip_content(body);
    stripped.text.is_empty() && !stripped.media.is_empty()
}

fn low_substance_slang(body: &str) -> bool {
    SLANG_RE.is_match(body.trim())
}

fn greeting(body: &str) -> bool {
    GREETING_RE.is_match(body.trim())
}

fn personal_life(body: &str) -> bool {
    PERSONAL_RE.is_match(body)
}

fn informal_reply(body: &str) -> bool {
    INFORMAL_REPLY_RE.is_match(body.trim())
}

/// Classify a note body. Blocklist and casual/personal rules short-circuit;
/// the length check applies only to what survives them; topic and tone
/// never skip on their own except the zero-topic-matches case.
pub fn classify(body: &str) -> Classification {
    for rule in BLOCKLIST_RULES {
        if (rule.hit)(body) {
            return Classification::skip(rule.reason);
        }
    }
    for rule in CASUAL_RULES {
        if (rule.hit)(body) {
            return Classification::skip(rule.reason);
        }
    }

    let stripped = strip_content(body);
    let length = stripped.text.chars().count();
    if length < MIN_CONTENT_LENGTH {
        return Classification::skip(format!(
            "too short: {} chars (minimum {})",
            length, MIN_CONTENT_LENGTH
        ));
    }

    let twitter_hit = TWITTER_TOPIC_RE.is_match(&stripped.text);
    let linkedin_hit = LINKEDIN_TOPIC_RE.is_match(&stripped.text);

    let mut platforms = Vec::new();
    if twitter_hit {
        platforms.push(Platform::Twitter);
    }
    if linkedin_hit {
        platforms.push(Platform::Linkedin);
    }
    if platforms.is_empty() {
        return Classification::skip("off-topic");
    }

    // Substantial technical posts are worth showing the professional
    // audience even without an industry keyword
    if twitter_hit && !linkedin_hit && length >= LONG_CONTENT_PROMOTION_LEN {
        platforms.push(Platform::Linkedin);
    }

    let needs_manual_rewrite =
        platforms.contains(&Platform::Linkedin) && CASUAL_TONE_RE.is_match(&stripped.text);

    Classification::Eligible {
        platforms,
        needs_manual_rewrite,
    }
}
