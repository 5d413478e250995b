use serde::Serialize;
use tracing::debug;

use crate::dom::document::Document;

// ============================================================================
// Indicator tables
// ============================================================================

/// Bot-protection interstitial markers. Case-sensitive, only consulted when
/// the page answered 403 or 503.
pub const BOT_PROTECTION_FLAGS: [&str; 11] = [
    "403 Forbidden",
    "cloudflare",
    "Security check",
    "Please Wait... | Cloudflare",
    "We are checking your browser...",
    "Checking your browser before accessing",
    "This process is automatic.",
    "DDoS protection by",
    "Ray ID:",
    "_cf_chl",
    "cf-spinner-please-wait",
];

pub const CAPTCHA_INDICATORS: [&str; 11] = [
    "captcha",
    "g-recaptcha",
    "h-captcha",
    "hcaptcha",
    "cf-turnstile",
    "recaptcha",
    "verify you are human",
    "prove you are human",
    "human verification",
    "bot detection",
    "security challenge",
];

pub const RATE_LIMIT_INDICATORS: [&str; 5] = [
    "rate limit",
    "too many requests",
    "slow down",
    "try again later",
    "request limit exceeded",
];

// ============================================================================
// Verdict
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    BotProtection { matched: Vec<String> },
    Captcha,
    RateLimited,
    HttpError { status: u16 },
}

impl std::fmt::Display for BlockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockReason::BotProtection { .. } => write!(f, "bot protection interstitial detected"),
            BlockReason::Captcha => write!(f, "CAPTCHA challenge detected"),
            BlockReason::RateLimited => write!(f, "rate limiting detected"),
            BlockReason::HttpError { status } => write!(f, "HTTP error: {}", status),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Accessibility {
    Accessible,
    Blocked { reason: BlockReason },
}

impl Accessibility {
    pub fn is_accessible(&self) -> bool {
        matches!(self, Accessibility::Accessible)
    }
}

/// Decide whether the page shows real content or a blocking interstitial.
/// Checks run in order: bot protection, CAPTCHA, rate limiting, HTTP status.
pub fn check_accessibility(doc: &Document) -> Accessibility {
    let haystack = page_haystack(doc);
    let lower = haystack.to_lowercase();
    let status = doc.status;

    let verdict = if let Some(matched) = bot_protection_flags(status, &haystack) {
        Accessibility::Blocked {
            reason: BlockReason::BotProtection { matched },
        }
    } else if CAPTCHA_INDICATORS.iter().any(|i| lower.contains(i)) {
        Accessibility::Blocked {
            reason: BlockReason::Captcha,
        }
    } else if status == Some(429) || RATE_LIMIT_INDICATORS.iter().any(|i| lower.contains(i)) {
        Accessibility::Blocked {
            reason: BlockReason::RateLimited,
        }
    } else if let Some(status) = status.filter(|s| *s >= 400) {
        Accessibility::Blocked {
            reason: BlockReason::HttpError { status },
        }
    } else {
        Accessibility::Accessible
    };

    debug!(?verdict, "page accessibility");
    verdict
}

fn bot_protection_flags(status: Option<u16>, haystack: &str) -> Option<Vec<String>> {
    if !matches!(status, Some(403) | Some(503)) {
        return None;
    }
    let matched: Vec<String> = BOT_PROTECTION_FLAGS
        .iter()
        .filter(|flag| haystack.contains(*flag))
        .map(|flag| flag.to_string())
        .collect();
    if matched.is_empty() { None } else { Some(matched) }
}

/// Title, text and attribute values of the whole page, newline separated.
/// Widgets such as reCAPTCHA announce themselves through class names, so
/// attributes are searched alongside visible text.
fn page_haystack(doc: &Document) -> String {
    let mut out = doc.title.clone();
    out.push('\n');
    out.push_str(&doc.text_content(doc.root()));

    for id in doc.elements() {
        if let Some(el) = doc.element(id) {
            for value in el.attrs.values() {
                out.push('\n');
                out.push_str(value);
            }
        }
    }
    out
}
