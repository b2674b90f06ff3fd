//! Pattern-based patching of the tweet display page.
//!
//! The page is plain HTML with two delimited regions: the tweet text block
//! and the relative-timestamp span. There is no templating engine; we locate
//! each region by its fixed markup shape and swap the inner content. The
//! tweet block must match exactly once or the whole publish fails; a missing
//! timestamp span is skipped silently. That asymmetry is load-bearing for
//! callers and covered by tests.

use crate::target::PublishError;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

fn tweet_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)(<p class="tweet-text">)(.*?)(</p>)"#).expect("tweet block pattern")
    })
}

fn time_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)(<span class="tweet-time">)(.*?)(</span>)"#).expect("time span pattern")
    })
}

/// Escape the five reserved HTML characters.
///
/// Ampersand goes first so entities introduced by the later substitutions are
/// not escaped again.
pub fn escape_markup(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Replace the inner content of the single tweet-text block with `escaped`.
///
/// `escaped` must already be entity-escaped. Everything outside the block is
/// left byte-identical. Errors unless the block occurs exactly once.
pub fn patch_tweet_block(html: &str, escaped: &str) -> Result<String, PublishError> {
    let re = tweet_block_re();
    let count = re.find_iter(html).count();
    if count != 1 {
        tracing::warn!(count, "tweet text block did not match exactly once");
        return Err(PublishError::PatchTargetNotFound("tweet text block"));
    }
    Ok(re
        .replace(html, |caps: &regex::Captures| {
            format!("{}{}{}", &caps[1], escaped, &caps[3])
        })
        .into_owned())
}

/// Replace the timestamp span with `· {label}`.
///
/// Unlike [`patch_tweet_block`] a page without the span is returned
/// unchanged; the tweet text update still goes out.
pub fn patch_timestamp_block(html: &str, label: &str) -> String {
    let re = time_span_re();
    if re.find_iter(html).count() != 1 {
        tracing::debug!("timestamp span not found, leaving page as-is");
        return html.to_string();
    }
    re.replace(html, |caps: &regex::Captures| {
        format!("{}· {}{}", &caps[1], label, &caps[3])
    })
    .into_owned()
}

/// Bucket elapsed time into a short display label.
///
/// Integer-floor division at each threshold: under a minute is `now`, under
/// an hour `{n}m`, under a day `{n}h`, otherwise `{n}d`. Approximate and
/// monotonic, not locale-aware.
pub fn relative_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = now.signed_duration_since(timestamp).num_seconds().max(0) / 60;
    if minutes < 1 {
        "now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m")
    } else if minutes < 1440 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}d", minutes / 1440)
    }
}

/// Derive the age label for a record timestamp.
///
/// A missing timestamp means the update is happening right now. A present
/// but unparseable one returns `None`, which callers treat like a missing
/// span: skip the timestamp patch, keep the text update.
pub fn age_label(timestamp: Option<&str>, now: DateTime<Utc>) -> Option<String> {
    match timestamp {
        None => Some("now".to_string()),
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(relative_age(ts.with_timezone(&Utc), now)),
            Err(e) => {
                tracing::warn!(timestamp = raw, error = %e, "unparseable timestamp, skipping age patch");
                None
            }
        },
    }
}
