use once_cell::sync::Lazy;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde_json::Value;
use url::Url;

pub const UNKNOWN_SUBJECT: &str = "unknown";
pub const UNRESOLVED_SUBJECT: &str = "unknown_filtered";

static TARGET_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[?&]target=([^&]+)").expect("valid target regex"));

/// Picks the storage bucket for an accepted exchange.
///
/// A caller-supplied subject wins unless it is empty or [`UNKNOWN_SUBJECT`].
pub fn resolve_subject(supplied: Option<&str>, url: &str, request: &Value) -> String {
    match supplied {
        Some(subject) if !subject.is_empty() && subject != UNKNOWN_SUBJECT => subject.to_string(),
        _ => extract_subject(Some(url), request).unwrap_or_else(|| UNRESOLVED_SUBJECT.to_string()),
    }
}

/// Resolution order: `target=` in the URL, a domain-like `q` parameter,
/// then `searchItem` in the request parameters (first hit in a batch).
pub fn extract_subject(url: Option<&str>, request: &Value) -> Option<String> {
    if let Some(found) = url.filter(|u| !u.is_empty()).and_then(subject_from_url) {
        return Some(found);
    }

    match request {
        Value::Array(items) => items.iter().find_map(|item| extract_subject(None, item)),
        Value::Object(_) => search_item(request),
        _ => None,
    }
}

fn subject_from_url(url: &str) -> Option<String> {
    if let Some(raw) = TARGET_PARAM.captures(url).and_then(|c| c.get(1)) {
        // An undecodable target abandons URL-based resolution entirely.
        return percent_decode_str(raw.as_str())
            .decode_utf8()
            .ok()
            .map(|decoded| decoded.into_owned());
    }

    let parsed = if url.starts_with("http") {
        Url::parse(url)
    } else {
        Url::parse(&format!("http://dummy.com{url}"))
    }
    .ok()?;

    parsed
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
        .filter(|q| q.contains('.'))
}

fn search_item(request: &Value) -> Option<String> {
    let params = request.get("params")?;
    [
        params.get("args").and_then(|args| args.get("searchItem")),
        params.get("searchItem"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_str)
    .find(|item| !item.is_empty())
    .map(str::to_string)
}
