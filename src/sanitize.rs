//! Markup stripping for string and nested structured input.
//!
//! Zero tags and zero attributes are allowed: tags are removed rather than
//! escaped-and-kept, and the contents of `script`/`style` elements are
//! dropped entirely. Input originates from deserialized request bodies, so
//! no cycle protection is needed.

use serde_json::Value;

/// Elements whose text content is unsafe and discarded along with the tags.
const DROP_CONTENT_TAGS: [&str; 2] = ["script", "style"];

/// Strip all markup tags and attributes from a string.
///
/// Plain text between tags is retained; `script`/`style` bodies are not.
/// Idempotent: output contains no parseable tags.
pub fn sanitize_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    loop {
        let Some(lt) = rest.find('<') else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..lt]);
        let after = &rest[lt + 1..];

        if !looks_like_tag(after) {
            // A bare '<' (comparison, arrow text) stays literal
            out.push('<');
            rest = after;
            continue;
        }

        let Some(gt) = after.find('>') else {
            // Unterminated tag: drop the remainder
            break;
        };
        let tag = &after[..gt];
        rest = &after[gt + 1..];

        if !tag.starts_with('/') {
            let name = tag_name(tag);
            if DROP_CONTENT_TAGS.contains(&name.as_str()) {
                rest = skip_element_content(rest, &name);
            }
        }
    }

    out
}

/// Sanitize deserialized request data recursively.
///
/// Mappings: every string-valued and mapping-valued entry is sanitized, and
/// list entries are handled per-element (string and mapping elements
/// sanitized, other element types pass through). Non-string, non-mapping,
/// non-list values pass through unchanged.
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(&s)),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, entry)| {
                    let entry = match entry {
                        Value::String(s) => Value::String(sanitize_str(&s)),
                        Value::Object(_) => sanitize_json(entry),
                        Value::Array(items) => Value::Array(
                            items
                                .into_iter()
                                .map(|item| match item {
                                    Value::String(s) => Value::String(sanitize_str(&s)),
                                    Value::Object(_) => sanitize_json(item),
                                    other => other,
                                })
                                .collect(),
                        ),
                        other => other,
                    };
                    (key, entry)
                })
                .collect(),
        ),
        other => other,
    }
}

fn looks_like_tag(after_lt: &str) -> bool {
    matches!(
        after_lt.chars().next(),
        Some(c) if c.is_ascii_alphabetic() || c == '/' || c == '!' || c == '?'
    )
}

fn tag_name(tag: &str) -> String {
    tag.chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Skip past the matching close tag, dropping everything in between.
/// With no close tag in sight the rest of the input is unsafe and dropped.
fn skip_element_content<'a>(rest: &'a str, name: &str) -> &'a str {
    let close = format!("</{name}");
    let Some(start) = find_ascii_case_insensitive(rest, &close) else {
        return "";
    };
    match rest[start..].find('>') {
        Some(gt) => &rest[start + gt + 1..],
        None => "",
    }
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&i| {
        haystack[i..i + needle.len()]
            .iter()
            .zip(needle)
            .all(|(h, n)| h.to_ascii_lowercase() == n.to_ascii_lowercase())
    })
}
