use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::str::FromStr;
use tracing::warn;

/// Parses header lines into a `HeaderMap`.
///
/// Accepts both bare `Name: value` lines and the `-H 'Name: value'` lines of
/// a "Copy as cURL" command. Everything else is ignored.
pub fn parse_header_lines(text: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for line in text.lines() {
        let Some(content) = header_content(line) else {
            continue;
        };

        let Some((key, value)) = content.split_once(':') else {
            continue;
        };

        let key = key.trim().to_lowercase();
        let value = value.trim();

        match (HeaderName::from_str(&key), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %key, "skipping invalid header line"),
        }
    }

    headers
}

fn header_content(line: &str) -> Option<&str> {
    let line = line.trim().trim_end_matches('\\').trim_end();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    for flag in ["-H ", "--header "] {
        if let Some(rest) = line.strip_prefix(flag) {
            let rest = rest.trim();
            let unquoted = rest
                .strip_prefix('\'')
                .and_then(|r| r.strip_suffix('\''))
                .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')))
                .unwrap_or(rest);
            return Some(unquoted);
        }
    }

    if line.starts_with('-') || line.starts_with("curl ") {
        return None;
    }
    Some(line)
}
