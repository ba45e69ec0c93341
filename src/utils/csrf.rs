/// Extracts the `content` of `<meta name="csrf-token">` from an HTML document.
pub fn csrf_token_from_html(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let mut offset = 0;

    while let Some(start) = lower[offset..].find("<meta") {
        let tag_start = offset + start;
        let tag_end = lower[tag_start..].find('>').map(|end| tag_start + end)?;
        let tag = &html[tag_start + "<meta".len()..tag_end];

        if attribute(tag, "name").is_some_and(|name| name.eq_ignore_ascii_case("csrf-token")) {
            return attribute(tag, "content").filter(|token| !token.is_empty());
        }
        offset = tag_end;
    }

    None
}

/// Value of the `name` attribute inside a tag body.
fn attribute(tag: &str, name: &str) -> Option<String> {
    attributes(tag)
        .into_iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.to_string())
}

/// Splits a tag body into `(key, value)` pairs, in order.
///
/// Values may be double-quoted, single-quoted or bare. A key without `=` gets
/// an empty value. Text inside quotes is never read as a key.
fn attributes(tag: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    let mut rest = tag;

    loop {
        rest = rest.trim_start_matches(|c: char| c.is_ascii_whitespace() || c == '/');
        if rest.is_empty() {
            break;
        }

        let key_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = rest[key_end..].trim_start();

        let Some(after_eq) = rest.strip_prefix('=') else {
            if !key.is_empty() {
                pairs.push((key, ""));
            }
            continue;
        };
        let after_eq = after_eq.trim_start();

        let (value, remainder) = match after_eq.chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let body = &after_eq[1..];
                match body.find(quote) {
                    Some(end) => (&body[..end], &body[end + 1..]),
                    None => (body, ""),
                }
            }
            _ => {
                let end = after_eq
                    .find(|c: char| c.is_ascii_whitespace())
                    .unwrap_or(after_eq.len());
                (&after_eq[..end], &after_eq[end..])
            }
        };
        if !key.is_empty() {
            pairs.push((key, value));
        }
        rest = remainder;
    }

    pairs
}
