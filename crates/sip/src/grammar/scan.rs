//! Small scanning helpers shared by the value parsers.

/// Splits a header value at top-level commas.
///
/// Commas inside double quotes (with backslash escapes) and inside angle
/// brackets don't split. Empty items are dropped.
pub(crate) fn split_comma_list(raw: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut escaped = false;

    for (index, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                push_trimmed(&mut items, &raw[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    push_trimmed(&mut items, &raw[start..]);
    items
}

fn push_trimmed<'a>(items: &mut Vec<&'a str>, item: &'a str) {
    let item = item.trim();
    if !item.is_empty() {
        items.push(item);
    }
}

/// Byte index of the first `target` outside double quotes.
pub(crate) fn find_unquoted(raw: &str, target: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (index, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == target && !in_quotes => return Some(index),
            _ => {}
        }
    }
    None
}

/// True for RFC 3261 `token` characters.
pub(crate) fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || "-.!%*_+`'~".contains(ch)
}

pub(crate) fn is_token(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(is_token_char)
}
