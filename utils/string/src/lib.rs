//! Small string helpers shared by the workspace crates.

/// Truncate a `&str` to a byte budget at a char boundary, keeping the prefix.
#[inline]
pub fn take_bytes_at_char_boundary(s: &str, maxb: usize) -> &str {
    if s.len() <= maxb {
        return s;
    }
    let mut last_ok = 0;
    for (i, ch) in s.char_indices() {
        let nb = i + ch.len_utf8();
        if nb > maxb {
            break;
        }
        last_ok = nb;
    }
    &s[..last_ok]
}

/// Limit `s` to `max_chars` characters. Overlong input keeps its head and ends
/// with `...`, so the result never exceeds `max_chars`.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    const ELLIPSIS: &str = "...";
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Reduce a file name (or any label) to a lookup key: lowercase ASCII
/// alphanumerics only.
pub fn sanitize_key(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Remove Markdown code fences (```` ``` ````) and trim the result.
pub fn strip_code_fence(s: &str) -> String {
    s.replace("```", "").trim().to_string()
}
