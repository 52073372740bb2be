//! Commodity name matching.
//!
//! Upstream names are inconsistent ("Tomato", "Tomatoes", "Onion (Big)").
//! Two names match when, after normalization, the shorter one occurs in the
//! longer one and that occurrence reaches into the longer name's last word.
//! The last word is the head noun, so "Chilli" matches "Green Chilli" but
//! "Onion" does not match "Onion Seed".

/// Lowercases, drops parenthesised qualifiers, collapses whitespace and strips
/// a single trailing plural `s`.
pub fn normalize_name(name: &str) -> String {
    let mut without_qualifiers = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => without_qualifiers.push(c),
            _ => {}
        }
    }

    let mut normalized = without_qualifiers
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if normalized.len() > 1 && normalized.ends_with('s') {
        normalized.pop();
    }
    normalized
}

pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize_name(a);
    let b = normalize_name(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }

    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let Some(position) = long.rfind(short.as_str()) else {
        return false;
    };

    let head_start = long.rfind(' ').map(|i| i + 1).unwrap_or(0);
    position + short.len() > head_start
}
