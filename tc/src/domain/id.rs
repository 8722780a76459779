//! Identifier generation
//!
//! All IDs use the format: `{8-char-hex}-{kind}-{slug}`
//! Example: `5f3a9c1e-mod-change-hotel`

/// Maximum slug length kept in an ID
const MAX_SLUG_LEN: usize = 40;

/// Generate an ID from a kind and a human-readable title
pub fn generate_id(kind: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    // The leading hex of a v7 UUID is a millisecond timestamp; the tail is random.
    let suffix = &uuid[uuid.len() - 8..];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-{}", suffix, kind)
    } else {
        format!("{}-{}-{}", suffix, kind, slug)
    }
}

/// Slugify a title for use in IDs
fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.chars().count() <= MAX_SLUG_LEN {
        return slug;
    }
    let truncated: String = slug.chars().take(MAX_SLUG_LEN).collect();
    truncated.trim_end_matches('-').to_string()
}
