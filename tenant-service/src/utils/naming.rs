/// Canonical registry key for an organization: trimmed, every character
/// outside `[A-Za-z0-9_]` replaced by `_`, lowercased.
///
/// Returns `None` when nothing remains after trimming.
pub fn normalize_org_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    Some(
        trimmed
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect(),
    )
}
