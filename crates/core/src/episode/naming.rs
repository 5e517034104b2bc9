//! File naming helpers.

/// Default mask for final episode file names.
pub const DEFAULT_FILE_MASK: &str = "{prefix} - {title}";

/// Characters that are not allowed in file names on at least one platform.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters that cannot appear in a file name.
///
/// Control characters and reserved punctuation become `_`; trailing dots
/// and spaces are trimmed since Windows drops them silently.
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c.is_control() || FORBIDDEN.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim().trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Renders a file mask, substituting `{prefix}` and `{title}`.
pub fn render_mask(mask: &str, prefix: &str, title: &str) -> String {
    mask.replace("{prefix}", prefix).replace("{title}", title)
}
