/// Longest name or description the board accepts.
pub const MAX_TEXT_LENGTH: usize = 16384;
pub const TRUNCATION_MARKER: &str = "... [truncated by gitthello]";

/// Shortens `text` to `MAX_TEXT_LENGTH` characters, ending with the marker.
pub fn truncate(text: &str) -> String {
    truncate_to(text, MAX_TEXT_LENGTH)
}

pub fn truncate_to(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let keep = max_length.saturating_sub(TRUNCATION_MARKER.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}
