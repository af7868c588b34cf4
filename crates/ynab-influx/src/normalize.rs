use regex::{Captures, Regex};
use std::sync::LazyLock;

// A run of emoji: pictographs, flags and keycaps with their modifiers, optionally joined by ZWJ.
// Emoji separated only by whitespace form one run. A bare ZWJ or variation selector is left
// alone, some scripts use them outside emoji.
static EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    let unit = r"(?:[0-9#*]\x{FE0F}?\x{20E3}|[\p{Extended_Pictographic}\p{Regional_Indicator}\p{Emoji_Modifier}][\p{Emoji_Modifier}\x{FE0E}\x{FE0F}\x{20E3}\x{E0020}-\x{E007F}]*)";
    let sequence = format!(r"{unit}(?:\x{{200D}}{unit})*");
    Regex::new(&format!(r"(\s*){sequence}(?:\s*{sequence})*(\s*)")).unwrap()
});

/// Strip emoji from a name before it is used as a tag value.
///
/// Whitespace around a removed emoji collapses to a single space and the result is trimmed,
/// so `"Café 😀 Fund"` becomes `"Café Fund"`. Absent or empty input is returned unchanged.
pub fn remove_emojis(text: Option<&str>) -> Option<String> {
    let text = text?;
    if text.is_empty() {
        return Some(String::new());
    }

    let replaced = EMOJI.replace_all(text, |caps: &Captures| {
        let padded = caps.get(1).is_some_and(|m| !m.as_str().is_empty())
            || caps.get(2).is_some_and(|m| !m.as_str().is_empty());
        if padded { " " } else { "" }
    });
    Some(replaced.trim().to_owned())
}
