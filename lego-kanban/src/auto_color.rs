//! Deterministic default colors for columns.
//!
//! A column configured without an explicit color gets one derived from its
//! title, so the same board renders the same way on every client.

/// Column palette (6-char hex without `#`), ordered roughly along a workflow:
/// neutral backlog tones first, warm in-progress tones, cool done tones.
const PALETTE: &[&str] = &[
    "6a737d", // slate
    "959da5", // grey
    "0366d6", // blue
    "1d76db", // azure
    "5319e7", // purple
    "d876e3", // pink
    "e36209", // orange
    "f9c513", // yellow
    "d73a4a", // red
    "0e8a16", // green
    "28a745", // light green
    "006b75", // teal
];

/// Return the default color for a column title.
///
/// Titles are compared case-insensitively and without surrounding whitespace,
/// so `"Done"` and `" done "` share a color.
pub fn auto_color(title: &str) -> &'static str {
    let normalized = title.trim().to_lowercase();
    let idx = (fnv1a(&normalized) as usize) % PALETTE.len();
    PALETTE[idx]
}

/// FNV-1a hash (32-bit)
fn fnv1a(s: &str) -> u32 {
    s.bytes().fold(0x811c_9dc5, |hash: u32, byte| {
        (hash ^ byte as u32).wrapping_mul(0x0100_0193)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_color_deterministic() {
        assert_eq!(auto_color("In Review"), auto_color("In Review"));
    }

    #[test]
    fn test_auto_color_normalizes_title() {
        assert_eq!(auto_color("Done"), auto_color("  done "));
    }

    #[test]
    fn test_auto_color_is_palette_hex() {
        for title in ["To Do", "Doing", "Done", "Blocked", "QA"] {
            let color = auto_color(title);
            assert!(PALETTE.contains(&color));
            assert_eq!(color.len(), 6);
            assert!(color.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
