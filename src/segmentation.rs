//! # Line Segmentation Module
//!
//! Splits extracted screenshot text into utterance lines. Sentence-terminal
//! characters end a line and stay attached to it as a suffix; newlines also end
//! a line. Segments are trimmed and blank ones dropped. Order and duplicates
//! are preserved.

/// Terminal characters used when none are configured: full-width period,
/// full-width and half-width question marks.
pub const DEFAULT_TERMINALS: &[char] = &['。', '？', '?'];

/// Line Segmenter
#[derive(Debug, Clone, PartialEq)]
pub struct LineSegmenter {
    terminals: Vec<char>,
}

impl Default for LineSegmenter {
    fn default() -> Self {
        Self {
            terminals: DEFAULT_TERMINALS.to_vec(),
        }
    }
}

impl LineSegmenter {
    /// Segmenter with a custom terminal set
    ///
    /// Whitespace characters are ignored here; line breaks always split.
    pub fn with_terminals(terminals: impl IntoIterator<Item = char>) -> Self {
        let mut unique: Vec<char> = Vec::new();
        for c in terminals {
            if !c.is_whitespace() && !unique.contains(&c) {
                unique.push(c);
            }
        }
        Self { terminals: unique }
    }

    pub fn terminals(&self) -> &[char] {
        &self.terminals
    }

    /// Split `text` into non-empty trimmed lines
    ///
    /// ```rust
    /// use reaction_finder::segmentation::LineSegmenter;
    ///
    /// let lines = LineSegmenter::default().segment("你好。在嗎？ 晚點聊\n好");
    /// assert_eq!(lines, vec!["你好。", "在嗎？", "晚點聊", "好"]);
    /// ```
    pub fn segment(&self, text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();

        for c in text.chars() {
            if c == '\n' || c == '\r' {
                push_trimmed(&mut lines, &current);
                current.clear();
            } else if self.terminals.contains(&c) {
                current.push(c);
                push_trimmed(&mut lines, &current);
                current.clear();
            } else {
                current.push(c);
            }
        }
        push_trimmed(&mut lines, &current);

        lines
    }
}

fn push_trimmed(lines: &mut Vec<String>, segment: &str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() {
        lines.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_yields_no_lines() {
        let segmenter = LineSegmenter::default();
        assert!(segmenter.segment("").is_empty());
        assert!(segmenter.segment("   \n\n  ").is_empty());
        assert!(segmenter.segment("。？?").iter().all(|l| !l.trim().is_empty()));
    }

    #[test]
    fn test_terminal_kept_as_suffix() {
        let lines = LineSegmenter::default().segment("Really? Yes.");
        assert_eq!(lines, vec!["Really?", "Yes."]);
    }

    #[test]
    fn test_full_width_punctuation() {
        let lines = LineSegmenter::default().segment("我好生氣。你呢？我不知道");
        assert_eq!(lines, vec!["我好生氣。", "你呢？", "我不知道"]);
    }

    #[test]
    fn test_duplicates_and_order_preserved() {
        let lines = LineSegmenter::default().segment("好。好。不好。");
        assert_eq!(lines, vec!["好。", "好。", "不好。"]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let lines = LineSegmenter::default().segment("第一行\r\n\r\n  第二行  \n");
        assert_eq!(lines, vec!["第一行", "第二行"]);
    }

    #[test]
    fn test_custom_terminals() {
        let segmenter = LineSegmenter::with_terminals(['!', '!', ' ']);
        assert_eq!(segmenter.terminals(), &['!']);
        assert_eq!(segmenter.segment("wow! ok? fine"), vec!["wow!", "ok? fine"]);
    }

    #[test]
    fn test_no_line_is_blank() {
        let samples = [
            "a。 。 b",
            "??？？",
            "\u{3000}。",
            "  x  \n\t\n y ",
            "I'm so angry right now.",
        ];
        let segmenter = LineSegmenter::default();
        for sample in samples {
            for line in segmenter.segment(sample) {
                assert!(!line.trim().is_empty(), "blank line from {sample:?}");
                assert_eq!(line, line.trim());
            }
        }
    }
}
