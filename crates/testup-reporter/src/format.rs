//! Text helpers shared by the reporters

/// Wrap `text` to `width` characters.
///
/// Existing line breaks are kept. Long lines break after their last
/// whitespace that fits, or hard at `width` when there is none. Every line
/// after the first is prefixed with `indent`, which counts towards the width.
pub fn word_wrap(text: &str, width: usize, indent: &str) -> String {
    let indent_width = indent.chars().count();
    let mut lines: Vec<String> = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let limit = if lines.is_empty() {
            width
        } else {
            width.saturating_sub(indent_width)
        }
        .max(1);

        let (line, consumed) = next_line(rest, limit);
        if lines.is_empty() {
            lines.push(line.to_string());
        } else {
            lines.push(format!("{indent}{line}"));
        }
        rest = &rest[consumed..];
    }

    lines.join("\n")
}

/// Returns the line to print and how many bytes of `text` it consumed.
fn next_line(text: &str, limit: usize) -> (&str, usize) {
    let end = text
        .char_indices()
        .nth(limit)
        .map_or(text.len(), |(i, _)| i);
    let head = &text[..end];

    if let Some(pos) = head.find('\n') {
        return (head[..pos].trim_end_matches('\r'), pos + 1);
    }

    if end < text.len() {
        if let Some(pos) = head.rfind(char::is_whitespace).filter(|&pos| pos > 0) {
            let space = head[pos..].chars().next().map_or(1, char::len_utf8);
            return (head[..pos].trim_end(), pos + space);
        }
    }

    (head, end)
}

/// Render `entries` as an aligned YAML-like block.
///
/// Values made only of word characters and spaces are written bare, others
/// are double-quoted, and multi-line values are folded under `>`.
pub fn yaml_like(entries: &[(&str, String)], indent: &str) -> String {
    let key_width = entries
        .iter()
        .map(|(key, _)| key.chars().count())
        .max()
        .unwrap_or(0);

    entries
        .iter()
        .map(|(key, value)| {
            let align = " ".repeat(key_width - key.chars().count());
            format!("{indent}{key}: {align}{}", safe_value(value, indent))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn safe_value(value: &str, indent: &str) -> String {
    if value.contains('\n') || value.contains('\r') {
        let folded: Vec<String> = value
            .lines()
            .map(|line| format!("{indent}  {line}"))
            .collect();
        format!(">\n{}", folded.join("\n"))
    } else if needs_quotes(value) {
        quote(value)
    } else {
        value.to_string()
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c.is_whitespace())
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_short_text_is_untouched() {
        assert_eq!(word_wrap("ok 1 - adds", 80, "  "), "ok 1 - adds");
    }

    #[test]
    fn test_breaks_at_last_space() {
        assert_eq!(
            word_wrap("alpha beta gamma delta", 12, "  "),
            "alpha beta\n  gamma\n  delta"
        );
    }

    #[test]
    fn test_hard_break_without_space() {
        assert_eq!(word_wrap("abcdefghij", 4, ""), "abcd\nefgh\nij");
    }

    #[test]
    fn test_keeps_existing_newlines() {
        assert_eq!(word_wrap("one\r\ntwo\nthree", 80, "> "), "one\n> two\n> three");
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        assert_eq!(word_wrap("ääää ää", 5, ""), "ääää\nää");
    }

    #[test]
    fn test_yaml_aligns_keys() {
        let block = yaml_like(
            &[
                ("message", "boom".to_string()),
                ("kind", "error".to_string()),
            ],
            "  ",
        );
        assert_eq!(block, "  message: boom\n  kind:    error");
    }

    #[rstest]
    #[case("plain words", "plain words")]
    #[case("it's broken", "\"it's broken\"")]
    #[case("a \"quoted\" path\\x", "\"a \\\"quoted\\\" path\\\\x\"")]
    #[case("", "\"\"")]
    fn test_yaml_escapes_values(#[case] value: &str, #[case] expected: &str) {
        assert_eq!(safe_value(value, ""), expected);
    }

    #[test]
    fn test_yaml_folds_multiline_values() {
        let block = yaml_like(&[("message", "first\nsecond".to_string())], "  ");
        assert_eq!(block, "  message: >\n    first\n    second");
    }
}
