//! Hint Wrapping
//!
//! When completions are shown as an inline hint rather than a selection
//! list, only the first item's full text is displayed, wrapped to a fixed
//! display width. Each logical line keeps its own leading indentation on
//! continuation lines, and the result can be right-padded to a rectangle so
//! the hint paints over a uniform area.

use super::CompletionItem;

/// Wrap `text` to `max_width` columns
///
/// Lines break at the last space inside the budget when one exists beyond
/// the line's indentation, otherwise hard-break at the budget. Continuation
/// lines repeat the logical line's indentation. With `padding`, every
/// returned line is space-padded to the longest line's width.
#[must_use]
pub fn wrap_to_width(text: &str, max_width: usize, padding: bool) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.split('\n') {
        wrap_line(line, max_width.max(1), &mut out);
    }

    if padding {
        let widest = out.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        for line in &mut out {
            let width = line.chars().count();
            line.extend(std::iter::repeat(' ').take(widest - width));
        }
    }
    out
}

fn wrap_line(line: &str, max_width: usize, out: &mut Vec<String>) {
    let indent: String = line
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();
    let indent_width = indent.chars().count();

    let mut rest: Vec<char> = line.chars().collect();
    let mut first = true;
    loop {
        // Continuation lines re-indent, which shrinks their budget.
        let budget = if first {
            max_width
        } else {
            max_width.saturating_sub(indent_width).max(1)
        };

        if rest.len() <= budget {
            let tail: String = rest.into_iter().collect();
            out.push(if first { tail } else { format!("{indent}{tail}") });
            return;
        }

        // Prefer the last space inside the budget, but never break inside
        // the indentation itself.
        let floor = if first { indent_width } else { 0 };
        let break_at = rest[..budget]
            .iter()
            .rposition(|c| *c == ' ' || *c == '\t')
            .filter(|i| *i > floor);

        let (head, remainder) = match break_at {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (&rest[..budget], &rest[budget..]),
        };

        let head: String = head.iter().collect();
        out.push(if first { head } else { format!("{indent}{head}") });
        rest = remainder.to_vec();
        first = false;
    }
}

/// Build the inline-hint display lines for the first item of a batch
///
/// Returns an empty vec when the batch is empty. The caret line's
/// indentation is applied as left padding to every line after the first,
/// and lines are padded to a rectangle.
#[must_use]
pub fn hint_lines(items: &[CompletionItem], indent: &str, width: usize) -> Vec<String> {
    let Some(first) = items.first() else {
        return Vec::new();
    };

    let wrapped = wrap_to_width(&first.full_text(), width, true);
    wrapped
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line
            } else {
                format!("{indent}{line}")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(wrap_to_width("short", 20, false), vec!["short"]);
    }

    #[test]
    fn test_breaks_at_space() {
        let lines = wrap_to_width("alpha beta gamma", 11, false);
        assert_eq!(lines, vec!["alpha beta", "gamma"]);
    }

    #[test]
    fn test_hard_break_without_space() {
        let lines = wrap_to_width("abcdefghij", 4, false);
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_continuation_keeps_indent() {
        let lines = wrap_to_width("    value = first + second", 14, false);
        assert_eq!(lines[0], "    value =");
        assert_eq!(lines[1], "    first +");
        assert_eq!(lines[2], "    second");
    }

    #[test]
    fn test_padding_makes_rectangle() {
        let lines = wrap_to_width("aaa bb\nc", 6, true);
        let widths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_multiline_input_wraps_each_line() {
        let lines = wrap_to_width("one two\nthree four", 6, false);
        assert_eq!(lines, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_hint_lines_first_item_only() {
        let items = vec![
            CompletionItem {
                insert_text: "first()".into(),
                suffix_text: ";".into(),
                ..CompletionItem::default()
            },
            CompletionItem {
                insert_text: "second()".into(),
                ..CompletionItem::default()
            },
        ];

        let lines = hint_lines(&items, "  ", 40);
        assert_eq!(lines, vec!["first();"]);
    }

    #[test]
    fn test_hint_lines_indent_continuations() {
        let items = vec![CompletionItem {
            insert_text: "aaaa bbbb cccc".into(),
            ..CompletionItem::default()
        }];

        let lines = hint_lines(&items, "    ", 9);
        assert!(lines.len() > 1);
        assert!(!lines[0].starts_with(' '));
        for line in &lines[1..] {
            assert!(line.starts_with("    "));
        }
    }

    #[test]
    fn test_hint_lines_empty_batch() {
        assert!(hint_lines(&[], "", 40).is_empty());
    }
}
