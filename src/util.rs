use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

use crate::app::SampleWindow;
use crate::constants::CHART_Y_MAX;

// Current reading for the big readout, "---" until the first success
pub fn format_reading(value: Option<f64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "---".to_string(),
    }
}

/// Chart coordinates: x is the position in the window, y is clamped to the fixed axis.
pub fn chart_points(window: &SampleWindow) -> Vec<(f64, f64)> {
    window
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, s.value.clamp(0.0, CHART_Y_MAX)))
        .collect()
}

// First and last timestamps under the chart
pub fn time_span_labels(window: &SampleWindow) -> (String, String) {
    let first = window.first().map(|s| s.timestamp.clone()).unwrap_or_default();
    let last = window.last().map(|s| s.timestamp.clone()).unwrap_or_default();
    (first, last)
}

/// Styles the summary's markdown: headings and `**bold**` in bold, `*italic*`
/// in italics, `*`/`-` bullets as "• ". Anything else is shown as written.
pub fn markdown_lines(text: &str, base: Style) -> Vec<Line<'static>> {
    text.lines().map(|raw| markdown_line(raw, base)).collect()
}

fn markdown_line(raw: &str, base: Style) -> Line<'static> {
    let trimmed = raw.trim_start();
    let indent = &raw[..raw.len() - trimmed.len()];

    if let Some(heading) = heading_text(trimmed) {
        return Line::from(Span::styled(
            heading.to_string(),
            base.add_modifier(Modifier::BOLD),
        ));
    }

    let (prefix, body) = match trimmed
        .strip_prefix("* ")
        .or_else(|| trimmed.strip_prefix("- "))
    {
        Some(rest) => (format!("{indent}• "), rest),
        None => (indent.to_string(), trimmed),
    };

    let mut spans = Vec::new();
    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, base));
    }
    spans.extend(inline_spans(body, base));
    Line::from(spans)
}

fn heading_text(line: &str) -> Option<&str> {
    let rest = line.trim_start_matches('#');
    let level = line.len() - rest.len();
    if (1..=6).contains(&level) && rest.starts_with(' ') {
        Some(rest.trim())
    } else {
        None
    }
}

// Unmatched markers stay literal.
fn inline_spans(text: &str, base: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let Some(start) = rest.find('*') else {
            spans.push(Span::styled(rest.to_string(), base));
            break;
        };
        let marker = if rest[start..].starts_with("**") { "**" } else { "*" };
        let after = &rest[start + marker.len()..];
        match after.find(marker) {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::styled(rest[..start].to_string(), base));
                }
                let modifier = if marker == "**" {
                    Modifier::BOLD
                } else {
                    Modifier::ITALIC
                };
                spans.push(Span::styled(after[..end].to_string(), base.add_modifier(modifier)));
                rest = &after[end + marker.len()..];
            }
            _ => {
                spans.push(Span::styled(rest[..start + marker.len()].to_string(), base));
                rest = after;
            }
        }
    }
    spans
}

/// Rows the lines occupy once word-wrapped to `width` columns.
pub fn wrapped_height(lines: &[Line], width: u16) -> usize {
    let width = usize::from(width.max(1));
    lines
        .iter()
        .map(|line| {
            let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
            wrapped_rows(&text, width)
        })
        .sum()
}

fn wrapped_rows(text: &str, width: usize) -> usize {
    let mut rows = 1;
    let mut col = 0;
    for word in text.split_whitespace() {
        let len = word.chars().count();
        if col > 0 && col + 1 + len <= width {
            col += 1 + len;
            continue;
        }
        if col > 0 {
            rows += 1;
        }
        // Words longer than the row are broken across rows.
        rows += (len - 1) / width;
        col = (len - 1) % width + 1;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Sample;

    #[test]
    fn reading_placeholder_before_first_sample() {
        assert_eq!(format_reading(None), "---");
        assert_eq!(format_reading(Some(412.5)), "412.5");
        assert_eq!(format_reading(Some(3.0)), "3");
    }

    #[test]
    fn points_follow_window_order_and_axis() {
        let mut window = SampleWindow::new();
        window.push(Sample::new(5.0, "10:00:00"));
        window.push(Sample::new(2500.0, "10:00:01"));
        window.push(Sample::new(-1.0, "10:00:02"));

        assert_eq!(
            chart_points(&window),
            vec![(0.0, 5.0), (1.0, CHART_Y_MAX), (2.0, 0.0)]
        );
        assert_eq!(
            time_span_labels(&window),
            ("10:00:00".to_string(), "10:00:02".to_string())
        );
    }

    #[test]
    fn empty_window_has_no_labels() {
        let window = SampleWindow::new();
        assert!(chart_points(&window).is_empty());
        assert_eq!(time_span_labels(&window), (String::new(), String::new()));
    }

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn markdown_markers_become_styles() {
        let lines = markdown_lines(
            "## Summary\n**Average:** 42 NTU, *stable*\n* Replace the filter\n- Check weekly",
            Style::default(),
        );

        assert_eq!(plain(&lines[0]), "Summary");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));

        assert_eq!(plain(&lines[1]), "Average: 42 NTU, stable");
        assert_eq!(lines[1].spans[0].content, "Average:");
        assert!(lines[1].spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(lines[1].spans[2].content, "stable");
        assert!(lines[1].spans[2].style.add_modifier.contains(Modifier::ITALIC));

        assert_eq!(plain(&lines[2]), "• Replace the filter");
        assert_eq!(plain(&lines[3]), "• Check weekly");
    }

    #[test]
    fn stray_markers_are_kept() {
        let lines = markdown_lines("5 * 3 = 15\n#hashtag", Style::default());
        assert_eq!(plain(&lines[0]), "5 * 3 = 15");
        assert_eq!(plain(&lines[1]), "#hashtag");
    }

    #[test]
    fn wrapped_height_counts_word_wrapped_rows() {
        let lines = markdown_lines("aaaa bbbb cccc\n\ndddddddddddddddddddddd", Style::default());
        // 10 columns: two rows, one blank row, a 22-char word over three rows.
        assert_eq!(wrapped_height(&lines, 10), 6);
        assert_eq!(wrapped_height(&lines, 80), 3);
    }
}
