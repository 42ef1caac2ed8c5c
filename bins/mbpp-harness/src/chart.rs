// Terminal bar chart of correctness rates

const FULL: char = '█';
const REFERENCE_EMPTY: char = '┆';
const REFERENCE_FILLED: char = '▓';

fn column(value: f64, width: usize) -> usize {
    (value.clamp(0.0, 1.0) * width as f64).round() as usize
}

/// Render horizontal bars on a 0..1 axis with a vertical reference line
///
/// Bars covering the reference column draw it as `▓`, empty cells as `┆`.
pub fn render_bar_chart(title: &str, bars: &[(&str, f64)], reference: f64, width: usize) -> String {
    let width = width.max(10);
    let label_width = bars.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);
    let reference_col = column(reference, width).min(width - 1);

    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push('\n');

    for (label, value) in bars {
        let filled = if value.is_finite() { column(*value, width) } else { 0 };
        let bar: String = (0..width)
            .map(|col| match (col < filled, col == reference_col) {
                (true, true) => REFERENCE_FILLED,
                (true, false) => FULL,
                (false, true) => REFERENCE_EMPTY,
                (false, false) => ' ',
            })
            .collect();
        out.push_str(&format!(
            "{:<label_width$} │{}│ {:.2}\n",
            label,
            bar,
            value,
            label_width = label_width
        ));
    }

    // Axis: 0 under the first cell, reference value under its column, 1 at the end
    let mut axis: Vec<char> = vec![' '; width + 2];
    let mut place = |text: &str, at: usize| {
        for (i, c) in text.chars().enumerate() {
            if let Some(slot) = axis.get_mut(at + i) {
                *slot = c;
            }
        }
    };
    place("0", 1);
    let reference_label = format!("{}", reference);
    place(&reference_label, 1 + reference_col);
    place("1", width);
    let axis: String = axis.into_iter().collect();
    out.push_str(&format!(
        "{:<label_width$} {}\n",
        "",
        axis.trim_end(),
        label_width = label_width
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar_line<'a>(chart: &'a str, label: &str) -> &'a str {
        chart
            .lines()
            .find(|line| line.starts_with(label))
            .expect("label line present")
    }

    fn filled_cells(line: &str) -> usize {
        line.chars().filter(|&c| c == FULL || c == REFERENCE_FILLED).count()
    }

    #[test]
    fn test_bar_lengths_follow_rates() {
        let chart = render_bar_chart(
            "Correctness",
            &[("Write Code", 0.5), ("Advanced Writing", 1.0), ("Advanced Writing V2", 0.0)],
            0.5,
            20,
        );

        assert!(chart.starts_with("Correctness\n"));
        assert_eq!(filled_cells(bar_line(&chart, "Write Code")), 10);
        assert_eq!(filled_cells(bar_line(&chart, "Advanced Writing ")), 20);
        assert_eq!(filled_cells(bar_line(&chart, "Advanced Writing V2")), 0);
        assert!(bar_line(&chart, "Write Code").ends_with("0.50"));
    }

    #[test]
    fn test_reference_line_drawn_on_every_bar() {
        let chart = render_bar_chart("t", &[("a", 0.2), ("b", 0.9)], 0.5, 20);
        assert!(bar_line(&chart, "a").contains(REFERENCE_EMPTY));
        assert!(bar_line(&chart, "b").contains(REFERENCE_FILLED));
    }

    #[test]
    fn test_labels_are_aligned() {
        let chart = render_bar_chart("t", &[("short", 0.3), ("a longer label", 0.6)], 0.5, 20);
        let first = bar_line(&chart, "short").find('│').unwrap();
        let second = bar_line(&chart, "a longer label").find('│').unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_axis_marks_reference() {
        let chart = render_bar_chart("t", &[("a", 0.3)], 0.5, 20);
        let axis = chart.lines().last().unwrap();
        assert!(axis.contains('0'));
        assert!(axis.contains("0.5"));
        assert!(axis.trim_end().ends_with('1'));
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let chart = render_bar_chart("t", &[("hi", 1.7), ("nan", f64::NAN)], 0.5, 20);
        assert_eq!(filled_cells(bar_line(&chart, "hi")), 20);
        assert_eq!(filled_cells(bar_line(&chart, "nan")), 0);
    }
}
