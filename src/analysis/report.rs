//! LaTeX table fragments and CSV files
//!
//! Table values are rounded to two decimals and printed the way the paper's
//! tables expect them: integral values keep a trailing `.0`, the best value
//! of each row is wrapped in `\textbf{}` and every row ends with ` \\`.

use crate::analysis::significance::{ComparisonRow, Direction, Magnitude, Verdict};
use crate::analysis::stats::{ApproachStats, CoverageRow};

/// Which value of a table row is emphasised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emphasis {
    /// Highest value (coverage)
    Max,
    /// Lowest value (runtime)
    Min,
}

/// Round to two decimals using the decimal formatter
pub fn round2(value: f64) -> f64 {
    format!("{:.2}", value).parse().unwrap_or(value)
}

/// Shortest representation that keeps a `.0` on integral values
pub fn float_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// [`float_text`] with `,` between thousands of the integer part
pub fn float_text_grouped(value: f64) -> String {
    let text = float_text(value);
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (integer, fraction) = match unsigned.find('.') {
        Some(index) => unsigned.split_at(index),
        None => (unsigned, ""),
    };
    if !integer.chars().all(|c| c.is_ascii_digit()) {
        return text;
    }

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}{}", sign, grouped, fraction)
}

/// One application's row of a comparison table
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub app: String,
    pub values: Vec<f64>,
}

impl TableRow {
    /// Reference contributes its average only, every other approach
    /// contributes average, minimum and maximum
    pub fn from_stats(app: &str, reference: &ApproachStats, others: &[ApproachStats]) -> Self {
        let mut values = vec![round2(reference.average)];
        for stats in others {
            values.extend([round2(stats.average), round2(stats.min), round2(stats.max)]);
        }
        Self {
            app: app.to_string(),
            values,
        }
    }

    /// `App & v1 & \textbf{v2} & ... \\`
    pub fn to_latex(&self, emphasis: Emphasis, grouped: bool) -> String {
        let best = match emphasis {
            Emphasis::Max => self.values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Emphasis::Min => self.values.iter().copied().fold(f64::INFINITY, f64::min),
        };

        let mut line = self.app.clone();
        for &value in &self.values {
            let text = if grouped {
                float_text_grouped(value)
            } else {
                float_text(value)
            };
            if value == best {
                line.push_str(&format!(" & \\textbf{{{}}}", text));
            } else {
                line.push_str(&format!(" & {}", text));
            }
        }
        line.push_str(" \\\\");
        line
    }
}

/// Render every row, one per line
pub fn latex_table(rows: &[TableRow], emphasis: Emphasis, grouped: bool) -> String {
    let mut output = String::new();
    for row in rows {
        output.push_str(&row.to_latex(emphasis, grouped));
        output.push('\n');
    }
    output
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// `App,Approach,Coverage` with one line per measurement
pub fn coverage_summary_csv(rows: &[CoverageRow]) -> String {
    let mut output = String::from("App,Approach,Coverage\n");
    for row in rows {
        output.push_str(&format!(
            "{},{},{}\n",
            escape_field(&row.app),
            escape_field(&row.approach),
            float_text(row.coverage)
        ));
    }
    output
}

/// `App,Approach,Verdict` with one line per compared pair
pub fn comparison_csv(rows: &[ComparisonRow]) -> String {
    let mut output = String::from("App,Approach,Verdict\n");
    for row in rows {
        output.push_str(&format!(
            "{},{},{}\n",
            escape_field(&row.app),
            escape_field(&row.approach),
            row.comparison.verdict
        ));
    }
    output
}

/// Table cell for a verdict; the common outcomes have paper macros
pub fn verdict_cell(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Same => "\\same".to_string(),
        Verdict::Effect {
            direction: Direction::Better,
            magnitude: Magnitude::Large,
        } => "\\betterLarge".to_string(),
        Verdict::Effect {
            direction: Direction::Worse,
            magnitude: Magnitude::Large,
        } => "\\worseLarge".to_string(),
        other => other.to_string(),
    }
}

/// One line per app, one cell per baseline in `baselines` order.
///
/// A baseline missing from the comparison rows leaves an empty cell.
pub fn u_test_table(rows: &[ComparisonRow], baselines: &[String]) -> String {
    let mut apps: Vec<&str> = Vec::new();
    for row in rows {
        if !apps.contains(&row.app.as_str()) {
            apps.push(&row.app);
        }
    }

    let mut output = String::new();
    for app in apps {
        let mut line = app.to_string();
        for baseline in baselines {
            let cell = rows
                .iter()
                .find(|row| row.app == app && &row.approach == baseline)
                .map(|row| verdict_cell(&row.comparison.verdict))
                .unwrap_or_default();
            line.push_str(" & ");
            line.push_str(&cell);
        }
        line.push_str(" \\\\\n");
        output.push_str(&line);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::significance::Comparison;

    fn stats(average: f64, min: f64, max: f64) -> ApproachStats {
        ApproachStats { average, min, max }
    }

    fn comparison_row(app: &str, approach: &str, verdict: Verdict) -> ComparisonRow {
        ComparisonRow {
            app: app.to_string(),
            approach: approach.to_string(),
            comparison: Comparison {
                test: None,
                a12: None,
                verdict,
            },
        }
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(45.4567), 45.46);
        assert_eq!(round2(12.0), 12.0);
        assert_eq!(round2(0.004), 0.0);
    }

    #[test]
    fn test_float_text() {
        assert_eq!(float_text(45.5), "45.5");
        assert_eq!(float_text(3723.0), "3723.0");
        assert_eq!(float_text(0.0), "0.0");
        assert_eq!(float_text(12.34), "12.34");
    }

    #[test]
    fn test_float_text_grouped() {
        assert_eq!(float_text_grouped(3723.0), "3,723.0");
        assert_eq!(float_text_grouped(1234567.25), "1,234,567.25");
        assert_eq!(float_text_grouped(999.5), "999.5");
        assert_eq!(float_text_grouped(-12345.0), "-12,345.0");
    }

    #[test]
    fn test_coverage_row_bolds_maximum() {
        let row = TableRow::from_stats(
            "Simple Clock",
            &stats(40.0, 40.0, 40.0),
            &[stats(30.123, 20.0, 45.5), stats(10.0, 5.0, 12.0)],
        );
        assert_eq!(
            row.to_latex(Emphasis::Max, false),
            "Simple Clock & 40.0 & 30.12 & 20.0 & \\textbf{45.5} & 10.0 & 5.0 & 12.0 \\\\"
        );
    }

    #[test]
    fn test_runtime_row_bolds_minimum_with_grouping() {
        let row = TableRow::from_stats(
            "Clock",
            &stats(3723.0, 3723.0, 3723.0),
            &[stats(7200.0, 7000.0, 7400.0)],
        );
        assert_eq!(
            row.to_latex(Emphasis::Min, true),
            "Clock & \\textbf{3,723.0} & 7,200.0 & 7,000.0 & 7,400.0 \\\\"
        );
    }

    #[test]
    fn test_ties_are_all_bold() {
        let row = TableRow {
            app: "App".to_string(),
            values: vec![0.0, 0.0],
        };
        assert_eq!(
            row.to_latex(Emphasis::Max, false),
            "App & \\textbf{0.0} & \\textbf{0.0} \\\\"
        );
    }

    #[test]
    fn test_coverage_summary_csv() {
        let rows = vec![
            CoverageRow::new("Clock", "padraig", 80.0),
            CoverageRow::new("Clock", "monkey", 12.5),
        ];
        assert_eq!(
            coverage_summary_csv(&rows),
            "App,Approach,Coverage\nClock,padraig,80.0\nClock,monkey,12.5\n"
        );
    }

    #[test]
    fn test_comparison_csv() {
        let rows = vec![comparison_row("Clock", "monkey", Verdict::Same)];
        assert_eq!(comparison_csv(&rows), "App,Approach,Verdict\nClock,monkey,SAME\n");
    }

    #[test]
    fn test_u_test_table_macros() {
        let better_large = Verdict::Effect {
            direction: Direction::Better,
            magnitude: Magnitude::Large,
        };
        let worse_small = Verdict::Effect {
            direction: Direction::Worse,
            magnitude: Magnitude::Small,
        };
        let rows = vec![
            comparison_row("Clock", "monkey", better_large),
            comparison_row("Clock", "stoat", Verdict::Same),
            comparison_row("Notes", "monkey", worse_small),
            comparison_row("Notes", "stoat", Verdict::Unclassified),
        ];
        let baselines = vec!["monkey".to_string(), "stoat".to_string()];
        assert_eq!(
            u_test_table(&rows, &baselines),
            "Clock & \\betterLarge & \\same \\\\\nNotes & WORSE SMALL & SAME (A12) \\\\\n"
        );
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("plain"), "plain");
    }
}
