use std::fmt::Display;
use std::fmt::Write as _;
use std::io;

use crate::histogram::{histogram_pretty_print, histogram_short_bar, HistogramWithErrorBars};
use crate::multiproc::TaskOutcome;

use super::{AggregatedHistograms, MHRWTaskResult};

fn center_line(text: &str, width: usize) -> String {
    let pad = width.saturating_sub(text.len()) / 2;
    format!("{:pad$}{}\n", "", text)
}

fn hrule(width: usize) -> String {
    let mut s = "-".repeat(width);
    s.push('\n');
    s
}

/// # Render the final report of a set of runs
/// * one overview line per task (histogram short bar and acceptance ratio)
///   with its error-bar convergence tally, followed by the final histogram as
///   a horizontal bar chart fit to `width` columns
pub fn render_final_report<WP: Display>(
    outcomes: &[TaskOutcome<MHRWTaskResult<WP>>],
    aggregated: &AggregatedHistograms,
    width: usize,
) -> String {
    let width = width.max(40);
    let mut s = String::new();
    s.push('\n');
    s.push_str(&center_line("Final Report of Runs", width));
    s.push_str(&hrule(width));

    for (i, outcome) in outcomes.iter().enumerate() {
        match outcome {
            TaskOutcome::Finished(task) => {
                let bar = histogram_short_bar(
                    &task.result.histogram,
                    true,
                    width.saturating_sub(30),
                );
                let ratio = task
                    .acceptance_ratio
                    .map(|r| format!("{:.2}", r))
                    .unwrap_or_else(|| "n/a".to_string());
                let _ = writeln!(s, "#{:>3}: {}  [accept ratio = {}]", i, bar, ratio);
                let _ = writeln!(
                    s,
                    "    error bars: {}",
                    task.result.convergence_summary()
                );
            }
            TaskOutcome::Interrupted => {
                let _ = writeln!(s, "#{:>3}: <interrupted>", i);
            }
            TaskOutcome::Failed(msg) => {
                let _ = writeln!(s, "#{:>3}: <failed: {}>", i, msg);
            }
        }
    }
    s.push_str(&hrule(width));
    s.push('\n');

    s.push_str(&center_line("Final Histogram", width));
    s.push_str(&hrule(width));
    s.push_str(&histogram_pretty_print(&aggregated.final_histogram, width));
    s.push_str(&hrule(width));
    s
}

/// # Write a histogram as tab-separated CSV
/// * columns `Value`, `Counts`, `Error` and, when `simple` is given,
///   `SimpleError`; one row per bin, `Value` being the lower bin edge
/// * numbers are written in scientific notation
pub fn write_histogram_csv<W: io::Write>(
    w: &mut W,
    final_histogram: &HistogramWithErrorBars,
    simple: Option<&HistogramWithErrorBars>,
    sep: &str,
) -> io::Result<()> {
    write!(w, "Value{sep}Counts{sep}Error")?;
    if simple.is_some() {
        write!(w, "{sep}SimpleError")?;
    }
    writeln!(w)?;
    for k in 0..final_histogram.num_bins() {
        write!(
            w,
            "{:.10e}{sep}{:.10e}{sep}{:.10e}",
            final_histogram.params.bin_lower_value(k),
            final_histogram.count(k),
            final_histogram.error_bar(k),
        )?;
        if let Some(simple) = simple {
            write!(w, "{sep}{:.10e}", simple.error_bar(k))?;
        }
        writeln!(w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::ConvergenceStatus;
    use crate::histogram::HistogramParams;
    use crate::mhrw::{MHRWParams, StepSize};
    use crate::stats::ValueHistogramWithBinningResult;
    use crate::tasks::aggregate_results;

    fn fake_task(bins: Vec<f64>) -> MHRWTaskResult<StepSize> {
        let params = HistogramParams::new(0.0, 1.0, bins.len()).unwrap();
        let num_bins = bins.len();
        MHRWTaskResult {
            task_idx: 0,
            result: ValueHistogramWithBinningResult {
                histogram: HistogramWithErrorBars::from_parts(
                    params,
                    bins,
                    vec![0.01; num_bins],
                    0.0,
                )
                .unwrap(),
                error_levels: vec![vec![0.01; 2]; num_bins],
                converged_status: vec![ConvergenceStatus::Converged; num_bins],
            },
            acceptance_ratio: Some(0.27),
            final_params: MHRWParams::new(StepSize(0.05), 10, 100, 1000).unwrap(),
        }
    }

    #[test]
    fn report_mentions_each_task_and_histogram() {
        let tasks = vec![
            TaskOutcome::Finished(fake_task(vec![0.2, 0.3, 0.5])),
            TaskOutcome::Interrupted,
            TaskOutcome::Failed("InvalidInput: bad file".to_string()),
        ];
        let agg = aggregate_results(
            tasks
                .iter()
                .filter_map(|o| o.finished())
                .map(|t| &t.result),
        )
        .unwrap();
        let report = render_final_report(&tasks, &agg, 70);
        assert!(report.contains("Final Report of Runs"));
        assert!(report.contains("accept ratio = 0.27"));
        assert!(report.contains("<interrupted>"));
        assert!(report.contains("<failed: InvalidInput: bad file>"));
        assert!(report.contains("Final Histogram"));
        assert!(report.contains("converged"));
    }

    #[test]
    fn csv_has_expected_columns() {
        let params = HistogramParams::new(0.0, 1.0, 2).unwrap();
        let hist = HistogramWithErrorBars::from_parts(
            params,
            vec![0.75, 0.25],
            vec![0.05, 0.025],
            0.0,
        )
        .unwrap();
        let mut out = Vec::new();
        write_histogram_csv(&mut out, &hist, Some(&hist), "\t").unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "Value\tCounts\tError\tSimpleError");
        assert_eq!(lines.clone().count(), 2);
        let first = lines.next().unwrap();
        assert_eq!(first.split('\t').count(), 4);
        assert!(first.contains('e'));
    }
}
