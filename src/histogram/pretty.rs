use super::AveragableHistogram;

/// compact `%g`-like formatting with the given significant digits
pub(crate) fn fmt_g(value: f64, digits: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let abs = value.abs();
    if abs >= 1e-4 && abs < 10f64.powi(digits as i32) {
        let decimals = (digits as i64 - 1 - abs.log10().floor() as i64).max(0) as usize;
        let s = format!("{:.*}", decimals, value);
        // strip trailing zeros after the decimal point
        if s.contains('.') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    } else {
        format!("{:.*e}", digits.saturating_sub(1), value)
    }
}

/// clamp a bar length derived from `value` into `[0, width)`
fn bar_len(value: f64, scale: f64, width: usize) -> usize {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let l = (value / scale + 0.5) as usize;
    l.min(width.saturating_sub(1))
}

/// # Render a histogram as a multi-line horizontal bar chart
/// * one line per bin: `label |bar  value`
/// * histograms with error bars additionally render a `|---|` whisker spanning
///   `value ± error` and append `+- error` to the value column
/// * the output is fit into `max_width` columns
pub fn histogram_pretty_print<H: AveragableHistogram>(hist: &H, max_width: usize) -> String {
    let num_bins = hist.params().num_bins;
    let labels: Vec<String> = (0..num_bins)
        .map(|k| fmt_g(hist.params().bin_center_value(k), 4))
        .collect();
    let values: Vec<String> = (0..num_bins)
        .map(|k| {
            if H::HAS_ERROR_BARS {
                format!(
                    "{} +- {}",
                    fmt_g(hist.bin_value(k), 4),
                    fmt_g(hist.bin_error(k), 3)
                )
            } else {
                fmt_g(hist.bin_value(k), 4)
            }
        })
        .collect();
    let label_w = labels.iter().map(String::len).max().unwrap_or(0);
    let value_w = values.iter().map(String::len).max().unwrap_or(0);

    let max_value = (0..num_bins)
        .map(|k| hist.bin_value(k) + hist.bin_error(k))
        .filter(|v| v.is_finite())
        .fold(0.0f64, f64::max);
    let bar_w = max_width
        .saturating_sub(label_w + value_w + " |".len() + "  ".len())
        .max(2);
    let scale = if max_value > 0.0 {
        max_value / bar_w as f64
    } else {
        1.0
    };

    let mut out = String::new();
    for k in 0..num_bins {
        let mut bar = vec![b' '; bar_w];
        let v = hist.bin_value(k);
        let e = hist.bin_error(k);
        let star_end = bar_len(v - e, scale, bar_w);
        for c in bar.iter_mut().take(star_end) {
            *c = b'*';
        }
        if H::HAS_ERROR_BARS && e > 0.0 {
            let lo = bar_len(v - e, scale, bar_w);
            let hi = bar_len(v + e, scale, bar_w);
            for c in bar.iter_mut().take(hi).skip(lo) {
                *c = b'-';
            }
            bar[lo] = b'|';
            bar[hi.min(bar_w - 1)] = b'|';
        }
        out.push_str(&format!(
            "{:>label_w$} |{}  {:>value_w$}\n",
            labels[k],
            String::from_utf8(bar).expect("ascii bar"),
            values[k],
        ));
    }
    if hist.off_chart_value() > 0.0 {
        out.push_str(&format!(
            "{:>label_w$} |off chart: {}\n",
            "",
            fmt_g(hist.off_chart_value(), 4)
        ));
    }
    out
}

/// # Render a histogram as a one-line bar
/// * format is `min|.-+ox%#   |max`, using a character ramp to indicate the
///   (optionally log-scaled) bin magnitude
/// * adjacent bins are merged as needed to fit `max_width` columns
pub fn histogram_short_bar<H: AveragableHistogram>(
    hist: &H,
    log_scale: bool,
    max_width: usize,
) -> String {
    let params = hist.params();
    let mut s = format!("{}|", fmt_g(params.min, 2));
    let mut send = format!("|{}", fmt_g(params.max, 2));
    if hist.off_chart_value() > 0.0 {
        send.push_str(&format!(" [+{} off]", fmt_g(hist.off_chart_value(), 1)));
    }

    let max_bar_width = max_width.saturating_sub(s.len() + send.len()).max(2);
    let num_div = (params.num_bins as f64 / max_bar_width as f64).ceil() as usize;
    let bar_width = (params.num_bins as f64 / num_div as f64).ceil() as usize;

    let mut grouped = vec![0.0f64; bar_width];
    for (k, g) in grouped.iter_mut().enumerate() {
        let lo = k * num_div;
        let hi = ((k + 1) * num_div).min(params.num_bins);
        *g = (lo..hi).map(|j| hist.bin_value(j)).sum();
    }

    let scaled: Vec<f64> = grouped
        .iter()
        .map(|&v| {
            if v > 0.0 && log_scale {
                v.ln()
            } else {
                v
            }
        })
        .collect();
    let min_val = grouped
        .iter()
        .zip(&scaled)
        .filter(|(&g, _)| g > 0.0)
        .map(|(_, &v)| v)
        .fold(f64::INFINITY, f64::min);
    let max_val = grouped
        .iter()
        .zip(&scaled)
        .filter(|(&g, _)| g > 0.0)
        .map(|(_, &v)| v)
        .fold(f64::NEG_INFINITY, f64::max)
        + 1e-6;

    const CHARS: &[u8] = b".-+ox%#";
    for (&g, &v) in grouped.iter().zip(&scaled) {
        if g <= 0.0 {
            s.push(' ');
        } else {
            let i = (CHARS.len() as f64 * (v - min_val) / (max_val - min_val)) as usize;
            s.push(CHARS[i.min(CHARS.len() - 1)] as char);
        }
    }
    s.push_str(&send);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::{Histogram, HistogramParams, HistogramWithErrorBars};

    #[test]
    fn fmt_g_is_compact() {
        assert_eq!(fmt_g(0.0, 4), "0");
        assert_eq!(fmt_g(0.25, 2), "0.25");
        assert_eq!(fmt_g(1.0, 4), "1");
        assert_eq!(fmt_g(1234.0, 4), "1234");
        assert!(fmt_g(1.0e-7, 3).contains('e'));
    }

    #[test]
    fn pretty_print_has_one_line_per_bin() {
        let params = HistogramParams::new(0.0, 1.0, 5).unwrap();
        let mut h = Histogram::<u64>::new(params);
        for _ in 0..10 {
            h.record(0.45);
        }
        h.record(0.05);
        let out = histogram_pretty_print(&h, 60);
        assert_eq!(out.lines().count(), 5);
        for line in out.lines() {
            assert!(line.len() <= 60);
        }
        assert!(out.contains('*'));
    }

    #[test]
    fn pretty_print_with_error_bars_draws_whiskers() {
        let params = HistogramParams::new(0.0, 1.0, 3).unwrap();
        let h = HistogramWithErrorBars::from_parts(
            params,
            vec![1.0, 10.0, 5.0],
            vec![0.2, 2.0, 1.0],
            0.0,
        )
        .unwrap();
        let out = histogram_pretty_print(&h, 72);
        assert!(out.contains("+-"));
        assert!(out.contains('|'));
    }

    #[test]
    fn short_bar_fits_width() {
        let params = HistogramParams::new(0.0, 1.0, 50).unwrap();
        let mut h = Histogram::<u64>::new(params);
        for i in 0..500 {
            h.record((i % 50) as f64 / 55.0);
        }
        let bar = histogram_short_bar(&h, true, 40);
        assert!(bar.len() <= 40);
        assert!(bar.starts_with("0|"));
        assert!(bar.ends_with("|1"));
    }

    #[test]
    fn short_bar_empty_bins_are_blank() {
        let params = HistogramParams::new(0.0, 1.0, 10).unwrap();
        let mut h = Histogram::<u64>::new(params);
        h.record(0.95);
        let bar = histogram_short_bar(&h, false, 30);
        assert!(bar.contains(' '));
    }
}
