//! Number formatting for legends and hover values.

use crate::store::Series;

/// Default divisor for legend statistics.
pub const DEFAULT_NUMBER_BASE: f64 = 1024.0;

/// Prefixes used by [`number_formatter`].
pub const NUMBER_LABELS: [&str; 10] = ["", "k", "M", "G", "T", "P", "E", "Z", "Y", "H"];

/// Three significant digits, switching to exponent form outside
/// `1e-7 ..= 999.5` the way JavaScript's `toPrecision` does.
pub fn to_precision3(n: f64) -> String {
    if !n.is_finite() {
        return n.to_string();
    }
    if n == 0.0 {
        return "0.00".to_string();
    }
    // `{:.2e}` rounds to three significant digits: "1.23e2", "-4.50e-3".
    let sci = format!("{n:.2e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci;
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return sci;
    };
    if !(-6..3).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{}", exp.abs());
    }
    let rounded: f64 = sci.parse().unwrap_or(n);
    let decimals = (2 - exp) as usize;
    format!("{rounded:.decimals$}")
}

/// Scale `n` down by `base` until it fits, then print three significant
/// digits followed by the prefix. `None` prints as an empty string.
pub fn number_formatter(n: Option<f64>, base: f64, labels: &[&str]) -> String {
    let Some(mut n) = n else {
        return String::new();
    };
    let mut index = 0;
    while n > base && index + 1 < labels.len() {
        n /= base;
        index += 1;
    }
    let prefix = labels.get(index).copied().unwrap_or("");
    format!("{}{prefix}", to_precision3(n))
}

/// [`number_formatter`] with the default base and labels.
pub fn format_number(n: Option<f64>) -> String {
    number_formatter(n, DEFAULT_NUMBER_BASE, &NUMBER_LABELS)
}

/// Legend line for a series: a visibility box, the label and, when the
/// backend sent statistics, `(Cur: .., Max: .., Min: .., Avg: ..)`.
pub fn legend_label(series: &Series) -> String {
    let checkbox = if series.is_visible() { "[x]" } else { "[ ]" };
    let label = series.label.as_deref().unwrap_or("");
    match &series.statistics {
        Some(stats) => format!(
            "{checkbox} {label} (Cur: {}, Max: {}, Min: {}, Avg: {})",
            format_number(stats.cur),
            format_number(stats.max),
            format_number(stats.min),
            format_number(stats.avg),
        ),
        None => format!("{checkbox} {label}"),
    }
}
