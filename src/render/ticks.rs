//! Y-axis unit prefix selection and "nice number" tick generation.
//!
//! The axis scale (`base`, 1000 or 1024 depending on the metric) is passed
//! in explicitly. The tick step is rounded to 1, 2, 2.5, 5 or 10 times a power
//! of ten, targeting `0.3 * sqrt(chart height)` ticks.

/// Unit prefixes for successive powers of the base.
pub const PREFIXES: [&str; 5] = ["", "K", "M", "G", "T"];

/// The chosen unit for an axis: `divisor = base^interval`, shown as `prefix`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisUnit {
    pub interval: usize,
    pub divisor: f64,
    pub prefix: &'static str,
}

/// Pick the smallest power of `base` that brings `max` to at most `base`.
///
/// Stops at the largest prefix. A base of 1 or less never scales.
pub fn choose_base(max: f64, base: f64) -> AxisUnit {
    let mut interval = 0;
    if base > 1.0 && max.is_finite() {
        while interval < PREFIXES.len() - 1 && max / base.powi(interval as i32) > base {
            interval += 1;
        }
    }
    AxisUnit {
        interval,
        divisor: if base > 1.0 {
            base.powi(interval as i32)
        } else {
            1.0
        },
        prefix: PREFIXES[interval],
    }
}

/// Target number of ticks for a chart `height` pixels tall.
pub fn target_ticks(height: u32) -> f64 {
    0.3 * f64::from(height).sqrt()
}

/// Tick step for `[min, max]` in axis units, before multiplying by the unit
/// divisor. Returns `(multiplier, magnitude)` with the multiplier one of
/// 1, 2, 2.5, 5, 10.
fn nice_step(delta: f64) -> (f64, f64) {
    let dec = -delta.log10().floor();
    let magn = 10f64.powf(-dec);
    let norm = delta / magn;

    let size = if norm < 1.5 {
        1.0
    } else if norm < 3.0 {
        if norm > 2.25 { 2.5 } else { 2.0 }
    } else if norm < 7.5 {
        5.0
    } else {
        10.0
    };
    (size, magn)
}

/// Generate ticks from `min` until one passes `max`.
///
/// Returns an empty set for a degenerate range (`max <= min`, or a
/// non-finite bound).
pub fn tick_generator(min: f64, max: f64, base: f64, height: u32) -> Vec<f64> {
    if !min.is_finite() || !max.is_finite() || max <= min {
        return Vec::new();
    }
    let unit = choose_base(max, base);
    let delta = ((max - min) / unit.divisor) / target_ticks(height.max(1));
    let (size, magn) = nice_step(delta);
    let step = size * magn * unit.divisor;
    if !step.is_finite() || step <= 0.0 {
        return Vec::new();
    }

    let mut ticks = Vec::new();
    let mut i = 0u32;
    loop {
        // Multiply rather than accumulate so 0.1-style steps stay exact.
        let tick = min + step * f64::from(i);
        if tick >= max + step {
            break;
        }
        ticks.push(tick);
        i += 1;
    }
    ticks
}

/// Decimals needed (0..=3) for `value` to print exactly.
fn decimals_for(value: f64) -> usize {
    (0..=3)
        .find(|&d| format!("{value:.d$}").parse::<f64>().ok() == Some(value))
        .unwrap_or(3)
}

/// Labels for a tick set: each value divided by the axis unit, printed with
/// the fewest decimals (at most 3) that show every tick exactly, then the
/// unit prefix.
pub fn format_ticks(ticks: &[f64], axis_max: f64, base: f64) -> Vec<String> {
    let unit = choose_base(axis_max, base);
    let decimals = ticks
        .iter()
        .map(|t| decimals_for(t / unit.divisor))
        .max()
        .unwrap_or(0);
    ticks
        .iter()
        .map(|t| format!("{:.decimals$}{}", t / unit.divisor, unit.prefix))
        .collect()
}
