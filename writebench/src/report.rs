//! Rendering of progress lines and summaries.
//!
//! All functions are pure and return the rendered text, the executor decides where it goes.

use serde::Serialize;
use writebench_storage::Transport;

use crate::stats::{Snapshot, run_throughput, throughput};

/// How the final summary is rendered.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    /// A human-readable block of text.
    #[default]
    Text,
    /// A single JSON object.
    Json,
}

/// The line printed before the first run.
pub fn banner(
    source: &str,
    size: u64,
    destination: &str,
    transport: Transport,
    runs: usize,
) -> String {
    format!(
        "Writing object {source} ({size} bytes) to {destination} with {transport} API, {runs} times."
    )
}

/// The start of a progress line, printed before a run's upload begins.
///
/// `index` counts runs within their phase, starting at `0`.
pub fn run_started(index: usize, is_warmup: bool) -> String {
    match is_warmup {
        true => format!("Warmup Upload {index}..."),
        false => format!("Upload {index}..."),
    }
}

/// The end of a progress line, printed once a run completed.
pub fn run_finished(duration_millis: u64, size: u64) -> String {
    format!(
        "Done. Took {duration_millis} milliseconds ({} Mbps).",
        one_decimal(f64::from(run_throughput(size, duration_millis)))
    )
}

/// The text summary of all measured runs.
pub fn summary(snapshot: Option<&Snapshot>, size: u64) -> String {
    let Some(snapshot) = snapshot else {
        return "\nResults:\n\tNo measured runs.\n".to_owned();
    };

    let line = |label: &str, millis: f64| {
        format!(
            "\t{label}: {}ms ({} Mbps)\n",
            one_decimal(millis),
            one_decimal(throughput(size, millis))
        )
    };

    let mut out = String::from("\nResults:\n");
    out.push_str(&line("Mean", snapshot.mean));
    out.push_str(&line("p50", snapshot.p50));
    out.push_str(&line("Min", snapshot.min));
    out.push_str(&line("Max", snapshot.max));
    out
}

/// Formats `value` with one decimal, rounding half up on its shortest decimal representation.
///
/// `{:.1}` rounds the exact binary value half to even instead, so `0.25` would print as `0.2`.
/// Infinite and NaN values are printed as they are.
fn one_decimal(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let digits = value.abs().to_string();
    let (integer, fraction) = match digits.split_once('.') {
        Some(parts) => parts,
        None => (digits.as_str(), ""),
    };

    let mut fraction = fraction.chars();
    let tenths = fraction.next().unwrap_or('0');
    let round_up = fraction.next().is_some_and(|digit| digit >= '5');

    let mut rounded: Vec<char> = integer.chars().chain(['.', tenths]).collect();
    if round_up {
        increment(&mut rounded);
    }

    let sign = if value.is_sign_negative() { "-" } else { "" };
    format!("{sign}{}", rounded.into_iter().collect::<String>())
}

/// Adds one to the last digit of a decimal number, carrying into the leading digits.
fn increment(digits: &mut Vec<char>) {
    for digit in digits.iter_mut().rev().filter(|digit| **digit != '.') {
        match digit.to_digit(10) {
            Some(9) => *digit = '0',
            Some(n) => {
                *digit = char::from_digit(n + 1, 10).unwrap_or('0');
                return;
            }
            None => return,
        }
    }
    digits.insert(0, '1');
}

#[derive(Serialize)]
struct Statistic {
    millis: f64,
    mbps: f64,
}

impl Statistic {
    fn new(millis: f64, size: u64) -> Self {
        Self {
            millis,
            mbps: throughput(size, millis),
        }
    }
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    destination: &'a str,
    size: u64,
    runs: usize,
    mean: Option<Statistic>,
    p50: Option<Statistic>,
    min: Option<Statistic>,
    max: Option<Statistic>,
}

/// The summary of all measured runs as a single line of JSON.
pub fn summary_json(
    snapshot: Option<&Snapshot>,
    size: u64,
    destination: &str,
    runs: usize,
) -> String {
    let stat = |select: fn(&Snapshot) -> f64| snapshot.map(|s| Statistic::new(select(s), size));
    let summary = JsonSummary {
        destination,
        size,
        runs,
        mean: stat(|s| s.mean),
        p50: stat(|s| s.p50),
        min: stat(|s| s.min),
        max: stat(|s| s.max),
    };

    // Serializing plain structs with string keys cannot fail.
    serde_json::to_string(&summary).unwrap_or_default()
}
