use std::{
    fmt::{self, Display},
    fs,
    io::{BufWriter, Write},
    path::Path,
};

use crate::error::{ArtifactErr, Result};

const SEPARATOR: &str = ": ";

/// A single final evaluation result.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Parses a value as written by `Display`: integer first, then float, then plain text.
    fn parse(s: &str) -> Self {
        if let Ok(v) = s.parse::<i64>() {
            return Self::Int(v);
        }

        match s {
            "nan" => return Self::Float(f64::NAN),
            "inf" => return Self::Float(f64::INFINITY),
            "-inf" => return Self::Float(f64::NEG_INFINITY),
            _ => {}
        }

        // Rust's float parser also accepts "NaN" or "infinity", which never come out of
        // `Display`, so those stay text.
        let looks_numeric = s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));

        match s.parse::<f64>() {
            Ok(v) if looks_numeric => Self::Float(v),
            _ => Self::Text(s.to_string()),
        }
    }
}

impl Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(v) => write!(f, "{v}"),
            MetricValue::Float(v) => f.write_str(&float_repr(*v)),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

/// Shortest round-trip float text: `1.0`, `0.95`, `1e-05`, `1e+16`, `nan`, `inf`.
fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }

    // Debug already switches to scientific notation outside [1e-4, 1e16) and keeps a
    // trailing ".0" on integral values; only the exponent needs a sign and two digits.
    let s = format!("{v:?}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        // Widening directly would print 0.95f32 as 0.949999988079071.
        let widened = value.to_string().parse().unwrap_or(f64::from(value));
        Self::Float(widened)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Final metrics of a run, kept in insertion order.
///
/// The file holds one `<name>: <value>` line per metric, so names may not contain `": "`
/// or line breaks and text values may not contain line breaks. Such entries are accepted
/// in memory and rejected by `write_to`. Text that looks like a number reads back as one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics {
    entries: Vec<(String, MetricValue)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`. An existing entry keeps its position.
    ///
    /// # Returns
    /// The replaced value, if any.
    pub fn insert<K, V>(&mut self, name: K, value: V) -> Option<MetricValue>
    where
        K: Into<String>,
        V: Into<MetricValue>,
    {
        let name = name.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == name).then_some(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes one `<name>: <value>` line per entry, in insertion order.
    ///
    /// # Errors
    /// Returns an `ArtifactErr::InvalidMetric` before touching the file if an entry cannot be
    /// represented on one line, or an `ArtifactErr::Io` if the file cannot be created or
    /// written.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        for (name, value) in &self.entries {
            check_entry(name, value)?;
        }

        let mut out = BufWriter::new(fs::File::create(path)?);
        for (name, value) in &self.entries {
            writeln!(out, "{name}{SEPARATOR}{value}")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Reads a metrics file back. Each line is split at its first `": "`.
    ///
    /// # Errors
    /// Returns an `ArtifactErr::Io` if the file cannot be read, or
    /// `ArtifactErr::MalformedMetrics` if a line has no separator.
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut metrics = Self::new();

        for (i, line) in content.lines().enumerate() {
            let (name, value) = line
                .split_once(SEPARATOR)
                .ok_or_else(|| ArtifactErr::MalformedMetrics {
                    line: i + 1,
                    content: line.to_string(),
                })?;

            metrics.insert(name, MetricValue::parse(value));
        }

        Ok(metrics)
    }
}

fn check_entry(name: &str, value: &MetricValue) -> Result<()> {
    let is_line_break = |c: char| matches!(c, '\n' | '\r');

    let reason = if name.contains(is_line_break) {
        "name contains a line break"
    } else if name.contains(SEPARATOR) {
        "name contains the \": \" separator"
    } else if matches!(value, MetricValue::Text(s) if s.contains(is_line_break)) {
        "value contains a line break"
    } else {
        return Ok(());
    };

    Err(ArtifactErr::InvalidMetric {
        name: name.to_string(),
        reason,
    })
}

impl<K, V> FromIterator<(K, V)> for Metrics
where
    K: Into<String>,
    V: Into<MetricValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metrics = Self::new();
        for (name, value) in iter {
            metrics.insert(name, value);
        }
        metrics
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for Metrics
where
    K: Into<String>,
    V: Into<MetricValue>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}
