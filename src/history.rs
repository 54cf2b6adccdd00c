use std::{
    fs,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::error::{ArtifactErr, Result};

const HISTORY_FORMAT: &str = "training-history";

/// Version written by `History::save`. Bump when the document layout changes.
pub const HISTORY_FORMAT_VERSION: u32 = 1;

/// Per-epoch metric trajectories of a training run, e.g. `loss` and `val_loss`.
///
/// Metrics keep the order in which they were first recorded, on disk as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    metrics: Vec<(String, Vec<f64>)>,
}

/// On-disk document.
#[derive(Serialize, Deserialize)]
struct HistoryFile {
    format: String,
    version: u32,
    epochs: usize,
    #[serde(with = "values")]
    history: Vec<(String, Vec<f64>)>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one epoch value to the trajectory of `metric`.
    pub fn record<S: Into<String>>(&mut self, metric: S, value: f64) {
        let metric = metric.into();

        match self.metrics.iter_mut().find(|(name, _)| *name == metric) {
            Some((_, values)) => values.push(value),
            None => self.metrics.push((metric, vec![value])),
        }
    }

    /// Appends the values of a whole epoch.
    pub fn record_epoch<S, I>(&mut self, values: I)
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, f64)>,
    {
        for (metric, value) in values {
            self.record(metric, value);
        }
    }

    pub fn get(&self, metric: &str) -> Option<&[f64]> {
        self.metrics
            .iter()
            .find_map(|(name, values)| (name == metric).then_some(values.as_slice()))
    }

    /// Length of the longest trajectory.
    pub fn epochs(&self) -> usize {
        self.metrics
            .iter()
            .map(|(_, values)| values.len())
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.metrics
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Writes the history as a versioned JSON document.
    ///
    /// # Errors
    /// Returns an `ArtifactErr` if the file cannot be created or written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = HistoryFile {
            format: HISTORY_FORMAT.to_string(),
            version: HISTORY_FORMAT_VERSION,
            epochs: self.epochs(),
            history: self.metrics.clone(),
        };

        let mut out = BufWriter::new(fs::File::create(path)?);
        serde_json::to_writer(&mut out, &file)?;
        out.flush()?;
        Ok(())
    }

    /// Reads a history document written by `save`.
    ///
    /// # Errors
    /// Returns an `ArtifactErr::UnsupportedHistoryFormat` for JSON documents that are not
    /// training histories, `ArtifactErr::UnsupportedHistoryVersion` for histories of another
    /// version, or an `ArtifactErr` if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(fs::File::open(path)?);
        let file: HistoryFile = serde_json::from_reader(reader)?;

        if file.format != HISTORY_FORMAT {
            return Err(ArtifactErr::UnsupportedHistoryFormat { got: file.format });
        }

        if file.version != HISTORY_FORMAT_VERSION {
            return Err(ArtifactErr::UnsupportedHistoryVersion {
                got: file.version,
                expected: HISTORY_FORMAT_VERSION,
            });
        }

        Ok(Self {
            metrics: file.history,
        })
    }
}

/// Later trajectories for an already seen name replace the earlier one in place.
impl<S: Into<String>> FromIterator<(S, Vec<f64>)> for History {
    fn from_iter<I: IntoIterator<Item = (S, Vec<f64>)>>(iter: I) -> Self {
        let mut history = Self::new();
        for (name, values) in iter {
            let name = name.into();
            match history.metrics.iter_mut().find(|(k, _)| *k == name) {
                Some((_, slot)) => *slot = values,
                None => history.metrics.push((name, values)),
            }
        }
        history
    }
}

/// Trajectories as a JSON object in recording order. JSON has no NaN: non-finite values go
/// out as `null` and come back as NaN.
mod values {
    use std::fmt;

    use serde::{
        de::{self, MapAccess, Visitor},
        ser::SerializeMap,
        Deserializer, Serializer,
    };

    pub fn serialize<S: Serializer>(
        history: &[(String, Vec<f64>)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(history.len()))?;
        for (name, values) in history {
            let encoded: Vec<Option<f64>> =
                values.iter().map(|v| v.is_finite().then_some(*v)).collect();
            map.serialize_entry(name, &encoded)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, Vec<f64>)>, D::Error> {
        deserializer.deserialize_map(TrajectoriesVisitor)
    }

    struct TrajectoriesVisitor;

    impl<'de> Visitor<'de> for TrajectoriesVisitor {
        type Value = Vec<(String, Vec<f64>)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map from metric name to per-epoch values")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut history: Self::Value = Vec::with_capacity(map.size_hint().unwrap_or(0));

            while let Some((name, values)) = map.next_entry::<String, Vec<Option<f64>>>()? {
                if history.iter().any(|(seen, _)| *seen == name) {
                    return Err(de::Error::custom(format!("duplicate metric `{name}`")));
                }

                let values = values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect();
                history.push((name, values));
            }

            Ok(history)
        }
    }
}
