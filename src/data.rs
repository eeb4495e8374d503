use crate::error::{Result, SelectionError};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub X: Vec<Vec<f64>>,       // Feature values, one column per feature (X[feature][sample])
    pub y: Vec<f64>,            // Target values, in sample order
    pub features: Vec<String>,  // Feature names
    pub samples: Vec<String>,   // Sample names
    pub feature_len: usize,
    pub sample_len: usize,
}

impl Data {
    /// Create a new `Data` instance with default values
    pub fn new() -> Data {
        Data {
            X: Vec::new(),
            y: Vec::new(),
            features: Vec::new(),
            samples: Vec::new(),
            feature_len: 0,
            sample_len: 0,
        }
    }

    /// Build a dataset from in-memory columns, checking that shapes agree.
    pub fn from_columns(features: Vec<String>, samples: Vec<String>, X: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Data> {
        if features.len() != X.len() {
            return Err(SelectionError::Data(format!(
                "{} feature names for {} columns",
                features.len(),
                X.len()
            )));
        }
        if let Some((name, column)) = features.iter().zip(X.iter()).find(|(_, c)| c.len() != samples.len()) {
            return Err(SelectionError::Data(format!(
                "column {} has {} values but there are {} samples",
                name,
                column.len(),
                samples.len()
            )));
        }
        if y.len() != samples.len() {
            return Err(SelectionError::Data(format!(
                "target has {} values but there are {} samples",
                y.len(),
                samples.len()
            )));
        }
        if let Some((sample, value)) = samples.iter().zip(y.iter()).find(|(_, v)| !v.is_finite()) {
            return Err(SelectionError::Data(format!("target of {} is not a finite number ({})", sample, value)));
        }

        Ok(Data {
            feature_len: features.len(),
            sample_len: samples.len(),
            X,
            y,
            features,
            samples,
        })
    }

    /// Load data from `X.tsv` and `y.tsv` files.
    ///
    /// With `features_in_rows`, X has one line per feature and a header of
    /// sample names; otherwise one line per sample and a header of feature names.
    /// y has a header line then `sample<TAB>value` lines.
    pub fn load_data<P: AsRef<Path>>(&mut self, X_path: P, y_path: P, features_in_rows: bool) -> Result<()> {
        info!("Loading files {} and {}...", X_path.as_ref().display(), y_path.as_ref().display());

        let (header, rows) = read_table(X_path.as_ref())?;
        let columns: Vec<String> = header.into_iter().skip(1).collect();

        let mut row_names = Vec::with_capacity(rows.len());
        let mut values: Vec<Vec<f64>> = Vec::with_capacity(rows.len());
        for (line, record) in rows.into_iter().enumerate() {
            let mut fields = record.into_iter();
            let name = fields.next().unwrap_or_default();
            let parsed = fields
                .map(|v| {
                    v.trim().parse::<f64>().map_err(|_| {
                        SelectionError::Data(format!("{}: line {} holds non numeric value {:?}", X_path.as_ref().display(), line + 2, v))
                    })
                })
                .collect::<Result<Vec<f64>>>()?;
            if parsed.len() != columns.len() {
                return Err(SelectionError::Data(format!(
                    "{}: line {} has {} values, header announces {}",
                    X_path.as_ref().display(),
                    line + 2,
                    parsed.len(),
                    columns.len()
                )));
            }
            row_names.push(name);
            values.push(parsed);
        }

        let (features, samples, X) = if features_in_rows {
            (row_names, columns, values)
        } else {
            let X = (0..columns.len())
                .map(|j| values.iter().map(|row| row[j]).collect())
                .collect();
            (columns, row_names, X)
        };

        // Reorder `y` to match the order of `samples` from X.tsv
        let (_, y_rows) = read_table(y_path.as_ref())?;
        let mut y_map: HashMap<String, f64> = HashMap::new();
        for (line, record) in y_rows.into_iter().enumerate() {
            if record.len() < 2 {
                return Err(SelectionError::Data(format!(
                    "{}: line {} should hold a sample and a target value",
                    y_path.as_ref().display(),
                    line + 2
                )));
            }
            let target = record[1]
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    SelectionError::Data(format!("{}: invalid target {:?} for {}", y_path.as_ref().display(), record[1], record[0]))
                })?;
            y_map.insert(record[0].clone(), target);
        }
        let y = samples
            .iter()
            .map(|sample| {
                y_map
                    .get(sample)
                    .copied()
                    .ok_or_else(|| SelectionError::Data(format!("No y value available for sample {}", sample)))
            })
            .collect::<Result<Vec<f64>>>()?;

        *self = Data::from_columns(features, samples, X, y)?;
        debug!("{:?}", self);
        Ok(())
    }

    /// Returns a dataset holding only `features`, in the given order.
    pub fn restrict_to(&self, features: &[String]) -> Result<Data> {
        let index: HashMap<&str, usize> = self.features.iter().enumerate().map(|(i, f)| (f.as_str(), i)).collect();
        let X = features
            .iter()
            .map(|name| {
                index
                    .get(name.as_str())
                    .map(|&j| self.X[j].clone())
                    .ok_or_else(|| SelectionError::Configuration(format!("feature {} is clustered but absent from the data", name)))
            })
            .collect::<Result<Vec<Vec<f64>>>>()?;

        Data::from_columns(features.to_vec(), self.samples.clone(), X, self.y.clone())
    }

    /// SHA-256 of the feature names, values and target, used to tie results to their input
    pub fn fingerprint(&self) -> Result<String> {
        let serialized = bincode::serialize(&(&self.features, &self.X, &self.y))?;
        let mut hasher = Sha256::new();
        hasher.update(serialized);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl Default for Data {
    fn default() -> Self {
        Data::new()
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Data: {} features x {} samples", self.feature_len, self.sample_len)?;
        if self.feature_len > 0 {
            let shown: Vec<&str> = self.features.iter().take(5).map(|s| s.as_str()).collect();
            write!(f, " [{}{}]", shown.join(", "), if self.feature_len > 5 { ", ..." } else { "" })?;
        }
        Ok(())
    }
}

/// Reads a tab separated file, returning its header and remaining records.
pub(crate) fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => record?.iter().map(String::from).collect(),
        None => return Err(SelectionError::Data(format!("{} is empty", path.display()))),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(String::from).collect());
    }

    Ok((header, rows))
}
