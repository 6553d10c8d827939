//! Tabular data formatter

use tracing::{debug, instrument};

use crate::domain::retrain::{
    DataFormatter, Example, FormattedDataset, RawRecordSet, RawValue, RetrainError,
};

/// Maps named numeric columns to feature vectors and a regression label
#[derive(Debug, Clone)]
pub struct TabularFormatter {
    feature_columns: Vec<String>,
    label_column: String,
}

impl TabularFormatter {
    /// An empty `feature_columns` selects every column except the label
    pub fn new(feature_columns: Vec<String>, label_column: impl Into<String>) -> Self {
        Self {
            feature_columns,
            label_column: label_column.into(),
        }
    }

    fn resolve_features(&self, raw: &RawRecordSet) -> Vec<String> {
        if self.feature_columns.is_empty() {
            raw.columns()
                .iter()
                .filter(|c| **c != self.label_column)
                .cloned()
                .collect()
        } else {
            self.feature_columns.clone()
        }
    }
}

fn numeric(value: &RawValue, row: usize, column: &str) -> Result<f32, RetrainError> {
    let number = match value {
        RawValue::Null => {
            return Err(RetrainError::formatting(format!(
                "row {}: column '{}' is null",
                row, column
            )));
        }
        RawValue::Unsupported(type_name) => {
            return Err(RetrainError::formatting(format!(
                "row {}: column '{}' has unsupported type {}",
                row, column, type_name
            )));
        }
        RawValue::Text(_) => {
            return Err(RetrainError::formatting(format!(
                "row {}: column '{}' holds non-numeric value {}",
                row, column, value
            )));
        }
        other => other.as_f32().unwrap_or(f32::NAN),
    };

    if !number.is_finite() {
        return Err(RetrainError::formatting(format!(
            "row {}: column '{}' is not finite ({})",
            row, column, value
        )));
    }

    Ok(number)
}

impl DataFormatter for TabularFormatter {
    #[instrument(skip_all, fields(rows = raw.len()))]
    fn format(&self, raw: RawRecordSet) -> Result<FormattedDataset, RetrainError> {
        let feature_names = self.resolve_features(&raw);

        if raw.is_empty() {
            debug!("No rows to format");
            return Ok(FormattedDataset::new(feature_names, Vec::new()));
        }

        let label_idx = raw.column_index(&self.label_column).ok_or_else(|| {
            RetrainError::formatting(format!("missing label column '{}'", self.label_column))
        })?;

        let feature_idx = feature_names
            .iter()
            .map(|name| {
                raw.column_index(name).ok_or_else(|| {
                    RetrainError::formatting(format!("missing feature column '{}'", name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut examples = Vec::with_capacity(raw.len());
        for (row_no, row) in raw.rows().iter().enumerate() {
            let features = feature_idx
                .iter()
                .zip(&feature_names)
                .map(|(&idx, name)| numeric(&row[idx], row_no, name))
                .collect::<Result<Vec<_>, _>>()?;
            let label = numeric(&row[label_idx], row_no, &self.label_column)?;

            examples.push(Example::new(features, label));
        }

        debug!(examples = examples.len(), features = feature_names.len(), "Rows formatted");
        Ok(FormattedDataset::new(feature_names, examples))
    }
}
