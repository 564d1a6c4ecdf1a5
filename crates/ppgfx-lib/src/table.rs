//! Per-pulse feature tables and their statistics summaries.

use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};

/// Named numeric features, one row per pulse in pulse order.
///
/// A row is `None` when the pulse could not be processed. Missing rows are
/// kept so that row `i` always belongs to pulse `i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Option<Vec<f64>>>,
}

impl FeatureTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from rows already collected in pulse order.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Option<Vec<f64>>>,
    ) -> PulseResult<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            match row {
                Some(values) => table.push(values)?,
                None => table.push_missing(),
            }
        }
        Ok(table)
    }

    pub fn push(&mut self, values: Vec<f64>) -> PulseResult<()> {
        if values.len() != self.columns.len() {
            return Err(PulseError::config(format!(
                "row has {} values but the table has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(Some(values));
        Ok(())
    }

    pub fn push_missing(&mut self) {
        self.rows.push(None);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Option<Vec<f64>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn missing(&self) -> usize {
        self.rows.iter().filter(|r| r.is_none()).count()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of column `idx` for every present row.
    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows
            .iter()
            .flatten()
            .filter_map(|row| row.get(idx).copied())
            .collect()
    }

    /// Value at `(pulse, column)`, `None` for a missing row.
    pub fn get(&self, pulse: usize, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        self.rows.get(pulse)?.as_ref()?.get(idx).copied()
    }
}

/// The fixed battery of summary statistics, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    Median,
    Std,
    #[serde(rename = "percentile_25")]
    Percentile25,
    #[serde(rename = "percentile_75")]
    Percentile75,
    Iqr,
    Skew,
    Kurtosis,
    Mad,
}

impl Statistic {
    pub const ALL: [Statistic; 9] = [
        Statistic::Mean,
        Statistic::Median,
        Statistic::Std,
        Statistic::Percentile25,
        Statistic::Percentile75,
        Statistic::Iqr,
        Statistic::Skew,
        Statistic::Kurtosis,
        Statistic::Mad,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Statistic::Mean => "mean",
            Statistic::Median => "median",
            Statistic::Std => "std",
            Statistic::Percentile25 => "percentile_25",
            Statistic::Percentile75 => "percentile_75",
            Statistic::Iqr => "iqr",
            Statistic::Skew => "skew",
            Statistic::Kurtosis => "kurtosis",
            Statistic::Mad => "mad",
        }
    }

    fn position(self) -> usize {
        Self::ALL.iter().position(|s| *s == self).unwrap_or(0)
    }
}

/// One row per [`Statistic`], one column per feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsTable {
    columns: Vec<String>,
    /// `values[stat][column]`; entries that cannot be computed are NaN.
    values: Vec<Vec<f64>>,
}

impl StatsTable {
    /// Assemble from per-column statistic vectors ordered as [`Statistic::ALL`].
    pub fn from_columns(columns: Vec<String>, per_column: &[[f64; 9]]) -> Self {
        let values = (0..Statistic::ALL.len())
            .map(|s| per_column.iter().map(|col| col[s]).collect())
            .collect();
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row(&self, stat: Statistic) -> &[f64] {
        &self.values[stat.position()]
    }

    pub fn get(&self, stat: Statistic, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.row(stat).get(idx).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (Statistic, &[f64])> {
        Statistic::ALL
            .iter()
            .zip(&self.values)
            .map(|(s, v)| (*s, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_keep_pulse_positions() {
        let mut t = FeatureTable::new(["x", "y"]);
        t.push(vec![1.0, 2.0]).unwrap();
        t.push_missing();
        t.push(vec![3.0, 4.0]).unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.missing(), 1);
        assert_eq!(t.column(1), vec![2.0, 4.0]);
        assert_eq!(t.get(2, "x"), Some(3.0));
        assert_eq!(t.get(1, "x"), None);
    }

    #[test]
    fn row_width_is_checked() {
        let mut t = FeatureTable::new(["x"]);
        assert!(t.push(vec![1.0, 2.0]).unwrap_err().is_fatal());
    }

    #[test]
    fn stats_table_is_indexed_by_statistic() {
        let mut a = [0.0; 9];
        a[Statistic::Iqr.position()] = 2.5;
        let s = StatsTable::from_columns(vec!["x".into()], &[a]);
        assert_eq!(s.get(Statistic::Iqr, "x"), Some(2.5));
        assert_eq!(s.rows().count(), 9);
        assert_eq!(
            serde_json::to_value(Statistic::Percentile25).unwrap(),
            "percentile_25"
        );
    }
}
