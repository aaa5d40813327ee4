//! Ridge regression over label-encoded promotion features.

use crate::data::{CellValue, ColumnKind, PromotionTable, QUARTER_COLUMN};
use crate::errors::{PromoError, Result};
use crate::ml::scenario::Scenario;

/// Columns never used as features; `Quarter` is derived at load time
const EXCLUDED_FEATURES: [&str; 3] = ["Start_Prom", "End_Prom", QUARTER_COLUMN];

/// Below this many rows the model is scored on its training data
const MIN_ROWS_FOR_HOLDOUT: usize = 10;

const RIDGE_ALPHA: f64 = 1.0;

#[derive(Debug, Clone)]
enum FeatureEncoding {
    Numeric,
    /// Sorted distinct values; a value encodes to its position
    Categorical(Vec<String>),
}

#[derive(Debug, Clone)]
struct Feature {
    name: String,
    encoding: FeatureEncoding,
    /// Mean of the encoded column, used to fill gaps
    fill: f64,
}

impl Feature {
    fn encode(&self, cell: &CellValue) -> Option<f64> {
        match (&self.encoding, cell) {
            (_, CellValue::Null) => None,
            (FeatureEncoding::Numeric, CellValue::Number(n)) => Some(*n),
            (FeatureEncoding::Numeric, CellValue::Text(s)) => s.trim().parse().ok(),
            (FeatureEncoding::Categorical(categories), other) => {
                let text = other.to_string();
                Some(
                    categories
                        .binary_search(&text)
                        .map(|i| i as f64)
                        .unwrap_or(-1.0),
                )
            }
        }
    }
}

/// Ridge model fitted on standardized features
#[derive(Debug, Clone)]
pub struct RidgeModel {
    weights: Vec<f64>,
    intercept: f64,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl RidgeModel {
    pub fn fit(x: &[Vec<f64>], y: &[f64], alpha: f64) -> Result<Self> {
        let n = x.len();
        if n == 0 || n != y.len() {
            return Err(PromoError::Training("no training rows".to_string()));
        }
        let p = x[0].len();

        let means: Vec<f64> = (0..p).map(|j| x.iter().map(|r| r[j]).sum::<f64>() / n as f64).collect();
        let scales: Vec<f64> = (0..p)
            .map(|j| {
                let var = x.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n as f64;
                if var > 1e-12 { var.sqrt() } else { 1.0 }
            })
            .collect();
        let y_mean = y.iter().sum::<f64>() / n as f64;

        let z: Vec<Vec<f64>> = x
            .iter()
            .map(|r| (0..p).map(|j| (r[j] - means[j]) / scales[j]).collect())
            .collect();

        // (ZᵀZ + αI) w = Zᵀ(y - ȳ)
        let mut gram = vec![vec![0.0; p]; p];
        let mut rhs = vec![0.0; p];
        for (row, target) in z.iter().zip(y) {
            let centered = target - y_mean;
            for i in 0..p {
                rhs[i] += row[i] * centered;
                for j in i..p {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                gram[i][j] = gram[j][i];
            }
            gram[i][i] += alpha;
        }

        let weights = solve(gram, rhs)?;
        Ok(Self {
            weights,
            intercept: y_mean,
            means,
            scales,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.weights
            .iter()
            .enumerate()
            .map(|(j, w)| w * (row[j] - self.means[j]) / self.scales[j])
            .sum::<f64>()
            + self.intercept
    }

    /// Standardized weights; magnitudes are comparable across features
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(PromoError::Training("singular system".to_string()));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

pub fn r_squared(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = actual.iter().zip(predicted).map(|(y, p)| (y - p).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// A model trained for one target column, ready to score scenarios
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub target: String,
    features: Vec<Feature>,
    model: RidgeModel,
    pub r2: f64,
    /// True when `r2` comes from held-out rows
    pub holdout: bool,
    pub training_rows: usize,
}

impl TrainedModel {
    pub fn train(table: &PromotionTable, target: &str) -> Result<Self> {
        let target_idx = table
            .column_index(target)
            .ok_or_else(|| PromoError::Training(format!("target column '{}' not found", target)))?;

        let rows: Vec<usize> = (0..table.len())
            .filter(|&r| table.rows[r][target_idx].as_f64().is_some())
            .collect();
        if rows.len() < 3 {
            return Err(PromoError::Training(format!(
                "only {} rows have a value for '{}'",
                rows.len(),
                target
            )));
        }

        let feature_columns: Vec<usize> = table
            .columns
            .iter()
            .enumerate()
            .filter(|(i, c)| *i != target_idx && !EXCLUDED_FEATURES.contains(&c.name.as_str()))
            .map(|(i, _)| i)
            .collect();
        if feature_columns.is_empty() {
            return Err(PromoError::Training("no feature columns".to_string()));
        }

        let mut features: Vec<Feature> = feature_columns
            .iter()
            .map(|&idx| {
                let column = &table.columns[idx];
                let encoding = match column.kind {
                    ColumnKind::Number => FeatureEncoding::Numeric,
                    ColumnKind::Text => {
                        let mut categories: Vec<String> = rows
                            .iter()
                            .filter_map(|&r| table.rows[r][idx].as_text().map(str::to_string))
                            .collect();
                        categories.sort();
                        categories.dedup();
                        FeatureEncoding::Categorical(categories)
                    }
                };
                Feature {
                    name: column.name.clone(),
                    encoding,
                    fill: 0.0,
                }
            })
            .collect();

        let encoded: Vec<Vec<Option<f64>>> = rows
            .iter()
            .map(|&r| {
                feature_columns
                    .iter()
                    .zip(&features)
                    .map(|(&idx, f)| f.encode(&table.rows[r][idx]))
                    .collect()
            })
            .collect();

        for (j, feature) in features.iter_mut().enumerate() {
            let present: Vec<f64> = encoded.iter().filter_map(|r| r[j]).collect();
            feature.fill = if present.is_empty() {
                0.0
            } else {
                present.iter().sum::<f64>() / present.len() as f64
            };
        }

        let x: Vec<Vec<f64>> = encoded
            .iter()
            .map(|r| r.iter().zip(&features).map(|(v, f)| v.unwrap_or(f.fill)).collect())
            .collect();
        let y: Vec<f64> = rows
            .iter()
            .filter_map(|&r| table.rows[r][target_idx].as_f64())
            .collect();

        let (r2, holdout) = if x.len() >= MIN_ROWS_FOR_HOLDOUT {
            // Deterministic 80/20 split: every fifth row is held out
            let (mut train_x, mut train_y, mut test_x, mut test_y) = (vec![], vec![], vec![], vec![]);
            for (i, (row, target)) in x.iter().zip(&y).enumerate() {
                if i % 5 == 4 {
                    test_x.push(row.clone());
                    test_y.push(*target);
                } else {
                    train_x.push(row.clone());
                    train_y.push(*target);
                }
            }
            let model = RidgeModel::fit(&train_x, &train_y, RIDGE_ALPHA)?;
            let predicted: Vec<f64> = test_x.iter().map(|r| model.predict(r)).collect();
            (r_squared(&test_y, &predicted), true)
        } else {
            let model = RidgeModel::fit(&x, &y, RIDGE_ALPHA)?;
            let predicted: Vec<f64> = x.iter().map(|r| model.predict(r)).collect();
            (r_squared(&y, &predicted), false)
        };

        let model = RidgeModel::fit(&x, &y, RIDGE_ALPHA)?;
        log::info!(
            "[ML_TOOL] Trained ridge model for '{}' on {} rows x {} features (R²={:.3}, {})",
            target,
            x.len(),
            features.len(),
            r2,
            if holdout { "holdout" } else { "training" }
        );

        Ok(Self {
            target: target.to_string(),
            features,
            model,
            r2,
            holdout,
            training_rows: x.len(),
        })
    }

    /// Score a scenario; unknown categories encode to -1, missing features take the mean
    pub fn predict(&self, scenario: &Scenario) -> f64 {
        let row: Vec<f64> = self
            .features
            .iter()
            .map(|f| match scenario.get(&f.name) {
                Some(cell) => f.encode(cell).unwrap_or(f.fill),
                None => f.fill,
            })
            .collect();
        self.model.predict(&row)
    }

    /// Features with the largest standardized weights
    pub fn top_features(&self, n: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .features
            .iter()
            .zip(self.model.weights())
            .map(|(f, w)| (f.name.clone(), *w))
            .collect();
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        ranked.truncate(n);
        ranked
    }
}
