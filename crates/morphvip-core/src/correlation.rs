//! Correlation engine: the sample-by-sample matrix and sub-matrix extraction.
//!
//! Extraction always copies; the source matrix is never modified. Sample sets are
//! plain matrix row indices, resolved once from identifiers by [`crate::Dataset`].

use morphvip_stats::median;
use std::cmp::Ordering;

use crate::error::{Result, VipError};

// ---------------------------------------------------------------------------
// Full matrix
// ---------------------------------------------------------------------------

/// Dense symmetric matrix of pairwise Pearson correlations between samples.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    ids: Vec<String>,
    values: Vec<f64>,
}

impl CorrelationMatrix {
    /// Build from identifiers and row vectors. Fails unless the rows form an
    /// `ids.len()` square.
    pub fn new(ids: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        if ids.len() != n {
            return Err(VipError::MatrixNotSquare {
                rows: n,
                cols: ids.len(),
            });
        }
        let mut values = Vec::with_capacity(n * n);
        for row in rows {
            if row.len() != n {
                return Err(VipError::MatrixNotSquare {
                    rows: n,
                    cols: row.len(),
                });
            }
            values.extend(row);
        }
        Ok(Self { ids, values })
    }

    /// Pearson correlation between every pair of profile rows.
    ///
    /// A constant profile has no variance; its correlations are NaN.
    pub fn from_profiles(ids: Vec<String>, profiles: &[Vec<f64>]) -> Result<Self> {
        let n = profiles.len();
        if ids.len() != n {
            return Err(VipError::ShapeMismatch {
                expected: n,
                got: ids.len(),
            });
        }
        let width = profiles.first().map_or(0, |p| p.len());
        let mut centered: Vec<Vec<f64>> = Vec::with_capacity(n);
        let mut norms = Vec::with_capacity(n);
        for profile in profiles {
            if profile.len() != width {
                return Err(VipError::ShapeMismatch {
                    expected: width,
                    got: profile.len(),
                });
            }
            let mean = profile.iter().sum::<f64>() / width.max(1) as f64;
            let c: Vec<f64> = profile.iter().map(|v| v - mean).collect();
            norms.push(c.iter().map(|v| v * v).sum::<f64>().sqrt());
            centered.push(c);
        }

        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in i..n {
                let dot: f64 = centered[i]
                    .iter()
                    .zip(&centered[j])
                    .map(|(a, b)| a * b)
                    .sum();
                let denom = norms[i] * norms[j];
                let r = if denom > 0.0 {
                    (dot / denom).clamp(-1.0, 1.0)
                } else {
                    f64::NAN
                };
                values[i * n + j] = r;
                values[j * n + i] = r;
            }
        }
        Ok(Self { ids, values })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.len() + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.len();
        &self.values[i * n..(i + 1) * n]
    }

    /// Largest `|m[i][j] - m[j][i]|`; zero for a well-formed matrix.
    pub fn max_asymmetry(&self) -> f64 {
        let n = self.len();
        let mut worst = 0.0_f64;
        for i in 0..n {
            for j in (i + 1)..n {
                worst = worst.max((self.get(i, j) - self.get(j, i)).abs());
            }
        }
        worst
    }

    fn check(&self, indices: &[usize]) -> Result<()> {
        match indices.iter().find(|&&i| i >= self.len()) {
            Some(&index) => Err(VipError::IndexOutOfRange {
                index,
                len: self.len(),
            }),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Sub-matrices
// ---------------------------------------------------------------------------

/// Row-major copy of `rows × cols` entries selected from a [`CorrelationMatrix`].
#[derive(Debug, Clone, PartialEq)]
pub struct SubMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl SubMatrix {
    /// Build from explicit rows; all rows must have equal length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.len());
        let mut values = Vec::with_capacity(rows.len() * cols);
        let n_rows = rows.len();
        for row in rows {
            if row.len() != cols {
                return Err(VipError::ShapeMismatch {
                    expected: cols,
                    got: row.len(),
                });
            }
            values.extend(row);
        }
        Ok(Self {
            rows: n_rows,
            cols,
            values,
        })
    }

    /// Concatenate row-wise. All parts must share a column count.
    pub fn vstack(parts: &[SubMatrix]) -> Result<Self> {
        let Some(first) = parts.first() else {
            return Err(VipError::insufficient("row stacking", 1, 0));
        };
        let cols = first.cols;
        let mut values = Vec::with_capacity(parts.iter().map(|p| p.values.len()).sum());
        let mut rows = 0;
        for part in parts {
            if part.cols != cols {
                return Err(VipError::ShapeMismatch {
                    expected: cols,
                    got: part.cols,
                });
            }
            values.extend_from_slice(&part.values);
            rows += part.rows;
        }
        Ok(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.cols + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.cols..(i + 1) * self.cols]
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        (0..self.rows).map(|i| self.get(i, j)).collect()
    }

    /// All entries, row-major.
    pub fn flatten(&self) -> &[f64] {
        &self.values
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.rows.min(self.cols)).map(|i| self.get(i, i)).collect()
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        if self.rows != self.cols {
            return false;
        }
        (0..self.rows).all(|i| {
            ((i + 1)..self.cols).all(|j| (self.get(i, j) - self.get(j, i)).abs() <= tol)
        })
    }

    /// Entries strictly above the diagonal, row by row.
    pub fn upper_triangle(&self) -> Vec<f64> {
        let mut out = Vec::new();
        for i in 0..self.rows {
            for j in (i + 1)..self.cols {
                out.push(self.get(i, j));
            }
        }
        out
    }

    /// Median of each row.
    pub fn row_medians(&self) -> Vec<f64> {
        (0..self.rows).map(|i| median(self.row(i))).collect()
    }

    /// Median of each column.
    pub fn column_medians(&self) -> Vec<f64> {
        (0..self.cols).map(|j| median(&self.column(j))).collect()
    }
}

/// Rows and columns for one index set. The set must not contain duplicates.
pub fn symmetric_submatrix(indices: &[usize], matrix: &CorrelationMatrix) -> Result<SubMatrix> {
    rectangular_submatrix(indices, indices, matrix)
}

/// Rows from `rows`, columns from `cols`.
pub fn rectangular_submatrix(
    rows: &[usize],
    cols: &[usize],
    matrix: &CorrelationMatrix,
) -> Result<SubMatrix> {
    if rows.is_empty() || cols.is_empty() {
        return Err(VipError::insufficient(
            "sub-matrix extraction",
            1,
            rows.len().min(cols.len()),
        ));
    }
    matrix.check(rows)?;
    matrix.check(cols)?;
    let mut values = Vec::with_capacity(rows.len() * cols.len());
    for &i in rows {
        let row = matrix.row(i);
        values.extend(cols.iter().map(|&j| row[j]));
    }
    Ok(SubMatrix {
        rows: rows.len(),
        cols: cols.len(),
        values,
    })
}

/// Per-column value at sorted position `floor((n-1)/2)`.
///
/// On a self-correlation matrix the diagonal is each column's maximum and sorts
/// to the last position, so it never lands on the selected index for n > 1.
pub fn median_row(matrix: &SubMatrix) -> Vec<f64> {
    let n = matrix.rows();
    if n == 0 {
        return Vec::new();
    }
    let idx = (n - 1) / 2;
    (0..matrix.cols())
        .map(|j| {
            let mut col = matrix.column(j);
            col.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            col[idx]
        })
        .collect()
}

/// Median of the upper triangle of a group's self-correlation matrix.
pub fn median_correlation(indices: &[usize], matrix: &CorrelationMatrix) -> Result<f64> {
    if indices.len() < 2 {
        return Err(VipError::insufficient(
            "self-correlation median",
            2,
            indices.len(),
        ));
    }
    let sub = symmetric_submatrix(indices, matrix)?;
    Ok(median(&sub.upper_triangle()))
}
