//! Small dense matrix helpers
//!
//! The covariance matrices here are at most a few dozen rows (one per scan
//! pair or per spot), so plain Gauss-Jordan with partial pivoting is plenty.

/// Invert a square matrix; `None` when (numerically) singular
pub(crate) fn invert(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    if a.iter().any(|row| row.len() != n) {
        return None;
    }

    // Augment with the identity
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        if m[pivot_row][col].abs() < 1e-300 {
            return None;
        }
        m.swap(col, pivot_row);

        let pivot = m[col][col];
        for j in 0..2 * n {
            m[col][j] /= pivot;
        }

        for row in 0..n {
            if row != col && m[row][col] != 0.0 {
                let factor = m[row][col];
                for j in 0..2 * n {
                    m[row][j] -= factor * m[col][j];
                }
            }
        }
    }

    Some(m.into_iter().map(|row| row[n..].to_vec()).collect())
}
