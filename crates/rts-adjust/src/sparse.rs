//! Sparse matrix assembly and the symmetric positive definite solver.

use crate::error::{AdjustError, AdjustResult};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix};
use rts_core::Real;

/// Triplet (row, col, value) builder for sparse matrices.
///
/// Duplicate entries are summed on conversion.
#[derive(Debug, Clone)]
pub struct SparseTriplets {
    nrows: usize,
    ncols: usize,
    entries: Vec<(usize, usize, Real)>,
}

impl SparseTriplets {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            entries: Vec::new(),
        }
    }

    pub fn with_capacity(nrows: usize, ncols: usize, capacity: usize) -> Self {
        Self {
            nrows,
            ncols,
            entries: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, row: usize, col: usize, value: Real) {
        debug_assert!(row < self.nrows && col < self.ncols);
        self.entries.push((row, col, value));
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Copy with every column `j` multiplied by `scale[j]` (right product with a diagonal).
    pub fn scale_columns(&self, scale: &DVector<Real>) -> Self {
        debug_assert_eq!(scale.len(), self.ncols);
        Self {
            nrows: self.nrows,
            ncols: self.ncols,
            entries: self
                .entries
                .iter()
                .map(|&(r, c, v)| (r, c, v * scale[c]))
                .collect(),
        }
    }

    pub fn to_csc(&self) -> CscMatrix<Real> {
        let mut coo = CooMatrix::new(self.nrows, self.ncols);
        for &(r, c, v) in &self.entries {
            coo.push(r, c, v);
        }
        CscMatrix::from(&coo)
    }

    /// Dense copy, for tests and diagnostics on small systems.
    pub fn to_dense(&self) -> DMatrix<Real> {
        let mut dense = DMatrix::zeros(self.nrows, self.ncols);
        for &(r, c, v) in &self.entries {
            dense[(r, c)] += v;
        }
        dense
    }
}

/// `y = S · x`
pub fn spmv(s: &CscMatrix<Real>, x: &DVector<Real>) -> DVector<Real> {
    debug_assert_eq!(s.ncols(), x.len());
    let mut y = DVector::zeros(s.nrows());
    for (j, col) in s.col_iter().enumerate() {
        let xj = x[j];
        if xj == 0.0 {
            continue;
        }
        for (&i, &v) in col.row_indices().iter().zip(col.values()) {
            y[i] += v * xj;
        }
    }
    y
}

/// `y = Sᵗ · x`
pub fn spmv_transpose(s: &CscMatrix<Real>, x: &DVector<Real>) -> DVector<Real> {
    debug_assert_eq!(s.nrows(), x.len());
    DVector::from_iterator(
        s.ncols(),
        s.col_iter().map(|col| {
            col.row_indices()
                .iter()
                .zip(col.values())
                .map(|(&i, &v)| v * x[i])
                .sum::<Real>()
        }),
    )
}

/// Sparse Cholesky factorisation of a symmetric positive definite matrix.
pub struct SparseSpdSolver {
    factor: CscCholesky<Real>,
    dim: usize,
}

impl SparseSpdSolver {
    pub fn factor(matrix: &CscMatrix<Real>) -> AdjustResult<Self> {
        let factor = CscCholesky::factor(matrix).map_err(|err| {
            AdjustError::DegenerateGeometry(format!(
                "sparse Cholesky of {}x{} matrix failed: {err:?}",
                matrix.nrows(),
                matrix.ncols()
            ))
        })?;
        Ok(Self {
            factor,
            dim: matrix.nrows(),
        })
    }

    /// Solve for all right-hand side columns at once.
    pub fn solve(&self, rhs: &DMatrix<Real>) -> DMatrix<Real> {
        debug_assert_eq!(rhs.nrows(), self.dim);
        self.factor.solve(rhs)
    }

    pub fn solve_vector(&self, rhs: &DVector<Real>) -> DVector<Real> {
        let rhs = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
        self.solve(&rhs).column(0).into_owned()
    }
}
