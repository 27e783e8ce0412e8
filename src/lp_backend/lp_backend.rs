use anyhow::Result;
use std::ops::Range;

use crate::math::rational::Rational;

/**
 * The nonzeros of a batch of columns (or rows) handed to the backend, stored vector by vector:
 * the entries of vector `i` are `indices[indptr[i]..indptr[i + 1]]` with matching `data`.
 */
#[derive(Clone, Debug)]
pub struct NonzeroBatch {
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<Rational>,
}

impl NonzeroBatch {
    pub fn new() -> Self {
        Self {
            indptr: vec![0],
            indices: vec![],
            data: vec![],
        }
    }

    /// Number of sealed vectors.
    pub fn len(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Adds a nonzero to the vector currently being built.
    pub fn push(&mut self, index: usize, value: Rational) {
        self.indices.push(index);
        self.data.push(value);
    }

    /// Finishes the vector currently being built.
    pub fn seal_vector(&mut self) {
        self.indptr.push(self.indices.len())
    }

    /// Start of each vector in the flat arrays.
    pub fn starts(&self) -> &[usize] {
        &self.indptr[..self.len()]
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn data(&self) -> &[Rational] {
        &self.data
    }

    pub fn vector_indices(&self, i: usize) -> &[usize] {
        &self.indices[self.indptr[i]..self.indptr[i + 1]]
    }

    pub fn vector_data(&self, i: usize) -> &[Rational] {
        &self.data[self.indptr[i]..self.indptr[i + 1]]
    }

    pub fn vector_iter(&self, i: usize) -> impl Iterator<Item = (usize, &Rational)> {
        self.vector_indices(i)
            .iter()
            .copied()
            .zip(self.vector_data(i))
    }
}

impl Default for NonzeroBatch {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The exact LP solver that holds the flushed state of an exact LP.
 *
 * Positions are backend positions: columns and rows are appended at the end and deleted from the
 * end, so the positions of the remaining ones stay valid. Sides are passed with the row constant
 * already removed. Implementations report failures as [`ExactLpError::BackendFailure`].
 *
 * [`ExactLpError::BackendFailure`]: crate::exact_lp::exact_lp_error::ExactLpError::BackendFailure
 */
pub trait LpBackend {
    /// Appends columns; `nonzeros` holds one vector of row positions per column.
    fn add_columns(
        &mut self,
        obj: &[Rational],
        lb: &[Rational],
        ub: &[Rational],
        names: &[String],
        nonzeros: &NonzeroBatch,
    ) -> Result<()>;

    /// Appends rows; `nonzeros` holds one vector of column positions per row.
    fn add_rows(
        &mut self,
        lhs: &[Rational],
        rhs: &[Rational],
        names: &[String],
        nonzeros: &NonzeroBatch,
    ) -> Result<()>;

    fn delete_columns(&mut self, range: Range<usize>) -> Result<()>;

    fn delete_rows(&mut self, range: Range<usize>) -> Result<()>;

    fn change_objective(&mut self, positions: &[usize], obj: &[Rational]) -> Result<()>;

    fn change_bounds(&mut self, positions: &[usize], lb: &[Rational], ub: &[Rational]) -> Result<()>;

    fn change_sides(&mut self, positions: &[usize], lhs: &[Rational], rhs: &[Rational])
    -> Result<()>;

    fn column_count(&self) -> Result<usize>;

    fn row_count(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use crate::lp_backend::lp_backend::NonzeroBatch;

    #[test]
    fn batch_vectors() {
        let mut batch = NonzeroBatch::new();
        batch.push(2, r!(1));
        batch.push(0, r!(-3));
        batch.seal_vector();
        batch.seal_vector();
        batch.push(1, r!(1, 2));
        batch.seal_vector();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.nnz(), 3);
        assert_eq!(batch.starts(), &[0, 2, 2]);
        assert_eq!(batch.vector_indices(0), &[2, 0]);
        assert!(batch.vector_data(1).is_empty());
        assert_eq!(
            batch.vector_iter(2).collect::<Vec<_>>(),
            vec![(1, &r!(1, 2))]
        );
    }
}
