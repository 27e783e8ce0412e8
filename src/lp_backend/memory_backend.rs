use anyhow::Result;
use std::{collections::BTreeMap, ops::Range};

use crate::{
    exact_lp::exact_lp_error::ExactLpError,
    lp_backend::lp_backend::{LpBackend, NonzeroBatch},
    math::rational::Rational,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendColumn {
    pub name: String,
    pub obj: Rational,
    pub lb: Rational,
    pub ub: Rational,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendRow {
    pub name: String,
    pub lhs: Rational,
    pub rhs: Rational,
}

/// A modifying call received by a [`MemoryBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    AddColumns { count: usize, nnz: usize },
    AddRows { count: usize, nnz: usize },
    DeleteColumns(Range<usize>),
    DeleteRows(Range<usize>),
    ChangeObjective(Vec<usize>),
    ChangeBounds(Vec<usize>),
    ChangeSides(Vec<usize>),
}

/**
 * A backend that only stores what it is given. It records every modifying call and can be told
 * to fail the next one.
 */
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    columns: Vec<BackendColumn>,
    rows: Vec<BackendRow>,
    /// Nonzeros by (row position, column position).
    coefficients: BTreeMap<(usize, usize), Rational>,
    calls: Vec<BackendCall>,
    fail_next: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[BackendColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[BackendRow] {
        &self.rows
    }

    pub fn coefficient(&self, row: usize, col: usize) -> Option<&Rational> {
        self.coefficients.get(&(row, col))
    }

    pub fn nnz(&self) -> usize {
        self.coefficients.len()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Makes the next modifying call fail with the given message.
    pub fn fail_next_call(&mut self, message: impl Into<String>) {
        self.fail_next = Some(message.into());
    }

    fn begin(&mut self, call: BackendCall) -> Result<()> {
        if let Some(message) = self.fail_next.take() {
            log::debug!("memory backend fails {:?}", call);
            return Err(ExactLpError::BackendFailure { message }.into());
        }
        self.calls.push(call);
        Ok(())
    }
}

fn failure(message: String) -> anyhow::Error {
    ExactLpError::BackendFailure { message }.into()
}

fn check_lengths(what: &str, expected: usize, lengths: &[usize]) -> Result<()> {
    if lengths.iter().any(|len| *len != expected) {
        return Err(failure(format!(
            "{}: inconsistent input lengths {:?}, expected {}",
            what, lengths, expected
        )));
    }
    Ok(())
}

fn check_range(what: &str, range: &Range<usize>, len: usize) -> Result<()> {
    if range.start > range.end || range.end != len {
        return Err(failure(format!(
            "{}: range {:?} is not a tail of {} entries",
            what, range, len
        )));
    }
    Ok(())
}

fn check_positions(what: &str, positions: &[usize], len: usize) -> Result<()> {
    if let Some(pos) = positions.iter().find(|pos| **pos >= len) {
        return Err(failure(format!("{}: position {} out of range {}", what, pos, len)));
    }
    Ok(())
}

impl LpBackend for MemoryBackend {
    fn add_columns(
        &mut self,
        obj: &[Rational],
        lb: &[Rational],
        ub: &[Rational],
        names: &[String],
        nonzeros: &NonzeroBatch,
    ) -> Result<()> {
        self.begin(BackendCall::AddColumns {
            count: obj.len(),
            nnz: nonzeros.nnz(),
        })?;
        check_lengths(
            "add columns",
            obj.len(),
            &[lb.len(), ub.len(), names.len(), nonzeros.len()],
        )?;
        let first = self.columns.len();
        for i in 0..obj.len() {
            check_positions("add columns", nonzeros.vector_indices(i), self.rows.len())?;
            for (row, value) in nonzeros.vector_iter(i) {
                self.coefficients.insert((row, first + i), value.clone());
            }
            self.columns.push(BackendColumn {
                name: names[i].clone(),
                obj: obj[i].clone(),
                lb: lb[i].clone(),
                ub: ub[i].clone(),
            });
        }
        Ok(())
    }

    fn add_rows(
        &mut self,
        lhs: &[Rational],
        rhs: &[Rational],
        names: &[String],
        nonzeros: &NonzeroBatch,
    ) -> Result<()> {
        self.begin(BackendCall::AddRows {
            count: lhs.len(),
            nnz: nonzeros.nnz(),
        })?;
        check_lengths(
            "add rows",
            lhs.len(),
            &[rhs.len(), names.len(), nonzeros.len()],
        )?;
        let first = self.rows.len();
        for i in 0..lhs.len() {
            check_positions("add rows", nonzeros.vector_indices(i), self.columns.len())?;
            for (col, value) in nonzeros.vector_iter(i) {
                self.coefficients.insert((first + i, col), value.clone());
            }
            self.rows.push(BackendRow {
                name: names[i].clone(),
                lhs: lhs[i].clone(),
                rhs: rhs[i].clone(),
            });
        }
        Ok(())
    }

    fn delete_columns(&mut self, range: Range<usize>) -> Result<()> {
        self.begin(BackendCall::DeleteColumns(range.clone()))?;
        check_range("delete columns", &range, self.columns.len())?;
        self.columns.truncate(range.start);
        self.coefficients.retain(|(_, col), _| *col < range.start);
        Ok(())
    }

    fn delete_rows(&mut self, range: Range<usize>) -> Result<()> {
        self.begin(BackendCall::DeleteRows(range.clone()))?;
        check_range("delete rows", &range, self.rows.len())?;
        self.rows.truncate(range.start);
        self.coefficients.retain(|(row, _), _| *row < range.start);
        Ok(())
    }

    fn change_objective(&mut self, positions: &[usize], obj: &[Rational]) -> Result<()> {
        self.begin(BackendCall::ChangeObjective(positions.to_vec()))?;
        check_lengths("change objective", positions.len(), &[obj.len()])?;
        check_positions("change objective", positions, self.columns.len())?;
        for (pos, value) in positions.iter().zip(obj) {
            self.columns[*pos].obj = value.clone();
        }
        Ok(())
    }

    fn change_bounds(&mut self, positions: &[usize], lb: &[Rational], ub: &[Rational]) -> Result<()> {
        self.begin(BackendCall::ChangeBounds(positions.to_vec()))?;
        check_lengths("change bounds", positions.len(), &[lb.len(), ub.len()])?;
        check_positions("change bounds", positions, self.columns.len())?;
        for ((pos, lb), ub) in positions.iter().zip(lb).zip(ub) {
            let column = &mut self.columns[*pos];
            column.lb = lb.clone();
            column.ub = ub.clone();
        }
        Ok(())
    }

    fn change_sides(
        &mut self,
        positions: &[usize],
        lhs: &[Rational],
        rhs: &[Rational],
    ) -> Result<()> {
        self.begin(BackendCall::ChangeSides(positions.to_vec()))?;
        check_lengths("change sides", positions.len(), &[lhs.len(), rhs.len()])?;
        check_positions("change sides", positions, self.rows.len())?;
        for ((pos, lhs), rhs) in positions.iter().zip(lhs).zip(rhs) {
            let row = &mut self.rows[*pos];
            row.lhs = lhs.clone();
            row.rhs = rhs.clone();
        }
        Ok(())
    }

    fn column_count(&self) -> Result<usize> {
        Ok(self.columns.len())
    }

    fn row_count(&self) -> Result<usize> {
        Ok(self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        exact_lp::exact_lp_error::ExactLpError,
        lp_backend::{
            lp_backend::{LpBackend, NonzeroBatch},
            memory_backend::{BackendCall, MemoryBackend},
        },
    };

    #[test]
    fn stores_columns_and_rows() {
        let mut backend = MemoryBackend::new();
        let mut empty = NonzeroBatch::new();
        empty.seal_vector();
        empty.seal_vector();
        backend
            .add_columns(
                &[r!(1), r!(2)],
                &[r!(0), r!(0)],
                &[r!(1), r!(5)],
                &["x".to_string(), "y".to_string()],
                &empty,
            )
            .unwrap();

        let mut rows = NonzeroBatch::new();
        rows.push(0, r!(3));
        rows.push(1, r!(4));
        rows.seal_vector();
        backend
            .add_rows(&[r!(0)], &[r!(10)], &["c".to_string()], &rows)
            .unwrap();
        assert_eq!(backend.coefficient(0, 1), Some(&r!(4)));
        assert_eq!(backend.column_count().unwrap(), 2);

        backend.delete_columns(1..2).unwrap();
        assert_eq!(backend.nnz(), 1);
        assert_eq!(backend.columns()[0].name, "x");
        assert_eq!(backend.calls().len(), 3);
        assert_eq!(backend.calls()[2], BackendCall::DeleteColumns(1..2));
    }

    #[test]
    fn rejects_bad_positions() {
        let mut backend = MemoryBackend::new();
        assert!(backend.change_bounds(&[0], &[r!(0)], &[r!(1)]).is_err());
        assert!(backend.delete_rows(0..1).is_err());
    }

    #[test]
    fn injected_failure() {
        let mut backend = MemoryBackend::new();
        backend.fail_next_call("solver crashed");
        let err = backend.delete_rows(0..0).unwrap_err();
        assert_eq!(
            ExactLpError::kind_of(&err),
            Some(&ExactLpError::BackendFailure {
                message: "solver crashed".to_string()
            })
        );
        assert!(backend.calls().is_empty());
        backend.delete_rows(0..0).unwrap();
    }
}
