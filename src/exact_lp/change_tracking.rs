use anyhow::Result;
use logging_timer::timer;

use crate::{
    exact_lp::{
        exact_column::ColId,
        exact_lp::ExactLp,
        exact_lp_error::ensure_size,
        exact_row::RowId,
    },
    lp_backend::lp_backend::{LpBackend, NonzeroBatch},
    math::{rational::Rational, traits::Infinite},
};

impl ExactLp {
    /**
     * Records that the nonzero of `col` in `row` changed.
     *
     * If both are in the backend, the change is attributed to one of them: to an entity that is
     * already at or above its watermark, or else to the one closer to its watermark, whose
     * watermark is then lowered to it. Ties go to the row. The row's cached activities are
     * dropped in any case.
     */
    pub(crate) fn coef_changed(&mut self, row: RowId, col: ColId) {
        let row_lpipos = self.row_store[row].lpipos;
        let col_lpipos = self.col_store[col].lpipos;
        if let (Some(rpos), Some(cpos)) = (row_lpipos, col_lpipos) {
            if rpos >= self.lpi_first_chg_row {
                self.row_store[row].coef_changed = true;
            } else if cpos >= self.lpi_first_chg_col {
                self.col_store[col].coef_changed = true;
            } else if self.lpi_first_chg_row - rpos <= self.lpi_first_chg_col - cpos {
                self.row_store[row].coef_changed = true;
                self.lpi_first_chg_row = rpos;
            } else {
                self.col_store[col].coef_changed = true;
                self.lpi_first_chg_col = cpos;
            }
            self.flushed = false;
        }
        self.row_store[row].invalidate_activities();
    }

    /// Puts a backend column on the change worklist unless it is already there.
    pub(crate) fn insert_col_chg(&mut self, col: ColId) -> Result<()> {
        let column = &self.col_store[col];
        if !column.obj_changed && !column.lb_changed && !column.ub_changed {
            ensure_size(&mut self.chg_cols, 1, "changed columns")?;
            self.chg_cols.push(col);
        }
        self.flushed = false;
        Ok(())
    }

    /// Marks sides of a row as changed, putting a backend row on the change worklist.
    pub(crate) fn row_side_changed(&mut self, row: RowId, lhs: bool, rhs: bool) -> Result<()> {
        let r = &self.row_store[row];
        if r.lpipos.is_some() && (lhs || rhs) {
            if !r.lhs_changed && !r.rhs_changed {
                ensure_size(&mut self.chg_rows, 1, "changed rows")?;
                self.chg_rows.push(row);
            }
            let r = &mut self.row_store[row];
            r.lhs_changed |= lhs;
            r.rhs_changed |= rhs;
            self.flushed = false;
        }
        Ok(())
    }

    /**
     * Brings the backend in sync with the LP.
     *
     * Order: delete stale columns, delete stale rows, push changed objective coefficients and
     * bounds, push changed sides, add new columns, add new rows. Does nothing if the LP is
     * already flushed.
     *
     * On error the LP no longer matches the backend and must not be flushed again.
     */
    pub fn flush(&mut self, backend: &mut dyn LpBackend) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        let _tmr = timer!("FLUSH_EXACT_LP");
        log::debug!(
            "flush exact LP <{}>: {} columns ({} in backend, first change {}), {} rows ({} in backend, first change {})",
            self.name,
            self.cols.len(),
            self.lpi_cols.len(),
            self.lpi_first_chg_col,
            self.rows.len(),
            self.lpi_rows.len(),
            self.lpi_first_chg_row
        );

        self.flush_delete_columns(backend)?;
        self.flush_delete_rows(backend)?;
        self.flush_changed_columns(backend)?;
        self.flush_changed_rows(backend)?;
        self.flush_add_columns(backend)?;
        self.flush_add_rows(backend)?;

        self.flushed = true;

        debug_assert_eq!(self.lpi_cols.len(), self.cols.len());
        debug_assert_eq!(self.lpi_rows.len(), self.rows.len());
        debug_assert!(self.chg_cols.is_empty() && self.chg_rows.is_empty());
        if cfg!(debug_assertions) {
            assert_eq!(backend.column_count()?, self.lpi_cols.len());
            assert_eq!(backend.row_count()?, self.lpi_rows.len());
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// Number of backend columns from the watermark on that still agree with the LP.
    fn unchanged_column_prefix(&self) -> usize {
        let mut pos = self.lpi_first_chg_col;
        while pos < self.lpi_cols.len() {
            let col = &self.col_store[self.lpi_cols[pos]];
            if col.lppos != Some(pos) || col.coef_changed {
                break;
            }
            pos += 1;
        }
        pos
    }

    fn unchanged_row_prefix(&self) -> usize {
        let mut pos = self.lpi_first_chg_row;
        while pos < self.lpi_rows.len() {
            let row = &self.row_store[self.lpi_rows[pos]];
            if row.lppos != Some(pos) || row.coef_changed {
                break;
            }
            pos += 1;
        }
        pos
    }

    fn flush_delete_columns(&mut self, backend: &mut dyn LpBackend) -> Result<()> {
        let keep = self.unchanged_column_prefix();
        if keep < self.lpi_cols.len() {
            log::debug!(
                "delete columns {}..{} from the backend",
                keep,
                self.lpi_cols.len()
            );
            backend.delete_columns(keep..self.lpi_cols.len())?;
            for col in self.lpi_cols.drain(keep..) {
                let column = &mut self.col_store[col];
                column.lpipos = None;
                column.coef_changed = false;
            }
            self.solved = false;
        }
        self.lpi_first_chg_col = self.lpi_cols.len();
        Ok(())
    }

    fn flush_delete_rows(&mut self, backend: &mut dyn LpBackend) -> Result<()> {
        let keep = self.unchanged_row_prefix();
        if keep < self.lpi_rows.len() {
            log::debug!(
                "delete rows {}..{} from the backend",
                keep,
                self.lpi_rows.len()
            );
            backend.delete_rows(keep..self.lpi_rows.len())?;
            let removed: Vec<RowId> = self.lpi_rows.drain(keep..).collect();
            for row in removed {
                let r = &mut self.row_store[row];
                r.lpipos = None;
                r.coef_changed = false;
                r.valid_activity_lp = None;
                self.release_row(row)?;
            }
            self.solved = false;
        }
        self.lpi_first_chg_row = self.lpi_rows.len();
        Ok(())
    }

    /// Pushes the objective coefficients and bounds that differ from what the backend holds.
    fn flush_changed_columns(&mut self, backend: &mut dyn LpBackend) -> Result<()> {
        let mut obj_positions = vec![];
        let mut objs = vec![];
        let mut bound_positions = vec![];
        let mut lbs = vec![];
        let mut ubs = vec![];

        for col in std::mem::take(&mut self.chg_cols) {
            let column = &mut self.col_store[col];
            if let Some(lpipos) = column.lpipos {
                if column.obj_changed && column.flushed_obj != column.obj {
                    obj_positions.push(lpipos);
                    objs.push(column.obj.clone());
                    column.flushed_obj = column.obj.clone();
                }
                if (column.lb_changed || column.ub_changed)
                    && (column.flushed_lb != column.lb || column.flushed_ub != column.ub)
                {
                    bound_positions.push(lpipos);
                    lbs.push(column.lb.clone());
                    ubs.push(column.ub.clone());
                    column.flushed_lb = column.lb.clone();
                    column.flushed_ub = column.ub.clone();
                }
            }
            column.obj_changed = false;
            column.lb_changed = false;
            column.ub_changed = false;
        }

        if !obj_positions.is_empty() {
            log::debug!("change {} objective coefficients in the backend", objs.len());
            backend.change_objective(&obj_positions, &objs)?;
            self.solved = false;
        }
        if !bound_positions.is_empty() {
            log::debug!("change bounds of {} columns in the backend", lbs.len());
            backend.change_bounds(&bound_positions, &lbs, &ubs)?;
            self.solved = false;
        }
        Ok(())
    }

    fn flush_changed_rows(&mut self, backend: &mut dyn LpBackend) -> Result<()> {
        let mut positions = vec![];
        let mut lhss = vec![];
        let mut rhss = vec![];

        for row in std::mem::take(&mut self.chg_rows) {
            let r = &mut self.row_store[row];
            if let Some(lpipos) = r.lpipos {
                let lhs = backend_side(&r.lhs, &r.constant);
                let rhs = backend_side(&r.rhs, &r.constant);
                if (r.lhs_changed || r.rhs_changed) && (r.flushed_lhs != lhs || r.flushed_rhs != rhs)
                {
                    positions.push(lpipos);
                    lhss.push(lhs.clone());
                    rhss.push(rhs.clone());
                    r.flushed_lhs = lhs;
                    r.flushed_rhs = rhs;
                }
            }
            r.lhs_changed = false;
            r.rhs_changed = false;
        }

        if !positions.is_empty() {
            log::debug!("change sides of {} rows in the backend", positions.len());
            backend.change_sides(&positions, &lhss, &rhss)?;
            self.solved = false;
        }
        Ok(())
    }

    fn flush_add_columns(&mut self, backend: &mut dyn LpBackend) -> Result<()> {
        let first = self.lpi_cols.len();
        let count = self.cols.len() - first;
        if count == 0 {
            return Ok(());
        }
        ensure_size(&mut self.lpi_cols, count, "backend columns")?;

        let mut objs = Vec::with_capacity(count);
        let mut lbs = Vec::with_capacity(count);
        let mut ubs = Vec::with_capacity(count);
        let mut names = Vec::with_capacity(count);
        let mut nonzeros = NonzeroBatch::new();

        for pos in first..self.cols.len() {
            let col = self.cols[pos];
            debug_assert_eq!(self.col_store[col].lppos, Some(pos));
            debug_assert_eq!(self.col_store[col].lpipos, None);
            self.col_link(col)?;

            let column = &mut self.col_store[col];
            column.lpipos = Some(pos);
            column.flushed_obj = column.obj.clone();
            column.flushed_lb = column.lb.clone();
            column.flushed_ub = column.ub.clone();
            column.obj_changed = false;
            column.lb_changed = false;
            column.ub_changed = false;
            column.coef_changed = false;
            objs.push(column.obj.clone());
            lbs.push(column.lb.clone());
            ubs.push(column.ub.clone());
            names.push(column.name.clone());

            for entry in &column.entries[..column.nlprows] {
                if let Some(rpos) = self.row_store[entry.row].lpipos {
                    nonzeros.push(rpos, entry.value.clone());
                }
            }
            nonzeros.seal_vector();
            self.lpi_cols.push(col);
        }

        log::debug!(
            "add {} columns with {} nonzeros to the backend",
            count,
            nonzeros.nnz()
        );
        backend.add_columns(&objs, &lbs, &ubs, &names, &nonzeros)?;
        self.lpi_first_chg_col = self.lpi_cols.len();
        self.solved = false;
        Ok(())
    }

    fn flush_add_rows(&mut self, backend: &mut dyn LpBackend) -> Result<()> {
        let first = self.lpi_rows.len();
        let count = self.rows.len() - first;
        if count == 0 {
            return Ok(());
        }
        ensure_size(&mut self.lpi_rows, count, "backend rows")?;

        let mut lhss = Vec::with_capacity(count);
        let mut rhss = Vec::with_capacity(count);
        let mut names = Vec::with_capacity(count);
        let mut nonzeros = NonzeroBatch::new();

        for pos in first..self.rows.len() {
            let row = self.rows[pos];
            debug_assert_eq!(self.row_store[row].lppos, Some(pos));
            debug_assert_eq!(self.row_store[row].lpipos, None);
            self.row_link(row)?;

            let r = &mut self.row_store[row];
            r.lpipos = Some(pos);
            r.nuses += 1;
            r.flushed_lhs = backend_side(&r.lhs, &r.constant);
            r.flushed_rhs = backend_side(&r.rhs, &r.constant);
            r.lhs_changed = false;
            r.rhs_changed = false;
            r.coef_changed = false;
            lhss.push(r.flushed_lhs.clone());
            rhss.push(r.flushed_rhs.clone());
            names.push(r.name.clone());

            for entry in &r.entries[..r.nlpcols] {
                if let Some(cpos) = self.col_store[entry.column].lpipos {
                    nonzeros.push(cpos, entry.value.clone());
                }
            }
            nonzeros.seal_vector();
            self.lpi_rows.push(row);
        }

        log::debug!(
            "add {} rows with {} nonzeros to the backend",
            count,
            nonzeros.nnz()
        );
        backend.add_rows(&lhss, &rhss, &names, &nonzeros)?;
        self.lpi_first_chg_row = self.lpi_rows.len();
        self.solved = false;
        Ok(())
    }
}

/// A side as the backend sees it: shifted by the row constant unless infinite.
fn backend_side(side: &Rational, constant: &Rational) -> Rational {
    if side.is_abs_infinity() {
        side.clone()
    } else {
        side - constant
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use crate::{
        exact_lp::{
            exact_lp::test_support::{column, new_lp, row},
            exact_lp_error::ExactLpError,
        },
        lp_backend::memory_backend::{BackendCall, MemoryBackend},
        math::{rational::Rational, traits::Infinite},
    };

    #[test]
    #[timeout(5000)]
    fn flush_is_idempotent() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 3, &[]);
        let c = row(&mut lp, 0, 1, 4, &[(x, 2)]);
        lp.add_column(x).unwrap();
        lp.add_row(c).unwrap();

        lp.flush(&mut backend).unwrap();
        assert!(lp.is_flushed());
        assert_eq!(
            backend.calls(),
            &[
                BackendCall::AddColumns { count: 1, nnz: 0 },
                BackendCall::AddRows { count: 1, nnz: 1 }
            ]
        );

        backend.clear_calls();
        lp.flush(&mut backend).unwrap();
        assert!(backend.calls().is_empty());
    }

    #[test]
    #[timeout(5000)]
    fn bound_change_reaches_backend() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 3, &[]);
        lp.add_column(x).unwrap();
        lp.flush(&mut backend).unwrap();
        assert_eq!(lp.backend_columns().len(), 1);
        assert!(backend.columns()[0].ub.is_infinity());

        lp.change_column_ub(x, r!(5)).unwrap();
        assert!(!lp.is_flushed());
        assert!(lp.column(x).unwrap().ub_changed());
        assert_eq!(lp.changed_columns(), &[x]);

        backend.clear_calls();
        lp.flush(&mut backend).unwrap();
        assert_eq!(backend.calls(), &[BackendCall::ChangeBounds(vec![0])]);
        assert_eq!(backend.columns()[0].lb, r!(0));
        assert_eq!(backend.columns()[0].ub, r!(5));
        assert!(!lp.column(x).unwrap().ub_changed());
        assert!(lp.changed_columns().is_empty());
    }

    #[test]
    #[timeout(5000)]
    fn reverted_change_is_not_sent() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 3, &[]);
        lp.add_column(x).unwrap();
        lp.flush(&mut backend).unwrap();

        lp.change_column_objective(x, r!(4)).unwrap();
        lp.change_column_objective(x, r!(3)).unwrap();
        backend.clear_calls();
        lp.flush(&mut backend).unwrap();
        assert!(backend.calls().is_empty());
        assert!(!lp.column(x).unwrap().obj_changed());
    }

    #[test]
    #[timeout(5000)]
    fn sides_are_shifted_by_constant() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        let c = row(&mut lp, 0, 2, 6, &[(x, 1)]);
        lp.change_row_constant(c, r!(1)).unwrap();
        lp.add_column(x).unwrap();
        lp.add_row(c).unwrap();
        lp.flush(&mut backend).unwrap();
        assert_eq!(backend.rows()[0].lhs, r!(1));
        assert_eq!(backend.rows()[0].rhs, r!(5));

        lp.change_row_rhs(c, Rational::infinity()).unwrap();
        lp.add_row_constant(c, r!(1)).unwrap();
        assert!(lp.row(c).unwrap().lhs_changed());
        lp.flush(&mut backend).unwrap();
        assert_eq!(backend.rows()[0].lhs, r!(0));
        assert!(backend.rows()[0].rhs.is_infinity());
    }

    #[test]
    #[timeout(5000)]
    fn coefficient_change_redoes_tail() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let cols: Vec<_> = (0..3).map(|i| column(&mut lp, i, 1, &[])).collect();
        let rows: Vec<_> = (0..3)
            .map(|i| row(&mut lp, i, 0, 10, &[(cols[0], 1), (cols[1], 1), (cols[2], 1)]))
            .collect();
        for c in &cols {
            lp.add_column(*c).unwrap();
        }
        for r in &rows {
            lp.add_row(*r).unwrap();
        }
        lp.flush(&mut backend).unwrap();
        assert_eq!(lp.first_changed_row_position(), 3);
        assert_eq!(lp.first_changed_column_position(), 3);

        // column 2 is closer to its watermark than row 0
        lp.row_change_coefficient(rows[0], cols[2], r!(5)).unwrap();
        assert!(lp.column(cols[2]).unwrap().coef_changed());
        assert!(!lp.row(rows[0]).unwrap().coef_changed());
        assert_eq!(lp.first_changed_column_position(), 2);
        assert_eq!(lp.first_changed_row_position(), 3);

        // row 2 and column 1 are equally far from their watermarks: the row takes the change
        lp.row_change_coefficient(rows[2], cols[1], r!(7)).unwrap();
        assert!(lp.row(rows[2]).unwrap().coef_changed());
        assert!(!lp.column(cols[1]).unwrap().coef_changed());
        assert_eq!(lp.first_changed_row_position(), 2);
        assert_eq!(lp.first_changed_column_position(), 2);

        backend.clear_calls();
        lp.flush(&mut backend).unwrap();
        assert_eq!(
            backend.calls(),
            &[
                BackendCall::DeleteColumns(2..3),
                BackendCall::DeleteRows(2..3),
                BackendCall::AddColumns { count: 1, nnz: 2 },
                BackendCall::AddRows { count: 1, nnz: 3 },
            ]
        );
        assert_eq!(backend.coefficient(0, 2), Some(&r!(5)));
        assert_eq!(backend.coefficient(2, 1), Some(&r!(7)));
        assert_eq!(backend.coefficient(1, 1), Some(&r!(1)));
        assert_eq!(lp.row(rows[2]).unwrap().nuses(), 3);
        lp.check_links();
    }

    #[test]
    #[timeout(5000)]
    fn returning_column_brings_its_new_nonzeros() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        lp.add_column(x).unwrap();
        lp.flush(&mut backend).unwrap();

        let c = row(&mut lp, 0, 0, 10, &[]);
        lp.add_row(c).unwrap();
        lp.shrink_columns(0).unwrap();
        lp.column_add_coefficient(x, c, r!(5)).unwrap();
        assert_eq!(lp.column(x).unwrap().nunlinked(), 1);

        lp.add_column(x).unwrap();
        assert_eq!(lp.column(x).unwrap().nunlinked(), 0);
        backend.clear_calls();
        lp.flush(&mut backend).unwrap();
        assert_eq!(
            backend.calls(),
            &[BackendCall::AddRows { count: 1, nnz: 1 }]
        );
        assert_eq!(backend.coefficient(0, 0), Some(&r!(5)));
        assert!(lp.is_flushed());
        lp.check_links();
    }

    #[test]
    #[timeout(5000)]
    fn returning_row_brings_its_new_nonzeros() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let c = row(&mut lp, 0, 0, 10, &[]);
        lp.add_row(c).unwrap();
        lp.flush(&mut backend).unwrap();

        let x = column(&mut lp, 0, 1, &[]);
        lp.add_column(x).unwrap();
        lp.shrink_rows(0).unwrap();
        lp.row_add_coefficient(c, x, r!(5)).unwrap();
        assert_eq!(lp.row(c).unwrap().nunlinked(), 1);

        lp.add_row(c).unwrap();
        assert_eq!(lp.row(c).unwrap().nunlinked(), 0);
        backend.clear_calls();
        lp.flush(&mut backend).unwrap();
        assert_eq!(
            backend.calls(),
            &[BackendCall::AddColumns { count: 1, nnz: 1 }]
        );
        assert_eq!(backend.coefficient(0, 0), Some(&r!(5)));
        assert!(lp.is_flushed());
        lp.check_links();
    }

    #[test]
    #[timeout(5000)]
    fn backend_failure_is_reported() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        lp.add_column(x).unwrap();
        backend.fail_next_call("out of licenses");
        let err = lp.flush(&mut backend).unwrap_err();
        assert!(matches!(
            ExactLpError::kind_of(&err),
            Some(ExactLpError::BackendFailure { .. })
        ));
        assert!(!lp.is_flushed());
    }
}
