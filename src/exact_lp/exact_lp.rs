use anyhow::Result;
use rustc_hash::FxHashMap;

use crate::{
    exact_lp::{
        entity_store::EntityStore,
        exact_column::{ColId, ExactColumn},
        exact_lp_error::{ExactLpError, ensure_size},
        exact_lp_settings::ExactLpSettings,
        exact_row::{ExactRow, RowId},
        pseudo_objective::ObjectiveAggregates,
    },
    floating::floating_relaxation::{FpColumnId, FpRowId},
    lp_backend::lp_backend::LpBackend,
    math::{rational::Rational, traits::Infinite},
};

/// The exact rational mirror of the LP relaxation.
///
/// Owns every column and row. `cols`/`rows` hold the current LP in addition order (an entity's
/// `lppos` is its index there); `lpi_cols`/`lpi_rows` hold the prefix of it that the backend
/// knows about (`lpipos`). Changes are recorded in memory and pushed to the backend by
/// [`ExactLp::flush`].
#[derive(Debug)]
pub struct ExactLp {
    pub(crate) name: String,
    pub(crate) settings: ExactLpSettings,

    pub(crate) col_store: EntityStore<ColId, ExactColumn>,
    pub(crate) row_store: EntityStore<RowId, ExactRow>,

    pub(crate) cols: Vec<ColId>,
    pub(crate) rows: Vec<RowId>,
    pub(crate) lpi_cols: Vec<ColId>,
    pub(crate) lpi_rows: Vec<RowId>,

    /// First backend column position that may differ from the LP.
    pub(crate) lpi_first_chg_col: usize,
    /// First backend row position that may differ from the LP.
    pub(crate) lpi_first_chg_row: usize,

    pub(crate) chg_cols: Vec<ColId>,
    pub(crate) chg_rows: Vec<RowId>,

    pub(crate) flushed: bool,
    pub(crate) solved: bool,

    pub(crate) objective: ObjectiveAggregates,

    pub(crate) col_lookup: FxHashMap<FpColumnId, ColId>,
    pub(crate) row_lookup: FxHashMap<FpRowId, RowId>,

    /// Number of primal solutions stored so far; validates the LP activities of rows.
    pub(crate) lp_count: u64,
    /// Number of bound and objective changes so far; validates pseudo and bound activities.
    pub(crate) dom_chg_count: u64,
}

impl ExactLp {
    pub fn new(name: impl Into<String>, settings: ExactLpSettings) -> Self {
        let name = name.into();
        log::debug!("create exact LP <{}>", name);
        Self {
            name,
            settings,
            col_store: EntityStore::new(),
            row_store: EntityStore::new(),
            cols: vec![],
            rows: vec![],
            lpi_cols: vec![],
            lpi_rows: vec![],
            lpi_first_chg_col: 0,
            lpi_first_chg_row: 0,
            chg_cols: vec![],
            chg_rows: vec![],
            flushed: true,
            solved: true,
            objective: ObjectiveAggregates::new(),
            col_lookup: FxHashMap::default(),
            row_lookup: FxHashMap::default(),
            lp_count: 0,
            dom_chg_count: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &ExactLpSettings {
        &self.settings
    }

    pub fn column(&self, col: ColId) -> Option<&ExactColumn> {
        self.col_store.get(col)
    }

    pub fn row(&self, row: RowId) -> Option<&ExactRow> {
        self.row_store.get(row)
    }

    /// The columns of the current LP, in LP order.
    pub fn columns(&self) -> &[ColId] {
        &self.cols
    }

    /// The rows of the current LP, in LP order.
    pub fn rows(&self) -> &[RowId] {
        &self.rows
    }

    /// The columns the backend currently holds, in backend order.
    pub fn backend_columns(&self) -> &[ColId] {
        &self.lpi_cols
    }

    /// The rows the backend currently holds, in backend order.
    pub fn backend_rows(&self) -> &[RowId] {
        &self.lpi_rows
    }

    pub fn first_changed_column_position(&self) -> usize {
        self.lpi_first_chg_col
    }

    pub fn first_changed_row_position(&self) -> usize {
        self.lpi_first_chg_row
    }

    pub fn changed_columns(&self) -> &[ColId] {
        &self.chg_cols
    }

    pub fn changed_rows(&self) -> &[RowId] {
        &self.chg_rows
    }

    /// Whether the backend agrees with the in-memory state.
    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Whether the backend has not been modified since the last stored solution.
    pub fn is_solved(&self) -> bool {
        self.solved
    }

    pub fn lp_count(&self) -> u64 {
        self.lp_count
    }

    pub fn domain_change_count(&self) -> u64 {
        self.dom_chg_count
    }

    pub fn objective(&self) -> &ObjectiveAggregates {
        &self.objective
    }

    /// The exact column mirroring the given floating-point column.
    pub fn exact_column_of(&self, companion: FpColumnId) -> Option<ColId> {
        self.col_lookup.get(&companion).copied()
    }

    /// The exact row mirroring the given floating-point row.
    pub fn exact_row_of(&self, companion: FpRowId) -> Option<RowId> {
        self.row_lookup.get(&companion).copied()
    }

    /// Appends a column to the LP.
    pub fn add_column(&mut self, col: ColId) -> Result<()> {
        if self.col_store[col].lppos.is_some() {
            return Err(ExactLpError::invalid_modification(format!(
                "column <{}> is already part of the LP",
                self.col_store[col].name
            )));
        }
        ensure_size(&mut self.cols, 1, "LP columns")?;
        log::trace!("add column <{}> to exact LP", self.col_store[col].name);

        self.col_store[col].lppos = Some(self.cols.len());
        self.cols.push(col);
        self.flushed = false;

        self.col_update_add_lp(col);
        // a column returning to its backend slot is not re-added by the flush, so nonzeros it
        // picked up outside the LP have to reach their rows now
        if self.col_store[col].lpipos.is_some() {
            self.col_link(col)?;
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// Appends a row to the LP. The LP holds a use of the row until it is removed again.
    pub fn add_row(&mut self, row: RowId) -> Result<()> {
        if self.row_store[row].lppos.is_some() {
            return Err(ExactLpError::invalid_modification(format!(
                "row <{}> is already part of the LP",
                self.row_store[row].name
            )));
        }
        ensure_size(&mut self.rows, 1, "LP rows")?;
        log::trace!("add row <{}> to exact LP", self.row_store[row].name);

        self.capture_row(row);
        self.row_store[row].lppos = Some(self.rows.len());
        self.rows.push(row);
        self.flushed = false;

        self.row_update_add_lp(row);
        if self.row_store[row].lpipos.is_some() {
            self.row_link(row)?;
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// Removes all columns from position `new_len` on from the LP.
    pub fn shrink_columns(&mut self, new_len: usize) -> Result<()> {
        if new_len >= self.cols.len() {
            return Ok(());
        }
        log::debug!(
            "shrink exact LP <{}> from {} to {} columns",
            self.name,
            self.cols.len(),
            new_len
        );
        while self.cols.len() > new_len {
            if let Some(col) = self.cols.pop() {
                self.col_store[col].lppos = None;
                self.col_update_del_lp(col);
            }
        }
        self.lpi_first_chg_col = self.lpi_first_chg_col.min(new_len);
        self.flushed = false;
        self.check_links_if_enabled();
        Ok(())
    }

    /// Removes all rows from position `new_len` on from the LP, releasing the LP's use of them.
    pub fn shrink_rows(&mut self, new_len: usize) -> Result<()> {
        if new_len >= self.rows.len() {
            return Ok(());
        }
        log::debug!(
            "shrink exact LP <{}> from {} to {} rows",
            self.name,
            self.rows.len(),
            new_len
        );
        while self.rows.len() > new_len {
            if let Some(row) = self.rows.pop() {
                self.row_store[row].lppos = None;
                self.row_update_del_lp(row);
                self.release_row(row)?;
            }
        }
        self.lpi_first_chg_row = self.lpi_first_chg_row.min(new_len);
        self.flushed = false;
        self.check_links_if_enabled();
        Ok(())
    }

    /// Removes the columns whose entry in `remove` is true, keeping the order of the others.
    pub fn remove_columns(&mut self, remove: &[bool]) -> Result<()> {
        if remove.len() != self.cols.len() {
            return Err(ExactLpError::invalid_modification(format!(
                "column removal mask has {} entries for {} columns",
                remove.len(),
                self.cols.len()
            )));
        }
        let old = std::mem::take(&mut self.cols);
        let mut first_change = old.len();
        for (pos, col) in old.into_iter().enumerate() {
            if remove[pos] {
                first_change = first_change.min(pos);
                self.col_store[col].lppos = None;
                self.col_update_del_lp(col);
            } else {
                self.col_store[col].lppos = Some(self.cols.len());
                self.cols.push(col);
            }
        }
        if first_change < remove.len() {
            log::debug!(
                "removed {} columns from exact LP <{}>",
                remove.iter().filter(|r| **r).count(),
                self.name
            );
            self.lpi_first_chg_col = self.lpi_first_chg_col.min(first_change);
            self.flushed = false;
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// Removes the rows whose entry in `remove` is true, keeping the order of the others.
    pub fn remove_rows(&mut self, remove: &[bool]) -> Result<()> {
        if remove.len() != self.rows.len() {
            return Err(ExactLpError::invalid_modification(format!(
                "row removal mask has {} entries for {} rows",
                remove.len(),
                self.rows.len()
            )));
        }
        let old = std::mem::take(&mut self.rows);
        let mut first_change = old.len();
        let mut released = vec![];
        for (pos, row) in old.into_iter().enumerate() {
            if remove[pos] {
                first_change = first_change.min(pos);
                self.row_store[row].lppos = None;
                self.row_update_del_lp(row);
                released.push(row);
            } else {
                self.row_store[row].lppos = Some(self.rows.len());
                self.rows.push(row);
            }
        }
        for row in released {
            self.release_row(row)?;
        }
        if first_change < remove.len() {
            log::debug!(
                "removed {} rows from exact LP <{}>",
                remove.iter().filter(|r| **r).count(),
                self.name
            );
            self.lpi_first_chg_row = self.lpi_first_chg_row.min(first_change);
            self.flushed = false;
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// Removes all columns and rows from the LP. The backend is updated on the next flush.
    pub fn clear(&mut self) -> Result<()> {
        log::debug!("clear exact LP <{}>", self.name);
        self.shrink_rows(0)?;
        self.shrink_columns(0)
    }

    /// Clears the LP and brings the backend into the same, empty state.
    pub fn reset(&mut self, backend: &mut dyn LpBackend) -> Result<()> {
        self.clear()?;
        self.flush(backend)
    }

    /**
     * Stores the primal values of a solution of the flushed LP, one per LP column in LP order,
     * and keeps track of the smallest and largest value each column has taken.
     */
    pub fn store_primal_solution(&mut self, values: &[Rational]) -> Result<()> {
        if !self.flushed {
            return Err(ExactLpError::invalid_modification(
                "cannot store a solution of an unflushed LP",
            ));
        }
        if values.len() != self.cols.len() {
            return Err(ExactLpError::invalid_modification(format!(
                "solution has {} values for {} columns",
                values.len(),
                self.cols.len()
            )));
        }
        for (col, value) in self.cols.iter().zip(values) {
            if value.is_abs_infinity() {
                return Err(ExactLpError::invalid_modification(format!(
                    "infinite primal value for column <{}>",
                    self.col_store[*col].name
                )));
            }
        }
        for (col, value) in self.cols.iter().zip(values) {
            let col = &mut self.col_store[*col];
            col.primsol = value.clone();
            if value < &col.min_primsol {
                col.min_primsol = value.clone();
            }
            if value > &col.max_primsol {
                col.max_primsol = value.clone();
            }
        }
        self.lp_count += 1;
        self.solved = true;
        Ok(())
    }

    pub(crate) fn check_coefficient(value: &Rational) -> Result<()> {
        if value.is_abs_infinity() {
            Err(ExactLpError::invalid_modification(format!(
                "coefficient {} is not finite",
                value
            )))
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_row_unlocked(&self, row: RowId, action: &str) -> Result<()> {
        let row = &self.row_store[row];
        if row.nlocks > 0 {
            Err(ExactLpError::invalid_modification(format!(
                "cannot {} the locked unmodifiable row <{}>",
                action, row.name
            )))
        } else {
            Ok(())
        }
    }

    pub(crate) fn check_links_if_enabled(&self) {
        if self.settings.check_links {
            self.check_links();
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        exact_lp::{
            exact_column::ColId, exact_lp::ExactLp, exact_lp_settings::ExactLpSettings,
            exact_row::RowId,
        },
        floating::floating_relaxation::{FpColumnId, FpRowId},
        math::{rational::Rational, traits::Infinite},
    };

    pub fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    pub fn new_lp() -> ExactLp {
        init_logging();
        ExactLp::new(
            "test",
            ExactLpSettings {
                check_links: true,
                ..Default::default()
            },
        )
    }

    pub fn column(lp: &mut ExactLp, index: usize, obj: i64, rows: &[(RowId, i64)]) -> ColId {
        let rows: Vec<(RowId, Rational)> = rows.iter().map(|(r, v)| (*r, r!(*v))).collect();
        lp.create_column(
            format!("x{}", index),
            FpColumnId(index),
            r!(obj),
            r!(0),
            Rational::infinity(),
            &rows,
        )
        .unwrap()
    }

    pub fn row(lp: &mut ExactLp, index: usize, lhs: i64, rhs: i64, cols: &[(ColId, i64)]) -> RowId {
        let cols: Vec<(ColId, Rational)> = cols.iter().map(|(c, v)| (*c, r!(*v))).collect();
        lp.create_row(
            format!("c{}", index),
            FpRowId(index),
            r!(lhs),
            r!(rhs),
            &cols,
        )
        .unwrap()
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
        lp_backend::memory_backend::MemoryBackend,
    };

    #[test]
    fn add_and_shrink() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let y = column(&mut lp, 1, 1, &[]);
        let c = row(&mut lp, 0, 0, 4, &[(x, 1), (y, 1)]);

        lp.add_column(x).unwrap();
        lp.add_column(y).unwrap();
        lp.add_row(c).unwrap();
        assert_eq!(lp.columns(), &[x, y]);
        assert_eq!(lp.row(c).unwrap().nuses(), 2);
        assert!(!lp.is_flushed());

        lp.shrink_columns(1).unwrap();
        assert_eq!(lp.columns(), &[x]);
        assert_eq!(lp.column(y).unwrap().lppos(), None);

        lp.shrink_rows(0).unwrap();
        assert_eq!(lp.row(c).unwrap().nuses(), 1);
        assert_eq!(lp.row(c).unwrap().lppos(), None);
        lp.check_links();
    }

    #[test]
    fn add_twice_is_rejected() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        lp.add_column(x).unwrap();
        let err = lp.add_column(x).unwrap_err();
        assert!(matches!(
            ExactLpError::kind_of(&err),
            Some(ExactLpError::InvalidModification { .. })
        ));
    }

    #[test]
    #[timeout(5000)]
    fn remove_rows_renumbers() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        lp.add_column(x).unwrap();
        let rows: Vec<_> = (0..4)
            .map(|i| row(&mut lp, i, 0, 10, &[(x, i as i64 + 1)]))
            .collect();
        for r in &rows {
            lp.add_row(*r).unwrap();
        }
        lp.flush(&mut backend).unwrap();
        assert_eq!(backend.rows().len(), 4);

        lp.remove_rows(&[false, true, false, true]).unwrap();
        assert_eq!(lp.rows(), &[rows[0], rows[2]]);
        assert_eq!(lp.row(rows[2]).unwrap().lppos(), Some(1));
        assert_eq!(lp.first_changed_row_position(), 1);

        lp.flush(&mut backend).unwrap();
        assert_eq!(backend.rows().len(), 2);
        assert_eq!(backend.coefficient(1, 0), Some(&r!(3)));
        assert_eq!(lp.column(x).unwrap().nlprows(), 2);
        lp.check_links();
    }

    #[test]
    #[timeout(5000)]
    fn reset_empties_backend() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        let c = row(&mut lp, 0, 1, 1, &[(x, 1)]);
        lp.add_column(x).unwrap();
        lp.add_row(c).unwrap();
        lp.flush(&mut backend).unwrap();
        assert_eq!(backend.columns().len(), 1);

        lp.reset(&mut backend).unwrap();
        assert!(lp.is_flushed());
        assert_eq!(backend.columns().len(), 0);
        assert_eq!(backend.rows().len(), 0);
        assert!(lp.backend_columns().is_empty());
        assert_eq!(lp.row(c).unwrap().nuses(), 1);
    }

    #[test]
    fn primal_solution_history() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        lp.add_column(x).unwrap();
        assert!(lp.store_primal_solution(&[r!(1)]).is_err());
        lp.flush(&mut backend).unwrap();

        lp.store_primal_solution(&[r!(3)]).unwrap();
        lp.store_primal_solution(&[r!(-1, 2)]).unwrap();
        let col = lp.column(x).unwrap();
        assert_eq!(col.primsol(), &r!(-1, 2));
        assert_eq!(col.min_primsol(), &r!(-1, 2));
        assert_eq!(col.max_primsol(), &r!(3));
        assert_eq!(lp.lp_count(), 2);
        assert!(lp.is_solved());
    }
}
