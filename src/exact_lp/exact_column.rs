use anyhow::Result;
use std::fmt::Display;

use crate::{
    exact_lp::{
        entity_store::EntityId,
        exact_lp::ExactLp,
        exact_lp_error::{ExactLpError, ensure_size},
        exact_row::RowId,
    },
    floating::floating_relaxation::FpColumnId,
    math::{
        rational::Rational,
        traits::{Infinite, Signed, Zero},
    },
};

/// Handle of a column in an [`ExactLp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColId(pub(crate) usize);

impl EntityId for ColId {
    fn from_index(index: usize) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0
    }
}

impl Display for ColId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "col#{}", self.0)
    }
}

/// A nonzero of a column: the row it lies in, its value, and the position of the same nonzero
/// in that row's entries if the two are linked.
#[derive(Clone, Debug)]
pub struct ColumnEntry {
    pub(crate) row: RowId,
    pub(crate) value: Rational,
    pub(crate) link: Option<usize>,
}

impl ColumnEntry {
    pub fn row(&self) -> RowId {
        self.row
    }

    pub fn value(&self) -> &Rational {
        &self.value
    }

    pub fn link(&self) -> Option<usize> {
        self.link
    }
}

/**
 * A column of the exact LP.
 *
 * The entries are partitioned: the first `nlprows` of them are linked and lie in rows of the
 * current LP, the rest lie in rows outside the LP or are not linked yet. Each part carries its own
 * sortedness flag; sorting is done lazily before searching.
 */
#[derive(Clone, Debug)]
pub struct ExactColumn {
    pub(crate) id: ColId,
    pub(crate) name: String,
    pub(crate) companion: FpColumnId,

    pub(crate) obj: Rational,
    pub(crate) lb: Rational,
    pub(crate) ub: Rational,
    pub(crate) flushed_obj: Rational,
    pub(crate) flushed_lb: Rational,
    pub(crate) flushed_ub: Rational,

    pub(crate) entries: Vec<ColumnEntry>,
    pub(crate) nlprows: usize,
    pub(crate) nunlinked: usize,
    pub(crate) lprows_sorted: bool,
    pub(crate) nonlprows_sorted: bool,

    pub(crate) lppos: Option<usize>,
    pub(crate) lpipos: Option<usize>,

    pub(crate) obj_changed: bool,
    pub(crate) lb_changed: bool,
    pub(crate) ub_changed: bool,
    pub(crate) coef_changed: bool,

    pub(crate) primsol: Rational,
    pub(crate) min_primsol: Rational,
    pub(crate) max_primsol: Rational,
}

impl ExactColumn {
    pub fn id(&self) -> ColId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn companion(&self) -> FpColumnId {
        self.companion
    }

    pub fn obj(&self) -> &Rational {
        &self.obj
    }

    pub fn lb(&self) -> &Rational {
        &self.lb
    }

    pub fn ub(&self) -> &Rational {
        &self.ub
    }

    /// The bound that is best for the objective: the lower bound for a non-negative objective
    /// coefficient, the upper bound otherwise.
    pub fn best_bound(&self) -> &Rational {
        if self.obj.is_negative() {
            &self.ub
        } else {
            &self.lb
        }
    }

    pub fn entries(&self) -> &[ColumnEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn nlprows(&self) -> usize {
        self.nlprows
    }

    pub fn nunlinked(&self) -> usize {
        self.nunlinked
    }

    pub fn lppos(&self) -> Option<usize> {
        self.lppos
    }

    pub fn lpipos(&self) -> Option<usize> {
        self.lpipos
    }

    pub fn is_in_lp(&self) -> bool {
        self.lppos.is_some()
    }

    pub fn is_in_backend(&self) -> bool {
        self.lpipos.is_some()
    }

    pub fn obj_changed(&self) -> bool {
        self.obj_changed
    }

    pub fn lb_changed(&self) -> bool {
        self.lb_changed
    }

    pub fn ub_changed(&self) -> bool {
        self.ub_changed
    }

    pub fn coef_changed(&self) -> bool {
        self.coef_changed
    }

    pub fn primsol(&self) -> &Rational {
        &self.primsol
    }

    pub fn min_primsol(&self) -> &Rational {
        &self.min_primsol
    }

    pub fn max_primsol(&self) -> &Rational {
        &self.max_primsol
    }
}

/// Sorts an initial coefficient list by partner, sums duplicates and drops zeros.
pub(crate) fn normalize_coefficients<K: Ord + Copy>(
    coefficients: &[(K, Rational)],
) -> Result<Vec<(K, Rational)>> {
    for (_, value) in coefficients {
        ExactLp::check_coefficient(value)?;
    }
    let mut sorted = coefficients.to_vec();
    sorted.sort_by_key(|(key, _)| *key);
    let mut merged: Vec<(K, Rational)> = Vec::with_capacity(sorted.len());
    for (key, value) in sorted {
        match merged.last_mut() {
            Some((last, sum)) if *last == key => *sum += value,
            _ => merged.push((key, value)),
        }
    }
    merged.retain(|(_, value)| !value.is_zero());
    Ok(merged)
}

impl ExactLp {
    /**
     * Creates a column outside of the LP. The initial coefficients may be given in any order;
     * duplicates are summed and zeros are dropped. All nonzeros start unlinked: the rows learn
     * about them once the column enters the backend.
     */
    pub fn create_column(
        &mut self,
        name: impl Into<String>,
        companion: FpColumnId,
        obj: Rational,
        lb: Rational,
        ub: Rational,
        rows: &[(RowId, Rational)],
    ) -> Result<ColId> {
        let name = name.into();
        if obj.is_abs_infinity() {
            return Err(ExactLpError::invalid_modification(format!(
                "objective coefficient of column <{}> is not finite",
                name
            )));
        }
        if lb.is_infinity() || ub.is_neg_infinity() || lb > ub {
            return Err(ExactLpError::invalid_modification(format!(
                "column <{}> has invalid bounds [{}, {}]",
                name, lb, ub
            )));
        }
        if let Some((row, _)) = rows.iter().find(|(row, _)| !self.row_store.contains(*row)) {
            return Err(ExactLpError::invalid_modification(format!(
                "column <{}> refers to unknown row {:?}",
                name, row
            )));
        }
        if self.col_lookup.contains_key(&companion) {
            return Err(ExactLpError::invalid_modification(format!(
                "floating-point column {:?} is already mirrored",
                companion
            )));
        }

        let coefficients = normalize_coefficients(rows)?;
        let mut entries = vec![];
        ensure_size(&mut entries, coefficients.len(), "column entries")?;
        entries.extend(
            coefficients
                .into_iter()
                .map(|(row, value)| ColumnEntry {
                    row,
                    value,
                    link: None,
                }),
        );

        log::trace!("create column <{}> with {} nonzeros", name, entries.len());

        let id = self.col_store.insert_with(|id| ExactColumn {
            id,
            name,
            companion,
            flushed_obj: obj.clone(),
            flushed_lb: lb.clone(),
            flushed_ub: ub.clone(),
            obj,
            lb,
            ub,
            nunlinked: entries.len(),
            entries,
            nlprows: 0,
            lprows_sorted: true,
            nonlprows_sorted: true,
            lppos: None,
            lpipos: None,
            obj_changed: false,
            lb_changed: false,
            ub_changed: false,
            coef_changed: false,
            primsol: Rational::zero(),
            min_primsol: Rational::infinity(),
            max_primsol: Rational::neg_infinity(),
        })?;
        self.col_lookup.insert(companion, id);
        Ok(id)
    }

    /**
     * Frees a column that is neither in the LP nor in the backend, removing its nonzeros from all
     * rows. Fails without changing anything if one of those rows is locked.
     */
    pub fn free_column(&mut self, col: ColId) -> Result<()> {
        let column = &self.col_store[col];
        if column.lppos.is_some() || column.lpipos.is_some() {
            return Err(ExactLpError::invalid_modification(format!(
                "cannot free column <{}> while it is part of the LP",
                column.name
            )));
        }
        for entry in &column.entries {
            if entry.link.is_some() {
                self.check_row_unlocked(entry.row, "delete a coefficient from")?;
            }
        }
        for (_, row) in self.row_store.iter() {
            if row.nlocks > 0
                && row.nunlinked > 0
                && row
                    .entries
                    .iter()
                    .any(|entry| entry.column == col && entry.link.is_none())
            {
                return Err(ExactLpError::invalid_modification(format!(
                    "cannot delete a coefficient from the locked unmodifiable row <{}>",
                    row.name
                )));
            }
        }

        log::trace!("free column <{}>", self.col_store[col].name);
        self.col_unlink(col)?;
        self.purge_row_references(col)?;
        self.chg_cols.retain(|c| *c != col);
        if let Some(column) = self.col_store.remove(col) {
            self.col_lookup.remove(&column.companion);
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// Removes the unlinked nonzeros that rows hold for a column that is about to be freed.
    fn purge_row_references(&mut self, col: ColId) -> Result<()> {
        for row in self.row_store.keys() {
            if self.row_store[row].nunlinked == 0 {
                continue;
            }
            while let Some(pos) = self.row_store[row]
                .entries
                .iter()
                .position(|entry| entry.column == col && entry.link.is_none())
            {
                self.row_del_coef_pos(row, pos)?;
            }
        }
        Ok(())
    }

    /**
     * Adds a nonzero to a column. With `link` the nonzero already exists in the row at that
     * position; without it, the row receives the nonzero too if the column is in the LP.
     */
    pub(crate) fn col_add_coef(
        &mut self,
        col: ColId,
        row: RowId,
        value: Rational,
        link: Option<usize>,
    ) -> Result<()> {
        debug_assert!(!value.is_zero());
        ensure_size(&mut self.col_store[col].entries, 1, "column entries")?;

        let row_in_lp = self.row_store[row].lppos.is_some();
        let column = &mut self.col_store[col];
        let mut pos = column.entries.len();
        column.entries.push(ColumnEntry {
            row,
            value: value.clone(),
            link,
        });

        // a linked nonzero of an LP row belongs to the LP part: move the first non-LP entry to
        // the end and take its place
        if row_in_lp && link.is_some() {
            let target = column.nlprows;
            column.nlprows += 1;
            self.col_move_coef(col, target, pos);
            pos = target;
        }

        let mut link = link;
        match link {
            None => {
                self.col_store[col].nunlinked += 1;
                if self.col_store[col].lppos.is_some() {
                    self.row_add_coef(row, col, value, Some(pos))?;
                    if row_in_lp {
                        pos = self.col_store[col].nlprows - 1;
                    }
                    link = self.col_store[col].entries[pos].link;
                }
            }
            Some(linkpos) => {
                let partner = &mut self.row_store[row];
                debug_assert_eq!(partner.entries[linkpos].column, col);
                debug_assert!(partner.entries[linkpos].link.is_none());
                debug_assert!(partner.nunlinked > 0);
                partner.entries[linkpos].link = Some(pos);
                partner.nunlinked -= 1;

                if self.col_store[col].lppos.is_some() {
                    let partner = &mut self.row_store[row];
                    partner.nlpcols += 1;
                    let target = partner.nlpcols - 1;
                    self.row_swap_coefs(row, linkpos, target);
                    if linkpos == target {
                        self.row_store[row].lpcols_sorted = false;
                    }
                }
            }
        }

        let column = &mut self.col_store[col];
        if row_in_lp && link.is_some() {
            debug_assert_eq!(column.entries[column.nlprows - 1].row, row);
            if column.nlprows > 1 {
                column.lprows_sorted =
                    column.lprows_sorted && column.entries[column.nlprows - 2].row < row;
            }
        } else {
            let len = column.entries.len();
            debug_assert_eq!(column.entries[len - 1].row, row);
            if len - column.nlprows > 1 {
                column.nonlprows_sorted =
                    column.nonlprows_sorted && column.entries[len - 2].row < row;
            }
        }

        self.coef_changed(row, col);
        Ok(())
    }

    /// Deletes the nonzero at `pos` from the column only; the partner must be handled separately.
    pub(crate) fn col_del_coef_pos(&mut self, col: ColId, pos: usize) -> Result<()> {
        let column = &mut self.col_store[col];
        let row = column.entries[pos].row;
        if column.entries[pos].link.is_none() {
            column.nunlinked -= 1;
        }

        let mut pos = pos;
        if pos < column.nlprows {
            let last_lp = column.nlprows - 1;
            self.col_move_coef(col, last_lp, pos);
            self.col_store[col].nlprows -= 1;
            pos = last_lp;
        }
        let last = self.col_store[col].entries.len() - 1;
        self.col_move_coef(col, last, pos);
        self.col_store[col].entries.pop();

        self.coef_changed(row, col);
        Ok(())
    }

    /// Sets the value of the nonzero at `pos` in the column only; zero deletes it.
    pub(crate) fn col_chg_coef_pos(&mut self, col: ColId, pos: usize, value: Rational) -> Result<()> {
        if value.is_zero() {
            return self.col_del_coef_pos(col, pos);
        }
        let entry = &mut self.col_store[col].entries[pos];
        if entry.value != value {
            entry.value = value;
            let row = entry.row;
            self.coef_changed(row, col);
        }
        Ok(())
    }

    pub fn column_add_coefficient(&mut self, col: ColId, row: RowId, value: Rational) -> Result<()> {
        Self::check_coefficient(&value)?;
        self.check_row_unlocked(row, "add a coefficient to")?;
        if value.is_zero() {
            return Ok(());
        }
        self.col_add_coef(col, row, value, None)?;
        self.check_links_if_enabled();
        Ok(())
    }

    pub fn column_delete_coefficient(&mut self, col: ColId, row: RowId) -> Result<()> {
        self.check_row_unlocked(row, "delete a coefficient from")?;
        let pos = self.col_search_coef(col, row).ok_or_else(|| {
            anyhow::Error::from(ExactLpError::CoefficientNotFound {
                column: self.col_store[col].name.clone(),
                row: self.row_store[row].name.clone(),
            })
        })?;
        if let Some(link) = self.col_store[col].entries[pos].link {
            self.row_del_coef_pos(row, link)?;
        }
        self.col_del_coef_pos(col, pos)?;
        self.check_links_if_enabled();
        Ok(())
    }

    /// Sets a coefficient, inserting it if missing and deleting it if the new value is zero.
    pub fn column_change_coefficient(
        &mut self,
        col: ColId,
        row: RowId,
        value: Rational,
    ) -> Result<()> {
        Self::check_coefficient(&value)?;
        self.check_row_unlocked(row, "change a coefficient of")?;
        match self.col_search_coef(col, row) {
            None => {
                if !value.is_zero() {
                    self.col_add_coef(col, row, value, None)?;
                }
            }
            Some(pos) => {
                if let Some(link) = self.col_store[col].entries[pos].link {
                    self.row_chg_coef_pos(row, link, value.clone())?;
                }
                self.col_chg_coef_pos(col, pos, value)?;
            }
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// Adds `increment` to a coefficient, inserting it if missing.
    pub fn column_increase_coefficient(
        &mut self,
        col: ColId,
        row: RowId,
        increment: Rational,
    ) -> Result<()> {
        Self::check_coefficient(&increment)?;
        self.check_row_unlocked(row, "change a coefficient of")?;
        if increment.is_zero() {
            return Ok(());
        }
        match self.col_search_coef(col, row) {
            None => self.col_add_coef(col, row, increment, None)?,
            Some(pos) => {
                let value = &self.col_store[col].entries[pos].value + &increment;
                if let Some(link) = self.col_store[col].entries[pos].link {
                    self.row_chg_coef_pos(row, link, value.clone())?;
                }
                self.col_chg_coef_pos(col, pos, value)?;
            }
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// The coefficient of a column in a row, zero if the column has no such nonzero.
    pub fn column_coefficient(&mut self, col: ColId, row: RowId) -> Rational {
        match self.col_search_coef(col, row) {
            Some(pos) => self.col_store[col].entries[pos].value.clone(),
            None => Rational::zero(),
        }
    }

    pub fn change_column_objective(&mut self, col: ColId, obj: Rational) -> Result<()> {
        if obj.is_abs_infinity() {
            return Err(ExactLpError::invalid_modification(format!(
                "objective coefficient {} of column <{}> is not finite",
                obj, self.col_store[col].name
            )));
        }
        if self.col_store[col].obj == obj {
            return Ok(());
        }
        log::trace!(
            "change objective of column <{}> from {} to {}",
            self.col_store[col].name,
            self.col_store[col].obj,
            obj
        );
        if self.col_store[col].lpipos.is_some() {
            self.insert_col_chg(col)?;
            self.col_store[col].obj_changed = true;
        }
        self.col_store[col].obj = obj;
        // the best bound, and with it the pseudo activities, may have switched
        self.dom_chg_count += 1;
        Ok(())
    }

    pub fn change_column_lb(&mut self, col: ColId, lb: Rational) -> Result<()> {
        if lb.is_infinity() {
            return Err(ExactLpError::invalid_modification(format!(
                "lower bound of column <{}> cannot be infinity",
                self.col_store[col].name
            )));
        }
        if self.col_store[col].lb == lb {
            return Ok(());
        }
        log::trace!(
            "change lower bound of column <{}> from {} to {}",
            self.col_store[col].name,
            self.col_store[col].lb,
            lb
        );
        if self.col_store[col].lpipos.is_some() {
            self.insert_col_chg(col)?;
            self.col_store[col].lb_changed = true;
        }
        self.col_store[col].lb = lb;
        self.dom_chg_count += 1;
        Ok(())
    }

    pub fn change_column_ub(&mut self, col: ColId, ub: Rational) -> Result<()> {
        if ub.is_neg_infinity() {
            return Err(ExactLpError::invalid_modification(format!(
                "upper bound of column <{}> cannot be minus infinity",
                self.col_store[col].name
            )));
        }
        if self.col_store[col].ub == ub {
            return Ok(());
        }
        log::trace!(
            "change upper bound of column <{}> from {} to {}",
            self.col_store[col].name,
            self.col_store[col].ub,
            ub
        );
        if self.col_store[col].lpipos.is_some() {
            self.insert_col_chg(col)?;
            self.col_store[col].ub_changed = true;
        }
        self.col_store[col].ub = ub;
        self.dom_chg_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        exact_lp::{
            exact_column::normalize_coefficients,
            exact_lp::test_support::{column, new_lp, row},
            exact_lp_error::ExactLpError,
        },
        floating::floating_relaxation::FpColumnId,
        math::{rational::Rational, traits::Infinite},
    };

    #[test]
    fn initial_coefficients_are_normalized() {
        let merged = normalize_coefficients(&[(3, r!(1)), (1, r!(2)), (3, r!(-1)), (1, r!(1, 2))])
            .unwrap();
        assert_eq!(merged, vec![(1, r!(5, 2))]);

        assert!(normalize_coefficients(&[(0, Rational::infinity())]).is_err());
    }

    #[test]
    fn create_rejects_bad_input() {
        let mut lp = new_lp();
        let bounds = lp.create_column(
            "x",
            FpColumnId(0),
            r!(1),
            r!(2),
            r!(1),
            &[],
        );
        assert!(bounds.is_err());
        let obj = lp.create_column(
            "x",
            FpColumnId(0),
            Rational::infinity(),
            r!(0),
            r!(1),
            &[],
        );
        assert!(obj.is_err());
        column(&mut lp, 0, 1, &[]);
        let twice = lp.create_column("y", FpColumnId(0), r!(0), r!(0), r!(1), &[]);
        assert!(twice.is_err());
    }

    #[test]
    fn add_then_delete_restores_column() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let c0 = row(&mut lp, 0, 0, 1, &[]);
        let c1 = row(&mut lp, 1, 0, 1, &[]);
        lp.column_add_coefficient(x, c0, r!(2)).unwrap();
        let before: Vec<_> = lp
            .column(x)
            .unwrap()
            .entries()
            .iter()
            .map(|e| (e.row(), e.value().clone()))
            .collect();

        lp.column_add_coefficient(x, c1, r!(7)).unwrap();
        assert_eq!(lp.column(x).unwrap().len(), 2);
        lp.column_delete_coefficient(x, c1).unwrap();

        let after: Vec<_> = lp
            .column(x)
            .unwrap()
            .entries()
            .iter()
            .map(|e| (e.row(), e.value().clone()))
            .collect();
        assert_eq!(before, after);
        assert_eq!(lp.column(x).unwrap().nunlinked(), 1);
    }

    #[test]
    fn delete_missing_coefficient() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let c = row(&mut lp, 0, 0, 1, &[]);
        let err = lp.column_delete_coefficient(x, c).unwrap_err();
        assert_eq!(
            ExactLpError::kind_of(&err),
            Some(&ExactLpError::CoefficientNotFound {
                column: "x0".to_string(),
                row: "c0".to_string()
            })
        );
    }

    #[test]
    fn change_and_increase() {
        let mut lp = new_lp();
        let c = row(&mut lp, 0, 0, 1, &[]);
        let x = column(&mut lp, 0, 1, &[(c, 1)]);
        lp.add_column(x).unwrap();
        lp.add_row(c).unwrap();

        lp.column_increase_coefficient(x, c, r!(1, 2)).unwrap();
        assert_eq!(lp.column_coefficient(x, c), r!(3, 2));

        lp.column_change_coefficient(x, c, r!(4)).unwrap();
        assert_eq!(lp.column_coefficient(x, c), r!(4));

        lp.column_increase_coefficient(x, c, r!(-4)).unwrap();
        assert_eq!(lp.column_coefficient(x, c), r!(0));
        assert!(lp.column(x).unwrap().is_empty());
    }

    #[test]
    fn coefficient_of_lp_column_reaches_row() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let c = row(&mut lp, 0, 0, 1, &[]);
        lp.add_column(x).unwrap();
        lp.add_row(c).unwrap();

        lp.column_add_coefficient(x, c, r!(3)).unwrap();
        let col = lp.column(x).unwrap();
        assert_eq!(col.nlprows(), 1);
        assert_eq!(col.entries()[0].link(), Some(0));
        let r = lp.row(c).unwrap();
        assert_eq!(r.nlpcols(), 1);
        assert_eq!(r.entries()[0].value(), &r!(3));
    }

    #[test]
    fn free_column_removes_nonzeros() {
        let mut lp = new_lp();
        let c = row(&mut lp, 0, 0, 1, &[]);
        let x = column(&mut lp, 0, 1, &[]);
        let y = column(&mut lp, 1, 1, &[]);
        lp.add_row(c).unwrap();
        lp.add_column(x).unwrap();
        lp.column_add_coefficient(x, c, r!(1)).unwrap();
        lp.row_add_coefficient(c, y, r!(2)).unwrap();

        assert!(lp.free_column(x).is_err());
        lp.shrink_columns(0).unwrap();
        lp.free_column(x).unwrap();
        lp.free_column(y).unwrap();
        assert!(lp.column(x).is_none());
        assert!(lp.row(c).unwrap().is_empty());
        assert_eq!(lp.exact_column_of(FpColumnId(0)), None);
    }
}
