use anyhow::Result;
use itertools::Itertools;
use std::fmt::Display;

use crate::{
    exact_lp::{
        entity_store::EntityId,
        exact_column::{ColId, normalize_coefficients},
        exact_lp::ExactLp,
        exact_lp_error::{ExactLpError, ensure_size},
    },
    floating::floating_relaxation::FpRowId,
    math::{
        rational::Rational,
        traits::{Infinite, Signed, Zero},
    },
};

/// Handle of a row in an [`ExactLp`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub(crate) usize);

impl EntityId for RowId {
    fn from_index(index: usize) -> Self {
        Self(index)
    }

    fn index(self) -> usize {
        self.0
    }
}

impl Display for RowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row#{}", self.0)
    }
}

/// A nonzero of a row. Besides the exact value it keeps a pair of floats enclosing it.
#[derive(Clone, Debug)]
pub struct RowEntry {
    pub(crate) column: ColId,
    pub(crate) value: Rational,
    pub(crate) interval: (f64, f64),
    pub(crate) link: Option<usize>,
}

impl RowEntry {
    pub(crate) fn new(column: ColId, value: Rational, link: Option<usize>) -> Self {
        Self {
            column,
            interval: value.to_interval(),
            value,
            link,
        }
    }

    pub fn column(&self) -> ColId {
        self.column
    }

    pub fn value(&self) -> &Rational {
        &self.value
    }

    pub fn interval(&self) -> (f64, f64) {
        self.interval
    }

    pub fn link(&self) -> Option<usize> {
        self.link
    }
}

/**
 * A row `lhs <= sum of entries + constant <= rhs` of the exact LP.
 *
 * Mirrors the layout of a column: the first `nlpcols` entries are linked and lie in columns of
 * the current LP. A row is shared between its creator, the LP and the backend; it is freed once
 * the last use is released and the backend no longer holds it.
 */
#[derive(Clone, Debug)]
pub struct ExactRow {
    pub(crate) id: RowId,
    pub(crate) name: String,
    pub(crate) companion: FpRowId,

    pub(crate) lhs: Rational,
    pub(crate) rhs: Rational,
    pub(crate) constant: Rational,
    /// Sides as last sent to the backend, shifted by the constant.
    pub(crate) flushed_lhs: Rational,
    pub(crate) flushed_rhs: Rational,

    pub(crate) entries: Vec<RowEntry>,
    pub(crate) nlpcols: usize,
    pub(crate) nunlinked: usize,
    pub(crate) lpcols_sorted: bool,
    pub(crate) nonlpcols_sorted: bool,

    pub(crate) lppos: Option<usize>,
    pub(crate) lpipos: Option<usize>,

    pub(crate) lhs_changed: bool,
    pub(crate) rhs_changed: bool,
    pub(crate) coef_changed: bool,

    pub(crate) nlocks: usize,
    pub(crate) nuses: usize,

    pub(crate) activity: Rational,
    pub(crate) valid_activity_lp: Option<u64>,
    pub(crate) pseudo_activity: Rational,
    pub(crate) valid_pseudo_activity: Option<u64>,
    pub(crate) min_activity: Rational,
    pub(crate) max_activity: Rational,
    pub(crate) valid_activity_bounds: Option<u64>,
}

impl ExactRow {
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn companion(&self) -> FpRowId {
        self.companion
    }

    pub fn lhs(&self) -> &Rational {
        &self.lhs
    }

    pub fn rhs(&self) -> &Rational {
        &self.rhs
    }

    pub fn constant(&self) -> &Rational {
        &self.constant
    }

    pub fn entries(&self) -> &[RowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn nlpcols(&self) -> usize {
        self.nlpcols
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

    pub fn lhs_changed(&self) -> bool {
        self.lhs_changed
    }

    pub fn rhs_changed(&self) -> bool {
        self.rhs_changed
    }

    pub fn coef_changed(&self) -> bool {
        self.coef_changed
    }

    pub fn is_locked(&self) -> bool {
        self.nlocks > 0
    }

    pub fn nlocks(&self) -> usize {
        self.nlocks
    }

    pub fn nuses(&self) -> usize {
        self.nuses
    }

    /// Drops every cached activity so that it is recomputed on the next request.
    pub(crate) fn invalidate_activities(&mut self) {
        self.activity = Rational::infinity();
        self.valid_activity_lp = None;
        self.pseudo_activity = Rational::infinity();
        self.valid_pseudo_activity = None;
        self.min_activity = Rational::infinity();
        self.max_activity = Rational::infinity();
        self.valid_activity_bounds = None;
    }
}

impl Display for ExactRow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} <= {}",
            self.name,
            self.lhs,
            self.entries
                .iter()
                .map(|entry| format!("{} {}", entry.value, entry.column))
                .join(" + ")
        )?;
        if !self.constant.is_zero() {
            write!(f, " + {}", self.constant)?;
        }
        write!(f, " <= {}", self.rhs)
    }
}

/// Sum of `value * bound` where an infinite bound makes the whole sum infinite.
fn bounded_sum<'a>(terms: impl Iterator<Item = (&'a Rational, &'a Rational)>) -> Rational {
    let mut sum = Rational::zero();
    let mut positive_infinite = false;
    let mut negative_infinite = false;
    for (value, bound) in terms {
        if bound.is_abs_infinity() {
            if bound.is_infinity() == value.is_positive() {
                positive_infinite = true;
            } else {
                negative_infinite = true;
            }
        } else {
            sum += value * bound;
        }
    }
    if positive_infinite {
        Rational::infinity()
    } else if negative_infinite {
        Rational::neg_infinity()
    } else {
        sum
    }
}

impl ExactLp {
    /**
     * Creates a row outside of the LP. The initial coefficients may be given in any order;
     * duplicates are summed and zeros are dropped. The caller holds the first use of the row and
     * must release it when done.
     */
    pub fn create_row(
        &mut self,
        name: impl Into<String>,
        companion: FpRowId,
        lhs: Rational,
        rhs: Rational,
        cols: &[(ColId, Rational)],
    ) -> Result<RowId> {
        let name = name.into();
        if lhs.is_infinity() || rhs.is_neg_infinity() || lhs > rhs {
            return Err(ExactLpError::invalid_modification(format!(
                "row <{}> has invalid sides [{}, {}]",
                name, lhs, rhs
            )));
        }
        if let Some((col, _)) = cols.iter().find(|(col, _)| !self.col_store.contains(*col)) {
            return Err(ExactLpError::invalid_modification(format!(
                "row <{}> refers to unknown column {}",
                name, col
            )));
        }
        if self.row_lookup.contains_key(&companion) {
            return Err(ExactLpError::invalid_modification(format!(
                "floating-point row {:?} is already mirrored",
                companion
            )));
        }

        let coefficients = normalize_coefficients(cols)?;
        let mut entries = vec![];
        ensure_size(&mut entries, coefficients.len(), "row entries")?;
        entries.extend(
            coefficients
                .into_iter()
                .map(|(col, value)| RowEntry::new(col, value, None)),
        );

        let id = self.row_store.insert_with(|id| ExactRow {
            id,
            name,
            companion,
            flushed_lhs: lhs.clone(),
            flushed_rhs: rhs.clone(),
            lhs,
            rhs,
            constant: Rational::zero(),
            nunlinked: entries.len(),
            entries,
            nlpcols: 0,
            lpcols_sorted: true,
            nonlpcols_sorted: true,
            lppos: None,
            lpipos: None,
            lhs_changed: false,
            rhs_changed: false,
            coef_changed: false,
            nlocks: 0,
            nuses: 1,
            activity: Rational::infinity(),
            valid_activity_lp: None,
            pseudo_activity: Rational::infinity(),
            valid_pseudo_activity: None,
            min_activity: Rational::infinity(),
            max_activity: Rational::infinity(),
            valid_activity_bounds: None,
        })?;
        log::trace!("create row {}", self.row_store[id]);
        self.row_lookup.insert(companion, id);
        Ok(id)
    }

    pub fn capture_row(&mut self, row: RowId) {
        self.row_store[row].nuses += 1;
    }

    /// Releases one use of a row. The row is freed when no use is left and the backend does not
    /// hold it.
    pub fn release_row(&mut self, row: RowId) -> Result<()> {
        let r = &mut self.row_store[row];
        debug_assert!(r.nuses > 0);
        r.nuses = r.nuses.saturating_sub(1);
        if r.nuses == 0 && r.lpipos.is_none() {
            self.free_row(row)?;
        }
        Ok(())
    }

    fn free_row(&mut self, row: RowId) -> Result<()> {
        debug_assert!(self.row_store[row].lppos.is_none());
        log::trace!("free row <{}>", self.row_store[row].name);
        self.row_unlink(row)?;
        for col in self.col_store.keys() {
            if self.col_store[col].nunlinked == 0 {
                continue;
            }
            while let Some(pos) = self.col_store[col]
                .entries
                .iter()
                .position(|entry| entry.row == row && entry.link.is_none())
            {
                self.col_del_coef_pos(col, pos)?;
            }
        }
        self.chg_rows.retain(|r| *r != row);
        if let Some(r) = self.row_store.remove(row) {
            self.row_lookup.remove(&r.companion);
        }
        Ok(())
    }

    /// Forbids changes to the coefficients of a row.
    pub fn lock_row(&mut self, row: RowId) {
        self.row_store[row].nlocks += 1;
    }

    pub fn unlock_row(&mut self, row: RowId) {
        let r = &mut self.row_store[row];
        debug_assert!(r.nlocks > 0);
        r.nlocks = r.nlocks.saturating_sub(1);
    }

    /// Adds a nonzero to a row, the mirror image of [`ExactLp::col_add_coef`].
    pub(crate) fn row_add_coef(
        &mut self,
        row: RowId,
        col: ColId,
        value: Rational,
        link: Option<usize>,
    ) -> Result<()> {
        debug_assert!(!value.is_zero());
        ensure_size(&mut self.row_store[row].entries, 1, "row entries")?;

        let col_in_lp = self.col_store[col].lppos.is_some();
        let r = &mut self.row_store[row];
        let mut pos = r.entries.len();
        r.entries.push(RowEntry::new(col, value.clone(), link));

        if col_in_lp && link.is_some() {
            let target = r.nlpcols;
            r.nlpcols += 1;
            self.row_move_coef(row, target, pos);
            pos = target;
        }

        let mut link = link;
        match link {
            None => {
                self.row_store[row].nunlinked += 1;
                if self.row_store[row].lppos.is_some() {
                    self.col_add_coef(col, row, value, Some(pos))?;
                    if col_in_lp {
                        pos = self.row_store[row].nlpcols - 1;
                    }
                    link = self.row_store[row].entries[pos].link;
                }
            }
            Some(linkpos) => {
                let partner = &mut self.col_store[col];
                debug_assert_eq!(partner.entries[linkpos].row, row);
                debug_assert!(partner.entries[linkpos].link.is_none());
                debug_assert!(partner.nunlinked > 0);
                partner.entries[linkpos].link = Some(pos);
                partner.nunlinked -= 1;

                if self.row_store[row].lppos.is_some() {
                    let partner = &mut self.col_store[col];
                    partner.nlprows += 1;
                    let target = partner.nlprows - 1;
                    self.col_swap_coefs(col, linkpos, target);
                    if linkpos == target {
                        self.col_store[col].lprows_sorted = false;
                    }
                }
            }
        }

        let r = &mut self.row_store[row];
        if col_in_lp && link.is_some() {
            debug_assert_eq!(r.entries[r.nlpcols - 1].column, col);
            if r.nlpcols > 1 {
                r.lpcols_sorted = r.lpcols_sorted && r.entries[r.nlpcols - 2].column < col;
            }
        } else {
            let len = r.entries.len();
            debug_assert_eq!(r.entries[len - 1].column, col);
            if len - r.nlpcols > 1 {
                r.nonlpcols_sorted = r.nonlpcols_sorted && r.entries[len - 2].column < col;
            }
        }

        self.coef_changed(row, col);
        Ok(())
    }

    /// Deletes the nonzero at `pos` from the row only. Fails if the row is locked.
    pub(crate) fn row_del_coef_pos(&mut self, row: RowId, pos: usize) -> Result<()> {
        self.check_row_unlocked(row, "delete a coefficient from")?;
        let r = &mut self.row_store[row];
        let col = r.entries[pos].column;
        if r.entries[pos].link.is_none() {
            r.nunlinked -= 1;
        }

        let mut pos = pos;
        if pos < r.nlpcols {
            let last_lp = r.nlpcols - 1;
            self.row_move_coef(row, last_lp, pos);
            self.row_store[row].nlpcols -= 1;
            pos = last_lp;
        }
        let last = self.row_store[row].entries.len() - 1;
        self.row_move_coef(row, last, pos);
        self.row_store[row].entries.pop();

        self.coef_changed(row, col);
        Ok(())
    }

    /// Sets the value of the nonzero at `pos` in the row only; zero deletes it.
    pub(crate) fn row_chg_coef_pos(&mut self, row: RowId, pos: usize, value: Rational) -> Result<()> {
        self.check_row_unlocked(row, "change a coefficient of")?;
        if value.is_zero() {
            return self.row_del_coef_pos(row, pos);
        }
        let entry = &mut self.row_store[row].entries[pos];
        if entry.value != value {
            entry.interval = value.to_interval();
            entry.value = value;
            let col = entry.column;
            self.coef_changed(row, col);
        }
        Ok(())
    }

    pub fn row_add_coefficient(&mut self, row: RowId, col: ColId, value: Rational) -> Result<()> {
        Self::check_coefficient(&value)?;
        self.check_row_unlocked(row, "add a coefficient to")?;
        if value.is_zero() {
            return Ok(());
        }
        self.row_add_coef(row, col, value, None)?;
        self.check_links_if_enabled();
        Ok(())
    }

    pub fn row_delete_coefficient(&mut self, row: RowId, col: ColId) -> Result<()> {
        self.check_row_unlocked(row, "delete a coefficient from")?;
        let pos = self.row_search_coef(row, col).ok_or_else(|| {
            anyhow::Error::from(ExactLpError::CoefficientNotFound {
                column: self.col_store[col].name.clone(),
                row: self.row_store[row].name.clone(),
            })
        })?;
        if let Some(link) = self.row_store[row].entries[pos].link {
            self.col_del_coef_pos(col, link)?;
        }
        self.row_del_coef_pos(row, pos)?;
        self.check_links_if_enabled();
        Ok(())
    }

    /// Sets a coefficient, inserting it if missing and deleting it if the new value is zero.
    pub fn row_change_coefficient(&mut self, row: RowId, col: ColId, value: Rational) -> Result<()> {
        Self::check_coefficient(&value)?;
        self.check_row_unlocked(row, "change a coefficient of")?;
        match self.row_search_coef(row, col) {
            None => {
                if !value.is_zero() {
                    self.row_add_coef(row, col, value, None)?;
                }
            }
            Some(pos) => {
                if let Some(link) = self.row_store[row].entries[pos].link {
                    self.col_chg_coef_pos(col, link, value.clone())?;
                }
                self.row_chg_coef_pos(row, pos, value)?;
            }
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// Adds `increment` to a coefficient, inserting it if missing.
    pub fn row_increase_coefficient(
        &mut self,
        row: RowId,
        col: ColId,
        increment: Rational,
    ) -> Result<()> {
        Self::check_coefficient(&increment)?;
        self.check_row_unlocked(row, "change a coefficient of")?;
        if increment.is_zero() {
            return Ok(());
        }
        match self.row_search_coef(row, col) {
            None => self.row_add_coef(row, col, increment, None)?,
            Some(pos) => {
                let value = &self.row_store[row].entries[pos].value + &increment;
                if let Some(link) = self.row_store[row].entries[pos].link {
                    self.col_chg_coef_pos(col, link, value.clone())?;
                }
                self.row_chg_coef_pos(row, pos, value)?;
            }
        }
        self.check_links_if_enabled();
        Ok(())
    }

    /// The coefficient of a column in a row, zero if the row has no such nonzero.
    pub fn row_coefficient(&mut self, row: RowId, col: ColId) -> Rational {
        match self.row_search_coef(row, col) {
            Some(pos) => self.row_store[row].entries[pos].value.clone(),
            None => Rational::zero(),
        }
    }

    pub fn change_row_lhs(&mut self, row: RowId, lhs: Rational) -> Result<()> {
        if lhs.is_infinity() {
            return Err(ExactLpError::invalid_modification(format!(
                "left-hand side of row <{}> cannot be infinity",
                self.row_store[row].name
            )));
        }
        if self.row_store[row].lhs == lhs {
            return Ok(());
        }
        self.row_store[row].lhs = lhs;
        self.row_side_changed(row, true, false)
    }

    pub fn change_row_rhs(&mut self, row: RowId, rhs: Rational) -> Result<()> {
        if rhs.is_neg_infinity() {
            return Err(ExactLpError::invalid_modification(format!(
                "right-hand side of row <{}> cannot be minus infinity",
                self.row_store[row].name
            )));
        }
        if self.row_store[row].rhs == rhs {
            return Ok(());
        }
        self.row_store[row].rhs = rhs;
        self.row_side_changed(row, false, true)
    }

    /// Sets the constant of a row. The backend receives the sides shifted by the constant, so
    /// every finite side counts as changed.
    pub fn change_row_constant(&mut self, row: RowId, constant: Rational) -> Result<()> {
        Self::check_coefficient(&constant)?;
        let r = &mut self.row_store[row];
        if r.constant == constant {
            return Ok(());
        }
        r.constant = constant;
        r.invalidate_activities();
        let lhs = !r.lhs.is_abs_infinity();
        let rhs = !r.rhs.is_abs_infinity();
        self.row_side_changed(row, lhs, rhs)
    }

    pub fn add_row_constant(&mut self, row: RowId, increment: Rational) -> Result<()> {
        let constant = &self.row_store[row].constant + &increment;
        self.change_row_constant(row, constant)
    }

    /**
     * Activity of a row in the last stored primal solution, constant included. Requires every
     * column of the row to be in the LP.
     */
    pub fn row_activity(&mut self, row: RowId) -> Result<Rational> {
        let r = &self.row_store[row];
        if r.valid_activity_lp == Some(self.lp_count) {
            return Ok(r.activity.clone());
        }
        if r.nlpcols != r.entries.len() {
            return Err(ExactLpError::invalid_modification(format!(
                "row <{}> has nonzeros in columns outside of the LP",
                r.name
            )));
        }
        let mut activity = r.constant.clone();
        for entry in &r.entries {
            activity += &entry.value * &self.col_store[entry.column].primsol;
        }
        let r = &mut self.row_store[row];
        r.activity = activity.clone();
        r.valid_activity_lp = Some(self.lp_count);
        Ok(activity)
    }

    /**
     * Activity of a row with every column at its best bound, constant included. If infinite
     * contributions of both signs occur, the result is reported as infinity.
     */
    pub fn row_pseudo_activity(&mut self, row: RowId) -> Rational {
        let r = &self.row_store[row];
        if r.valid_pseudo_activity == Some(self.dom_chg_count) {
            return r.pseudo_activity.clone();
        }
        let sum = bounded_sum(
            r.entries
                .iter()
                .map(|entry| (&entry.value, self.col_store[entry.column].best_bound())),
        );
        let activity = &sum + &r.constant;
        let r = &mut self.row_store[row];
        r.pseudo_activity = activity.clone();
        r.valid_pseudo_activity = Some(self.dom_chg_count);
        activity
    }

    /// Smallest activity of a row over the bounds of its columns, constant included.
    pub fn row_min_activity(&mut self, row: RowId) -> Rational {
        self.update_activity_bounds(row);
        self.row_store[row].min_activity.clone()
    }

    /// Largest activity of a row over the bounds of its columns, constant included.
    pub fn row_max_activity(&mut self, row: RowId) -> Rational {
        self.update_activity_bounds(row);
        self.row_store[row].max_activity.clone()
    }

    fn update_activity_bounds(&mut self, row: RowId) {
        let r = &self.row_store[row];
        if r.valid_activity_bounds == Some(self.dom_chg_count) {
            return;
        }
        let min = bounded_sum(r.entries.iter().map(|entry| {
            let col = &self.col_store[entry.column];
            (&entry.value, if entry.value.is_positive() { &col.lb } else { &col.ub })
        }));
        let max = bounded_sum(r.entries.iter().map(|entry| {
            let col = &self.col_store[entry.column];
            (&entry.value, if entry.value.is_positive() { &col.ub } else { &col.lb })
        }));
        let min = &min + &r.constant;
        let max = &max + &r.constant;
        let r = &mut self.row_store[row];
        r.min_activity = min;
        r.max_activity = max;
        r.valid_activity_bounds = Some(self.dom_chg_count);
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        exact_lp::{
            exact_lp::test_support::{column, new_lp, row},
            exact_lp_error::ExactLpError,
        },
        floating::floating_relaxation::FpRowId,
        lp_backend::memory_backend::MemoryBackend,
        math::{rational::Rational, traits::Infinite},
    };

    #[test]
    fn linked_add_then_delete_restores_both_sides() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        let y = column(&mut lp, 1, 1, &[]);
        let c = row(&mut lp, 0, 0, 10, &[(x, 1)]);
        lp.add_column(x).unwrap();
        lp.add_column(y).unwrap();
        lp.add_row(c).unwrap();

        let counts = |lp: &crate::exact_lp::exact_lp::ExactLp| {
            let col = lp.column(y).unwrap();
            let r = lp.row(c).unwrap();
            (
                (col.len(), col.nlprows(), col.nunlinked()),
                (r.len(), r.nlpcols(), r.nunlinked()),
            )
        };

        // before the flush the nonzero of x is only known to the row
        let before = counts(&lp);
        assert_eq!(before, ((0, 0, 0), (1, 0, 1)));
        lp.column_add_coefficient(y, c, r!(2)).unwrap();
        assert_eq!(counts(&lp), ((1, 1, 0), (2, 1, 1)));
        lp.row_delete_coefficient(c, y).unwrap();
        assert_eq!(counts(&lp), before);
        lp.check_links();

        lp.flush(&mut backend).unwrap();
        let before = counts(&lp);
        assert_eq!(before, ((0, 0, 0), (1, 1, 0)));
        lp.row_add_coefficient(c, y, r!(3)).unwrap();
        assert_eq!(counts(&lp), ((1, 1, 0), (2, 2, 0)));
        lp.row_delete_coefficient(c, y).unwrap();
        assert_eq!(counts(&lp), before);

        lp.row_add_coefficient(c, y, r!(4)).unwrap();
        lp.column_delete_coefficient(y, c).unwrap();
        assert_eq!(counts(&lp), before);
        assert_eq!(lp.column(x).unwrap().nlprows(), 1);
        lp.check_links();
    }

    #[test]
    fn create_rejects_crossed_sides() {
        let mut lp = new_lp();
        assert!(lp.create_row("c", FpRowId(0), r!(2), r!(1), &[]).is_err());
        assert!(
            lp.create_row("c", FpRowId(0), Rational::infinity(), Rational::infinity(), &[])
                .is_err()
        );
    }

    #[test]
    fn locked_row_rejects_delete() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let y = column(&mut lp, 1, 1, &[]);
        let c = row(&mut lp, 0, 4, 4, &[(x, 1), (y, 2)]);
        lp.lock_row(c);

        let err = lp.row_delete_coefficient(c, x).unwrap_err();
        assert!(matches!(
            ExactLpError::kind_of(&err),
            Some(ExactLpError::InvalidModification { .. })
        ));
        let err = lp.column_change_coefficient(y, c, r!(3)).unwrap_err();
        assert!(matches!(
            ExactLpError::kind_of(&err),
            Some(ExactLpError::InvalidModification { .. })
        ));
        assert_eq!(lp.row(c).unwrap().len(), 2);
        assert_eq!(lp.row_coefficient(c, y), r!(2));

        lp.unlock_row(c);
        lp.row_delete_coefficient(c, x).unwrap();
        assert_eq!(lp.row(c).unwrap().len(), 1);
    }

    #[test]
    fn release_frees_row() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let c = row(&mut lp, 0, 0, 1, &[(x, 1)]);
        lp.add_column(x).unwrap();
        lp.add_row(c).unwrap();
        lp.release_row(c).unwrap();
        assert_eq!(lp.row(c).unwrap().nuses(), 1);

        lp.shrink_rows(0).unwrap();
        assert!(lp.row(c).is_none());
        assert!(lp.column(x).unwrap().is_empty());
        assert_eq!(lp.exact_row_of(FpRowId(0)), None);
    }

    #[test]
    fn activities() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let y = column(&mut lp, 1, -1, &[]);
        lp.change_column_ub(x, r!(4)).unwrap();
        lp.change_column_ub(y, r!(3)).unwrap();
        let c = row(&mut lp, 0, 0, 10, &[(x, 2), (y, -1)]);
        lp.change_row_constant(c, r!(1)).unwrap();

        // x at lb 0, y at ub 3
        assert_eq!(lp.row_pseudo_activity(c), r!(-2));
        assert_eq!(lp.row_min_activity(c), r!(-2));
        assert_eq!(lp.row_max_activity(c), r!(9));

        lp.change_column_lb(x, r!(1)).unwrap();
        assert_eq!(lp.row_pseudo_activity(c), r!(0));

        lp.change_column_ub(y, Rational::infinity()).unwrap();
        assert!(lp.row_min_activity(c).is_neg_infinity());
        assert!(lp.row_pseudo_activity(c).is_neg_infinity());
    }

    #[test]
    fn lp_activity() {
        let mut lp = new_lp();
        let mut backend = crate::lp_backend::memory_backend::MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        let y = column(&mut lp, 1, 1, &[]);
        let c = row(&mut lp, 0, 0, 10, &[(x, 2), (y, 3)]);
        lp.add_column(x).unwrap();
        assert!(lp.row_activity(c).is_err());
        lp.add_column(y).unwrap();
        lp.add_row(c).unwrap();
        lp.flush(&mut backend).unwrap();
        lp.store_primal_solution(&[r!(1), r!(1, 3)]).unwrap();
        assert_eq!(lp.row_activity(c).unwrap(), r!(3));
    }

    #[test]
    fn display() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let c = row(&mut lp, 0, 1, 2, &[(x, 3)]);
        assert_eq!(format!("{}", lp.row(c).unwrap()), "c0: 1 <= 3 col#0 <= 2");
    }
}
