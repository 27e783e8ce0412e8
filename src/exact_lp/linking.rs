//! Maintenance of the two-sided nonzero structure.
//!
//! Every nonzero may be stored twice, once in its column and once in its row, and linked entries
//! know each other's position. Whenever an entry moves, its partner's link is updated; whenever an
//! entity enters or leaves the LP, the linked entries in its partners move between the LP and the
//! non-LP part.

use anyhow::Result;

use crate::exact_lp::{exact_column::ColId, exact_lp::ExactLp, exact_row::RowId};

impl ExactLp {
    /// Moves the column entry at `from` to `to`; the entry previously at `to` ends up at `from`
    /// and is expected to be overwritten or dropped by the caller.
    pub(crate) fn col_move_coef(&mut self, col: ColId, from: usize, to: usize) {
        if from == to {
            return;
        }
        let column = &mut self.col_store[col];
        column.entries.swap(from, to);
        let (row, link) = (column.entries[to].row, column.entries[to].link);
        if let Some(link) = link {
            self.row_store[row].entries[link].link = Some(to);
        }
        self.col_mark_unsorted(col, to);
    }

    pub(crate) fn col_swap_coefs(&mut self, col: ColId, pos1: usize, pos2: usize) {
        if pos1 == pos2 {
            return;
        }
        self.col_store[col].entries.swap(pos1, pos2);
        for pos in [pos1, pos2] {
            let entry = &self.col_store[col].entries[pos];
            if let Some(link) = entry.link {
                let row = entry.row;
                self.row_store[row].entries[link].link = Some(pos);
            }
            self.col_mark_unsorted(col, pos);
        }
    }

    /// Marks the part of the column that the entry at `pos` belongs to as unsorted.
    fn col_mark_unsorted(&mut self, col: ColId, pos: usize) {
        let entry = &self.col_store[col].entries[pos];
        let in_lp_part = entry.link.is_some() && self.row_store[entry.row].lppos.is_some();
        let column = &mut self.col_store[col];
        if in_lp_part {
            column.lprows_sorted = false;
        } else {
            column.nonlprows_sorted = false;
        }
    }

    pub(crate) fn row_move_coef(&mut self, row: RowId, from: usize, to: usize) {
        if from == to {
            return;
        }
        let r = &mut self.row_store[row];
        r.entries.swap(from, to);
        let (col, link) = (r.entries[to].column, r.entries[to].link);
        if let Some(link) = link {
            self.col_store[col].entries[link].link = Some(to);
        }
        self.row_mark_unsorted(row, to);
    }

    pub(crate) fn row_swap_coefs(&mut self, row: RowId, pos1: usize, pos2: usize) {
        if pos1 == pos2 {
            return;
        }
        self.row_store[row].entries.swap(pos1, pos2);
        for pos in [pos1, pos2] {
            let entry = &self.row_store[row].entries[pos];
            if let Some(link) = entry.link {
                let col = entry.column;
                self.col_store[col].entries[link].link = Some(pos);
            }
            self.row_mark_unsorted(row, pos);
        }
    }

    fn row_mark_unsorted(&mut self, row: RowId, pos: usize) {
        let entry = &self.row_store[row].entries[pos];
        let in_lp_part = entry.link.is_some() && self.col_store[entry.column].lppos.is_some();
        let r = &mut self.row_store[row];
        if in_lp_part {
            r.lpcols_sorted = false;
        } else {
            r.nonlpcols_sorted = false;
        }
    }

    /// Points the partners of the column entries in `range` back at their current positions.
    fn col_relink(&mut self, col: ColId, range: std::ops::Range<usize>) {
        for pos in range {
            let entry = &self.col_store[col].entries[pos];
            if let Some(link) = entry.link {
                self.row_store[entry.row].entries[link].link = Some(pos);
            }
        }
    }

    fn row_relink(&mut self, row: RowId, range: std::ops::Range<usize>) {
        for pos in range {
            let entry = &self.row_store[row].entries[pos];
            if let Some(link) = entry.link {
                self.col_store[entry.column].entries[link].link = Some(pos);
            }
        }
    }

    pub(crate) fn col_sort_lp(&mut self, col: ColId) {
        let column = &mut self.col_store[col];
        if column.lprows_sorted {
            return;
        }
        let n = column.nlprows;
        column.entries[..n].sort_unstable_by_key(|entry| entry.row);
        column.lprows_sorted = true;
        self.col_relink(col, 0..n);
    }

    pub(crate) fn col_sort_nonlp(&mut self, col: ColId) {
        let column = &mut self.col_store[col];
        if column.nonlprows_sorted {
            return;
        }
        let (start, end) = (column.nlprows, column.entries.len());
        column.entries[start..].sort_unstable_by_key(|entry| entry.row);
        column.nonlprows_sorted = true;
        self.col_relink(col, start..end);
    }

    pub(crate) fn row_sort_lp(&mut self, row: RowId) {
        let r = &mut self.row_store[row];
        if r.lpcols_sorted {
            return;
        }
        let n = r.nlpcols;
        r.entries[..n].sort_unstable_by_key(|entry| entry.column);
        r.lpcols_sorted = true;
        self.row_relink(row, 0..n);
    }

    pub(crate) fn row_sort_nonlp(&mut self, row: RowId) {
        let r = &mut self.row_store[row];
        if r.nonlpcols_sorted {
            return;
        }
        let (start, end) = (r.nlpcols, r.entries.len());
        r.entries[start..].sort_unstable_by_key(|entry| entry.column);
        r.nonlpcols_sorted = true;
        self.row_relink(row, start..end);
    }

    /// Sorts both parts of a column by row, if they are not sorted already.
    pub fn sort_column(&mut self, col: ColId) {
        self.col_sort_lp(col);
        self.col_sort_nonlp(col);
    }

    /// Sorts both parts of a row by column, if they are not sorted already.
    pub fn sort_row(&mut self, row: RowId) {
        self.row_sort_lp(row);
        self.row_sort_nonlp(row);
    }

    /**
     * Position of the nonzero of `row` in the column. A row of the LP is looked up in the LP part
     * first; the rest is only searched if it can hold the row.
     */
    pub(crate) fn col_search_coef(&mut self, col: ColId, row: RowId) -> Option<usize> {
        let row_in_lp = self.row_store[row].lppos.is_some();
        if row_in_lp {
            self.col_sort_lp(col);
            let column = &self.col_store[col];
            if let Ok(pos) = column.entries[..column.nlprows].binary_search_by_key(&row, |e| e.row)
            {
                return Some(pos);
            }
        }
        if !row_in_lp || self.col_store[col].nunlinked > 0 {
            self.col_sort_nonlp(col);
            let column = &self.col_store[col];
            if let Ok(pos) = column.entries[column.nlprows..].binary_search_by_key(&row, |e| e.row)
            {
                return Some(column.nlprows + pos);
            }
        }
        None
    }

    pub(crate) fn row_search_coef(&mut self, row: RowId, col: ColId) -> Option<usize> {
        let col_in_lp = self.col_store[col].lppos.is_some();
        if col_in_lp {
            self.row_sort_lp(row);
            let r = &self.row_store[row];
            if let Ok(pos) = r.entries[..r.nlpcols].binary_search_by_key(&col, |e| e.column) {
                return Some(pos);
            }
        }
        if !col_in_lp || self.row_store[row].nunlinked > 0 {
            self.row_sort_nonlp(row);
            let r = &self.row_store[row];
            if let Ok(pos) = r.entries[r.nlpcols..].binary_search_by_key(&col, |e| e.column) {
                return Some(r.nlpcols + pos);
            }
        }
        None
    }

    /// Hands every unlinked nonzero of the column to its row.
    pub(crate) fn col_link(&mut self, col: ColId) -> Result<()> {
        if self.col_store[col].nunlinked == 0 {
            return Ok(());
        }
        log::trace!("link column <{}>", self.col_store[col].name);
        let (start, end) = (self.col_store[col].nlprows, self.col_store[col].entries.len());
        for pos in start..end {
            let entry = &self.col_store[col].entries[pos];
            if entry.link.is_none() {
                let (row, value) = (entry.row, entry.value.clone());
                self.row_add_coef(row, col, value, Some(pos))?;
            }
        }
        debug_assert_eq!(self.col_store[col].nunlinked, 0);
        Ok(())
    }

    /// Removes every linked nonzero of the column from its row; the column keeps them unlinked.
    pub(crate) fn col_unlink(&mut self, col: ColId) -> Result<()> {
        let column = &self.col_store[col];
        if column.nunlinked == column.entries.len() {
            return Ok(());
        }
        log::trace!("unlink column <{}>", column.name);
        for pos in 0..self.col_store[col].entries.len() {
            let entry = &self.col_store[col].entries[pos];
            if let Some(link) = entry.link {
                let row = entry.row;
                self.row_del_coef_pos(row, link)?;
                let column = &mut self.col_store[col];
                column.entries[pos].link = None;
                column.nunlinked += 1;
            }
        }
        let column = &mut self.col_store[col];
        column.nlprows = 0;
        column.nonlprows_sorted = false;
        Ok(())
    }

    /// Hands every unlinked nonzero of the row to its column.
    pub(crate) fn row_link(&mut self, row: RowId) -> Result<()> {
        if self.row_store[row].nunlinked == 0 {
            return Ok(());
        }
        log::trace!("link row <{}>", self.row_store[row].name);
        let (start, end) = (self.row_store[row].nlpcols, self.row_store[row].entries.len());
        for pos in start..end {
            let entry = &self.row_store[row].entries[pos];
            if entry.link.is_none() {
                let (col, value) = (entry.column, entry.value.clone());
                self.col_add_coef(col, row, value, Some(pos))?;
            }
        }
        debug_assert_eq!(self.row_store[row].nunlinked, 0);
        Ok(())
    }

    pub(crate) fn row_unlink(&mut self, row: RowId) -> Result<()> {
        let r = &self.row_store[row];
        if r.nunlinked == r.entries.len() {
            return Ok(());
        }
        log::trace!("unlink row <{}>", r.name);
        for pos in 0..self.row_store[row].entries.len() {
            let entry = &self.row_store[row].entries[pos];
            if let Some(link) = entry.link {
                let col = entry.column;
                self.col_del_coef_pos(col, link)?;
                let r = &mut self.row_store[row];
                r.entries[pos].link = None;
                r.nunlinked += 1;
            }
        }
        let r = &mut self.row_store[row];
        r.nlpcols = 0;
        r.nonlpcols_sorted = false;
        Ok(())
    }

    /// Moves the linked nonzeros of a column that just entered the LP into the LP part of their
    /// rows.
    pub(crate) fn col_update_add_lp(&mut self, col: ColId) {
        debug_assert!(self.col_store[col].lppos.is_some());
        for pos in 0..self.col_store[col].entries.len() {
            let entry = &self.col_store[col].entries[pos];
            if let Some(link) = entry.link {
                let row = entry.row;
                let r = &mut self.row_store[row];
                debug_assert!(link >= r.nlpcols);
                r.nlpcols += 1;
                let target = r.nlpcols - 1;
                self.row_swap_coefs(row, link, target);
                if link == target {
                    self.row_store[row].lpcols_sorted = false;
                }
            }
        }
    }

    /// Moves the linked nonzeros of a column that just left the LP out of the LP part of their
    /// rows.
    pub(crate) fn col_update_del_lp(&mut self, col: ColId) {
        debug_assert!(self.col_store[col].lppos.is_none());
        for pos in 0..self.col_store[col].entries.len() {
            let entry = &self.col_store[col].entries[pos];
            if let Some(link) = entry.link {
                let row = entry.row;
                let r = &mut self.row_store[row];
                debug_assert!(link < r.nlpcols);
                r.nlpcols -= 1;
                let target = r.nlpcols;
                self.row_swap_coefs(row, link, target);
                if link == target {
                    self.row_store[row].nonlpcols_sorted = false;
                }
            }
        }
    }

    pub(crate) fn row_update_add_lp(&mut self, row: RowId) {
        debug_assert!(self.row_store[row].lppos.is_some());
        for pos in 0..self.row_store[row].entries.len() {
            let entry = &self.row_store[row].entries[pos];
            if let Some(link) = entry.link {
                let col = entry.column;
                let column = &mut self.col_store[col];
                debug_assert!(link >= column.nlprows);
                column.nlprows += 1;
                let target = column.nlprows - 1;
                self.col_swap_coefs(col, link, target);
                if link == target {
                    self.col_store[col].lprows_sorted = false;
                }
            }
        }
    }

    pub(crate) fn row_update_del_lp(&mut self, row: RowId) {
        debug_assert!(self.row_store[row].lppos.is_none());
        for pos in 0..self.row_store[row].entries.len() {
            let entry = &self.row_store[row].entries[pos];
            if let Some(link) = entry.link {
                let col = entry.column;
                let column = &mut self.col_store[col];
                debug_assert!(link < column.nlprows);
                column.nlprows -= 1;
                let target = column.nlprows;
                self.col_swap_coefs(col, link, target);
                if link == target {
                    self.col_store[col].nonlprows_sorted = false;
                }
            }
        }
    }

    /**
     * Verifies the complete link structure: symmetry of links and values, the LP/non-LP
     * partition, the unlinked counters and the sortedness flags. Panics on the first violation.
     */
    pub fn check_links(&self) {
        for (id, col) in self.col_store.iter() {
            assert!(col.nlprows <= col.entries.len(), "column <{}> has too many LP rows", col.name);
            let mut unlinked = 0;
            for (pos, entry) in col.entries.iter().enumerate() {
                let row = self
                    .row_store
                    .get(entry.row)
                    .unwrap_or_else(|| panic!("column <{}> refers to a freed row", col.name));
                match entry.link {
                    Some(link) => {
                        let partner = &row.entries[link];
                        assert_eq!(partner.column, id, "broken link in column <{}>", col.name);
                        assert_eq!(partner.link, Some(pos), "asymmetric link in column <{}>", col.name);
                        assert_eq!(partner.value, entry.value, "value mismatch in column <{}>", col.name);
                    }
                    None => unlinked += 1,
                }
                let lp_part = entry.link.is_some() && row.lppos.is_some();
                assert_eq!(
                    pos < col.nlprows,
                    lp_part,
                    "column <{}> has entry {} in the wrong part",
                    col.name,
                    pos
                );
            }
            assert_eq!(unlinked, col.nunlinked, "unlinked count of column <{}>", col.name);
            if col.lprows_sorted {
                assert!(
                    col.entries[..col.nlprows].windows(2).all(|w| w[0].row < w[1].row),
                    "LP rows of column <{}> are not sorted",
                    col.name
                );
            }
            if col.nonlprows_sorted {
                assert!(
                    col.entries[col.nlprows..].windows(2).all(|w| w[0].row < w[1].row),
                    "non-LP rows of column <{}> are not sorted",
                    col.name
                );
            }
        }

        for (id, row) in self.row_store.iter() {
            assert!(row.nlpcols <= row.entries.len(), "row <{}> has too many LP columns", row.name);
            let mut unlinked = 0;
            for (pos, entry) in row.entries.iter().enumerate() {
                let col = self
                    .col_store
                    .get(entry.column)
                    .unwrap_or_else(|| panic!("row <{}> refers to a freed column", row.name));
                match entry.link {
                    Some(link) => {
                        let partner = &col.entries[link];
                        assert_eq!(partner.row, id, "broken link in row <{}>", row.name);
                        assert_eq!(partner.link, Some(pos), "asymmetric link in row <{}>", row.name);
                    }
                    None => unlinked += 1,
                }
                let lp_part = entry.link.is_some() && col.lppos.is_some();
                assert_eq!(
                    pos < row.nlpcols,
                    lp_part,
                    "row <{}> has entry {} in the wrong part",
                    row.name,
                    pos
                );
            }
            assert_eq!(unlinked, row.nunlinked, "unlinked count of row <{}>", row.name);
            if row.lpcols_sorted {
                assert!(
                    row.entries[..row.nlpcols].windows(2).all(|w| w[0].column < w[1].column),
                    "LP columns of row <{}> are not sorted",
                    row.name
                );
            }
            if row.nonlpcols_sorted {
                assert!(
                    row.entries[row.nlpcols..].windows(2).all(|w| w[0].column < w[1].column),
                    "non-LP columns of row <{}> are not sorted",
                    row.name
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use ntest::timeout;

    use crate::{
        exact_lp::exact_lp::test_support::{column, new_lp, row},
        lp_backend::memory_backend::MemoryBackend,
    };

    #[test]
    #[timeout(5000)]
    fn flush_links_both_sides() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        let y = column(&mut lp, 1, 1, &[]);
        let c0 = row(&mut lp, 0, 0, 5, &[(y, 2), (x, 1)]);
        let c1 = row(&mut lp, 1, 0, 5, &[(x, 3)]);
        for c in [x, y] {
            lp.add_column(c).unwrap();
        }
        for r in [c0, c1] {
            lp.add_row(r).unwrap();
        }
        lp.flush(&mut backend).unwrap();

        let col = lp.column(x).unwrap();
        assert_eq!(col.nunlinked(), 0);
        assert_eq!(col.nlprows(), 2);
        for (pos, entry) in col.entries().iter().enumerate() {
            let partner = &lp.row(entry.row()).unwrap().entries()[entry.link().unwrap()];
            assert_eq!(partner.column(), x);
            assert_eq!(partner.link(), Some(pos));
        }
        assert_eq!(lp.row(c0).unwrap().nlpcols(), 2);
        lp.check_links();
    }

    #[test]
    fn sorting_keeps_links() {
        let mut lp = new_lp();
        let cols: Vec<_> = (0..6).map(|i| column(&mut lp, i, 1, &[])).collect();
        let c = row(&mut lp, 0, 0, 5, &[]);
        lp.add_row(c).unwrap();
        for (i, col) in cols.iter().enumerate().rev() {
            lp.row_add_coefficient(c, *col, r!(i as i64 + 1)).unwrap();
        }
        for col in cols.iter().step_by(2) {
            lp.add_column(*col).unwrap();
        }
        assert!(!lp.row(c).unwrap().nonlpcols_sorted);

        lp.sort_row(c);
        let r = lp.row(c).unwrap();
        assert!(r.entries()[..r.nlpcols()].windows(2).all(|w| w[0].column() < w[1].column()));
        assert!(r.entries()[r.nlpcols()..].windows(2).all(|w| w[0].column() < w[1].column()));
        assert_eq!(r.nlpcols(), 3);
        lp.check_links();

        for (i, col) in cols.iter().enumerate() {
            assert_eq!(lp.row_coefficient(c, *col), r!(i as i64 + 1));
        }
    }

    #[test]
    fn entering_and_leaving_the_lp_moves_entries() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let c0 = row(&mut lp, 0, 0, 5, &[]);
        let c1 = row(&mut lp, 1, 0, 5, &[]);
        lp.row_add_coefficient(c0, x, r!(1)).unwrap();
        lp.row_add_coefficient(c1, x, r!(2)).unwrap();
        lp.add_column(x).unwrap();
        lp.add_row(c1).unwrap();

        // both nonzeros are unlinked until someone links them
        assert_eq!(lp.column(x).unwrap().len(), 0);
        lp.row_link(c1).unwrap();
        assert_eq!(lp.column(x).unwrap().nlprows(), 1);
        assert_eq!(lp.row(c1).unwrap().nlpcols(), 1);

        lp.shrink_rows(0).unwrap();
        assert_eq!(lp.column(x).unwrap().nlprows(), 0);
        lp.shrink_columns(0).unwrap();
        assert_eq!(lp.row(c1).unwrap().nlpcols(), 0);
        lp.check_links();
    }
}
