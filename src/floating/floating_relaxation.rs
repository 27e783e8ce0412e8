use rustc_hash::FxHashMap;

use crate::{exact_lp::exact_lp::ExactLp, math::rational::Rational};

/// Handle of a column of the floating-point LP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FpColumnId(pub usize);

/// Handle of a row of the floating-point LP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FpRowId(pub usize);

/// A column of the floating-point LP as the exact LP sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct FpColumn {
    pub lppos: Option<usize>,
    pub lpipos: Option<usize>,
    pub obj: f64,
    pub lb: f64,
    pub ub: f64,
    pub rows: Vec<FpRowId>,
    pub values: Vec<f64>,
    pub links: Vec<Option<usize>>,
}

/// A row of the floating-point LP as the exact LP sees it.
#[derive(Clone, Debug, PartialEq)]
pub struct FpRow {
    pub lppos: Option<usize>,
    pub lpipos: Option<usize>,
    pub lhs: f64,
    pub rhs: f64,
    pub constant: f64,
    pub cols: Vec<FpColumnId>,
    pub values: Vec<f64>,
    pub links: Vec<Option<usize>>,
}

/// Read access to the floating-point LP that an exact LP shadows.
pub trait FloatingRelaxation {
    fn column(&self, id: FpColumnId) -> Option<&FpColumn>;

    fn row(&self, id: FpRowId) -> Option<&FpRow>;

    /// Values at or beyond this magnitude are infinite.
    fn infinity(&self) -> f64;
}

/// Rounds an exact value the way the floating-point LP stores it: anything at or beyond the
/// infinity threshold becomes the threshold itself.
pub fn round_to_lp(value: &Rational, infinity: f64) -> f64 {
    let approx = value.to_f64();
    if approx >= infinity {
        infinity
    } else if approx <= -infinity {
        -infinity
    } else {
        approx
    }
}

/// A floating-point LP held in memory.
#[derive(Clone, Debug)]
pub struct FloatingLp {
    columns: FxHashMap<FpColumnId, FpColumn>,
    rows: FxHashMap<FpRowId, FpRow>,
    infinity: f64,
}

impl FloatingLp {
    pub fn new(infinity: f64) -> Self {
        Self {
            columns: FxHashMap::default(),
            rows: FxHashMap::default(),
            infinity,
        }
    }

    /**
     * The floating-point LP that agrees with the given exact LP: every column and row rounded,
     * with the same positions and link structure.
     */
    pub fn mirror(lp: &ExactLp) -> Self {
        let infinity = lp.settings().infinity;
        let mut result = Self::new(infinity);
        for (_, col) in lp.col_store.iter() {
            result.columns.insert(
                col.companion(),
                FpColumn {
                    lppos: col.lppos(),
                    lpipos: col.lpipos(),
                    obj: round_to_lp(col.obj(), infinity),
                    lb: round_to_lp(col.lb(), infinity),
                    ub: round_to_lp(col.ub(), infinity),
                    rows: col
                        .entries()
                        .iter()
                        .map(|entry| lp.row_store[entry.row()].companion())
                        .collect(),
                    values: col
                        .entries()
                        .iter()
                        .map(|entry| round_to_lp(entry.value(), infinity))
                        .collect(),
                    links: col.entries().iter().map(|entry| entry.link()).collect(),
                },
            );
        }
        for (_, row) in lp.row_store.iter() {
            result.rows.insert(
                row.companion(),
                FpRow {
                    lppos: row.lppos(),
                    lpipos: row.lpipos(),
                    lhs: round_to_lp(row.lhs(), infinity),
                    rhs: round_to_lp(row.rhs(), infinity),
                    constant: round_to_lp(row.constant(), infinity),
                    cols: row
                        .entries()
                        .iter()
                        .map(|entry| lp.col_store[entry.column()].companion())
                        .collect(),
                    values: row
                        .entries()
                        .iter()
                        .map(|entry| round_to_lp(entry.value(), infinity))
                        .collect(),
                    links: row.entries().iter().map(|entry| entry.link()).collect(),
                },
            );
        }
        log::debug!(
            "mirrored exact LP <{}> into {} floating-point columns and {} rows",
            lp.name(),
            result.columns.len(),
            result.rows.len()
        );
        result
    }

    pub fn insert_column(&mut self, id: FpColumnId, column: FpColumn) {
        self.columns.insert(id, column);
    }

    pub fn insert_row(&mut self, id: FpRowId, row: FpRow) {
        self.rows.insert(id, row);
    }

    pub fn column_mut(&mut self, id: FpColumnId) -> Option<&mut FpColumn> {
        self.columns.get_mut(&id)
    }

    pub fn row_mut(&mut self, id: FpRowId) -> Option<&mut FpRow> {
        self.rows.get_mut(&id)
    }
}

impl FloatingRelaxation for FloatingLp {
    fn column(&self, id: FpColumnId) -> Option<&FpColumn> {
        self.columns.get(&id)
    }

    fn row(&self, id: FpRowId) -> Option<&FpRow> {
        self.rows.get(&id)
    }

    fn infinity(&self) -> f64 {
        self.infinity
    }
}
