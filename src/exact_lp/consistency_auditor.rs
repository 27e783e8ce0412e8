use std::fmt::Display;

use crate::{
    exact_lp::exact_lp::ExactLp,
    floating::floating_relaxation::{FloatingRelaxation, round_to_lp},
    math::rational::Rational,
};

/// A disagreement between an exact entity and its floating-point companion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inconsistency {
    pub entity: String,
    pub detail: String,
}

impl Display for Inconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.entity, self.detail)
    }
}

/// Whether a floating value is what the exact value rounds to. A floating infinity marker only
/// requires the exact value to be at least as large in magnitude.
fn agrees(exact: &Rational, fp: f64, infinity: f64) -> bool {
    if fp >= infinity {
        exact.to_f64() >= infinity
    } else if fp <= -infinity {
        exact.to_f64() <= -infinity
    } else {
        round_to_lp(exact, infinity) == fp
    }
}

struct Findings {
    found: Vec<Inconsistency>,
}

impl Findings {
    fn check(&mut self, entity: &str, ok: bool, detail: impl FnOnce() -> String) {
        if !ok {
            self.found.push(Inconsistency {
                entity: entity.to_string(),
                detail: detail(),
            });
        }
    }
}

/**
 * Compares every column and row of the exact LP with its floating-point companion: positions,
 * lengths, partners, link positions, and the rounded objective, bounds, sides, constants and
 * coefficients.
 */
pub fn audit(lp: &ExactLp, fp: &impl FloatingRelaxation) -> Vec<Inconsistency> {
    let infinity = fp.infinity();
    let mut findings = Findings { found: vec![] };

    for (_, col) in lp.col_store.iter() {
        let entity = format!("column <{}>", col.name());
        let Some(fp_col) = fp.column(col.companion()) else {
            findings.check(&entity, false, || "no floating-point companion".to_string());
            continue;
        };
        findings.check(&entity, col.lppos() == fp_col.lppos, || {
            format!("LP position {:?} vs {:?}", col.lppos(), fp_col.lppos)
        });
        findings.check(&entity, col.lpipos() == fp_col.lpipos, || {
            format!("backend position {:?} vs {:?}", col.lpipos(), fp_col.lpipos)
        });
        findings.check(&entity, agrees(col.obj(), fp_col.obj, infinity), || {
            format!("objective {} vs {}", col.obj(), fp_col.obj)
        });
        findings.check(&entity, agrees(col.lb(), fp_col.lb, infinity), || {
            format!("lower bound {} vs {}", col.lb(), fp_col.lb)
        });
        findings.check(&entity, agrees(col.ub(), fp_col.ub, infinity), || {
            format!("upper bound {} vs {}", col.ub(), fp_col.ub)
        });
        if col.len() != fp_col.rows.len() {
            findings.check(&entity, false, || {
                format!("{} nonzeros vs {}", col.len(), fp_col.rows.len())
            });
            continue;
        }
        for (pos, entry) in col.entries().iter().enumerate() {
            let partner = lp.row_store[entry.row()].companion();
            findings.check(&entity, partner == fp_col.rows[pos], || {
                format!("nonzero {} lies in {:?} vs {:?}", pos, partner, fp_col.rows[pos])
            });
            findings.check(&entity, entry.link() == fp_col.links[pos], || {
                format!("nonzero {} linked to {:?} vs {:?}", pos, entry.link(), fp_col.links[pos])
            });
            findings.check(&entity, agrees(entry.value(), fp_col.values[pos], infinity), || {
                format!("nonzero {} value {} vs {}", pos, entry.value(), fp_col.values[pos])
            });
        }
    }

    for (_, row) in lp.row_store.iter() {
        let entity = format!("row <{}>", row.name());
        let Some(fp_row) = fp.row(row.companion()) else {
            findings.check(&entity, false, || "no floating-point companion".to_string());
            continue;
        };
        findings.check(&entity, row.lppos() == fp_row.lppos, || {
            format!("LP position {:?} vs {:?}", row.lppos(), fp_row.lppos)
        });
        findings.check(&entity, row.lpipos() == fp_row.lpipos, || {
            format!("backend position {:?} vs {:?}", row.lpipos(), fp_row.lpipos)
        });
        findings.check(&entity, agrees(row.lhs(), fp_row.lhs, infinity), || {
            format!("left-hand side {} vs {}", row.lhs(), fp_row.lhs)
        });
        findings.check(&entity, agrees(row.rhs(), fp_row.rhs, infinity), || {
            format!("right-hand side {} vs {}", row.rhs(), fp_row.rhs)
        });
        findings.check(&entity, agrees(row.constant(), fp_row.constant, infinity), || {
            format!("constant {} vs {}", row.constant(), fp_row.constant)
        });
        if row.len() != fp_row.cols.len() {
            findings.check(&entity, false, || {
                format!("{} nonzeros vs {}", row.len(), fp_row.cols.len())
            });
            continue;
        }
        for (pos, entry) in row.entries().iter().enumerate() {
            let partner = lp.col_store[entry.column()].companion();
            findings.check(&entity, partner == fp_row.cols[pos], || {
                format!("nonzero {} lies in {:?} vs {:?}", pos, partner, fp_row.cols[pos])
            });
            findings.check(&entity, entry.link() == fp_row.links[pos], || {
                format!("nonzero {} linked to {:?} vs {:?}", pos, entry.link(), fp_row.links[pos])
            });
            findings.check(&entity, agrees(entry.value(), fp_row.values[pos], infinity), || {
                format!("nonzero {} value {} vs {}", pos, entry.value(), fp_row.values[pos])
            });
        }
    }

    findings.found
}

/// Panics if the exact LP and its floating-point companion disagree anywhere.
pub fn assert_synced(lp: &ExactLp, fp: &impl FloatingRelaxation) {
    let found = audit(lp, fp);
    for inconsistency in &found {
        log::error!("exact LP <{}> out of sync: {}", lp.name(), inconsistency);
    }
    assert!(
        found.is_empty(),
        "exact LP <{}> is out of sync with the floating-point LP in {} places",
        lp.name(),
        found.len()
    );
}

#[cfg(test)]
mod tests {
    use crate::{
        exact_lp::{
            consistency_auditor::{assert_synced, audit},
            exact_lp::test_support::{column, new_lp, row},
        },
        floating::floating_relaxation::{FloatingLp, FpColumnId, FpRowId},
        lp_backend::memory_backend::MemoryBackend,
    };

    #[test]
    fn mirror_is_in_sync() {
        let mut lp = new_lp();
        let mut backend = MemoryBackend::new();
        let x = column(&mut lp, 0, 1, &[]);
        let y = column(&mut lp, 1, -2, &[]);
        let c = row(&mut lp, 0, 0, 3, &[(x, 1), (y, 1)]);
        lp.add_column(x).unwrap();
        lp.add_column(y).unwrap();
        lp.add_row(c).unwrap();
        lp.flush(&mut backend).unwrap();

        let fp = FloatingLp::mirror(&lp);
        assert!(audit(&lp, &fp).is_empty());
        assert_synced(&lp, &fp);
    }

    #[test]
    fn tampered_companion_is_reported() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let c = row(&mut lp, 0, 0, 3, &[(x, 1)]);
        lp.add_column(x).unwrap();

        let mut fp = FloatingLp::mirror(&lp);
        fp.column_mut(FpColumnId(0)).unwrap().lb = -1.0;
        fp.row_mut(FpRowId(0)).unwrap().links[0] = Some(5);
        let found = audit(&lp, &fp);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].entity, "column <x0>");
        assert_eq!(found[1].entity, "row <c0>");
        let _ = c;
    }

    #[test]
    fn tampered_coefficient_and_constant_are_reported() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let c = row(&mut lp, 0, 0, 3, &[(x, 2)]);
        lp.add_column(x).unwrap();
        lp.add_row(c).unwrap();

        let mut fp = FloatingLp::mirror(&lp);
        assert!(audit(&lp, &fp).is_empty());
        fp.column_mut(FpColumnId(0)).unwrap().values[0] = 3.0;
        fp.row_mut(FpRowId(0)).unwrap().constant = 1.5;
        let found = audit(&lp, &fp);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].entity, "column <x0>");
        assert!(found[0].detail.starts_with("nonzero 0 value"));
        assert_eq!(found[1].entity, "row <c0>");
        assert!(found[1].detail.starts_with("constant"));
    }

    #[test]
    #[should_panic]
    fn out_of_sync_panics() {
        let mut lp = new_lp();
        let x = column(&mut lp, 0, 1, &[]);
        let mut fp = FloatingLp::mirror(&lp);
        fp.column_mut(FpColumnId(0)).unwrap().obj = 7.0;
        lp.add_column(x).unwrap();
        assert_synced(&lp, &fp);
    }
}
