use anyhow::Result;
use std::ops::{Neg, Sub};
use strum_macros::Display;

use crate::{
    exact_lp::{
        exact_column::ColId, exact_lp::ExactLp, exact_lp_error::ExactLpError, exact_row::RowId,
    },
    floating::floating_relaxation::FpColumnId,
    math::{
        rational::Rational,
        traits::{Infinite, Signed, Zero},
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum VarStatus {
    /// Not represented by a column; contributes to the loose objective.
    Loose,
    /// Represented by a column of the exact LP.
    Column(ColId),
}

/// The objective coefficient and bounds of a problem variable, as far as the exact LP is
/// concerned with them.
#[derive(Clone, Debug)]
pub struct ExactVar {
    pub(crate) name: String,
    pub(crate) status: VarStatus,
    pub(crate) obj: Rational,
    pub(crate) lb_local: Rational,
    pub(crate) ub_local: Rational,
    pub(crate) lb_global: Rational,
    pub(crate) ub_global: Rational,
}

impl ExactVar {
    /// A loose variable whose local and global bounds coincide.
    pub fn new(name: impl Into<String>, obj: Rational, lb: Rational, ub: Rational) -> Self {
        Self {
            name: name.into(),
            status: VarStatus::Loose,
            obj,
            lb_local: lb.clone(),
            ub_local: ub.clone(),
            lb_global: lb,
            ub_global: ub,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> VarStatus {
        self.status
    }

    pub fn column(&self) -> Option<ColId> {
        match self.status {
            VarStatus::Column(col) => Some(col),
            VarStatus::Loose => None,
        }
    }

    pub fn obj(&self) -> &Rational {
        &self.obj
    }

    pub fn lb_local(&self) -> &Rational {
        &self.lb_local
    }

    pub fn ub_local(&self) -> &Rational {
        &self.ub_local
    }

    pub fn lb_global(&self) -> &Rational {
        &self.lb_global
    }

    pub fn ub_global(&self) -> &Rational {
        &self.ub_global
    }
}

/// A change of an objective aggregate: a finite part and a change of the number of infinite
/// contributions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjDelta {
    pub value: Rational,
    pub infinities: i64,
}

impl ObjDelta {
    pub fn zero() -> Self {
        Self {
            value: Rational::zero(),
            infinities: 0,
        }
    }

    /// A finite contribution `value * bound`, or one infinite contribution.
    fn product(value: &Rational, bound: &Rational) -> Self {
        if bound.is_abs_infinity() {
            Self {
                value: Rational::zero(),
                infinities: 1,
            }
        } else {
            Self {
                value: value * bound,
                infinities: 0,
            }
        }
    }
}

impl Sub for ObjDelta {
    type Output = ObjDelta;

    fn sub(self, rhs: Self) -> Self::Output {
        ObjDelta {
            value: &self.value - &rhs.value,
            infinities: self.infinities - rhs.infinities,
        }
    }
}

impl Neg for ObjDelta {
    type Output = ObjDelta;

    fn neg(self) -> Self::Output {
        ObjDelta {
            value: -self.value,
            infinities: -self.infinities,
        }
    }
}

/// What a variable adds to an objective aggregate: its objective coefficient times its best
/// bound. A best bound that is infinite counts as an infinite contribution instead.
pub fn contribution(obj: &Rational, lb: &Rational, ub: &Rational) -> ObjDelta {
    if obj.is_positive() {
        ObjDelta::product(obj, lb)
    } else if obj.is_negative() {
        ObjDelta::product(obj, ub)
    } else {
        ObjDelta::zero()
    }
}

/// Change of the contribution when the objective coefficient changes, both values taken from the
/// same bounds.
pub fn delta_objective(old_obj: &Rational, new_obj: &Rational, lb: &Rational, ub: &Rational) -> ObjDelta {
    contribution(new_obj, lb, ub) - contribution(old_obj, lb, ub)
}

/// Change of the contribution when the lower bound changes. Only matters for a positive
/// objective coefficient.
pub fn delta_lower_bound(obj: &Rational, old_lb: &Rational, new_lb: &Rational) -> ObjDelta {
    debug_assert!(!old_lb.is_infinity() && !new_lb.is_infinity());
    if !obj.is_positive() {
        return ObjDelta::zero();
    }
    match (old_lb.is_neg_infinity(), new_lb.is_neg_infinity()) {
        (true, true) => ObjDelta::zero(),
        (true, false) => ObjDelta {
            value: obj * new_lb,
            infinities: -1,
        },
        (false, true) => ObjDelta {
            value: -(obj * old_lb),
            infinities: 1,
        },
        (false, false) => ObjDelta {
            value: obj * &(new_lb - old_lb),
            infinities: 0,
        },
    }
}

/// Change of the contribution when the upper bound changes. Only matters for a negative
/// objective coefficient.
pub fn delta_upper_bound(obj: &Rational, old_ub: &Rational, new_ub: &Rational) -> ObjDelta {
    debug_assert!(!old_ub.is_neg_infinity() && !new_ub.is_neg_infinity());
    if !obj.is_negative() {
        return ObjDelta::zero();
    }
    match (old_ub.is_infinity(), new_ub.is_infinity()) {
        (true, true) => ObjDelta::zero(),
        (true, false) => ObjDelta {
            value: obj * new_ub,
            infinities: -1,
        },
        (false, true) => ObjDelta {
            value: -(obj * old_ub),
            infinities: 1,
        },
        (false, false) => ObjDelta {
            value: obj * &(new_ub - old_ub),
            infinities: 0,
        },
    }
}

/**
 * Running sums of objective contributions.
 *
 * The pseudo objective is taken over the local bounds of all variables, the loose objective over
 * the local bounds of the loose ones and the global pseudo objective over the global bounds of all
 * variables. Infinite contributions are counted separately; an aggregate with a positive count is
 * reported as minus infinity.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectiveAggregates {
    pub(crate) pseudo_objval: Rational,
    pub(crate) pseudo_objval_inf: usize,
    pub(crate) loose_objval: Rational,
    pub(crate) loose_objval_inf: usize,
    pub(crate) glb_pseudo_objval: Rational,
    pub(crate) glb_pseudo_objval_inf: usize,
    pub(crate) n_loose_vars: usize,
}

impl ObjectiveAggregates {
    pub fn new() -> Self {
        Self {
            pseudo_objval: Rational::zero(),
            pseudo_objval_inf: 0,
            loose_objval: Rational::zero(),
            loose_objval_inf: 0,
            glb_pseudo_objval: Rational::zero(),
            glb_pseudo_objval_inf: 0,
            n_loose_vars: 0,
        }
    }

    /// Aggregates of a set of variables, computed from scratch.
    pub fn recompute<'a>(vars: impl IntoIterator<Item = &'a ExactVar>) -> Self {
        let mut result = Self::new();
        for var in vars {
            let loose = var.status == VarStatus::Loose;
            if loose {
                result.n_loose_vars += 1;
            }
            let local = contribution(&var.obj, &var.lb_local, &var.ub_local);
            result.apply(&local, true, loose, false);
            let global = contribution(&var.obj, &var.lb_global, &var.ub_global);
            result.apply(&global, false, false, true);
        }
        result
    }

    pub fn pseudo_objective_value(&self) -> Rational {
        aggregate_value(&self.pseudo_objval, self.pseudo_objval_inf)
    }

    pub fn loose_objective_value(&self) -> Rational {
        aggregate_value(&self.loose_objval, self.loose_objval_inf)
    }

    pub fn global_pseudo_objective_value(&self) -> Rational {
        aggregate_value(&self.glb_pseudo_objval, self.glb_pseudo_objval_inf)
    }

    /// The finite part of the pseudo objective, ignoring infinite contributions.
    pub fn finite_pseudo_objective_value(&self) -> &Rational {
        &self.pseudo_objval
    }

    pub fn pseudo_objective_infinities(&self) -> usize {
        self.pseudo_objval_inf
    }

    pub fn loose_objective_infinities(&self) -> usize {
        self.loose_objval_inf
    }

    pub fn global_pseudo_objective_infinities(&self) -> usize {
        self.glb_pseudo_objval_inf
    }

    pub fn loose_variables(&self) -> usize {
        self.n_loose_vars
    }

    pub(crate) fn apply(&mut self, delta: &ObjDelta, local: bool, loose: bool, global: bool) {
        if local {
            self.pseudo_objval += &delta.value;
            shift(&mut self.pseudo_objval_inf, delta.infinities);
        }
        if loose {
            self.loose_objval += &delta.value;
            shift(&mut self.loose_objval_inf, delta.infinities);
        }
        if global {
            self.glb_pseudo_objval += &delta.value;
            shift(&mut self.glb_pseudo_objval_inf, delta.infinities);
        }
    }
}

impl Default for ObjectiveAggregates {
    fn default() -> Self {
        Self::new()
    }
}

fn aggregate_value(value: &Rational, infinities: usize) -> Rational {
    if infinities > 0 {
        Rational::neg_infinity()
    } else {
        value.clone()
    }
}

fn shift(counter: &mut usize, delta: i64) {
    let shifted = *counter as i64 + delta;
    debug_assert!(shifted >= 0, "infinity counter dropped below zero");
    *counter = shifted.max(0) as usize;
}

impl ExactLp {
    /// Accounts for a new variable in the objective aggregates.
    pub fn add_var(&mut self, var: &ExactVar) {
        let loose = var.status == VarStatus::Loose;
        if loose {
            self.objective.n_loose_vars += 1;
        }
        let local = contribution(&var.obj, &var.lb_local, &var.ub_local);
        self.objective.apply(&local, true, loose, false);
        let global = contribution(&var.obj, &var.lb_global, &var.ub_global);
        self.objective.apply(&global, false, false, true);
    }

    /// Removes a variable from the objective aggregates.
    pub fn delete_var(&mut self, var: &ExactVar) {
        let loose = var.status == VarStatus::Loose;
        let local = contribution(&var.obj, &var.lb_local, &var.ub_local);
        self.objective.apply(&-local, true, loose, false);
        let global = contribution(&var.obj, &var.lb_global, &var.ub_global);
        self.objective.apply(&-global, false, false, true);
        if loose {
            self.objective.n_loose_vars = self.objective.n_loose_vars.saturating_sub(1);
        }
    }

    pub fn change_var_objective(&mut self, var: &mut ExactVar, obj: Rational) -> Result<()> {
        if obj == var.obj {
            return Ok(());
        }
        if let VarStatus::Column(col) = var.status {
            self.change_column_objective(col, obj.clone())?;
        } else if obj.is_abs_infinity() {
            return Err(ExactLpError::invalid_modification(format!(
                "objective coefficient of variable <{}> is not finite",
                var.name
            )));
        }
        let loose = var.status == VarStatus::Loose;
        let local = delta_objective(&var.obj, &obj, &var.lb_local, &var.ub_local);
        self.objective.apply(&local, true, loose, false);
        let global = delta_objective(&var.obj, &obj, &var.lb_global, &var.ub_global);
        self.objective.apply(&global, false, false, true);
        var.obj = obj;
        Ok(())
    }

    pub fn change_var_lb_local(&mut self, var: &mut ExactVar, lb: Rational) -> Result<()> {
        if lb == var.lb_local {
            return Ok(());
        }
        match var.status {
            VarStatus::Column(col) => self.change_column_lb(col, lb.clone())?,
            VarStatus::Loose => {
                check_lower_bound(var, &lb)?;
                self.dom_chg_count += 1;
            }
        }
        let delta = delta_lower_bound(&var.obj, &var.lb_local, &lb);
        self.objective
            .apply(&delta, true, var.status == VarStatus::Loose, false);
        var.lb_local = lb;
        Ok(())
    }

    pub fn change_var_ub_local(&mut self, var: &mut ExactVar, ub: Rational) -> Result<()> {
        if ub == var.ub_local {
            return Ok(());
        }
        match var.status {
            VarStatus::Column(col) => self.change_column_ub(col, ub.clone())?,
            VarStatus::Loose => {
                check_upper_bound(var, &ub)?;
                self.dom_chg_count += 1;
            }
        }
        let delta = delta_upper_bound(&var.obj, &var.ub_local, &ub);
        self.objective
            .apply(&delta, true, var.status == VarStatus::Loose, false);
        var.ub_local = ub;
        Ok(())
    }

    pub fn change_var_lb_global(&mut self, var: &mut ExactVar, lb: Rational) -> Result<()> {
        if lb == var.lb_global {
            return Ok(());
        }
        check_lower_bound(var, &lb)?;
        let delta = delta_lower_bound(&var.obj, &var.lb_global, &lb);
        self.objective.apply(&delta, false, false, true);
        var.lb_global = lb;
        Ok(())
    }

    pub fn change_var_ub_global(&mut self, var: &mut ExactVar, ub: Rational) -> Result<()> {
        if ub == var.ub_global {
            return Ok(());
        }
        check_upper_bound(var, &ub)?;
        let delta = delta_upper_bound(&var.obj, &var.ub_global, &ub);
        self.objective.apply(&delta, false, false, true);
        var.ub_global = ub;
        Ok(())
    }

    /// Creates a column for a loose variable and makes the variable a column variable.
    pub fn create_var_column(
        &mut self,
        var: &mut ExactVar,
        companion: FpColumnId,
        rows: &[(RowId, Rational)],
    ) -> Result<ColId> {
        if var.status != VarStatus::Loose {
            return Err(ExactLpError::invalid_modification(format!(
                "variable <{}> already has a column",
                var.name
            )));
        }
        let col = self.create_column(
            var.name.clone(),
            companion,
            var.obj.clone(),
            var.lb_local.clone(),
            var.ub_local.clone(),
            rows,
        )?;
        self.make_var_column(var, col)?;
        Ok(col)
    }

    /// Turns a loose variable into a column variable: its contribution leaves the loose objective.
    pub fn make_var_column(&mut self, var: &mut ExactVar, col: ColId) -> Result<()> {
        if var.status != VarStatus::Loose {
            return Err(ExactLpError::invalid_modification(format!(
                "variable <{}> is not loose",
                var.name
            )));
        }
        self.change_column_objective(col, var.obj.clone())?;
        self.change_column_lb(col, var.lb_local.clone())?;
        self.change_column_ub(col, var.ub_local.clone())?;

        let local = contribution(&var.obj, &var.lb_local, &var.ub_local);
        self.objective.apply(&-local, false, true, false);
        self.objective.n_loose_vars = self.objective.n_loose_vars.saturating_sub(1);
        var.status = VarStatus::Column(col);
        log::trace!("variable <{}> is now {}", var.name, var.status);
        Ok(())
    }

    /// Turns a column variable back into a loose one: its contribution enters the loose objective.
    pub fn make_var_loose(&mut self, var: &mut ExactVar) -> Result<()> {
        if var.status == VarStatus::Loose {
            return Err(ExactLpError::invalid_modification(format!(
                "variable <{}> is already loose",
                var.name
            )));
        }
        let local = contribution(&var.obj, &var.lb_local, &var.ub_local);
        self.objective.apply(&local, false, true, false);
        self.objective.n_loose_vars += 1;
        var.status = VarStatus::Loose;
        log::trace!("variable <{}> is now {}", var.name, var.status);
        Ok(())
    }

    pub fn pseudo_objective_value(&self) -> Rational {
        self.objective.pseudo_objective_value()
    }

    pub fn loose_objective_value(&self) -> Rational {
        self.objective.loose_objective_value()
    }

    pub fn global_pseudo_objective_value(&self) -> Rational {
        self.objective.global_pseudo_objective_value()
    }
}

fn check_lower_bound(var: &ExactVar, lb: &Rational) -> Result<()> {
    if lb.is_infinity() {
        Err(ExactLpError::invalid_modification(format!(
            "lower bound of variable <{}> cannot be infinity",
            var.name
        )))
    } else {
        Ok(())
    }
}

fn check_upper_bound(var: &ExactVar, ub: &Rational) -> Result<()> {
    if ub.is_neg_infinity() {
        Err(ExactLpError::invalid_modification(format!(
            "upper bound of variable <{}> cannot be minus infinity",
            var.name
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        exact_lp::{
            exact_lp::test_support::new_lp,
            pseudo_objective::{
                ExactVar, ObjDelta, ObjectiveAggregates, VarStatus, delta_lower_bound,
                delta_objective, delta_upper_bound,
            },
        },
        floating::floating_relaxation::FpColumnId,
        math::{rational::Rational, traits::Infinite},
    };

    #[test]
    fn lower_bound_becomes_finite() {
        let delta = delta_lower_bound(&r!(2), &Rational::neg_infinity(), &r!(-5));
        assert_eq!(
            delta,
            ObjDelta {
                value: r!(-10),
                infinities: -1
            }
        );
    }

    #[test]
    fn bound_deltas_ignore_the_other_side() {
        assert_eq!(delta_lower_bound(&r!(-2), &r!(0), &r!(4)), ObjDelta::zero());
        assert_eq!(delta_upper_bound(&r!(2), &r!(0), &r!(4)), ObjDelta::zero());
        assert_eq!(
            delta_upper_bound(&r!(-1), &r!(3), &Rational::infinity()),
            ObjDelta {
                value: r!(3),
                infinities: 1
            }
        );
    }

    #[test]
    fn objective_sign_flip_switches_bound() {
        // contribution goes from 2 * lb = 2 to -1 * ub = -4
        let delta = delta_objective(&r!(2), &r!(-1), &r!(1), &r!(4));
        assert_eq!(delta.value, r!(-6));
        assert_eq!(delta.infinities, 0);

        let delta = delta_objective(&r!(0), &r!(3), &Rational::neg_infinity(), &r!(4));
        assert_eq!(delta.infinities, 1);
    }

    #[test]
    fn column_with_unbounded_side() {
        let mut lp = new_lp();
        let mut var = ExactVar::new("x", r!(2), Rational::neg_infinity(), r!(0));
        lp.add_var(&var);
        assert_eq!(lp.objective().pseudo_objective_infinities(), 1);
        assert!(lp.pseudo_objective_value().is_neg_infinity());

        lp.change_var_lb_local(&mut var, r!(-5)).unwrap();
        assert_eq!(lp.objective().pseudo_objective_infinities(), 0);
        assert_eq!(lp.pseudo_objective_value(), r!(-10));
        assert_eq!(lp.loose_objective_value(), r!(-10));
        assert!(lp.global_pseudo_objective_value().is_neg_infinity());
    }

    #[test]
    fn incremental_matches_recompute() {
        let mut lp = new_lp();
        let mut vars = vec![
            ExactVar::new("x", r!(1), r!(0), r!(10)),
            ExactVar::new("y", r!(-3), r!(-2), Rational::infinity()),
            ExactVar::new("z", r!(0), Rational::neg_infinity(), r!(1)),
        ];
        for var in &vars {
            lp.add_var(var);
        }
        assert_eq!(lp.objective(), &ObjectiveAggregates::recompute(&vars));

        lp.change_var_ub_local(&mut vars[1], r!(5)).unwrap();
        lp.change_var_objective(&mut vars[2], r!(1, 2)).unwrap();
        lp.change_var_lb_global(&mut vars[0], r!(2)).unwrap();
        lp.change_var_objective(&mut vars[0], r!(-1)).unwrap();
        lp.change_var_lb_local(&mut vars[2], r!(-4)).unwrap();
        lp.create_var_column(&mut vars[1], FpColumnId(1), &[]).unwrap();
        lp.change_var_ub_local(&mut vars[1], r!(7)).unwrap();
        lp.change_var_ub_global(&mut vars[0], r!(8)).unwrap();

        assert_eq!(lp.objective(), &ObjectiveAggregates::recompute(&vars));
        assert_eq!(lp.objective().loose_variables(), 2);
        assert_eq!(vars[1].status(), VarStatus::Column(vars[1].column().unwrap()));
        assert_eq!(lp.column(vars[1].column().unwrap()).unwrap().ub(), &r!(7));

        lp.make_var_loose(&mut vars[1]).unwrap();
        assert_eq!(lp.objective(), &ObjectiveAggregates::recompute(&vars));

        let removed = vars.pop().unwrap();
        lp.delete_var(&removed);
        assert_eq!(lp.objective(), &ObjectiveAggregates::recompute(&vars));
    }

    #[test]
    fn make_var_column_twice_fails() {
        let mut lp = new_lp();
        let mut var = ExactVar::new("x", r!(1), r!(0), r!(1));
        lp.add_var(&var);
        lp.create_var_column(&mut var, FpColumnId(0), &[]).unwrap();
        assert!(lp.create_var_column(&mut var, FpColumnId(1), &[]).is_err());
        lp.make_var_loose(&mut var).unwrap();
        assert!(lp.make_var_loose(&mut var).is_err());
    }
}
