//! Core-guided phase: the disjoint-core inner loop, PMRES relaxation,
//! gap-driven hardening, and the two outer strategies built on them.

use batsat::Lit;

use crate::config::SearchMode;
use crate::error::SolverError;
use crate::formula::{lit_true_in, ProblemType, Weight};
use crate::oracle::OracleResult;

use super::{Phase, PmresSolver, SolveStatus};

/// How the inner core loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CorePhaseOutcome {
    /// The oracle found a model for the current assumptions.
    Satisfiable,
    /// The time budget ran out.
    Interrupted,
}

impl PmresSolver {
    /// Assume every soft clause eligible at the current cursor. Only softs
    /// the oracle has seen are considered; softs minted by PMRES mid-loop
    /// wait for the next sync, which keeps the cores of one sweep disjoint.
    pub(crate) fn set_assumptions(&mut self) {
        self.assumptions.clear();
        self.nb_current_soft = 0;
        let cursor = self.work.maximum_weight();
        let known = self.oracle.softs_added();
        for index in 0..known {
            let soft = self.work.soft(index);
            let eligible = if self.cfg.varying_res_cg {
                soft.weight / cursor > 0
            } else {
                soft.weight >= cursor
            };
            if eligible {
                if let Some(guard) = soft.assumption_var {
                    self.assumptions.push(!guard);
                    self.nb_current_soft += 1;
                }
            }
        }
    }

    /// Minimum weight among the softs guarded by the core (1 for unweighted
    /// input).
    pub(crate) fn compute_cost_core(&self, core: &[Lit]) -> Result<Weight, SolverError> {
        debug_assert!(!core.is_empty());
        if self.work.problem_type() == ProblemType::Unweighted {
            return Ok(1);
        }
        let mut cost = Weight::MAX;
        for guard in core {
            let index = *self
                .core_map
                .get(guard)
                .ok_or(SolverError::UnmappedCoreLiteral)?;
            cost = cost.min(self.work.soft(index).weight);
        }
        Ok(cost)
    }

    /// Query the oracle repeatedly under the current assumptions, extracting
    /// and relaxing cores, without touching the cursor, the oracle's hard
    /// clauses, or the hardening state.
    pub(crate) fn weight_disjoint_cores(&mut self) -> Result<CorePhaseOutcome, SolverError> {
        loop {
            if let Some(limit) = self.cfg.time_limit_cores {
                let elapsed = self.started.elapsed();
                if elapsed >= limit {
                    return Ok(CorePhaseOutcome::Interrupted);
                }
                let remaining = limit - elapsed;
                self.comment(format!(
                    "core budget remaining {:.1}s",
                    remaining.as_secs_f64()
                ));
                self.oracle.set_time_budget(remaining);
            }

            self.set_assumptions();
            match self.oracle.search(&self.assumptions) {
                OracleResult::Unknown => return Ok(CorePhaseOutcome::Interrupted),
                OracleResult::Sat => return Ok(CorePhaseOutcome::Satisfiable),
                OracleResult::Unsat => {
                    self.stats.nb_cores += 1;
                    if self.oracle.core().is_empty() {
                        return Err(SolverError::EmptyCore);
                    }
                    let core = self.oracle.core().to_vec();
                    let core_cost = self.compute_cost_core(&core)?;
                    self.lb_cost += core_cost;
                    if self.lb_cost > self.ub_cost {
                        return Err(SolverError::BoundsCrossed {
                            lb: self.lb_cost,
                            ub: self.ub_cost,
                        });
                    }
                    self.check_gap();
                    if self.cfg.verbosity > 0 {
                        println!(
                            "c LB : {:<12} CS : {:<12} W : {:<12}",
                            self.lb_cost,
                            core.len(),
                            core_cost
                        );
                    }
                    self.relax_core(&core, core_cost)?;
                }
            }
        }
    }

    /// Pay `core_cost` out of every soft in the core, then rewrite the
    /// formula with the PMRES encoding so the core stops being one.
    pub(crate) fn relax_core(&mut self, core: &[Lit], core_cost: Weight) -> Result<(), SolverError> {
        debug_assert!(!core.is_empty());
        debug_assert!(core_cost > 0);
        for guard in core {
            let index = *self
                .core_map
                .get(guard)
                .ok_or(SolverError::UnmappedCoreLiteral)?;
            let soft = self.work.soft_mut(index);
            if soft.weight < core_cost {
                return Err(SolverError::CoreWeightMismatch {
                    index,
                    weight: soft.weight,
                    core_cost,
                });
            }
            soft.weight -= core_cost;
            if soft.weight == 0 {
                soft.assumption_var = None;
                self.stats.num_hardened += 1;
            }
        }
        self.encode_max_res(core, core_cost);
        self.stats.sum_size_cores += core.len() as u64;
        Ok(())
    }

    /// The PMRES transformation for a core `b_0 .. b_{n-1}` of cost `w`:
    /// `n - 1` fresh d-variables chain the suffix disjunctions, and each
    /// position gains a new weight-`w` soft `(~b_i \/ ~d_i)`. In pure
    /// core-guided mode the core disjunction and the downward implications
    /// are added too; the other modes leave them out, since the remaining
    /// clauses already force the d-chain upward and cost-minimal models
    /// coincide.
    pub(crate) fn encode_max_res(&mut self, core: &[Lit], weight: Weight) {
        let n = core.len();
        let mut d_vars: Vec<Lit> = Vec::with_capacity(n.saturating_sub(1));
        for _ in 0..n.saturating_sub(1) {
            d_vars.push(self.work.new_lit());
        }

        let complete = self.cfg.mode == SearchMode::CoreGuided;
        if complete {
            self.work.add_hard(core.to_vec());
        }
        if n > 2 {
            for i in 0..n - 2 {
                if complete {
                    self.work
                        .add_hard(vec![!d_vars[i], d_vars[i + 1], core[i + 1]]);
                }
                self.work.add_hard(vec![d_vars[i], !core[i + 1]]);
                self.work.add_hard(vec![d_vars[i], !d_vars[i + 1]]);
            }
        }
        if n > 1 {
            self.work.add_hard(vec![d_vars[n - 2], !core[n - 1]]);
            self.work.add_hard(vec![!d_vars[n - 2], core[n - 1]]);
        }

        for i in 0..n - 1 {
            self.add_relaxed_soft(weight, vec![!core[i], !d_vars[i]]);
        }
    }

    /// Standardize a PMRES soft on the fly: fresh guard, relaxed hard copy,
    /// unit soft, and a core-map entry for the guard.
    pub(crate) fn add_relaxed_soft(&mut self, weight: Weight, mut clause: Vec<Lit>) {
        let guard = self.work.new_lit();
        clause.push(guard);
        self.work.add_hard(clause);
        let index = self.work.add_unit_soft(weight, guard);
        self.core_map.insert(guard, index);
    }

    /// A soft heavier than the `ub - lb` gap cannot be falsified by any
    /// improving model: force its guard off. Softs exactly at the gap are
    /// hardened only when the latest model satisfies them.
    pub(crate) fn harden_clauses(&mut self) {
        let gap = self.ub_cost.saturating_sub(self.lb_cost);
        self.comment(format!("hardening with gap {gap}"));
        let mut hardened_round = 0usize;
        self.maxw_nothardened = 0;
        for index in 0..self.oracle.softs_added() {
            let (weight, unit, guard) = {
                let soft = self.work.soft(index);
                (soft.weight, soft.clause[0], soft.assumption_var)
            };
            if weight == 0 {
                continue;
            }
            let satisfied = weight == gap && lit_true_in(self.oracle.model(), unit);
            if weight > gap || satisfied {
                if let Some(guard) = guard {
                    self.oracle.add_clause(&[!guard]);
                    if !self.harden_lazily() {
                        self.work.add_hard(vec![!guard]);
                    }
                }
                let soft = self.work.soft_mut(index);
                soft.weight = 0;
                soft.assumption_var = None;
                self.stats.num_hardened += 1;
                hardened_round += 1;
            } else if weight > self.maxw_nothardened {
                self.maxw_nothardened = weight;
            }
        }
        self.comment(format!(
            "hardened {hardened_round} clauses, next hardening below gap {}",
            self.maxw_nothardened
        ));
    }

    /// Lazy hardening leaves the unit in the oracle only; it must reach the
    /// formula whenever a later oracle reset could otherwise lose it.
    fn harden_lazily(&self) -> bool {
        !self.cfg.delete_before_lin && !self.cfg.varying_res
    }

    /// Pure core-guided search (`lins = 0`).
    pub(crate) fn weight_search(&mut self) -> Result<SolveStatus, SolverError> {
        self.phase = Phase::CoreGuided;
        loop {
            match self.weight_disjoint_cores()? {
                CorePhaseOutcome::Interrupted => {
                    let status = self.interrupted_status();
                    self.print_answer(status);
                    return Ok(status);
                }
                CorePhaseOutcome::Satisfiable => {}
            }

            self.stats.nb_satisfiable += 1;
            self.check_model();

            if self.lb_cost == self.ub_cost {
                self.comment("LB = UB");
                self.print_answer(SolveStatus::Optimum);
                return Ok(SolveStatus::Optimum);
            }
            if self.nb_current_soft == self.n_real_soft() {
                return self.optimum_from_full_stratum();
            }
            if self.ub_cost - self.lb_cost < self.maxw_nothardened {
                self.harden_clauses();
            }
            if self.oracle.should_update(&self.work) {
                self.oracle.sync(&self.work);
            } else {
                self.update_current_weight();
            }
        }
    }

    /// Core-guided phase with a linear-phase hand-off (`lins = 1`).
    pub(crate) fn core_guided_linear_search(&mut self) -> Result<SolveStatus, SolverError> {
        self.phase = Phase::CoreGuided;
        loop {
            match self.weight_disjoint_cores()? {
                CorePhaseOutcome::Interrupted => {
                    self.comment("core-guided phase interrupted");
                    if self.oracle.should_update(&self.work) {
                        self.oracle.sync(&self.work);
                    }
                    return self.linear_search();
                }
                CorePhaseOutcome::Satisfiable => {}
            }

            self.comment(format!(
                "satisfiable during core-guided phase at {:.1}s",
                self.elapsed()
            ));
            self.stats.nb_satisfiable += 1;
            self.check_model();

            if self.lb_cost == self.ub_cost {
                self.comment("LB = UB");
                self.print_answer(SolveStatus::Optimum);
                return Ok(SolveStatus::Optimum);
            }
            if self.nb_current_soft == self.n_real_soft() {
                return self.optimum_from_full_stratum();
            }
            if self.ub_cost - self.lb_cost < self.maxw_nothardened {
                self.harden_clauses();
            }

            if self.cfg.relax_before_strat {
                if self.oracle.should_update(&self.work) {
                    self.comment(format!("updating oracle at {:.1}s", self.elapsed()));
                    self.oracle.sync(&self.work);
                } else if self.work.maximum_weight() > 1 {
                    self.update_current_weight();
                    if self.work.maximum_weight() == 1 {
                        self.comment("weight reached 1, leaving the core-guided phase");
                        return self.linear_search();
                    }
                } else {
                    return Err(SolverError::Internal("core-guided phase stalled at weight 1"));
                }
            } else {
                if self.work.maximum_weight() > 1 {
                    self.update_current_weight();
                }
                if self.work.maximum_weight() == 1 {
                    if self.oracle.should_update(&self.work) {
                        self.comment(format!("updating oracle at {:.1}s", self.elapsed()));
                        self.oracle.sync(&self.work);
                    }
                    return self.linear_search();
                }
            }
        }
    }

    /// With every real soft active, a model satisfying all assumptions has
    /// cost exactly `lb`: adopt it and report optimality.
    fn optimum_from_full_stratum(&mut self) -> Result<SolveStatus, SolverError> {
        let model_cost = self.input.cost_of(self.oracle.model());
        if model_cost != self.lb_cost {
            return Err(SolverError::ModelCostMismatch {
                model_cost,
                lb: self.lb_cost,
            });
        }
        if self.lb_cost < self.ub_cost {
            self.ub_cost = self.lb_cost;
            self.best_model.clear();
            self.best_model.extend_from_slice(self.oracle.model());
            self.print_bound(self.lb_cost);
        }
        self.print_answer(SolveStatus::Optimum);
        Ok(SolveStatus::Optimum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SolverConfig;
    use crate::formula::{mk_lit, Formula};

    fn weighted_pair(mode: SearchMode) -> PmresSolver {
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true), mk_lit(1, true)]);
        formula.add_soft(3, vec![mk_lit(0, false)]);
        formula.add_soft(5, vec![mk_lit(1, false)]);
        let cfg = SolverConfig {
            mode,
            ..SolverConfig::default()
        };
        PmresSolver::new(formula, cfg)
    }

    #[test]
    fn relax_core_pays_exactly_the_core_cost() {
        let mut solver = weighted_pair(SearchMode::CoreThenLinear);
        let guards: Vec<_> = solver
            .work
            .softs()
            .iter()
            .map(|s| s.assumption_var.unwrap())
            .collect();

        let sum_before: u64 = solver.work.softs().iter().map(|s| s.weight).sum();
        solver.relax_core(&guards, 3).unwrap();
        let sum_after: u64 = solver.work.softs().iter().map(|s| s.weight).sum();

        // Each of the two guarded softs loses 3; one new soft of weight 3
        // restores all but the core cost.
        assert_eq!(sum_before - sum_after, 3);
        assert_eq!(solver.work.n_soft(), 3);
        assert_eq!(solver.work.soft(0).weight, 0);
        assert!(solver.work.soft(0).assumption_var.is_none());
        assert_eq!(solver.work.soft(1).weight, 2);
        assert_eq!(solver.work.soft(2).weight, 3);
        assert_eq!(solver.stats.num_hardened, 1);
        assert_eq!(solver.stats.sum_size_cores, 2);
    }

    #[test]
    fn relax_core_rejects_overpriced_cores() {
        let mut solver = weighted_pair(SearchMode::CoreThenLinear);
        let guards: Vec<_> = solver
            .work
            .softs()
            .iter()
            .map(|s| s.assumption_var.unwrap())
            .collect();
        let err = solver.relax_core(&guards, 4).unwrap_err();
        assert!(matches!(err, SolverError::CoreWeightMismatch { .. }));
    }

    #[test]
    fn pmres_completeness_clauses_follow_the_mode() {
        // Size-3 core: modes with a linear phase skip the core disjunction
        // and the downward implications (1 + 1 clause for the inner
        // position), keeping 2 + 2 chain clauses and 2 relaxed soft copies.
        let core_template = |mode| {
            let mut solver = weighted_pair(mode);
            let a = solver.work.new_lit();
            let b = solver.work.new_lit();
            let c = solver.work.new_lit();
            let before = solver.work.n_hard();
            solver.encode_max_res(&[a, b, c], 1);
            solver.work.n_hard() - before
        };
        // Pure core-guided: disjunction + 1 downward + 4 chain + 2 relaxed.
        assert_eq!(core_template(SearchMode::CoreGuided), 8);
        // With a linear phase: 4 chain + 2 relaxed.
        assert_eq!(core_template(SearchMode::CoreThenLinear), 6);
    }

    #[test]
    fn singleton_core_mints_nothing() {
        let mut solver = weighted_pair(SearchMode::CoreThenLinear);
        let guard = solver.work.soft(0).assumption_var.unwrap();
        let softs_before = solver.work.n_soft();
        let hards_before = solver.work.n_hard();

        solver.relax_core(&[guard], 3).unwrap();

        assert_eq!(solver.work.n_soft(), softs_before);
        assert_eq!(solver.work.n_hard(), hards_before);
        assert_eq!(solver.work.soft(0).weight, 0);
    }

    #[test]
    fn hardening_is_idempotent_at_a_fixed_gap() {
        let mut solver = weighted_pair(SearchMode::CoreThenLinear);
        solver.oracle.sync(&solver.work);
        // Pretend a model of cost 4 was found: gap 4 hardens the weight-5
        // soft and leaves the weight-3 soft alone.
        assert_eq!(solver.oracle.search(&[]), crate::oracle::OracleResult::Sat);
        solver.ub_cost = 4;
        solver.lb_cost = 0;

        solver.harden_clauses();
        let hardened = solver.stats.num_hardened;
        assert_eq!(hardened, 1);
        assert_eq!(solver.work.soft(1).weight, 0);
        assert_eq!(solver.maxw_nothardened, 3);

        solver.harden_clauses();
        assert_eq!(solver.stats.num_hardened, hardened);
        assert_eq!(solver.maxw_nothardened, 3);
    }
}
