//! Linear (model-improving) phase.
//!
//! The reduced objective at the current resolution is encoded as a
//! cardinality or pseudo-Boolean bound, anchored to the incumbent model, and
//! tightened below each satisfying model's reduced cost until the oracle
//! says no better model exists at full resolution.

use batsat::lbool;

use crate::encode::Encoder;
use crate::error::SolverError;
use crate::formula::{lit_true_in, mk_lit, ProblemType, Weight};
use crate::oracle::OracleResult;

use super::{Phase, PmresSolver, SolveStatus};

impl PmresSolver {
    /// Model-improving search from the incumbent (`lins = 2`, and the tail
    /// of `lins = 1`).
    pub(crate) fn linear_search(&mut self) -> Result<SolveStatus, SolverError> {
        self.phase = Phase::Linear;
        self.comment(format!(
            "linear search from LB {} UB {} gap {} at {:.1}s",
            self.lb_cost,
            self.ub_cost,
            self.ub_cost.saturating_sub(self.lb_cost),
            self.elapsed()
        ));
        self.comment(format!("remaining soft clauses: {}", self.n_real_soft()));

        self.oracle.budget_off();
        self.assumptions.clear();
        if self.best_model.is_empty() {
            return Err(SolverError::Internal(
                "linear search entered without an incumbent model",
            ));
        }
        self.save_phase();
        self.oracle.set_solution_phase_saving(true);

        if self.cfg.delete_before_lin {
            self.oracle.reset(&self.work);
        } else if self.oracle.should_update(&self.work) {
            self.oracle.sync(&self.work);
        }

        self.initialize_division_factor(self.cfg.varying_res);
        self.set_pb_encodings()?;

        loop {
            self.comment(format!("oracle call at {:.1}s", self.elapsed()));
            if !self.cfg.incremental_varres {
                self.assumptions.clear();
            }
            match self.oracle.search(&self.assumptions) {
                OracleResult::Sat => {
                    self.stats.nb_satisfiable += 1;
                    let new_reduced = self.reduced_cost_of(self.oracle.model());
                    self.comment(format!("reduced cost {new_reduced}"));

                    if self.check_model() {
                        self.save_phase();
                    }
                    if self.ub_cost == self.lb_cost {
                        self.comment("LB = UB");
                        self.print_answer(SolveStatus::Optimum);
                        return Ok(SolveStatus::Optimum);
                    }

                    if new_reduced > 0 {
                        self.update_bound_lin_search(new_reduced)?;
                    } else if self.work.maximum_weight() == 1 {
                        // Nothing falsified at full resolution: the incumbent
                        // is optimal. It was already saved by check_model.
                        self.print_answer(SolveStatus::Optimum);
                        return Ok(SolveStatus::Optimum);
                    } else {
                        self.comment("re-encoding at a finer resolution after SAT");
                        if !self.cfg.incremental_varres {
                            self.oracle.reset(&self.work);
                        }
                        self.update_division_factor_linear();
                        self.set_pb_encodings()?;
                    }
                }
                OracleResult::Unsat => {
                    if self.work.maximum_weight() == 1 {
                        // No model beats the incumbent at full resolution.
                        self.print_answer(SolveStatus::Optimum);
                        return Ok(SolveStatus::Optimum);
                    }
                    self.comment("re-encoding at a finer resolution after UNSAT");
                    if !self.cfg.incremental_varres {
                        self.oracle.reset(&self.work);
                    }
                    self.update_division_factor_linear();
                    self.set_pb_encodings()?;
                }
                OracleResult::Unknown => {
                    let status = self.interrupted_status();
                    self.print_answer(status);
                    return Ok(status);
                }
            }
        }
    }

    /// Build the objective encoding for the current resolution, lowering the
    /// resolution first while the incumbent's reduced cost is zero (there is
    /// nothing to bound at such a level).
    pub(crate) fn set_pb_encodings(&mut self) -> Result<(), SolverError> {
        loop {
            let reduced = self.reduced_cost_of_best()?;
            if reduced == 0 && self.work.maximum_weight() > 1 {
                self.update_division_factor_linear();
                continue;
            }
            self.comment(format!("building objective encoding with bound {reduced}"));
            return self.initialize_pb_constraint(reduced);
        }
    }

    /// Collect the reduced objective, choose cardinality vs pseudo-Boolean,
    /// stream the encoding into the oracle, and re-anchor the incumbent.
    fn initialize_pb_constraint(&mut self, rhs: Weight) -> Result<(), SolverError> {
        self.init_relaxation()?;
        let bound_on_vars = self.oracle.num_vars();
        let mut encoder = Encoder::new(self.cfg.pb_encoding, self.cfg.incremental_varres);
        match self.work.problem_type() {
            ProblemType::Weighted => {
                self.comment(format!("encoding pseudo-Boolean bound {rhs}"));
                encoder.encode_pb(&mut self.oracle, &self.objective, &self.coeffs, rhs);
            }
            ProblemType::Unweighted => {
                let units = self.card_units(rhs);
                self.comment(format!("encoding cardinality bound {units}"));
                encoder.encode_cardinality(&mut self.oracle, &self.objective, units);
            }
        }
        self.encoder = Some(encoder);
        self.set_card_vars(bound_on_vars)?;
        if self.cfg.incremental_varres {
            // In assumption mode nothing is enforced permanently, so the
            // build-time bound has to be assumed from the start as well.
            let encoder = self
                .encoder
                .as_ref()
                .ok_or(SolverError::MissingEncoding("pseudo-Boolean"))?;
            self.assumptions.clear();
            encoder.update_pb_assumptions(&mut self.assumptions, rhs)?;
        }
        Ok(())
    }

    /// Rebuild the reduced objective for the current cursor: one term per
    /// soft with a positive reduced weight. An iteration where all reduced
    /// weights agree is treated as unweighted (incremental varying
    /// resolution stays weighted so the bound can live in assumptions).
    fn init_relaxation(&mut self) -> Result<(), SolverError> {
        self.objective.clear();
        self.coeffs.clear();
        self.nb_current_soft = 0;
        let cursor = self.work.maximum_weight();
        let n = self.work.n_soft();
        let mut common = 0;
        let mut unweighted = true;
        for index in 0..n {
            let soft = self.work.soft(index);
            let reduced = soft.weight / cursor;
            if reduced == 0 {
                continue;
            }
            let guard = soft
                .assumption_var
                .ok_or(SolverError::Internal("active soft clause without a guard"))?;
            self.objective.push(guard);
            self.coeffs.push(reduced);
            self.nb_current_soft += 1;
            if common == 0 {
                common = reduced;
            } else if common != reduced {
                unweighted = false;
            }
        }
        if self.cfg.incremental_varres {
            unweighted = false;
        }
        self.comment(format!(
            "objective over {} of {} soft clauses",
            self.nb_current_soft,
            self.n_real_soft()
        ));
        if unweighted && self.nb_current_soft > 0 {
            self.reduced_common = common.max(1);
            self.work.set_problem_type(ProblemType::Unweighted);
            self.comment("unweighted iteration");
        } else {
            self.reduced_common = 1;
            self.work.set_problem_type(ProblemType::Weighted);
            self.comment("weighted iteration");
        }
        Ok(())
    }

    /// Reduced weight units expressed as a cardinality count.
    fn card_units(&self, reduced: Weight) -> Weight {
        reduced / self.reduced_common.max(1)
    }

    /// Tighten the objective bound strictly below `new_reduced`.
    fn update_bound_lin_search(&mut self, new_reduced: Weight) -> Result<(), SolverError> {
        debug_assert!(new_reduced > 0);
        match self.work.problem_type() {
            ProblemType::Weighted => {
                let target = new_reduced - 1;
                self.comment(format!(
                    "tightening pseudo-Boolean bound to {target} at {:.1}s",
                    self.elapsed()
                ));
                if !self.cfg.incremental_varres {
                    let encoder = self
                        .encoder
                        .as_mut()
                        .ok_or(SolverError::MissingEncoding("pseudo-Boolean"))?;
                    encoder.update_pb(&mut self.oracle, target)?;
                } else {
                    self.assumptions.clear();
                    let encoder = self
                        .encoder
                        .as_ref()
                        .ok_or(SolverError::MissingEncoding("pseudo-Boolean"))?;
                    encoder.update_pb_assumptions(&mut self.assumptions, target)?;
                }
            }
            ProblemType::Unweighted => {
                let target = self.card_units(new_reduced) - 1;
                self.comment(format!(
                    "tightening cardinality bound to {target} at {:.1}s",
                    self.elapsed()
                ));
                let encoder = self
                    .encoder
                    .as_mut()
                    .ok_or(SolverError::MissingEncoding("cardinality"))?;
                encoder.update_cardinality(&mut self.oracle, target)?;
            }
        }
        Ok(())
    }

    /// Solve once under the incumbent's projection onto the pre-encoding
    /// variables so the fresh encoding starts consistent with it, then
    /// reseed phase saving from the completed model. An unsatisfiable
    /// anchoring (the incumbent may have been invalidated by hardening)
    /// falls back to an unanchored solve.
    fn set_card_vars(&mut self, bound: u32) -> Result<(), SolverError> {
        self.comment("anchoring the encoding to the incumbent model");
        self.oracle.set_solution_phase_saving(false);
        // The incumbent may predate auxiliary variables of an earlier
        // encoding round; anchor the covered prefix.
        let n = (bound as usize).min(self.best_model.len());
        let mut anchors = Vec::with_capacity(n);
        for i in 0..n {
            anchors.push(mk_lit(i as u32, self.best_model[i] == lbool::TRUE));
        }
        let mut result = self.oracle.search(&anchors);
        if result == OracleResult::Unsat {
            self.comment("warning: incumbent anchoring unsatisfiable, re-solving unanchored");
            result = self.oracle.search(&[]);
        }
        if result != OracleResult::Sat {
            return Err(SolverError::UnexpectedOracleStatus("encoding anchoring"));
        }
        self.check_model();
        self.oracle.set_solution_phase_saving(true);
        self.save_phase();
        self.assumptions.clear();
        Ok(())
    }

    /// Reduced cost of `model`: the sum of `weight / cursor` over falsified
    /// working softs. The model must cover the soft variables.
    pub(crate) fn reduced_cost_of(&self, model: &[lbool]) -> Weight {
        let cursor = self.work.maximum_weight();
        let mut total = 0;
        for soft in self.work.softs() {
            debug_assert_eq!(soft.clause.len(), 1);
            if !lit_true_in(model, soft.clause[0]) {
                total += soft.weight / cursor;
            }
        }
        total
    }

    /// Reduced cost of the incumbent, completing it through one anchored
    /// oracle call when fresh soft variables were minted after it was saved.
    fn reduced_cost_of_best(&mut self) -> Result<Weight, SolverError> {
        if self.work.n_soft() > 0 {
            let last = self.work.soft(self.work.n_soft() - 1).clause[0];
            if last.var().idx() as usize >= self.best_model.len() {
                self.comment("incumbent misses fresh soft variables, completing it");
                self.complete_best_model()?;
            }
        }
        Ok(self.reduced_cost_of(&self.best_model))
    }

    /// Pin the incumbent's variables as assumptions and solve; the model
    /// that comes back extends the incumbent to every current variable and
    /// is adopted by `check_model` (equal cost, more variables).
    fn complete_best_model(&mut self) -> Result<(), SolverError> {
        let mut anchors = Vec::with_capacity(self.best_model.len());
        for (i, &value) in self.best_model.iter().enumerate() {
            anchors.push(mk_lit(i as u32, value == lbool::TRUE));
        }
        self.oracle.set_solution_phase_saving(false);
        let result = self.oracle.search(&anchors);
        self.oracle.set_solution_phase_saving(true);
        if result != OracleResult::Sat {
            return Err(SolverError::UnexpectedOracleStatus("model completion"));
        }
        self.check_model();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SearchMode, SolverConfig};
    use crate::formula::{mk_lit as lit, Formula};
    use crate::pmres::PmresSolver;

    fn chain_formula() -> Formula {
        // x0, x0 -> x1, x1 -> x2; softs (~x2, 1), (~x1, 1). Optimum 2.
        let mut formula = Formula::new();
        formula.add_hard(vec![lit(0, true)]);
        formula.add_hard(vec![lit(0, false), lit(1, true)]);
        formula.add_hard(vec![lit(1, false), lit(2, true)]);
        formula.add_soft(1, vec![lit(2, false)]);
        formula.add_soft(1, vec![lit(1, false)]);
        formula
    }

    #[test]
    fn reduced_cost_uses_the_cursor() {
        let mut formula = Formula::new();
        formula.add_soft(6, vec![lit(0, true)]);
        formula.add_soft(3, vec![lit(1, true)]);
        let mut solver = PmresSolver::new(formula, SolverConfig::default());
        solver.work.set_maximum_weight(3);

        // Falsify both softs: guards true, soft units false.
        let mut model = vec![lbool::FALSE; solver.work.num_vars() as usize];
        for soft in solver.work.softs() {
            let guard = soft.assumption_var.unwrap();
            model[guard.var().idx() as usize] = lbool::TRUE;
        }
        assert_eq!(solver.reduced_cost_of(&model), 3);

        solver.work.set_maximum_weight(1);
        assert_eq!(solver.reduced_cost_of(&model), 9);
    }

    #[test]
    fn linear_only_solves_the_chain() {
        let cfg = SolverConfig {
            mode: SearchMode::LinearOnly,
            ..SolverConfig::default()
        };
        let mut solver = PmresSolver::new(chain_formula(), cfg);
        let status = solver.solve().unwrap();
        assert_eq!(status, SolveStatus::Optimum);
        assert_eq!(solver.ub_cost(), 2);
    }

    #[test]
    fn zero_cost_optimum_keeps_saved_model() {
        // No soft clause is falsifiable: the linear phase terminates at cost
        // zero without re-saving, and the incumbent saved by check_model is
        // the reported answer.
        let mut formula = Formula::new();
        formula.add_hard(vec![lit(0, true)]);
        formula.add_soft(2, vec![lit(0, true)]);
        let cfg = SolverConfig {
            mode: SearchMode::LinearOnly,
            ..SolverConfig::default()
        };
        let mut solver = PmresSolver::new(formula, cfg);
        let status = solver.solve().unwrap();
        assert_eq!(status, SolveStatus::Optimum);
        assert_eq!(solver.ub_cost(), 0);
        let model = solver.best_model().unwrap();
        assert_eq!(solver.input().cost_of(model), 0);
    }
}
