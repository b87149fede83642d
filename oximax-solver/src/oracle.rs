//! Adapter around the incremental CDCL oracle.
//!
//! The adapter owns one `batsat` solver for the lifetime of a phase and keeps
//! the watermarks (`vars_added`, `clauses_added`, `softs_added`) that record
//! how much of the working formula has been mirrored into it. The search
//! never touches the solver directly: clauses flow in through [`SatOracle::sync`]
//! and [`SatOracle::add_clause`], results flow out as an [`OracleResult`]
//! plus a copied model or core.

use std::time::{Duration, Instant};

use batsat::{lbool, Callbacks, Lit, Solver, SolverInterface, SolverOpts, Var};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::formula::WorkingFormula;

/// Outcome of an oracle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleResult {
    /// A model was found.
    Sat,
    /// Unsatisfiable under the given assumptions.
    Unsat,
    /// The time budget ran out.
    Unknown,
}

/// Stop hook carrying the per-call deadline.
#[derive(Debug, Default)]
struct DeadlineCallbacks {
    deadline: Option<Instant>,
}

impl Callbacks for DeadlineCallbacks {
    fn stop(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

/// Exclusively owned incremental SAT oracle.
pub struct SatOracle {
    solver: Solver<DeadlineCallbacks>,
    vars_added: u32,
    clauses_added: usize,
    softs_added: usize,
    model: Vec<lbool>,
    core: Vec<Lit>,
    /// Polarity hints for variables not yet mirrored into the solver; the
    /// backend fixes user polarity at variable creation.
    pending_polarity: FxHashMap<u32, bool>,
    phase_hint: Vec<lbool>,
    solution_phase_saving: bool,
    scratch: Vec<Lit>,
}

impl Default for SatOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl SatOracle {
    /// Fresh oracle with nothing mirrored.
    pub fn new() -> Self {
        Self {
            solver: Solver::new(SolverOpts::default(), DeadlineCallbacks::default()),
            vars_added: 0,
            clauses_added: 0,
            softs_added: 0,
            model: Vec::new(),
            core: Vec::new(),
            pending_polarity: FxHashMap::default(),
            phase_hint: Vec::new(),
            solution_phase_saving: false,
            scratch: Vec::new(),
        }
    }

    /// Variables mirrored from the working formula.
    pub fn vars_added(&self) -> u32 {
        self.vars_added
    }

    /// Hard clauses mirrored from the working formula.
    pub fn clauses_added(&self) -> usize {
        self.clauses_added
    }

    /// Soft clauses known to the solver at the last sync; assumption
    /// selection and hardening never reach past this watermark.
    pub fn softs_added(&self) -> usize {
        self.softs_added
    }

    /// Total variables in the solver, encoder variables included.
    pub fn num_vars(&self) -> u32 {
        self.solver.num_vars()
    }

    /// Does the formula hold hard clauses the solver has not seen?
    pub fn should_update(&self, formula: &WorkingFormula) -> bool {
        self.clauses_added < formula.n_hard()
    }

    /// Mirror everything the formula gained since the last sync.
    pub fn sync(&mut self, formula: &WorkingFormula) {
        while self.vars_added < formula.num_vars() {
            debug_assert_eq!(self.solver.num_vars(), self.vars_added);
            let idx = self.vars_added;
            let upol = match self.pending_polarity.get(&idx) {
                Some(&preferred) => lbool::new(preferred),
                None if self.solution_phase_saving => {
                    *self.phase_hint.get(idx as usize).unwrap_or(&lbool::UNDEF)
                }
                None => lbool::UNDEF,
            };
            self.solver.new_var(upol, true);
            self.vars_added += 1;
        }
        let new_clauses = formula.n_hard() - self.clauses_added;
        for i in self.clauses_added..formula.n_hard() {
            self.scratch.clear();
            self.scratch.extend_from_slice(formula.hard(i));
            self.solver.add_clause_reuse(&mut self.scratch);
        }
        self.clauses_added = formula.n_hard();
        self.softs_added = formula.n_soft();
        if new_clauses > 0 {
            debug!(clauses = new_clauses, vars = self.vars_added, "oracle sync");
        }
    }

    /// Throw the solver away and rebuild it from the current formula. Phase
    /// hints recorded so far are re-applied to the rebuilt variables.
    pub fn reset(&mut self, formula: &WorkingFormula) {
        debug!("oracle reset");
        self.solver = Solver::new(SolverOpts::default(), DeadlineCallbacks::default());
        self.vars_added = 0;
        self.clauses_added = 0;
        self.softs_added = 0;
        self.core.clear();
        self.sync(formula);
    }

    /// Add a clause directly to the solver (hardening units, encoder
    /// clauses). The clause must only use variables the solver knows.
    pub fn add_clause(&mut self, clause: &[Lit]) {
        debug_assert!(clause.iter().all(|l| l.var().idx() < self.solver.num_vars()));
        self.scratch.clear();
        self.scratch.extend_from_slice(clause);
        self.solver.add_clause_reuse(&mut self.scratch);
    }

    /// Mint a solver-local variable (used by the objective encoders; these
    /// variables never exist in the working formula).
    pub fn new_solver_var(&mut self) -> Var {
        self.solver.new_var_default()
    }

    /// Solve under `assumptions`.
    ///
    /// On [`OracleResult::Unsat`] the conflict clause is retained: its
    /// literals are the negations of the failed assumptions, so with guard
    /// assumptions `~a` the stored core consists of guards `a`.
    pub fn search(&mut self, assumptions: &[Lit]) -> OracleResult {
        let res = self.solver.solve_limited(assumptions);
        if res == lbool::TRUE {
            self.model.clear();
            self.model.extend_from_slice(self.solver.get_model());
            OracleResult::Sat
        } else if res == lbool::FALSE {
            self.core.clear();
            self.core.extend_from_slice(self.solver.unsat_core());
            OracleResult::Unsat
        } else {
            OracleResult::Unknown
        }
    }

    /// Model of the most recent satisfiable call.
    pub fn model(&self) -> &[lbool] {
        &self.model
    }

    /// Core of the most recent unsatisfiable call, normalized as described
    /// on [`SatOracle::search`].
    pub fn core(&self) -> &[Lit] {
        &self.core
    }

    /// Bound the next calls to `budget` of wall time.
    pub fn set_time_budget(&mut self, budget: Duration) {
        self.solver.cb_mut().deadline = Some(Instant::now() + budget);
    }

    /// Remove any time budget.
    pub fn budget_off(&mut self) {
        self.solver.cb_mut().deadline = None;
    }

    /// Prefer `value` for variable `var_idx` when branching. Effective for
    /// variables not yet mirrored into the solver; hints for existing
    /// variables ride on the solver's own phase saving.
    pub fn set_polarity(&mut self, var_idx: u32, value: bool) {
        if var_idx >= self.vars_added {
            self.pending_polarity.insert(var_idx, value);
        }
    }

    /// Record the incumbent's polarities; applied when variables are minted
    /// (in particular to every variable after a reset). The snapshot
    /// supersedes earlier per-variable hints.
    pub fn save_phase(&mut self, model: &[lbool]) {
        self.pending_polarity.clear();
        self.phase_hint.clear();
        self.phase_hint.extend_from_slice(model);
    }

    /// Toggle solution-based phase saving.
    pub fn set_solution_phase_saving(&mut self, on: bool) {
        self.solution_phase_saving = on;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{mk_lit, Formula};

    fn work_of(formula: &Formula) -> WorkingFormula {
        WorkingFormula::standardize(formula)
    }

    #[test]
    fn sync_tracks_watermarks() {
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true), mk_lit(1, true)]);
        formula.add_soft(1, vec![mk_lit(0, false)]);
        let work = work_of(&formula);

        let mut oracle = SatOracle::new();
        assert!(oracle.should_update(&work));
        oracle.sync(&work);

        assert_eq!(oracle.vars_added(), work.num_vars());
        assert_eq!(oracle.clauses_added(), work.n_hard());
        assert_eq!(oracle.softs_added(), 1);
        assert!(!oracle.should_update(&work));
    }

    #[test]
    fn search_produces_model() {
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true)]);
        let work = work_of(&formula);

        let mut oracle = SatOracle::new();
        oracle.sync(&work);
        assert_eq!(oracle.search(&[]), OracleResult::Sat);
        assert_eq!(oracle.model()[0], lbool::TRUE);
    }

    #[test]
    fn core_is_normalized_to_guards() {
        // Hard x0 plus soft (~x0): assuming the soft's guard away conflicts.
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true)]);
        formula.add_soft(1, vec![mk_lit(0, false)]);
        let work = work_of(&formula);
        let guard = work.soft(0).assumption_var.unwrap();

        let mut oracle = SatOracle::new();
        oracle.sync(&work);
        assert_eq!(oracle.search(&[!guard]), OracleResult::Unsat);
        assert_eq!(oracle.core(), &[guard]);
    }

    #[test]
    fn hard_conflict_is_unsat_with_empty_core() {
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true)]);
        formula.add_hard(vec![mk_lit(0, false)]);
        let work = work_of(&formula);

        let mut oracle = SatOracle::new();
        oracle.sync(&work);
        assert_eq!(oracle.search(&[]), OracleResult::Unsat);
        assert!(oracle.core().is_empty());
    }

    #[test]
    fn reset_rebuilds_from_formula() {
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true)]);
        let work = work_of(&formula);

        let mut oracle = SatOracle::new();
        oracle.sync(&work);
        oracle.new_solver_var();
        assert!(oracle.num_vars() > work.num_vars());

        oracle.reset(&work);
        assert_eq!(oracle.num_vars(), work.num_vars());
        assert_eq!(oracle.search(&[]), OracleResult::Sat);
    }

    #[test]
    fn deadline_callback_gates_on_time() {
        let mut cb = DeadlineCallbacks::default();
        assert!(!cb.stop());
        cb.deadline = Some(Instant::now() - Duration::from_millis(1));
        assert!(cb.stop());
        cb.deadline = Some(Instant::now() + Duration::from_secs(3600));
        assert!(!cb.stop());
    }
}
