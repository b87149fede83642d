//! PMRES search engine.
//!
//! The solver owns the standardized working formula, the SAT oracle, and the
//! active objective encoding, and drives two bound proofs against each other:
//! unsatisfiable cores lift the lower bound (core-guided phase, PMRES
//! relaxation) while discovered models push the upper bound down (linear
//! phase, tightened objective encodings). Optimality is certified when the
//! bounds meet.
//!
//! The module is split by concern: weight schedules in [`weights`]
//! (module-private), the core-guided phase in `core_guided`, the linear
//! phase in `linear`. Everything shares the [`PmresSolver`] state.

mod core_guided;
mod linear;
mod weights;

use std::time::Instant;

use batsat::{lbool, Lit};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::{SearchMode, SearchStats, SolverConfig, WeightStrategy};
use crate::encode::Encoder;
use crate::error::SolverError;
use crate::formula::{Formula, Weight, WorkingFormula};
use crate::oracle::{OracleResult, SatOracle};

/// Final status of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The reported model is optimal.
    Optimum,
    /// A model was found but optimality was not proved (budget ran out).
    Satisfiable,
    /// The hard clauses are unsatisfiable.
    Unsatisfiable,
    /// No model found and nothing proved.
    Unknown,
}

impl SolveStatus {
    /// Conventional MaxSAT-solver exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            SolveStatus::Satisfiable => 10,
            SolveStatus::Unsatisfiable => 20,
            SolveStatus::Optimum => 30,
            SolveStatus::Unknown => 40,
        }
    }
}

/// Which bound proof the search is currently driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    CoreGuided,
    Linear,
}

impl Phase {
    fn prefix(self) -> &'static str {
        match self {
            Phase::CoreGuided => "CG",
            Phase::Linear => "LIN",
        }
    }
}

/// Core-guided weighted MaxSAT solver.
pub struct PmresSolver {
    cfg: SolverConfig,
    /// The parsed instance; the only formula true costs are computed against.
    input: Formula,
    /// The standardized formula the search rewrites.
    work: WorkingFormula,
    oracle: SatOracle,
    /// Guard literal to soft-clause index; grows monotonically, entries are
    /// never removed (stale weight-zero softs stay resolvable for cores).
    core_map: FxHashMap<Lit, usize>,
    assumptions: Vec<Lit>,
    encoder: Option<Encoder>,
    objective: Vec<Lit>,
    coeffs: Vec<Weight>,
    /// Common reduced weight of an unweighted linear iteration.
    reduced_common: Weight,
    lb_cost: Weight,
    ub_cost: Weight,
    known_gap: Weight,
    best_model: Vec<lbool>,
    maxw_nothardened: Weight,
    nb_current_soft: usize,
    phase: Phase,
    stats: SearchStats,
    started: Instant,
}

impl PmresSolver {
    /// Standardize `input` and prepare a search with the given configuration.
    pub fn new(input: Formula, mut cfg: SolverConfig) -> Self {
        cfg.varres_factor = cfg.varres_factor.max(2);
        let work = WorkingFormula::standardize(&input);
        let mut core_map = FxHashMap::default();
        for (index, soft) in work.softs().iter().enumerate() {
            if let Some(guard) = soft.assumption_var {
                core_map.insert(guard, index);
            }
        }
        let sum_weights = work.sum_weights();
        Self {
            cfg,
            input,
            work,
            oracle: SatOracle::new(),
            core_map,
            assumptions: Vec::new(),
            encoder: None,
            objective: Vec::new(),
            coeffs: Vec::new(),
            reduced_common: 1,
            lb_cost: 0,
            ub_cost: sum_weights.saturating_add(1),
            known_gap: Weight::MAX,
            best_model: Vec::new(),
            maxw_nothardened: sum_weights,
            nb_current_soft: 0,
            phase: Phase::CoreGuided,
            stats: SearchStats::default(),
            started: Instant::now(),
        }
    }

    /// Run the search to completion (or until the budget gives out).
    pub fn solve(&mut self) -> Result<SolveStatus, SolverError> {
        if self.cfg.weight_strategy == WeightStrategy::None {
            self.comment("weight strategy NONE upgraded to NORMAL");
            self.cfg.weight_strategy = WeightStrategy::Normal;
        }
        self.comment(format!(
            "PMRES search: mode {:?}, strategy {:?}, varres cg={} lin={} factor={}",
            self.cfg.mode,
            self.cfg.weight_strategy,
            self.cfg.varying_res_cg,
            self.cfg.varying_res,
            self.cfg.varres_factor,
        ));
        self.comment(format!("soft clauses: {}", self.n_real_soft()));
        if self.cfg.mode == SearchMode::LinearOnly {
            self.phase = Phase::Linear;
        }

        match self.setup()? {
            SolveStatus::Unsatisfiable => return Ok(SolveStatus::Unsatisfiable),
            SolveStatus::Unknown => {
                self.print_answer(SolveStatus::Unknown);
                return Ok(SolveStatus::Unknown);
            }
            _ => {}
        }

        match self.cfg.mode {
            SearchMode::CoreGuided => self.weight_search(),
            SearchMode::CoreThenLinear => self.core_guided_linear_search(),
            SearchMode::LinearOnly => self.linear_search(),
        }
    }

    /// Build the oracle, verify the hard part is satisfiable, and pick the
    /// initial stratification level. Every search strategy assumes this ran.
    fn setup(&mut self) -> Result<SolveStatus, SolverError> {
        self.oracle.set_solution_phase_saving(false);
        // Bias branching toward satisfying the (original) unit softs.
        for index in 0..self.input.n_soft() {
            let lit = self.work.soft(index).clause[0];
            self.oracle.set_polarity(lit.var().idx(), lit.sign());
        }
        self.oracle.sync(&self.work);

        match self.oracle.search(&[]) {
            OracleResult::Unsat => {
                self.stats.nb_cores += 1;
                self.print_answer(SolveStatus::Unsatisfiable);
                return Ok(SolveStatus::Unsatisfiable);
            }
            OracleResult::Sat => {
                self.stats.nb_satisfiable += 1;
                let before = self.ub_cost;
                self.check_model();
                debug_assert!(self.ub_cost <= before);
            }
            OracleResult::Unknown => return Ok(SolveStatus::Unknown),
        }

        if self.cfg.varying_res_cg {
            self.initialize_division_factor(true);
        } else {
            self.update_current_weight();
        }
        Ok(SolveStatus::Satisfiable)
    }

    /// Evaluate the oracle's model against the input formula; adopt it when
    /// it improves the upper bound (or extends an equal-cost model to more
    /// variables, which later phases rely on for anchoring).
    pub(crate) fn check_model(&mut self) -> bool {
        let model_cost = self.input.cost_of(self.oracle.model());
        let improved = model_cost < self.ub_cost;
        if improved {
            self.ub_cost = model_cost;
            self.print_progress();
            self.best_model.clear();
            self.best_model.extend_from_slice(self.oracle.model());
            self.print_bound(model_cost);
            self.check_gap();
        } else if model_cost == self.ub_cost && self.oracle.model().len() > self.best_model.len() {
            debug!("adopting equal-cost model over more variables");
            self.best_model.clear();
            self.best_model.extend_from_slice(self.oracle.model());
        }
        improved
    }

    /// Track the smallest observed `ub - lb` gap.
    pub(crate) fn check_gap(&mut self) {
        let gap = self.ub_cost.saturating_sub(self.lb_cost);
        if gap < self.known_gap {
            self.known_gap = gap;
            self.comment(format!(
                "{} gap {} at {:.1}s",
                self.phase.prefix(),
                gap,
                self.elapsed()
            ));
        }
    }

    /// Seed the oracle's phase hints with the incumbent model.
    pub(crate) fn save_phase(&mut self) {
        self.oracle.save_phase(&self.best_model);
    }

    /// Soft clauses that still carry weight.
    pub(crate) fn n_real_soft(&self) -> usize {
        self.work.n_soft() - self.stats.num_hardened as usize
    }

    pub(crate) fn elapsed(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Emit a `c`-prefixed diagnostic line.
    pub(crate) fn comment(&self, message: impl AsRef<str>) {
        if self.cfg.verbosity > 0 {
            println!("c {}", message.as_ref());
        }
    }

    /// Emit the `o <cost>` line for an improved upper bound.
    pub(crate) fn print_bound(&self, cost: Weight) {
        if self.cfg.print_answers {
            println!("o {cost}");
        }
    }

    fn print_progress(&self) {
        self.comment(format!(
            "{} best {} LB {} at {:.1}s",
            self.phase.prefix(),
            self.ub_cost,
            self.lb_cost,
            self.elapsed()
        ));
    }

    /// Emit the final `s` line, and the `v` line when a model exists.
    pub(crate) fn print_answer(&self, status: SolveStatus) {
        if !self.cfg.print_answers {
            return;
        }
        match status {
            SolveStatus::Optimum => {
                println!("s OPTIMUM FOUND");
                self.print_model();
            }
            SolveStatus::Satisfiable => {
                println!("s SATISFIABLE");
                self.print_model();
            }
            SolveStatus::Unsatisfiable => println!("s UNSATISFIABLE"),
            SolveStatus::Unknown => println!("s UNKNOWN"),
        }
    }

    /// Print the best model projected onto the input variables.
    fn print_model(&self) {
        let mut line = String::from("v");
        for v in 0..self.input.num_vars() {
            let value = self
                .best_model
                .get(v as usize)
                .copied()
                .unwrap_or(lbool::UNDEF);
            let dimacs = v as i64 + 1;
            if value == lbool::FALSE {
                line.push_str(&format!(" -{dimacs}"));
            } else {
                line.push_str(&format!(" {dimacs}"));
            }
        }
        println!("{line}");
    }

    /// Status returned when a budget runs out: the incumbent, if any, is
    /// still a valid answer.
    pub(crate) fn interrupted_status(&self) -> SolveStatus {
        if self.best_model.is_empty() {
            SolveStatus::Unknown
        } else {
            SolveStatus::Satisfiable
        }
    }

    /// Lower bound proved so far.
    pub fn lb_cost(&self) -> Weight {
        self.lb_cost
    }

    /// Cost of the best model found so far.
    pub fn ub_cost(&self) -> Weight {
        self.ub_cost
    }

    /// Best model found so far, if any (covers at least the input variables).
    pub fn best_model(&self) -> Option<&[lbool]> {
        if self.best_model.is_empty() {
            None
        } else {
            Some(&self.best_model)
        }
    }

    /// Search statistics.
    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// The input formula the reported costs refer to.
    pub fn input(&self) -> &Formula {
        &self.input
    }
}
