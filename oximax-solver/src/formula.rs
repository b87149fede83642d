//! MaxSAT formulas: the parsed input formula and the standardized working
//! formula the search rewrites.
//!
//! Two formula types coexist on purpose. [`Formula`] is the immutable parsed
//! instance and the only thing true model costs are ever computed against.
//! [`WorkingFormula`] is the mutable standardized copy the search transforms:
//! every soft clause is a unit `(~a)` over a fresh guard `a`, and PMRES keeps
//! minting new guarded softs as cores are relaxed. Keeping the types apart
//! makes it impossible to account costs against the wrong formula.

use batsat::intmap::AsIndex;
use batsat::{lbool, Lit, Var};

/// Weight of a soft clause.
pub type Weight = u64;

/// Whether the current objective is a plain cardinality objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProblemType {
    /// All active weights are equal.
    Unweighted,
    /// At least two distinct active weights.
    Weighted,
}

/// Variable with the given dense index.
#[inline]
pub fn mk_var(index: u32) -> Var {
    Var::from_index(index as usize)
}

/// Literal over variable `index`; `positive` selects the polarity.
#[inline]
pub fn mk_lit(index: u32, positive: bool) -> Lit {
    Lit::new(mk_var(index), positive)
}

/// Is `lit` true under `model`? Unassigned and out-of-range variables count
/// as not true.
#[inline]
pub fn lit_true_in(model: &[lbool], lit: Lit) -> bool {
    let v = lit.var().idx() as usize;
    if v >= model.len() {
        return false;
    }
    if model[v] == lbool::TRUE {
        lit.sign()
    } else if model[v] == lbool::FALSE {
        !lit.sign()
    } else {
        false
    }
}

/// A soft clause of the working formula.
///
/// After standardization the clause is always a single literal `(~a)`; the
/// guard `a` is stored in `assumption_var` and the oracle is handed `~a` as
/// the assumption that detects falsification. A weight of zero means the
/// clause has been hardened or cleared, and then the guard is absent.
#[derive(Debug, Clone)]
pub struct SoftClause {
    /// The clause literals (a single literal once standardized).
    pub clause: Vec<Lit>,
    /// Remaining weight; zero once hardened or fully paid by cores.
    pub weight: Weight,
    /// The positive guard literal, present iff `weight > 0`.
    pub assumption_var: Option<Lit>,
}

/// The parsed input instance.
///
/// Hard clauses must be satisfied; each soft clause costs its weight when
/// every one of its literals is false. The search keeps this formula around
/// unchanged as the cost-computing formula, because standardization
/// introduces fresh literals that must not leak into cost accounting.
///
/// There is deliberately no way to represent pseudo-Boolean or cardinality
/// constraints here; inputs containing them are rejected by construction.
#[derive(Debug, Clone)]
pub struct Formula {
    num_vars: u32,
    hard: Vec<Vec<Lit>>,
    soft: Vec<(Weight, Vec<Lit>)>,
    sum_weights: Weight,
    max_soft_weight: Weight,
    all_unit_weights: bool,
}

impl Default for Formula {
    fn default() -> Self {
        Self::new()
    }
}

impl Formula {
    /// Empty formula.
    pub fn new() -> Self {
        Self {
            num_vars: 0,
            hard: Vec::new(),
            soft: Vec::new(),
            sum_weights: 0,
            max_soft_weight: 0,
            all_unit_weights: true,
        }
    }

    /// Number of variables (the tightest dense range covering all clauses).
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Number of hard clauses.
    pub fn n_hard(&self) -> usize {
        self.hard.len()
    }

    /// Number of soft clauses.
    pub fn n_soft(&self) -> usize {
        self.soft.len()
    }

    /// Hard clauses in insertion order.
    pub fn hard_clauses(&self) -> &[Vec<Lit>] {
        &self.hard
    }

    /// Soft clauses with their weights, in insertion order.
    pub fn soft_clauses(&self) -> &[(Weight, Vec<Lit>)] {
        &self.soft
    }

    /// Sum of all soft weights.
    pub fn sum_weights(&self) -> Weight {
        self.sum_weights
    }

    /// Largest soft weight, or zero when there are no softs.
    pub fn max_soft_weight(&self) -> Weight {
        self.max_soft_weight
    }

    /// UNWEIGHTED iff every soft clause has weight one.
    pub fn problem_type(&self) -> ProblemType {
        if self.all_unit_weights {
            ProblemType::Unweighted
        } else {
            ProblemType::Weighted
        }
    }

    fn note_vars(&mut self, clause: &[Lit]) {
        for lit in clause {
            let idx = lit.var().idx();
            if idx >= self.num_vars {
                self.num_vars = idx + 1;
            }
        }
    }

    /// Add a hard clause.
    pub fn add_hard(&mut self, clause: Vec<Lit>) {
        self.note_vars(&clause);
        self.hard.push(clause);
    }

    /// Add a soft clause. Weight-zero softs carry no cost and are dropped.
    pub fn add_soft(&mut self, weight: Weight, clause: Vec<Lit>) {
        if weight == 0 {
            return;
        }
        self.note_vars(&clause);
        self.sum_weights += weight;
        if weight > self.max_soft_weight {
            self.max_soft_weight = weight;
        }
        if weight != 1 {
            self.all_unit_weights = false;
        }
        self.soft.push((weight, clause));
    }

    /// True cost of `model`: the summed weight of soft clauses whose literals
    /// are all false under it.
    pub fn cost_of(&self, model: &[lbool]) -> Weight {
        let mut cost = 0;
        for (weight, clause) in &self.soft {
            if !clause.iter().any(|&l| lit_true_in(model, l)) {
                cost += weight;
            }
        }
        cost
    }
}

/// The standardized formula the search mutates.
///
/// Hard clauses only grow; soft clauses are unit, guarded, and never removed.
/// A cleared soft keeps its index so that historical cores stay resolvable.
#[derive(Debug, Clone)]
pub struct WorkingFormula {
    num_vars: u32,
    hard: Vec<Vec<Lit>>,
    softs: Vec<SoftClause>,
    maximum_weight: Weight,
    sum_weights: Weight,
    problem_type: ProblemType,
}

impl WorkingFormula {
    /// Standardize `input`: each original soft `C` with weight `w` becomes a
    /// hard clause `C \/ a` over a fresh guard `a` plus a unit soft `(~a)` of
    /// weight `w`. The guard is only constrained by `C \/ a`, so a minimal
    /// model sets it true exactly when `C` is falsified and costs match.
    pub fn standardize(input: &Formula) -> Self {
        let mut work = Self {
            num_vars: input.num_vars(),
            hard: Vec::with_capacity(input.n_hard() + input.n_soft()),
            softs: Vec::with_capacity(input.n_soft()),
            maximum_weight: input.max_soft_weight().max(1),
            sum_weights: input.sum_weights(),
            problem_type: input.problem_type(),
        };
        for clause in input.hard_clauses() {
            work.hard.push(clause.clone());
        }
        for (weight, clause) in input.soft_clauses() {
            let guard = work.new_lit();
            let mut relaxed = clause.clone();
            relaxed.push(guard);
            work.hard.push(relaxed);
            work.add_unit_soft(*weight, guard);
        }
        work
    }

    /// Number of variables minted so far.
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Mint a fresh variable.
    pub fn new_var(&mut self) -> Var {
        let v = mk_var(self.num_vars);
        self.num_vars += 1;
        v
    }

    /// Mint a fresh variable and return its positive literal.
    pub fn new_lit(&mut self) -> Lit {
        Lit::new(self.new_var(), true)
    }

    /// Number of hard clauses.
    pub fn n_hard(&self) -> usize {
        self.hard.len()
    }

    /// Number of soft clauses, cleared ones included.
    pub fn n_soft(&self) -> usize {
        self.softs.len()
    }

    /// Hard clause `index`.
    pub fn hard(&self, index: usize) -> &[Lit] {
        &self.hard[index]
    }

    /// Soft clause `index`.
    pub fn soft(&self, index: usize) -> &SoftClause {
        &self.softs[index]
    }

    /// Mutable soft clause `index`.
    pub fn soft_mut(&mut self, index: usize) -> &mut SoftClause {
        &mut self.softs[index]
    }

    /// All soft clauses.
    pub fn softs(&self) -> &[SoftClause] {
        &self.softs
    }

    /// Add a hard clause.
    pub fn add_hard(&mut self, clause: Vec<Lit>) {
        debug_assert!(clause.iter().all(|l| l.var().idx() < self.num_vars));
        self.hard.push(clause);
    }

    /// Add the unit soft `(~guard)` with the given weight and return its
    /// index. The guard must be a fresh positive literal.
    pub fn add_unit_soft(&mut self, weight: Weight, guard: Lit) -> usize {
        debug_assert!(guard.sign());
        debug_assert!(weight > 0);
        self.softs.push(SoftClause {
            clause: vec![!guard],
            weight,
            assumption_var: Some(guard),
        });
        self.softs.len() - 1
    }

    /// Stratification cursor.
    pub fn maximum_weight(&self) -> Weight {
        self.maximum_weight
    }

    /// Move the stratification cursor.
    pub fn set_maximum_weight(&mut self, weight: Weight) {
        debug_assert!(weight >= 1);
        self.maximum_weight = weight;
    }

    /// Initial total soft weight.
    pub fn sum_weights(&self) -> Weight {
        self.sum_weights
    }

    /// Objective shape of the current iteration.
    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    /// Reclassify the objective for the next linear iteration.
    pub fn set_problem_type(&mut self, problem_type: ProblemType) {
        self.problem_type = problem_type;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formula_tracks_vars_and_weights() {
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true), mk_lit(4, false)]);
        formula.add_soft(3, vec![mk_lit(2, true)]);
        formula.add_soft(5, vec![mk_lit(1, false)]);

        assert_eq!(formula.num_vars(), 5);
        assert_eq!(formula.sum_weights(), 8);
        assert_eq!(formula.max_soft_weight(), 5);
        assert_eq!(formula.problem_type(), ProblemType::Weighted);
    }

    #[test]
    fn unit_weights_are_unweighted() {
        let mut formula = Formula::new();
        formula.add_soft(1, vec![mk_lit(0, true)]);
        formula.add_soft(1, vec![mk_lit(1, true)]);
        assert_eq!(formula.problem_type(), ProblemType::Unweighted);
    }

    #[test]
    fn zero_weight_softs_are_dropped() {
        let mut formula = Formula::new();
        formula.add_soft(0, vec![mk_lit(0, true)]);
        assert_eq!(formula.n_soft(), 0);
        assert_eq!(formula.sum_weights(), 0);
    }

    #[test]
    fn standardization_makes_unit_guarded_softs() {
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true), mk_lit(1, true)]);
        formula.add_soft(2, vec![mk_lit(0, false), mk_lit(1, false)]);

        let work = WorkingFormula::standardize(&formula);

        // One relaxed copy of the soft clause joins the hard clauses.
        assert_eq!(work.n_hard(), 2);
        assert_eq!(work.n_soft(), 1);

        let soft = work.soft(0);
        assert_eq!(soft.clause.len(), 1);
        assert_eq!(soft.weight, 2);
        let guard = soft.assumption_var.unwrap();
        assert!(guard.sign());
        assert_eq!(soft.clause[0], !guard);
        assert_eq!(guard.var().idx(), 2);
        assert_eq!(work.num_vars(), 3);
    }

    #[test]
    fn standardization_preserves_cost() {
        // Hard: x0 \/ x1; softs: (~x0 \/ ~x1, 2), (x0, 1).
        let mut formula = Formula::new();
        formula.add_hard(vec![mk_lit(0, true), mk_lit(1, true)]);
        formula.add_soft(2, vec![mk_lit(0, false), mk_lit(1, false)]);
        formula.add_soft(1, vec![mk_lit(0, true)]);

        let work = WorkingFormula::standardize(&formula);

        // Evaluate every assignment of the original variables; complete the
        // guards minimally (guard true iff its original clause is falsified)
        // and compare the working-soft cost with the true cost.
        for bits in 0..4u32 {
            let mut model = vec![lbool::UNDEF; work.num_vars() as usize];
            for v in 0..2 {
                model[v] = if bits & (1 << v) != 0 {
                    lbool::TRUE
                } else {
                    lbool::FALSE
                };
            }
            for (i, (_, clause)) in formula.soft_clauses().iter().enumerate() {
                let falsified = !clause.iter().any(|&l| lit_true_in(&model, l));
                let guard = work.soft(i).assumption_var.unwrap();
                model[guard.var().idx() as usize] = if falsified {
                    lbool::TRUE
                } else {
                    lbool::FALSE
                };
            }

            let mut working_cost = 0;
            for soft in work.softs() {
                if !lit_true_in(&model, soft.clause[0]) {
                    working_cost += soft.weight;
                }
            }
            assert_eq!(working_cost, formula.cost_of(&model));
        }
    }

    #[test]
    fn cost_counts_fully_falsified_softs_only() {
        let mut formula = Formula::new();
        formula.add_soft(4, vec![mk_lit(0, true), mk_lit(1, true)]);

        let sat = vec![lbool::TRUE, lbool::FALSE];
        let unsat = vec![lbool::FALSE, lbool::FALSE];
        assert_eq!(formula.cost_of(&sat), 0);
        assert_eq!(formula.cost_of(&unsat), 4);
    }
}
