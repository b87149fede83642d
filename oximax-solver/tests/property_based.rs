//! Randomized cross-check of the search against an exhaustive optimum.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use oximax_solver::{
    lbool, mk_lit, Formula, PmresSolver, SearchMode, SolveStatus, SolverConfig,
};

#[derive(Debug, Clone)]
struct Instance {
    num_vars: u32,
    hard: Vec<Vec<(u32, bool)>>,
    soft: Vec<(u64, Vec<(u32, bool)>)>,
}

impl Instance {
    fn formula(&self) -> Formula {
        let mut formula = Formula::new();
        for clause in &self.hard {
            formula.add_hard(clause.iter().map(|&(v, s)| mk_lit(v, s)).collect());
        }
        for (weight, clause) in &self.soft {
            formula.add_soft(*weight, clause.iter().map(|&(v, s)| mk_lit(v, s)).collect());
        }
        formula
    }
}

fn instances() -> impl Strategy<Value = Instance> {
    (1u32..=4).prop_flat_map(|num_vars| {
        let clause = prop::collection::vec((0..num_vars, any::<bool>()), 1..=3);
        let hard = prop::collection::vec(clause.clone(), 0..=4);
        let soft = prop::collection::vec((1u64..=6, clause), 1..=5);
        (hard, soft).prop_map(move |(hard, soft)| Instance {
            num_vars,
            hard,
            soft,
        })
    })
}

fn brute_force(formula: &Formula) -> Option<u64> {
    let n = formula.num_vars();
    let mut best: Option<u64> = None;
    for bits in 0u32..1 << n {
        let model: Vec<lbool> = (0..n)
            .map(|v| {
                if bits & (1 << v) != 0 {
                    lbool::TRUE
                } else {
                    lbool::FALSE
                }
            })
            .collect();
        let hard_ok = formula.hard_clauses().iter().all(|clause| {
            clause.iter().any(|&l| {
                let value = model[l.var().idx() as usize];
                (value == lbool::TRUE) == l.sign()
            })
        });
        if hard_ok {
            let cost = formula.cost_of(&model);
            best = Some(best.map_or(cost, |b: u64| b.min(cost)));
        }
    }
    best
}

fn check_instance(instance: &Instance, cfg: SolverConfig) -> Result<(), TestCaseError> {
    let formula = instance.formula();
    let expected = brute_force(&formula);
    let mut solver = PmresSolver::new(formula.clone(), cfg.clone());
    let status = solver.solve().map_err(|e| {
        TestCaseError::fail(format!("solver error with {cfg:?}: {e}"))
    })?;

    match expected {
        None => prop_assert_eq!(status, SolveStatus::Unsatisfiable),
        Some(optimum) => {
            prop_assert_eq!(status, SolveStatus::Optimum, "config {:?}", &cfg);
            prop_assert_eq!(solver.ub_cost(), optimum, "config {:?}", &cfg);
            prop_assert!(solver.lb_cost() <= solver.ub_cost());
            let model = solver.best_model().expect("optimum without model");
            prop_assert_eq!(formula.cost_of(model), optimum);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    /// All three strategies report the exhaustive optimum.
    #[test]
    fn strategies_match_brute_force(instance in instances()) {
        for mode in [
            SearchMode::CoreGuided,
            SearchMode::CoreThenLinear,
            SearchMode::LinearOnly,
        ] {
            let cfg = SolverConfig { mode, ..SolverConfig::default() };
            check_instance(&instance, cfg)?;
        }
    }

    /// The geometric schedules agree with the classical ones.
    #[test]
    fn varying_resolution_matches_brute_force(instance in instances()) {
        let cfg = SolverConfig {
            mode: SearchMode::CoreThenLinear,
            varying_res_cg: true,
            varying_res: true,
            delete_before_lin: true,
            ..SolverConfig::default()
        };
        check_instance(&instance, cfg)?;

        let cfg = SolverConfig {
            mode: SearchMode::LinearOnly,
            varying_res: true,
            incremental_varres: true,
            ..SolverConfig::default()
        };
        check_instance(&instance, cfg)?;
    }
}
