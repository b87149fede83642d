//! OxiMax Solver - Core-Guided Weighted MaxSAT
//!
//! This crate implements a core-guided weighted MaxSAT solver layered on an
//! incremental CDCL SAT oracle:
//! - PMRES core relaxation with stratified and varying-resolution weight
//!   schedules
//! - Clause hardening driven by the lower/upper bound gap
//! - A model-improving linear phase over totalizer / generalized-totalizer
//!   objective encodings
//! - Three top-level strategies: pure core-guided, core-guided followed by
//!   linear, and pure linear
//!
//! # Examples
//!
//! ```
//! use oximax_solver::{mk_lit, Formula, PmresSolver, SolveStatus, SolverConfig};
//!
//! // Hard: x0 \/ x1. Softs: (~x0, weight 3), (~x1, weight 5).
//! let mut formula = Formula::new();
//! formula.add_hard(vec![mk_lit(0, true), mk_lit(1, true)]);
//! formula.add_soft(3, vec![mk_lit(0, false)]);
//! formula.add_soft(5, vec![mk_lit(1, false)]);
//!
//! let mut solver = PmresSolver::new(formula, SolverConfig::default());
//! let status = solver.solve().unwrap();
//!
//! assert_eq!(status, SolveStatus::Optimum);
//! assert_eq!(solver.ub_cost(), 3);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod encode;
pub mod error;
pub mod formula;
pub mod oracle;
pub mod pmres;
pub mod wcnf;

pub use batsat::{lbool, Lit, Var};
pub use config::{SearchMode, SearchStats, SolverConfig, WeightStrategy};
pub use encode::PbEncoding;
pub use error::SolverError;
pub use formula::{mk_lit, mk_var, Formula, ProblemType, Weight, WorkingFormula};
pub use pmres::{PmresSolver, SolveStatus};
pub use wcnf::{parse_wcnf, WcnfError};
