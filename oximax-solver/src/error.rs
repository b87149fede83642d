//! Error type for the search engine.

use thiserror::Error;

use crate::formula::Weight;

/// Fatal conditions raised by the search engine.
///
/// Only budget-driven `Unknown` results are recoverable within a search; the
/// conditions below indicate a broken invariant or a misused component and
/// short-circuit to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolverError {
    /// The lower bound climbed past the upper bound.
    #[error("lower bound {lb} exceeds upper bound {ub}")]
    BoundsCrossed {
        /// Lower bound at the time of the violation.
        lb: Weight,
        /// Upper bound at the time of the violation.
        ub: Weight,
    },

    /// A core referenced a soft clause whose weight is below the core cost.
    #[error("core cost {core_cost} exceeds weight {weight} of soft clause {index}")]
    CoreWeightMismatch {
        /// Index of the offending soft clause.
        index: usize,
        /// Remaining weight of the soft clause.
        weight: Weight,
        /// Cost attributed to the core.
        core_cost: Weight,
    },

    /// A core literal has no entry in the guard map.
    #[error("core literal without a guarded soft clause")]
    UnmappedCoreLiteral,

    /// The oracle reported an unsatisfiable result with an empty core.
    #[error("oracle returned an empty core under assumptions")]
    EmptyCore,

    /// A model produced under a full assumption set does not match the lower
    /// bound it must certify.
    #[error("model cost {model_cost} differs from lower bound {lb} with all soft clauses active")]
    ModelCostMismatch {
        /// True cost of the model.
        model_cost: Weight,
        /// Lower bound the model should have met.
        lb: Weight,
    },

    /// An RHS update was requested with no matching encoding in place.
    #[error("no {0} encoding to update")]
    MissingEncoding(&'static str),

    /// The oracle returned a status that is impossible at this point.
    #[error("unexpected oracle status during {0}")]
    UnexpectedOracleStatus(&'static str),

    /// An internal state-machine invariant failed.
    #[error("internal error: {0}")]
    Internal(&'static str),
}
