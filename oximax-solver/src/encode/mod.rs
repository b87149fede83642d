//! CNF encodings of the objective bound used by the linear phase.
//!
//! Cardinality bounds (`sum x_i <= k`) use a totalizer; pseudo-Boolean bounds
//! (`sum w_i x_i <= k`) use a generalized totalizer. Both stream their
//! clauses straight into the oracle and support tightening the right-hand
//! side in place; the generalized totalizer additionally supports expressing
//! a tighter bound purely through assumptions.

mod gte;
mod totalizer;

pub use gte::Gte;
pub use totalizer::Totalizer;

use batsat::Lit;

use crate::error::SolverError;
use crate::formula::Weight;
use crate::oracle::SatOracle;

/// Pseudo-Boolean encoding family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PbEncoding {
    /// Generalized totalizer.
    #[default]
    GeneralizedTotalizer,
}

/// One objective encoding, cardinality or pseudo-Boolean.
///
/// A fresh encoder is constructed for every (re-)encoding round; the previous
/// one is dropped first, and after an oracle reset the clauses it streamed
/// are gone with the solver, so updating a stale encoder is a usage error.
pub struct Encoder {
    pb_encoding: PbEncoding,
    /// Assumption mode: the pseudo-Boolean bound lives entirely in
    /// assumptions and no permanent units are streamed.
    incremental: bool,
    card: Option<Totalizer>,
    pb: Option<Gte>,
}

impl Encoder {
    /// Encoder with the chosen pseudo-Boolean family; nothing encoded yet.
    pub fn new(pb_encoding: PbEncoding, incremental: bool) -> Self {
        Self {
            pb_encoding,
            incremental,
            card: None,
            pb: None,
        }
    }

    /// Has a cardinality encoding been built?
    pub fn has_card_encoding(&self) -> bool {
        self.card.is_some()
    }

    /// Has a pseudo-Boolean encoding been built?
    pub fn has_pb_encoding(&self) -> bool {
        self.pb.is_some()
    }

    /// Build `sum lits <= rhs`.
    pub fn encode_cardinality(&mut self, oracle: &mut SatOracle, lits: &[Lit], rhs: Weight) {
        debug_assert!(self.card.is_none());
        self.card = Some(Totalizer::encode(oracle, lits, rhs));
    }

    /// Tighten the cardinality bound to `rhs`.
    pub fn update_cardinality(
        &mut self,
        oracle: &mut SatOracle,
        rhs: Weight,
    ) -> Result<(), SolverError> {
        self.card
            .as_mut()
            .ok_or(SolverError::MissingEncoding("cardinality"))?
            .update(oracle, rhs);
        Ok(())
    }

    /// Build `sum coeffs[i] * lits[i] <= rhs`.
    pub fn encode_pb(
        &mut self,
        oracle: &mut SatOracle,
        lits: &[Lit],
        coeffs: &[Weight],
        rhs: Weight,
    ) {
        debug_assert!(self.pb.is_none());
        match self.pb_encoding {
            PbEncoding::GeneralizedTotalizer => {
                self.pb = Some(Gte::encode(oracle, lits, coeffs, rhs, self.incremental));
            }
        }
    }

    /// Tighten the pseudo-Boolean bound to `rhs` with permanent units.
    pub fn update_pb(&mut self, oracle: &mut SatOracle, rhs: Weight) -> Result<(), SolverError> {
        self.pb
            .as_mut()
            .ok_or(SolverError::MissingEncoding("pseudo-Boolean"))?
            .update(oracle, rhs);
        Ok(())
    }

    /// Express the bound `rhs` purely through `assumptions`; no permanent
    /// clauses are added, so the bound can be relaxed again later.
    pub fn update_pb_assumptions(
        &self,
        assumptions: &mut Vec<Lit>,
        rhs: Weight,
    ) -> Result<(), SolverError> {
        self.pb
            .as_ref()
            .ok_or(SolverError::MissingEncoding("pseudo-Boolean"))?
            .update_assumptions(assumptions, rhs);
        Ok(())
    }
}
