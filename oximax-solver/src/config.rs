//! Solver configuration and search statistics.

use std::time::Duration;

use crate::encode::PbEncoding;

/// Top-level search strategy (the `lins` knob of the CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Pure core-guided search.
    CoreGuided,
    /// Core-guided phase followed by a linear phase.
    #[default]
    CoreThenLinear,
    /// Linear phase only.
    LinearOnly,
}

impl SearchMode {
    /// Map the numeric `lins` value (0, 1, 2) to a mode.
    pub fn from_lins(lins: u32) -> Option<Self> {
        match lins {
            0 => Some(Self::CoreGuided),
            1 => Some(Self::CoreThenLinear),
            2 => Some(Self::LinearOnly),
            _ => None,
        }
    }
}

/// Strategy for advancing the stratification cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeightStrategy {
    /// No strategy; upgraded to [`WeightStrategy::Normal`] at startup.
    None,
    /// Step to the next smaller distinct weight.
    Normal,
    /// Step until the active set is diverse enough.
    #[default]
    Diversify,
}

/// Configuration for the PMRES search engine.
///
/// All knobs are plain values constructed at entry; there is no global
/// configuration state.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Top-level strategy.
    pub mode: SearchMode,
    /// Stratification strategy for the core-guided phase.
    pub weight_strategy: WeightStrategy,
    /// Geometric weight schedule in the core-guided phase.
    pub varying_res_cg: bool,
    /// Geometric weight schedule in the linear phase.
    pub varying_res: bool,
    /// Base of the geometric schedules.
    pub varres_factor: u64,
    /// Time budget per core-phase oracle call; `None` disables the budget.
    pub time_limit_cores: Option<Duration>,
    /// Reset the oracle when switching to the linear phase.
    pub delete_before_lin: bool,
    /// In the core phase, resync the oracle before advancing the cursor.
    pub relax_before_strat: bool,
    /// Tighten the objective bound through assumptions only.
    pub incremental_varres: bool,
    /// Pseudo-Boolean encoding family for the linear phase.
    pub pb_encoding: PbEncoding,
    /// Emit `c`-prefixed diagnostic lines when greater than zero.
    pub verbosity: u32,
    /// Emit the `o` / `s` / `v` answer lines of the MaxSAT output format.
    pub print_answers: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            weight_strategy: WeightStrategy::default(),
            varying_res_cg: false,
            varying_res: false,
            varres_factor: 2,
            time_limit_cores: None,
            delete_before_lin: false,
            relax_before_strat: false,
            incremental_varres: false,
            pb_encoding: PbEncoding::default(),
            verbosity: 0,
            print_answers: false,
        }
    }
}

/// Counters gathered during a search.
#[derive(Debug, Clone, Default)]
pub struct SearchStats {
    /// Number of cores extracted.
    pub nb_cores: u64,
    /// Number of satisfiable oracle answers.
    pub nb_satisfiable: u64,
    /// Total size of all extracted cores.
    pub sum_size_cores: u64,
    /// Soft clauses hardened or cleared to weight zero.
    pub num_hardened: u64,
}
