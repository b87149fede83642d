//! Stratification and varying-resolution weight schedules.
//!
//! Both families move the working formula's `maximum_weight` cursor, which
//! selects the softs the core-guided phase assumes and scales the objective
//! of the linear phase. Classical stratification steps through the distinct
//! soft weights; varying resolution walks down powers of a small factor.
//! Every schedule saturates at 1.

use rustc_hash::FxHashSet;

use crate::config::WeightStrategy;
use crate::formula::Weight;

use super::PmresSolver;

/// Diversity ratio between active softs and their distinct weights.
const ALPHA: f64 = 1.25;

impl PmresSolver {
    /// Advance the stratification cursor one step, by the configured
    /// strategy (classical mode) or by the division factor (varying
    /// resolution).
    pub(crate) fn update_current_weight(&mut self) {
        if !self.cfg.varying_res_cg {
            let cursor = self.work.maximum_weight();
            let next = match self.cfg.weight_strategy {
                WeightStrategy::Normal => self.next_weight(cursor),
                WeightStrategy::Diversify => self.next_weight_diversity(cursor),
                // Upgraded before the search starts.
                WeightStrategy::None => self.next_weight(cursor),
            };
            self.work.set_maximum_weight(next);
        } else {
            self.update_division_factor();
        }
        self.comment(format!(
            "CG new weight {} at {:.1}s",
            self.work.maximum_weight(),
            self.elapsed()
        ));
    }

    /// Largest soft weight strictly below `weight`, or 1 if none.
    pub(crate) fn next_weight(&self, weight: Weight) -> Weight {
        let mut next = 1;
        for soft in self.work.softs() {
            if soft.weight > next && soft.weight < weight {
                next = soft.weight;
            }
        }
        next
    }

    /// Step down from `weight` until the active set is diverse enough: the
    /// ratio of active softs to distinct active weights exceeds [`ALPHA`]
    /// while strictly growing the active set, or every real soft is active.
    /// Right after the initial satisfiability check the first step is
    /// skipped so the top level gets its turn.
    pub(crate) fn next_weight_diversity(&self, weight: Weight) -> Weight {
        debug_assert!(self.stats.nb_satisfiable > 0);
        let mut next = weight;
        let mut find_next = false;
        loop {
            if self.stats.nb_satisfiable > 1 || find_next {
                next = self.next_weight(next);
            }

            let mut active = 0usize;
            let mut distinct: FxHashSet<Weight> = FxHashSet::default();
            for soft in self.work.softs() {
                if soft.weight >= next {
                    active += 1;
                    distinct.insert(soft.weight);
                }
            }

            let diverse = !distinct.is_empty()
                && active as f64 / distinct.len() as f64 > ALPHA
                && active > self.nb_current_soft;
            if diverse || active == self.n_real_soft() {
                return next;
            }

            if self.stats.nb_satisfiable == 1 && !find_next {
                find_next = true;
            }
        }
    }

    /// Does the candidate cursor `weight` admit a diverse-enough active set?
    pub(crate) fn enough_soft_above(&self, weight: Weight) -> bool {
        let mut active = 0usize;
        let mut distinct: FxHashSet<Weight> = FxHashSet::default();
        for soft in self.work.softs() {
            if soft.weight >= weight {
                active += 1;
                distinct.insert(soft.weight);
            }
        }
        (!distinct.is_empty() && active as f64 / distinct.len() as f64 > ALPHA)
            || active == self.n_real_soft()
    }

    /// Softs whose weight is at least `weight`.
    pub(crate) fn more_than_weight(&self, weight: Weight) -> usize {
        self.work
            .softs()
            .iter()
            .filter(|soft| soft.weight >= weight)
            .count()
    }

    /// Reset the cursor to the largest current soft weight.
    pub(crate) fn reset_maximum_weight(&mut self) {
        let max = self
            .work
            .softs()
            .iter()
            .map(|soft| soft.weight)
            .max()
            .unwrap_or(0)
            .max(1);
        self.work.set_maximum_weight(max);
    }

    /// Varying-resolution step for the core-guided phase: divide by the
    /// factor until the active set is diverse enough.
    pub(crate) fn update_division_factor(&mut self) {
        let factor = self.cfg.varres_factor;
        let mut next = (self.work.maximum_weight() / factor).max(1);
        while !self.enough_soft_above(next) && next > 1 {
            next = (next / factor).max(1);
        }
        self.work.set_maximum_weight(next);
        self.comment(format!("CG division factor {next}"));
    }

    /// Varying-resolution step between linear iterations: divide while the
    /// active-soft count stays unchanged, so the next encoding actually sees
    /// new softs.
    pub(crate) fn update_division_factor_linear(&mut self) {
        let factor = self.cfg.varres_factor;
        let mut next = (self.work.maximum_weight() / factor).max(1);
        while self.more_than_weight(next) == self.nb_current_soft && next > 1 {
            next = (next / factor).max(1);
        }
        self.work.set_maximum_weight(next);
        self.comment(format!("LIN new factor {next}"));
    }

    /// Initialize the varying-resolution cursor: the largest power of the
    /// factor not above the maximum soft weight, divided down until the
    /// active set is diverse enough. With `enabled` false the cursor simply
    /// becomes 1 (full resolution).
    pub(crate) fn initialize_division_factor(&mut self, enabled: bool) {
        if !enabled {
            self.work.set_maximum_weight(1);
            self.comment("division factor disabled, weight 1");
            return;
        }

        self.reset_maximum_weight();
        let factor = self.cfg.varres_factor;
        let max = self.work.maximum_weight();
        let mut candidate = 1;
        while candidate <= max / factor {
            candidate *= factor;
        }
        while !self.enough_soft_above(candidate) && candidate > 1 {
            candidate = (candidate / factor).max(1);
        }
        self.comment(format!("CG new factor {candidate}"));
        self.work.set_maximum_weight(candidate);
    }
}
