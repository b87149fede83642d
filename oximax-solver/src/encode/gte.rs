//! Generalized totalizer encoding of pseudo-Boolean constraints.
//!
//! Nodes carry the distinct subset sums reachable from their inputs, one
//! output literal per sum: the output for value `v` is forced whenever the
//! true inputs below the node weigh at least `v`. Sums beyond the build-time
//! bound collapse into a single saturated value, which keeps the value sets
//! small while leaving every value at or below the bound observable for
//! later tightening.

use std::collections::{BTreeMap, BTreeSet};

use batsat::Lit;

use crate::formula::Weight;
use crate::oracle::SatOracle;

/// Generalized totalizer over weighted input literals.
pub struct Gte {
    outputs: BTreeMap<Weight, Lit>,
    rhs: Weight,
    cap: Weight,
}

impl Gte {
    /// Build the tree for `sum coeffs[i] * lits[i] <= rhs`.
    ///
    /// With `assumption_mode` false the bound is enforced with permanent
    /// unit clauses and can only be tightened. With it true no permanent
    /// units are added at all: the bound (this one included) must be
    /// expressed through [`Gte::update_assumptions`], which keeps stale
    /// trees from a coarser resolution from constraining anything once
    /// their assumptions are gone.
    pub fn encode(
        oracle: &mut SatOracle,
        lits: &[Lit],
        coeffs: &[Weight],
        rhs: Weight,
        assumption_mode: bool,
    ) -> Self {
        debug_assert_eq!(lits.len(), coeffs.len());
        let cap = rhs.saturating_add(1);
        let items: Vec<(Lit, Weight)> = lits
            .iter()
            .zip(coeffs)
            .filter(|(_, &w)| w > 0)
            .map(|(&l, &w)| (l, w.min(cap)))
            .collect();
        let outputs = build(oracle, &items, cap);
        if !assumption_mode {
            for (_, &lit) in outputs.range(rhs.saturating_add(1)..) {
                oracle.add_clause(&[!lit]);
            }
        }
        Self { outputs, rhs, cap }
    }

    /// Current right-hand side.
    pub fn rhs(&self) -> Weight {
        self.rhs
    }

    /// Saturation value of the tree (one past the build-time bound).
    pub fn cap(&self) -> Weight {
        self.cap
    }

    /// Tighten the bound to `rhs <= self.rhs()` with permanent units.
    pub fn update(&mut self, oracle: &mut SatOracle, rhs: Weight) {
        debug_assert!(rhs <= self.rhs);
        if rhs >= self.rhs {
            self.rhs = rhs;
            return;
        }
        for (_, &lit) in self.outputs.range(rhs + 1..=self.rhs) {
            oracle.add_clause(&[!lit]);
        }
        self.rhs = rhs;
    }

    /// Push the negated outputs above `rhs` onto `assumptions`, bounding the
    /// sum for the next oracle call only.
    pub fn update_assumptions(&self, assumptions: &mut Vec<Lit>, rhs: Weight) {
        for (_, &lit) in self.outputs.range(rhs.saturating_add(1)..) {
            assumptions.push(!lit);
        }
    }
}

fn build(
    oracle: &mut SatOracle,
    items: &[(Lit, Weight)],
    cap: Weight,
) -> BTreeMap<Weight, Lit> {
    match items.len() {
        0 => BTreeMap::new(),
        1 => {
            let mut node = BTreeMap::new();
            node.insert(items[0].1, items[0].0);
            node
        }
        n => {
            let (left, right) = items.split_at(n / 2);
            let left = build(oracle, left, cap);
            let right = build(oracle, right, cap);
            merge(oracle, &left, &right, cap)
        }
    }
}

fn merge(
    oracle: &mut SatOracle,
    left: &BTreeMap<Weight, Lit>,
    right: &BTreeMap<Weight, Lit>,
    cap: Weight,
) -> BTreeMap<Weight, Lit> {
    let mut values: BTreeSet<Weight> = BTreeSet::new();
    values.extend(left.keys().copied());
    values.extend(right.keys().copied());
    for &u in left.keys() {
        for &v in right.keys() {
            values.insert(u.saturating_add(v).min(cap));
        }
    }

    let mut out = BTreeMap::new();
    for value in values {
        out.insert(value, Lit::new(oracle.new_solver_var(), true));
    }
    for (&u, &a) in left {
        oracle.add_clause(&[!a, out[&u]]);
    }
    for (&v, &b) in right {
        oracle.add_clause(&[!b, out[&v]]);
    }
    for (&u, &a) in left {
        for (&v, &b) in right {
            let sum = u.saturating_add(v).min(cap);
            oracle.add_clause(&[!a, !b, out[&sum]]);
        }
    }
    out
}
