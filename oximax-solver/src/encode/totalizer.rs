//! Totalizer encoding of cardinality constraints.
//!
//! A balanced merge tree counts how many input literals are true: output `j`
//! of a node is forced whenever at least `j + 1` of the node's inputs are
//! true. Bounding the count means forbidding the outputs past the bound, so
//! tightening the right-hand side later only takes fresh unit clauses.

use batsat::Lit;

use crate::formula::Weight;
use crate::oracle::SatOracle;

/// Totalizer over a fixed set of input literals.
pub struct Totalizer {
    outputs: Vec<Lit>,
    rhs: Weight,
}

impl Totalizer {
    /// Build the counting tree and enforce `sum lits <= rhs`.
    pub fn encode(oracle: &mut SatOracle, lits: &[Lit], rhs: Weight) -> Self {
        let outputs = build(oracle, lits);
        let mut encoding = Self {
            outputs,
            rhs: Weight::MAX,
        };
        encoding.update(oracle, rhs);
        encoding
    }

    /// Current right-hand side.
    pub fn rhs(&self) -> Weight {
        self.rhs
    }

    /// Tighten the bound to `rhs <= self.rhs()`.
    pub fn update(&mut self, oracle: &mut SatOracle, rhs: Weight) {
        debug_assert!(rhs <= self.rhs);
        let end = self.rhs.min(self.outputs.len() as Weight) as usize;
        let start = rhs.min(self.outputs.len() as Weight) as usize;
        for j in start..end {
            oracle.add_clause(&[!self.outputs[j]]);
        }
        self.rhs = rhs;
    }
}

fn build(oracle: &mut SatOracle, lits: &[Lit]) -> Vec<Lit> {
    match lits.len() {
        0 => Vec::new(),
        1 => vec![lits[0]],
        n => {
            let (left, right) = lits.split_at(n / 2);
            let left = build(oracle, left);
            let right = build(oracle, right);
            merge(oracle, &left, &right)
        }
    }
}

/// Merge two sorted count vectors; `out[k]` is forced when the children
/// together hold at least `k + 1` true inputs.
fn merge(oracle: &mut SatOracle, left: &[Lit], right: &[Lit]) -> Vec<Lit> {
    let out: Vec<Lit> = (0..left.len() + right.len())
        .map(|_| Lit::new(oracle.new_solver_var(), true))
        .collect();
    for (i, &a) in left.iter().enumerate() {
        oracle.add_clause(&[!a, out[i]]);
    }
    for (j, &b) in right.iter().enumerate() {
        oracle.add_clause(&[!b, out[j]]);
    }
    for (i, &a) in left.iter().enumerate() {
        for (j, &b) in right.iter().enumerate() {
            oracle.add_clause(&[!a, !b, out[i + j + 1]]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::lit_true_in;
    use crate::oracle::OracleResult;

    fn fresh_lits(oracle: &mut SatOracle, n: usize) -> Vec<Lit> {
        (0..n).map(|_| Lit::new(oracle.new_solver_var(), true)).collect()
    }

    #[test]
    fn bound_of_two_rejects_three() {
        let mut oracle = SatOracle::new();
        let xs = fresh_lits(&mut oracle, 4);
        let _tot = Totalizer::encode(&mut oracle, &xs, 2);

        assert_eq!(oracle.search(&[xs[0], xs[1]]), OracleResult::Sat);
        assert_eq!(oracle.search(&[xs[0], xs[1], xs[2]]), OracleResult::Unsat);
    }

    #[test]
    fn tightening_takes_effect() {
        let mut oracle = SatOracle::new();
        let xs = fresh_lits(&mut oracle, 4);
        let mut tot = Totalizer::encode(&mut oracle, &xs, 3);
        assert_eq!(oracle.search(&[xs[0], xs[1], xs[2]]), OracleResult::Sat);

        tot.update(&mut oracle, 1);
        assert_eq!(oracle.search(&[xs[0], xs[1]]), OracleResult::Unsat);
        assert_eq!(oracle.search(&[xs[3]]), OracleResult::Sat);
    }

    #[test]
    fn zero_bound_forces_all_inputs_false() {
        let mut oracle = SatOracle::new();
        let xs = fresh_lits(&mut oracle, 3);
        let _tot = Totalizer::encode(&mut oracle, &xs, 0);

        assert_eq!(oracle.search(&[]), OracleResult::Sat);
        for &x in &xs {
            assert!(!lit_true_in(oracle.model(), x));
        }
    }

    #[test]
    fn large_bound_adds_no_restriction() {
        let mut oracle = SatOracle::new();
        let xs = fresh_lits(&mut oracle, 3);
        let _tot = Totalizer::encode(&mut oracle, &xs, 10);
        assert_eq!(oracle.search(&xs), OracleResult::Sat);
    }
}
