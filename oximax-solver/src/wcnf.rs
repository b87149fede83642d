//! WCNF reader.
//!
//! Accepts both the classic format with a `p wcnf <vars> <clauses> [top]`
//! header (clauses prefixed by a weight, weight >= top marking hard clauses)
//! and the 2022 MaxSAT-evaluation format without a header, where hard clauses
//! are prefixed by `h` and soft clauses by their integer weight. Comment
//! lines start with `c`; every clause line ends with a `0` terminator.

use std::io::BufRead;

use thiserror::Error;

use crate::formula::{mk_lit, Formula, Weight};

/// Parse failures with the offending line number.
#[derive(Error, Debug)]
pub enum WcnfError {
    /// Underlying reader failure.
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed content.
    #[error("parse error at line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
}

fn parse_error(line: usize, message: impl Into<String>) -> WcnfError {
    WcnfError::Parse {
        line,
        message: message.into(),
    }
}

fn parse_lit(token: &str, line: usize) -> Result<i64, WcnfError> {
    token
        .parse::<i64>()
        .map_err(|_| parse_error(line, format!("invalid literal `{token}`")))
}

/// Read literals from `tokens`, checking the trailing `0` terminator.
fn read_clause(tokens: &[&str], line: usize) -> Result<Vec<batsat::Lit>, WcnfError> {
    let mut clause = Vec::with_capacity(tokens.len().saturating_sub(1));
    let mut terminated = false;
    for token in tokens {
        let parsed = parse_lit(token, line)?;
        if parsed == 0 {
            terminated = true;
            break;
        }
        let var = parsed.unsigned_abs() - 1;
        if var > u32::MAX as u64 {
            return Err(parse_error(line, format!("variable {parsed} out of range")));
        }
        clause.push(mk_lit(var as u32, parsed > 0));
    }
    if !terminated {
        return Err(parse_error(line, "clause not terminated by 0"));
    }
    Ok(clause)
}

/// Parse a WCNF instance into a [`Formula`].
pub fn parse_wcnf(reader: impl BufRead) -> Result<Formula, WcnfError> {
    let mut formula = Formula::new();
    let mut top: Option<Weight> = None;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('c') {
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('p') {
            let fields: Vec<&str> = header.split_whitespace().collect();
            if fields.first() != Some(&"wcnf") || fields.len() < 3 || fields.len() > 4 {
                return Err(parse_error(line_no, "expected `p wcnf <vars> <clauses> [top]`"));
            }
            if let Some(t) = fields.get(3) {
                let t = t
                    .parse::<Weight>()
                    .map_err(|_| parse_error(line_no, format!("invalid top weight `{t}`")))?;
                top = Some(t);
            } else {
                // Headers without a top weight describe purely soft instances.
                top = Some(Weight::MAX);
            }
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }

        if tokens[0] == "h" {
            // 2022 format hard clause.
            formula.add_hard(read_clause(&tokens[1..], line_no)?);
        } else if top.is_some() {
            let weight = tokens[0].parse::<Weight>().map_err(|_| {
                parse_error(line_no, format!("invalid clause weight `{}`", tokens[0]))
            })?;
            let clause = read_clause(&tokens[1..], line_no)?;
            if weight >= top.unwrap_or(Weight::MAX) {
                formula.add_hard(clause);
            } else {
                formula.add_soft(weight, clause);
            }
        } else {
            // 2022 format soft clause.
            let weight = tokens[0].parse::<Weight>().map_err(|_| {
                parse_error(line_no, format!("invalid clause weight `{}`", tokens[0]))
            })?;
            formula.add_soft(weight, read_clause(&tokens[1..], line_no)?);
        }
    }

    Ok(formula)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::ProblemType;
    use std::io::Cursor;

    #[test]
    fn parses_classic_format() {
        let input = "\
c a small weighted instance
p wcnf 2 3 6
6 1 2 0
3 -1 0
5 -2 0
";
        let formula = parse_wcnf(Cursor::new(input)).unwrap();
        assert_eq!(formula.num_vars(), 2);
        assert_eq!(formula.n_hard(), 1);
        assert_eq!(formula.n_soft(), 2);
        assert_eq!(formula.sum_weights(), 8);
        assert_eq!(formula.problem_type(), ProblemType::Weighted);
    }

    #[test]
    fn parses_2022_format() {
        let input = "\
c new-style instance
h 1 2 0
3 -1 0
5 -2 0
";
        let formula = parse_wcnf(Cursor::new(input)).unwrap();
        assert_eq!(formula.n_hard(), 1);
        assert_eq!(formula.n_soft(), 2);
        assert_eq!(formula.sum_weights(), 8);
    }

    #[test]
    fn classic_weight_at_top_is_hard() {
        let input = "p wcnf 1 2 10\n10 1 0\n1 -1 0\n";
        let formula = parse_wcnf(Cursor::new(input)).unwrap();
        assert_eq!(formula.n_hard(), 1);
        assert_eq!(formula.n_soft(), 1);
    }

    #[test]
    fn missing_terminator_is_an_error() {
        let err = parse_wcnf(Cursor::new("h 1 2\n")).unwrap_err();
        assert!(matches!(err, WcnfError::Parse { line: 1, .. }));
    }

    #[test]
    fn bad_weight_is_an_error() {
        let err = parse_wcnf(Cursor::new("x 1 0\n")).unwrap_err();
        assert!(matches!(err, WcnfError::Parse { .. }));
    }

    #[test]
    fn unit_weights_classify_as_unweighted() {
        let input = "h 1 2 0\n1 -1 0\n1 -2 0\n";
        let formula = parse_wcnf(Cursor::new(input)).unwrap();
        assert_eq!(formula.problem_type(), ProblemType::Unweighted);
    }
}
