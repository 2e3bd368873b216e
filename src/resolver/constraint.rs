//! Declared constraint handling
//!
//! A constraint is floating when it does not pin one exact version:
//! empty, a pure wildcard, a comparator/range expression (`>=`, `<`, `~`,
//! `^`, bracketed ranges), wildcard segments (`5.*`, `1.x`) or any compound
//! of several clauses. Floating packages are never updated automatically.

use super::version::{ParsedVersion, VersionScheme};
use crate::error::ResolveError;
use std::cmp::Ordering;

const FLOATING_PREFIXES: [&str; 7] = [">", "<", "~", "^", "[", "(", "!="];
const WILDCARD_TOKENS: [&str; 3] = ["*", "x", "X"];

/// Returns true if the constraint does not pin exactly one version
pub fn is_floating(constraint: &str) -> bool {
    let c = constraint.trim();
    if c.is_empty() || WILDCARD_TOKENS.contains(&c) || c.eq_ignore_ascii_case("latest") {
        return true;
    }
    if FLOATING_PREFIXES.iter().any(|p| c.starts_with(p)) {
        return true;
    }
    if c.contains('|') || c.contains(',') || c.split_whitespace().count() > 1 {
        return true;
    }
    let operand = c.trim_start_matches('=').trim();
    operand.is_empty()
        || operand.ends_with('*')
        || operand
            .split('.')
            .any(|segment| WILDCARD_TOKENS.contains(&segment))
}

/// Floating check that honors per-rule exceptions
pub fn is_floating_with(constraint: &str, exceptions: &[String]) -> bool {
    let c = constraint.trim();
    if exceptions.iter().any(|e| e.trim() == c) {
        return false;
    }
    is_floating(c)
}

/// Comparison operator of a single clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Matches everything
    Any,
    /// `1.2.3`, `=1.2.3`, `==1.2.3`
    Exact,
    /// `^1.2.3`: same major, not lower
    Caret,
    /// `~1.2.3`, `~=1.2.3`: same major.minor, not lower
    Tilde,
    /// `>=`
    GreaterEq,
    /// `>`
    Greater,
    /// `<=`
    LessEq,
    /// `<`
    Less,
    /// `!=`
    NotEqual,
    /// `5.*`, `1.2.x`: numeric prefix match
    Wildcard,
}

/// One `op version` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    /// Operator
    pub op: Op,
    /// Operand (for wildcards, the numeric prefix)
    pub version: String,
}

impl Clause {
    fn new(op: Op, version: impl Into<String>) -> Self {
        Self {
            op,
            version: version.into(),
        }
    }
}

/// Parsed declared constraint: alternatives (`||`) of clause conjunctions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    raw: String,
    alternatives: Vec<Vec<Clause>>,
}

impl Constraint {
    /// Constraint matching every version
    pub fn any() -> Self {
        Self {
            raw: String::new(),
            alternatives: vec![vec![Clause::new(Op::Any, "")]],
        }
    }

    /// Parse a declared constraint
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || WILDCARD_TOKENS.contains(&trimmed)
            || trimmed.eq_ignore_ascii_case("latest")
        {
            return Ok(Self {
                raw: trimmed.to_string(),
                ..Self::any()
            });
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let alternative = alternative.trim();
            if alternative.is_empty() {
                return Err(ResolveError::constraint(raw, "empty alternative"));
            }
            let clauses = if alternative.starts_with('[') || alternative.starts_with('(') {
                parse_bracket_range(raw, alternative)?
            } else {
                parse_clauses(raw, alternative)?
            };
            alternatives.push(clauses);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            alternatives,
        })
    }

    /// Raw constraint text
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The pinned operand when the constraint is a single exact clause
    pub fn exact_pin(&self) -> Option<&str> {
        match self.alternatives.as_slice() {
            [clauses] => match clauses.as_slice() {
                [Clause {
                    op: Op::Exact,
                    version,
                }] => Some(version),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns true if the constraint matches everything
    pub fn is_any(&self) -> bool {
        self.alternatives
            .iter()
            .any(|clauses| clauses.iter().all(|c| c.op == Op::Any))
    }

    /// Returns true if `candidate` satisfies the constraint
    pub fn matches(&self, candidate: &ParsedVersion, scheme: &VersionScheme) -> bool {
        self.alternatives.iter().any(|clauses| {
            clauses
                .iter()
                .all(|clause| clause_matches(clause, candidate, scheme))
        })
    }
}

fn clause_matches(clause: &Clause, candidate: &ParsedVersion, scheme: &VersionScheme) -> bool {
    if clause.op == Op::Any {
        return true;
    }
    if clause.op == Op::Wildcard {
        return wildcard_matches(&clause.version, candidate);
    }
    let Some(operand) = scheme.parse(&clause.version) else {
        return false;
    };
    let ordering = scheme.compare(candidate, &operand);
    match clause.op {
        Op::Exact => ordering == Ordering::Equal,
        Op::NotEqual => ordering != Ordering::Equal,
        Op::GreaterEq => ordering != Ordering::Less,
        Op::Greater => ordering == Ordering::Greater,
        Op::LessEq => ordering != Ordering::Greater,
        Op::Less => ordering == Ordering::Less,
        Op::Caret => ordering != Ordering::Less && candidate.major() == operand.major(),
        Op::Tilde => {
            ordering != Ordering::Less
                && candidate.major_minor().is_some()
                && candidate.major_minor() == operand.major_minor()
        }
        Op::Any | Op::Wildcard => true,
    }
}

fn wildcard_matches(prefix: &str, candidate: &ParsedVersion) -> bool {
    let Some((major, minor, _)) = candidate.parts else {
        return false;
    };
    let segments: Vec<u64> = prefix
        .split('.')
        .filter_map(|s| s.trim_start_matches(['v', 'V']).parse().ok())
        .collect();
    match segments.as_slice() {
        [] => true,
        [m] => major == *m,
        [m, n, ..] => major == *m && minor == *n,
    }
}

fn parse_clauses(raw: &str, text: &str) -> Result<Vec<Clause>, ResolveError> {
    let tokens: Vec<&str> = text
        .split([',', ' ', '\t'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    // "1.0 - 2.0" hyphen range
    if let [low, "-", high] = tokens.as_slice() {
        return Ok(vec![
            Clause::new(Op::GreaterEq, *low),
            Clause::new(Op::LessEq, *high),
        ]);
    }

    let mut clauses = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        let token_owned;
        let token = match pending_op.take() {
            Some(op) => {
                token_owned = format!("{}{}", op, token);
                token_owned.as_str()
            }
            None => token,
        };
        if is_bare_operator(token) {
            pending_op = Some(token_static(token));
            continue;
        }
        clauses.push(parse_clause(raw, token)?);
    }
    if pending_op.is_some() {
        return Err(ResolveError::constraint(raw, "operator without version"));
    }
    if clauses.is_empty() {
        return Err(ResolveError::constraint(raw, "no clauses"));
    }
    Ok(clauses)
}

const OPERATORS: [(&str, Op); 10] = [
    (">=", Op::GreaterEq),
    ("<=", Op::LessEq),
    ("==", Op::Exact),
    ("~=", Op::Tilde),
    ("!=", Op::NotEqual),
    (">", Op::Greater),
    ("<", Op::Less),
    ("=", Op::Exact),
    ("^", Op::Caret),
    ("~", Op::Tilde),
];

fn is_bare_operator(token: &str) -> bool {
    OPERATORS.iter().any(|(op, _)| *op == token)
}

fn token_static(token: &str) -> &'static str {
    OPERATORS
        .iter()
        .find(|(op, _)| *op == token)
        .map(|(op, _)| *op)
        .unwrap_or("=")
}

fn parse_clause(raw: &str, token: &str) -> Result<Clause, ResolveError> {
    let (op, operand) = OPERATORS
        .iter()
        .find_map(|(prefix, op)| token.strip_prefix(prefix).map(|rest| (*op, rest.trim())))
        .unwrap_or((Op::Exact, token));

    if operand.is_empty() {
        return Err(ResolveError::constraint(raw, "operator without version"));
    }
    if WILDCARD_TOKENS.contains(&operand) {
        return Ok(Clause::new(Op::Any, ""));
    }
    let segments: Vec<&str> = operand.split('.').collect();
    if let Some(idx) = segments
        .iter()
        .position(|s| WILDCARD_TOKENS.contains(s) || s.ends_with('*'))
    {
        let mut prefix: Vec<&str> = segments[..idx].to_vec();
        let partial = segments[idx].trim_end_matches('*');
        if !partial.is_empty() && !WILDCARD_TOKENS.contains(&partial) {
            prefix.push(partial);
        }
        return Ok(Clause::new(Op::Wildcard, prefix.join(".")));
    }
    Ok(Clause::new(op, operand))
}

/// `[1.0,2.0)`, `(,1.5]`, `[1.2]` style ranges
fn parse_bracket_range(raw: &str, text: &str) -> Result<Vec<Clause>, ResolveError> {
    let lower_inclusive = text.starts_with('[');
    let upper_inclusive = text.ends_with(']');
    if !(text.ends_with(']') || text.ends_with(')')) || text.len() < 2 {
        return Err(ResolveError::constraint(raw, "unterminated range"));
    }
    let inner = &text[1..text.len() - 1];

    let Some((low, high)) = inner.split_once(',') else {
        let exact = inner.trim();
        if exact.is_empty() {
            return Err(ResolveError::constraint(raw, "empty range"));
        }
        return Ok(vec![Clause::new(Op::Exact, exact)]);
    };

    let mut clauses = Vec::new();
    let (low, high) = (low.trim(), high.trim());
    if !low.is_empty() {
        let op = if lower_inclusive { Op::GreaterEq } else { Op::Greater };
        clauses.push(Clause::new(op, low));
    }
    if !high.is_empty() {
        let op = if upper_inclusive { Op::LessEq } else { Op::Less };
        clauses.push(Clause::new(op, high));
    }
    if clauses.is_empty() {
        clauses.push(Clause::new(Op::Any, ""));
    }
    Ok(clauses)
}
