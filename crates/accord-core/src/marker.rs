//! Environment marker expressions: parsing, evaluation, and boolean algebra.
//!
//! Markers are boolean conditions over environment attributes
//! (`python_version >= "2.7" and sys_platform == "win32"`). Combining
//! markers always builds new trees; operands are never mutated. Disjointness
//! is decided by normalizing each atomic predicate family to a constraint —
//! version-valued attributes reuse the version constraint algebra,
//! string-valued attributes use allow/deny sets — and checking pairwise
//! unsatisfiability of DNF clauses.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::constraint::VersionConstraint;
use crate::environment::Environment;
use crate::error::ParseError;
use crate::version::Version;

/// A marker attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerKey {
    ImplementationName,
    OsName,
    PlatformMachine,
    PlatformRelease,
    PlatformSystem,
    PlatformVersion,
    PythonFullVersion,
    PythonVersion,
    SysPlatform,
    /// Synthetic attribute naming an active extra.
    Extra,
}

impl MarkerKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkerKey::ImplementationName => "implementation_name",
            MarkerKey::OsName => "os_name",
            MarkerKey::PlatformMachine => "platform_machine",
            MarkerKey::PlatformRelease => "platform_release",
            MarkerKey::PlatformSystem => "platform_system",
            MarkerKey::PlatformVersion => "platform_version",
            MarkerKey::PythonFullVersion => "python_full_version",
            MarkerKey::PythonVersion => "python_version",
            MarkerKey::SysPlatform => "sys_platform",
            MarkerKey::Extra => "extra",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "implementation_name" => MarkerKey::ImplementationName,
            "os_name" => MarkerKey::OsName,
            "platform_machine" => MarkerKey::PlatformMachine,
            "platform_release" => MarkerKey::PlatformRelease,
            "platform_system" => MarkerKey::PlatformSystem,
            "platform_version" => MarkerKey::PlatformVersion,
            "python_full_version" => MarkerKey::PythonFullVersion,
            "python_version" => MarkerKey::PythonVersion,
            "sys_platform" => MarkerKey::SysPlatform,
            "extra" => MarkerKey::Extra,
            _ => return None,
        })
    }

    /// Attributes whose values order as versions rather than strings.
    fn is_version_valued(&self) -> bool {
        matches!(self, MarkerKey::PythonVersion | MarkerKey::PythonFullVersion)
    }
}

impl fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comparison operator inside an atomic predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MarkerOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    TildeEq,
    In,
    NotIn,
}

impl MarkerOp {
    fn as_str(&self) -> &'static str {
        match self {
            MarkerOp::Eq => "==",
            MarkerOp::NotEq => "!=",
            MarkerOp::Lt => "<",
            MarkerOp::Le => "<=",
            MarkerOp::Gt => ">",
            MarkerOp::Ge => ">=",
            MarkerOp::TildeEq => "~=",
            MarkerOp::In => "in",
            MarkerOp::NotIn => "not in",
        }
    }

    /// The operator for the same predicate with sides swapped
    /// (`"2.7" < python_version` becomes `python_version > "2.7"`).
    fn mirrored(&self) -> Option<Self> {
        Some(match self {
            MarkerOp::Eq => MarkerOp::Eq,
            MarkerOp::NotEq => MarkerOp::NotEq,
            MarkerOp::Lt => MarkerOp::Gt,
            MarkerOp::Le => MarkerOp::Ge,
            MarkerOp::Gt => MarkerOp::Lt,
            MarkerOp::Ge => MarkerOp::Le,
            MarkerOp::TildeEq | MarkerOp::In | MarkerOp::NotIn => return None,
        })
    }
}

/// An atomic predicate: attribute, operator, literal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerAtom {
    pub key: MarkerKey,
    pub op: MarkerOp,
    pub value: String,
}

impl MarkerAtom {
    /// The version constraint this predicate induces on a version-valued
    /// attribute (`in` lists become unions of wildcard equalities).
    fn version_constraint(&self) -> Option<VersionConstraint> {
        if !self.key.is_version_valued() {
            return None;
        }
        let parse_token = |token: &str| -> Option<VersionConstraint> {
            let text = if token.ends_with(".*") {
                token.to_string()
            } else {
                format!("{token}.*")
            };
            VersionConstraint::parse(&text).ok()
        };
        match self.op {
            MarkerOp::Eq => VersionConstraint::parse(&self.value).ok(),
            MarkerOp::NotEq => VersionConstraint::parse(&self.value)
                .ok()
                .map(|c| c.complement()),
            MarkerOp::Lt => VersionConstraint::parse(&format!("<{}", self.value)).ok(),
            MarkerOp::Le => VersionConstraint::parse(&format!("<={}", self.value)).ok(),
            MarkerOp::Gt => VersionConstraint::parse(&format!(">{}", self.value)).ok(),
            MarkerOp::Ge => VersionConstraint::parse(&format!(">={}", self.value)).ok(),
            MarkerOp::TildeEq => VersionConstraint::parse(&format!("~={}", self.value)).ok(),
            MarkerOp::In => {
                let mut union = VersionConstraint::empty();
                for token in self.value.split_whitespace() {
                    union = union.union(&parse_token(token)?);
                }
                Some(union)
            }
            MarkerOp::NotIn => {
                let mut union = VersionConstraint::empty();
                for token in self.value.split_whitespace() {
                    union = union.union(&parse_token(token)?);
                }
                Some(union.complement())
            }
        }
    }

    fn evaluate(&self, env: &Environment) -> bool {
        if self.key == MarkerKey::Extra {
            return match self.op {
                MarkerOp::Eq => env.extras.contains(&self.value),
                MarkerOp::NotEq => !env.extras.contains(&self.value),
                MarkerOp::In => self
                    .value
                    .split_whitespace()
                    .any(|token| env.extras.contains(token)),
                MarkerOp::NotIn => !self
                    .value
                    .split_whitespace()
                    .any(|token| env.extras.contains(token)),
                _ => false,
            };
        }

        let actual = env.value_of(self.key.as_str());
        if self.key.is_version_valued() {
            if let (Some(constraint), Ok(version)) =
                (self.version_constraint(), Version::parse(actual))
            {
                return constraint.allows_unrestricted(&version);
            }
        }
        match self.op {
            MarkerOp::Eq | MarkerOp::TildeEq => actual == self.value,
            MarkerOp::NotEq => actual != self.value,
            MarkerOp::Lt => actual < self.value.as_str(),
            MarkerOp::Le => actual <= self.value.as_str(),
            MarkerOp::Gt => actual > self.value.as_str(),
            MarkerOp::Ge => actual >= self.value.as_str(),
            MarkerOp::In => self.value.contains(actual),
            MarkerOp::NotIn => !self.value.contains(actual),
        }
    }

    fn negated(&self) -> Marker {
        let inverse = |op| MarkerAtom {
            key: self.key,
            op,
            value: self.value.clone(),
        };
        match self.op {
            MarkerOp::Eq => Marker::Atom(inverse(MarkerOp::NotEq)),
            MarkerOp::NotEq => Marker::Atom(inverse(MarkerOp::Eq)),
            MarkerOp::Lt => Marker::Atom(inverse(MarkerOp::Ge)),
            MarkerOp::Le => Marker::Atom(inverse(MarkerOp::Gt)),
            MarkerOp::Gt => Marker::Atom(inverse(MarkerOp::Le)),
            MarkerOp::Ge => Marker::Atom(inverse(MarkerOp::Lt)),
            MarkerOp::In => Marker::Atom(inverse(MarkerOp::NotIn)),
            MarkerOp::NotIn => Marker::Atom(inverse(MarkerOp::In)),
            // `~=` has no direct inverse operator; expand to its bounds.
            MarkerOp::TildeEq => match self.version_constraint() {
                Some(constraint) => {
                    let ranges = constraint.ranges();
                    let (Some(lower), Some(upper)) = (
                        ranges.first().and_then(|r| r.lower.as_ref()),
                        ranges.first().and_then(|r| r.upper.as_ref()),
                    ) else {
                        return Marker::False;
                    };
                    Marker::Atom(MarkerAtom {
                        key: self.key,
                        op: MarkerOp::Lt,
                        value: lower.version.to_string(),
                    })
                    .or(&Marker::Atom(MarkerAtom {
                        key: self.key,
                        op: MarkerOp::Ge,
                        value: upper.version.to_string(),
                    }))
                }
                None => Marker::Atom(inverse(MarkerOp::NotEq)),
            },
        }
    }
}

impl fmt::Display for MarkerAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} \"{}\"", self.key, self.op.as_str(), self.value)
    }
}

/// A boolean expression over atomic predicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Applies in every environment (the default marker).
    True,
    /// Applies in no environment.
    False,
    Atom(MarkerAtom),
    And(Vec<Marker>),
    Or(Vec<Marker>),
}

impl Default for Marker {
    fn default() -> Self {
        Marker::True
    }
}

impl Marker {
    pub fn atom(key: MarkerKey, op: MarkerOp, value: impl Into<String>) -> Marker {
        Marker::Atom(MarkerAtom {
            key,
            op,
            value: value.into(),
        })
    }

    /// The synthetic `extra == "<name>"` predicate.
    pub fn extra(name: impl Into<String>) -> Marker {
        Marker::atom(MarkerKey::Extra, MarkerOp::Eq, name)
    }

    /// Parse PEP-508-shaped marker text.
    pub fn parse(text: &str) -> Result<Marker, ParseError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            text,
            tokens,
            pos: 0,
        };
        let marker = parser.or_expr()?;
        if parser.pos < parser.tokens.len() {
            let (pos, _) = &parser.tokens[parser.pos];
            return Err(ParseError::new(text, *pos, "unexpected trailing tokens"));
        }
        Ok(marker)
    }

    /// Evaluate against a concrete environment snapshot. Pure.
    pub fn evaluate(&self, env: &Environment) -> bool {
        match self {
            Marker::True => true,
            Marker::False => false,
            Marker::Atom(atom) => atom.evaluate(env),
            Marker::And(children) => children.iter().all(|m| m.evaluate(env)),
            Marker::Or(children) => children.iter().any(|m| m.evaluate(env)),
        }
    }

    /// Conjunction. Builds a new tree; neither operand is mutated.
    pub fn and(&self, other: &Marker) -> Marker {
        match (self, other) {
            (Marker::False, _) | (_, Marker::False) => Marker::False,
            (Marker::True, m) | (m, Marker::True) => m.clone(),
            (a, b) => {
                let mut children = Vec::new();
                for m in [a, b] {
                    match m {
                        Marker::And(inner) => children.extend(inner.iter().cloned()),
                        other => children.push(other.clone()),
                    }
                }
                children.dedup();
                if children.len() == 1 {
                    children.pop().unwrap()
                } else {
                    Marker::And(children)
                }
            }
        }
    }

    /// Disjunction. Builds a new tree; neither operand is mutated.
    pub fn or(&self, other: &Marker) -> Marker {
        match (self, other) {
            (Marker::True, _) | (_, Marker::True) => Marker::True,
            (Marker::False, m) | (m, Marker::False) => m.clone(),
            (a, b) => {
                let mut children = Vec::new();
                for m in [a, b] {
                    match m {
                        Marker::Or(inner) => children.extend(inner.iter().cloned()),
                        other => children.push(other.clone()),
                    }
                }
                children.dedup();
                if children.len() == 1 {
                    children.pop().unwrap()
                } else {
                    Marker::Or(children)
                }
            }
        }
    }

    /// Negation, pushed into the tree by De Morgan's laws.
    pub fn negate(&self) -> Marker {
        match self {
            Marker::True => Marker::False,
            Marker::False => Marker::True,
            Marker::Atom(atom) => atom.negated(),
            Marker::And(children) => children
                .iter()
                .fold(Marker::False, |acc, m| acc.or(&m.negate())),
            Marker::Or(children) => children
                .iter()
                .fold(Marker::True, |acc, m| acc.and(&m.negate())),
        }
    }

    /// Collapse tautologies and contradictions where they are provable from
    /// the per-attribute constraint algebra.
    pub fn simplify(&self) -> Marker {
        match self {
            Marker::True | Marker::False | Marker::Atom(_) => {
                let m = self.clone();
                if m.is_contradiction() {
                    Marker::False
                } else {
                    m
                }
            }
            Marker::And(children) => {
                let folded = children
                    .iter()
                    .fold(Marker::True, |acc, m| acc.and(&m.simplify()));
                if folded.is_contradiction() {
                    Marker::False
                } else {
                    folded
                }
            }
            Marker::Or(children) => {
                let folded = children
                    .iter()
                    .fold(Marker::False, |acc, m| acc.or(&m.simplify()));
                if folded.is_tautology() {
                    Marker::True
                } else if folded.is_contradiction() {
                    Marker::False
                } else {
                    folded
                }
            }
        }
    }

    /// No environment satisfies this marker.
    pub fn is_contradiction(&self) -> bool {
        match self {
            Marker::True => false,
            Marker::False => true,
            _ => dnf(self).iter().all(|clause| clause_unsat(clause)),
        }
    }

    /// Every environment satisfies this marker.
    pub fn is_tautology(&self) -> bool {
        match self {
            Marker::True => true,
            Marker::False => false,
            _ => self.negate().is_contradiction(),
        }
    }

    /// No environment satisfies both markers.
    pub fn is_disjoint(&self, other: &Marker) -> bool {
        self.and(other).is_contradiction()
    }

    /// Partially evaluate `extra == "..."` predicates against a known set of
    /// requested extras, leaving the rest of the tree intact.
    pub fn resolve_extras(&self, extras: &BTreeSet<String>) -> Marker {
        match self {
            Marker::True | Marker::False => self.clone(),
            Marker::Atom(atom) if atom.key == MarkerKey::Extra => {
                let env = Environment {
                    extras: extras.clone(),
                    ..Environment::default()
                };
                if atom.evaluate(&env) {
                    Marker::True
                } else {
                    Marker::False
                }
            }
            Marker::Atom(_) => self.clone(),
            Marker::And(children) => children
                .iter()
                .fold(Marker::True, |acc, m| acc.and(&m.resolve_extras(extras))),
            Marker::Or(children) => children
                .iter()
                .fold(Marker::False, |acc, m| acc.or(&m.resolve_extras(extras))),
        }
    }
}

/// Disjunctive normal form: a list of conjunction clauses.
fn dnf(marker: &Marker) -> Vec<Vec<MarkerAtom>> {
    match marker {
        Marker::True => vec![Vec::new()],
        Marker::False => Vec::new(),
        Marker::Atom(atom) => vec![vec![atom.clone()]],
        Marker::Or(children) => children.iter().flat_map(dnf).collect(),
        Marker::And(children) => {
            let mut clauses: Vec<Vec<MarkerAtom>> = vec![Vec::new()];
            for child in children {
                let child_clauses = dnf(child);
                let mut next = Vec::with_capacity(clauses.len() * child_clauses.len());
                for clause in &clauses {
                    for child_clause in &child_clauses {
                        let mut combined = clause.clone();
                        combined.extend(child_clause.iter().cloned());
                        next.push(combined);
                    }
                }
                clauses = next;
            }
            clauses
        }
    }
}

/// Whether a single conjunction of atoms is unsatisfiable.
fn clause_unsat(clause: &[MarkerAtom]) -> bool {
    let keys: BTreeSet<MarkerKey> = clause.iter().map(|a| a.key).collect();
    for key in keys {
        let atoms: Vec<&MarkerAtom> = clause.iter().filter(|a| a.key == key).collect();
        if key.is_version_valued() {
            let mut constraint = VersionConstraint::any();
            let mut normalized_all = true;
            for atom in &atoms {
                match atom.version_constraint() {
                    Some(c) => constraint = constraint.intersect(&c),
                    None => normalized_all = false,
                }
            }
            if normalized_all && constraint.is_empty() {
                return true;
            }
        } else if key == MarkerKey::Extra {
            // Extras are set-valued: `extra == "a" and extra == "b"` can both
            // hold. Only direct require/forbid conflicts are contradictions.
            let required: BTreeSet<&str> = atoms
                .iter()
                .filter(|a| a.op == MarkerOp::Eq)
                .map(|a| a.value.as_str())
                .collect();
            let forbidden: BTreeSet<&str> = atoms
                .iter()
                .filter(|a| a.op == MarkerOp::NotEq)
                .map(|a| a.value.as_str())
                .collect();
            if required.intersection(&forbidden).next().is_some() {
                return true;
            }
        } else if string_clause_unsat(&atoms) {
            return true;
        }
    }
    false
}

/// Allow/deny-set contradiction check for string-valued attributes.
fn string_clause_unsat(atoms: &[&MarkerAtom]) -> bool {
    let mut allowed: Option<BTreeSet<String>> = None;
    let mut denied: BTreeSet<String> = BTreeSet::new();
    for atom in atoms {
        match atom.op {
            MarkerOp::Eq => {
                let single: BTreeSet<String> = [atom.value.clone()].into();
                allowed = Some(match allowed {
                    None => single,
                    Some(prev) => prev.intersection(&single).cloned().collect(),
                });
            }
            MarkerOp::In => {
                let tokens: BTreeSet<String> = atom
                    .value
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                allowed = Some(match allowed {
                    None => tokens,
                    Some(prev) => prev.intersection(&tokens).cloned().collect(),
                });
            }
            MarkerOp::NotEq => {
                denied.insert(atom.value.clone());
            }
            MarkerOp::NotIn => {
                denied.extend(atom.value.split_whitespace().map(str::to_string));
            }
            // Ordered string comparisons are too loose to prove anything.
            _ => {}
        }
    }
    match allowed {
        Some(set) => set.is_empty() || set.iter().all(|v| denied.contains(v)),
        None => false,
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::True => Ok(()),
            Marker::False => f.write_str("<empty>"),
            Marker::Atom(atom) => write!(f, "{atom}"),
            Marker::And(children) => {
                let mut first = true;
                for child in children {
                    if !first {
                        f.write_str(" and ")?;
                    }
                    first = false;
                    if matches!(child, Marker::Or(_)) {
                        write!(f, "({child})")?;
                    } else {
                        write!(f, "{child}")?;
                    }
                }
                Ok(())
            }
            Marker::Or(children) => {
                let mut first = true;
                for child in children {
                    if !first {
                        f.write_str(" or ")?;
                    }
                    first = false;
                    write!(f, "{child}")?;
                }
                Ok(())
            }
        }
    }
}

impl Serialize for Marker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl std::str::FromStr for Marker {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Op(MarkerOp),
    LParen,
    RParen,
    And,
    Or,
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }
        match c {
            '(' => {
                tokens.push((pos, Token::LParen));
                pos += 1;
            }
            ')' => {
                tokens.push((pos, Token::RParen));
                pos += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = pos + 1;
                let mut end = start;
                while end < bytes.len() && bytes[end] as char != quote {
                    end += 1;
                }
                if end == bytes.len() {
                    return Err(ParseError::new(text, pos, "unterminated string literal"));
                }
                tokens.push((pos, Token::Str(text[start..end].to_string())));
                pos = end + 1;
            }
            '<' | '>' | '=' | '!' | '~' => {
                let two = text.get(pos..pos + 2).unwrap_or("");
                let (op, len) = match two {
                    "==" => (MarkerOp::Eq, 2),
                    "!=" => (MarkerOp::NotEq, 2),
                    "<=" => (MarkerOp::Le, 2),
                    ">=" => (MarkerOp::Ge, 2),
                    "~=" => (MarkerOp::TildeEq, 2),
                    _ if c == '<' => (MarkerOp::Lt, 1),
                    _ if c == '>' => (MarkerOp::Gt, 1),
                    _ => return Err(ParseError::new(text, pos, format!("unknown operator `{c}`"))),
                };
                tokens.push((pos, Token::Op(op)));
                pos += len;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = pos;
                while pos < bytes.len() {
                    let c = bytes[pos] as char;
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        pos += 1;
                    } else {
                        break;
                    }
                }
                let word = &text[start..pos];
                match word {
                    "and" => tokens.push((start, Token::And)),
                    "or" => tokens.push((start, Token::Or)),
                    "in" => tokens.push((start, Token::Op(MarkerOp::In))),
                    "not" => {
                        // Only `not in` is a valid use of `not`.
                        let rest = text[pos..].trim_start();
                        let word_boundary = |after: &str| {
                            !after
                                .chars()
                                .next()
                                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
                        };
                        match rest.strip_prefix("in") {
                            Some(after) if word_boundary(after) => {
                                let consumed = text[pos..].len() - after.len();
                                tokens.push((start, Token::Op(MarkerOp::NotIn)));
                                pos += consumed;
                            }
                            _ => {
                                return Err(ParseError::new(text, start, "expected `in` after `not`"))
                            }
                        }
                    }
                    _ => tokens.push((start, Token::Ident(word.to_string()))),
                }
            }
            _ => {
                return Err(ParseError::new(
                    text,
                    pos,
                    format!("unexpected character `{c}`"),
                ))
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: &str) -> ParseError {
        let position = self
            .tokens
            .get(self.pos)
            .map(|(p, _)| *p)
            .unwrap_or(self.text.len());
        ParseError::new(self.text, position, message)
    }

    fn or_expr(&mut self) -> Result<Marker, ParseError> {
        let mut marker = self.and_expr()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.next();
            let rhs = self.and_expr()?;
            marker = marker.or(&rhs);
        }
        Ok(marker)
    }

    fn and_expr(&mut self) -> Result<Marker, ParseError> {
        let mut marker = self.primary()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.next();
            let rhs = self.primary()?;
            marker = marker.and(&rhs);
        }
        Ok(marker)
    }

    fn primary(&mut self) -> Result<Marker, ParseError> {
        if matches!(self.peek(), Some(Token::LParen)) {
            self.next();
            let inner = self.or_expr()?;
            match self.next() {
                Some((_, Token::RParen)) => Ok(inner),
                _ => Err(self.error_here("expected `)`")),
            }
        } else {
            self.atom()
        }
    }

    fn atom(&mut self) -> Result<Marker, ParseError> {
        let (lhs_pos, lhs) = self
            .next()
            .ok_or_else(|| self.error_here("expected a marker expression"))?;
        let op = match self.next() {
            Some((_, Token::Op(op))) => op,
            _ => return Err(self.error_here("expected a comparison operator")),
        };
        let (rhs_pos, rhs) = self
            .next()
            .ok_or_else(|| self.error_here("expected a right-hand operand"))?;

        match (lhs, rhs) {
            (Token::Ident(key), Token::Str(value)) => {
                let key = MarkerKey::from_str(&key).ok_or_else(|| {
                    ParseError::new(self.text, lhs_pos, format!("unknown marker attribute `{key}`"))
                })?;
                Ok(Marker::Atom(MarkerAtom { key, op, value }))
            }
            (Token::Str(value), Token::Ident(key)) => {
                let key = MarkerKey::from_str(&key).ok_or_else(|| {
                    ParseError::new(self.text, rhs_pos, format!("unknown marker attribute `{key}`"))
                })?;
                let op = op.mirrored().ok_or_else(|| {
                    ParseError::new(
                        self.text,
                        lhs_pos,
                        "this operator needs the attribute on the left",
                    )
                })?;
                Ok(Marker::Atom(MarkerAtom { key, op, value }))
            }
            _ => Err(ParseError::new(
                self.text,
                lhs_pos,
                "expected an attribute on one side and a quoted literal on the other",
            )),
        }
    }
}
