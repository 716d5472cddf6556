//! Version string comparison.
//!
//! Versions are split into runs of digits and runs of letters; every other
//! character only separates runs. Runs are compared pairwise: a digit run
//! outranks a letter run, digit runs compare numerically and letter runs
//! lexically. When all shared runs are equal the version with more runs is
//! newer, so `1.2.1 > 1.2` and `1.2 > 1.b`.
//!
//! ```rust
//! use kumihimo::version::version_compare;
//!
//! assert!(version_compare("1.10.0", ">=1.9"));
//! assert!(version_compare("2.0rc1", "<2.0.1"));
//! assert!(!version_compare("1.0", "!=1.0"));
//! ```

use std::cmp::Ordering;
use std::fmt;

/// A parsed version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    text: String,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    // Digits with leading zeros removed.
    Number(String),
    Word(String),
}

impl Part {
    fn cmp_part(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Self::Word(a), Self::Word(b)) => a.cmp(b),
            (Self::Number(_), Self::Word(_)) => Ordering::Greater,
            (Self::Word(_), Self::Number(_)) => Ordering::Less,
        }
    }
}

impl Version {
    /// Split `text` into comparable runs.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut parts = Vec::new();
        let mut chars = text.chars().peekable();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                let mut run = String::new();
                while let Some(&d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                    run.push(d);
                    chars.next();
                }
                let trimmed = run.trim_start_matches('0');
                parts.push(Part::Number(trimmed.to_owned()));
            } else if c.is_ascii_alphabetic() {
                let mut run = String::new();
                while let Some(&a) = chars.peek().filter(|a| a.is_ascii_alphabetic()) {
                    run.push(a);
                    chars.next();
                }
                parts.push(Part::Word(run));
            } else {
                chars.next();
            }
        }
        Self {
            text: text.to_owned(),
            parts,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts
            .iter()
            .zip(&other.parts)
            .map(|(a, b)| a.cmp_part(b))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| self.parts.len().cmp(&other.parts.len()))
    }
}

/// Comparison operator prefixing a version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `!=`
    Ne,
    /// `==`, `=` or no operator.
    Eq,
    /// `>`
    Gt,
    /// `<`
    Lt,
}

impl Constraint {
    /// Split the leading operator from `constraint`.
    #[must_use]
    pub fn split(constraint: &str) -> (Self, &str) {
        const OPS: [(&str, Constraint); 7] = [
            (">=", Constraint::Ge),
            ("<=", Constraint::Le),
            ("!=", Constraint::Ne),
            ("==", Constraint::Eq),
            ("=", Constraint::Eq),
            (">", Constraint::Gt),
            ("<", Constraint::Lt),
        ];
        OPS.iter()
            .find_map(|(prefix, op)| constraint.strip_prefix(prefix).map(|rest| (*op, rest)))
            .unwrap_or((Self::Eq, constraint))
    }

    /// Whether `ordering` (ours compared to theirs) satisfies the operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Ge => !matches!(ordering, Ordering::Less),
            Self::Le => !matches!(ordering, Ordering::Greater),
            Self::Ne => !matches!(ordering, Ordering::Equal),
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::Lt => matches!(ordering, Ordering::Less),
        }
    }
}

/// Check `version` against a constraint such as `>=1.2`.
#[must_use]
pub fn version_compare(version: &str, constraint: &str) -> bool {
    let (op, wanted) = Constraint::split(constraint.trim());
    op.accepts(Version::parse(version).cmp(&Version::parse(wanted.trim())))
}

/// Check `version` against every constraint in `constraints`.
#[must_use]
pub fn satisfies_all<'a>(version: &str, constraints: impl IntoIterator<Item = &'a str>) -> bool {
    constraints
        .into_iter()
        .all(|constraint| version_compare(version, constraint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.2.3", "1.2.3", Ordering::Equal)]
    #[case("1.2.10", "1.2.9", Ordering::Greater)]
    #[case("1.2", "1.2.1", Ordering::Less)]
    #[case("1.0a", "1.0", Ordering::Greater)]
    #[case("1.b", "1.2", Ordering::Less)]
    #[case("1.010", "1.10", Ordering::Equal)]
    #[case("2.0.0", "10", Ordering::Less)]
    #[case("1.0-rc1", "1.0.rc1", Ordering::Equal)]
    #[case("99999999999999999999999", "1", Ordering::Greater)]
    fn orders_versions(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(Version::parse(a).cmp(&Version::parse(b)), expected);
    }

    #[rstest]
    #[case("1.5", ">=1.5", true)]
    #[case("1.5", ">1.5", false)]
    #[case("1.5", "<=1.4", false)]
    #[case("1.5", "<2", true)]
    #[case("1.5", "=1.5", true)]
    #[case("1.5", "1.5", true)]
    #[case("1.5", "!=1.5", false)]
    #[case("1.5", ">= 1.0", true)]
    fn applies_constraints(#[case] version: &str, #[case] constraint: &str, #[case] ok: bool) {
        assert_eq!(version_compare(version, constraint), ok);
    }

    #[test]
    fn all_constraints_must_hold() {
        assert!(satisfies_all("1.5", [">=1.0", "<2.0"]));
        assert!(!satisfies_all("2.5", [">=1.0", "<2.0"]));
    }
}
