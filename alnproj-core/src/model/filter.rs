//! Feature filter expressions

use std::fmt;
use std::str::FromStr;

use crate::error::ArchiveError;

/// Comparison applied by one match condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Contains,
    NotContains,
    Matches,
    NotMatches,
    Present,
    NotPresent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Condition {
    /// Name written to documents; never localised.
    pub fn stable_name(self) -> &'static str {
        match self {
            Condition::Contains => "Contains",
            Condition::NotContains => "NotContains",
            Condition::Matches => "Matches",
            Condition::NotMatches => "NotMatches",
            Condition::Present => "Present",
            Condition::NotPresent => "NotPresent",
            Condition::Eq => "EQ",
            Condition::Ne => "NE",
            Condition::Lt => "LT",
            Condition::Le => "LE",
            Condition::Gt => "GT",
            Condition::Ge => "GE",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Condition::Eq | Condition::Ne | Condition::Lt | Condition::Le | Condition::Gt | Condition::Ge
        )
    }
}

impl FromStr for Condition {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [Condition; 12] = [
            Condition::Contains,
            Condition::NotContains,
            Condition::Matches,
            Condition::NotMatches,
            Condition::Present,
            Condition::NotPresent,
            Condition::Eq,
            Condition::Ne,
            Condition::Lt,
            Condition::Le,
            Condition::Gt,
            Condition::Ge,
        ];
        ALL.iter()
            .copied()
            .find(|c| c.stable_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ArchiveError::unknown("filter condition", s))
    }
}

/// What a match condition is tested against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterBy {
    Label,
    Score,
    /// Attribute name, optionally followed by a sub-attribute name.
    Attribute(Vec<String>),
}

/// One leaf condition of a feature filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureMatcher {
    pub by: FilterBy,
    pub condition: Condition,
    pub pattern: String,
}

impl FeatureMatcher {
    pub fn by_label(condition: Condition, pattern: impl Into<String>) -> Self {
        Self {
            by: FilterBy::Label,
            condition,
            pattern: pattern.into(),
        }
    }

    pub fn by_score(condition: Condition, pattern: impl Into<String>) -> Self {
        Self {
            by: FilterBy::Score,
            condition,
            pattern: pattern.into(),
        }
    }

    pub fn by_attribute(condition: Condition, pattern: impl Into<String>, names: &[&str]) -> Self {
        Self {
            by: FilterBy::Attribute(names.iter().map(|n| n.to_string()).collect()),
            condition,
            pattern: pattern.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conjunction {
    And,
    Or,
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Conjunction::And => write!(f, "AND"),
            Conjunction::Or => write!(f, "OR"),
        }
    }
}

/// Flat list of conditions joined by a single conjunction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureMatcherSet {
    matchers: Vec<FeatureMatcher>,
    conjunction: Option<Conjunction>,
}

impl FeatureMatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(&mut self, matcher: FeatureMatcher) -> Result<(), ArchiveError> {
        self.push(Conjunction::And, matcher)
    }

    pub fn or(&mut self, matcher: FeatureMatcher) -> Result<(), ArchiveError> {
        self.push(Conjunction::Or, matcher)
    }

    fn push(&mut self, conjunction: Conjunction, matcher: FeatureMatcher) -> Result<(), ArchiveError> {
        if self.matchers.len() > 1 {
            if let Some(existing) = self.conjunction {
                if existing != conjunction {
                    return Err(ArchiveError::MixedConjunction(format!(
                        "cannot {} to a set already joined by {}",
                        conjunction, existing
                    )));
                }
            }
        }
        if !self.matchers.is_empty() {
            self.conjunction = Some(conjunction);
        }
        self.matchers.push(matcher);
        Ok(())
    }

    pub fn matchers(&self) -> &[FeatureMatcher] {
        &self.matchers
    }

    /// `true` when conditions are AND-ed (also for zero or one condition).
    pub fn is_anded(&self) -> bool {
        self.conjunction != Some(Conjunction::Or)
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
