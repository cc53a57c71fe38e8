//! Feature filter encoding
//!
//! A flat list of conditions joined by one conjunction is written as a
//! right-leaning binary tree: each compound node holds the first condition
//! and a node for the rest.

use crate::document::{CompoundMatcherDoc, FilterNodeDoc, MatchConditionDoc};
use crate::error::{ArchiveError, ArchiveResult};
use crate::model::{Condition, FeatureMatcher, FeatureMatcherSet, FilterBy};

const BY_LABEL: &str = "byLabel";
const BY_SCORE: &str = "byScore";
const BY_ATTRIBUTE: &str = "byAttribute";

pub fn encode_filter(set: &FeatureMatcherSet) -> Option<FilterNodeDoc> {
    let (first, rest) = set.matchers().split_first()?;
    Some(marshal(first, rest, set.is_anded()))
}

fn marshal(first: &FeatureMatcher, rest: &[FeatureMatcher], and: bool) -> FilterNodeDoc {
    match rest.split_first() {
        None => FilterNodeDoc {
            condition: Some(encode_condition(first)),
            compound: None,
        },
        Some((next, remaining)) => FilterNodeDoc {
            condition: None,
            compound: Some(Box::new(CompoundMatcherDoc {
                and,
                branches: vec![marshal(first, &[], and), marshal(next, remaining, and)],
            })),
        },
    }
}

fn encode_condition(matcher: &FeatureMatcher) -> MatchConditionDoc {
    let (by, attribute_names) = match &matcher.by {
        FilterBy::Label => (BY_LABEL, Vec::new()),
        FilterBy::Score => (BY_SCORE, Vec::new()),
        FilterBy::Attribute(names) => (BY_ATTRIBUTE, names.iter().take(2).cloned().collect()),
    };
    MatchConditionDoc {
        by: by.to_string(),
        condition: matcher.condition.stable_name().to_string(),
        value: matcher.pattern.clone(),
        attribute_names,
    }
}

/// Rebuilds a filter, rejecting expressions that mix AND and OR.
pub fn decode_filter(node: &FilterNodeDoc) -> ArchiveResult<FeatureMatcherSet> {
    let mut set = FeatureMatcherSet::new();
    parse_node(&mut set, node, true, None)?;
    Ok(set)
}

fn parse_node(set: &mut FeatureMatcherSet, node: &FilterNodeDoc, and: bool, enclosing: Option<bool>) -> ArchiveResult<()> {
    if let Some(condition) = &node.condition {
        let matcher = decode_condition(condition)?;
        return if and { set.and(matcher) } else { set.or(matcher) };
    }
    let Some(compound) = &node.compound else {
        return Err(ArchiveError::document("matcherSet", "filter node has neither condition nor compound"));
    };
    if let Some(outer) = enclosing {
        if outer != compound.and {
            return Err(ArchiveError::MixedConjunction(format!(
                "{} nested inside {}",
                if compound.and { "AND" } else { "OR" },
                if outer { "AND" } else { "OR" }
            )));
        }
    }
    if compound.branches.len() != 2 {
        return Err(ArchiveError::document(
            "matcherSet",
            format!("compound filter has {} branches, expected 2", compound.branches.len()),
        ));
    }
    for branch in &compound.branches {
        parse_node(set, branch, compound.and, Some(compound.and))?;
    }
    Ok(())
}

fn decode_condition(doc: &MatchConditionDoc) -> ArchiveResult<FeatureMatcher> {
    let condition: Condition = doc.condition.parse()?;
    let by = match doc.by.as_str() {
        BY_LABEL => FilterBy::Label,
        BY_SCORE => FilterBy::Score,
        BY_ATTRIBUTE => FilterBy::Attribute(doc.attribute_names.clone()),
        other => return Err(ArchiveError::unknown("filter target", other)),
    };
    Ok(FeatureMatcher {
        by,
        condition,
        pattern: doc.value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(matcher: FeatureMatcher) -> FilterNodeDoc {
        FilterNodeDoc {
            condition: Some(encode_condition(&matcher)),
            compound: None,
        }
    }

    fn compound(and: bool, a: FilterNodeDoc, b: FilterNodeDoc) -> FilterNodeDoc {
        FilterNodeDoc {
            condition: None,
            compound: Some(Box::new(CompoundMatcherDoc {
                and,
                branches: vec![a, b],
            })),
        }
    }

    #[test]
    fn test_three_or_conditions_nest_to_the_right() {
        let mut set = FeatureMatcherSet::new();
        set.or(FeatureMatcher::by_label(Condition::Contains, "kinase")).unwrap();
        set.or(FeatureMatcher::by_score(Condition::Gt, "1.5")).unwrap();
        set.or(FeatureMatcher::by_attribute(Condition::Eq, "benign", &["CSQ", "clin_sig"])).unwrap();

        let node = encode_filter(&set).unwrap();
        let top = node.compound.as_ref().unwrap();
        assert!(!top.and);
        assert!(top.branches[0].condition.is_some());
        assert!(top.branches[1].compound.is_some());

        assert_eq!(decode_filter(&node).unwrap(), set);
    }

    #[test]
    fn test_single_condition_is_a_leaf() {
        let mut set = FeatureMatcherSet::new();
        set.and(FeatureMatcher::by_label(Condition::NotContains, "x")).unwrap();
        let node = encode_filter(&set).unwrap();
        assert!(node.compound.is_none());
        assert_eq!(decode_filter(&node).unwrap(), set);
        assert!(encode_filter(&FeatureMatcherSet::new()).is_none());
    }

    #[test]
    fn test_mixed_and_or_is_an_error() {
        let node = compound(
            false,
            leaf(FeatureMatcher::by_label(Condition::Contains, "a")),
            compound(
                true,
                leaf(FeatureMatcher::by_score(Condition::Gt, "1")),
                leaf(FeatureMatcher::by_score(Condition::Lt, "5")),
            ),
        );
        let err = decode_filter(&node).unwrap_err();
        assert!(matches!(err, ArchiveError::MixedConjunction(_)));
    }

    #[test]
    fn test_unknown_condition_is_reported() {
        let mut node = leaf(FeatureMatcher::by_label(Condition::Contains, "a"));
        node.condition.as_mut().unwrap().condition = "Resembles".into();
        assert!(decode_filter(&node).is_err());
    }
}
