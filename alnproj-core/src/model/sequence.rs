//! Sequences, their features and cross references

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{AnnotationId, MappingId, SeqId};

/// Characters treated as alignment gaps.
pub const GAP_CHARS: &[char] = &['-', '.', ' '];

pub fn is_gap(c: char) -> bool {
    GAP_CHARS.contains(&c)
}

/// Residues with every gap character removed.
pub fn ungapped(residues: &str) -> String {
    residues.chars().filter(|c| !is_gap(*c)).collect()
}

/// An aligned or dataset sequence.
///
/// A sequence without `dataset_sequence` is itself a dataset sequence.
/// Features, database references and structure entries live on the
/// dataset sequence; aligned sequences reach them through
/// [`Workspace::dataset_root`](super::Workspace::dataset_root).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    pub name: String,
    pub residues: String,
    pub start: i32,
    pub end: i32,
    pub description: Option<String>,
    pub dataset_sequence: Option<SeqId>,
    pub features: Vec<SequenceFeature>,
    pub dbrefs: Vec<DbRef>,
    pub structures: Vec<StructureEntry>,
    pub annotations: Vec<AnnotationId>,
}

impl Sequence {
    /// Sequence spanning `1..=ungapped length`.
    pub fn new(name: impl Into<String>, residues: impl Into<String>) -> Self {
        let residues = residues.into();
        let end = ungapped(&residues).chars().count() as i32;
        Self {
            name: name.into(),
            residues,
            start: 1,
            end,
            ..Default::default()
        }
    }

    pub fn with_range(mut self, start: i32, end: i32) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_dataset_sequence(&self) -> bool {
        self.dataset_sequence.is_none()
    }

    pub fn ungapped(&self) -> String {
        ungapped(&self.residues)
    }

    /// Ungapped copy carrying name, range and description, with no parent.
    pub fn derive_dataset(&self) -> Sequence {
        Sequence {
            name: self.name.clone(),
            residues: self.ungapped(),
            start: self.start,
            end: self.end,
            description: self.description.clone(),
            ..Default::default()
        }
    }
}

/// Value of a named feature attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    /// One level of named sub-attributes.
    Map(BTreeMap<String, String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequenceFeature {
    pub feature_type: String,
    pub description: String,
    pub begin: i32,
    pub end: i32,
    pub score: f32,
    pub group: Option<String>,
    pub status: Option<String>,
    pub links: Vec<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl SequenceFeature {
    pub fn new(feature_type: impl Into<String>, description: impl Into<String>, begin: i32, end: i32) -> Self {
        Self {
            feature_type: feature_type.into(),
            description: description.into(),
            begin,
            end,
            score: f32::NAN,
            group: None,
            status: None,
            links: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Two features are the same if every field matches, treating NaN scores as equal.
    pub fn same_as(&self, other: &SequenceFeature) -> bool {
        let scores_match = (self.score.is_nan() && other.score.is_nan()) || self.score == other.score;
        scores_match
            && self.feature_type == other.feature_type
            && self.description == other.description
            && self.begin == other.begin
            && self.end == other.end
            && self.group == other.group
            && self.status == other.status
            && self.links == other.links
            && self.attributes == other.attributes
    }
}

/// Database cross reference, optionally carrying a coordinate mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DbRef {
    pub source: String,
    pub version: String,
    pub accession: String,
    pub locus: bool,
    pub canonical: bool,
    pub map: Option<MappingId>,
}

impl DbRef {
    pub fn new(source: impl Into<String>, version: impl Into<String>, accession: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            version: version.into(),
            accession: accession.into(),
            ..Default::default()
        }
    }
}

/// Structure (PDB-like) entry attached to a dataset sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructureEntry {
    pub id: String,
    pub entry_type: Option<String>,
    pub file: Option<PathBuf>,
    pub properties: BTreeMap<String, String>,
}

impl StructureEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sequence_range_ignores_gaps() {
        let seq = Sequence::new("s1", "AC--GT.A");
        assert_eq!(seq.start, 1);
        assert_eq!(seq.end, 5);
        assert_eq!(seq.ungapped(), "ACGTA");
    }

    #[test]
    fn test_derive_dataset_has_no_parent() {
        let seq = Sequence::new("s1", "A-C").with_description("desc");
        let ds = seq.derive_dataset();
        assert!(ds.is_dataset_sequence());
        assert_eq!(ds.residues, "AC");
        assert_eq!(ds.description.as_deref(), Some("desc"));
    }

    #[test]
    fn test_feature_equality_with_nan_score() {
        let a = SequenceFeature::new("Domain", "kinase", 1, 10);
        let b = SequenceFeature::new("Domain", "kinase", 1, 10);
        assert!(a.same_as(&b));
        assert!(!a.same_as(&b.clone().with_score(2.0)));
    }
}
