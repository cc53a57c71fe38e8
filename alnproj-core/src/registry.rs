//! Identity registry
//!
//! Maps live entities to the string ids used inside documents and back.
//! Keys are arena handles, so two sequences with identical content are
//! always distinct entries.

use std::collections::HashMap;
use std::fmt;

use crate::model::{AnnotationId, DatasetId, GroupId, SeqId};

/// Entity that can carry an external id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Sequence(SeqId),
    Dataset(DatasetId),
    Annotation(AnnotationId),
    Group(GroupId),
}

/// Supplies ids chosen by an enclosing host session.
pub trait IdSource {
    fn lookup(&self, entity: EntityRef) -> Option<String>;

    /// Whether a missing id is worth a warning. Plain minting sources say no.
    fn is_override(&self) -> bool {
        true
    }
}

/// Default source: every id is minted by the registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialIds;

impl IdSource for SequentialIds {
    fn lookup(&self, _entity: EntityRef) -> Option<String> {
        None
    }

    fn is_override(&self) -> bool {
        false
    }
}

/// Fixed override table, e.g. ids assigned by a host that embeds the archive.
#[derive(Debug, Default, Clone)]
pub struct OverrideTable {
    ids: HashMap<EntityRef, String>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: EntityRef, id: impl Into<String>) {
        self.ids.insert(entity, id.into());
    }
}

impl IdSource for OverrideTable {
    fn lookup(&self, entity: EntityRef) -> Option<String> {
        self.ids.get(&entity).cloned()
    }
}

pub struct IdentityRegistry {
    source: Box<dyn IdSource>,
    seq_ids: HashMap<SeqId, String>,
    seqs_by_id: HashMap<String, SeqId>,
    dataset_ids: HashMap<DatasetId, String>,
    annotations_by_id: HashMap<String, AnnotationId>,
    annotation_ids: HashMap<AnnotationId, String>,
    group_ids: HashMap<GroupId, String>,
}

impl fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("sequences", &self.seqs_by_id.len())
            .field("datasets", &self.dataset_ids.len())
            .field("annotations", &self.annotations_by_id.len())
            .field("groups", &self.group_ids.len())
            .finish()
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::with_source(Box::new(SequentialIds))
    }

    pub fn with_source(source: Box<dyn IdSource>) -> Self {
        Self {
            source,
            seq_ids: HashMap::new(),
            seqs_by_id: HashMap::new(),
            dataset_ids: HashMap::new(),
            annotations_by_id: HashMap::new(),
            annotation_ids: HashMap::new(),
            group_ids: HashMap::new(),
        }
    }

    /// Id for `seq`, minting `sq<N>` on first sight.
    pub fn sequence_id(&mut self, seq: SeqId) -> String {
        if let Some(id) = self.seq_ids.get(&seq) {
            return id.clone();
        }
        let mut n = self.seqs_by_id.len() + 1;
        let mut candidate = format!("sq{}", n);
        while self.seqs_by_id.contains_key(&candidate) {
            n += 1;
            candidate = format!("sq{}", n);
        }
        let id = self.external_or(EntityRef::Sequence(seq), candidate);
        self.register_sequence(&id, seq);
        id
    }

    /// Existing id for `seq` without minting.
    pub fn existing_sequence_id(&self, seq: SeqId) -> Option<&str> {
        self.seq_ids.get(&seq).map(String::as_str)
    }

    /// Binds `id` to `seq` in both directions.
    ///
    /// A sequence keeps the first id it was given; the id always points at
    /// the latest sequence registered under it.
    pub fn register_sequence(&mut self, id: &str, seq: SeqId) {
        self.seqs_by_id.insert(id.to_string(), seq);
        self.seq_ids.entry(seq).or_insert_with(|| id.to_string());
    }

    pub fn resolve_sequence(&self, id: &str) -> Option<SeqId> {
        self.seqs_by_id.get(id).copied()
    }

    pub fn knows_sequence(&self, id: &str) -> bool {
        self.seqs_by_id.contains_key(id)
    }

    /// Id for `dataset`, minting `ds<N>` on first sight.
    pub fn dataset_id(&mut self, dataset: DatasetId) -> String {
        if let Some(id) = self.dataset_ids.get(&dataset) {
            return id.clone();
        }
        let candidate = format!("ds{}", self.dataset_ids.len() + 1);
        let id = self.external_or(EntityRef::Dataset(dataset), candidate);
        self.dataset_ids.insert(dataset, id.clone());
        id
    }

    pub fn register_annotation(&mut self, id: &str, annotation: AnnotationId) {
        self.annotations_by_id.insert(id.to_string(), annotation);
        self.annotation_ids.entry(annotation).or_insert_with(|| id.to_string());
    }

    /// Id for an annotation row: its own id if it has one, else `ann<N>`.
    pub fn annotation_id(&mut self, annotation: AnnotationId, own: Option<&str>) -> String {
        if let Some(id) = self.annotation_ids.get(&annotation) {
            return id.clone();
        }
        let id = match own {
            Some(own) if !self.annotations_by_id.contains_key(own) => own.to_string(),
            _ => {
                let mut n = self.annotations_by_id.len() + 1;
                while self.annotations_by_id.contains_key(&format!("ann{}", n)) {
                    n += 1;
                }
                self.external_or(EntityRef::Annotation(annotation), format!("ann{}", n))
            }
        };
        self.register_annotation(&id, annotation);
        id
    }

    pub fn resolve_annotation(&self, id: &str) -> Option<AnnotationId> {
        self.annotations_by_id.get(id).copied()
    }

    /// Locally unique id for a group referenced by annotation rows.
    pub fn group_id(&mut self, group: GroupId) -> String {
        if let Some(id) = self.group_ids.get(&group) {
            return id.clone();
        }
        let candidate = format!("grp{}", self.group_ids.len() + 1);
        let id = self.external_or(EntityRef::Group(group), candidate);
        self.group_ids.insert(group, id.clone());
        id
    }

    pub fn sequence_count(&self) -> usize {
        self.seqs_by_id.len()
    }

    fn external_or(&self, entity: EntityRef, minted: String) -> String {
        match self.source.lookup(entity) {
            Some(id) => id,
            None => {
                if self.source.is_override() {
                    log::warn!("No external id for {:?}; using minted id {}", entity, minted);
                }
                minted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sequence, Workspace};
    use proptest::prelude::*;

    #[test]
    fn test_ids_are_reused_by_identity() {
        let mut ws = Workspace::new();
        let a = ws.add_sequence(Sequence::new("x", "ACGT"));
        let b = ws.add_sequence(Sequence::new("x", "ACGT"));
        let mut reg = IdentityRegistry::new();
        let id_a = reg.sequence_id(a);
        let id_b = reg.sequence_id(b);
        assert_eq!(id_a, "sq1");
        assert_eq!(id_b, "sq2");
        assert_eq!(reg.sequence_id(a), "sq1");
        assert_eq!(reg.resolve_sequence("sq2"), Some(b));
    }

    #[test]
    fn test_minting_skips_ids_registered_by_a_reader() {
        let mut ws = Workspace::new();
        let read = ws.add_sequence(Sequence::new("r", "A"));
        let fresh = ws.add_sequence(Sequence::new("f", "C"));
        let mut reg = IdentityRegistry::new();
        reg.register_sequence("sq2", read);
        assert_eq!(reg.sequence_id(fresh), "sq3");
        assert_eq!(reg.sequence_id(read), "sq2");
    }

    #[test]
    fn test_override_table_wins() {
        let mut ws = Workspace::new();
        let a = ws.add_sequence(Sequence::new("a", "A"));
        let b = ws.add_sequence(Sequence::new("b", "A"));
        let mut table = OverrideTable::new();
        table.insert(EntityRef::Sequence(a), "host-17");
        let mut reg = IdentityRegistry::with_source(Box::new(table));
        assert_eq!(reg.sequence_id(a), "host-17");
        // miss falls back to minting
        assert_eq!(reg.sequence_id(b), "sq2");
    }

    #[test]
    fn test_dataset_and_group_ids() {
        let mut ws = Workspace::new();
        let s = ws.add_sequence(Sequence::new("a", "A"));
        let ds1 = ws.create_dataset(&[s]);
        let ds2 = ws.create_dataset(&[s]);
        let mut reg = IdentityRegistry::new();
        assert_eq!(reg.dataset_id(ds1), "ds1");
        assert_eq!(reg.dataset_id(ds2), "ds2");
        assert_eq!(reg.dataset_id(ds1), "ds1");
    }

    #[test]
    fn test_annotation_ids_prefer_own() {
        use crate::model::AnnotationRow;
        let mut ws = Workspace::new();
        let a = ws.annotations.insert(AnnotationRow::new("SS", ""));
        let b = ws.annotations.insert(AnnotationRow::new("SS", ""));
        let c = ws.annotations.insert(AnnotationRow::new("Temp", ""));
        let mut reg = IdentityRegistry::new();
        assert_eq!(reg.annotation_id(a, Some("ss_1")), "ss_1");
        // own id already taken by another row
        assert_eq!(reg.annotation_id(b, Some("ss_1")), "ann2");
        assert_eq!(reg.annotation_id(c, None), "ann3");
        assert_eq!(reg.annotation_id(a, None), "ss_1");
        assert_eq!(reg.resolve_annotation("ann3"), Some(c));
    }

    proptest! {
        #[test]
        fn prop_minted_ids_are_unique(n in 1usize..60) {
            let mut ws = Workspace::new();
            let mut reg = IdentityRegistry::new();
            let mut seen = std::collections::HashSet::new();
            for i in 0..n {
                let s = ws.add_sequence(Sequence::new(format!("s{}", i), "A"));
                prop_assert!(seen.insert(reg.sequence_id(s)));
            }
            prop_assert_eq!(reg.sequence_count(), n);
        }
    }
}
