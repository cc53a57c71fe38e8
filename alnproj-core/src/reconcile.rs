//! Dataset reconciliation
//!
//! Decides, for each document read in a load session, which live dataset
//! its sequences belong to: one already materialised in this session or a
//! fresh one. Lookups are an ordered list of [`DatasetStrategy`] values
//! tried in turn.

use std::collections::HashMap;

use crate::model::{DatasetId, SeqId, Workspace};
use crate::model::sequence::ungapped;
use crate::registry::IdentityRegistry;

/// Ways of finding an already materialised dataset for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetStrategy {
    /// The document's dataset id was seen earlier in this session.
    DeclaredId,
    /// One of the declared dataset-sequence ids already belongs to a dataset.
    SharedSequence,
    /// A view of the same sequence set was already bound to a dataset.
    ViewSequenceSet,
}

pub const DEFAULT_STRATEGIES: [DatasetStrategy; 3] = [
    DatasetStrategy::DeclaredId,
    DatasetStrategy::SharedSequence,
    DatasetStrategy::ViewSequenceSet,
];

/// A sequence as declared by a document's sequence set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredSequence {
    pub id: String,
    /// Id of the dataset sequence; equal to `id` in dataset documents.
    pub dataset_sequence_id: Option<String>,
}

impl DeclaredSequence {
    pub fn new(id: impl Into<String>, dataset_sequence_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            dataset_sequence_id,
        }
    }
}

/// Dataset information carried by one document.
#[derive(Debug, Clone)]
pub struct DatasetDeclaration<'a> {
    pub dataset_id: &'a str,
    pub sequences: &'a [DeclaredSequence],
    /// No view record: the document is a bare dataset dump.
    pub dataset_only: bool,
    /// Unique sequence-set id of the view, for view documents.
    pub sequence_set_id: Option<&'a str>,
}

/// Result of reconciling one declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub dataset: DatasetId,
    /// Strategy that found an existing dataset; `None` when one was created.
    pub strategy: Option<DatasetStrategy>,
    /// Dataset sequences whose residues were replaced by a longer version.
    pub extended: usize,
    /// Inconsistencies logged while binding.
    pub conflicts: usize,
}

impl Reconciliation {
    pub fn created(&self) -> bool {
        self.strategy.is_none()
    }
}

/// Session tables for dataset reconciliation.
#[derive(Debug, Clone)]
pub struct DatasetReconciler {
    strategies: Vec<DatasetStrategy>,
    by_dataset_id: HashMap<String, DatasetId>,
    by_dataset_sequence: HashMap<String, DatasetId>,
    by_sequence_set: HashMap<String, DatasetId>,
}

impl Default for DatasetReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetReconciler {
    pub fn new() -> Self {
        Self::with_strategies(DEFAULT_STRATEGIES.to_vec())
    }

    pub fn with_strategies(strategies: Vec<DatasetStrategy>) -> Self {
        Self {
            strategies,
            by_dataset_id: HashMap::new(),
            by_dataset_sequence: HashMap::new(),
            by_sequence_set: HashMap::new(),
        }
    }

    pub fn strategies(&self) -> &[DatasetStrategy] {
        &self.strategies
    }

    pub fn dataset_for_id(&self, dataset_id: &str) -> Option<DatasetId> {
        self.by_dataset_id.get(dataset_id).copied()
    }

    pub fn dataset_for_sequence_set(&self, sequence_set_id: &str) -> Option<DatasetId> {
        self.by_sequence_set.get(sequence_set_id).copied()
    }

    /// Records that `dataset_id` names `dataset` in this session.
    pub fn bind_dataset_id(&mut self, dataset_id: &str, dataset: DatasetId) -> usize {
        match self.by_dataset_id.insert(dataset_id.to_string(), dataset) {
            Some(previous) if previous != dataset => {
                log::warn!(
                    "SERIOUS: dataset id {} was bound to another dataset; rebinding, cross references may be lost",
                    dataset_id
                );
                1
            }
            _ => 0,
        }
    }

    /// Applies a single strategy.
    pub fn lookup(&self, strategy: DatasetStrategy, decl: &DatasetDeclaration<'_>) -> Option<DatasetId> {
        match strategy {
            DatasetStrategy::DeclaredId => self.dataset_for_id(decl.dataset_id),
            DatasetStrategy::SharedSequence => decl
                .sequences
                .iter()
                .filter_map(|s| s.dataset_sequence_id.as_deref())
                .find_map(|id| self.by_dataset_sequence.get(id).copied()),
            DatasetStrategy::ViewSequenceSet => {
                if decl.dataset_only {
                    return None;
                }
                decl.sequence_set_id
                    .and_then(|set| self.dataset_for_sequence_set(set))
            }
        }
    }

    /// First strategy that finds a dataset.
    pub fn find_existing(&self, decl: &DatasetDeclaration<'_>) -> Option<(DatasetStrategy, DatasetId)> {
        self.strategies
            .iter()
            .find_map(|s| self.lookup(*s, decl).map(|ds| (*s, ds)))
    }

    /// Produces the single dataset for `decl`, creating or extending it.
    ///
    /// Every declared sequence id must already be registered with the
    /// registry. An empty dataset id yields a fresh dataset built from the
    /// declared sequences with no session binding.
    pub fn reconcile(
        &mut self,
        ws: &mut Workspace,
        registry: &mut IdentityRegistry,
        decl: &DatasetDeclaration<'_>,
    ) -> Reconciliation {
        if decl.dataset_id.is_empty() {
            let rows: Vec<SeqId> = decl
                .sequences
                .iter()
                .filter_map(|s| registry.resolve_sequence(&s.id))
                .collect();
            let dataset = ws.create_dataset(&rows);
            log::debug!("Synthesised dataset for {} sequences with no dataset id", rows.len());
            return Reconciliation {
                dataset,
                strategy: None,
                extended: 0,
                conflicts: 0,
            };
        }

        let found = self.find_existing(decl);
        let mut conflicts = 0;
        if let (Some((strategy, ds)), Some(set)) = (found, decl.sequence_set_id) {
            if !decl.dataset_only {
                if let Some(bound) = self.dataset_for_sequence_set(set) {
                    if bound != ds {
                        log::warn!(
                            "SERIOUS: sequence set {} is bound to a different dataset than the one found by {:?}",
                            set,
                            strategy
                        );
                        conflicts += 1;
                    }
                }
            }
        }

        let existing = found.map(|(_, ds)| ds);
        let mut new_pool = Vec::new();
        let mut extended = 0;
        for (position, declared) in decl.sequences.iter().enumerate() {
            if self.ensure_dataset_sequence(ws, registry, existing, &mut new_pool, declared, position) {
                extended += 1;
            }
        }

        let dataset = match existing {
            Some(ds) => ds,
            None => {
                let ds = ws.datasets.insert(crate::model::Dataset::new(new_pool));
                log::debug!("Created new dataset for {}", decl.dataset_id);
                ds
            }
        };

        conflicts += self.bind_dataset_id(decl.dataset_id, dataset);
        if !decl.dataset_only {
            if let Some(set) = decl.sequence_set_id {
                self.by_sequence_set.insert(set.to_string(), dataset);
            }
        }
        conflicts += self.update_sequence_bindings(decl.sequences, dataset);

        Reconciliation {
            dataset,
            strategy: found.map(|(s, _)| s),
            extended,
            conflicts,
        }
    }

    /// Links one declared sequence to its dataset sequence.
    ///
    /// Returns `true` if an existing dataset sequence was extended.
    fn ensure_dataset_sequence(
        &self,
        ws: &mut Workspace,
        registry: &mut IdentityRegistry,
        dataset: Option<DatasetId>,
        new_pool: &mut Vec<SeqId>,
        declared: &DeclaredSequence,
        position: usize,
    ) -> bool {
        let Some(seq) = registry.resolve_sequence(&declared.id) else {
            log::warn!("Declared sequence {} was never materialised", declared.id);
            return false;
        };

        let dsq = match ws.sequences[seq].dataset_sequence {
            Some(parent) => ws.dataset_root(parent),
            None => {
                let known = declared
                    .dataset_sequence_id
                    .as_deref()
                    .and_then(|id| registry.resolve_sequence(id));
                match known {
                    Some(dsq) => {
                        if dsq != seq {
                            ws.sequences[seq].dataset_sequence = Some(dsq);
                        }
                        dsq
                    }
                    None => {
                        let dsq = ws.ensure_dataset_sequence(seq);
                        let ds_id = match &declared.dataset_sequence_id {
                            Some(id) => id.clone(),
                            None => registry.sequence_id(dsq),
                        };
                        registry.register_sequence(&ds_id, dsq);
                        dsq
                    }
                }
            }
        };

        if dsq != seq {
            self.add_to_pool(ws, dataset, new_pool, dsq);
            return merge_residues(ws, seq, dsq);
        }

        // the declared sequence is itself the dataset sequence
        match dataset {
            Some(ds) => ws.datasets[ds].place_at(position, dsq),
            None => {
                if !new_pool.contains(&dsq) {
                    new_pool.push(dsq);
                }
            }
        }
        false
    }

    fn add_to_pool(&self, ws: &mut Workspace, dataset: Option<DatasetId>, new_pool: &mut Vec<SeqId>, dsq: SeqId) {
        match dataset {
            Some(ds) => {
                let ds = &mut ws.datasets[ds];
                if !ds.contains(dsq) {
                    ds.sequences.push(dsq);
                }
            }
            None => {
                if !new_pool.contains(&dsq) {
                    new_pool.push(dsq);
                }
            }
        }
    }

    fn update_sequence_bindings(&mut self, sequences: &[DeclaredSequence], dataset: DatasetId) -> usize {
        let mut conflicts = 0;
        for id in sequences.iter().filter_map(|s| s.dataset_sequence_id.as_deref()) {
            if let Some(previous) = self.by_dataset_sequence.insert(id.to_string(), dataset) {
                if previous != dataset {
                    log::warn!("Dataset sequence {} appears in more than one dataset", id);
                    conflicts += 1;
                }
            }
        }
        conflicts
    }
}

/// Extends `dsq` with `seq`'s ungapped residues when they are longer.
///
/// Never truncates. Returns `true` if residues were replaced.
pub fn merge_residues(ws: &mut Workspace, seq: SeqId, dsq: SeqId) -> bool {
    let incoming = ungapped(&ws.sequences[seq].residues);
    let current = &ws.sequences[dsq].residues;
    if incoming.eq_ignore_ascii_case(current) {
        return false;
    }
    if incoming.chars().count() <= current.chars().count() {
        if !current.to_ascii_uppercase().contains(&incoming.to_ascii_uppercase()) {
            log::warn!(
                "Dataset sequence {} kept its residues over a differing declaration ({} vs {} residues)",
                ws.sequences[dsq].name,
                current.chars().count(),
                incoming.chars().count()
            );
        }
        return false;
    }
    log::warn!(
        "Dataset sequence {} replaced by a longer version ({} -> {} residues)",
        ws.sequences[dsq].name,
        current.chars().count(),
        incoming.chars().count()
    );
    ws.sequences[dsq].residues = incoming;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sequence;

    fn declare(ws: &mut Workspace, reg: &mut IdentityRegistry, id: &str, ds_id: &str, residues: &str) -> DeclaredSequence {
        let seq = ws.add_sequence(Sequence::new(id, residues));
        reg.register_sequence(id, seq);
        DeclaredSequence::new(id, Some(ds_id.to_string()))
    }

    #[test]
    fn test_new_dataset_when_nothing_matches() {
        let mut ws = Workspace::new();
        let mut reg = IdentityRegistry::new();
        let decls = vec![
            declare(&mut ws, &mut reg, "sq1", "sq10", "AC-GT"),
            declare(&mut ws, &mut reg, "sq2", "sq11", "AAA"),
        ];
        let mut rec = DatasetReconciler::new();
        let result = rec.reconcile(
            &mut ws,
            &mut reg,
            &DatasetDeclaration {
                dataset_id: "ds1",
                sequences: &decls,
                dataset_only: false,
                sequence_set_id: Some("set1"),
            },
        );
        assert!(result.created());
        let ds = &ws.datasets[result.dataset];
        assert_eq!(ds.sequences.len(), 2);
        let dsq = reg.resolve_sequence("sq10").unwrap();
        assert_eq!(ws.sequences[dsq].residues, "ACGT");
        assert_eq!(rec.dataset_for_id("ds1"), Some(result.dataset));
    }

    #[test]
    fn test_declared_id_strategy_reuses_dataset() {
        let mut ws = Workspace::new();
        let mut reg = IdentityRegistry::new();
        let mut rec = DatasetReconciler::new();
        let first = vec![declare(&mut ws, &mut reg, "sq1", "sq10", "ACGT")];
        let a = rec.reconcile(
            &mut ws,
            &mut reg,
            &DatasetDeclaration { dataset_id: "ds1", sequences: &first, dataset_only: false, sequence_set_id: Some("s1") },
        );
        let second = vec![declare(&mut ws, &mut reg, "sq2", "sq10", "AC-GT")];
        let b = rec.reconcile(
            &mut ws,
            &mut reg,
            &DatasetDeclaration { dataset_id: "ds1", sequences: &second, dataset_only: false, sequence_set_id: Some("s2") },
        );
        assert_eq!(a.dataset, b.dataset);
        assert_eq!(b.strategy, Some(DatasetStrategy::DeclaredId));
        let s1 = reg.resolve_sequence("sq1").unwrap();
        let s2 = reg.resolve_sequence("sq2").unwrap();
        assert_eq!(ws.dataset_root(s1), ws.dataset_root(s2));
        assert_eq!(ws.datasets[a.dataset].sequences.len(), 1);
    }

    #[test]
    fn test_shared_sequence_strategy_recovers_renamed_dataset() {
        let mut ws = Workspace::new();
        let mut reg = IdentityRegistry::new();
        let mut rec = DatasetReconciler::new();
        let first = vec![declare(&mut ws, &mut reg, "sq1", "sq10", "ACGT")];
        let a = rec.reconcile(
            &mut ws,
            &mut reg,
            &DatasetDeclaration { dataset_id: "ds1", sequences: &first, dataset_only: false, sequence_set_id: Some("s1") },
        );
        let second = vec![declare(&mut ws, &mut reg, "sq2", "sq10", "ACGT")];
        let b = rec.reconcile(
            &mut ws,
            &mut reg,
            &DatasetDeclaration { dataset_id: "ds7", sequences: &second, dataset_only: false, sequence_set_id: Some("s2") },
        );
        assert_eq!(b.strategy, Some(DatasetStrategy::SharedSequence));
        assert_eq!(a.dataset, b.dataset);
        assert_eq!(rec.dataset_for_id("ds7"), Some(a.dataset));
    }

    #[test]
    fn test_view_sequence_set_strategy_only_for_views() {
        let rec = {
            let mut ws = Workspace::new();
            let mut reg = IdentityRegistry::new();
            let mut rec = DatasetReconciler::new();
            let decls = vec![declare(&mut ws, &mut reg, "sq1", "sq10", "ACGT")];
            rec.reconcile(
                &mut ws,
                &mut reg,
                &DatasetDeclaration { dataset_id: "ds1", sequences: &decls, dataset_only: false, sequence_set_id: Some("set9") },
            );
            rec
        };
        let empty: Vec<DeclaredSequence> = Vec::new();
        let view = DatasetDeclaration { dataset_id: "other", sequences: &empty, dataset_only: false, sequence_set_id: Some("set9") };
        let dump = DatasetDeclaration { dataset_only: true, ..view.clone() };
        assert!(rec.lookup(DatasetStrategy::ViewSequenceSet, &view).is_some());
        assert!(rec.lookup(DatasetStrategy::ViewSequenceSet, &dump).is_none());
    }

    #[test]
    fn test_merge_extends_never_truncates() {
        let mut ws = Workspace::new();
        let dsq = ws.add_sequence(Sequence::new("d", "ACG"));
        let longer = ws.add_sequence(Sequence::new("l", "AC-GTT"));
        let shorter = ws.add_sequence(Sequence::new("s", "A-C"));
        assert!(merge_residues(&mut ws, longer, dsq));
        assert_eq!(ws.sequences[dsq].residues, "ACGTT");
        assert!(!merge_residues(&mut ws, shorter, dsq));
        assert_eq!(ws.sequences[dsq].residues, "ACGTT");
    }

    #[test]
    fn test_differing_declaration_of_same_length_keeps_existing() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut ws = Workspace::new();
        let dsq = ws.add_sequence(Sequence::new("d", "ACGT"));
        let drifted = ws.add_sequence(Sequence::new("x", "AC-TT"));
        assert!(!merge_residues(&mut ws, drifted, dsq));
        assert_eq!(ws.sequences[dsq].residues, "ACGT");
    }

    #[test]
    fn test_dataset_document_reorders_existing_dataset() {
        let mut ws = Workspace::new();
        let mut reg = IdentityRegistry::new();
        let mut rec = DatasetReconciler::new();
        let view = vec![
            declare(&mut ws, &mut reg, "sq1", "sq3", "AAA"),
            declare(&mut ws, &mut reg, "sq2", "sq4", "CCC"),
        ];
        let v = rec.reconcile(
            &mut ws,
            &mut reg,
            &DatasetDeclaration { dataset_id: "ds1", sequences: &view, dataset_only: false, sequence_set_id: Some("s") },
        );
        // dataset dump declares the dataset sequences themselves, in reverse order
        let dump = vec![
            DeclaredSequence::new("sq4", Some("sq4".into())),
            DeclaredSequence::new("sq3", Some("sq3".into())),
        ];
        let d = rec.reconcile(
            &mut ws,
            &mut reg,
            &DatasetDeclaration { dataset_id: "ds1", sequences: &dump, dataset_only: true, sequence_set_id: None },
        );
        assert_eq!(v.dataset, d.dataset);
        let sq3 = reg.resolve_sequence("sq3").unwrap();
        let sq4 = reg.resolve_sequence("sq4").unwrap();
        assert_eq!(ws.datasets[d.dataset].sequences, vec![sq4, sq3]);
    }

    #[test]
    fn test_empty_dataset_id_synthesises_fresh_dataset() {
        let mut ws = Workspace::new();
        let mut reg = IdentityRegistry::new();
        let mut rec = DatasetReconciler::new();
        let decls = vec![declare(&mut ws, &mut reg, "sq1", "sq1", "AC-G")];
        let r = rec.reconcile(
            &mut ws,
            &mut reg,
            &DatasetDeclaration { dataset_id: "", sequences: &decls, dataset_only: false, sequence_set_id: Some("s") },
        );
        assert!(r.created());
        assert_eq!(ws.datasets[r.dataset].sequences.len(), 1);
        assert_eq!(rec.dataset_for_id(""), None);
    }
}
