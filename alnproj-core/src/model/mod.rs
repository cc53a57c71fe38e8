//! In-memory project model
//!
//! Every entity lives in a typed arena owned by [`Workspace`] and is
//! referenced by a copyable [`Handle`]. Sharing (many aligned sequences
//! pointing at one dataset sequence, several views drawing on one dataset)
//! is expressed by handle equality.

pub mod alignment;
pub mod annotation;
pub mod arena;
pub mod colour;
pub mod filter;
pub mod group;
pub mod mapping;
pub mod sequence;
pub mod view;
pub mod viewer;

pub use alignment::{Alignment, Dataset};
pub use annotation::{Annotation, AnnotationRow, GraphLine, GraphType};
pub use arena::{Arena, Handle};
pub use colour::{
    AnnotationColourScheme, ColourScheme, FeatureColour, GraduatedColour, NoValueColour, Rgb,
    ThresholdType, UserColourScheme,
};
pub use filter::{Condition, FeatureMatcher, FeatureMatcherSet, FilterBy};
pub use group::SequenceGroup;
pub use mapping::{CodonFrame, CodonMapping, MapList, Mapping};
pub use sequence::{AttributeValue, DbRef, Sequence, SequenceFeature, StructureEntry};
pub use view::{
    CalcIdParam, EditHistory, FeatureSettings, FeatureTypeSettings, Font, Geometry, HiddenGroup,
    SplitFrame, View, ViewStyle,
};
pub use viewer::{
    AuxViewer, Matrix, PcaViewer, RnaModel, RnaViewer, SequencePoint, StructureBinding,
    StructureViewer, TreeViewer,
};

pub type SeqId = Handle<Sequence>;
pub type DatasetId = Handle<Dataset>;
pub type AnnotationId = Handle<AnnotationRow>;
pub type GroupId = Handle<SequenceGroup>;
pub type MappingId = Handle<Mapping>;
pub type CodonFrameId = Handle<CodonFrame>;
pub type ViewId = Handle<View>;
pub type ViewerId = Handle<AuxViewer>;
pub type HistoryId = Handle<EditHistory>;

/// Fraction of non-gap residues that must be nucleotides for a row set to
/// count as nucleotide.
const NUCLEOTIDE_FRACTION: f64 = 0.85;

/// The live object graph that archives are written from and loaded into.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    pub sequences: Arena<Sequence>,
    pub datasets: Arena<Dataset>,
    pub annotations: Arena<AnnotationRow>,
    pub groups: Arena<SequenceGroup>,
    pub mappings: Arena<Mapping>,
    pub codon_frames: Arena<CodonFrame>,
    pub views: Arena<View>,
    pub viewers: Arena<AuxViewer>,
    pub histories: Arena<EditHistory>,
    pub split_frames: Vec<SplitFrame>,
    view_order: Vec<ViewId>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sequence(&mut self, sequence: Sequence) -> SeqId {
        self.sequences.insert(sequence)
    }

    /// Follows the dataset-sequence chain to a parentless sequence.
    pub fn dataset_root(&self, seq: SeqId) -> SeqId {
        let mut current = seq;
        // chains are one level deep in practice; bound the walk against cycles
        for _ in 0..self.sequences.len().max(1) {
            match self.sequences.get(current).and_then(|s| s.dataset_sequence) {
                Some(parent) if parent != current => current = parent,
                _ => break,
            }
        }
        current
    }

    /// Gives `seq` a dataset sequence, deriving one if it has none.
    pub fn ensure_dataset_sequence(&mut self, seq: SeqId) -> SeqId {
        if let Some(parent) = self.sequences[seq].dataset_sequence {
            return self.dataset_root(parent);
        }
        let derived = self.sequences[seq].derive_dataset();
        let ds = self.sequences.insert(derived);
        self.sequences[seq].dataset_sequence = Some(ds);
        ds
    }

    /// New dataset over the dataset sequences of `rows`.
    pub fn create_dataset(&mut self, rows: &[SeqId]) -> DatasetId {
        let mut pool = Vec::with_capacity(rows.len());
        for &row in rows {
            let root = self.ensure_dataset_sequence(row);
            if !pool.contains(&root) {
                pool.push(root);
            }
        }
        self.datasets.insert(Dataset::new(pool))
    }

    pub fn add_view(&mut self, view: View) -> ViewId {
        let id = self.views.insert(view);
        self.view_order.push(id);
        id
    }

    pub fn remove_view(&mut self, view: ViewId) -> Option<View> {
        self.view_order.retain(|v| *v != view);
        self.split_frames.retain(|s| s.dna != view && s.protein != view);
        self.views.remove(view)
    }

    /// Open views in the order they were added.
    pub fn view_order(&self) -> &[ViewId] {
        &self.view_order
    }

    pub fn find_view(&self, sequence_set_id: &str, view_id: &str) -> Option<ViewId> {
        self.view_order.iter().copied().find(|v| {
            self.views
                .get(*v)
                .is_some_and(|view| view.sequence_set_id == sequence_set_id && view.view_id == view_id)
        })
    }

    pub fn find_view_by_title(&self, title: &str) -> Option<ViewId> {
        self.view_order
            .iter()
            .copied()
            .find(|v| self.views.get(*v).is_some_and(|view| view.title == title))
    }

    /// Views sharing a sequence set, in desktop order.
    pub fn views_in_set(&self, sequence_set_id: &str) -> Vec<ViewId> {
        self.view_order
            .iter()
            .copied()
            .filter(|v| {
                self.views
                    .get(*v)
                    .is_some_and(|view| view.sequence_set_id == sequence_set_id)
            })
            .collect()
    }

    pub fn viewers_for(&self, view: ViewId) -> Vec<ViewerId> {
        self.viewers
            .iter()
            .filter(|(_, viewer)| viewer.is_for(view))
            .map(|(id, _)| id)
            .collect()
    }

    /// Dataset owning `seq`'s dataset sequence, if any.
    pub fn dataset_of(&self, seq: SeqId) -> Option<DatasetId> {
        let root = self.dataset_root(seq);
        self.datasets
            .iter()
            .find(|(_, ds)| ds.contains(root))
            .map(|(id, _)| id)
    }

    pub fn is_nucleotide(&self, view: ViewId) -> bool {
        let Some(view) = self.views.get(view) else {
            return false;
        };
        let mut total = 0usize;
        let mut nucleotide = 0usize;
        for seq in &view.alignment.sequences {
            if let Some(s) = self.sequences.get(*seq) {
                for c in s.residues.chars().filter(|c| !sequence::is_gap(*c)) {
                    total += 1;
                    if matches!(c.to_ascii_uppercase(), 'A' | 'C' | 'G' | 'T' | 'U' | 'N') {
                        nucleotide += 1;
                    }
                }
            }
        }
        total > 0 && nucleotide as f64 / total as f64 >= NUCLEOTIDE_FRACTION
    }
}
