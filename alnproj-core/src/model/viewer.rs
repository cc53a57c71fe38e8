//! Auxiliary viewers opened on views: trees, PCA plots, structure and
//! secondary-structure viewers.

use std::path::PathBuf;

use super::colour::Rgb;
use super::view::{Font, Geometry};
use super::{AnnotationId, SeqId, ViewId};

/// Dense row-major matrix with optional diagonal vectors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix {
    pub rows: Vec<Vec<f64>>,
    pub d: Option<Vec<f64>>,
    pub e: Option<Vec<f64>>,
}

impl Matrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Self {
        Self { rows, d: None, e: None }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeViewer {
    pub view: ViewId,
    pub id: Option<String>,
    pub title: String,
    pub newick: String,
    pub geometry: Geometry,
    pub font: Font,
    pub threshold: f32,
    pub fit_to_window: bool,
    pub current_tree: bool,
    pub mark_unlinked: bool,
    pub show_bootstrap: bool,
    pub show_distances: bool,
    pub link_to_all_views: bool,
}

impl TreeViewer {
    pub fn new(view: ViewId, title: impl Into<String>, newick: impl Into<String>) -> Self {
        Self {
            view,
            id: None,
            title: title.into(),
            newick: newick.into(),
            geometry: Geometry::new(50, 50, 400, 500),
            font: Font::default(),
            threshold: 0.0,
            fit_to_window: true,
            current_tree: false,
            mark_unlinked: true,
            show_bootstrap: false,
            show_distances: false,
            link_to_all_views: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencePoint {
    pub sequence: SeqId,
    pub position: [f32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PcaViewer {
    pub view: ViewId,
    pub title: String,
    pub geometry: Geometry,
    pub score_model: String,
    pub dimensions: [i32; 3],
    pub background: Rgb,
    pub scale_factor: f32,
    pub seq_point_min: [f32; 3],
    pub seq_point_max: [f32; 3],
    pub show_labels: bool,
    pub link_to_all_views: bool,
    pub include_gaps: bool,
    pub match_gaps: bool,
    pub include_gapped_columns: bool,
    pub denominate_by_shortest_length: bool,
    pub sequence_points: Vec<SequencePoint>,
    pub axes: Vec<[f32; 3]>,
    pub pairwise: Matrix,
    pub tridiagonal: Matrix,
    pub eigen: Matrix,
}

/// Structure loaded in a structure viewer, with the sequences it is bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureBinding {
    pub structure_id: String,
    pub file: Option<PathBuf>,
    pub sequences: Vec<SeqId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructureViewer {
    pub viewer_id: String,
    pub viewer_type: String,
    pub title: String,
    pub geometry: Geometry,
    pub bindings: Vec<StructureBinding>,
    /// Views the viewer colours from or superposes with.
    pub views: Vec<ViewId>,
    pub align_with: Vec<ViewId>,
    pub colour_with: Vec<ViewId>,
    pub colour_by_viewer: bool,
    pub visible: bool,
    /// Native session file, produced by the host on save or staged on load.
    pub session_file: Option<PathBuf>,
}

impl StructureViewer {
    pub fn new(viewer_id: impl Into<String>, viewer_type: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            viewer_type: viewer_type.into(),
            title: String::new(),
            geometry,
            bindings: Vec::new(),
            views: Vec::new(),
            align_with: Vec::new(),
            colour_with: Vec::new(),
            colour_by_viewer: false,
            visible: true,
            session_file: None,
        }
    }

    pub fn binds(&self, structure_id: &str, seq: SeqId) -> bool {
        self.bindings
            .iter()
            .any(|b| b.structure_id == structure_id && b.sequences.contains(&seq))
    }
}

/// One secondary-structure model shown in an RNA viewer.
#[derive(Debug, Clone, PartialEq)]
pub struct RnaModel {
    pub sequence: SeqId,
    pub annotation: AnnotationId,
    pub gapped: bool,
    pub title: String,
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RnaViewer {
    pub viewer_id: String,
    pub title: String,
    pub view: ViewId,
    pub geometry: Geometry,
    pub divider_location: i32,
    pub selected_index: i32,
    pub models: Vec<RnaModel>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuxViewer {
    Tree(TreeViewer),
    Pca(Box<PcaViewer>),
    Structure(StructureViewer),
    Rna(RnaViewer),
}

impl AuxViewer {
    /// Whether the viewer is attached to `view`.
    pub fn is_for(&self, view: ViewId) -> bool {
        match self {
            AuxViewer::Tree(t) => t.view == view,
            AuxViewer::Pca(p) => p.view == view,
            AuxViewer::Structure(s) => s.views.contains(&view),
            AuxViewer::Rna(r) => r.view == view,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AuxViewer::Tree(_) => "tree",
            AuxViewer::Pca(_) => "pca",
            AuxViewer::Structure(_) => "structure",
            AuxViewer::Rna(_) => "rna",
        }
    }
}
