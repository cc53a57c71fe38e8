//! Views: the rendered state of one alignment window or tab

use std::collections::HashMap;

use super::alignment::Alignment;
use super::colour::{ColourScheme, FeatureColour, Rgb};
use super::filter::FeatureMatcherSet;
use super::{HistoryId, SeqId, ViewId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub name: String,
    pub size: i32,
    pub style: i32,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            name: "SansSerif".to_string(),
            size: 10,
            style: 0,
        }
    }
}

/// Display toggles and thresholds of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewStyle {
    pub font: Font,
    pub conservation_selected: bool,
    pub pid_selected: bool,
    pub consensus_threshold: i32,
    pub conservation_increment: i32,
    pub show_full_id: bool,
    pub right_align_ids: bool,
    pub show_text: bool,
    pub show_colour_text: bool,
    pub show_boxes: bool,
    pub show_unconserved: bool,
    pub wrap_alignment: bool,
    pub render_gaps: bool,
    pub show_sequence_features: bool,
    pub show_annotation: bool,
    pub show_consensus_histogram: bool,
    pub show_sequence_logo: bool,
    pub normalise_sequence_logo: bool,
    pub ignore_gaps_in_consensus: bool,
    pub text_colour: Rgb,
    pub text_colour2: Rgb,
    pub text_colour_threshold: i32,
    pub id_width: Option<i32>,
    pub scale_protein_as_cdna: bool,
    pub follow_highlight: bool,
}

impl Default for ViewStyle {
    fn default() -> Self {
        Self {
            font: Font::default(),
            conservation_selected: false,
            pid_selected: false,
            consensus_threshold: 0,
            conservation_increment: 30,
            show_full_id: true,
            right_align_ids: false,
            show_text: true,
            show_colour_text: false,
            show_boxes: true,
            show_unconserved: false,
            wrap_alignment: false,
            render_gaps: true,
            show_sequence_features: false,
            show_annotation: true,
            show_consensus_histogram: true,
            show_sequence_logo: false,
            normalise_sequence_logo: false,
            ignore_gaps_in_consensus: true,
            text_colour: Rgb::BLACK,
            text_colour2: Rgb::WHITE,
            text_colour_threshold: 0,
            id_width: None,
            scale_protein_as_cdna: true,
            follow_highlight: true,
        }
    }
}

/// Render settings for one feature type.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTypeSettings {
    pub feature_type: String,
    pub colour: FeatureColour,
    pub filter: Option<FeatureMatcherSet>,
    pub display: bool,
    /// Render order, lower drawn first.
    pub order: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSettings {
    pub types: Vec<FeatureTypeSettings>,
    /// Feature group name and whether it is shown.
    pub groups: Vec<(String, bool)>,
    pub transparency: Option<f32>,
}

/// Saved parameters of a named calculation attached to the view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CalcIdParam {
    pub calc_id: String,
    pub service_urls: Vec<String>,
    pub version: String,
    pub name: String,
    pub description: String,
    pub parameters: String,
    pub auto_update: bool,
    pub needs_update: bool,
}

/// Undo/redo list shared by all views of one sequence set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditHistory {
    pub undo: Vec<String>,
    pub redo: Vec<String>,
}

/// A hidden representative and the rows it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenGroup {
    pub representative: SeqId,
    pub members: Vec<SeqId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub view_id: String,
    pub title: String,
    pub view_name: Option<String>,
    pub sequence_set_id: String,
    pub complement_id: Option<String>,
    pub gather_here: bool,
    pub alignment: Alignment,
    pub geometry: Geometry,
    pub start_res: i32,
    pub start_seq: i32,
    pub colour: Option<ColourScheme>,
    pub background_colour_applies_to_all_groups: bool,
    pub style: ViewStyle,
    pub row_colours: HashMap<SeqId, Rgb>,
    pub hidden_sequences: Vec<SeqId>,
    pub hidden_groups: Vec<HiddenGroup>,
    /// Inclusive column ranges.
    pub hidden_columns: Vec<[i32; 2]>,
    pub feature_settings: Option<FeatureSettings>,
    pub calc_params: Vec<CalcIdParam>,
    pub history: Option<HistoryId>,
}

impl View {
    pub fn new(title: impl Into<String>, sequence_set_id: impl Into<String>, alignment: Alignment) -> Self {
        Self {
            view_id: String::new(),
            title: title.into(),
            view_name: None,
            sequence_set_id: sequence_set_id.into(),
            complement_id: None,
            gather_here: false,
            alignment,
            geometry: Geometry::new(0, 0, 700, 500),
            start_res: 0,
            start_seq: 0,
            colour: None,
            background_colour_applies_to_all_groups: true,
            style: ViewStyle::default(),
            row_colours: HashMap::new(),
            hidden_sequences: Vec::new(),
            hidden_groups: Vec::new(),
            hidden_columns: Vec::new(),
            feature_settings: None,
            calc_params: Vec::new(),
            history: None,
        }
    }

    pub fn with_view_id(mut self, view_id: impl Into<String>) -> Self {
        self.view_id = view_id.into();
        self
    }

    pub fn is_hidden(&self, seq: SeqId) -> bool {
        self.hidden_sequences.contains(&seq)
    }

    pub fn hidden_group_for(&self, representative: SeqId) -> Option<&HiddenGroup> {
        self.hidden_groups
            .iter()
            .find(|g| g.representative == representative)
    }
}

/// Nucleotide and protein views restored as one split window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitFrame {
    pub dna: ViewId,
    pub protein: ViewId,
}
