//! XML document schema
//!
//! One [`ProjectDoc`] is written per view and per dataset. References
//! between elements are by string id; see [`crate::registry`].
//!
//! Attribute fields come before element fields in every struct so that the
//! serializer writes start tags in one go.

use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, ArchiveResult};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "project")]
pub struct ProjectDoc {
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@creationDate", default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
    #[serde(rename = "sequenceModel")]
    pub model: SequenceModelDoc,
    #[serde(rename = "row", default)]
    pub rows: Vec<RowDoc>,
    #[serde(rename = "group", default)]
    pub groups: Vec<GroupDoc>,
    #[serde(rename = "viewport", default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<ViewportDoc>,
    #[serde(rename = "userColours", default)]
    pub user_colours: Vec<UserColoursDoc>,
    #[serde(rename = "tree", default)]
    pub trees: Vec<TreeDoc>,
    #[serde(rename = "pcaViewer", default)]
    pub pca_viewers: Vec<PcaViewerDoc>,
    #[serde(rename = "featureSettings", default, skip_serializing_if = "Option::is_none")]
    pub feature_settings: Option<FeatureSettingsDoc>,
}

impl ProjectDoc {
    pub fn new(version: impl Into<String>, sequence_set: SequenceSetDoc) -> Self {
        Self {
            version: version.into(),
            model: SequenceModelDoc { sequence_set },
            ..Default::default()
        }
    }

    pub fn sequence_set(&self) -> &SequenceSetDoc {
        &self.model.sequence_set
    }

    /// A document with no view record holds only a dataset.
    pub fn is_dataset_only(&self) -> bool {
        self.viewport.is_none()
    }

    pub fn to_xml(&self) -> ArchiveResult<String> {
        let body = quick_xml::se::to_string(self)?;
        let mut xml = String::with_capacity(XML_DECLARATION.len() + body.len());
        xml.push_str(XML_DECLARATION);
        xml.push_str(&body);
        Ok(xml)
    }

    pub fn from_xml(xml: &str) -> ArchiveResult<Self> {
        let doc: ProjectDoc = quick_xml::de::from_str(xml)?;
        if doc.version.is_empty() {
            return Err(ArchiveError::document("", "missing version attribute"));
        }
        Ok(doc)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceModelDoc {
    #[serde(rename = "sequenceSet")]
    pub sequence_set: SequenceSetDoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceSetDoc {
    #[serde(rename = "@datasetId", default)]
    pub dataset_id: String,
    #[serde(rename = "@gapChar", default = "default_gap")]
    pub gap_char: String,
    #[serde(rename = "sequence", default)]
    pub sequences: Vec<SequenceDoc>,
    #[serde(rename = "codonFrame", default)]
    pub codon_frames: Vec<CodonFrameDoc>,
    #[serde(rename = "annotation", default)]
    pub annotations: Vec<AnnotationDoc>,
    #[serde(rename = "property", default)]
    pub properties: Vec<PropertyDoc>,
}

fn default_gap() -> String {
    "-".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceDoc {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@start")]
    pub start: i32,
    #[serde(rename = "@end")]
    pub end: i32,
    #[serde(rename = "@dsseqid", default, skip_serializing_if = "Option::is_none")]
    pub dataset_sequence_id: Option<String>,
    #[serde(rename = "description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "residues", default)]
    pub residues: String,
    #[serde(rename = "dbRef", default)]
    pub dbrefs: Vec<DbRefDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbRefDoc {
    #[serde(rename = "@source")]
    pub source: String,
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(rename = "@accessionId")]
    pub accession: String,
    #[serde(rename = "@locus", default, skip_serializing_if = "is_false")]
    pub locus: bool,
    #[serde(rename = "@canonical", default, skip_serializing_if = "is_false")]
    pub canonical: bool,
    #[serde(rename = "mapping", default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<MappingDoc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDoc {
    #[serde(rename = "@start")]
    pub start: i32,
    #[serde(rename = "@end")]
    pub end: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDoc {
    #[serde(rename = "@mapFromUnit")]
    pub from_unit: i32,
    #[serde(rename = "@mapToUnit")]
    pub to_unit: i32,
    /// Id of the target sequence when it is declared elsewhere.
    #[serde(rename = "@dseqFor", default, skip_serializing_if = "Option::is_none")]
    pub dseq_for: Option<String>,
    #[serde(rename = "mapListFrom", default)]
    pub from: Vec<RangeDoc>,
    #[serde(rename = "mapListTo", default)]
    pub to: Vec<RangeDoc>,
    /// Target sequence written inline when it is not declared anywhere else.
    #[serde(rename = "sequence", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Box<SequenceDoc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodonFrameDoc {
    #[serde(rename = "codonMap", default)]
    pub maps: Vec<CodonMapDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodonMapDoc {
    #[serde(rename = "@dnasq")]
    pub dna_sequence: String,
    #[serde(rename = "mapping")]
    pub mapping: MappingDoc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDoc {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@value")]
    pub value: String,
}

impl PropertyDoc {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDoc {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@label")]
    pub label: String,
    #[serde(rename = "@description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "@graph", default, skip_serializing_if = "is_false")]
    pub graph: bool,
    #[serde(rename = "@graphType", default)]
    pub graph_type: i32,
    #[serde(rename = "@graphGroup", default, skip_serializing_if = "Option::is_none")]
    pub graph_group: Option<i32>,
    #[serde(rename = "@graphHeight", default, skip_serializing_if = "Option::is_none")]
    pub graph_height: Option<i32>,
    #[serde(rename = "@visible", default = "default_true")]
    pub visible: bool,
    #[serde(rename = "@centreColLabels", default, skip_serializing_if = "is_false")]
    pub centre_column_labels: bool,
    #[serde(rename = "@scaleColLabels", default, skip_serializing_if = "is_false")]
    pub scale_column_labels: bool,
    #[serde(rename = "@showAllColLabels", default, skip_serializing_if = "is_false")]
    pub show_all_column_labels: bool,
    #[serde(rename = "@belowAlignment", default = "default_true")]
    pub below_alignment: bool,
    #[serde(rename = "@autoCalculated", default, skip_serializing_if = "is_false")]
    pub auto_calculated: bool,
    #[serde(rename = "@score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(rename = "@calcId", default, skip_serializing_if = "Option::is_none")]
    pub calc_id: Option<String>,
    #[serde(rename = "@columns", default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<usize>,
    #[serde(rename = "@sequenceRef", default, skip_serializing_if = "Option::is_none")]
    pub sequence_ref: Option<String>,
    #[serde(rename = "@groupRef", default, skip_serializing_if = "Option::is_none")]
    pub group_ref: Option<String>,
    #[serde(rename = "thresholdLine", default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdLineDoc>,
    #[serde(rename = "annotationElement", default)]
    pub elements: Vec<AnnotationElementDoc>,
    #[serde(rename = "property", default)]
    pub properties: Vec<PropertyDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLineDoc {
    #[serde(rename = "@label", default)]
    pub label: String,
    #[serde(rename = "@value")]
    pub value: f32,
    #[serde(rename = "@colour")]
    pub colour: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationElementDoc {
    #[serde(rename = "@position")]
    pub position: usize,
    #[serde(rename = "@displayCharacter", default, skip_serializing_if = "Option::is_none")]
    pub display_character: Option<String>,
    #[serde(rename = "@description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "@secondaryStructure", default, skip_serializing_if = "Option::is_none")]
    pub secondary_structure: Option<String>,
    #[serde(rename = "@value", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    #[serde(rename = "@colour", default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<i32>,
}

/// View state of one row: the sequence it shows and the data hung on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowDoc {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@start")]
    pub start: i32,
    #[serde(rename = "@end")]
    pub end: i32,
    #[serde(rename = "@colour", default)]
    pub colour: i32,
    #[serde(rename = "@hidden", default, skip_serializing_if = "is_false")]
    pub hidden: bool,
    #[serde(rename = "@viewreference", default, skip_serializing_if = "is_false")]
    pub view_reference: bool,
    /// Row indices represented by this row while it is a hidden representative.
    #[serde(rename = "hiddenSequence", default)]
    pub hidden_sequences: Vec<usize>,
    #[serde(rename = "feature", default)]
    pub features: Vec<FeatureDoc>,
    #[serde(rename = "structure", default)]
    pub structures: Vec<StructureDoc>,
    #[serde(rename = "rnaViewer", default)]
    pub rna_viewers: Vec<RnaViewerDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureDoc {
    #[serde(rename = "@type")]
    pub feature_type: String,
    #[serde(rename = "@begin")]
    pub begin: i32,
    #[serde(rename = "@end")]
    pub end: i32,
    #[serde(rename = "@description", default)]
    pub description: String,
    #[serde(rename = "@score", default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(rename = "@featureGroup", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(rename = "@status", default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(rename = "otherData", default)]
    pub other_data: Vec<OtherDataDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherDataDoc {
    #[serde(rename = "@key")]
    pub key: String,
    #[serde(rename = "@key2", default, skip_serializing_if = "Option::is_none")]
    pub key2: Option<String>,
    #[serde(rename = "@value")]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureDoc {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type", default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<String>,
    /// Archive entry name when the file was embedded, else the original path.
    #[serde(rename = "@file", default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(rename = "property", default)]
    pub properties: Vec<PropertyDoc>,
    #[serde(rename = "structureState", default)]
    pub states: Vec<StructureStateDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureStateDoc {
    #[serde(rename = "@viewId", default, skip_serializing_if = "Option::is_none")]
    pub viewer_id: Option<String>,
    #[serde(rename = "@type", default)]
    pub viewer_type: String,
    #[serde(rename = "@title", default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "@x")]
    pub x: i32,
    #[serde(rename = "@y")]
    pub y: i32,
    #[serde(rename = "@width")]
    pub width: i32,
    #[serde(rename = "@height")]
    pub height: i32,
    #[serde(rename = "@alignwithAlignPanel", default)]
    pub align_with_view: bool,
    #[serde(rename = "@colourwithAlignPanel", default)]
    pub colour_with_view: bool,
    #[serde(rename = "@colourByViewer", default)]
    pub colour_by_viewer: bool,
    #[serde(rename = "@visible", default = "default_true")]
    pub visible: bool,
    /// Archive entry holding the viewer's native session.
    #[serde(rename = "@sessionFile", default, skip_serializing_if = "Option::is_none")]
    pub session_entry: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RnaViewerDoc {
    #[serde(rename = "@viewId")]
    pub viewer_id: String,
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@x")]
    pub x: i32,
    #[serde(rename = "@y")]
    pub y: i32,
    #[serde(rename = "@width")]
    pub width: i32,
    #[serde(rename = "@height")]
    pub height: i32,
    #[serde(rename = "@dividerLocation", default)]
    pub divider_location: i32,
    #[serde(rename = "@selectedRna", default)]
    pub selected_index: i32,
    #[serde(rename = "secondaryStructure", default)]
    pub structures: Vec<SecondaryStructureDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecondaryStructureDoc {
    #[serde(rename = "@annotationId")]
    pub annotation_id: String,
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@gapped", default)]
    pub gapped: bool,
    /// Archive entry holding the model's viewer state.
    #[serde(rename = "@viewerState", default, skip_serializing_if = "Option::is_none")]
    pub state_entry: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupDoc {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@start")]
    pub start: i32,
    #[serde(rename = "@end")]
    pub end: i32,
    /// Scheme name, `ucs<N>` reference or the annotation gradient marker.
    #[serde(rename = "@colour", default, skip_serializing_if = "Option::is_none")]
    pub colour: Option<String>,
    #[serde(rename = "@outlineColour", default)]
    pub outline_colour: i32,
    #[serde(rename = "@pidThreshold", default)]
    pub pid_threshold: i32,
    #[serde(rename = "@consThreshold", default)]
    pub cons_threshold: i32,
    #[serde(rename = "@displayBoxes", default = "default_true")]
    pub display_boxes: bool,
    #[serde(rename = "@displayText", default = "default_true")]
    pub display_text: bool,
    #[serde(rename = "@colourText", default)]
    pub colour_text: bool,
    #[serde(rename = "@textCol1", default)]
    pub text_colour: i32,
    #[serde(rename = "@textCol2", default)]
    pub text_colour2: i32,
    #[serde(rename = "@textColThreshold", default)]
    pub text_colour_threshold: i32,
    #[serde(rename = "@showUnconserved", default)]
    pub show_unconserved: bool,
    #[serde(rename = "@ignoreGapsinConsensus", default = "default_true")]
    pub ignore_gaps_in_consensus: bool,
    #[serde(rename = "@showConsensusHistogram", default = "default_true")]
    pub show_consensus_histogram: bool,
    #[serde(rename = "@showSequenceLogo", default)]
    pub show_sequence_logo: bool,
    #[serde(rename = "@normaliseSequenceLogo", default)]
    pub normalise_sequence_logo: bool,
    #[serde(rename = "seq", default)]
    pub sequences: Vec<String>,
    #[serde(rename = "annotationColours", default, skip_serializing_if = "Option::is_none")]
    pub annotation_colours: Option<AnnotationColoursDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationColoursDoc {
    #[serde(rename = "@annotation")]
    pub annotation: String,
    #[serde(rename = "@annotationId", default, skip_serializing_if = "Option::is_none")]
    pub annotation_id: Option<String>,
    #[serde(rename = "@minColour")]
    pub min_colour: i32,
    #[serde(rename = "@maxColour")]
    pub max_colour: i32,
    #[serde(rename = "@aboveThreshold", default)]
    pub above_threshold: i32,
    #[serde(rename = "@threshold", default)]
    pub threshold: f32,
    #[serde(rename = "@colourScheme", default, skip_serializing_if = "Option::is_none")]
    pub colour_scheme: Option<String>,
    #[serde(rename = "@perSequence", default)]
    pub per_sequence: bool,
    #[serde(rename = "@predefinedColours", default)]
    pub predefined_colours: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportDoc {
    #[serde(rename = "@title")]
    pub title: String,
    #[serde(rename = "@sequenceSetId")]
    pub sequence_set_id: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@viewName", default, skip_serializing_if = "Option::is_none")]
    pub view_name: Option<String>,
    #[serde(rename = "@complementId", default, skip_serializing_if = "Option::is_none")]
    pub complement_id: Option<String>,
    #[serde(rename = "@gatheredViews", default)]
    pub gathered_views: bool,
    #[serde(rename = "@x")]
    pub x: i32,
    #[serde(rename = "@y")]
    pub y: i32,
    #[serde(rename = "@width")]
    pub width: i32,
    #[serde(rename = "@height")]
    pub height: i32,
    #[serde(rename = "@startRes", default)]
    pub start_res: i32,
    #[serde(rename = "@startSeq", default)]
    pub start_seq: i32,
    #[serde(rename = "@bgColour", default, skip_serializing_if = "Option::is_none")]
    pub bg_colour: Option<String>,
    #[serde(rename = "@applyToAllGroups", default = "default_true")]
    pub apply_to_all_groups: bool,
    #[serde(rename = "@fontName", default)]
    pub font_name: String,
    #[serde(rename = "@fontSize", default)]
    pub font_size: i32,
    #[serde(rename = "@fontStyle", default)]
    pub font_style: i32,
    #[serde(rename = "@conservationSelected", default)]
    pub conservation_selected: bool,
    #[serde(rename = "@pidSelected", default)]
    pub pid_selected: bool,
    #[serde(rename = "@consThreshold", default)]
    pub cons_threshold: i32,
    #[serde(rename = "@conservationIncrement", default)]
    pub conservation_increment: i32,
    #[serde(rename = "@showFullId", default = "default_true")]
    pub show_full_id: bool,
    #[serde(rename = "@rightAlignIds", default)]
    pub right_align_ids: bool,
    #[serde(rename = "@showText", default = "default_true")]
    pub show_text: bool,
    #[serde(rename = "@showColourText", default)]
    pub show_colour_text: bool,
    #[serde(rename = "@showBoxes", default = "default_true")]
    pub show_boxes: bool,
    #[serde(rename = "@showUnconserved", default)]
    pub show_unconserved: bool,
    #[serde(rename = "@wrapAlignment", default)]
    pub wrap_alignment: bool,
    #[serde(rename = "@renderGaps", default = "default_true")]
    pub render_gaps: bool,
    #[serde(rename = "@showSequenceFeatures", default)]
    pub show_sequence_features: bool,
    #[serde(rename = "@showAnnotation", default = "default_true")]
    pub show_annotation: bool,
    #[serde(rename = "@showConsensusHistogram", default = "default_true")]
    pub show_consensus_histogram: bool,
    #[serde(rename = "@showSequenceLogo", default)]
    pub show_sequence_logo: bool,
    #[serde(rename = "@normaliseSequenceLogo", default)]
    pub normalise_sequence_logo: bool,
    #[serde(rename = "@ignoreGapsinConsensus", default = "default_true")]
    pub ignore_gaps_in_consensus: bool,
    #[serde(rename = "@textCol1", default)]
    pub text_colour: i32,
    #[serde(rename = "@textCol2", default)]
    pub text_colour2: i32,
    #[serde(rename = "@textColThreshold", default)]
    pub text_colour_threshold: i32,
    #[serde(rename = "@idWidth", default, skip_serializing_if = "Option::is_none")]
    pub id_width: Option<i32>,
    #[serde(rename = "@scaleProteinAsCdna", default = "default_true")]
    pub scale_protein_as_cdna: bool,
    #[serde(rename = "@followHighlight", default = "default_true")]
    pub follow_highlight: bool,
    #[serde(rename = "annotationColours", default, skip_serializing_if = "Option::is_none")]
    pub annotation_colours: Option<AnnotationColoursDoc>,
    #[serde(rename = "hiddenColumns", default)]
    pub hidden_columns: Vec<RangeDoc>,
    #[serde(rename = "calcIdParam", default)]
    pub calc_params: Vec<CalcIdParamDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalcIdParamDoc {
    #[serde(rename = "@calcId")]
    pub calc_id: String,
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@description", default)]
    pub description: String,
    #[serde(rename = "@autoUpdate", default)]
    pub auto_update: bool,
    #[serde(rename = "@needsUpdate", default)]
    pub needs_update: bool,
    #[serde(rename = "serviceURL", default)]
    pub service_urls: Vec<String>,
    #[serde(rename = "parameters", default)]
    pub parameters: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserColoursDoc {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "colour", default)]
    pub colours: Vec<ResidueColourDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidueColourDoc {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@rgb")]
    pub rgb: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSettingsDoc {
    #[serde(rename = "@transparency", default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<f32>,
    #[serde(rename = "setting", default)]
    pub settings: Vec<SettingDoc>,
    #[serde(rename = "featureGroup", default)]
    pub groups: Vec<FeatureGroupDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingDoc {
    #[serde(rename = "@type")]
    pub feature_type: String,
    /// Simple colour, or the max colour of a graduated colour.
    #[serde(rename = "@colour")]
    pub colour: String,
    #[serde(rename = "@display", default = "default_true")]
    pub display: bool,
    #[serde(rename = "@order", default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f32>,
    #[serde(rename = "@min", default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(rename = "@max", default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(rename = "@minColour", default, skip_serializing_if = "Option::is_none")]
    pub min_colour: Option<String>,
    #[serde(rename = "@noValueColour", default, skip_serializing_if = "Option::is_none")]
    pub no_value_colour: Option<String>,
    #[serde(rename = "@threshold", default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    #[serde(rename = "@threshType", default, skip_serializing_if = "Option::is_none")]
    pub threshold_type: Option<String>,
    #[serde(rename = "@autoScale", default, skip_serializing_if = "Option::is_none")]
    pub auto_scale: Option<bool>,
    #[serde(rename = "@colourByLabel", default, skip_serializing_if = "Option::is_none")]
    pub colour_by_label: Option<bool>,
    #[serde(rename = "attributeName", default)]
    pub attribute_names: Vec<String>,
    #[serde(rename = "matcherSet", default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterNodeDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureGroupDoc {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@display")]
    pub display: bool,
}

/// Node of an encoded filter: a single condition or a two-branch compound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterNodeDoc {
    #[serde(rename = "matchCondition", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<MatchConditionDoc>,
    #[serde(rename = "compoundMatcher", default, skip_serializing_if = "Option::is_none")]
    pub compound: Option<Box<CompoundMatcherDoc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConditionDoc {
    #[serde(rename = "@by")]
    pub by: String,
    #[serde(rename = "@condition")]
    pub condition: String,
    #[serde(rename = "@value", default)]
    pub value: String,
    #[serde(rename = "attributeName", default)]
    pub attribute_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundMatcherDoc {
    #[serde(rename = "@and")]
    pub and: bool,
    #[serde(rename = "matcherSet", default)]
    pub branches: Vec<FilterNodeDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeDoc {
    #[serde(rename = "@id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@x")]
    pub x: i32,
    #[serde(rename = "@y")]
    pub y: i32,
    #[serde(rename = "@width")]
    pub width: i32,
    #[serde(rename = "@height")]
    pub height: i32,
    #[serde(rename = "@fontName", default)]
    pub font_name: String,
    #[serde(rename = "@fontSize", default)]
    pub font_size: i32,
    #[serde(rename = "@fontStyle", default)]
    pub font_style: i32,
    #[serde(rename = "@threshold", default)]
    pub threshold: f32,
    #[serde(rename = "@fitToWindow", default)]
    pub fit_to_window: bool,
    #[serde(rename = "@currentTree", default)]
    pub current_tree: bool,
    #[serde(rename = "@markUnlinked", default)]
    pub mark_unlinked: bool,
    #[serde(rename = "@showBootstrap", default)]
    pub show_bootstrap: bool,
    #[serde(rename = "@showDistances", default)]
    pub show_distances: bool,
    #[serde(rename = "@linkToAllViews", default)]
    pub link_to_all_views: bool,
    #[serde(rename = "newick", default)]
    pub newick: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcaViewerDoc {
    #[serde(rename = "@title", default)]
    pub title: String,
    #[serde(rename = "@x")]
    pub x: i32,
    #[serde(rename = "@y")]
    pub y: i32,
    #[serde(rename = "@width")]
    pub width: i32,
    #[serde(rename = "@height")]
    pub height: i32,
    #[serde(rename = "@scoreModelName", default)]
    pub score_model: String,
    #[serde(rename = "@xDim", default)]
    pub x_dim: i32,
    #[serde(rename = "@yDim", default)]
    pub y_dim: i32,
    #[serde(rename = "@zDim", default)]
    pub z_dim: i32,
    #[serde(rename = "@bgColour", default)]
    pub bg_colour: i32,
    #[serde(rename = "@scaleFactor", default)]
    pub scale_factor: f32,
    #[serde(rename = "@showLabels", default)]
    pub show_labels: bool,
    #[serde(rename = "@linkToAllViews", default)]
    pub link_to_all_views: bool,
    #[serde(rename = "similarityParams")]
    pub similarity: SimilarityParamsDoc,
    #[serde(rename = "sequencePoint", default)]
    pub sequence_points: Vec<SequencePointDoc>,
    #[serde(rename = "axis", default)]
    pub axes: Vec<PointDoc>,
    #[serde(rename = "seqPointMin")]
    pub seq_point_min: PointDoc,
    #[serde(rename = "seqPointMax")]
    pub seq_point_max: PointDoc,
    #[serde(rename = "pcaData")]
    pub data: PcaDataDoc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityParamsDoc {
    #[serde(rename = "@includeGaps")]
    pub include_gaps: bool,
    #[serde(rename = "@matchGaps")]
    pub match_gaps: bool,
    #[serde(rename = "@includeGappedColumns")]
    pub include_gapped_columns: bool,
    #[serde(rename = "@denominateByShortestLength")]
    pub denominate_by_shortest_length: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PointDoc {
    #[serde(rename = "@xPos")]
    pub x: f32,
    #[serde(rename = "@yPos")]
    pub y: f32,
    #[serde(rename = "@zPos")]
    pub z: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequencePointDoc {
    #[serde(rename = "@sequenceRef")]
    pub sequence_ref: String,
    #[serde(rename = "@xPos")]
    pub x: f32,
    #[serde(rename = "@yPos")]
    pub y: f32,
    #[serde(rename = "@zPos")]
    pub z: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PcaDataDoc {
    #[serde(rename = "pairwiseMatrix")]
    pub pairwise: DoubleMatrixDoc,
    #[serde(rename = "tridiagonalMatrix")]
    pub tridiagonal: DoubleMatrixDoc,
    #[serde(rename = "eigenMatrix")]
    pub eigen: DoubleMatrixDoc,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoubleMatrixDoc {
    #[serde(rename = "@rows")]
    pub rows: usize,
    #[serde(rename = "@columns")]
    pub columns: usize,
    #[serde(rename = "row", default)]
    pub row: Vec<DoubleVectorDoc>,
    #[serde(rename = "D", default, skip_serializing_if = "Option::is_none")]
    pub d: Option<DoubleVectorDoc>,
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    pub e: Option<DoubleVectorDoc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoubleVectorDoc {
    #[serde(rename = "v", default)]
    pub values: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> ProjectDoc {
        let mut set = SequenceSetDoc {
            dataset_id: "ds1".into(),
            gap_char: "-".into(),
            ..Default::default()
        };
        set.sequences.push(SequenceDoc {
            id: "sq1".into(),
            name: "seq one".into(),
            start: 1,
            end: 4,
            dataset_sequence_id: Some("sq2".into()),
            description: None,
            residues: "AC-GT".into(),
            dbrefs: Vec::new(),
        });
        let mut doc = ProjectDoc::new("1.0.0", set);
        doc.rows.push(RowDoc {
            id: "sq1".into(),
            start: 1,
            end: 4,
            hidden_sequences: vec![2, 3],
            ..Default::default()
        });
        doc
    }

    #[test]
    fn test_document_xml_round_trip() {
        let doc = minimal();
        let xml = doc.to_xml().expect("serialize");
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<project version=\"1.0.0\""));
        assert!(xml.contains("dsseqid=\"sq2\""));
        let back = ProjectDoc::from_xml(&xml).expect("parse");
        assert_eq!(back, doc);
        assert!(back.is_dataset_only());
    }

    #[test]
    fn test_missing_version_is_a_document_error() {
        let xml = "<project><sequenceModel><sequenceSet datasetId=\"\"/></sequenceModel></project>";
        assert!(ProjectDoc::from_xml(xml).is_err());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(ProjectDoc::from_xml("<notaproject").is_err());
    }
}
