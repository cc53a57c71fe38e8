//! Alignment annotation rows

use super::colour::Rgb;
use super::{GroupId, SeqId};

/// Labels of rows that are always recalculated rather than restored.
pub const RECALCULATED_LABELS: &[&str] = &["Quality", "Conservation", "Consensus"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphType {
    #[default]
    None,
    Bar,
    Line,
}

impl GraphType {
    pub fn code(self) -> i32 {
        match self {
            GraphType::None => 0,
            GraphType::Bar => 1,
            GraphType::Line => 2,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            1 => GraphType::Bar,
            2 => GraphType::Line,
            _ => GraphType::None,
        }
    }
}

/// One cell of an annotation row.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub display_character: Option<String>,
    pub description: Option<String>,
    pub secondary_structure: Option<char>,
    pub value: f32,
    pub colour: Option<Rgb>,
}

impl Annotation {
    pub fn value(value: f32) -> Self {
        Self {
            display_character: None,
            description: None,
            secondary_structure: None,
            value,
            colour: None,
        }
    }

    pub fn symbol(display: impl Into<String>, secondary_structure: Option<char>) -> Self {
        Self {
            display_character: Some(display.into()),
            description: None,
            secondary_structure,
            value: f32::NAN,
            colour: None,
        }
    }
}

/// Horizontal threshold line drawn on a graph row.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphLine {
    pub value: f32,
    pub label: String,
    pub colour: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRow {
    pub id: Option<String>,
    pub label: String,
    pub description: String,
    /// Per-column cells; `None` for score-only rows.
    pub cells: Option<Vec<Option<Annotation>>>,
    pub graph_type: GraphType,
    pub graph_group: i32,
    pub graph_height: i32,
    pub threshold: Option<GraphLine>,
    pub score: Option<f64>,
    pub calc_id: Option<String>,
    pub properties: Vec<(String, String)>,
    pub visible: bool,
    pub centre_column_labels: bool,
    pub scale_column_labels: bool,
    pub show_all_column_labels: bool,
    pub below_alignment: bool,
    pub auto_calculated: bool,
    pub sequence_ref: Option<SeqId>,
    pub group_ref: Option<GroupId>,
}

impl AnnotationRow {
    pub fn new(label: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            label: label.into(),
            description: description.into(),
            cells: None,
            graph_type: GraphType::None,
            graph_group: -1,
            graph_height: 40,
            threshold: None,
            score: None,
            calc_id: None,
            properties: Vec::new(),
            visible: true,
            centre_column_labels: false,
            scale_column_labels: false,
            show_all_column_labels: false,
            below_alignment: true,
            auto_calculated: false,
            sequence_ref: None,
            group_ref: None,
        }
    }

    pub fn with_cells(mut self, cells: Vec<Option<Annotation>>) -> Self {
        self.cells = Some(cells);
        self
    }

    pub fn auto_calculated(mut self) -> Self {
        self.auto_calculated = true;
        self
    }

    /// Auto-calculated rows and the standard recalculated labels are rebuilt on load.
    pub fn is_recalculated(&self) -> bool {
        self.auto_calculated || RECALCULATED_LABELS.contains(&self.label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recalculated_rows() {
        assert!(AnnotationRow::new("Consensus", "").is_recalculated());
        assert!(AnnotationRow::new("Custom", "").auto_calculated().is_recalculated());
        assert!(!AnnotationRow::new("Custom", "").is_recalculated());
    }

    #[test]
    fn test_graph_type_codes() {
        for t in [GraphType::None, GraphType::Bar, GraphType::Line] {
            assert_eq!(GraphType::from_code(t.code()), t);
        }
    }
}
