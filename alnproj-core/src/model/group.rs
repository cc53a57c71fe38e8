//! Sequence groups

use super::colour::{ColourScheme, Rgb};
use super::{AnnotationId, SeqId};

/// Named subset of a view's rows over a column range.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceGroup {
    pub name: String,
    pub sequences: Vec<SeqId>,
    pub start_res: i32,
    pub end_res: i32,
    pub colour: Option<ColourScheme>,
    pub pid_threshold: i32,
    pub conservation_threshold: i32,
    pub outline_colour: Rgb,
    pub display_boxes: bool,
    pub display_text: bool,
    pub colour_text: bool,
    pub text_colour: Rgb,
    pub text_colour2: Rgb,
    pub text_colour_threshold: i32,
    pub show_unconserved: bool,
    pub ignore_gaps_in_consensus: bool,
    pub show_consensus_histogram: bool,
    pub show_sequence_logo: bool,
    pub normalise_sequence_logo: bool,
    pub consensus_row: Option<AnnotationId>,
    pub conservation_row: Option<AnnotationId>,
}

impl SequenceGroup {
    pub fn new(name: impl Into<String>, sequences: Vec<SeqId>, start_res: i32, end_res: i32) -> Self {
        Self {
            name: name.into(),
            sequences,
            start_res,
            end_res,
            colour: None,
            pid_threshold: 0,
            conservation_threshold: 0,
            outline_colour: Rgb::BLACK,
            display_boxes: true,
            display_text: true,
            colour_text: false,
            text_colour: Rgb::BLACK,
            text_colour2: Rgb::WHITE,
            text_colour_threshold: 0,
            show_unconserved: false,
            ignore_gaps_in_consensus: true,
            show_consensus_histogram: true,
            show_sequence_logo: false,
            normalise_sequence_logo: false,
            consensus_row: None,
            conservation_row: None,
        }
    }

    pub fn with_colour(mut self, colour: ColourScheme) -> Self {
        self.colour = Some(colour);
        self
    }
}
