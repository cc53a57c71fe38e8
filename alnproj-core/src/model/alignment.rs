//! Datasets and the aligned row sets drawn from them

use super::{AnnotationId, CodonFrameId, DatasetId, GroupId, SeqId};

/// Pool of dataset sequences shared by one or more views.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub sequences: Vec<SeqId>,
    pub codon_frames: Vec<CodonFrameId>,
    /// Rows stored with the dataset rather than a view.
    pub annotations: Vec<AnnotationId>,
    pub properties: Vec<(String, String)>,
}

impl Dataset {
    pub fn new(sequences: Vec<SeqId>) -> Self {
        Self {
            sequences,
            ..Default::default()
        }
    }

    pub fn contains(&self, seq: SeqId) -> bool {
        self.sequences.contains(&seq)
    }

    /// Puts `seq` at `position`, moving any sequence already there to the end.
    ///
    /// `seq` is first taken out of its old position if present. Positions at
    /// or past the end append.
    pub fn place_at(&mut self, position: usize, seq: SeqId) {
        let current = self.sequences.iter().position(|s| *s == seq);
        if current == Some(position) {
            return;
        }
        if let Some(current) = current {
            self.sequences.remove(current);
        }
        if position < self.sequences.len() {
            let displaced = std::mem::replace(&mut self.sequences[position], seq);
            self.sequences.push(displaced);
        } else {
            self.sequences.push(seq);
        }
    }
}

/// Ordered rows of one view plus the annotation and groups on them.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub sequences: Vec<SeqId>,
    pub dataset: Option<DatasetId>,
    pub annotations: Vec<AnnotationId>,
    pub groups: Vec<GroupId>,
    pub properties: Vec<(String, String)>,
    pub gap_char: char,
    /// Reference sequence for the view, if one is set.
    pub reference: Option<SeqId>,
}

impl Alignment {
    pub fn new(sequences: Vec<SeqId>) -> Self {
        Self {
            sequences,
            dataset: None,
            annotations: Vec::new(),
            groups: Vec::new(),
            properties: Vec::new(),
            gap_char: '-',
            reference: None,
        }
    }

    pub fn with_dataset(mut self, dataset: DatasetId) -> Self {
        self.dataset = Some(dataset);
        self
    }

    pub fn height(&self) -> usize {
        self.sequences.len()
    }
}
