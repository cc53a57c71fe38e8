//! Colours and colour schemes

use std::fmt;

use super::AnnotationId;

/// 24-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb(pub u32);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xffffff);
    pub const BLACK: Rgb = Rgb(0x000000);

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Parses a hex string with no prefix (`"ff0000"`), as used in documents.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        u32::from_str_radix(hex, 16).ok().map(|v| Rgb(v & 0xffffff))
    }

    pub fn to_hex(self) -> String {
        format!("{:06x}", self.0 & 0xffffff)
    }

    /// Packed ARGB integer with full alpha.
    pub fn to_argb(self) -> i32 {
        (0xff00_0000u32 | self.0) as i32
    }

    pub fn from_argb(value: i32) -> Self {
        Rgb(value as u32 & 0xffffff)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.to_hex())
    }
}

/// User-defined residue colours.
///
/// The base table has one colour per entry of
/// [`RESIDUE_NAMES`](crate::codec::colour::RESIDUE_NAMES); the optional
/// lower-case table overrides colours for lower-case residues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserColourScheme {
    pub name: Option<String>,
    pub colours: Vec<Rgb>,
    pub lower_case: Option<Vec<Rgb>>,
}

impl UserColourScheme {
    pub fn new(colours: Vec<Rgb>) -> Self {
        Self {
            name: None,
            colours,
            lower_case: None,
        }
    }

    pub fn with_lower_case(mut self, lower: Vec<Rgb>) -> Self {
        self.lower_case = Some(lower);
        self
    }
}

/// Colour by annotation value between a min and max colour.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationColourScheme {
    pub annotation: Option<AnnotationId>,
    /// Label of the annotation row, used when no row handle is known.
    pub annotation_label: String,
    pub min_colour: Rgb,
    pub max_colour: Rgb,
    pub above_threshold: i32,
    pub threshold: f32,
    /// Name of a residue scheme used instead of the gradient, if any.
    pub base_scheme: Option<String>,
    pub per_sequence: bool,
    pub predefined_colours: bool,
}

/// Colouring applied to a view or group.
#[derive(Debug, Clone, PartialEq)]
pub enum ColourScheme {
    /// Built-in scheme referred to by name, e.g. `"Clustal"`.
    Named(String),
    User(UserColourScheme),
    Annotation(Box<AnnotationColourScheme>),
}

impl ColourScheme {
    pub fn named(name: impl Into<String>) -> Self {
        ColourScheme::Named(name.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThresholdType {
    #[default]
    None,
    Above,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoValueColour {
    #[default]
    None,
    Min,
    Max,
}

/// Colour of one feature type: either plain or graduated by score/attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureColour {
    Simple(Rgb),
    Graduated(GraduatedColour),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraduatedColour {
    pub min_colour: Rgb,
    pub max_colour: Rgb,
    pub no_value: NoValueColour,
    pub min: f32,
    pub max: f32,
    pub auto_scale: bool,
    pub colour_by_label: bool,
    pub threshold: f32,
    pub threshold_type: ThresholdType,
    /// Attribute name and optional sub-attribute to colour by.
    pub attribute: Vec<String>,
}

impl GraduatedColour {
    pub fn new(min_colour: Rgb, max_colour: Rgb, min: f32, max: f32) -> Self {
        Self {
            min_colour,
            max_colour,
            no_value: NoValueColour::None,
            min,
            max,
            auto_scale: true,
            colour_by_label: false,
            threshold: f32::NAN,
            threshold_type: ThresholdType::None,
            attribute: Vec::new(),
        }
    }
}
