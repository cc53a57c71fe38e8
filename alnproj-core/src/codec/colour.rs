//! User colour scheme and feature colour encoding

use crate::document::{ResidueColourDoc, SettingDoc, UserColoursDoc};
use crate::error::{ArchiveError, ArchiveResult};
use crate::model::{FeatureColour, GraduatedColour, NoValueColour, Rgb, ThresholdType, UserColourScheme};

/// Residue symbols, in the order of a user colour table.
pub const RESIDUE_NAMES: [&str; 28] = [
    "A", "R", "N", "D", "C", "Q", "E", "G", "H", "I", "L", "K", "M", "F", "P", "S", "T", "W", "Y",
    "V", "B", "Z", "X", "_", "*", ".", " ", "U",
];

/// Entries in the base colour table.
pub const BASE_COLOURS: usize = 24;
/// Entries in the lower-case extension table.
pub const LOWER_CASE_COLOURS: usize = 23;

/// Distinct user colour schemes seen during one write call.
///
/// Lookup is a linear `contains` scan by structural equality; tables are
/// small and schemes carry no hashable identity.
#[derive(Debug, Default, Clone)]
pub struct UserColourTable {
    schemes: Vec<UserColourScheme>,
}

impl UserColourTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `scheme`, registering it on first sight.
    pub fn register(&mut self, scheme: &UserColourScheme) -> String {
        let index = match self.schemes.iter().position(|s| s == scheme) {
            Some(index) => index,
            None => {
                self.schemes.push(scheme.clone());
                self.schemes.len() - 1
            }
        };
        format!("ucs{}", index)
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    pub fn to_docs(&self) -> Vec<UserColoursDoc> {
        self.schemes
            .iter()
            .enumerate()
            .map(|(i, s)| encode_user_colours(&format!("ucs{}", i), s))
            .collect()
    }
}

pub fn encode_user_colours(id: &str, scheme: &UserColourScheme) -> UserColoursDoc {
    let mut colours = Vec::with_capacity(BASE_COLOURS + LOWER_CASE_COLOURS);
    for (i, name) in RESIDUE_NAMES.iter().take(BASE_COLOURS).enumerate() {
        let colour = scheme.colours.get(i).copied().unwrap_or(Rgb::WHITE);
        colours.push(ResidueColourDoc {
            name: name.to_string(),
            rgb: colour.to_hex(),
        });
    }
    if let Some(lower) = &scheme.lower_case {
        for (i, name) in RESIDUE_NAMES.iter().take(LOWER_CASE_COLOURS).enumerate() {
            let colour = lower.get(i).copied().unwrap_or(Rgb::WHITE);
            colours.push(ResidueColourDoc {
                name: name.to_lowercase(),
                rgb: colour.to_hex(),
            });
        }
    }
    UserColoursDoc {
        id: id.to_string(),
        name: scheme.name.clone(),
        colours,
    }
}

pub fn decode_user_colours(doc: &UserColoursDoc) -> ArchiveResult<UserColourScheme> {
    if doc.colours.len() < BASE_COLOURS {
        return Err(ArchiveError::document(
            doc.id.clone(),
            format!("user colour table has {} entries, expected {}", doc.colours.len(), BASE_COLOURS),
        ));
    }
    let colours = parse_table(&doc.colours[..BASE_COLOURS])?;
    let lower_case = if doc.colours.len() > BASE_COLOURS {
        let end = (BASE_COLOURS + LOWER_CASE_COLOURS).min(doc.colours.len());
        Some(parse_table(&doc.colours[BASE_COLOURS..end])?)
    } else {
        None
    };
    Ok(UserColourScheme {
        name: doc.name.clone(),
        colours,
        lower_case,
    })
}

/// Finds and decodes `ucs<N>` among a document's user colour tables.
pub fn find_user_colours(docs: &[UserColoursDoc], id: &str) -> ArchiveResult<UserColourScheme> {
    docs.iter()
        .find(|d| d.id == id)
        .ok_or_else(|| ArchiveError::MissingEntry(format!("user colours {}", id)))
        .and_then(decode_user_colours)
}

fn parse_table(entries: &[ResidueColourDoc]) -> ArchiveResult<Vec<Rgb>> {
    entries
        .iter()
        .map(|e| Rgb::from_hex(&e.rgb).ok_or_else(|| ArchiveError::Colour(e.rgb.clone())))
        .collect()
}

/// Writes a feature colour into the colour fields of a setting.
pub fn encode_feature_colour(colour: &FeatureColour, setting: &mut SettingDoc) {
    match colour {
        FeatureColour::Simple(rgb) => setting.colour = rgb.to_hex(),
        FeatureColour::Graduated(g) => {
            setting.colour = g.max_colour.to_hex();
            setting.min_colour = Some(g.min_colour.to_hex());
            setting.min = Some(g.min);
            setting.max = Some(g.max);
            setting.auto_scale = Some(g.auto_scale);
            setting.colour_by_label = Some(g.colour_by_label);
            setting.threshold = Some(g.threshold);
            setting.threshold_type = Some(
                match g.threshold_type {
                    ThresholdType::None => "NONE",
                    ThresholdType::Above => "ABOVE",
                    ThresholdType::Below => "BELOW",
                }
                .to_string(),
            );
            setting.no_value_colour = Some(
                match g.no_value {
                    NoValueColour::None => "NONE",
                    NoValueColour::Min => "MIN",
                    NoValueColour::Max => "MAX",
                }
                .to_string(),
            );
            setting.attribute_names = g.attribute.iter().take(2).cloned().collect();
        }
    }
}

pub fn decode_feature_colour(setting: &SettingDoc) -> ArchiveResult<FeatureColour> {
    let max_colour = Rgb::from_hex(&setting.colour).ok_or_else(|| ArchiveError::Colour(setting.colour.clone()))?;
    let Some(max) = setting.max else {
        return Ok(FeatureColour::Simple(max_colour));
    };
    let min_colour = match &setting.min_colour {
        Some(hex) => Rgb::from_hex(hex).ok_or_else(|| ArchiveError::Colour(hex.clone()))?,
        None => Rgb::WHITE,
    };
    let mut graduated = GraduatedColour::new(min_colour, max_colour, setting.min.unwrap_or(0.0), max);
    graduated.no_value = match setting.no_value_colour.as_deref() {
        None | Some("NONE") => NoValueColour::None,
        Some("MIN") => NoValueColour::Min,
        Some("MAX") => NoValueColour::Max,
        Some(other) => return Err(ArchiveError::unknown("no-value colour", other)),
    };
    graduated.threshold_type = match setting.threshold_type.as_deref() {
        None | Some("NONE") => ThresholdType::None,
        Some("ABOVE") => ThresholdType::Above,
        Some("BELOW") => ThresholdType::Below,
        Some(other) => return Err(ArchiveError::unknown("threshold type", other)),
    };
    if let Some(auto_scale) = setting.auto_scale {
        graduated.auto_scale = auto_scale;
    }
    if let Some(by_label) = setting.colour_by_label {
        graduated.colour_by_label = by_label;
    }
    if let Some(threshold) = setting.threshold {
        graduated.threshold = threshold;
    }
    graduated.attribute = setting.attribute_names.clone();
    Ok(FeatureColour::Graduated(graduated))
}
