//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use alnproj_core::document::{ProjectDoc, RowDoc, SequenceDoc, SequenceSetDoc, ViewportDoc};
use alnproj_core::model::*;
use alnproj_core::{read_archive, ArchiveSink, ArchiveSource, HeadlessHost, LoadOptions, LoadReport, LoadSession};
use tempfile::NamedTempFile;

pub struct Fixture {
    pub ws: Workspace,
    pub dna_view: ViewId,
    pub protein_view: ViewId,
    pub dataset: DatasetId,
    pub scheme: UserColourScheme,
    /// Structure and session files referenced by the workspace.
    pub files: Vec<NamedTempFile>,
}

pub fn user_scheme() -> UserColourScheme {
    UserColourScheme::new((0..24u8).map(|i| Rgb::new(i * 10, 255 - i * 10, 128)).collect())
}

pub fn or_filter() -> FeatureMatcherSet {
    let mut set = FeatureMatcherSet::new();
    set.or(FeatureMatcher::by_label(Condition::Contains, "kinase")).unwrap();
    set.or(FeatureMatcher::by_score(Condition::Gt, "1.0")).unwrap();
    set.or(FeatureMatcher::by_attribute(Condition::Eq, "T", &["CSQ", "Allele"]))
        .unwrap();
    set
}

fn temp_file(contents: &[u8], suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().expect("temp file");
    file.write_all(contents).expect("write temp file");
    file
}

/// A nucleotide view and a protein view paired as complements, over two
/// datasets, with features, annotation, groups, a tree and a structure
/// viewer.
pub fn build_workspace() -> Fixture {
    let mut ws = Workspace::new();
    let scheme = user_scheme();

    let s1 = ws.add_sequence(Sequence::new("dna1", "ATG-AAACCC").with_description("first dna"));
    let s2 = ws.add_sequence(Sequence::new("dna2", "ATGAAA-CCC"));
    let dataset = ws.create_dataset(&[s1, s2]);
    let root1 = ws.dataset_root(s1);

    let mut feature = SequenceFeature::new("Domain", "kinase", 1, 6)
        .with_score(2.5)
        .with_group("pfam");
    feature.links.push("EMBL|http://example.org/$SEQUENCE_ID$".to_string());
    let mut csq = BTreeMap::new();
    csq.insert("Allele".to_string(), "T".to_string());
    feature.attributes.insert("CSQ".to_string(), AttributeValue::Map(csq));
    ws.sequences[root1].features.push(feature);
    ws.sequences[root1].dbrefs.push(DbRef::new("EMBL", "1", "X12345"));

    let pdb = temp_file(b"HEADER    TEST STRUCTURE\nATOM      1  N   MET A   1\n", ".pdb");
    let session = temp_file(b"viewer session state", ".session");
    let mut entry = StructureEntry::new("1abc");
    entry.entry_type = Some("PDB".to_string());
    entry.file = Some(pdb.path().to_path_buf());
    ws.sequences[root1].structures.push(entry);

    let mut secondary = AnnotationRow::new("Secondary structure", "predicted").with_cells(vec![
        Some(Annotation::symbol("H", Some('H'))),
        None,
        None,
        Some(Annotation::value(0.5)),
    ]);
    secondary.id = Some("ss1".to_string());
    secondary.sequence_ref = Some(s1);
    let secondary = ws.annotations.insert(secondary);
    ws.sequences[s1].annotations.push(secondary);
    let consensus = ws
        .annotations
        .insert(AnnotationRow::new("Consensus", "PID").auto_calculated());

    let g1 = ws
        .groups
        .insert(SequenceGroup::new("both", vec![s1, s2], 0, 5).with_colour(ColourScheme::User(scheme.clone())));
    let g2 = ws
        .groups
        .insert(SequenceGroup::new("first", vec![s1], 2, 8).with_colour(ColourScheme::User(scheme.clone())));

    let mut alignment = Alignment::new(vec![s1, s2]).with_dataset(dataset);
    alignment.annotations = vec![consensus, secondary];
    alignment.groups = vec![g1, g2];
    let mut dna = View::new("data/first.fa", "set1", alignment).with_view_id("v1");
    dna.complement_id = Some("v2".to_string());
    dna.hidden_columns = vec![[2, 3]];
    dna.colour = Some(ColourScheme::named("Nucleotide"));
    dna.history = Some(ws.histories.insert(EditHistory::default()));
    dna.row_colours.insert(s2, Rgb::new(255, 200, 0));
    dna.feature_settings = Some(FeatureSettings {
        types: vec![FeatureTypeSettings {
            feature_type: "Domain".to_string(),
            colour: FeatureColour::Graduated(GraduatedColour::new(Rgb::WHITE, Rgb::new(255, 0, 0), 0.0, 5.0)),
            filter: Some(or_filter()),
            display: true,
            order: Some(0.5),
        }],
        groups: vec![("pfam".to_string(), true)],
        transparency: Some(0.8),
    });
    let dna_view = ws.add_view(dna);

    let p1 = ws.add_sequence(Sequence::new("prot1", "M-KP"));
    let protein_dataset = ws.create_dataset(&[p1]);
    let mut protein = View::new("second.fa", "set2", Alignment::new(vec![p1]).with_dataset(protein_dataset))
        .with_view_id("v2");
    protein.complement_id = Some("v1".to_string());
    let protein_view = ws.add_view(protein);

    let mut tree = TreeViewer::new(protein_view, "Neighbour joining", "(prot1:0.1);");
    tree.id = Some("tree1".to_string());
    ws.viewers.insert(AuxViewer::Tree(tree));

    let mut viewer = StructureViewer::new("sv1", "JMOL", Geometry::new(10, 20, 300, 300));
    viewer.bindings.push(StructureBinding {
        structure_id: "1abc".to_string(),
        file: Some(pdb.path().to_path_buf()),
        sequences: vec![root1],
    });
    viewer.views.push(dna_view);
    viewer.colour_with.push(dna_view);
    viewer.session_file = Some(session.path().to_path_buf());
    ws.viewers.insert(AuxViewer::Structure(viewer));

    Fixture {
        ws,
        dna_view,
        protein_view,
        dataset,
        scheme,
        files: vec![pdb, session],
    }
}

/// Archive bytes holding `docs` in the given order.
pub fn archive_of(docs: &[(&str, ProjectDoc)]) -> Vec<u8> {
    let mut sink = ArchiveSink::new(Cursor::new(Vec::new()));
    for (name, doc) in docs {
        let xml = doc.to_xml().expect("serialize document");
        sink.write_entry(name, xml.as_bytes()).expect("write entry");
    }
    sink.finish().expect("finish archive").into_inner()
}

pub fn read_bytes(bytes: Vec<u8>, ws: &mut Workspace, host: &mut HeadlessHost) -> LoadReport {
    let mut source = ArchiveSource::new(Cursor::new(bytes)).expect("open archive");
    let mut session = LoadSession::new(LoadOptions::default());
    read_archive(&mut source, ws, host, &mut session).expect("read archive")
}

pub fn sequence_doc(id: &str, name: &str, residues: &str, dsseqid: Option<&str>) -> SequenceDoc {
    let end = residues.chars().filter(|c| *c != '-').count() as i32;
    SequenceDoc {
        id: id.to_string(),
        name: name.to_string(),
        start: 1,
        end,
        dataset_sequence_id: dsseqid.map(str::to_string),
        description: None,
        residues: residues.to_string(),
        dbrefs: Vec::new(),
    }
}

pub fn dataset_doc(dataset_id: &str, sequences: Vec<SequenceDoc>) -> ProjectDoc {
    let set = SequenceSetDoc {
        dataset_id: dataset_id.to_string(),
        gap_char: "-".to_string(),
        sequences,
        ..Default::default()
    };
    ProjectDoc::new("1.0.0", set)
}

/// View document with one row per declared sequence.
pub fn view_doc(dataset_id: &str, set_id: &str, view_id: &str, sequences: Vec<SequenceDoc>, rows: &[&str]) -> ProjectDoc {
    let mut doc = dataset_doc(dataset_id, sequences);
    doc.rows = rows
        .iter()
        .map(|id| RowDoc {
            id: id.to_string(),
            colour: Rgb::WHITE.to_argb(),
            ..Default::default()
        })
        .collect();
    doc.viewport = Some(ViewportDoc {
        title: format!("{} view", view_id),
        sequence_set_id: set_id.to_string(),
        id: view_id.to_string(),
        font_name: "SansSerif".to_string(),
        font_size: 10,
        ..Default::default()
    });
    doc
}
