mod common;

use std::io::Cursor;

use alnproj_core::document::ProjectDoc;
use alnproj_core::model::*;
use alnproj_core::{
    copy_view, load_project, save_project, write_views, ArchiveSink, ArchiveSource, HeadlessHost, HostEvent,
    LoadOptions, SaveSession, WriteOptions,
};
use common::{build_workspace, or_filter};
use tempfile::NamedTempFile;

fn save_fixture(ws: &Workspace) -> NamedTempFile {
    let out = NamedTempFile::new().expect("create temp archive");
    let mut host = HeadlessHost::new();
    let report = save_project(ws, &mut host, out.path(), &WriteOptions::default()).expect("save project");
    assert_eq!(report.error_message, None);
    assert_eq!(report.views, 2);
    assert_eq!(report.datasets, 2);
    out
}

#[test]
fn round_trip_restores_views_and_content() {
    let fixture = build_workspace();
    let archive = save_fixture(&fixture.ws);

    let mut ws = Workspace::new();
    let mut host = HeadlessHost::new();
    let report = load_project(&mut ws, &mut host, archive.path(), &LoadOptions::default()).expect("load project");
    assert_eq!(report.error_message, None);
    assert_eq!(report.views.len(), 2);
    assert_eq!(report.resolution.remaining(), 0);
    assert_eq!(host.views_added().len(), 2);

    let dna = ws.find_view_by_title("data/first.fa").expect("dna view");
    let view = &ws.views[dna];
    let residues: Vec<&str> = view
        .alignment
        .sequences
        .iter()
        .map(|s| ws.sequences[*s].residues.as_str())
        .collect();
    assert_eq!(residues, vec!["ATG-AAACCC", "ATGAAA-CCC"]);
    assert_eq!(view.hidden_columns, vec![[2, 3]]);
    assert_eq!(view.colour, Some(ColourScheme::named("Nucleotide")));
    assert!(view.sequence_set_id.starts_with("set1"));

    let first = view.alignment.sequences[0];
    let root = ws.dataset_root(first);
    assert_ne!(root, first);
    assert_eq!(ws.sequences[root].residues, "ATGAAACCC");
    let features = &ws.sequences[root].features;
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].score, 2.5);
    assert_eq!(features[0].links.len(), 1);
    assert_eq!(ws.sequences[root].dbrefs.len(), 1);
    assert_eq!(ws.sequences[root].structures[0].id, "1abc");

    // consensus is rebuilt, the secondary structure row keeps its cells
    let labels: Vec<&str> = view
        .alignment
        .annotations
        .iter()
        .map(|a| ws.annotations[*a].label.as_str())
        .collect();
    assert_eq!(labels, vec!["Consensus", "Secondary structure"]);
    let secondary = &ws.annotations[view.alignment.annotations[1]];
    assert_eq!(secondary.sequence_ref, Some(first));
    let cells = secondary.cells.as_ref().expect("cells");
    assert_eq!(cells.len(), 4);
    assert_eq!(cells[0].as_ref().and_then(|c| c.secondary_structure), Some('H'));
    assert!(cells[1].is_none());
    assert!(ws.annotations[view.alignment.annotations[0]].id.is_none());

    let settings = view.feature_settings.as_ref().expect("feature settings");
    assert_eq!(settings.types[0].filter, Some(or_filter()));
    assert_eq!(settings.transparency, Some(0.8));
    assert_eq!(view.row_colours.get(&view.alignment.sequences[1]), Some(&Rgb::new(255, 200, 0)));
}

#[test]
fn user_colours_are_shared_between_groups() {
    let fixture = build_workspace();
    let archive = save_fixture(&fixture.ws);

    let mut source = ArchiveSource::open(archive.path()).expect("open archive");
    let xml = source.read_text("first.fa.xml").expect("dna view entry");
    let doc = ProjectDoc::from_xml(&xml).expect("parse view document");
    assert_eq!(doc.user_colours.len(), 1);
    assert!(doc.groups.iter().all(|g| g.colour.as_deref() == Some("ucs0")));

    let mut ws = Workspace::new();
    let mut host = HeadlessHost::new();
    load_project(&mut ws, &mut host, archive.path(), &LoadOptions::default()).expect("load project");
    let dna = ws.find_view_by_title("data/first.fa").expect("dna view");
    let groups = &ws.views[dna].alignment.groups;
    assert_eq!(groups.len(), 2);
    for g in groups {
        assert_eq!(ws.groups[*g].colour, Some(ColourScheme::User(fixture.scheme.clone())));
    }
}

#[test]
fn views_of_one_dataset_share_it_after_load() {
    let mut fixture = build_workspace();
    let ws = &mut fixture.ws;
    let rows: Vec<SeqId> = ws.views[fixture.dna_view].alignment.sequences.clone();
    let copies: Vec<SeqId> = rows
        .iter()
        .map(|s| {
            let mut copy = ws.sequences[*s].clone();
            copy.dataset_sequence = Some(ws.dataset_root(*s));
            copy.annotations.clear();
            ws.add_sequence(copy)
        })
        .collect();
    let other = View::new("other.fa", "set3", Alignment::new(copies).with_dataset(fixture.dataset)).with_view_id("v3");
    ws.add_view(other);

    let out = NamedTempFile::new().expect("temp archive");
    let mut host = HeadlessHost::new();
    let report = save_project(ws, &mut host, out.path(), &WriteOptions::default()).expect("save");
    assert_eq!(report.datasets, 2);

    let mut loaded = Workspace::new();
    let report = load_project(&mut loaded, &mut host, out.path(), &LoadOptions::default()).expect("load");
    assert_eq!(report.datasets.len(), 2);
    let a = loaded.find_view_by_title("data/first.fa").expect("first");
    let b = loaded.find_view_by_title("other.fa").expect("other");
    assert_eq!(loaded.views[a].alignment.dataset, loaded.views[b].alignment.dataset);
    let root_a = loaded.dataset_root(loaded.views[a].alignment.sequences[0]);
    let root_b = loaded.dataset_root(loaded.views[b].alignment.sequences[0]);
    assert_eq!(root_a, root_b);
    let ds = loaded.views[a].alignment.dataset.expect("dataset");
    assert_eq!(loaded.datasets[ds].sequences.len(), 2);
}

#[test]
fn complements_are_paired_and_viewers_restored() {
    let fixture = build_workspace();
    let archive = save_fixture(&fixture.ws);

    let mut ws = Workspace::new();
    let mut host = HeadlessHost::new();
    let report = load_project(&mut ws, &mut host, archive.path(), &LoadOptions::default()).expect("load");

    let dna = ws.find_view_by_title("data/first.fa").expect("dna view");
    let protein = ws.find_view_by_title("second.fa").expect("protein view");
    assert_eq!(host.split_frames(), vec![SplitFrame { dna, protein }]);

    let trees: Vec<&TreeViewer> = ws
        .viewers
        .iter()
        .filter_map(|(_, v)| match v {
            AuxViewer::Tree(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].view, protein);
    assert!(trees[0].id.as_deref().is_some_and(|id| id.starts_with("tree1")));

    let structure = ws
        .viewers
        .iter()
        .find_map(|(_, v)| match v {
            AuxViewer::Structure(s) => Some(s),
            _ => None,
        })
        .expect("structure viewer");
    assert!(structure.viewer_id.starts_with("sv1"));
    assert_eq!(structure.views, vec![dna]);
    assert_eq!(structure.colour_with, vec![dna]);
    let session = structure.session_file.as_ref().expect("staged session");
    assert_eq!(std::fs::read(session).expect("read session"), b"viewer session state");
    let file = structure.bindings[0].file.as_ref().expect("staged structure");
    assert!(std::fs::read_to_string(file).expect("read pdb").starts_with("HEADER"));

    assert!(host.events.contains(&HostEvent::UiTask));
    let opened = host
        .events
        .iter()
        .filter(|e| matches!(e, HostEvent::ViewerOpened { .. }))
        .count();
    assert_eq!(opened, 2);

    let staged = report.staged_files;
    assert_eq!(staged.len(), 2);
    let path = session.clone();
    drop(staged);
    assert!(!path.exists());
}

#[test]
fn loading_twice_gives_independent_graphs() {
    let fixture = build_workspace();
    let archive = save_fixture(&fixture.ws);

    let mut ws = Workspace::new();
    let mut host = HeadlessHost::new();
    let first = load_project(&mut ws, &mut host, archive.path(), &LoadOptions::default()).expect("first load");
    let second = load_project(&mut ws, &mut host, archive.path(), &LoadOptions::default()).expect("second load");

    assert_eq!(ws.view_order().len(), 4);
    assert!(first.datasets.iter().all(|ds| !second.datasets.contains(ds)));
    let set_a = &ws.views[first.views[0]].sequence_set_id;
    let set_b = &ws.views[second.views[0]].sequence_set_id;
    assert_ne!(set_a, set_b);
    let rows_a = &ws.views[first.views[0]].alignment.sequences;
    let rows_b = &ws.views[second.views[0]].alignment.sequences;
    assert!(rows_a.iter().all(|s| !rows_b.contains(s)));
}

#[test]
fn copy_view_makes_a_sibling_over_the_same_dataset() {
    let mut fixture = build_workspace();
    let mut host = HeadlessHost::new();
    let original = fixture.dna_view;
    let copy = copy_view(&mut fixture.ws, &mut host, original, Some("copy of first")).expect("copy view");

    let ws = &fixture.ws;
    assert_ne!(copy, original);
    let (a, b) = (&ws.views[original], &ws.views[copy]);
    assert_eq!(b.title, "copy of first");
    assert_eq!(a.sequence_set_id, b.sequence_set_id);
    assert_ne!(a.view_id, b.view_id);
    assert_eq!(a.alignment.dataset, b.alignment.dataset);
    assert_eq!(a.alignment.sequences, b.alignment.sequences);
    assert_eq!(a.history, b.history);
    assert_eq!(ws.views_in_set(&a.sequence_set_id), vec![original, copy]);
    assert_eq!(ws.datasets.len(), 2);
    let root = ws.dataset_root(a.alignment.sequences[0]);
    assert_eq!(ws.sequences[root].features.len(), 1);
    assert_eq!(host.views_added(), vec![copy]);
}

#[test]
fn write_views_reports_only_this_call() {
    let fixture = build_workspace();
    let mut host = HeadlessHost::new();
    let mut sink = ArchiveSink::new(Cursor::new(Vec::new()));
    let options = WriteOptions {
        embed_structure_files: false,
        embed_viewer_sessions: false,
        ..WriteOptions::default()
    };
    let mut session = SaveSession::new(options);
    let report = write_views(&fixture.ws, &mut host, &[fixture.protein_view], &mut sink, &mut session);
    assert_eq!(report.entries, vec!["second.fa.xml", "alnproj Dataset for second.fa.xml"]);
    assert_eq!(report.error_message, None);
}

#[test]
fn skipped_sequence_sets_are_left_out_on_save_and_load() {
    let fixture = build_workspace();
    let mut host = HeadlessHost::new();
    let mut sink = ArchiveSink::new(Cursor::new(Vec::new()));
    let mut options = WriteOptions {
        embed_structure_files: false,
        embed_viewer_sessions: false,
        ..WriteOptions::default()
    };
    options.skip_sequence_sets.insert("set2".to_string());
    let mut session = SaveSession::new(options);
    let views = [fixture.dna_view, fixture.protein_view];
    let report = write_views(&fixture.ws, &mut host, &views, &mut sink, &mut session);
    assert_eq!(report.views, 1);
    assert_eq!(report.datasets, 1);
    assert!(!report.entries.iter().any(|e| e.starts_with("second.fa")));

    let archive = save_fixture(&fixture.ws);
    let mut options = LoadOptions::default();
    options.skip_sequence_sets.insert("set1".to_string());
    let mut ws = Workspace::new();
    let report = load_project(&mut ws, &mut host, archive.path(), &options).expect("load");
    assert_eq!(report.excluded, 1);
    assert_eq!(report.views.len(), 1);
    assert!(ws.find_view_by_title("data/first.fa").is_none());
    assert!(ws.find_view_by_title("second.fa").is_some());
}
