//! Archive writer
//!
//! Views are grouped into windows by sequence-set id and written one
//! document per view, windows in reverse order. Each distinct dataset is
//! then written once as its own document. Side entries (structure files,
//! viewer sessions) are copied as the documents that reference them are
//! built.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archive::{compression_method, ArchiveSink};
use crate::codec::{encode_feature_colour, encode_filter, encode_matrix, UserColourTable};
use crate::document::*;
use crate::error::{ArchiveError, ArchiveResult, ErrorLog};
use crate::host::Host;
use crate::model::{
    AnnotationId, AttributeValue, AuxViewer, ColourScheme, DatasetId, DbRef, FeatureSettings, GroupId,
    MappingId, PcaViewer, Rgb, SeqId, SequenceFeature, StructureEntry, StructureViewer, TreeViewer, View,
    ViewId, Workspace,
};
use crate::registry::IdentityRegistry;
use crate::VERSION;

/// Colour attribute value marking an annotation-driven scheme.
pub const ANNOTATION_COLOUR_GRADIENT: &str = "AnnotationColourGradient";

/// Prefix for feature hyperlinks stored as extra data.
pub const LINK_KEY_PREFIX: &str = "LINK_";

fn default_compression() -> String {
    "deflated".to_string()
}

fn default_true() -> bool {
    true
}

fn default_base_name() -> String {
    "alnproj".to_string()
}

/// Options for a save call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// `deflated` or `stored`.
    #[serde(default = "default_compression")]
    pub compression: String,
    #[serde(default = "default_true")]
    pub embed_structure_files: bool,
    #[serde(default = "default_true")]
    pub embed_viewer_sessions: bool,
    /// Leading part of dataset entry names.
    #[serde(default = "default_base_name")]
    pub base_name: String,
    /// Sequence-set ids whose views are left out of the archive.
    #[serde(default)]
    pub skip_sequence_sets: BTreeSet<String>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: default_compression(),
            embed_structure_files: true,
            embed_viewer_sessions: true,
            base_name: default_base_name(),
            skip_sequence_sets: BTreeSet::new(),
        }
    }
}

/// State carried through one save call.
#[derive(Debug, Default)]
pub struct SaveSession {
    pub registry: IdentityRegistry,
    pub options: WriteOptions,
    written_sequences: HashSet<String>,
    features_written: HashSet<SeqId>,
    saved_dataset_sequences: HashSet<SeqId>,
    structure_entries: HashMap<String, String>,
    names_used: Vec<String>,
    rna_counter: usize,
    errors: ErrorLog,
}

impl SaveSession {
    pub fn new(options: WriteOptions) -> Self {
        Self::with_registry(IdentityRegistry::new(), options)
    }

    /// Session reusing ids already assigned, e.g. by an earlier load.
    pub fn with_registry(registry: IdentityRegistry, options: WriteOptions) -> Self {
        Self {
            registry,
            options,
            ..Default::default()
        }
    }

    pub fn into_registry(self) -> IdentityRegistry {
        self.registry
    }

    pub fn error_message(&self) -> Option<&str> {
        self.errors.message()
    }

    fn note(&mut self, message: String) {
        log::warn!("{}", message);
        self.errors.push(message);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Entries written by this call, in order.
    pub entries: Vec<String>,
    pub views: usize,
    pub datasets: usize,
    pub error_message: Option<String>,
}

/// Saves every open view to a new archive file.
pub fn save_project<P: AsRef<Path>>(
    ws: &Workspace,
    host: &mut dyn Host,
    path: P,
    options: &WriteOptions,
) -> ArchiveResult<WriteReport> {
    let method = compression_method(&options.compression)?;
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut sink = ArchiveSink::with_compression(file, method);
    let mut session = SaveSession::new(options.clone());
    let views = host.open_views(ws);
    let report = write_views(ws, host, &views, &mut sink, &mut session);
    if !sink.is_closed() {
        sink.finish()?.flush()?;
    }
    log::info!(
        "Saved {} views and {} datasets to {}",
        report.views,
        report.datasets,
        path.as_ref().display()
    );
    Ok(report)
}

/// Writes `views` and their datasets into `sink`.
///
/// The first failure stops the call; entries already written stay in the
/// sink and the failure is returned in the report's message.
pub fn write_views<W: Write + Seek>(
    ws: &Workspace,
    host: &mut dyn Host,
    views: &[ViewId],
    sink: &mut ArchiveSink<W>,
    session: &mut SaveSession,
) -> WriteReport {
    let first_entry = sink.entry_names().len();
    let mut report = WriteReport::default();
    let skip = &session.options.skip_sequence_sets;
    let views: Vec<ViewId> = views
        .iter()
        .copied()
        .filter(|v| match ws.views.get(*v) {
            Some(view) if skip.contains(&view.sequence_set_id) => {
                log::debug!("Skipping view {} of sequence set {}", view.title, view.sequence_set_id);
                false
            }
            _ => true,
        })
        .collect();

    session.saved_dataset_sequences = views
        .iter()
        .filter_map(|v| ws.views.get(*v).and_then(|view| view.alignment.dataset))
        .filter_map(|ds| ws.datasets.get(ds))
        .flat_map(|ds| ds.sequences.iter().copied())
        .collect();

    if let Err(e) = write_all(ws, host, &views, sink, session, &mut report) {
        let message = match &e {
            ArchiveError::OutOfMemory(_) => format!("Ran out of memory while saving project: {}", e),
            _ => format!("Failed to save project: {}", e),
        };
        log::error!("{}", message);
        session.errors.push(message);
    }

    report.entries = sink.entry_names()[first_entry..].to_vec();
    report.error_message = std::mem::take(&mut session.errors).into_message();
    report
}

fn write_all<W: Write + Seek>(
    ws: &Workspace,
    host: &mut dyn Host,
    views: &[ViewId],
    sink: &mut ArchiveSink<W>,
    session: &mut SaveSession,
    report: &mut WriteReport,
) -> ArchiveResult<()> {
    let windows = group_windows(ws, views);
    let mut datasets: Vec<(DatasetId, String)> = Vec::new();

    for window in windows.iter().rev() {
        let Some(first) = window.first().and_then(|v| ws.views.get(*v)) else {
            continue;
        };
        let short_name = make_filename(&first.title, &mut session.names_used);
        for (index, &view) in window.iter().enumerate() {
            let entry = if window.len() == 1 {
                short_name.clone()
            } else {
                format!("{}{}", index, short_name)
            };
            let doc = DocumentBuilder::new(ws, host, sink, session).view_document(view)?;
            sink.write_entry(&entry, doc.to_xml()?.as_bytes())?;
            report.views += 1;

            if let Some(ds) = ws.views[view].alignment.dataset {
                if !datasets.iter().any(|(d, _)| *d == ds) {
                    datasets.push((ds, strip_path(&ws.views[view].title).to_string()));
                }
            }
        }
    }

    for (ds, title) in datasets {
        let mut entry = format!("{} Dataset for {}", session.options.base_name, title);
        if !entry.ends_with(".xml") {
            entry.push_str(".xml");
        }
        let entry = make_filename(&entry, &mut session.names_used);
        let doc = DocumentBuilder::new(ws, host, sink, session).dataset_document(ds)?;
        sink.write_entry(&entry, doc.to_xml()?.as_bytes())?;
        report.datasets += 1;
    }
    Ok(())
}

/// Views grouped by sequence-set id, in first-seen order.
fn group_windows(ws: &Workspace, views: &[ViewId]) -> Vec<Vec<ViewId>> {
    let mut windows: Vec<(String, Vec<ViewId>)> = Vec::new();
    for &view in views {
        let Some(v) = ws.views.get(view) else {
            continue;
        };
        match windows.iter_mut().find(|(set, _)| *set == v.sequence_set_id) {
            Some((_, members)) => members.push(view),
            None => windows.push((v.sequence_set_id.clone(), vec![view])),
        }
    }
    windows.into_iter().map(|(_, members)| members).collect()
}

fn strip_path(title: &str) -> &str {
    match title.rfind(['/', '\\']) {
        Some(i) => &title[i + 1..],
        None => title,
    }
}

/// Entry name for a window title: path stripped, made unique with an
/// `_<n>` suffix, `.xml` appended.
pub fn make_filename(title: &str, names_used: &mut Vec<String>) -> String {
    let base = strip_path(title);
    let base = base.strip_suffix(".xml").unwrap_or(base);
    let mut name = base.to_string();
    let mut count = 1;
    while names_used.contains(&name) {
        name = format!("{}_{}", base, count);
        count += 1;
    }
    names_used.push(name.clone());
    format!("{}.xml", name)
}

/// Builds one document, copying side entries into the sink as needed.
struct DocumentBuilder<'a, W: Write + Seek> {
    ws: &'a Workspace,
    host: &'a mut dyn Host,
    sink: &'a mut ArchiveSink<W>,
    session: &'a mut SaveSession,
    colours: UserColourTable,
}

impl<'a, W: Write + Seek> DocumentBuilder<'a, W> {
    fn new(ws: &'a Workspace, host: &'a mut dyn Host, sink: &'a mut ArchiveSink<W>, session: &'a mut SaveSession) -> Self {
        Self {
            ws,
            host,
            sink,
            session,
            colours: UserColourTable::new(),
        }
    }

    fn new_document(&self, set: SequenceSetDoc) -> ProjectDoc {
        let mut doc = ProjectDoc::new(VERSION, set);
        doc.creation_date = Some(chrono::Utc::now().to_rfc3339());
        doc
    }

    fn view_document(mut self, view_id: ViewId) -> ArchiveResult<ProjectDoc> {
        let ws = self.ws;
        let view = &ws.views[view_id];
        let alignment = &view.alignment;
        let dataset_id = match alignment.dataset {
            Some(ds) => self.session.registry.dataset_id(ds),
            None => String::new(),
        };

        let mut set = SequenceSetDoc {
            dataset_id,
            gap_char: alignment.gap_char.to_string(),
            properties: alignment.properties.iter().map(|(k, v)| PropertyDoc::new(k, v)).collect(),
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(alignment.height());
        for &seq in &alignment.sequences {
            let id = self.session.registry.sequence_id(seq);
            if self.session.written_sequences.insert(id.clone()) {
                set.sequences.push(self.sequence_doc(seq, &id)?);
            }
            rows.push(self.row_doc(view_id, view, seq, &id)?);
        }
        for &row in &alignment.annotations {
            set.annotations.push(self.annotation_doc(row, false));
        }

        let mut doc = self.new_document(set);
        doc.rows = rows;
        doc.groups = alignment.groups.iter().map(|g| self.group_doc(*g)).collect();
        doc.viewport = Some(self.viewport_doc(view));
        doc.feature_settings = view.feature_settings.as_ref().map(|fs| self.feature_settings_doc(fs));
        for viewer in ws.viewers_for(view_id) {
            match &ws.viewers[viewer] {
                AuxViewer::Tree(tree) => doc.trees.push(self.tree_doc(tree)),
                AuxViewer::Pca(pca) => doc.pca_viewers.push(self.pca_doc(pca)),
                // written per row
                AuxViewer::Structure(_) | AuxViewer::Rna(_) => {}
            }
        }
        doc.user_colours = self.colours.to_docs();
        Ok(doc)
    }

    fn dataset_document(mut self, ds: DatasetId) -> ArchiveResult<ProjectDoc> {
        let ws = self.ws;
        let dataset = &ws.datasets[ds];
        let mut set = SequenceSetDoc {
            dataset_id: self.session.registry.dataset_id(ds),
            gap_char: "-".to_string(),
            properties: dataset.properties.iter().map(|(k, v)| PropertyDoc::new(k, v)).collect(),
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(dataset.sequences.len());
        for &seq in &dataset.sequences {
            let id = self.session.registry.sequence_id(seq);
            self.session.written_sequences.insert(id.clone());
            set.sequences.push(self.sequence_doc(seq, &id)?);
            rows.push(self.dataset_row_doc(seq, &id)?);
        }
        for &frame in &dataset.codon_frames {
            let Some(frame) = ws.codon_frames.get(frame) else {
                continue;
            };
            let mut maps = Vec::with_capacity(frame.mappings.len());
            for cm in &frame.mappings {
                maps.push(CodonMapDoc {
                    dna_sequence: self.session.registry.sequence_id(cm.dna),
                    mapping: self.mapping_doc(cm.mapping)?,
                });
            }
            set.codon_frames.push(CodonFrameDoc { maps });
        }
        for &row in &dataset.annotations {
            if !ws.annotations.get(row).is_some_and(|r| r.auto_calculated) {
                set.annotations.push(self.annotation_doc(row, true));
            }
        }
        let mut doc = self.new_document(set);
        doc.rows = rows;
        doc.user_colours = self.colours.to_docs();
        Ok(doc)
    }

    fn sequence_doc(&mut self, seq: SeqId, id: &str) -> ArchiveResult<SequenceDoc> {
        let ws = self.ws;
        let s = &ws.sequences[seq];
        let root = ws.dataset_root(seq);
        let dataset_sequence_id = if root == seq {
            id.to_string()
        } else {
            self.session.registry.sequence_id(root)
        };
        let mut doc = SequenceDoc {
            id: id.to_string(),
            name: s.name.clone(),
            start: s.start,
            end: s.end,
            dataset_sequence_id: Some(dataset_sequence_id),
            description: s.description.clone(),
            residues: s.residues.clone(),
            dbrefs: Vec::new(),
        };
        if s.is_dataset_sequence() {
            for dbref in &s.dbrefs {
                doc.dbrefs.push(self.dbref_doc(dbref)?);
            }
        }
        Ok(doc)
    }

    fn dbref_doc(&mut self, dbref: &DbRef) -> ArchiveResult<DbRefDoc> {
        Ok(DbRefDoc {
            source: dbref.source.clone(),
            version: dbref.version.clone(),
            accession: dbref.accession.clone(),
            locus: dbref.locus,
            canonical: dbref.canonical,
            mapping: dbref.map.map(|m| self.mapping_doc(m)).transpose()?,
        })
    }

    /// Targets that will be declared somewhere in this archive are written
    /// by id; anything else is written inline.
    fn mapping_doc(&mut self, mapping: MappingId) -> ArchiveResult<MappingDoc> {
        let ws = self.ws;
        let m = ws
            .mappings
            .get(mapping)
            .ok_or_else(|| ArchiveError::document("mapping", format!("stale mapping handle {:?}", mapping)))?;
        let ranges = |r: &[[i32; 2]]| -> Vec<RangeDoc> {
            r.iter().map(|[start, end]| RangeDoc { start: *start, end: *end }).collect()
        };
        let mut doc = MappingDoc {
            from_unit: m.map.from_ratio,
            to_unit: m.map.to_ratio,
            dseq_for: None,
            from: ranges(&m.map.from_ranges),
            to: ranges(&m.map.to_ranges),
            sequence: None,
        };
        if let Some(target) = m.to {
            let root = ws.dataset_root(target);
            let known = self
                .session
                .registry
                .existing_sequence_id(root)
                .is_some_and(|id| self.session.written_sequences.contains(id));
            if known || self.session.saved_dataset_sequences.contains(&root) {
                doc.dseq_for = Some(self.session.registry.sequence_id(root));
            } else {
                let id = self.session.registry.sequence_id(root);
                self.session.written_sequences.insert(id.clone());
                let t = &ws.sequences[root];
                doc.sequence = Some(Box::new(SequenceDoc {
                    id: id.clone(),
                    name: t.name.clone(),
                    start: t.start,
                    end: t.end,
                    dataset_sequence_id: Some(id),
                    description: t.description.clone(),
                    residues: t.residues.clone(),
                    dbrefs: Vec::new(),
                }));
            }
        }
        Ok(doc)
    }

    fn row_doc(&mut self, view_id: ViewId, view: &View, seq: SeqId, id: &str) -> ArchiveResult<RowDoc> {
        let ws = self.ws;
        let s = &ws.sequences[seq];
        let mut row = RowDoc {
            id: id.to_string(),
            start: s.start,
            end: s.end,
            colour: view.row_colours.get(&seq).copied().unwrap_or(Rgb::WHITE).to_argb(),
            hidden: view.is_hidden(seq),
            view_reference: view.alignment.reference == Some(seq),
            ..Default::default()
        };
        if let Some(group) = view.hidden_group_for(seq) {
            row.hidden_sequences = group
                .members
                .iter()
                .filter_map(|m| view.alignment.sequences.iter().position(|s| s == m))
                .collect();
        }
        let root = ws.dataset_root(seq);
        if self.session.features_written.insert(root) {
            row.features = ws.sequences[root].features.iter().map(feature_doc).collect();
        }
        for entry in &ws.sequences[root].structures {
            let structure = self.structure_doc(view_id, seq, root, entry)?;
            row.structures.push(structure);
        }
        for viewer in ws.viewers_for(view_id) {
            if let AuxViewer::Rna(rna) = &ws.viewers[viewer] {
                let models: Vec<_> = rna.models.iter().filter(|m| m.sequence == seq || m.sequence == root).collect();
                if models.is_empty() {
                    continue;
                }
                let mut doc = RnaViewerDoc {
                    viewer_id: rna.viewer_id.clone(),
                    title: rna.title.clone(),
                    x: rna.geometry.x,
                    y: rna.geometry.y,
                    width: rna.geometry.width,
                    height: rna.geometry.height,
                    divider_location: rna.divider_location,
                    selected_index: rna.selected_index,
                    structures: Vec::new(),
                };
                for model in models {
                    let own = ws.annotations.get(model.annotation).and_then(|a| a.id.clone());
                    let annotation_id = self.session.registry.annotation_id(model.annotation, own.as_deref());
                    let state_entry = match &model.state_file {
                        Some(path) if self.session.options.embed_viewer_sessions => {
                            self.session.rna_counter += 1;
                            let name = format!("rna_{}_{}", rna.viewer_id, self.session.rna_counter);
                            self.embed(&name, path)?
                        }
                        _ => None,
                    };
                    doc.structures.push(SecondaryStructureDoc {
                        annotation_id,
                        title: model.title.clone(),
                        gapped: model.gapped,
                        state_entry,
                    });
                }
                row.rna_viewers.push(doc);
            }
        }
        Ok(row)
    }

    fn dataset_row_doc(&mut self, seq: SeqId, id: &str) -> ArchiveResult<RowDoc> {
        let ws = self.ws;
        let s = &ws.sequences[seq];
        let mut row = RowDoc {
            id: id.to_string(),
            start: s.start,
            end: s.end,
            colour: Rgb::WHITE.to_argb(),
            ..Default::default()
        };
        if self.session.features_written.insert(seq) {
            row.features = s.features.iter().map(feature_doc).collect();
        }
        for entry in &s.structures {
            let file = self.structure_file(entry)?;
            row.structures.push(StructureDoc {
                id: entry.id.clone(),
                entry_type: entry.entry_type.clone(),
                file,
                properties: entry.properties.iter().map(|(k, v)| PropertyDoc::new(k, v)).collect(),
                states: Vec::new(),
            });
        }
        Ok(row)
    }

    fn structure_doc(&mut self, view_id: ViewId, seq: SeqId, root: SeqId, entry: &StructureEntry) -> ArchiveResult<StructureDoc> {
        let ws = self.ws;
        let file = self.structure_file(entry)?;
        let mut doc = StructureDoc {
            id: entry.id.clone(),
            entry_type: entry.entry_type.clone(),
            file,
            properties: entry.properties.iter().map(|(k, v)| PropertyDoc::new(k, v)).collect(),
            states: Vec::new(),
        };
        for viewer in ws.viewers_for(view_id) {
            if let AuxViewer::Structure(sv) = &ws.viewers[viewer] {
                if sv.binds(&entry.id, seq) || sv.binds(&entry.id, root) {
                    let session_entry = self.viewer_session(sv)?;
                    doc.states.push(StructureStateDoc {
                        viewer_id: Some(sv.viewer_id.clone()),
                        viewer_type: sv.viewer_type.clone(),
                        title: (!sv.title.is_empty()).then(|| sv.title.clone()),
                        x: sv.geometry.x,
                        y: sv.geometry.y,
                        width: sv.geometry.width,
                        height: sv.geometry.height,
                        align_with_view: sv.align_with.contains(&view_id),
                        colour_with_view: sv.colour_with.contains(&view_id),
                        colour_by_viewer: sv.colour_by_viewer,
                        visible: sv.visible,
                        session_entry,
                    });
                }
            }
        }
        Ok(doc)
    }

    /// Entry name for a structure's file, copying it on first use.
    fn structure_file(&mut self, entry: &StructureEntry) -> ArchiveResult<Option<String>> {
        if let Some(name) = self.session.structure_entries.get(&entry.id) {
            return Ok(Some(name.clone()));
        }
        let Some(path) = entry.file.as_ref() else {
            return Ok(None);
        };
        if !self.session.options.embed_structure_files {
            return Ok(Some(path.display().to_string()));
        }
        let short = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| entry.id.clone());
        let name = self.embed(&short, path)?;
        if let Some(name) = &name {
            self.session.structure_entries.insert(entry.id.clone(), name.clone());
        }
        Ok(name)
    }

    fn viewer_session(&mut self, viewer: &StructureViewer) -> ArchiveResult<Option<String>> {
        if !self.session.options.embed_viewer_sessions {
            return Ok(None);
        }
        let name = format!("viewer_{}", viewer.viewer_id);
        if self.sink.contains(&name) {
            return Ok(Some(name));
        }
        match self.host.save_structure_session(viewer) {
            Ok(Some(path)) => self.embed(&name, &path),
            Ok(None) => Ok(None),
            Err(e) => {
                self.session
                    .note(format!("Could not save session for viewer {}: {}", viewer.viewer_id, e));
                Ok(None)
            }
        }
    }

    /// Copies `path` in as `name`. A missing or unreadable source file is
    /// noted and skipped; a failed container write ends the save.
    fn embed(&mut self, name: &str, path: &Path) -> ArchiveResult<Option<String>> {
        match self.sink.copy_file(name, path) {
            Ok(_) => Ok(Some(name.to_string())),
            Err(e) if self.sink.is_closed() || e.is_fatal() && !matches!(e, ArchiveError::Io(_)) => Err(e),
            Err(e) => {
                self.session
                    .note(format!("Could not store {} as {}: {}", path.display(), name, e));
                Ok(None)
            }
        }
    }

    fn annotation_doc(&mut self, row: AnnotationId, dataset_only: bool) -> AnnotationDoc {
        let ws = self.ws;
        let a = &ws.annotations[row];
        let id = self.session.registry.annotation_id(row, a.id.as_deref());
        let mut doc = AnnotationDoc {
            id: Some(id),
            label: a.label.clone(),
            description: (!a.description.is_empty()).then(|| a.description.clone()),
            graph: a.graph_type != crate::model::GraphType::None,
            graph_type: a.graph_type.code(),
            graph_group: (a.graph_group >= 0).then_some(a.graph_group),
            graph_height: Some(a.graph_height),
            visible: a.visible,
            centre_column_labels: a.centre_column_labels,
            scale_column_labels: a.scale_column_labels,
            show_all_column_labels: a.show_all_column_labels,
            below_alignment: a.below_alignment,
            auto_calculated: a.auto_calculated,
            score: a.score,
            calc_id: a.calc_id.clone(),
            columns: None,
            sequence_ref: a.sequence_ref.map(|s| self.session.registry.sequence_id(s)),
            group_ref: a.group_ref.map(|g| self.session.registry.group_id(g)),
            threshold: a.threshold.as_ref().map(|t| ThresholdLineDoc {
                label: t.label.clone(),
                value: t.value,
                colour: t.colour.to_argb(),
            }),
            elements: Vec::new(),
            properties: a.properties.iter().map(|(k, v)| PropertyDoc::new(k, v)).collect(),
        };
        // auto-calculated rows are recomputed on load; only the header is kept
        if a.auto_calculated || dataset_only && a.is_recalculated() {
            return doc;
        }
        if let Some(cells) = &a.cells {
            doc.columns = Some(cells.len());
            for (position, cell) in cells.iter().enumerate() {
                let Some(cell) = cell else {
                    continue;
                };
                doc.elements.push(AnnotationElementDoc {
                    position,
                    display_character: cell.display_character.clone(),
                    description: cell.description.clone(),
                    secondary_structure: cell.secondary_structure.map(String::from),
                    value: (!cell.value.is_nan()).then_some(cell.value),
                    colour: cell.colour.map(Rgb::to_argb),
                });
            }
        }
        doc
    }

    fn group_doc(&mut self, group: GroupId) -> GroupDoc {
        let ws = self.ws;
        let g = &ws.groups[group];
        let (colour, annotation_colours) = match &g.colour {
            Some(scheme) => {
                let (name, gradient) = self.colour_ref(scheme);
                (Some(name), gradient)
            }
            None => (None, None),
        };
        GroupDoc {
            name: g.name.clone(),
            id: Some(self.session.registry.group_id(group)),
            start: g.start_res,
            end: g.end_res,
            colour,
            outline_colour: g.outline_colour.to_argb(),
            pid_threshold: g.pid_threshold,
            cons_threshold: g.conservation_threshold,
            display_boxes: g.display_boxes,
            display_text: g.display_text,
            colour_text: g.colour_text,
            text_colour: g.text_colour.to_argb(),
            text_colour2: g.text_colour2.to_argb(),
            text_colour_threshold: g.text_colour_threshold,
            show_unconserved: g.show_unconserved,
            ignore_gaps_in_consensus: g.ignore_gaps_in_consensus,
            show_consensus_histogram: g.show_consensus_histogram,
            show_sequence_logo: g.show_sequence_logo,
            normalise_sequence_logo: g.normalise_sequence_logo,
            sequences: g.sequences.iter().map(|s| self.session.registry.sequence_id(*s)).collect(),
            annotation_colours,
        }
    }

    /// Colour attribute for a scheme: its name, a `ucs<N>` reference, or
    /// the gradient marker plus its parameters.
    fn colour_ref(&mut self, scheme: &ColourScheme) -> (String, Option<AnnotationColoursDoc>) {
        match scheme {
            ColourScheme::Named(name) => (name.clone(), None),
            ColourScheme::User(user) => (self.colours.register(user), None),
            ColourScheme::Annotation(gradient) => {
                let annotation_id = gradient.annotation.map(|a| {
                    let own = self.ws.annotations.get(a).and_then(|r| r.id.clone());
                    self.session.registry.annotation_id(a, own.as_deref())
                });
                let doc = AnnotationColoursDoc {
                    annotation: gradient.annotation_label.clone(),
                    annotation_id,
                    min_colour: gradient.min_colour.to_argb(),
                    max_colour: gradient.max_colour.to_argb(),
                    above_threshold: gradient.above_threshold,
                    threshold: gradient.threshold,
                    colour_scheme: gradient.base_scheme.clone(),
                    per_sequence: gradient.per_sequence,
                    predefined_colours: gradient.predefined_colours,
                };
                (ANNOTATION_COLOUR_GRADIENT.to_string(), Some(doc))
            }
        }
    }

    fn viewport_doc(&mut self, view: &View) -> ViewportDoc {
        let (bg_colour, annotation_colours) = match &view.colour {
            Some(scheme) => {
                let (name, gradient) = self.colour_ref(scheme);
                (Some(name), gradient)
            }
            None => (None, None),
        };
        let style = &view.style;
        ViewportDoc {
            title: view.title.clone(),
            sequence_set_id: view.sequence_set_id.clone(),
            id: view.view_id.clone(),
            view_name: view.view_name.clone(),
            complement_id: view.complement_id.clone(),
            gathered_views: view.gather_here,
            x: view.geometry.x,
            y: view.geometry.y,
            width: view.geometry.width,
            height: view.geometry.height,
            start_res: view.start_res,
            start_seq: view.start_seq,
            bg_colour,
            apply_to_all_groups: view.background_colour_applies_to_all_groups,
            font_name: style.font.name.clone(),
            font_size: style.font.size,
            font_style: style.font.style,
            conservation_selected: style.conservation_selected,
            pid_selected: style.pid_selected,
            cons_threshold: style.consensus_threshold,
            conservation_increment: style.conservation_increment,
            show_full_id: style.show_full_id,
            right_align_ids: style.right_align_ids,
            show_text: style.show_text,
            show_colour_text: style.show_colour_text,
            show_boxes: style.show_boxes,
            show_unconserved: style.show_unconserved,
            wrap_alignment: style.wrap_alignment,
            render_gaps: style.render_gaps,
            show_sequence_features: style.show_sequence_features,
            show_annotation: style.show_annotation,
            show_consensus_histogram: style.show_consensus_histogram,
            show_sequence_logo: style.show_sequence_logo,
            normalise_sequence_logo: style.normalise_sequence_logo,
            ignore_gaps_in_consensus: style.ignore_gaps_in_consensus,
            text_colour: style.text_colour.to_argb(),
            text_colour2: style.text_colour2.to_argb(),
            text_colour_threshold: style.text_colour_threshold,
            id_width: style.id_width,
            scale_protein_as_cdna: style.scale_protein_as_cdna,
            follow_highlight: style.follow_highlight,
            annotation_colours,
            hidden_columns: view
                .hidden_columns
                .iter()
                .map(|[start, end]| RangeDoc { start: *start, end: *end })
                .collect(),
            calc_params: view
                .calc_params
                .iter()
                .map(|p| CalcIdParamDoc {
                    calc_id: p.calc_id.clone(),
                    version: p.version.clone(),
                    name: p.name.clone(),
                    description: p.description.clone(),
                    auto_update: p.auto_update,
                    needs_update: p.needs_update,
                    service_urls: p.service_urls.clone(),
                    parameters: p.parameters.clone(),
                })
                .collect(),
        }
    }

    fn feature_settings_doc(&self, settings: &FeatureSettings) -> FeatureSettingsDoc {
        FeatureSettingsDoc {
            transparency: settings.transparency,
            settings: settings
                .types
                .iter()
                .map(|t| {
                    let mut setting = SettingDoc {
                        feature_type: t.feature_type.clone(),
                        display: t.display,
                        order: t.order,
                        ..Default::default()
                    };
                    encode_feature_colour(&t.colour, &mut setting);
                    setting.filter = t.filter.as_ref().and_then(encode_filter);
                    setting
                })
                .collect(),
            groups: settings
                .groups
                .iter()
                .map(|(name, display)| FeatureGroupDoc {
                    name: name.clone(),
                    display: *display,
                })
                .collect(),
        }
    }

    fn tree_doc(&self, tree: &TreeViewer) -> TreeDoc {
        TreeDoc {
            id: tree.id.clone(),
            title: tree.title.clone(),
            x: tree.geometry.x,
            y: tree.geometry.y,
            width: tree.geometry.width,
            height: tree.geometry.height,
            font_name: tree.font.name.clone(),
            font_size: tree.font.size,
            font_style: tree.font.style,
            threshold: tree.threshold,
            fit_to_window: tree.fit_to_window,
            current_tree: tree.current_tree,
            mark_unlinked: tree.mark_unlinked,
            show_bootstrap: tree.show_bootstrap,
            show_distances: tree.show_distances,
            link_to_all_views: tree.link_to_all_views,
            newick: tree.newick.clone(),
        }
    }

    fn pca_doc(&mut self, pca: &PcaViewer) -> PcaViewerDoc {
        let point = |p: &[f32; 3]| PointDoc { x: p[0], y: p[1], z: p[2] };
        PcaViewerDoc {
            title: pca.title.clone(),
            x: pca.geometry.x,
            y: pca.geometry.y,
            width: pca.geometry.width,
            height: pca.geometry.height,
            score_model: pca.score_model.clone(),
            x_dim: pca.dimensions[0],
            y_dim: pca.dimensions[1],
            z_dim: pca.dimensions[2],
            bg_colour: pca.background.to_argb(),
            scale_factor: pca.scale_factor,
            show_labels: pca.show_labels,
            link_to_all_views: pca.link_to_all_views,
            similarity: SimilarityParamsDoc {
                include_gaps: pca.include_gaps,
                match_gaps: pca.match_gaps,
                include_gapped_columns: pca.include_gapped_columns,
                denominate_by_shortest_length: pca.denominate_by_shortest_length,
            },
            sequence_points: pca
                .sequence_points
                .iter()
                .map(|sp| SequencePointDoc {
                    sequence_ref: self.session.registry.sequence_id(sp.sequence),
                    x: sp.position[0],
                    y: sp.position[1],
                    z: sp.position[2],
                })
                .collect(),
            axes: pca.axes.iter().map(point).collect(),
            seq_point_min: point(&pca.seq_point_min),
            seq_point_max: point(&pca.seq_point_max),
            data: PcaDataDoc {
                pairwise: encode_matrix(&pca.pairwise),
                tridiagonal: encode_matrix(&pca.tridiagonal),
                eigen: encode_matrix(&pca.eigen),
            },
        }
    }
}

fn feature_doc(feature: &SequenceFeature) -> FeatureDoc {
    let mut other_data = Vec::new();
    for (i, link) in feature.links.iter().enumerate() {
        other_data.push(OtherDataDoc {
            key: format!("{}{}", LINK_KEY_PREFIX, i),
            key2: None,
            value: link.clone(),
        });
    }
    for (key, value) in &feature.attributes {
        match value {
            AttributeValue::Text(text) => other_data.push(OtherDataDoc {
                key: key.clone(),
                key2: None,
                value: text.clone(),
            }),
            AttributeValue::Map(map) => {
                for (sub, text) in map {
                    other_data.push(OtherDataDoc {
                        key: key.clone(),
                        key2: Some(sub.clone()),
                        value: text.clone(),
                    });
                }
            }
        }
    }
    FeatureDoc {
        feature_type: feature.feature_type.clone(),
        begin: feature.begin,
        end: feature.end,
        description: feature.description.clone(),
        score: (!feature.score.is_nan()).then_some(feature.score),
        group: feature.group.clone(),
        status: feature.status.clone(),
        other_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveSource;
    use crate::host::HeadlessHost;
    use crate::model::{Alignment, Rgb, Sequence, SequenceGroup, UserColourScheme};
    use std::io::Cursor;

    fn palette() -> UserColourScheme {
        UserColourScheme::new((0..24).map(|i| Rgb(i * 0x0a0b0c)).collect())
    }

    fn two_window_workspace() -> (Workspace, Vec<ViewId>) {
        let mut ws = Workspace::new();
        let a = ws.add_sequence(Sequence::new("a", "AC-GT"));
        let b = ws.add_sequence(Sequence::new("b", "ACCGT"));
        let ds = ws.create_dataset(&[a, b]);
        let g1 = ws.groups.insert(SequenceGroup::new("g1", vec![a], 0, 2).with_colour(ColourScheme::User(palette())));
        let g2 = ws.groups.insert(SequenceGroup::new("g2", vec![b], 1, 3).with_colour(ColourScheme::User(palette())));
        let mut alignment = Alignment::new(vec![a, b]).with_dataset(ds);
        alignment.groups = vec![g1, g2];
        let v1 = ws.add_view(View::new("data/first.fa", "set1", alignment.clone()).with_view_id("v1"));
        let v2 = ws.add_view(View::new("second", "set2", Alignment::new(vec![a]).with_dataset(ds)).with_view_id("v2"));
        (ws, vec![v1, v2])
    }

    #[test]
    fn test_filename_deduplication() {
        let mut used = Vec::new();
        assert_eq!(make_filename("dir/aln.fa", &mut used), "aln.fa.xml");
        assert_eq!(make_filename("other\\aln.fa", &mut used), "aln.fa_1.xml");
        assert_eq!(make_filename("aln.fa", &mut used), "aln.fa_2.xml");
    }

    #[test]
    fn test_entries_and_dataset_written_last() -> ArchiveResult<()> {
        let (ws, views) = two_window_workspace();
        let mut host = HeadlessHost::new();
        let mut sink = ArchiveSink::new(Cursor::new(Vec::new()));
        let mut session = SaveSession::new(WriteOptions::default());
        let report = write_views(&ws, &mut host, &views, &mut sink, &mut session);
        assert_eq!(report.error_message, None);
        assert_eq!(report.views, 2);
        assert_eq!(report.datasets, 1);
        // windows go out in reverse order
        assert_eq!(
            report.entries,
            vec!["second.xml", "first.fa.xml", "alnproj Dataset for second.xml"]
        );

        let bytes = sink.finish()?.into_inner();
        let mut source = ArchiveSource::new(Cursor::new(bytes))?;
        let first = ProjectDoc::from_xml(&source.read_text("first.fa.xml")?)?;
        // both groups share one user colour table
        assert_eq!(first.user_colours.len(), 1);
        assert_eq!(first.groups[0].colour.as_deref(), Some("ucs0"));
        assert_eq!(first.groups[1].colour.as_deref(), Some("ucs0"));
        // sequence a went out with the earlier document
        assert_eq!(first.sequence_set().sequences.len(), 1);
        assert_eq!(first.rows.len(), 2);

        let dataset = ProjectDoc::from_xml(&source.read_text("alnproj Dataset for second.xml")?)?;
        assert!(dataset.is_dataset_only());
        assert_eq!(dataset.sequence_set().dataset_id, "ds1");
        assert_eq!(dataset.sequence_set().sequences.len(), 2);
        Ok(())
    }

    #[test]
    fn test_failed_entry_stops_save() {
        let (ws, views) = two_window_workspace();
        let mut host = HeadlessHost::new();
        let mut sink = ArchiveSink::new(Cursor::new(Vec::new()));
        let mut session = SaveSession::new(WriteOptions::default());
        sink.write_entry("second.xml", b"taken").unwrap();
        let report = write_views(&ws, &mut host, &views, &mut sink, &mut session);
        assert!(report.error_message.is_some());
        assert!(report.entries.is_empty());
    }
}
