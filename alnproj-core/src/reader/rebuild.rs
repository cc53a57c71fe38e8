//! Rebuilds workspace objects from one project document

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::archive::ArchiveSource;
use crate::codec::{decode_feature_colour, decode_filter, find_user_colours};
use crate::document::*;
use crate::error::{ArchiveError, ArchiveResult};
use crate::fref::ForwardReference;
use crate::host::Host;
use crate::model::annotation::RECALCULATED_LABELS;
use crate::model::{
    Alignment, Annotation, AnnotationColourScheme, AnnotationId, AnnotationRow, AttributeValue, CalcIdParam,
    CodonFrame, ColourScheme, DbRef, EditHistory, FeatureSettings, FeatureTypeSettings, Font, Geometry,
    GraphLine, GraphType, GroupId, HiddenGroup, MapList, Mapping, MappingId, Rgb, SeqId, Sequence,
    SequenceFeature, SequenceGroup, StructureEntry, View, ViewId, ViewStyle, Workspace,
};
use crate::reconcile::{DatasetDeclaration, DeclaredSequence};
use crate::writer::{ANNOTATION_COLOUR_GRADIENT, LINK_KEY_PREFIX};

use super::viewers::PendingViewer;
use super::LoadSession;

/// Structure state found on a row, waiting for the view to exist.
struct RowStructure {
    sequence: SeqId,
    structure_id: String,
    file: Option<PathBuf>,
    state: StructureStateDoc,
}

/// Restores one document. Returns the view it describes, or `None` for a
/// dataset-only document.
pub(super) fn load_document<R: Read + Seek>(
    source: &mut ArchiveSource<R>,
    ws: &mut Workspace,
    host: &mut dyn Host,
    session: &mut LoadSession,
    entry: &str,
    doc: &ProjectDoc,
) -> ArchiveResult<Option<ViewId>> {
    let set = doc.sequence_set();
    let dataset_only = doc.is_dataset_only();
    let unique_set_id = doc.viewport.as_ref().map(|vp| session.unique(&vp.sequence_set_id));

    for sd in &set.sequences {
        materialise_sequence(ws, session, sd);
    }

    let declared: Vec<DeclaredSequence> = if set.dataset_id.is_empty() && !doc.rows.is_empty() {
        doc.rows
            .iter()
            .map(|row| DeclaredSequence::new(row.id.clone(), None))
            .collect()
    } else {
        set.sequences
            .iter()
            .map(|sd| DeclaredSequence::new(sd.id.clone(), sd.dataset_sequence_id.clone()))
            .collect()
    };
    let decl = DatasetDeclaration {
        dataset_id: &set.dataset_id,
        sequences: &declared,
        dataset_only,
        sequence_set_id: unique_set_id.as_deref(),
    };
    let rec = session.reconciler.reconcile(ws, &mut session.registry, &decl);
    if rec.conflicts > 0 {
        session.note(format!(
            "SERIOUS: {} conflicting dataset bindings while reading {}",
            rec.conflicts, entry
        ));
    }
    let ds = rec.dataset;
    if !session.datasets.contains(&ds) {
        session.datasets.push(ds);
    }

    attach_dbrefs(ws, session, set);
    if !set.codon_frames.is_empty() && (rec.created() || ws.datasets[ds].codon_frames.is_empty()) {
        load_codon_frames(ws, session, set, ds);
    }

    let mut rows = Vec::with_capacity(doc.rows.len());
    let mut row_structures = Vec::new();
    let mut row_rna = Vec::new();
    for row in &doc.rows {
        let seq = session
            .registry
            .resolve_sequence(&row.id)
            .ok_or_else(|| ArchiveError::document(entry, format!("row refers to undeclared sequence {}", row.id)))?;
        let root = ws.dataset_root(seq);
        if !row.features.is_empty() && session.features_attached.insert(root) {
            for fd in &row.features {
                let feature = decode_feature(fd);
                let features = &mut ws.sequences[root].features;
                if !features.iter().any(|f| f.same_as(&feature)) {
                    features.push(feature);
                }
            }
        }
        for sd in &row.structures {
            let file = structure_file(source, session, sd)?;
            let entries = &mut ws.sequences[root].structures;
            if !entries.iter().any(|e| e.id == sd.id) {
                entries.push(StructureEntry {
                    id: sd.id.clone(),
                    entry_type: sd.entry_type.clone(),
                    file: file.clone(),
                    properties: sd
                        .properties
                        .iter()
                        .map(|p| (p.name.clone(), p.value.clone()))
                        .collect::<BTreeMap<_, _>>(),
                });
            }
            for state in &sd.states {
                row_structures.push(RowStructure {
                    sequence: seq,
                    structure_id: sd.id.clone(),
                    file: file.clone(),
                    state: state.clone(),
                });
            }
        }
        for rna in &row.rna_viewers {
            row_rna.push((seq, rna.clone()));
        }
        rows.push(seq);
    }

    let (annotations, group_links) = load_annotations(ws, session, set, &rows, entry)?;
    if dataset_only {
        let dataset = &mut ws.datasets[ds];
        for a in annotations {
            if !dataset.annotations.contains(&a) {
                dataset.annotations.push(a);
            }
        }
        return Ok(None);
    }

    let mut group_ids: HashMap<String, GroupId> = HashMap::new();
    let mut groups = Vec::with_capacity(doc.groups.len());
    for gd in &doc.groups {
        let members: Vec<SeqId> = gd
            .sequences
            .iter()
            .filter_map(|id| session.registry.resolve_sequence(id))
            .collect();
        if members.is_empty() {
            log::warn!("Group {} in {} has no known sequences; skipping it", gd.name, entry);
            continue;
        }
        let colour = match &gd.colour {
            Some(name) => decode_colour(ws, session, doc, name, gd.annotation_colours.as_ref(), &annotations),
            None => None,
        };
        let mut group = SequenceGroup::new(gd.name.clone(), members, gd.start, gd.end);
        group.colour = colour;
        group.outline_colour = Rgb::from_argb(gd.outline_colour);
        group.pid_threshold = gd.pid_threshold;
        group.conservation_threshold = gd.cons_threshold;
        group.display_boxes = gd.display_boxes;
        group.display_text = gd.display_text;
        group.colour_text = gd.colour_text;
        group.text_colour = Rgb::from_argb(gd.text_colour);
        group.text_colour2 = Rgb::from_argb(gd.text_colour2);
        group.text_colour_threshold = gd.text_colour_threshold;
        group.show_unconserved = gd.show_unconserved;
        group.ignore_gaps_in_consensus = gd.ignore_gaps_in_consensus;
        group.show_consensus_histogram = gd.show_consensus_histogram;
        group.show_sequence_logo = gd.show_sequence_logo;
        group.normalise_sequence_logo = gd.normalise_sequence_logo;
        let gid = ws.groups.insert(group);
        if let Some(id) = &gd.id {
            group_ids.insert(id.clone(), gid);
        }
        groups.push(gid);
    }
    for (annotation, group_ref) in group_links {
        let Some(&gid) = group_ids.get(&group_ref) else {
            log::warn!("Annotation row in {} refers to unknown group {}", entry, group_ref);
            continue;
        };
        ws.annotations[annotation].group_ref = Some(gid);
        let label = ws.annotations[annotation].label.clone();
        let group = &mut ws.groups[gid];
        if label.starts_with("Consensus") {
            group.consensus_row = Some(annotation);
        } else if label.starts_with("Conservation") {
            group.conservation_row = Some(annotation);
        }
    }

    let Some(vp) = doc.viewport.as_ref() else {
        return Ok(None);
    };
    let unique_set = session.unique(&vp.sequence_set_id);
    let unique_view = session.unique(&vp.id);

    let mut alignment = Alignment::new(rows.clone()).with_dataset(ds);
    alignment.groups = groups;
    alignment.properties = set.properties.iter().map(|p| (p.name.clone(), p.value.clone())).collect();
    alignment.gap_char = set.gap_char.chars().next().unwrap_or('-');
    alignment.reference = doc
        .rows
        .iter()
        .zip(&rows)
        .find(|(row, _)| row.view_reference)
        .map(|(_, seq)| *seq);
    let colour = match &vp.bg_colour {
        Some(name) => decode_colour(ws, session, doc, name, vp.annotation_colours.as_ref(), &annotations),
        None => None,
    };
    alignment.annotations = annotations;

    let mut view = View::new(vp.title.clone(), unique_set.clone(), alignment).with_view_id(unique_view.clone());
    view.view_name = vp.view_name.clone();
    view.complement_id = vp.complement_id.as_deref().map(|id| session.unique(id));
    view.gather_here = vp.gathered_views;
    view.geometry = Geometry::new(vp.x, vp.y, vp.width, vp.height);
    view.start_res = vp.start_res;
    view.start_seq = vp.start_seq;
    view.colour = colour;
    view.background_colour_applies_to_all_groups = vp.apply_to_all_groups;
    view.style = decode_style(vp);
    for (row, &seq) in doc.rows.iter().zip(&rows) {
        let colour = Rgb::from_argb(row.colour);
        if colour != Rgb::WHITE {
            view.row_colours.insert(seq, colour);
        }
        if row.hidden {
            view.hidden_sequences.push(seq);
        }
        if !row.hidden_sequences.is_empty() {
            let members = row.hidden_sequences.iter().filter_map(|i| rows.get(*i).copied()).collect();
            view.hidden_groups.push(HiddenGroup {
                representative: seq,
                members,
            });
        }
    }
    view.hidden_columns = vp.hidden_columns.iter().map(|r| [r.start, r.end]).collect();
    view.calc_params = vp
        .calc_params
        .iter()
        .map(|p| CalcIdParam {
            calc_id: p.calc_id.clone(),
            service_urls: p.service_urls.clone(),
            version: p.version.clone(),
            name: p.name.clone(),
            description: p.description.clone(),
            parameters: p.parameters.clone(),
            auto_update: p.auto_update,
            needs_update: p.needs_update,
        })
        .collect();
    view.feature_settings = doc
        .feature_settings
        .as_ref()
        .map(|fs| decode_feature_settings(session, fs, entry));

    let existing = ws.find_view(&unique_set, &unique_view);
    if let Some(history) = existing.and_then(|v| ws.views[v].history) {
        session.viewports_added.entry(unique_set.clone()).or_insert(history);
    }
    let history = *session
        .viewports_added
        .entry(unique_set)
        .or_insert_with(|| ws.histories.insert(EditHistory::default()));
    view.history = Some(history);

    let view_id = match existing {
        Some(id) => {
            log::debug!("Updating view {} in place", unique_view);
            ws.views[id] = view;
            id
        }
        None => {
            let id = ws.add_view(view);
            host.add_view(ws, id);
            id
        }
    };

    if !session.views.contains(&view_id) {
        session.views.push(view_id);
    }
    if vp.complement_id.is_some() {
        session.complements.push(view_id);
    }
    if vp.gathered_views {
        session.gather_to.push(view_id);
    }

    for tree in &doc.trees {
        session.pending_viewers.push(PendingViewer::Tree {
            view: view_id,
            doc: tree.clone(),
        });
    }
    for pca in &doc.pca_viewers {
        session.pending_viewers.push(PendingViewer::Pca {
            view: view_id,
            doc: Box::new(pca.clone()),
        });
    }
    for rs in row_structures {
        session.pending_viewers.push(PendingViewer::Structure {
            view: view_id,
            sequence: rs.sequence,
            structure_id: rs.structure_id,
            file: rs.file,
            state: rs.state,
        });
    }
    for (sequence, doc) in row_rna {
        session.pending_viewers.push(PendingViewer::Rna {
            view: view_id,
            sequence,
            doc,
        });
    }
    Ok(Some(view_id))
}

/// Creates the sequence for `doc`, or refreshes the one already known by
/// its id. Residues are only replaced by text at least as long.
fn materialise_sequence(ws: &mut Workspace, session: &mut LoadSession, doc: &SequenceDoc) -> SeqId {
    if let Some(seq) = session.registry.resolve_sequence(&doc.id) {
        if let Some(s) = ws.sequences.get_mut(seq) {
            s.start = doc.start;
            s.end = doc.end;
            if doc.residues != s.residues {
                let keep = doc.residues.chars().count() < s.residues.chars().count();
                log::warn!(
                    "Sequence {} declared again with different residues; keeping the {} version",
                    doc.id,
                    if keep { "existing" } else { "incoming" }
                );
                if !keep {
                    s.residues = doc.residues.clone();
                }
            }
            if s.description.is_none() {
                s.description = doc.description.clone();
            }
            return seq;
        }
    }
    let mut sequence = Sequence::new(doc.name.clone(), doc.residues.clone()).with_range(doc.start, doc.end);
    sequence.description = doc.description.clone();
    let seq = ws.add_sequence(sequence);
    session.registry.register_sequence(&doc.id, seq);
    seq
}

fn attach_dbrefs(ws: &mut Workspace, session: &mut LoadSession, set: &SequenceSetDoc) {
    for sd in set.sequences.iter().filter(|sd| !sd.dbrefs.is_empty()) {
        let Some(seq) = session.registry.resolve_sequence(&sd.id) else {
            continue;
        };
        let root = ws.dataset_root(seq);
        if !session.dbrefs_attached.insert(root) {
            continue;
        }
        for d in &sd.dbrefs {
            let known = ws.sequences[root]
                .dbrefs
                .iter()
                .any(|r| r.source == d.source && r.accession == d.accession && r.version == d.version);
            if known {
                continue;
            }
            let map = d.mapping.as_ref().map(|m| load_mapping(ws, session, m));
            ws.sequences[root].dbrefs.push(DbRef {
                source: d.source.clone(),
                version: d.version.clone(),
                accession: d.accession.clone(),
                locus: d.locus,
                canonical: d.canonical,
                map,
            });
        }
    }
}

/// Builds a mapping. A target named by id that has not been read yet is
/// queued; an inline target is created on the spot.
fn load_mapping(ws: &mut Workspace, session: &mut LoadSession, doc: &MappingDoc) -> MappingId {
    let ranges = |r: &[RangeDoc]| -> Vec<[i32; 2]> { r.iter().map(|r| [r.start, r.end]).collect() };
    let map = MapList::new(ranges(&doc.from), ranges(&doc.to), doc.from_unit, doc.to_unit);
    let mapping = ws.mappings.insert(Mapping::new(map, None));
    if let Some(target) = &doc.dseq_for {
        match session.registry.resolve_sequence(target) {
            Some(seq) => {
                let root = ws.dataset_root(seq);
                ws.mappings[mapping].to = Some(root);
            }
            None => session.forward_refs.push(ForwardReference::MappingTarget {
                mapping,
                target_id: target.clone(),
            }),
        }
    } else if let Some(inline) = &doc.sequence {
        let seq = materialise_sequence(ws, session, inline);
        let root = ws.dataset_root(seq);
        ws.mappings[mapping].to = Some(root);
    }
    mapping
}

fn load_codon_frames(ws: &mut Workspace, session: &mut LoadSession, set: &SequenceSetDoc, ds: crate::model::DatasetId) {
    for cf in &set.codon_frames {
        let frame = ws.codon_frames.insert(CodonFrame::default());
        for cm in &cf.maps {
            let mapping = load_mapping(ws, session, &cm.mapping);
            let mapped = ws.mappings[mapping].to.is_some();
            match session.registry.resolve_sequence(&cm.dna_sequence) {
                Some(dna) if mapped => {
                    let root = ws.dataset_root(dna);
                    ws.codon_frames[frame].add(root, mapping);
                }
                _ => session.forward_refs.push(ForwardReference::CodonFrameTarget {
                    frame,
                    mapping,
                    target_id: cm.dna_sequence.clone(),
                }),
            }
        }
        ws.datasets[ds].codon_frames.push(frame);
    }
}

/// Extracts a structure file once per entry name. Names not present in
/// the archive are taken as paths outside it.
fn structure_file<R: Read + Seek>(
    source: &mut ArchiveSource<R>,
    session: &mut LoadSession,
    doc: &StructureDoc,
) -> ArchiveResult<Option<PathBuf>> {
    let Some(name) = &doc.file else {
        return Ok(None);
    };
    if let Some(path) = session.staged_entries.get(name) {
        return Ok(Some(path.clone()));
    }
    if !source.contains(name) {
        return Ok(Some(PathBuf::from(name)));
    }
    let suffix = Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    match source.extract_to_temp(name, &doc.id, &suffix) {
        Ok(path) => {
            session.staged_entries.insert(name.clone(), path.clone());
            Ok(Some(path))
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            session.note(format!("Could not extract structure file {}: {}", name, e));
            Ok(None)
        }
    }
}

/// Rows in document order with auto-calculated rows put back at their
/// original positions, plus the group references still to link.
fn load_annotations(
    ws: &mut Workspace,
    session: &mut LoadSession,
    set: &SequenceSetDoc,
    rows: &[SeqId],
    entry: &str,
) -> ArchiveResult<(Vec<AnnotationId>, Vec<(AnnotationId, String)>)> {
    let max_width = rows
        .iter()
        .map(|s| ws.sequences[*s].residues.chars().count())
        .chain(set.sequences.iter().map(|sd| sd.residues.chars().count()))
        .max()
        .unwrap_or(0);
    let mut annotations = Vec::with_capacity(set.annotations.len());
    let mut auto_rows = Vec::new();
    let mut group_links = Vec::new();
    for (position, ad) in set.annotations.iter().enumerate() {
        let recalculated = ad.auto_calculated || RECALCULATED_LABELS.contains(&ad.label.as_str());
        let shared = if recalculated {
            None
        } else {
            ad.id
                .as_deref()
                .and_then(|id| session.registry.resolve_annotation(id))
                .filter(|a| ws.annotations.contains(*a))
        };
        let handle = match shared {
            Some(handle) => handle,
            None => {
                let row = decode_annotation(ws, session, ad, recalculated, rows, max_width, entry)?;
                let sequence_ref = row.sequence_ref;
                let handle = ws.annotations.insert(row);
                if let (false, Some(id)) = (recalculated, &ad.id) {
                    session.registry.register_annotation(id, handle);
                }
                if let Some(seq) = sequence_ref {
                    let linked = &mut ws.sequences[seq].annotations;
                    if !linked.contains(&handle) {
                        linked.push(handle);
                    }
                }
                if let Some(group_ref) = &ad.group_ref {
                    group_links.push((handle, group_ref.clone()));
                }
                handle
            }
        };
        if ad.auto_calculated {
            auto_rows.push((position, handle));
        } else {
            annotations.push(handle);
        }
    }
    for (position, handle) in auto_rows {
        let at = position.min(annotations.len());
        annotations.insert(at, handle);
    }
    Ok((annotations, group_links))
}

fn decode_annotation(
    ws: &Workspace,
    session: &LoadSession,
    doc: &AnnotationDoc,
    recalculated: bool,
    rows: &[SeqId],
    max_width: usize,
    entry: &str,
) -> ArchiveResult<AnnotationRow> {
    let mut row = AnnotationRow::new(doc.label.clone(), doc.description.clone().unwrap_or_default());
    row.id = if recalculated { None } else { doc.id.clone() };
    row.cells = decode_cells(doc, max_width, entry)?;
    row.graph_type = if doc.graph {
        GraphType::from_code(doc.graph_type)
    } else {
        GraphType::None
    };
    row.graph_group = doc.graph_group.unwrap_or(-1);
    if let Some(height) = doc.graph_height {
        row.graph_height = height;
    }
    row.threshold = doc.threshold.as_ref().map(|t| GraphLine {
        value: t.value,
        label: t.label.clone(),
        colour: Rgb::from_argb(t.colour),
    });
    row.score = doc.score;
    row.calc_id = doc.calc_id.clone();
    row.properties = doc.properties.iter().map(|p| (p.name.clone(), p.value.clone())).collect();
    row.visible = doc.visible;
    row.centre_column_labels = doc.centre_column_labels;
    row.scale_column_labels = doc.scale_column_labels;
    row.show_all_column_labels = doc.show_all_column_labels;
    row.below_alignment = doc.below_alignment;
    row.auto_calculated = doc.auto_calculated;
    row.sequence_ref = doc.sequence_ref.as_deref().and_then(|r| {
        session
            .registry
            .resolve_sequence(r)
            .or_else(|| rows.iter().copied().find(|s| ws.sequences[*s].name == r))
    });
    Ok(row)
}

/// Expands sparse cells. Rows without a width or elements have no cells.
///
/// A row may be no wider than `max_width`, the widest sequence the
/// document can annotate, and every element must fall inside the row.
fn decode_cells(
    doc: &AnnotationDoc,
    max_width: usize,
    entry: &str,
) -> ArchiveResult<Option<Vec<Option<Annotation>>>> {
    let width = match doc.columns {
        Some(width) => width,
        None if doc.elements.is_empty() => return Ok(None),
        None => doc
            .elements
            .iter()
            .map(|e| e.position.saturating_add(1))
            .max()
            .unwrap_or(0),
    };
    if width > max_width {
        return Err(ArchiveError::document(
            entry,
            format!(
                "annotation row {} is {} columns wide but the widest sequence has {}",
                doc.label, width, max_width
            ),
        ));
    }
    if let Some(e) = doc.elements.iter().find(|e| e.position >= width) {
        return Err(ArchiveError::document(
            entry,
            format!("annotation row {} has an element at column {} of {}", doc.label, e.position, width),
        ));
    }
    let mut cells: Vec<Option<Annotation>> = Vec::new();
    cells
        .try_reserve_exact(width)
        .map_err(|e| ArchiveError::OutOfMemory(format!("annotation row {} ({} columns): {}", doc.label, width, e)))?;
    cells.resize(width, None);
    for e in &doc.elements {
        cells[e.position] = Some(Annotation {
            display_character: e.display_character.clone(),
            description: e.description.clone(),
            secondary_structure: e.secondary_structure.as_deref().and_then(|s| s.chars().next()),
            value: e.value.unwrap_or(f32::NAN),
            colour: e.colour.map(Rgb::from_argb),
        });
    }
    Ok(Some(cells))
}

/// Resolves a colour attribute written as a scheme name, a `ucs<N>`
/// reference into the document's colour table, or the gradient marker.
fn decode_colour(
    ws: &Workspace,
    session: &mut LoadSession,
    doc: &ProjectDoc,
    name: &str,
    gradient: Option<&AnnotationColoursDoc>,
    annotations: &[AnnotationId],
) -> Option<ColourScheme> {
    if name == ANNOTATION_COLOUR_GRADIENT {
        let Some(g) = gradient else {
            session.note("Annotation colour gradient has no parameters; colouring dropped".to_string());
            return None;
        };
        let annotation = g
            .annotation_id
            .as_deref()
            .and_then(|id| session.registry.resolve_annotation(id))
            .or_else(|| {
                annotations
                    .iter()
                    .copied()
                    .find(|a| ws.annotations.get(*a).is_some_and(|row| row.label == g.annotation))
            });
        return Some(ColourScheme::Annotation(Box::new(AnnotationColourScheme {
            annotation,
            annotation_label: g.annotation.clone(),
            min_colour: Rgb::from_argb(g.min_colour),
            max_colour: Rgb::from_argb(g.max_colour),
            above_threshold: g.above_threshold,
            threshold: g.threshold,
            base_scheme: g.colour_scheme.clone(),
            per_sequence: g.per_sequence,
            predefined_colours: g.predefined_colours,
        })));
    }
    if !doc.user_colours.iter().any(|u| u.id == name) {
        return Some(ColourScheme::Named(name.to_string()));
    }
    match find_user_colours(&doc.user_colours, name) {
        Ok(scheme) => Some(ColourScheme::User(scheme)),
        Err(e) => {
            session.note(format!("Could not restore user colours {}: {}", name, e));
            None
        }
    }
}

fn decode_style(vp: &ViewportDoc) -> ViewStyle {
    ViewStyle {
        font: Font {
            name: vp.font_name.clone(),
            size: vp.font_size,
            style: vp.font_style,
        },
        conservation_selected: vp.conservation_selected,
        pid_selected: vp.pid_selected,
        consensus_threshold: vp.cons_threshold,
        conservation_increment: vp.conservation_increment,
        show_full_id: vp.show_full_id,
        right_align_ids: vp.right_align_ids,
        show_text: vp.show_text,
        show_colour_text: vp.show_colour_text,
        show_boxes: vp.show_boxes,
        show_unconserved: vp.show_unconserved,
        wrap_alignment: vp.wrap_alignment,
        render_gaps: vp.render_gaps,
        show_sequence_features: vp.show_sequence_features,
        show_annotation: vp.show_annotation,
        show_consensus_histogram: vp.show_consensus_histogram,
        show_sequence_logo: vp.show_sequence_logo,
        normalise_sequence_logo: vp.normalise_sequence_logo,
        ignore_gaps_in_consensus: vp.ignore_gaps_in_consensus,
        text_colour: Rgb::from_argb(vp.text_colour),
        text_colour2: Rgb::from_argb(vp.text_colour2),
        text_colour_threshold: vp.text_colour_threshold,
        id_width: vp.id_width,
        scale_protein_as_cdna: vp.scale_protein_as_cdna,
        follow_highlight: vp.follow_highlight,
    }
}

/// Settings whose colour cannot be decoded are dropped; a bad filter only
/// loses the filter.
fn decode_feature_settings(session: &mut LoadSession, doc: &FeatureSettingsDoc, entry: &str) -> FeatureSettings {
    let mut settings = FeatureSettings {
        types: Vec::with_capacity(doc.settings.len()),
        groups: doc.groups.iter().map(|g| (g.name.clone(), g.display)).collect(),
        transparency: doc.transparency,
    };
    for s in &doc.settings {
        let colour = match decode_feature_colour(s) {
            Ok(colour) => colour,
            Err(e) => {
                session.note(format!("Dropped settings for {} in {}: {}", s.feature_type, entry, e));
                continue;
            }
        };
        let filter = match s.filter.as_ref().map(decode_filter).transpose() {
            Ok(filter) => filter,
            Err(e) => {
                session.note(format!("Dropped filter for {} in {}: {}", s.feature_type, entry, e));
                None
            }
        };
        settings.types.push(FeatureTypeSettings {
            feature_type: s.feature_type.clone(),
            colour,
            filter,
            display: s.display,
            order: s.order,
        });
    }
    settings
}

fn decode_feature(doc: &FeatureDoc) -> SequenceFeature {
    let mut feature = SequenceFeature::new(doc.feature_type.clone(), doc.description.clone(), doc.begin, doc.end);
    feature.score = doc.score.unwrap_or(f32::NAN);
    feature.group = doc.group.clone();
    feature.status = doc.status.clone();
    let mut links = Vec::new();
    for od in &doc.other_data {
        let link_index = od
            .key
            .strip_prefix(LINK_KEY_PREFIX)
            .and_then(|i| i.parse::<usize>().ok())
            .filter(|_| od.key2.is_none());
        if let Some(index) = link_index {
            links.push((index, od.value.clone()));
            continue;
        }
        match &od.key2 {
            Some(sub) => {
                let value = feature
                    .attributes
                    .entry(od.key.clone())
                    .or_insert_with(|| AttributeValue::Map(BTreeMap::new()));
                match value {
                    AttributeValue::Map(map) => {
                        map.insert(sub.clone(), od.value.clone());
                    }
                    AttributeValue::Text(_) => {
                        log::warn!("Attribute {} is both a value and a map; keeping the value", od.key)
                    }
                }
            }
            None => {
                feature
                    .attributes
                    .insert(od.key.clone(), AttributeValue::Text(od.value.clone()));
            }
        }
    }
    links.sort_by_key(|(index, _)| *index);
    feature.links = links.into_iter().map(|(_, link)| link).collect();
    feature
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_cells_expand_to_width() -> ArchiveResult<()> {
        let doc = AnnotationDoc {
            label: "Secondary".into(),
            columns: Some(5),
            elements: vec![AnnotationElementDoc {
                position: 3,
                display_character: Some("H".into()),
                secondary_structure: Some("H".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let cells = decode_cells(&doc, 10, "view.xml")?.expect("cells");
        assert_eq!(cells.len(), 5);
        assert!(cells[0].is_none());
        let cell = cells[3].as_ref().expect("cell 3");
        assert_eq!(cell.secondary_structure, Some('H'));
        assert!(cell.value.is_nan());
        Ok(())
    }

    #[test]
    fn test_element_outside_row_is_a_document_error() {
        let doc = AnnotationDoc {
            label: "Secondary".into(),
            columns: Some(4),
            elements: vec![AnnotationElementDoc {
                position: usize::MAX,
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = decode_cells(&doc, 10, "bad.xml").expect_err("position past the row");
        assert!(matches!(err, ArchiveError::Document { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_row_wider_than_sequences_is_not_out_of_memory() {
        let doc = AnnotationDoc {
            label: "Secondary".into(),
            columns: Some(1 << 60),
            ..Default::default()
        };
        let err = decode_cells(&doc, 10, "bad.xml").expect_err("absurd width");
        assert!(matches!(err, ArchiveError::Document { .. }));

        let undeclared = AnnotationDoc {
            label: "Secondary".into(),
            elements: vec![AnnotationElementDoc {
                position: usize::MAX,
                ..Default::default()
            }],
            ..Default::default()
        };
        let err = decode_cells(&undeclared, 10, "bad.xml").expect_err("element past every sequence");
        assert!(matches!(err, ArchiveError::Document { .. }));
    }

    #[test]
    fn test_score_only_row_has_no_cells() -> ArchiveResult<()> {
        let doc = AnnotationDoc {
            label: "Score".into(),
            score: Some(0.5),
            ..Default::default()
        };
        assert!(decode_cells(&doc, 10, "view.xml")?.is_none());
        Ok(())
    }

    #[test]
    fn test_feature_links_and_map_attributes() {
        let doc = FeatureDoc {
            feature_type: "Domain".into(),
            begin: 2,
            end: 9,
            description: "kinase".into(),
            other_data: vec![
                OtherDataDoc {
                    key: "LINK_1".into(),
                    key2: None,
                    value: "b|http://b".into(),
                },
                OtherDataDoc {
                    key: "LINK_0".into(),
                    key2: None,
                    value: "a|http://a".into(),
                },
                OtherDataDoc {
                    key: "CSQ".into(),
                    key2: Some("Allele".into()),
                    value: "T".into(),
                },
                OtherDataDoc {
                    key: "evidence".into(),
                    key2: None,
                    value: "ECO:1".into(),
                },
            ],
            ..Default::default()
        };
        let feature = decode_feature(&doc);
        assert_eq!(feature.links, vec!["a|http://a", "b|http://b"]);
        assert!(feature.score.is_nan());
        match &feature.attributes["CSQ"] {
            AttributeValue::Map(map) => assert_eq!(map["Allele"], "T"),
            other => panic!("expected map, got {:?}", other),
        }
        assert_eq!(feature.attributes["evidence"], AttributeValue::Text("ECO:1".into()));
    }
}
