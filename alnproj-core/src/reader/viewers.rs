//! Deferred viewer construction
//!
//! Viewers are only built once every document has been read, so that the
//! sequences and annotation rows they point at exist. Session files are
//! staged to disk first; construction itself runs on the host's UI thread.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};
use std::path::PathBuf;

use crate::archive::ArchiveSource;
use crate::codec::decode_matrix;
use crate::document::{PcaViewerDoc, RnaViewerDoc, StructureStateDoc, TreeDoc};
use crate::error::ArchiveResult;
use crate::host::Host;
use crate::model::{
    AuxViewer, Font, Geometry, PcaViewer, Rgb, RnaModel, RnaViewer, SeqId, SequencePoint, StructureBinding,
    StructureViewer, TreeViewer, ViewId, ViewerId, Workspace,
};
use crate::registry::IdentityRegistry;

use super::LoadSession;

#[derive(Debug, Clone)]
pub(crate) enum PendingViewer {
    Tree {
        view: ViewId,
        doc: TreeDoc,
    },
    Pca {
        view: ViewId,
        doc: Box<PcaViewerDoc>,
    },
    Structure {
        view: ViewId,
        sequence: SeqId,
        structure_id: String,
        file: Option<PathBuf>,
        state: StructureStateDoc,
    },
    Rna {
        view: ViewId,
        sequence: SeqId,
        doc: RnaViewerDoc,
    },
}

impl PendingViewer {
    /// Archive entries that must be on disk before the viewer is built.
    fn session_entries(&self) -> Vec<&str> {
        match self {
            PendingViewer::Structure { state, .. } => state.session_entry.as_deref().into_iter().collect(),
            PendingViewer::Rna { doc, .. } => doc.structures.iter().filter_map(|s| s.state_entry.as_deref()).collect(),
            PendingViewer::Tree { .. } | PendingViewer::Pca { .. } => Vec::new(),
        }
    }
}

pub(super) fn open_viewers<R: Read + Seek>(
    source: &mut ArchiveSource<R>,
    ws: &mut Workspace,
    host: &mut dyn Host,
    session: &mut LoadSession,
) -> ArchiveResult<()> {
    let pending = std::mem::take(&mut session.pending_viewers);
    if pending.is_empty() {
        return Ok(());
    }
    stage_sessions(source, session, &pending)?;

    let mut builder = ViewerBuilder {
        registry: &session.registry,
        staged: &session.staged_entries,
        suffix: &session.unique_suffix,
        reuse_existing: session.options.reuse_viewers,
        existing: ws.viewers.handles().into_iter().collect(),
        opened: Vec::new(),
        problems: Vec::new(),
    };
    host.run_on_ui_thread(&mut || {
        for viewer in &pending {
            builder.build(ws, viewer);
        }
    });
    let ViewerBuilder { opened, problems, .. } = builder;

    for problem in problems {
        session.note(problem);
    }
    for (viewer, session_file) in opened {
        host.viewer_opened(viewer, session_file.as_deref());
    }
    Ok(())
}

fn stage_sessions<R: Read + Seek>(
    source: &mut ArchiveSource<R>,
    session: &mut LoadSession,
    pending: &[PendingViewer],
) -> ArchiveResult<()> {
    for name in pending.iter().flat_map(PendingViewer::session_entries) {
        if session.staged_entries.contains_key(name) {
            continue;
        }
        match source.extract_to_temp(name, "session_", "") {
            Ok(path) => {
                session.staged_entries.insert(name.to_string(), path);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => session.note(format!("Could not extract viewer session {}: {}", name, e)),
        }
    }
    Ok(())
}

struct ViewerBuilder<'a> {
    registry: &'a IdentityRegistry,
    staged: &'a HashMap<String, PathBuf>,
    suffix: &'a str,
    reuse_existing: bool,
    /// Viewers open before this load.
    existing: HashSet<ViewerId>,
    opened: Vec<(ViewerId, Option<PathBuf>)>,
    problems: Vec<String>,
}

impl ViewerBuilder<'_> {
    fn build(&mut self, ws: &mut Workspace, pending: &PendingViewer) {
        match pending {
            PendingViewer::Tree { view, doc } => self.tree(ws, *view, doc),
            PendingViewer::Pca { view, doc } => self.pca(ws, *view, doc),
            PendingViewer::Structure {
                view,
                sequence,
                structure_id,
                file,
                state,
            } => self.structure(ws, *view, *sequence, structure_id, file.as_ref(), state),
            PendingViewer::Rna { view, sequence, doc } => self.rna(ws, *view, *sequence, doc),
        }
    }

    /// A viewer that can take more bindings: one built by this load, or
    /// one open before it when reuse is allowed.
    fn find(&self, ws: &Workspace, matches: impl Fn(&AuxViewer) -> bool) -> Option<ViewerId> {
        ws.viewers
            .iter()
            .filter(|(id, _)| self.reuse_existing || !self.existing.contains(id))
            .find(|(_, viewer)| matches(viewer))
            .map(|(id, _)| id)
    }

    fn staged(&self, entry: Option<&str>) -> Option<PathBuf> {
        entry.and_then(|name| self.staged.get(name)).cloned()
    }

    fn tree(&mut self, ws: &mut Workspace, view: ViewId, doc: &TreeDoc) {
        let id = doc.id.as_deref().map(|id| format!("{}{}", id, self.suffix));
        if let Some(id) = &id {
            let found = self.find(ws, |v| matches!(v, AuxViewer::Tree(t) if t.id.as_deref() == Some(id.as_str())));
            if found.is_some() {
                log::debug!("Tree {} is already open", id);
                return;
            }
        }
        let mut tree = TreeViewer::new(view, doc.title.clone(), doc.newick.clone());
        tree.id = id;
        tree.geometry = Geometry::new(doc.x, doc.y, doc.width, doc.height);
        tree.font = Font {
            name: doc.font_name.clone(),
            size: doc.font_size,
            style: doc.font_style,
        };
        tree.threshold = doc.threshold;
        tree.fit_to_window = doc.fit_to_window;
        tree.current_tree = doc.current_tree;
        tree.mark_unlinked = doc.mark_unlinked;
        tree.show_bootstrap = doc.show_bootstrap;
        tree.show_distances = doc.show_distances;
        tree.link_to_all_views = doc.link_to_all_views;
        let handle = ws.viewers.insert(AuxViewer::Tree(tree));
        self.opened.push((handle, None));
    }

    fn pca(&mut self, ws: &mut Workspace, view: ViewId, doc: &PcaViewerDoc) {
        let matrices = decode_matrix(&doc.data.pairwise).and_then(|pairwise| {
            Ok((
                pairwise,
                decode_matrix(&doc.data.tridiagonal)?,
                decode_matrix(&doc.data.eigen)?,
            ))
        });
        let (pairwise, tridiagonal, eigen) = match matrices {
            Ok(m) => m,
            Err(e) => {
                self.problems.push(format!("PCA viewer {} not restored: {}", doc.title, e));
                return;
            }
        };
        let mut sequence_points = Vec::with_capacity(doc.sequence_points.len());
        for sp in &doc.sequence_points {
            match self.registry.resolve_sequence(&sp.sequence_ref) {
                Some(sequence) => sequence_points.push(SequencePoint {
                    sequence,
                    position: [sp.x, sp.y, sp.z],
                }),
                None => log::warn!("PCA point for unknown sequence {}", sp.sequence_ref),
            }
        }
        let pca = PcaViewer {
            view,
            title: doc.title.clone(),
            geometry: Geometry::new(doc.x, doc.y, doc.width, doc.height),
            score_model: doc.score_model.clone(),
            dimensions: [doc.x_dim, doc.y_dim, doc.z_dim],
            background: Rgb::from_argb(doc.bg_colour),
            scale_factor: doc.scale_factor,
            seq_point_min: [doc.seq_point_min.x, doc.seq_point_min.y, doc.seq_point_min.z],
            seq_point_max: [doc.seq_point_max.x, doc.seq_point_max.y, doc.seq_point_max.z],
            show_labels: doc.show_labels,
            link_to_all_views: doc.link_to_all_views,
            include_gaps: doc.similarity.include_gaps,
            match_gaps: doc.similarity.match_gaps,
            include_gapped_columns: doc.similarity.include_gapped_columns,
            denominate_by_shortest_length: doc.similarity.denominate_by_shortest_length,
            sequence_points,
            axes: doc.axes.iter().map(|p| [p.x, p.y, p.z]).collect(),
            pairwise,
            tridiagonal,
            eigen,
        };
        let handle = ws.viewers.insert(AuxViewer::Pca(Box::new(pca)));
        self.opened.push((handle, None));
    }

    fn structure(
        &mut self,
        ws: &mut Workspace,
        view: ViewId,
        sequence: SeqId,
        structure_id: &str,
        file: Option<&PathBuf>,
        state: &StructureStateDoc,
    ) {
        // states written before viewer ids existed are keyed by geometry
        let base = match &state.viewer_id {
            Some(id) => id.clone(),
            None => format!("_pre2_4_{},{},{},{}", state.x, state.y, state.width, state.height),
        };
        let viewer_id = format!("{}{}", base, self.suffix);
        let found = self.find(ws, |v| matches!(v, AuxViewer::Structure(s) if s.viewer_id == viewer_id));
        let handle = match found {
            Some(handle) => handle,
            None => {
                let geometry = Geometry::new(state.x, state.y, state.width, state.height);
                let mut viewer = StructureViewer::new(viewer_id.clone(), state.viewer_type.clone(), geometry);
                viewer.title = state.title.clone().unwrap_or_default();
                viewer.colour_by_viewer = state.colour_by_viewer;
                viewer.visible = state.visible;
                viewer.session_file = self.staged(state.session_entry.as_deref());
                let session_file = viewer.session_file.clone();
                let handle = ws.viewers.insert(AuxViewer::Structure(viewer));
                self.opened.push((handle, session_file));
                handle
            }
        };
        let Some(AuxViewer::Structure(viewer)) = ws.viewers.get_mut(handle) else {
            return;
        };
        if !viewer.views.contains(&view) {
            viewer.views.push(view);
        }
        if state.align_with_view && !viewer.align_with.contains(&view) {
            viewer.align_with.push(view);
        }
        if state.colour_with_view && !viewer.colour_with.contains(&view) {
            viewer.colour_with.push(view);
        }
        match viewer.bindings.iter_mut().find(|b| b.structure_id == structure_id) {
            Some(binding) => {
                if !binding.sequences.contains(&sequence) {
                    binding.sequences.push(sequence);
                }
            }
            None => viewer.bindings.push(StructureBinding {
                structure_id: structure_id.to_string(),
                file: file.cloned(),
                sequences: vec![sequence],
            }),
        }
    }

    fn rna(&mut self, ws: &mut Workspace, view: ViewId, sequence: SeqId, doc: &RnaViewerDoc) {
        let viewer_id = format!("{}{}", doc.viewer_id, self.suffix);
        let found = self.find(ws, |v| matches!(v, AuxViewer::Rna(r) if r.viewer_id == viewer_id));
        let handle = match found {
            Some(handle) => handle,
            None => {
                let viewer = RnaViewer {
                    viewer_id: viewer_id.clone(),
                    title: doc.title.clone(),
                    view,
                    geometry: Geometry::new(doc.x, doc.y, doc.width, doc.height),
                    divider_location: doc.divider_location,
                    selected_index: doc.selected_index,
                    models: Vec::new(),
                };
                let handle = ws.viewers.insert(AuxViewer::Rna(viewer));
                self.opened.push((handle, None));
                handle
            }
        };
        let mut models = Vec::with_capacity(doc.structures.len());
        for ss in &doc.structures {
            match self.registry.resolve_annotation(&ss.annotation_id) {
                Some(annotation) => models.push(RnaModel {
                    sequence,
                    annotation,
                    gapped: ss.gapped,
                    title: ss.title.clone(),
                    state_file: self.staged(ss.state_entry.as_deref()),
                }),
                None => self.problems.push(format!(
                    "RNA viewer {} refers to unknown annotation {}",
                    viewer_id, ss.annotation_id
                )),
            }
        }
        if let Some(AuxViewer::Rna(viewer)) = ws.viewers.get_mut(handle) {
            for model in models {
                let known = viewer
                    .models
                    .iter()
                    .any(|m| m.sequence == model.sequence && m.annotation == model.annotation);
                if !known {
                    viewer.models.push(model);
                }
            }
        }
    }
}
