//! Archive reader
//!
//! Documents are read in container order and rebuilt one at a time into a
//! [`Workspace`]. State that spans documents (ids seen so far, datasets
//! reconciled so far, pending forward references, viewers to open) lives in
//! a [`LoadSession`]. Once every document has been read the forward
//! references are resolved in a single pass, split views are paired,
//! gathered views handed to the host, and auxiliary viewers instantiated.

mod rebuild;
mod viewers;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use crate::archive::{ArchiveSink, ArchiveSource};
use crate::document::ProjectDoc;
use crate::error::{ArchiveError, ArchiveResult, ErrorLog};
use crate::fref::{ForwardRefQueue, ResolutionReport};
use crate::host::Host;
use crate::model::{DatasetId, HistoryId, SeqId, SplitFrame, ViewId, Workspace};
use crate::reconcile::DatasetReconciler;
use crate::registry::IdentityRegistry;
use crate::writer::{write_views, SaveSession, WriteOptions};

pub(crate) use viewers::PendingViewer;

/// Loads started in this process; keeps suffixes distinct within one millisecond.
static LOADS_STARTED: AtomicU64 = AtomicU64::new(0);

fn default_true() -> bool {
    true
}

/// Options for a load call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Attach to viewers that were already open before the load.
    #[serde(default = "default_true")]
    pub reuse_viewers: bool,
    #[serde(default = "default_true")]
    pub attach_viewers: bool,
    /// Fixed suffix for sequence-set and view ids instead of a time-based one.
    #[serde(default)]
    pub unique_suffix: Option<String>,
    /// Sequence-set ids, as written in the archive, whose view documents
    /// are not loaded. Typically the sets a host already has open.
    #[serde(default)]
    pub skip_sequence_sets: BTreeSet<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            reuse_viewers: true,
            attach_viewers: true,
            unique_suffix: None,
            skip_sequence_sets: BTreeSet::new(),
        }
    }
}

fn fresh_suffix() -> String {
    let started = LOADS_STARTED.fetch_add(1, Ordering::Relaxed);
    let millis = chrono::Utc::now().timestamp_millis().unsigned_abs();
    format!("_{}", millis.wrapping_add(started) % 100_000)
}

/// State carried through one load call.
#[derive(Debug)]
pub struct LoadSession {
    pub registry: IdentityRegistry,
    pub forward_refs: ForwardRefQueue,
    pub reconciler: DatasetReconciler,
    pub options: LoadOptions,
    unique_suffix: String,
    /// Edit history per unique sequence-set id.
    viewports_added: HashMap<String, HistoryId>,
    gather_to: Vec<ViewId>,
    features_attached: HashSet<SeqId>,
    dbrefs_attached: HashSet<SeqId>,
    /// Staged paths by entry name.
    staged_entries: HashMap<String, PathBuf>,
    complements: Vec<ViewId>,
    views: Vec<ViewId>,
    datasets: Vec<DatasetId>,
    pending_viewers: Vec<PendingViewer>,
    errors: ErrorLog,
}

impl LoadSession {
    pub fn new(options: LoadOptions) -> Self {
        Self::with_registry(IdentityRegistry::new(), options)
    }

    /// Session that resolves ids against an existing registry, so that
    /// sequences it already knows are updated instead of duplicated.
    pub fn with_registry(registry: IdentityRegistry, options: LoadOptions) -> Self {
        let unique_suffix = options.unique_suffix.clone().unwrap_or_else(fresh_suffix);
        Self {
            registry,
            forward_refs: ForwardRefQueue::new(),
            reconciler: DatasetReconciler::new(),
            options,
            unique_suffix,
            viewports_added: HashMap::new(),
            gather_to: Vec::new(),
            features_attached: HashSet::new(),
            dbrefs_attached: HashSet::new(),
            staged_entries: HashMap::new(),
            complements: Vec::new(),
            views: Vec::new(),
            datasets: Vec::new(),
            pending_viewers: Vec::new(),
            errors: ErrorLog::default(),
        }
    }

    pub fn unique_suffix(&self) -> &str {
        &self.unique_suffix
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

    fn unique(&self, id: &str) -> String {
        format!("{}{}", id, self.unique_suffix)
    }
}

#[derive(Debug, Default)]
pub struct LoadReport {
    /// Views created or updated, in document order.
    pub views: Vec<ViewId>,
    pub datasets: Vec<DatasetId>,
    pub documents: usize,
    /// Documents that failed to load.
    pub skipped: usize,
    /// View documents left out through `LoadOptions::skip_sequence_sets`.
    pub excluded: usize,
    pub resolution: ResolutionReport,
    pub error_message: Option<String>,
    /// Temp files holding structure files and viewer sessions. Dropping
    /// them deletes the files.
    pub staged_files: Vec<TempPath>,
}

/// Loads a project file into `ws` with a fresh session.
pub fn load_project<P: AsRef<Path>>(
    ws: &mut Workspace,
    host: &mut dyn Host,
    path: P,
    options: &LoadOptions,
) -> ArchiveResult<LoadReport> {
    let mut source = ArchiveSource::open(path.as_ref())?;
    let mut session = LoadSession::new(options.clone());
    let report = read_archive(&mut source, ws, host, &mut session)?;
    log::info!(
        "Loaded {} views and {} datasets from {}",
        report.views.len(),
        report.datasets.len(),
        path.as_ref().display()
    );
    Ok(report)
}

/// Reads every document in `source` into `ws`.
///
/// Malformed documents are skipped and described in the report. Only
/// container failures and exhausted memory end the call with an error.
pub fn read_archive<R: Read + Seek>(
    source: &mut ArchiveSource<R>,
    ws: &mut Workspace,
    host: &mut dyn Host,
    session: &mut LoadSession,
) -> ArchiveResult<LoadReport> {
    let mut report = LoadReport::default();
    let docs = parse_documents(source, session, &mut report)?;
    load_documents(source, ws, host, session, docs, report)
}

fn parse_documents<R: Read + Seek>(
    source: &mut ArchiveSource<R>,
    session: &mut LoadSession,
    report: &mut LoadReport,
) -> ArchiveResult<Vec<(String, ProjectDoc)>> {
    let mut docs = Vec::new();
    for name in source.entry_names()? {
        // other entries are fetched on demand by name
        if !name.ends_with(".xml") {
            continue;
        }
        let text = match source.read_text(&name) {
            Ok(text) => text,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                session.note(format!("Could not read {}: {}", name, e));
                report.skipped += 1;
                continue;
            }
        };
        match ProjectDoc::from_xml(&text) {
            Ok(doc) => docs.push((name, doc)),
            Err(e) => {
                let hint = if text.contains("<project") {
                    ""
                } else {
                    " (version 1 project documents are not supported)"
                };
                session.note(format!("Skipped {}: {}{}", name, e, hint));
                report.skipped += 1;
            }
        }
    }
    Ok(docs)
}

fn load_documents<R: Read + Seek>(
    source: &mut ArchiveSource<R>,
    ws: &mut Workspace,
    host: &mut dyn Host,
    session: &mut LoadSession,
    docs: Vec<(String, ProjectDoc)>,
    mut report: LoadReport,
) -> ArchiveResult<LoadReport> {
    for (name, doc) in &docs {
        if let Some(viewport) = &doc.viewport {
            if session.options.skip_sequence_sets.contains(&viewport.sequence_set_id) {
                log::debug!("Skipping {} of sequence set {}", name, viewport.sequence_set_id);
                report.excluded += 1;
                continue;
            }
        }
        log::debug!("Reading document {}", name);
        match rebuild::load_document(source, ws, host, session, name, doc) {
            Ok(_) => report.documents += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                session.note(format!("Could not restore {}: {}", name, e));
                report.skipped += 1;
            }
        }
    }

    report.resolution = session.forward_refs.resolve_all(&session.registry, ws);
    if report.resolution.remaining() > 0 {
        session.note(format!(
            "{} references could not be resolved and {} failed to resolve",
            report.resolution.unresolved, report.resolution.failed
        ));
    }

    pair_split_frames(ws, host, session);

    for &representative in &session.gather_to {
        if let Some(view) = ws.views.get(representative) {
            let members = ws.views_in_set(&view.sequence_set_id);
            host.gather_views(representative, &members);
        }
    }

    if session.options.attach_viewers {
        viewers::open_viewers(source, ws, host, session)?;
    } else {
        session.pending_viewers.clear();
    }

    report.views = session.views.clone();
    report.datasets = session.datasets.clone();
    report.error_message = std::mem::take(&mut session.errors).into_message();
    report.staged_files = source.take_staged();
    Ok(report)
}

fn pair_split_frames(ws: &mut Workspace, host: &mut dyn Host, session: &mut LoadSession) {
    let mut paired: HashSet<ViewId> = HashSet::new();
    for view in session.complements.clone() {
        if paired.contains(&view) {
            continue;
        }
        let Some(complement) = ws.views.get(view).and_then(|v| v.complement_id.clone()) else {
            continue;
        };
        let partner = session
            .views
            .iter()
            .copied()
            .find(|v| *v != view && ws.views.get(*v).is_some_and(|p| p.view_id == complement));
        let Some(partner) = partner else {
            session.note(format!(
                "Complement {} of view {} was not found; showing it on its own",
                complement, ws.views[view].title
            ));
            continue;
        };
        let frame = if ws.is_nucleotide(partner) && !ws.is_nucleotide(view) {
            SplitFrame { dna: partner, protein: view }
        } else {
            SplitFrame { dna: view, protein: partner }
        };
        paired.insert(view);
        paired.insert(partner);
        ws.split_frames.push(frame);
        host.pair_split_frame(frame);
    }
}

/// Duplicates a view as a sibling over the same sequences and dataset.
///
/// The view is written to an in-memory archive and read back through a
/// registry that already knows every id written, so no sequence or dataset
/// is copied. The new view joins the original's sequence set and shares
/// its edit history.
pub fn copy_view(
    ws: &mut Workspace,
    host: &mut dyn Host,
    view: ViewId,
    title: Option<&str>,
) -> ArchiveResult<ViewId> {
    let original = ws
        .views
        .get(view)
        .ok_or_else(|| ArchiveError::document("", format!("no view {:?}", view)))?
        .clone();

    let options = WriteOptions {
        compression: "stored".to_string(),
        embed_structure_files: false,
        embed_viewer_sessions: false,
        ..WriteOptions::default()
    };
    let mut save = SaveSession::new(options);
    let mut sink = ArchiveSink::with_compression(Cursor::new(Vec::new()), zip::CompressionMethod::Stored);
    let written = write_views(ws, host, &[view], &mut sink, &mut save);
    if let Some(message) = written.error_message {
        return Err(ArchiveError::document(original.title.clone(), message));
    }
    let bytes = sink.finish()?.into_inner();
    let dataset_id = original.alignment.dataset.map(|ds| (save.registry.dataset_id(ds), ds));

    let load_options = LoadOptions {
        attach_viewers: false,
        unique_suffix: Some(String::new()),
        ..LoadOptions::default()
    };
    let mut session = LoadSession::with_registry(save.into_registry(), load_options);
    if let Some((id, ds)) = &dataset_id {
        session.reconciler.bind_dataset_id(id, *ds);
    }
    if let Some(history) = original.history {
        session.viewports_added.insert(original.sequence_set_id.clone(), history);
    }

    let mut source = ArchiveSource::new(Cursor::new(bytes))?;
    let mut report = LoadReport::default();
    let mut docs = parse_documents(&mut source, &mut session, &mut report)?;
    let siblings = ws.views_in_set(&original.sequence_set_id).len();
    let new_id = format!("{}_copy{}", original.view_id, siblings);
    let new_title = title
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} (view {})", original.title, siblings + 1));
    for (_, doc) in docs.iter_mut() {
        if let Some(vp) = doc.viewport.as_mut() {
            vp.id = new_id.clone();
            vp.title = new_title.clone();
            vp.view_name = Some(new_title.clone());
            vp.gathered_views = false;
        }
    }
    let report = load_documents(&mut source, ws, host, &mut session, docs, report)?;
    if let Some(message) = &report.error_message {
        log::warn!("Copy of {} finished with problems: {}", original.title, message);
    }
    report
        .views
        .first()
        .copied()
        .ok_or_else(|| ArchiveError::document(original.title, "copy produced no view"))
}
