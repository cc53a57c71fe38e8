//! Host collaborator interfaces
//!
//! The engine never owns windows or viewer processes. Everything it needs
//! from its surroundings goes through [`Host`]; every method has a default
//! so a headless caller only overrides what it cares about.

use std::io;
use std::path::{Path, PathBuf};

use crate::model::{SplitFrame, StructureViewer, ViewId, ViewerId, Workspace};

pub trait Host {
    /// Views to save when the caller does not name any.
    fn open_views(&self, ws: &Workspace) -> Vec<ViewId> {
        ws.view_order().to_vec()
    }

    /// A loaded view is ready to be shown.
    fn add_view(&mut self, _ws: &Workspace, _view: ViewId) {}

    fn gather_views(&mut self, _representative: ViewId, _views: &[ViewId]) {}

    fn pair_split_frame(&mut self, _frame: SplitFrame) {}

    /// Runs `task` on the UI thread and blocks until it has finished.
    fn run_on_ui_thread(&mut self, task: &mut dyn FnMut()) {
        task()
    }

    /// Asks a structure viewer to write its native session to a file.
    fn save_structure_session(&mut self, viewer: &StructureViewer) -> io::Result<Option<PathBuf>> {
        Ok(viewer.session_file.clone())
    }

    /// A viewer was constructed, optionally from a staged session file.
    fn viewer_opened(&mut self, _viewer: ViewerId, _session: Option<&Path>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    ViewAdded(ViewId),
    Gathered { representative: ViewId, views: Vec<ViewId> },
    SplitFrame(SplitFrame),
    UiTask,
    SessionSaved(String),
    ViewerOpened { viewer: ViewerId, session: Option<PathBuf> },
}

/// Host with no UI that records every call.
#[derive(Debug, Default, Clone)]
pub struct HeadlessHost {
    pub events: Vec<HostEvent>,
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn views_added(&self) -> Vec<ViewId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                HostEvent::ViewAdded(v) => Some(*v),
                _ => None,
            })
            .collect()
    }

    pub fn split_frames(&self) -> Vec<SplitFrame> {
        self.events
            .iter()
            .filter_map(|e| match e {
                HostEvent::SplitFrame(f) => Some(*f),
                _ => None,
            })
            .collect()
    }
}

impl Host for HeadlessHost {
    fn add_view(&mut self, _ws: &Workspace, view: ViewId) {
        self.events.push(HostEvent::ViewAdded(view));
    }

    fn gather_views(&mut self, representative: ViewId, views: &[ViewId]) {
        self.events.push(HostEvent::Gathered {
            representative,
            views: views.to_vec(),
        });
    }

    fn pair_split_frame(&mut self, frame: SplitFrame) {
        self.events.push(HostEvent::SplitFrame(frame));
    }

    fn run_on_ui_thread(&mut self, task: &mut dyn FnMut()) {
        self.events.push(HostEvent::UiTask);
        task()
    }

    fn save_structure_session(&mut self, viewer: &StructureViewer) -> io::Result<Option<PathBuf>> {
        self.events.push(HostEvent::SessionSaved(viewer.viewer_id.clone()));
        Ok(viewer.session_file.clone())
    }

    fn viewer_opened(&mut self, viewer: ViewerId, session: Option<&Path>) {
        self.events.push(HostEvent::ViewerOpened {
            viewer,
            session: session.map(Path::to_path_buf),
        });
    }
}
