//! alnproj Core Library
//!
//! Saves and restores alignment workspaces as project archives: a zip
//! container holding one XML document per view, one per dataset, and any
//! structure files or viewer sessions those documents refer to.
//!
//! The object graph lives in a [`Workspace`]. Saving goes through
//! [`save_project`] (or [`write_views`] with an explicit [`SaveSession`]);
//! loading through [`load_project`] (or [`read_archive`] with a
//! [`LoadSession`]). Everything the engine needs from a surrounding
//! application is behind the [`Host`] trait.

pub mod archive;
pub mod codec;
pub mod document;
pub mod error;
pub mod fref;
pub mod host;
pub mod model;
pub mod reader;
pub mod reconcile;
pub mod registry;
pub mod writer;

// Re-export commonly used types and functions
pub use archive::{ArchiveSink, ArchiveSource};
pub use document::ProjectDoc;
pub use error::{ArchiveError, ArchiveResult};
pub use fref::{ForwardRefQueue, ForwardReference, ResolutionReport};
pub use host::{HeadlessHost, Host, HostEvent};
pub use model::Workspace;
pub use reader::{copy_view, load_project, read_archive, LoadOptions, LoadReport, LoadSession};
pub use reconcile::{DatasetReconciler, DatasetStrategy};
pub use registry::{IdSource, IdentityRegistry};
pub use writer::{save_project, write_views, SaveSession, WriteOptions, WriteReport};

/// Version written into every project document
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
