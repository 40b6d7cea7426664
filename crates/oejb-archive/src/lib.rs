//! Deployment archives and the class loaders that serve them.
//!
//! [`Archive`]s are in-memory jar/war/ear images. An [`ArchiveClassLoader`]
//! registers its archives with an [`ArchiveRegistry`] and hands out
//! `archive:<name>/<path>` [`ResourceUrl`]s that stay readable until the
//! loader is closed.

mod archive;
pub mod classfile;
mod error;
mod loader;
mod registry;
mod url;

pub use archive::{class_name_for, normalize_path, Archive, ArchiveKind, Asset, WEB_INF_CLASSES};
pub use classfile::{ClassFileError, ClassInfo};
pub use error::{ArchiveError, Result};
pub use loader::{
    class_resource_name, open_on_disk, read_resource, ArchiveClassLoader, BootstrapLoader,
    ClasspathEntry, LoadedClass, PathClassLoader, ResourceLoader, CDI_EXTENSION_SERVICES,
};
pub use registry::{ArchiveRegistry, ArchiveStream};
pub use url::{ResourceUrl, ARCHIVE_SCHEME};
