//! Class and resource loaders.
//!
//! Loaders form a parent chain. Classes are looked up parent-first; resource
//! lookups follow the rules documented on each loader.

mod archive_loader;
mod path_loader;

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::classfile::ClassInfo;
use crate::error::{ArchiveError, Result};
use crate::url::ResourceUrl;

pub use archive_loader::{ArchiveClassLoader, CDI_EXTENSION_SERVICES};
pub use path_loader::{ClasspathEntry, PathClassLoader};

pub trait ResourceLoader: fmt::Debug + Send + Sync {
    /// This loader's own resource named `name`, falling back to the parent
    /// chain when the loader has none.
    fn find_resource(&self, name: &str) -> Option<ResourceUrl>;

    /// Every resource named `name` this loader owns, in priority order.
    fn find_resources(&self, name: &str) -> Vec<ResourceUrl>;

    fn get_resource(&self, name: &str) -> Option<ResourceUrl> {
        self.find_resource(name)
    }

    /// Every resource named `name` visible through this loader and its parents.
    fn get_resources(&self, name: &str) -> Vec<ResourceUrl>;

    fn open_resource(&self, url: &ResourceUrl) -> Result<Box<dyn Read + Send>>;

    fn load_class(&self, name: &str) -> Result<LoadedClass>;
}

/// A class located and validated by a loader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedClass {
    pub name: String,
    pub url: ResourceUrl,
    pub info: ClassInfo,
}

impl LoadedClass {
    /// Validates `bytes` as the class file for `name`.
    pub fn define(name: &str, url: ResourceUrl, bytes: &[u8]) -> Result<Self> {
        let info = ClassInfo::parse(bytes).map_err(|err| ArchiveError::ClassFormat {
            name: name.to_owned(),
            reason: err.to_string(),
        })?;
        if info.this_class != name {
            return Err(ArchiveError::ClassFormat {
                name: name.to_owned(),
                reason: format!("class file declares {}", info.this_class),
            });
        }
        Ok(Self {
            name: name.to_owned(),
            url,
            info,
        })
    }
}

/// Resource path of the class file for a binary class name.
pub fn class_resource_name(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

fn class_not_found(name: &str) -> ArchiveError {
    ArchiveError::ClassNotFound {
        name: name.to_owned(),
    }
}

/// Opens `file:` and `jar:file:` URLs.
pub fn open_on_disk(url: &ResourceUrl) -> Result<Box<dyn Read + Send>> {
    match url {
        ResourceUrl::File(path) => {
            let file = File::open(path).map_err(|source| ArchiveError::Read {
                path: path.clone(),
                source,
            })?;
            Ok(Box::new(file))
        }
        ResourceUrl::Jar { jar, entry } => {
            let file = File::open(jar).map_err(|source| ArchiveError::Read {
                path: jar.clone(),
                source,
            })?;
            let mut zip = ZipArchive::new(file)?;
            let mut buf = Vec::new();
            match zip.by_name(entry) {
                Ok(mut found) => {
                    found.read_to_end(&mut buf)?;
                }
                Err(zip::result::ZipError::FileNotFound) => {
                    return Err(ArchiveError::EntryNotFound {
                        archive: jar.display().to_string(),
                        path: entry.clone(),
                    })
                }
                Err(err) => return Err(err.into()),
            }
            Ok(Box::new(Cursor::new(buf)))
        }
        ResourceUrl::Archive { .. } => Err(ArchiveError::InvalidUrl {
            url: url.to_string(),
        }),
    }
}

/// The root of every loader chain: owns nothing.
#[derive(Debug, Default)]
pub struct BootstrapLoader;

impl ResourceLoader for BootstrapLoader {
    fn find_resource(&self, _name: &str) -> Option<ResourceUrl> {
        None
    }

    fn find_resources(&self, _name: &str) -> Vec<ResourceUrl> {
        Vec::new()
    }

    fn get_resources(&self, _name: &str) -> Vec<ResourceUrl> {
        Vec::new()
    }

    fn open_resource(&self, url: &ResourceUrl) -> Result<Box<dyn Read + Send>> {
        open_on_disk(url)
    }

    fn load_class(&self, name: &str) -> Result<LoadedClass> {
        Err(class_not_found(name))
    }
}

/// Reads a whole resource through `loader`.
pub fn read_resource(loader: &dyn ResourceLoader, url: &ResourceUrl) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    loader.open_resource(url)?.read_to_end(&mut buf)?;
    Ok(buf)
}
