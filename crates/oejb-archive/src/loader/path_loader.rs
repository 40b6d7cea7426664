use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use zip::ZipArchive;

use crate::error::{ArchiveError, Result};
use crate::url::ResourceUrl;

use super::{class_not_found, class_resource_name, open_on_disk, LoadedClass, ResourceLoader};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClasspathEntry {
    Jar(PathBuf),
    ClassDir(PathBuf),
}

impl ClasspathEntry {
    /// Directories are class directories; anything else is treated as a jar.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            ClasspathEntry::ClassDir(path)
        } else {
            ClasspathEntry::Jar(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ClasspathEntry::Jar(path) | ClasspathEntry::ClassDir(path) => path,
        }
    }
}

/// Loader over on-disk classpath entries; the first entry containing a
/// resource wins.
#[derive(Debug, Default)]
pub struct PathClassLoader {
    parent: Option<Arc<dyn ResourceLoader>>,
    entries: RwLock<Vec<ClasspathEntry>>,
    jar_index: Mutex<HashMap<PathBuf, Arc<BTreeSet<String>>>>,
}

impl PathClassLoader {
    pub fn new(parent: Option<Arc<dyn ResourceLoader>>) -> Self {
        Self {
            parent,
            ..Self::default()
        }
    }

    pub fn with_entries(
        parent: Option<Arc<dyn ResourceLoader>>,
        entries: impl IntoIterator<Item = ClasspathEntry>,
    ) -> Self {
        let loader = Self::new(parent);
        loader.entries.write().extend(entries);
        loader
    }

    pub fn add_entry(&self, entry: ClasspathEntry) {
        let mut entries = self.entries.write();
        if !entries.contains(&entry) {
            tracing::debug!(target: "oejb.classloader", path = %entry.path().display(), "added classpath entry");
            entries.push(entry);
        }
    }

    pub fn add_path(&self, path: impl Into<PathBuf>) {
        self.add_entry(ClasspathEntry::from_path(path));
    }

    pub fn entries(&self) -> Vec<ClasspathEntry> {
        self.entries.read().clone()
    }

    /// Entry names of a jar, read once and cached. Unreadable jars contain nothing.
    fn jar_entries(&self, jar: &Path) -> Arc<BTreeSet<String>> {
        if let Some(index) = self.jar_index.lock().get(jar) {
            return index.clone();
        }
        let index = match read_jar_index(jar) {
            Ok(index) => index,
            Err(err) => {
                tracing::debug!(target: "oejb.classloader", jar = %jar.display(), error = %err, "skipping unreadable jar");
                BTreeSet::new()
            }
        };
        let index = Arc::new(index);
        self.jar_index.lock().insert(jar.to_path_buf(), index.clone());
        index
    }

    fn lookup(&self, entry: &ClasspathEntry, name: &str) -> Option<ResourceUrl> {
        match entry {
            ClasspathEntry::Jar(jar) => self.jar_entries(jar).contains(name).then(|| ResourceUrl::Jar {
                jar: jar.clone(),
                entry: name.to_owned(),
            }),
            ClasspathEntry::ClassDir(dir) => {
                let path = dir.join(name);
                path.is_file().then_some(ResourceUrl::File(path))
            }
        }
    }

    fn own_resource(&self, name: &str) -> Option<ResourceUrl> {
        let name = name.trim_start_matches('/');
        self.entries
            .read()
            .iter()
            .find_map(|entry| self.lookup(entry, name))
    }
}

fn read_jar_index(jar: &Path) -> Result<BTreeSet<String>> {
    let file = File::open(jar).map_err(|source| ArchiveError::Read {
        path: jar.to_path_buf(),
        source,
    })?;
    let zip = ZipArchive::new(file)?;
    Ok(zip
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_owned)
        .collect())
}

impl ResourceLoader for PathClassLoader {
    fn find_resource(&self, name: &str) -> Option<ResourceUrl> {
        self.own_resource(name)
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.find_resource(name)))
    }

    fn find_resources(&self, name: &str) -> Vec<ResourceUrl> {
        let name = name.trim_start_matches('/');
        self.entries
            .read()
            .iter()
            .filter_map(|entry| self.lookup(entry, name))
            .collect()
    }

    fn get_resource(&self, name: &str) -> Option<ResourceUrl> {
        self.parent
            .as_ref()
            .and_then(|parent| parent.get_resource(name))
            .or_else(|| self.own_resource(name))
    }

    fn get_resources(&self, name: &str) -> Vec<ResourceUrl> {
        let mut urls = self
            .parent
            .as_ref()
            .map(|parent| parent.get_resources(name))
            .unwrap_or_default();
        urls.extend(self.find_resources(name));
        urls
    }

    fn open_resource(&self, url: &ResourceUrl) -> Result<Box<dyn Read + Send>> {
        match (&self.parent, url) {
            (Some(parent), ResourceUrl::Archive { .. }) => parent.open_resource(url),
            _ => open_on_disk(url),
        }
    }

    fn load_class(&self, name: &str) -> Result<LoadedClass> {
        if let Some(parent) = &self.parent {
            match parent.load_class(name) {
                Err(err) if err.is_class_not_found() => {}
                found => return found,
            }
        }
        let Some(url) = self.own_resource(&class_resource_name(name)) else {
            return Err(class_not_found(name));
        };
        let mut bytes = Vec::new();
        open_on_disk(&url)?.read_to_end(&mut bytes)?;
        LoadedClass::define(name, url, &bytes)
    }
}
