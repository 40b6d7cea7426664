//! In-memory deployment archives.
//!
//! An [`Archive`] is a flat map from absolute entry paths (`/META-INF/beans.xml`)
//! to [`Asset`]s. Nested library archives stay nested: a war's
//! `/WEB-INF/lib/foo.jar` is an `Asset::Archive` with its own entries.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use regex::Regex;
use zip::write::FileOptions;
use zip::ZipArchive;

use crate::error::{ArchiveError, Result};

pub const WEB_INF_CLASSES: &str = "/WEB-INF/classes/";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Jar,
    War,
    Ear,
}

impl ArchiveKind {
    /// Kind implied by an archive's file name; anything unknown is a jar.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".war") {
            ArchiveKind::War
        } else if lower.ends_with(".ear") {
            ArchiveKind::Ear
        } else {
            ArchiveKind::Jar
        }
    }

    /// Directory holding this kind's descriptors.
    pub fn descriptor_dir(self) -> &'static str {
        match self {
            ArchiveKind::War => "/WEB-INF/",
            ArchiveKind::Jar | ArchiveKind::Ear => "/META-INF/",
        }
    }
}

fn is_archive_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".jar") || lower.ends_with(".war") || lower.ends_with(".rar")
}

#[derive(Clone)]
pub enum Asset {
    Bytes(Arc<[u8]>),
    Archive(Arc<Archive>),
    /// Content left on disk, read on demand.
    File(PathBuf),
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Asset::Archive(archive) => write!(f, "Archive({})", archive.name()),
            Asset::File(path) => write!(f, "File({})", path.display()),
        }
    }
}

impl Asset {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Vec<u8> = bytes.into();
        Asset::Bytes(Arc::from(bytes))
    }

    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match self {
            Asset::Bytes(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            Asset::Archive(archive) => Ok(Box::new(Cursor::new(archive.to_zip_bytes()?))),
            Asset::File(path) => {
                let file = File::open(path).map_err(|source| ArchiveError::Read {
                    path: path.clone(),
                    source,
                })?;
                Ok(Box::new(file))
            }
        }
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            Asset::Bytes(bytes) => Ok(bytes.to_vec()),
            _ => {
                let mut buf = Vec::new();
                self.open()?.read_to_end(&mut buf)?;
                Ok(buf)
            }
        }
    }

    pub fn read_to_string(&self) -> Result<String> {
        let bytes = self.read()?;
        String::from_utf8(bytes).map_err(|err| {
            ArchiveError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
        })
    }

    pub fn as_archive(&self) -> Option<&Arc<Archive>> {
        match self {
            Asset::Archive(archive) => Some(archive),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Archive {
    name: String,
    kind: ArchiveKind,
    entries: BTreeMap<String, Asset>,
}

impl Archive {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: ArchiveKind::from_name(&name),
            name,
            entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArchiveKind {
        self.kind
    }

    pub fn add_asset(&mut self, path: &str, asset: Asset) -> &mut Self {
        self.entries.insert(normalize_path(path), asset);
        self
    }

    pub fn with_bytes(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.add_asset(path, Asset::bytes(bytes));
        self
    }

    pub fn with_text(self, path: &str, text: &str) -> Self {
        self.with_bytes(path, text.as_bytes().to_vec())
    }

    pub fn with_archive(mut self, path: &str, archive: Archive) -> Self {
        self.add_asset(path, Asset::Archive(Arc::new(archive)));
        self
    }

    pub fn with_file(mut self, path: &str, file: impl Into<PathBuf>) -> Self {
        self.add_asset(path, Asset::File(file.into()));
        self
    }

    pub fn get(&self, path: &str) -> Option<&Asset> {
        self.entries.get(&normalize_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, ordered by path.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Asset)> {
        self.entries.iter().map(|(path, asset)| (path.as_str(), asset))
    }

    /// Entries whose full path matches `pattern`.
    pub fn content_matching<'a>(&'a self, pattern: &'a Regex) -> impl Iterator<Item = (&'a str, &'a Asset)> + 'a {
        self.entries().filter(move |(path, _)| pattern.is_match(path))
    }

    /// Binary names of the classes this archive contributes.
    ///
    /// For web archives only `/WEB-INF/classes` counts; nested libraries are
    /// never included.
    pub fn class_names(&self) -> Vec<String> {
        self.entries
            .keys()
            .filter(|path| match self.kind {
                ArchiveKind::War => path.starts_with(WEB_INF_CLASSES),
                ArchiveKind::Jar | ArchiveKind::Ear => true,
            })
            .filter_map(|path| class_name_for(path))
            .collect()
    }

    /// Reads a zip archive held in memory. Nested `.jar`/`.war`/`.rar` entries
    /// become nested archives.
    pub fn from_zip_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let mut archive = Archive::new(name);
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let path = entry.name().to_owned();
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf)?;

            let file_name = path.rsplit('/').next().unwrap_or(&path).to_owned();
            if is_archive_name(&file_name) {
                match Archive::from_zip_bytes(file_name.clone(), &buf) {
                    Ok(nested) => {
                        archive.add_asset(&path, Asset::Archive(Arc::new(nested)));
                        continue;
                    }
                    Err(err) => tracing::debug!(
                        target: "oejb.archive",
                        archive = %archive.name,
                        entry = %path,
                        error = %err,
                        "nested entry is not a readable archive; keeping raw bytes"
                    ),
                }
            }
            archive.add_asset(&path, Asset::bytes(buf));
        }
        Ok(archive)
    }

    /// Opens a packaged archive file, or an exploded archive directory whose
    /// files are read lazily.
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if path.is_dir() {
            let mut archive = Archive::new(name);
            for entry in walkdir::WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| entry.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(relative) = entry.path().strip_prefix(path) else {
                    continue;
                };
                let relative = relative.to_string_lossy().replace('\\', "/");
                archive.add_asset(&relative, Asset::File(entry.path().to_path_buf()));
            }
            return Ok(archive);
        }

        let bytes = std::fs::read(path).map_err(|source| ArchiveError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Archive::from_zip_bytes(name, &bytes)
    }

    /// Serializes the archive (and nested archives) back into zip bytes.
    pub fn to_zip_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::<()>::default();
        for (path, asset) in &self.entries {
            zip.start_file(path.trim_start_matches('/'), options.clone())?;
            let bytes = asset.read()?;
            zip.write_all(&bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

/// Absolute, `/`-separated form of an entry path.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for component in path.split(['/', '\\']).filter(|c| !c.is_empty()) {
        out.push('/');
        out.push_str(component);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Binary class name for a `.class` entry path, `None` for other entries.
///
/// `/WEB-INF/classes/a/B.class` and `/a/B.class` both map to `a.B`;
/// `module-info` and `package-info` are not classes.
pub fn class_name_for(path: &str) -> Option<String> {
    let path = normalize_path(path);
    let relative = path
        .strip_prefix(WEB_INF_CLASSES)
        .unwrap_or_else(|| &path[1..]);
    let stem = relative.strip_suffix(".class")?;
    if stem == "module-info" || stem.ends_with("package-info") {
        return None;
    }
    Some(stem.replace('/', "."))
}
