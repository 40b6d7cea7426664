use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ArchiveError;

pub const ARCHIVE_SCHEME: &str = "archive:";

/// Location of a resource found by a class loader.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceUrl {
    /// `archive:<archive>/<path>`, served from a registered in-memory archive.
    Archive { archive: String, path: String },
    /// `file:<path>` on disk.
    File(PathBuf),
    /// `jar:file:<jar>!/<entry>` inside a jar on disk.
    Jar { jar: PathBuf, entry: String },
}

impl ResourceUrl {
    pub fn archive(archive: impl Into<String>, path: &str) -> Self {
        ResourceUrl::Archive {
            archive: archive.into(),
            path: path.trim_start_matches('/').to_owned(),
        }
    }

    pub fn archive_name(&self) -> Option<&str> {
        match self {
            ResourceUrl::Archive { archive, .. } => Some(archive),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceUrl::Archive { archive, path } => write!(f, "{ARCHIVE_SCHEME}{archive}/{path}"),
            ResourceUrl::File(path) => write!(f, "file:{}", path.display()),
            ResourceUrl::Jar { jar, entry } => write!(f, "jar:file:{}!/{entry}", jar.display()),
        }
    }
}

impl FromStr for ResourceUrl {
    type Err = ArchiveError;

    fn from_str(url: &str) -> Result<Self, Self::Err> {
        let invalid = || ArchiveError::InvalidUrl {
            url: url.to_owned(),
        };

        if let Some(rest) = url.strip_prefix(ARCHIVE_SCHEME) {
            let (archive, path) = rest.split_once('/').ok_or_else(invalid)?;
            if archive.is_empty() {
                return Err(invalid());
            }
            return Ok(ResourceUrl::archive(archive, path));
        }
        if let Some(rest) = url.strip_prefix("jar:file:") {
            let (jar, entry) = rest.split_once("!/").ok_or_else(invalid)?;
            return Ok(ResourceUrl::Jar {
                jar: PathBuf::from(jar),
                entry: entry.to_owned(),
            });
        }
        if let Some(rest) = url.strip_prefix("file:") {
            return Ok(ResourceUrl::File(PathBuf::from(rest)));
        }
        Err(invalid())
    }
}
