//! Resolution of `archive:` URLs.
//!
//! Every class loader registers its archives here for as long as it is open.
//! Registrations are keyed by archive name; a different archive arriving
//! under a name already in use gets a suffixed key (`util.jar#2`), so loaders
//! never serve or unregister each other's archives. Streams opened through the
//! registry are tracked against their key so unregistering can close whatever
//! callers left open.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::archive::{Archive, Asset, WEB_INF_CLASSES};
use crate::error::{ArchiveError, Result};
use crate::url::ResourceUrl;

struct Registration {
    archive: Arc<Archive>,
    /// Loaders sharing this exact archive.
    owners: usize,
}

#[derive(Default)]
pub struct ArchiveRegistry {
    archives: RwLock<HashMap<String, Registration>>,
    streams: Mutex<HashMap<String, Vec<Weak<StreamSlot>>>>,
}

impl fmt::Debug for ArchiveRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.archives.read().keys().cloned().collect();
        keys.sort();
        f.debug_struct("ArchiveRegistry").field("archives", &keys).finish()
    }
}

impl ArchiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `archive` and returns the key its `archive:` URLs use.
    ///
    /// Registering the same archive again shares its key; each registration
    /// needs its own [`ArchiveRegistry::unregister`].
    pub fn register(&self, archive: Arc<Archive>) -> String {
        let name = archive.name().to_owned();
        let mut archives = self.archives.write();
        let mut suffix = 1;
        let mut key = name.clone();
        loop {
            match archives.entry(key.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Registration { archive, owners: 1 });
                    break;
                }
                Entry::Occupied(mut slot) if Arc::ptr_eq(&slot.get().archive, &archive) => {
                    slot.get_mut().owners += 1;
                    break;
                }
                Entry::Occupied(_) => {
                    suffix += 1;
                    key = format!("{name}#{suffix}");
                }
            }
        }
        tracing::trace!(target: "oejb.archive", archive = %name, key = %key, "registered archive");
        key
    }

    /// Drops one registration of `key`. The last one removes the archive,
    /// closes every stream still open on it and returns it.
    pub fn unregister(&self, key: &str) -> Option<Arc<Archive>> {
        let removed = {
            let mut archives = self.archives.write();
            let registration = archives.get_mut(key)?;
            registration.owners -= 1;
            if registration.owners > 0 {
                return None;
            }
            archives.remove(key).map(|registration| registration.archive)
        };
        let slots = self.streams.lock().remove(key).unwrap_or_default();
        let closed = slots
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|slot| slot.close())
            .count();
        if closed > 0 {
            tracing::debug!(target: "oejb.archive", archive = %key, closed, "closed open resource streams");
        }
        removed
    }

    pub fn get(&self, key: &str) -> Option<Arc<Archive>> {
        self.archives
            .read()
            .get(key)
            .map(|registration| registration.archive.clone())
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.archives.read().contains_key(key)
    }

    /// Finds the asset behind an `archive:` URL.
    ///
    /// Web-archive class resources are addressed without their
    /// `/WEB-INF/classes/` prefix; the prefixed entry is the fallback.
    pub fn resolve(&self, url: &ResourceUrl) -> Result<Asset> {
        let ResourceUrl::Archive { archive, path } = url else {
            return Err(ArchiveError::InvalidUrl {
                url: url.to_string(),
            });
        };
        let handle = self.get(archive).ok_or_else(|| ArchiveError::UnknownArchive {
            name: archive.clone(),
        })?;
        handle
            .get(path)
            .or_else(|| handle.get(&format!("{WEB_INF_CLASSES}{path}")))
            .cloned()
            .ok_or_else(|| ArchiveError::EntryNotFound {
                archive: archive.clone(),
                path: path.clone(),
            })
    }

    /// Opens a tracked stream on an `archive:` URL.
    ///
    /// The stream is released when it is closed or dropped.
    pub fn open(&self, url: &ResourceUrl) -> Result<ArchiveStream> {
        let asset = self.resolve(url)?;
        let reader = asset.open()?;
        let slot = Arc::new(StreamSlot {
            reader: Mutex::new(Some(reader)),
        });
        if let Some(archive) = url.archive_name() {
            let mut streams = self.streams.lock();
            let slots = streams.entry(archive.to_owned()).or_default();
            slots.retain(|slot| slot.upgrade().is_some_and(|slot| slot.is_open()));
            slots.push(Arc::downgrade(&slot));
        }
        Ok(ArchiveStream { slot })
    }

    /// Number of streams opened on `key` that are still open.
    pub fn open_streams(&self, key: &str) -> usize {
        self.streams
            .lock()
            .get(key)
            .map(|slots| {
                slots
                    .iter()
                    .filter_map(Weak::upgrade)
                    .filter(|slot| slot.is_open())
                    .count()
            })
            .unwrap_or(0)
    }
}

struct StreamSlot {
    reader: Mutex<Option<Box<dyn Read + Send>>>,
}

impl StreamSlot {
    /// Returns whether the slot was still open.
    fn close(&self) -> bool {
        self.reader.lock().take().is_some()
    }

    fn is_open(&self) -> bool {
        self.reader.lock().is_some()
    }
}

/// A readable resource stream; reads fail once the owning archive is unregistered.
pub struct ArchiveStream {
    slot: Arc<StreamSlot>,
}

impl fmt::Debug for ArchiveStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchiveStream")
            .field("open", &self.slot.is_open())
            .finish()
    }
}

impl ArchiveStream {
    pub fn close(&self) {
        self.slot.close();
    }
}

impl Read for ArchiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.slot.reader.lock().as_mut() {
            Some(reader) => reader.read(buf),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                ArchiveError::StreamClosed,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(archive: Archive) -> ArchiveRegistry {
        let registry = ArchiveRegistry::new();
        registry.register(Arc::new(archive));
        registry
    }

    #[test]
    fn web_inf_classes_is_a_fallback_prefix() {
        let registry = registry_with(
            Archive::new("shop.war").with_text("/WEB-INF/classes/META-INF/persistence.xml", "<p/>"),
        );
        let url = ResourceUrl::archive("shop.war", "META-INF/persistence.xml");
        let mut text = String::new();
        registry.open(&url).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "<p/>");
    }

    #[test]
    fn unknown_archives_and_entries_fail() {
        let registry = registry_with(Archive::new("a.jar"));
        assert!(matches!(
            registry.open(&ResourceUrl::archive("b.jar", "x")),
            Err(ArchiveError::UnknownArchive { .. })
        ));
        assert!(matches!(
            registry.open(&ResourceUrl::archive("a.jar", "x")),
            Err(ArchiveError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn archives_sharing_a_name_get_their_own_keys() {
        let registry = ArchiveRegistry::new();
        let first = Arc::new(Archive::new("util.jar").with_text("/config.txt", "first"));
        let second = Arc::new(Archive::new("util.jar").with_text("/config.txt", "second"));
        assert_eq!(registry.register(first.clone()), "util.jar");
        assert_eq!(registry.register(second), "util.jar#2");
        assert_eq!(registry.register(first), "util.jar");

        let read = |key: &str| {
            let mut text = String::new();
            registry
                .open(&ResourceUrl::archive(key, "config.txt"))
                .unwrap()
                .read_to_string(&mut text)
                .unwrap();
            text
        };
        assert_eq!(read("util.jar"), "first");
        assert_eq!(read("util.jar#2"), "second");

        assert!(registry.unregister("util.jar#2").is_some());
        assert_eq!(read("util.jar"), "first");
        assert!(registry.unregister("util.jar").is_none());
        assert!(registry.is_registered("util.jar"));
        assert!(registry.unregister("util.jar").is_some());
        assert!(!registry.is_registered("util.jar"));
        assert!(registry.unregister("util.jar").is_none());
    }

    #[test]
    fn dropped_streams_are_released() {
        let registry = registry_with(Archive::new("a.jar").with_text("/r.txt", "abc"));
        let url = ResourceUrl::archive("a.jar", "r.txt");
        let kept = registry.open(&url).unwrap();
        for _ in 0..3 {
            drop(registry.open(&url).unwrap());
        }
        assert_eq!(registry.open_streams("a.jar"), 1);
        assert_eq!(registry.streams.lock()["a.jar"].len(), 2);

        drop(kept);
        assert_eq!(registry.open_streams("a.jar"), 0);
    }

    #[test]
    fn unregister_closes_open_streams() {
        let registry = registry_with(Archive::new("a.jar").with_text("/r.txt", "abc"));
        let url = ResourceUrl::archive("a.jar", "r.txt");
        let mut first = registry.open(&url).unwrap();
        let second = registry.open(&url).unwrap();
        second.close();
        assert_eq!(registry.open_streams("a.jar"), 1);

        registry.unregister("a.jar");
        assert_eq!(registry.open_streams("a.jar"), 0);
        let mut buf = [0u8; 3];
        assert!(first.read(&mut buf).is_err());
        assert!(!registry.is_registered("a.jar"));
    }
}
