use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use oejb_config::ClassLoaderConfig;

use crate::archive::{Archive, ArchiveKind, Asset, WEB_INF_CLASSES};
use crate::error::Result;
use crate::registry::ArchiveRegistry;
use crate::url::ResourceUrl;

use super::{class_not_found, class_resource_name, open_on_disk, LoadedClass, ResourceLoader};

/// Service files naming CDI portable extensions.
pub const CDI_EXTENSION_SERVICES: [&str; 2] = [
    "META-INF/services/javax.enterprise.inject.spi.Extension",
    "META-INF/services/jakarta.enterprise.inject.spi.Extension",
];

const WEB_INF_LIB: &str = "/WEB-INF/lib/";

/// Class loader serving classes and resources out of in-memory archives.
///
/// Archives are registered with the [`ArchiveRegistry`] for as long as the
/// loader is open, so the `archive:` URLs it hands out stay resolvable. URLs
/// carry the registration key, which differs from the archive name when
/// another loader registered a different archive under the same name.
/// A single resource lookup prefers the *last* archive containing the name;
/// multi-resource lookups report every archive in order.
#[derive(Debug)]
pub struct ArchiveClassLoader {
    registry: Arc<ArchiveRegistry>,
    parent: Arc<dyn ResourceLoader>,
    archives: Vec<Arc<Archive>>,
    /// Registry key of each archive, index for index.
    keys: Vec<String>,
    container_extensions: bool,
    extension_markers: Vec<String>,
    closed: AtomicBool,
}

impl ArchiveClassLoader {
    /// Web archives contribute their `/WEB-INF/lib` libraries as additional
    /// archives, placed right after the web archive itself. Archives are
    /// unique by name; later duplicates are dropped.
    pub fn new(
        registry: Arc<ArchiveRegistry>,
        parent: Arc<dyn ResourceLoader>,
        archives: impl IntoIterator<Item = Arc<Archive>>,
        config: &ClassLoaderConfig,
    ) -> Self {
        let mut expanded: Vec<Arc<Archive>> = Vec::new();
        let mut push = |archive: Arc<Archive>| {
            if !expanded.iter().any(|known| known.name() == archive.name()) {
                expanded.push(archive);
            }
        };
        for archive in archives {
            let libraries = web_libraries(&archive);
            push(archive);
            libraries.into_iter().for_each(&mut push);
        }
        let keys = expanded
            .iter()
            .map(|archive| registry.register(archive.clone()))
            .collect();
        tracing::debug!(
            target: "oejb.classloader",
            archives = expanded.len(),
            "created archive class loader"
        );
        Self {
            registry,
            parent,
            archives: expanded,
            keys,
            container_extensions: config.container_extensions,
            extension_markers: config.extension_markers.clone(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn archives(&self) -> &[Arc<Archive>] {
        &self.archives
    }

    pub fn parent(&self) -> &Arc<dyn ResourceLoader> {
        &self.parent
    }

    pub fn registry(&self) -> &Arc<ArchiveRegistry> {
        &self.registry
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Unregisters every archive, closing streams still open on them.
    /// Closing twice is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for key in &self.keys {
            self.registry.unregister(key);
        }
        tracing::debug!(target: "oejb.classloader", archives = self.archives.len(), "closed archive class loader");
    }

    /// Registry key and archive of every archive still served.
    fn own_archives(&self) -> impl DoubleEndedIterator<Item = (&str, &Arc<Archive>)> + '_ {
        let open = if self.is_closed() { 0 } else { self.archives.len() };
        self.keys[..open]
            .iter()
            .map(String::as_str)
            .zip(&self.archives[..open])
    }

    fn is_extension_service(name: &str) -> bool {
        CDI_EXTENSION_SERVICES.contains(&name)
    }

    fn is_container_provided(&self, url: &ResourceUrl) -> bool {
        let url = url.to_string();
        self.extension_markers
            .iter()
            .any(|marker| url.contains(marker.as_str()))
    }
}

fn web_libraries(archive: &Archive) -> Vec<Arc<Archive>> {
    if archive.kind() != ArchiveKind::War {
        return Vec::new();
    }
    archive
        .entries()
        .filter(|(path, _)| path.starts_with(WEB_INF_LIB))
        .filter_map(|(_, asset)| asset.as_archive().cloned())
        .collect()
}

/// The asset backing resource `name` in `archive`, honouring the
/// `/WEB-INF/classes` root of web archives.
fn locate<'a>(archive: &'a Archive, name: &str) -> Option<&'a Asset> {
    archive.get(name).or_else(|| match archive.kind() {
        ArchiveKind::War => archive.get(&format!("{WEB_INF_CLASSES}{name}")),
        ArchiveKind::Jar | ArchiveKind::Ear => None,
    })
}

fn resource_name(name: &str) -> &str {
    name.trim_start_matches('/')
}

impl ResourceLoader for ArchiveClassLoader {
    fn find_resource(&self, name: &str) -> Option<ResourceUrl> {
        let name = resource_name(name);
        self.own_archives()
            .rev()
            .find(|(_, archive)| locate(archive, name).is_some())
            .map(|(key, _)| ResourceUrl::archive(key, name))
            .or_else(|| self.parent.find_resource(name))
    }

    fn find_resources(&self, name: &str) -> Vec<ResourceUrl> {
        let name = resource_name(name);
        self.own_archives()
            .filter(|(_, archive)| locate(archive, name).is_some())
            .map(|(key, _)| ResourceUrl::archive(key, name))
            .collect()
    }

    fn get_resources(&self, name: &str) -> Vec<ResourceUrl> {
        let name = resource_name(name);
        let mut urls = self.find_resources(name);
        if Self::is_extension_service(name) {
            if self.container_extensions {
                urls.extend(
                    self.parent
                        .get_resources(name)
                        .into_iter()
                        .filter(|url| self.is_container_provided(url)),
                );
            }
        } else {
            urls.extend(self.parent.get_resources(name));
        }
        urls
    }

    fn open_resource(&self, url: &ResourceUrl) -> Result<Box<dyn Read + Send>> {
        match url {
            ResourceUrl::Archive { .. } => Ok(Box::new(self.registry.open(url)?)),
            _ => open_on_disk(url),
        }
    }

    fn load_class(&self, name: &str) -> Result<LoadedClass> {
        match self.parent.load_class(name) {
            Err(err) if err.is_class_not_found() => {}
            found => return found,
        }

        let resource = class_resource_name(name);
        let Some((key, asset)) = self
            .own_archives()
            .rev()
            .find_map(|(key, archive)| locate(archive, &resource).map(|asset| (key, asset)))
        else {
            return Err(class_not_found(name));
        };
        let bytes = asset.read()?;
        let class = LoadedClass::define(name, ResourceUrl::archive(key, &resource), &bytes)?;
        tracing::trace!(target: "oejb.classloader", class = %name, archive = %key, "loaded class");
        Ok(class)
    }
}

impl Drop for ArchiveClassLoader {
    fn drop(&mut self) {
        self.close();
    }
}
