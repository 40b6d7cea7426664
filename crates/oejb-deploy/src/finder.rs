//! Scanned class view of a module.

use std::collections::BTreeMap;
use std::sync::Arc;

use oejb_archive::{Archive, LoadedClass, ResourceLoader};
use oejb_descriptors::BeanKind;

/// EJB component-defining annotations, in both namespaces.
const COMPONENT_ANNOTATIONS: [(&str, BeanKind); 8] = [
    ("jakarta.ejb.Stateless", BeanKind::Stateless),
    ("jakarta.ejb.Stateful", BeanKind::Stateful),
    ("jakarta.ejb.Singleton", BeanKind::Singleton),
    ("jakarta.ejb.MessageDriven", BeanKind::MessageDriven),
    ("javax.ejb.Stateless", BeanKind::Stateless),
    ("javax.ejb.Stateful", BeanKind::Stateful),
    ("javax.ejb.Singleton", BeanKind::Singleton),
    ("javax.ejb.MessageDriven", BeanKind::MessageDriven),
];

/// Classes a module scanned successfully, plus the class names each bean
/// archive (keyed by its `beans.xml` URL) contributed.
#[derive(Clone, Debug, Default)]
pub struct ClassFinder {
    classes: Vec<LoadedClass>,
    classes_by_url: BTreeMap<String, Vec<String>>,
}

impl ClassFinder {
    pub fn new(classes: Vec<LoadedClass>, classes_by_url: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            classes,
            classes_by_url,
        }
    }

    pub fn classes(&self) -> &[LoadedClass] {
        &self.classes
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|class| class.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.iter().any(|class| class.name == name)
    }

    pub fn classes_by_url(&self) -> &BTreeMap<String, Vec<String>> {
        &self.classes_by_url
    }

    pub fn find_annotated_classes<'a>(&'a self, annotation: &'a str) -> impl Iterator<Item = &'a LoadedClass> + 'a {
        self.classes
            .iter()
            .filter(move |class| class.info.has_annotation(annotation))
    }

    /// Concrete classes carrying an EJB component annotation.
    pub fn enterprise_beans(&self) -> Vec<(BeanKind, &LoadedClass)> {
        self.classes
            .iter()
            .filter(|class| !class.info.is_interface() && !class.info.is_abstract())
            .filter_map(|class| {
                COMPONENT_ANNOTATIONS
                    .iter()
                    .find(|(annotation, _)| class.info.has_annotation(annotation))
                    .map(|(_, kind)| (*kind, class))
            })
            .collect()
    }
}

/// Loads every class `archive` contributes through `loader`. Classes that
/// fail to load are logged and skipped.
pub fn load_classes(archive: &Archive, loader: &Arc<dyn ResourceLoader>) -> Vec<LoadedClass> {
    let mut loaded = Vec::new();
    for name in archive.class_names() {
        match loader.load_class(&name) {
            Ok(class) => loaded.push(class),
            Err(err) => tracing::debug!(
                target: "oejb.deploy",
                archive = %archive.name(),
                class = %name,
                error = %err,
                "can't load class; skipping"
            ),
        }
    }
    loaded
}
