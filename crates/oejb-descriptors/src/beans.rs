//! CDI `beans.xml` descriptors and their per-URL aggregation.

use std::fmt;

use serde::Serialize;

use crate::error::{DescriptorError, Result};
use crate::xml;

const DESCRIPTOR: &str = "beans.xml";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscoveryMode {
    All,
    Annotated,
    None,
    Trim,
}

impl DiscoveryMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ALL" => Some(DiscoveryMode::All),
            "ANNOTATED" => Some(DiscoveryMode::Annotated),
            "NONE" => Some(DiscoveryMode::None),
            "TRIM" => Some(DiscoveryMode::Trim),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DiscoveryMode::All => "ALL",
            DiscoveryMode::Annotated => "ANNOTATED",
            DiscoveryMode::None => "NONE",
            DiscoveryMode::Trim => "TRIM",
        }
    }
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `beans.xml` document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Beans {
    pub version: Option<String>,
    pub bean_discovery_mode: Option<DiscoveryMode>,
    pub trim: bool,
    pub interceptors: Vec<String>,
    pub decorators: Vec<String>,
    pub alternative_classes: Vec<String>,
    pub alternative_stereotypes: Vec<String>,
    pub scan_excludes: Vec<String>,
}

impl Beans {
    /// An empty (whitespace-only) document is a marker file that enables
    /// discovery of everything.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Beans {
                bean_discovery_mode: Some(DiscoveryMode::All),
                ..Beans::default()
            });
        }

        let doc = xml::parse_document(text, DESCRIPTOR, "beans")?;
        let root = doc.root_element();
        let bean_discovery_mode = match root.attribute("bean-discovery-mode") {
            Some(raw) => Some(DiscoveryMode::parse(raw).ok_or_else(|| {
                DescriptorError::invalid(DESCRIPTOR, format!("unknown bean-discovery-mode \"{raw}\""))
            })?),
            None => None,
        };

        let mut beans = Beans {
            version: root.attribute("version").map(str::to_owned),
            bean_discovery_mode,
            trim: xml::child_element(&root, "trim").is_some(),
            ..Beans::default()
        };
        if let Some(node) = xml::child_element(&root, "interceptors") {
            beans.interceptors = xml::child_texts(&node, "class");
        }
        if let Some(node) = xml::child_element(&root, "decorators") {
            beans.decorators = xml::child_texts(&node, "class");
        }
        if let Some(node) = xml::child_element(&root, "alternatives") {
            beans.alternative_classes = xml::child_texts(&node, "class");
            beans.alternative_stereotypes = xml::child_texts(&node, "stereotype");
        }
        if let Some(scan) = xml::child_element(&root, "scan") {
            beans.scan_excludes = xml::child_elements(&scan, "exclude")
                .filter_map(|exclude| exclude.attribute("name").map(str::to_owned))
                .collect();
        }
        Ok(beans)
    }

    /// Mode in effect: `ALL` when unspecified, `TRIM` for a trimmed `ALL`.
    pub fn discovery_mode(&self) -> DiscoveryMode {
        match self.bean_discovery_mode {
            None => DiscoveryMode::All,
            Some(DiscoveryMode::All) if self.trim => DiscoveryMode::Trim,
            Some(mode) => mode,
        }
    }
}

/// What a single `beans.xml` contributed to a [`CompositeBeans`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BeansContribution {
    pub url: String,
    pub discovery_mode: DiscoveryMode,
    pub interceptors: Vec<String>,
    pub decorators: Vec<String>,
    pub alternative_classes: Vec<String>,
    pub alternative_stereotypes: Vec<String>,
}

/// Classes listed more than once inside the same `beans.xml`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Duplicates {
    pub alternative_classes: Vec<String>,
    pub alternative_stereotypes: Vec<String>,
    pub decorators: Vec<String>,
    pub interceptors: Vec<String>,
}

impl Duplicates {
    pub fn is_empty(&self) -> bool {
        self.alternative_classes.is_empty()
            && self.alternative_stereotypes.is_empty()
            && self.decorators.is_empty()
            && self.interceptors.is_empty()
    }

    fn record(list: &[String], into: &mut Vec<String>) {
        for (idx, class) in list.iter().enumerate() {
            if list[..idx].contains(class) && !into.contains(class) {
                into.push(class.clone());
            }
        }
    }
}

/// Bean descriptors from several archives, keyed by the URL each came from.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompositeBeans {
    contributions: Vec<BeansContribution>,
    scan_excludes: Vec<String>,
    duplicates: Duplicates,
}

impl CompositeBeans {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `beans` as the descriptor found at `url`. Each URL merges once.
    pub fn merge(&mut self, url: impl Into<String>, beans: &Beans) -> Result<()> {
        let url = url.into();
        if self.contribution(&url).is_some() {
            return Err(DescriptorError::Merge {
                url,
                reason: "a descriptor was already merged for this url".to_owned(),
            });
        }

        Duplicates::record(&beans.alternative_classes, &mut self.duplicates.alternative_classes);
        Duplicates::record(
            &beans.alternative_stereotypes,
            &mut self.duplicates.alternative_stereotypes,
        );
        Duplicates::record(&beans.decorators, &mut self.duplicates.decorators);
        Duplicates::record(&beans.interceptors, &mut self.duplicates.interceptors);
        self.scan_excludes.extend(beans.scan_excludes.iter().cloned());

        tracing::trace!(target: "oejb.descriptors", url = %url, mode = %beans.discovery_mode(), "merged beans.xml");
        self.contributions.push(BeansContribution {
            url,
            discovery_mode: beans.discovery_mode(),
            interceptors: beans.interceptors.clone(),
            decorators: beans.decorators.clone(),
            alternative_classes: beans.alternative_classes.clone(),
            alternative_stereotypes: beans.alternative_stereotypes.clone(),
        });
        Ok(())
    }

    /// Parses and merges raw `beans.xml` content; parse failures become
    /// [`DescriptorError::Merge`] errors naming the url.
    pub fn merge_text(&mut self, url: impl Into<String>, text: &str) -> Result<()> {
        let url = url.into();
        let beans = Beans::parse(text).map_err(|err| DescriptorError::Merge {
            url: url.clone(),
            reason: err.to_string(),
        })?;
        self.merge(url, &beans)
    }

    pub fn contributions(&self) -> &[BeansContribution] {
        &self.contributions
    }

    pub fn contribution(&self, url: &str) -> Option<&BeansContribution> {
        self.contributions.iter().find(|c| c.url == url)
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.contributions.iter().map(|c| c.url.as_str())
    }

    pub fn discovery_mode(&self, url: &str) -> Option<DiscoveryMode> {
        self.contribution(url).map(|c| c.discovery_mode)
    }

    pub fn interceptors(&self) -> impl Iterator<Item = &str> {
        self.contributions
            .iter()
            .flat_map(|c| c.interceptors.iter().map(String::as_str))
    }

    pub fn decorators(&self) -> impl Iterator<Item = &str> {
        self.contributions
            .iter()
            .flat_map(|c| c.decorators.iter().map(String::as_str))
    }

    pub fn alternative_classes(&self) -> impl Iterator<Item = &str> {
        self.contributions
            .iter()
            .flat_map(|c| c.alternative_classes.iter().map(String::as_str))
    }

    pub fn scan_excludes(&self) -> &[String] {
        &self.scan_excludes
    }

    pub fn duplicates(&self) -> &Duplicates {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }
}
