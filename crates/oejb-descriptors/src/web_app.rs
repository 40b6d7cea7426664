//! `web.xml` reading.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ejb_jar::EnvEntry;
use crate::error::Result;
use crate::xml;

const DESCRIPTOR: &str = "web.xml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Servlet {
    pub name: String,
    pub class: Option<String>,
    pub url_patterns: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WebApp {
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub metadata_complete: bool,
    pub context_params: BTreeMap<String, String>,
    pub servlets: Vec<Servlet>,
    pub env_entries: Vec<EnvEntry>,
}

impl WebApp {
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc = xml::parse_document(text, DESCRIPTOR, "web-app")?;
        let root = doc.root_element();

        let context_params = xml::child_elements(&root, "context-param")
            .filter_map(|param| {
                Some((
                    xml::child_text(&param, "param-name")?,
                    xml::child_text(&param, "param-value").unwrap_or_default(),
                ))
            })
            .collect();

        let mut servlets: Vec<Servlet> = xml::child_elements(&root, "servlet")
            .filter_map(|servlet| {
                Some(Servlet {
                    name: xml::child_text(&servlet, "servlet-name")?,
                    class: xml::child_text(&servlet, "servlet-class"),
                    url_patterns: Vec::new(),
                })
            })
            .collect();
        for mapping in xml::child_elements(&root, "servlet-mapping") {
            let Some(name) = xml::child_text(&mapping, "servlet-name") else {
                continue;
            };
            if let Some(servlet) = servlets.iter_mut().find(|s| s.name == name) {
                servlet
                    .url_patterns
                    .extend(xml::child_texts(&mapping, "url-pattern"));
            }
        }

        Ok(WebApp {
            display_name: xml::child_text(&root, "display-name"),
            version: root.attribute("version").map(str::to_owned),
            metadata_complete: xml::bool_attribute(&root, "metadata-complete"),
            context_params,
            servlets,
            env_entries: EnvEntry::parse_all(&root, DESCRIPTOR)?,
        })
    }

    /// Unreadable descriptors yield an empty web application.
    pub fn parse_or_default(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|err| {
            tracing::debug!(target: "oejb.descriptors", error = %err, "ignoring unreadable web.xml");
            Self::default()
        })
    }
}
