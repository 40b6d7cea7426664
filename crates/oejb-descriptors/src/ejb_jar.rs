//! `ejb-jar.xml`: module name and enterprise bean declarations.

use roxmltree::Node;
use serde::Serialize;

use crate::error::{DescriptorError, Result};
use crate::xml;

const DESCRIPTOR: &str = "ejb-jar.xml";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BeanKind {
    Stateless,
    Stateful,
    Singleton,
    MessageDriven,
    /// A plain managed bean, such as a test instance made injectable.
    Managed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TransactionType {
    Container,
    Bean,
}

impl TransactionType {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Container" => Some(TransactionType::Container),
            "Bean" => Some(TransactionType::Bean),
            _ => None,
        }
    }
}

/// An `<env-entry>` of a bean or web application.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnvEntry {
    pub name: String,
    pub entry_type: Option<String>,
    pub value: Option<String>,
}

impl EnvEntry {
    pub(crate) fn parse_all(node: &Node<'_, '_>, descriptor: &'static str) -> Result<Vec<EnvEntry>> {
        xml::child_elements(node, "env-entry")
            .map(|entry| {
                let name = xml::child_text(&entry, "env-entry-name")
                    .ok_or_else(|| DescriptorError::invalid(descriptor, "<env-entry> without <env-entry-name>"))?;
                Ok(EnvEntry {
                    name,
                    entry_type: xml::child_text(&entry, "env-entry-type"),
                    value: xml::child_text(&entry, "env-entry-value"),
                })
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnterpriseBean {
    pub kind: BeanKind,
    pub ejb_name: String,
    pub ejb_class: Option<String>,
    /// Exposes a no-interface local view.
    pub local_bean: bool,
    pub transaction_type: Option<TransactionType>,
    /// Hidden beans are not exported to application naming.
    pub hidden: bool,
    pub env_entries: Vec<EnvEntry>,
}

impl EnterpriseBean {
    pub fn new(kind: BeanKind, ejb_name: impl Into<String>, ejb_class: Option<String>) -> Self {
        Self {
            kind,
            ejb_name: ejb_name.into(),
            ejb_class,
            local_bean: false,
            transaction_type: None,
            hidden: false,
            env_entries: Vec::new(),
        }
    }

    pub fn managed(ejb_name: impl Into<String>, ejb_class: impl Into<String>, hidden: bool) -> Self {
        Self {
            hidden,
            ..Self::new(BeanKind::Managed, ejb_name, Some(ejb_class.into()))
        }
    }

    pub fn local_bean(mut self) -> Self {
        self.local_bean = true;
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = Some(transaction_type);
        self
    }

    fn parse(node: &Node<'_, '_>, kind: BeanKind) -> Result<Self> {
        let ejb_name = xml::child_text(node, "ejb-name").ok_or_else(|| {
            DescriptorError::invalid(
                DESCRIPTOR,
                format!("<{}> without <ejb-name>", node.tag_name().name()),
            )
        })?;
        let transaction_type = match xml::child_text(node, "transaction-type") {
            Some(raw) => Some(TransactionType::parse(&raw).ok_or_else(|| {
                DescriptorError::invalid(DESCRIPTOR, format!("unknown transaction-type \"{raw}\" on {ejb_name}"))
            })?),
            None => None,
        };
        Ok(Self {
            kind,
            ejb_class: xml::child_text(node, "ejb-class"),
            local_bean: xml::child_element(node, "local-bean").is_some(),
            transaction_type,
            hidden: false,
            env_entries: EnvEntry::parse_all(node, DESCRIPTOR)?,
            ejb_name,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EjbJar {
    pub module_name: Option<String>,
    pub version: Option<String>,
    pub metadata_complete: bool,
    enterprise_beans: Vec<EnterpriseBean>,
}

impl EjbJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitespace-only content is an empty descriptor.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc = xml::parse_document(text, DESCRIPTOR, "ejb-jar")?;
        let root = doc.root_element();
        let mut ejb_jar = EjbJar {
            module_name: xml::child_text(&root, "module-name"),
            version: root.attribute("version").map(str::to_owned),
            metadata_complete: xml::bool_attribute(&root, "metadata-complete"),
            enterprise_beans: Vec::new(),
        };

        let Some(beans) = xml::child_element(&root, "enterprise-beans") else {
            return Ok(ejb_jar);
        };
        for node in beans.children().filter(|n| n.is_element()) {
            let kind = match node.tag_name().name() {
                "session" => session_kind(&node)?,
                "message-driven" => BeanKind::MessageDriven,
                other => {
                    tracing::debug!(target: "oejb.descriptors", element = other, "ignoring unsupported enterprise bean element");
                    continue;
                }
            };
            ejb_jar.add_enterprise_bean(EnterpriseBean::parse(&node, kind)?);
        }
        Ok(ejb_jar)
    }

    /// Adds `bean`, replacing any bean with the same name.
    pub fn add_enterprise_bean(&mut self, bean: EnterpriseBean) -> &mut EnterpriseBean {
        let idx = match self
            .enterprise_beans
            .iter()
            .position(|existing| existing.ejb_name == bean.ejb_name)
        {
            Some(idx) => {
                self.enterprise_beans[idx] = bean;
                idx
            }
            None => {
                self.enterprise_beans.push(bean);
                self.enterprise_beans.len() - 1
            }
        };
        &mut self.enterprise_beans[idx]
    }

    pub fn enterprise_beans(&self) -> &[EnterpriseBean] {
        &self.enterprise_beans
    }

    pub fn enterprise_bean(&self, ejb_name: &str) -> Option<&EnterpriseBean> {
        self.enterprise_beans.iter().find(|b| b.ejb_name == ejb_name)
    }

    pub fn is_empty(&self) -> bool {
        self.enterprise_beans.is_empty()
    }
}

fn session_kind(node: &Node<'_, '_>) -> Result<BeanKind> {
    match xml::child_text(node, "session-type").as_deref() {
        None | Some("Stateless") => Ok(BeanKind::Stateless),
        Some("Stateful") => Ok(BeanKind::Stateful),
        Some("Singleton") => Ok(BeanKind::Singleton),
        Some(other) => Err(DescriptorError::invalid(
            DESCRIPTOR,
            format!("unknown session-type \"{other}\""),
        )),
    }
}
