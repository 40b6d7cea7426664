//! `openejb-jar.xml`: container properties and deployment ids.

use serde::Serialize;

use crate::ejb_jar::EnterpriseBean;
use crate::error::{DescriptorError, Result};
use crate::properties::Properties;
use crate::xml;

const DESCRIPTOR: &str = "openejb-jar.xml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EjbDeployment {
    pub ejb_name: String,
    pub deployment_id: Option<String>,
    pub container_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OpenejbJar {
    pub properties: Properties,
    deployments: Vec<EjbDeployment>,
}

impl OpenejbJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let doc = xml::parse_document(text, DESCRIPTOR, "openejb-jar")?;
        let root = doc.root_element();
        let mut openejb_jar = OpenejbJar {
            properties: xml::child_element(&root, "properties")
                .and_then(|node| node.text().map(Properties::parse))
                .unwrap_or_default(),
            deployments: Vec::new(),
        };
        for node in xml::child_elements(&root, "ejb-deployment") {
            let ejb_name = node
                .attribute("ejb-name")
                .ok_or_else(|| DescriptorError::invalid(DESCRIPTOR, "<ejb-deployment> without ejb-name"))?;
            openejb_jar.deployments.push(EjbDeployment {
                ejb_name: ejb_name.to_owned(),
                deployment_id: node.attribute("deployment-id").map(str::to_owned),
                container_id: node.attribute("container-id").map(str::to_owned),
            });
        }
        Ok(openejb_jar)
    }

    /// Deployment entry for `bean`, created if missing.
    pub fn add_ejb_deployment(&mut self, bean: &EnterpriseBean) -> &mut EjbDeployment {
        let idx = match self
            .deployments
            .iter()
            .position(|d| d.ejb_name == bean.ejb_name)
        {
            Some(idx) => idx,
            None => {
                self.deployments.push(EjbDeployment {
                    ejb_name: bean.ejb_name.clone(),
                    deployment_id: None,
                    container_id: None,
                });
                self.deployments.len() - 1
            }
        };
        &mut self.deployments[idx]
    }

    pub fn deployments(&self) -> &[EjbDeployment] {
        &self.deployments
    }

    pub fn deployment(&self, ejb_name: &str) -> Option<&EjbDeployment> {
        self.deployments.iter().find(|d| d.ejb_name == ejb_name)
    }
}
