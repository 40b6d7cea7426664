//! Deployment descriptor readers.
//!
//! Each descriptor is parsed with `roxmltree` into a small owned model. Only
//! the elements deployment assembly consumes are kept.

mod beans;
mod ejb_jar;
mod error;
mod openejb_jar;
mod properties;
mod web_app;
mod xml;

pub use beans::{Beans, BeansContribution, CompositeBeans, DiscoveryMode, Duplicates};
pub use ejb_jar::{BeanKind, EjbJar, EnterpriseBean, EnvEntry, TransactionType};
pub use error::{DescriptorError, Result};
pub use openejb_jar::{EjbDeployment, OpenejbJar};
pub use properties::Properties;
pub use web_app::{Servlet, WebApp};

/// File names of the descriptors recognized in `META-INF/` or `WEB-INF/`.
pub mod names {
    pub const BEANS_XML: &str = "beans.xml";
    pub const EJB_JAR_XML: &str = "ejb-jar.xml";
    pub const OPENEJB_JAR_XML: &str = "openejb-jar.xml";
    pub const PERSISTENCE_XML: &str = "persistence.xml";
    pub const VALIDATION_XML: &str = "validation.xml";
    pub const RESOURCES_XML: &str = "resources.xml";
    pub const ENV_ENTRIES_PROPERTIES: &str = "env-entries.properties";
    pub const WEB_XML: &str = "web.xml";
}
