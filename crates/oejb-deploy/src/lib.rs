//! Deployment assembly for the embedded EJB container.
//!
//! [`ArchiveProcessor`] turns an [`oejb_archive::Archive`] into an
//! [`AppModule`]: class loaders over the archive and its libraries, merged
//! `beans.xml`, scanned classes and the alternate descriptors found along
//! the way. [`DeployableContainer`] drives it per deploy/undeploy call and
//! wires the result into a fresh JNDI tree through a [`JndiAssembler`].

mod assembler;
mod closeables;
mod container;
mod error;
mod finder;
mod module;
mod processor;

pub use assembler::{BeanHandle, DefaultAssembler, JndiAssembler};
pub use closeables::{Closeable, Closeables};
pub use container::{DeployableContainer, DeploymentInfo};
pub use error::{DeployErrorKind, DeploymentError, Result};
pub use finder::{load_classes, ClassFinder};
pub use module::{
    AltDescriptor, AltDescriptors, AppModule, AppSummary, DescriptorSource, EjbModule,
    EjbModuleSummary, WebModule, WebModuleSummary, EAR_SCOPED_CDI_BEANS,
};
pub use processor::{
    context_root, default_module_name, library_url, ArchiveProcessor, TestClass,
    MAIN_BEANS_XML_URL,
};
