//! Wiring an assembled [`AppModule`] into a deployment's JNDI tree.

use std::collections::BTreeMap;

use oejb_descriptors::names::ENV_ENTRIES_PROPERTIES;
use oejb_descriptors::BeanKind;
use oejb_naming::{Binding, IvmContext, NamingError, Reference};

use crate::module::{AppModule, EjbModule};

/// Publishes an application's components into its JNDI tree.
pub trait JndiAssembler: Send + Sync {
    fn assemble(&self, app: &AppModule, root: &IvmContext) -> Result<(), NamingError>;
}

/// What `openejb/Deployment/<id>/<class>` holds for a deployed bean.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeanHandle {
    pub deployment_id: String,
    pub module_id: String,
    pub ejb_name: String,
    pub ejb_class: String,
    pub kind: BeanKind,
}

/// Binds env entries under `comp/env/<key>` and every enterprise bean under
/// `openejb/Deployment/<deployment-id>/<class>`, with a
/// `global/<module>/<ejb-name>` reference to it unless the bean is hidden.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAssembler;

impl JndiAssembler for DefaultAssembler {
    fn assemble(&self, app: &AppModule, root: &IvmContext) -> Result<(), NamingError> {
        // The same properties may be attached to several modules; first one wins.
        let mut env = BTreeMap::new();
        for module in &app.ejb_modules {
            let Some(properties) = module
                .alt_dd(ENV_ENTRIES_PROPERTIES)
                .and_then(|dd| dd.as_properties())
            else {
                continue;
            };
            for (key, value) in properties.iter() {
                env.entry(key.to_owned()).or_insert_with(|| value.to_owned());
            }
        }
        for (key, value) in env {
            root.bind(&format!("comp/env/{key}"), Binding::object(value))?;
        }

        for module in &app.ejb_modules {
            for handle in beans_of(module) {
                bind_bean(root, &handle, is_hidden(module, &handle.ejb_name))?;
            }
        }
        Ok(())
    }
}

fn is_hidden(module: &EjbModule, ejb_name: &str) -> bool {
    module
        .ejb_jar
        .enterprise_bean(ejb_name)
        .is_some_and(|bean| bean.hidden)
}

/// Declared beans first, then annotated classes the descriptor doesn't name.
fn beans_of(module: &EjbModule) -> Vec<BeanHandle> {
    let deployment_id = |ejb_name: &str| {
        module
            .openejb_jar
            .deployment(ejb_name)
            .and_then(|deployment| deployment.deployment_id.clone())
            .unwrap_or_else(|| ejb_name.to_owned())
    };

    let mut handles: Vec<BeanHandle> = Vec::new();
    for bean in module.ejb_jar.enterprise_beans() {
        let Some(ejb_class) = &bean.ejb_class else {
            tracing::debug!(target: "oejb.deploy", ejb = %bean.ejb_name, "bean declares no class; not bound");
            continue;
        };
        handles.push(BeanHandle {
            deployment_id: deployment_id(&bean.ejb_name),
            module_id: module.module_id.clone(),
            ejb_name: bean.ejb_name.clone(),
            ejb_class: ejb_class.clone(),
            kind: bean.kind,
        });
    }

    if let Some(finder) = &module.finder {
        for (kind, class) in finder.enterprise_beans() {
            if handles.iter().any(|handle| handle.ejb_class == class.name) {
                continue;
            }
            let ejb_name = simple_name(&class.name).to_owned();
            if handles.iter().any(|handle| handle.ejb_name == ejb_name) {
                tracing::warn!(target: "oejb.deploy", ejb = %ejb_name, class = %class.name, "ejb name already taken; not bound");
                continue;
            }
            handles.push(BeanHandle {
                deployment_id: deployment_id(&ejb_name),
                module_id: module.module_id.clone(),
                ejb_name,
                ejb_class: class.name.clone(),
                kind,
            });
        }
    }
    handles
}

fn simple_name(class_name: &str) -> &str {
    class_name
        .rsplit_once('.')
        .map_or(class_name, |(_, simple)| simple)
}

fn bind_bean(root: &IvmContext, handle: &BeanHandle, hidden: bool) -> Result<(), NamingError> {
    root.bind(
        &format!("openejb/Deployment/{}/{}", handle.deployment_id, handle.ejb_class),
        Binding::object(handle.clone()),
    )?;
    if !hidden {
        root.bind(
            &format!("global/{}/{}", handle.module_id, handle.ejb_name),
            Reference::ejb(handle.deployment_id.clone(), handle.ejb_class.clone()),
        )?;
    }
    tracing::debug!(
        target: "oejb.deploy",
        deployment_id = %handle.deployment_id,
        ejb = %handle.ejb_name,
        hidden,
        "bound enterprise bean"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_names() {
        assert_eq!(simple_name("com.acme.Cart"), "Cart");
        assert_eq!(simple_name("Cart"), "Cart");
    }
}
