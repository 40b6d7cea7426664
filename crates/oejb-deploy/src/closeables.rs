use std::fmt;
use std::io;
use std::sync::Arc;

use oejb_archive::{ArchiveClassLoader, PathClassLoader};
use parking_lot::Mutex;

/// A resource released when its deployment goes away.
pub trait Closeable: Send + Sync {
    fn close(&self) -> io::Result<()>;

    fn label(&self) -> String {
        std::any::type_name::<Self>().to_owned()
    }
}

impl Closeable for ArchiveClassLoader {
    fn close(&self) -> io::Result<()> {
        ArchiveClassLoader::close(self);
        Ok(())
    }

    fn label(&self) -> String {
        let names: Vec<&str> = self.archives().iter().map(|a| a.name()).collect();
        format!("archive class loader [{}]", names.join(", "))
    }
}

impl Closeable for PathClassLoader {
    fn close(&self) -> io::Result<()> {
        Ok(())
    }

    fn label(&self) -> String {
        format!("path class loader ({} entries)", self.entries().len())
    }
}

/// Resources registered during deployment, closed in reverse registration
/// order. Failures are logged and do not stop the remaining closes.
#[derive(Default)]
pub struct Closeables {
    items: Mutex<Vec<Arc<dyn Closeable>>>,
}

impl fmt::Debug for Closeables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closeables")
            .field("len", &self.items.lock().len())
            .finish()
    }
}

impl Closeables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, closeable: Arc<dyn Closeable>) {
        self.items.lock().push(closeable);
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Closes and forgets everything registered so far; returns the number of
    /// failed closes.
    pub fn close(&self) -> usize {
        let items = std::mem::take(&mut *self.items.lock());
        let mut failures = 0;
        for item in items.into_iter().rev() {
            if let Err(err) = item.close() {
                failures += 1;
                tracing::warn!(target: "oejb.deploy", resource = %item.label(), error = %err, "failed to close resource");
            }
        }
        failures
    }
}
