//! Attaching instrumentation engines.
//!
//! An engine is whatever routes a program's blocking operations into the
//! dispatcher: the adapters in [`wait`](crate::wait), an executor hook, or a
//! user wrapper around a driver. Engines are installed once per name.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use stallwatch_core::ContextId;

use crate::circularity::CircularityLock;
use crate::dispatch::Dispatcher;
use crate::error::InstallResult;

/// An instrumentation engine.
pub trait Instrumentation: Send + Sync {
    /// Unique engine name.
    fn name(&self) -> &str;

    /// Attach the engine's hooks to `dispatcher`.
    fn install(&self, dispatcher: &Arc<Dispatcher>) -> InstallResult<()>;
}

/// Result of [`Installer::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The engine was attached.
    Installed,
    /// An engine with the same name was attached before.
    AlreadyInstalled,
    /// Called from inside another installation on the same context.
    Skipped,
}

/// Attaches engines to a dispatcher.
pub struct Installer {
    dispatcher: Arc<Dispatcher>,
    lock: CircularityLock,
    installed: Mutex<HashSet<String>>,
}

impl Installer {
    /// Create an installer for `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            lock: CircularityLock::new(),
            installed: Mutex::new(HashSet::new()),
        }
    }

    /// Install `engine`.
    ///
    /// # Errors
    ///
    /// Returns the engine's own error. A failed engine may be installed
    /// again later.
    pub fn install(&self, engine: &dyn Instrumentation) -> InstallResult<InstallOutcome> {
        let context = ContextId::current();
        let Some(_guard) = self.lock.try_enter(context) else {
            debug!(engine = engine.name(), "Nested installation skipped");
            return Ok(InstallOutcome::Skipped);
        };

        let name = engine.name().to_string();
        if !self.installed.lock().insert(name.clone()) {
            debug!(engine = %name, "Instrumentation already installed");
            return Ok(InstallOutcome::AlreadyInstalled);
        }

        if let Err(err) = engine.install(&self.dispatcher) {
            self.installed.lock().remove(&name);
            return Err(err);
        }

        info!(engine = %name, "Instrumentation installed");
        Ok(InstallOutcome::Installed)
    }

    /// Check if an engine with `name` is installed.
    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.lock().contains(name)
    }

    /// Names of the installed engines, sorted.
    pub fn installed(&self) -> Vec<String> {
        let mut names: Vec<String> = self.installed.lock().iter().cloned().collect();
        names.sort();
        names
    }

    /// The dispatcher engines are attached to.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("installed", &self.installed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use stallwatch_registry::{AllowanceRegistry, ConsumerRegistry};

    use crate::error::InstallError;

    fn installer() -> Arc<Installer> {
        Arc::new(Installer::new(Arc::new(Dispatcher::new(
            Arc::new(AllowanceRegistry::new()),
            Arc::new(ConsumerRegistry::new()),
        ))))
    }

    struct Counting {
        name: &'static str,
        calls: AtomicUsize,
    }

    impl Instrumentation for Counting {
        fn name(&self) -> &str {
            self.name
        }

        fn install(&self, _dispatcher: &Arc<Dispatcher>) -> InstallResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Reentrant {
        installer: Arc<Installer>,
        nested: Mutex<Option<InstallOutcome>>,
    }

    impl Instrumentation for Reentrant {
        fn name(&self) -> &str {
            "reentrant"
        }

        fn install(&self, _dispatcher: &Arc<Dispatcher>) -> InstallResult<()> {
            let inner = Counting {
                name: "inner",
                calls: AtomicUsize::new(0),
            };
            *self.nested.lock() = Some(self.installer.install(&inner)?);
            Ok(())
        }
    }

    struct Broken;

    impl Instrumentation for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn install(&self, _dispatcher: &Arc<Dispatcher>) -> InstallResult<()> {
            Err(InstallError::Unsupported("broken".into()))
        }
    }

    #[test]
    fn test_install_once_per_name() {
        let installer = installer();
        let engine = Counting {
            name: "std",
            calls: AtomicUsize::new(0),
        };

        assert_eq!(installer.install(&engine).unwrap(), InstallOutcome::Installed);
        assert_eq!(
            installer.install(&engine).unwrap(),
            InstallOutcome::AlreadyInstalled
        );
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(installer.installed(), vec!["std"]);
    }

    #[test]
    fn test_reentrant_install_is_skipped() {
        let installer = installer();
        let engine = Reentrant {
            installer: Arc::clone(&installer),
            nested: Mutex::new(None),
        };

        assert_eq!(installer.install(&engine).unwrap(), InstallOutcome::Installed);
        assert_eq!(*engine.nested.lock(), Some(InstallOutcome::Skipped));
        assert!(!installer.is_installed("inner"));
    }

    #[test]
    fn test_failed_install_can_retry() {
        let installer = installer();

        assert!(installer.install(&Broken).is_err());
        assert!(!installer.is_installed("broken"));
        assert!(installer.install(&Broken).is_err());
    }
}
