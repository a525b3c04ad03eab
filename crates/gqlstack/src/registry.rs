//! Service registry and per-request scopes.
//!
//! Capabilities are registered once at startup under a unique name together
//! with a [`Lifetime`] and a factory. Resolvers never construct services
//! themselves; they resolve them from the [`ServiceScope`] of the request
//! they are running in.
//!
//! - [`Lifetime::Singleton`] instances are built lazily on first resolution
//!   and shared by every scope for as long as the registry lives.
//! - [`Lifetime::Scoped`] instances are built at most once per scope and
//!   dropped together with it.
//!
//! # Example
//!
//! ```ignore
//! const COUNTER: Capability<dyn CountProvider> = Capability::new("count");
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register(COUNTER.name(), Lifetime::Singleton, || {
//!     Arc::new(InMemoryCounter::new(10)) as Arc<dyn CountProvider>
//! })?;
//!
//! let registry = Arc::new(registry);
//! let scope = registry.create_scope();
//! let counter = scope.resolve(&COUNTER)?;
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::RegistryError;

/// Type-erased service instance. The concrete type is always `Arc<T>`.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

/// How long a resolved service instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance for the lifetime of the registry.
    Singleton,
    /// One fresh instance per request scope.
    Scoped,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singleton => write!(f, "singleton"),
            Self::Scoped => write!(f, "scoped"),
        }
    }
}

/// Typed handle naming a capability and the type it resolves to.
///
/// `T` is usually a trait object such as `dyn CountProvider`.
pub struct Capability<T: ?Sized + 'static> {
    name: &'static str,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + 'static> Capability<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: ?Sized + 'static> Clone for Capability<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized + 'static> Copy for Capability<T> {}

impl<T: ?Sized + 'static> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("type", &type_name::<T>())
            .finish()
    }
}

struct Descriptor {
    lifetime: Lifetime,
    type_name: &'static str,
    factory: Factory,
    singleton: OnceLock<Instance>,
}

/// Container mapping capability names to factories and lifetimes.
///
/// Registration takes `&mut self`; once the registry is shared behind an
/// `Arc` it is read-only and only singleton cells are filled in lazily.
#[derive(Default)]
pub struct ServiceRegistry {
    descriptors: HashMap<String, Descriptor>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a capability with a factory.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateCapability`] if `name` is taken.
    pub fn register<T, F>(
        &mut self,
        name: impl Into<String>,
        lifetime: Lifetime,
        factory: F,
    ) -> Result<&mut Self, RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.descriptors.contains_key(&name) {
            return Err(RegistryError::DuplicateCapability(name));
        }

        let factory: Factory = Arc::new(move || Arc::new(factory()) as Instance);
        debug!(capability = %name, %lifetime, ty = type_name::<T>(), "Registered capability");
        self.descriptors.insert(
            name,
            Descriptor {
                lifetime,
                type_name: type_name::<T>(),
                factory,
                singleton: OnceLock::new(),
            },
        );
        Ok(self)
    }

    /// Registers an already constructed singleton instance.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateCapability`] if `name` is taken.
    pub fn register_instance<T>(
        &mut self,
        name: impl Into<String>,
        instance: Arc<T>,
    ) -> Result<&mut Self, RegistryError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.register(name, Lifetime::Singleton, move || instance.clone())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    #[must_use]
    pub fn lifetime(&self, name: &str) -> Option<Lifetime> {
        self.descriptors.get(name).map(|d| d.lifetime)
    }

    /// Lists registered capabilities, sorted by name.
    #[must_use]
    pub fn capabilities(&self) -> Vec<(&str, Lifetime)> {
        let mut list: Vec<_> = self
            .descriptors
            .iter()
            .map(|(name, d)| (name.as_str(), d.lifetime))
            .collect();
        list.sort_unstable_by_key(|(name, _)| *name);
        list
    }

    /// Opens a new request scope over this registry.
    #[must_use]
    pub fn create_scope(self: &Arc<Self>) -> ServiceScope {
        let scope = ServiceScope {
            registry: Arc::clone(self),
            request_id: Uuid::new_v4(),
            instances: Mutex::new(HashMap::new()),
        };
        trace!(request_id = %scope.request_id, "Opened service scope");
        scope
    }

    fn descriptor(&self, name: &str) -> Result<&Descriptor, RegistryError> {
        self.descriptors
            .get(name)
            .ok_or_else(|| RegistryError::UnregisteredCapability(name.to_string()))
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, d) in &self.descriptors {
            map.entry(name, &format_args!("{} {}", d.lifetime, d.type_name));
        }
        map.finish()
    }
}

/// Per-request service container.
///
/// Scoped instances are cached here for the duration of one request. The
/// mutex only guards this scope's own cache, so concurrent requests never
/// contend on it.
pub struct ServiceScope {
    registry: Arc<ServiceRegistry>,
    request_id: Uuid,
    instances: Mutex<HashMap<String, Instance>>,
}

impl ServiceScope {
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    /// Number of scoped instances built in this scope so far.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Resolves a typed capability.
    ///
    /// # Errors
    ///
    /// Fails if the capability is not registered or was registered with a
    /// different type.
    pub fn resolve<T: ?Sized + 'static>(
        &self,
        capability: &Capability<T>,
    ) -> Result<Arc<T>, RegistryError> {
        let instance = self.resolve_erased(capability.name())?;
        instance
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| RegistryError::TypeMismatch {
                name: capability.name().to_string(),
                expected: type_name::<T>(),
            })
    }

    pub(crate) fn resolve_erased(&self, name: &str) -> Result<Instance, RegistryError> {
        let descriptor = self.registry.descriptor(name)?;
        match descriptor.lifetime {
            Lifetime::Singleton => Ok(descriptor
                .singleton
                .get_or_init(|| {
                    debug!(capability = %name, "Constructing singleton");
                    (descriptor.factory)()
                })
                .clone()),
            Lifetime::Scoped => {
                // Held across construction so a scoped factory runs at most
                // once per scope.
                let mut instances = self
                    .instances
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if let Some(existing) = instances.get(name) {
                    return Ok(existing.clone());
                }
                trace!(capability = %name, request_id = %self.request_id, "Constructing scoped instance");
                let instance = (descriptor.factory)();
                instances.insert(name.to_string(), instance.clone());
                Ok(instance)
            }
        }
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("request_id", &self.request_id)
            .field("resolved", &self.resolved_count())
            .finish()
    }
}

impl Drop for ServiceScope {
    fn drop(&mut self) {
        trace!(request_id = %self.request_id, "Released service scope");
    }
}
