use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clap::ValueEnum;

use crate::error::SyrxDbError;

/// How long a resolved service instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum)]
pub enum ServiceLifetime {
    /// One instance per provider, shared by all scopes.
    #[default]
    Singleton,
    /// One instance per scope.
    Scoped,
    /// A new instance on every resolution.
    Transient,
}

type Instance = Arc<dyn Any + Send + Sync>;
type Constructor = Arc<dyn Fn(&ServiceScope) -> Result<Instance, SyrxDbError> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    lifetime: ServiceLifetime,
    type_name: &'static str,
    constructor: Constructor,
}

impl Registration {
    fn new<T, F>(lifetime: ServiceLifetime, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceScope) -> Result<Arc<T>, SyrxDbError> + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(move |scope: &ServiceScope| {
            let service: Arc<T> = factory(scope)?;
            Ok(Arc::new(service) as Instance)
        });
        Self {
            lifetime,
            type_name: type_name::<T>(),
            constructor,
        }
    }
}

/// Capability registry: one constructor and lifetime per service type.
///
/// Service types are usually trait objects (`dyn DatabaseConnector`) so that
/// consumers stay engine-agnostic.
#[derive(Clone, Default)]
pub struct ServiceCollection {
    registrations: HashMap<TypeId, Registration>,
}

impl ServiceCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`, replacing any earlier registration.
    pub fn add<T, F>(&mut self, lifetime: ServiceLifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceScope) -> Result<Arc<T>, SyrxDbError> + Send + Sync + 'static,
    {
        self.registrations
            .insert(TypeId::of::<T>(), Registration::new(lifetime, factory));
        self
    }

    /// Register `T` unless it is already registered.
    pub fn try_add<T, F>(&mut self, lifetime: ServiceLifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&ServiceScope) -> Result<Arc<T>, SyrxDbError> + Send + Sync + 'static,
    {
        self.registrations
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Registration::new(lifetime, factory));
        self
    }

    /// Register an existing instance as a singleton, replacing any earlier registration.
    pub fn add_instance<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.add::<T, _>(ServiceLifetime::Singleton, move |_| Ok(Arc::clone(&instance)))
    }

    #[must_use]
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    #[must_use]
    pub fn lifetime_of<T: ?Sized + 'static>(&self) -> Option<ServiceLifetime> {
        self.registrations
            .get(&TypeId::of::<T>())
            .map(|registration| registration.lifetime)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Snapshot the registrations into a provider. Later changes to the
    /// collection do not affect providers already built.
    #[must_use]
    pub fn build_service_provider(&self) -> ServiceProvider {
        let shared = Arc::new(Shared {
            registrations: self.registrations.clone(),
            singletons: Mutex::new(HashMap::new()),
        });
        ServiceProvider {
            root: ServiceScope::new(shared),
        }
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.registrations
                    .values()
                    .map(|registration| (registration.type_name, registration.lifetime)),
            )
            .finish()
    }
}

struct Shared {
    registrations: HashMap<TypeId, Registration>,
    singletons: Mutex<HashMap<TypeId, Instance>>,
}

/// Resolution context. Owns the scoped-instance cache; singletons live in the
/// provider and are shared by every scope.
pub struct ServiceScope {
    shared: Arc<Shared>,
    scoped: Mutex<HashMap<TypeId, Instance>>,
}

impl ServiceScope {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            scoped: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `T`.
    ///
    /// # Errors
    /// Returns `SyrxDbError::Registration` when `T` is not registered, or the
    /// error raised by its constructor.
    pub fn get<T>(&self) -> Result<Arc<T>, SyrxDbError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let id = TypeId::of::<T>();
        let registration = self.shared.registrations.get(&id).ok_or_else(|| {
            SyrxDbError::Registration(format!("no service registered for {}", type_name::<T>()))
        })?;

        let construct = || (registration.constructor)(self);
        let instance = match registration.lifetime {
            ServiceLifetime::Transient => construct()?,
            ServiceLifetime::Singleton => cached(&self.shared.singletons, id, construct)?,
            ServiceLifetime::Scoped => cached(&self.scoped, id, construct)?,
        };

        let instance: &(dyn Any + Send + Sync) = &*instance;
        instance.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
            SyrxDbError::Registration(format!(
                "service registered for {} produced a different type",
                type_name::<T>()
            ))
        })
    }

    /// Start a child scope sharing this scope's singletons.
    #[must_use]
    pub fn create_scope(&self) -> ServiceScope {
        ServiceScope::new(Arc::clone(&self.shared))
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope")
            .field("registrations", &self.shared.registrations.len())
            .finish_non_exhaustive()
    }
}

/// Root of a built registry; dereferences to its root scope.
#[derive(Debug)]
pub struct ServiceProvider {
    root: ServiceScope,
}

impl Deref for ServiceProvider {
    type Target = ServiceScope;

    fn deref(&self) -> &ServiceScope {
        &self.root
    }
}

/// Return the cached instance for `id`, constructing it outside the lock on a miss.
///
/// If two threads race, the first stored instance wins and both receive it.
fn cached(
    cache: &Mutex<HashMap<TypeId, Instance>>,
    id: TypeId,
    construct: impl FnOnce() -> Result<Instance, SyrxDbError>,
) -> Result<Instance, SyrxDbError> {
    if let Some(hit) = lock(cache).get(&id) {
        return Ok(Arc::clone(hit));
    }
    let created = construct()?;
    Ok(Arc::clone(lock(cache).entry(id).or_insert(created)))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
