//! Stack assembly: services, schema and bridge wired from configuration.

use std::path::Path;
use std::sync::Arc;

use async_graphql_value::ConstValue;
use tracing::info;

use crate::bridge::{BridgeClient, TransportBridge};
use crate::config::StackConfig;
use crate::error::{RegistryError, SchemaError, StackError};
use crate::registry::{Lifetime, ServiceRegistry};
use crate::schema::{ExecutionLimits, Field, InputValue, Object, Schema, TypeRef, to_value};
use crate::services::{
    COUNTER, CountProvider, InMemoryCounter, PERSON, PersonProvider, StaticPersonProvider,
};

/// A fully wired GraphQL stack.
#[derive(Debug, Clone)]
pub struct GqlStack {
    config: Arc<StackConfig>,
    bridge: TransportBridge,
}

impl GqlStack {
    /// Builds the stack. `configure` registers the services the schema
    /// requires, then the schema is validated against the registry.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid, a registration collides, or
    /// the schema references an unregistered capability.
    pub fn new<F>(config: StackConfig, configure: F) -> Result<Self, StackError>
    where
        F: FnOnce(&mut ServiceRegistry) -> Result<(), RegistryError>,
    {
        config.validate().map_err(StackError::Config)?;

        let mut registry = ServiceRegistry::new();
        configure(&mut registry)?;
        let registry = Arc::new(registry);

        let schema = build_schema(registry, ExecutionLimits::from(&config.engine))?;
        info!(
            capabilities = schema.registry().capabilities().len(),
            max_depth = schema.limits().max_depth,
            "GraphQL stack ready"
        );

        let bridge = TransportBridge::new(schema, config.transport.clone());
        Ok(Self {
            config: Arc::new(config),
            bridge,
        })
    }

    /// Builds the stack with the default wiring: a singleton counter
    /// starting at `services.counter_start` and a scoped person provider.
    ///
    /// # Errors
    ///
    /// See [`GqlStack::new`].
    pub fn with_defaults(config: StackConfig) -> Result<Self, StackError> {
        let start = config.services.counter_start;
        Self::new(config, move |registry| {
            register_defaults(registry, start)?;
            Ok(())
        })
    }

    #[must_use]
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    #[must_use]
    pub fn bridge(&self) -> &TransportBridge {
        &self.bridge
    }

    #[must_use]
    pub fn client(&self) -> BridgeClient {
        BridgeClient::new(self.bridge.clone())
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.bridge.schema()
    }

    /// Schema in SDL form.
    #[must_use]
    pub fn sdl(&self) -> String {
        self.schema().sdl()
    }

    /// Writes the SDL to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::Io`] when the file cannot be written.
    pub fn export_schema(&self, path: &Path) -> Result<(), StackError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.sdl())?;
        info!(path = %path.display(), "Schema exported");
        Ok(())
    }
}

/// Registers the production services.
///
/// # Errors
///
/// Fails if either capability is already registered.
pub fn register_defaults(
    registry: &mut ServiceRegistry,
    counter_start: i32,
) -> Result<&mut ServiceRegistry, RegistryError> {
    let counter = Arc::new(InMemoryCounter::new(counter_start));
    registry
        .register(COUNTER.name(), Lifetime::Singleton, move || {
            counter.clone() as Arc<dyn CountProvider>
        })?
        .register(PERSON.name(), Lifetime::Scoped, || {
            Arc::new(StaticPersonProvider) as Arc<dyn PersonProvider>
        })
}

/// Declares the `Query`, `Mutation` and `Person` types.
///
/// # Errors
///
/// Fails when `registry` lacks the `person` or `count` capability.
pub fn build_schema(
    registry: Arc<ServiceRegistry>,
    limits: ExecutionLimits,
) -> Result<Schema, SchemaError> {
    let person = Object::new("Person")
        .field(Field::projected("firstName", TypeRef::named_nn(TypeRef::STRING)))
        .field(Field::projected("lastName", TypeRef::named_nn(TypeRef::STRING)));

    let query = Object::new("Query").field(
        Field::new("person", TypeRef::named_nn("Person"), |_, injected| async move {
            let provider = injected.get(&PERSON)?;
            to_value(&provider.person())
        })
        .requires(&PERSON),
    );

    let mutation = Object::new("Mutation").field(
        Field::new("add", TypeRef::named_nn(TypeRef::INT), |args, injected| async move {
            let counter = injected.get(&COUNTER)?;
            let total = counter.add(args.try_i32("count")?)?;
            Ok(ConstValue::from(total))
        })
        .argument(InputValue::new("count", TypeRef::named_nn(TypeRef::INT)))
        .requires(&COUNTER),
    );

    Schema::build(registry)
        .query(query)
        .mutation(mutation)
        .register(person)
        .limits(limits)
        .finish()
}
