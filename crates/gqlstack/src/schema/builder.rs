//! Schema assembly.
//!
//! [`SchemaBuilder`] collects the query root, the optional mutation root and
//! any output object types, validates them against the service registry and
//! produces an immutable [`Schema`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use tracing::debug;

use super::sdl;
use super::types::{Field, Object, SCALARS};
use crate::config::EngineConfig;
use crate::error::SchemaError;
use crate::registry::ServiceRegistry;

/// Execution limits carried by the schema.
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// Maximum selection depth allowed.
    pub max_depth: usize,

    /// Optional per-field resolver timeout.
    pub field_timeout: Option<Duration>,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for ExecutionLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            field_timeout: config.field_timeout(),
        }
    }
}

/// A validated object type.
#[derive(Debug)]
pub struct ObjectType {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) fields: IndexMap<String, Field>,
}

impl ObjectType {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }
}

struct SchemaInner {
    query_type: String,
    mutation_type: Option<String>,
    types: IndexMap<String, ObjectType>,
    registry: Arc<ServiceRegistry>,
    limits: ExecutionLimits,
}

/// Immutable executable schema. Cheap to clone.
#[derive(Clone)]
pub struct Schema(Arc<SchemaInner>);

impl Schema {
    /// Starts building a schema whose resolvers draw capabilities from
    /// `registry`.
    #[must_use]
    pub fn build(registry: Arc<ServiceRegistry>) -> SchemaBuilder {
        SchemaBuilder::new(registry)
    }

    #[must_use]
    pub fn query_type(&self) -> &ObjectType {
        &self.0.types[&self.0.query_type]
    }

    #[must_use]
    pub fn mutation_type(&self) -> Option<&ObjectType> {
        self.0
            .mutation_type
            .as_ref()
            .and_then(|name| self.0.types.get(name))
    }

    #[must_use]
    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.0.types.get(name)
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectType> {
        self.0.types.values()
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.0.registry
    }

    #[must_use]
    pub fn limits(&self) -> &ExecutionLimits {
        &self.0.limits
    }

    /// Renders the schema in GraphQL schema definition language.
    #[must_use]
    pub fn sdl(&self) -> String {
        sdl::render(self)
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("query", &self.0.query_type)
            .field("mutation", &self.0.mutation_type)
            .field("types", &self.0.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`Schema`].
///
/// # Example
///
/// ```ignore
/// let schema = Schema::build(registry)
///     .query(Object::new("Query").field(person_field))
///     .mutation(Object::new("Mutation").field(add_field))
///     .register(person_type)
///     .finish()?;
/// ```
pub struct SchemaBuilder {
    registry: Arc<ServiceRegistry>,
    query: Option<Object>,
    mutation: Option<Object>,
    objects: Vec<Object>,
    limits: ExecutionLimits,
}

impl SchemaBuilder {
    #[must_use]
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            registry,
            query: None,
            mutation: None,
            objects: Vec::new(),
            limits: ExecutionLimits::default(),
        }
    }

    /// Defines the query root type.
    #[must_use]
    pub fn query(mut self, object: Object) -> Self {
        self.query = Some(object);
        self
    }

    /// Defines the mutation root type.
    #[must_use]
    pub fn mutation(mut self, object: Object) -> Self {
        self.mutation = Some(object);
        self
    }

    /// Registers an output object type.
    #[must_use]
    pub fn register(mut self, object: Object) -> Self {
        self.objects.push(object);
        self
    }

    #[must_use]
    pub fn limit_depth(mut self, max_depth: usize) -> Self {
        self.limits.max_depth = max_depth;
        self
    }

    #[must_use]
    pub fn field_timeout(mut self, timeout: Duration) -> Self {
        self.limits.field_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Validates the declarations and builds the schema.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] on field collisions, unknown types, missing
    /// resolvers on root fields, or capabilities absent from the registry.
    pub fn finish(self) -> Result<Schema, SchemaError> {
        let query = self.query.ok_or(SchemaError::MissingQueryType)?;
        let query_type = query.name.clone();
        let mutation_type = self.mutation.as_ref().map(|m| m.name.clone());

        let roots: HashSet<String> = std::iter::once(query_type.clone())
            .chain(mutation_type.clone())
            .collect();

        let mut types: IndexMap<String, ObjectType> = IndexMap::new();
        for object in std::iter::once(query)
            .chain(self.mutation)
            .chain(self.objects)
        {
            if SCALARS.contains(&object.name.as_str()) || types.contains_key(&object.name) {
                return Err(SchemaError::DuplicateType(object.name));
            }
            if object.fields.is_empty() {
                return Err(SchemaError::EmptyType(object.name));
            }

            let mut fields = IndexMap::with_capacity(object.fields.len());
            for field in object.fields {
                if fields.contains_key(&field.name) {
                    return Err(SchemaError::DuplicateField {
                        type_name: object.name,
                        field: field.name,
                    });
                }
                fields.insert(field.name.clone(), field);
            }

            types.insert(
                object.name.clone(),
                ObjectType {
                    name: object.name,
                    description: object.description,
                    fields,
                },
            );
        }

        for object in types.values() {
            let is_root = roots.contains(&object.name);
            for field in object.fields.values() {
                validate_field(&types, &self.registry, object, field, is_root)?;
            }
        }

        debug!(
            query = %query_type,
            mutation = ?mutation_type,
            types = types.len(),
            "Schema build complete"
        );

        Ok(Schema(Arc::new(SchemaInner {
            query_type,
            mutation_type,
            types,
            registry: self.registry,
            limits: self.limits,
        })))
    }
}

fn validate_field(
    types: &IndexMap<String, ObjectType>,
    registry: &ServiceRegistry,
    object: &ObjectType,
    field: &Field,
    is_root: bool,
) -> Result<(), SchemaError> {
    let output = field.ty.base_name();
    if !SCALARS.contains(&output) && !types.contains_key(output) {
        return Err(SchemaError::UnknownType {
            type_name: object.name.clone(),
            field: field.name.clone(),
            referenced: output.to_string(),
        });
    }

    let mut seen = HashSet::new();
    for argument in &field.arguments {
        if !seen.insert(argument.name.as_str()) {
            return Err(SchemaError::DuplicateField {
                type_name: format!("{}.{}", object.name, field.name),
                field: argument.name.clone(),
            });
        }
        if !argument.ty.is_scalar() {
            return Err(SchemaError::InvalidArgumentType {
                type_name: object.name.clone(),
                field: field.name.clone(),
                argument: argument.name.clone(),
                referenced: argument.ty.base_name().to_string(),
            });
        }
    }

    for capability in &field.capabilities {
        if !registry.contains(capability) {
            return Err(SchemaError::MissingCapability {
                type_name: object.name.clone(),
                field: field.name.clone(),
                capability: capability.clone(),
            });
        }
    }

    if is_root && field.resolver.is_none() {
        return Err(SchemaError::MissingResolver {
            type_name: object.name.clone(),
            field: field.name.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use async_graphql_value::ConstValue;

    use super::*;
    use crate::registry::{Capability, Lifetime};
    use crate::schema::{InputValue, TypeRef};

    const NUMBER: Capability<i32> = Capability::new("number");

    fn constant(name: &str) -> Field {
        Field::new(name, TypeRef::named_nn(TypeRef::INT), |_, _| async {
            Ok(ConstValue::from(1))
        })
    }

    fn registry() -> Arc<ServiceRegistry> {
        let mut registry = ServiceRegistry::new();
        registry
            .register(NUMBER.name(), Lifetime::Singleton, || Arc::new(7))
            .unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_schema_builds() {
        let schema = Schema::build(registry())
            .query(Object::new("Query").field(constant("one").requires(&NUMBER)))
            .mutation(Object::new("Mutation").field(constant("bump")))
            .finish()
            .unwrap();

        assert_eq!(schema.query_type().name(), "Query");
        assert_eq!(schema.mutation_type().map(ObjectType::name), Some("Mutation"));
        assert!(schema.query_type().field("one").is_some());
        assert_eq!(schema.limits().max_depth, 15);
    }

    #[test]
    fn test_missing_query_type() {
        let err = Schema::build(registry()).finish().unwrap_err();
        assert_eq!(err, SchemaError::MissingQueryType);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Schema::build(registry())
            .query(
                Object::new("Query")
                    .field(constant("one"))
                    .field(constant("one")),
            )
            .finish()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateField {
                type_name: "Query".into(),
                field: "one".into()
            }
        );
    }

    #[test]
    fn test_same_field_name_on_different_roots_allowed() {
        let result = Schema::build(registry())
            .query(Object::new("Query").field(constant("one")))
            .mutation(Object::new("Mutation").field(constant("one")))
            .finish();
        assert!(result.is_ok());
    }

    #[test]
    fn test_unregistered_capability_rejected() {
        const MISSING: Capability<String> = Capability::new("missing");
        let err = Schema::build(registry())
            .query(Object::new("Query").field(constant("one").requires(&MISSING)))
            .finish()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingCapability { capability, .. } if capability == "missing"));
    }

    #[test]
    fn test_unknown_output_type_rejected() {
        let field = Field::new("person", TypeRef::named_nn("Person"), |_, _| async {
            Ok(ConstValue::Null)
        });
        let err = Schema::build(registry())
            .query(Object::new("Query").field(field))
            .finish()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { referenced, .. } if referenced == "Person"));
    }

    #[test]
    fn test_object_argument_rejected() {
        let person = Object::new("Person").field(Field::projected("name", TypeRef::named(TypeRef::STRING)));
        let field = constant("one").argument(InputValue::new("who", TypeRef::named("Person")));
        let err = Schema::build(registry())
            .query(Object::new("Query").field(field))
            .register(person)
            .finish()
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidArgumentType { .. }));
    }

    #[test]
    fn test_root_field_needs_resolver() {
        let err = Schema::build(registry())
            .query(Object::new("Query").field(Field::projected("one", TypeRef::named(TypeRef::INT))))
            .finish()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingResolver { .. }));
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let err = Schema::build(registry())
            .query(Object::new("Query").field(constant("one")))
            .register(Object::new("Query").field(constant("two")))
            .finish()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateType("Query".into()));
    }

    #[test]
    fn test_empty_type_rejected() {
        let err = Schema::build(registry())
            .query(Object::new("Query"))
            .finish()
            .unwrap_err();
        assert_eq!(err, SchemaError::EmptyType("Query".into()));
    }
}
