//! Code-first type declarations.
//!
//! Mirrors the dynamic-schema style: objects are built from fields, fields
//! carry typed arguments, the capabilities they need injected, and an async
//! resolver function.

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_graphql_value::{ConstValue, Name};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::registry::{Capability, Instance};

/// Built-in scalar names.
pub const SCALARS: [&str; 5] = [
    TypeRef::INT,
    TypeRef::FLOAT,
    TypeRef::STRING,
    TypeRef::BOOLEAN,
    TypeRef::ID,
];

/// Reference to a GraphQL type in a field or argument position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Named(String),
    NonNull(Box<TypeRef>),
    List(Box<TypeRef>),
}

impl TypeRef {
    pub const INT: &'static str = "Int";
    pub const FLOAT: &'static str = "Float";
    pub const STRING: &'static str = "String";
    pub const BOOLEAN: &'static str = "Boolean";
    pub const ID: &'static str = "ID";

    /// `T`
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// `T!`
    #[must_use]
    pub fn named_nn(name: impl Into<String>) -> Self {
        Self::NonNull(Box::new(Self::named(name)))
    }

    /// `[T!]!`
    #[must_use]
    pub fn named_nn_list_nn(name: impl Into<String>) -> Self {
        Self::NonNull(Box::new(Self::List(Box::new(Self::named_nn(name)))))
    }

    /// `[T]`
    #[must_use]
    pub fn named_list(name: impl Into<String>) -> Self {
        Self::List(Box::new(Self::named(name)))
    }

    #[must_use]
    pub fn is_non_null(&self) -> bool {
        matches!(self, Self::NonNull(_))
    }

    /// Innermost named type.
    #[must_use]
    pub fn base_name(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::NonNull(inner) | Self::List(inner) => inner.base_name(),
        }
    }

    #[must_use]
    pub fn is_scalar(&self) -> bool {
        SCALARS.contains(&self.base_name())
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
            Self::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

/// A field argument declaration.
#[derive(Debug, Clone)]
pub struct InputValue {
    pub(crate) name: String,
    pub(crate) ty: TypeRef,
    pub(crate) default_value: Option<ConstValue>,
    pub(crate) description: Option<String>,
}

impl InputValue {
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value: None,
            description: None,
        }
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<ConstValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }
}

/// Error returned by a resolver. Converted into a field-scoped GraphQL
/// error carrying the field's path.
///
/// Any `Display` type converts into it, so resolvers can use `?` freely.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub message: String,
    pub code: Option<String>,
}

impl FieldError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl<T: fmt::Display + Send + Sync + 'static> From<T> for FieldError {
    fn from(err: T) -> Self {
        Self::new(err.to_string())
    }
}

/// Coerced arguments handed to a resolver.
#[derive(Debug, Clone, Default)]
pub struct ResolverArgs {
    values: IndexMap<Name, ConstValue>,
    parent: Option<ConstValue>,
}

impl ResolverArgs {
    pub(crate) fn new(values: IndexMap<Name, ConstValue>, parent: Option<ConstValue>) -> Self {
        Self { values, parent }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ConstValue> {
        self.values.get(name).filter(|v| !matches!(v, ConstValue::Null))
    }

    /// Value of the enclosing object, for resolvers on non-root types.
    #[must_use]
    pub fn parent(&self) -> Option<&ConstValue> {
        self.parent.as_ref()
    }

    pub fn try_i32(&self, name: &str) -> Result<i32, FieldError> {
        match self.get(name) {
            Some(ConstValue::Number(n)) => n
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| FieldError::new(format!("Argument '{name}' is not an Int"))),
            _ => Err(missing(name)),
        }
    }

    pub fn try_f64(&self, name: &str) -> Result<f64, FieldError> {
        match self.get(name) {
            Some(ConstValue::Number(n)) => n
                .as_f64()
                .ok_or_else(|| FieldError::new(format!("Argument '{name}' is not a Float"))),
            _ => Err(missing(name)),
        }
    }

    pub fn try_str(&self, name: &str) -> Result<&str, FieldError> {
        match self.get(name) {
            Some(ConstValue::String(s)) => Ok(s),
            _ => Err(missing(name)),
        }
    }

    pub fn try_bool(&self, name: &str) -> Result<bool, FieldError> {
        match self.get(name) {
            Some(ConstValue::Boolean(b)) => Ok(*b),
            _ => Err(missing(name)),
        }
    }

    /// Deserializes an argument into any serde type.
    pub fn deserialize<T: DeserializeOwned>(&self, name: &str) -> Result<T, FieldError> {
        let value = self.values.get(name).cloned().unwrap_or(ConstValue::Null);
        let json = value.into_json()?;
        Ok(serde_json::from_value(json)?)
    }
}

fn missing(name: &str) -> FieldError {
    FieldError::new(format!("Missing argument '{name}'"))
}

/// Capabilities resolved for one field invocation.
///
/// Only the capabilities the field declared are available here.
#[derive(Default)]
pub struct Injected {
    instances: Vec<(String, Instance)>,
}

impl Injected {
    pub(crate) fn new(instances: Vec<(String, Instance)>) -> Self {
        Self { instances }
    }

    /// Returns the declared capability.
    pub fn get<T: ?Sized + 'static>(&self, capability: &Capability<T>) -> Result<Arc<T>, FieldError> {
        let (_, instance) = self
            .instances
            .iter()
            .find(|(name, _)| name == capability.name())
            .ok_or_else(|| {
                FieldError::new(format!(
                    "Capability '{}' was not declared by this field",
                    capability.name()
                ))
            })?;
        instance.downcast_ref::<Arc<T>>().cloned().ok_or_else(|| {
            FieldError::new(format!(
                "Capability '{}' is not of type {}",
                capability.name(),
                type_name::<T>()
            ))
        })
    }
}

impl fmt::Debug for Injected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.instances.iter().map(|(name, _)| name))
            .finish()
    }
}

/// Future produced by a resolver.
pub type ResolverFuture = BoxFuture<'static, Result<ConstValue, FieldError>>;

pub(crate) type ResolverFn = Arc<dyn Fn(ResolverArgs, Injected) -> ResolverFuture + Send + Sync>;

/// Converts any serializable value into a resolver result.
pub fn to_value<T: Serialize>(value: &T) -> Result<ConstValue, FieldError> {
    let json = serde_json::to_value(value)?;
    Ok(ConstValue::from_json(json)?)
}

/// An output field declaration.
#[derive(Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) ty: TypeRef,
    pub(crate) arguments: Vec<InputValue>,
    pub(crate) capabilities: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) resolver: Option<ResolverFn>,
}

impl Field {
    /// Creates a field computed by `resolver`.
    pub fn new<F, Fut>(name: impl Into<String>, ty: TypeRef, resolver: F) -> Self
    where
        F: Fn(ResolverArgs, Injected) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ConstValue, FieldError>> + Send + 'static,
    {
        let resolver: ResolverFn = Arc::new(move |args, injected| resolver(args, injected).boxed());
        Self {
            name: name.into(),
            ty,
            arguments: Vec::new(),
            capabilities: Vec::new(),
            description: None,
            resolver: Some(resolver),
        }
    }

    /// Creates a field read from the parent object's value under the same
    /// name.
    #[must_use]
    pub fn projected(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            arguments: Vec::new(),
            capabilities: Vec::new(),
            description: None,
            resolver: None,
        }
    }

    #[must_use]
    pub fn argument(mut self, input: InputValue) -> Self {
        self.arguments.push(input);
        self
    }

    /// Declares a capability injected into the resolver.
    #[must_use]
    pub fn requires<T: ?Sized + 'static>(mut self, capability: &Capability<T>) -> Self {
        self.capabilities.push(capability.name().to_string());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    #[must_use]
    pub fn arguments(&self) -> &[InputValue] {
        &self.arguments
    }

    pub(crate) fn argument_def(&self, name: &str) -> Option<&InputValue> {
        self.arguments.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ty", &self.ty.to_string())
            .field("arguments", &self.arguments)
            .field("capabilities", &self.capabilities)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// An object type declaration.
#[derive(Debug, Clone)]
pub struct Object {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) fields: Vec<Field>,
}

impl Object {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.name
    }
}
