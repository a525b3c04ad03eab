//! Field resolution and value completion.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, PoisonError};

use async_graphql_parser::Positioned;
use async_graphql_parser::types::{ExecutableDocument, Field, Selection, SelectionSet};
use async_graphql_value::{ConstValue, Name, Value};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use tracing::{debug, warn};

use super::coerce::{coerce_input, coerce_output};
use super::response::{PathSegment, ServerError};
use crate::registry::ServiceScope;
use crate::schema::{
    Field as FieldDef, FieldError, Injected, ObjectType, ResolverArgs, ResolverFn, Schema,
    TypeRef,
};

/// Marker: a `null` landed in a non-null position and must propagate to
/// the nearest nullable parent. The error has already been recorded.
#[derive(Debug)]
pub(crate) struct Propagate;

type Completion = Result<ConstValue, Propagate>;

/// Fields grouped by response key, in document order.
type GroupedFields<'a> = IndexMap<&'a str, Vec<&'a Positioned<Field>>>;

pub(crate) struct ExecutionContext<'a> {
    schema: &'a Schema,
    document: &'a ExecutableDocument,
    variables: HashMap<String, ConstValue>,
    scope: &'a ServiceScope,
    errors: Mutex<Vec<ServerError>>,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        schema: &'a Schema,
        document: &'a ExecutableDocument,
        variables: HashMap<String, ConstValue>,
        scope: &'a ServiceScope,
    ) -> Self {
        Self {
            schema,
            document,
            variables,
            scope,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn into_errors(self) -> Vec<ServerError> {
        self.errors
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn push_error(&self, error: ServerError) {
        warn!(
            request_id = %self.scope.request_id(),
            path = %error.path_string(),
            error = %error.message,
            "Field resolution failed"
        );
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    /// Executes the root selection. Query fields resolve concurrently,
    /// mutation fields one after another in document order.
    pub(crate) async fn execute_root(
        &self,
        root: &'a ObjectType,
        selection_set: &'a Positioned<SelectionSet>,
        serial: bool,
    ) -> ConstValue {
        let mut grouped = GroupedFields::new();
        self.collect_fields(&selection_set.node, &mut grouped);

        let results: Vec<(&str, Completion)> = if serial {
            let mut results = Vec::with_capacity(grouped.len());
            for (key, fields) in &grouped {
                let value = self.resolve_field(root, None, key, fields, Vec::new()).await;
                results.push((*key, value));
            }
            results
        } else {
            join_all(grouped.iter().map(|(key, fields)| async move {
                (*key, self.resolve_field(root, None, key, fields, Vec::new()).await)
            }))
            .await
        };

        let mut data = IndexMap::with_capacity(results.len());
        for (key, value) in results {
            match value {
                Ok(value) => {
                    data.insert(Name::new(key), value);
                }
                // A non-null root field failed: the whole `data` is null.
                Err(Propagate) => return ConstValue::Null,
            }
        }
        ConstValue::Object(data)
    }

    /// Flattens fragments and groups fields by response key.
    fn collect_fields(&self, selection_set: &'a SelectionSet, grouped: &mut GroupedFields<'a>) {
        for selection in &selection_set.items {
            match &selection.node {
                Selection::Field(field) => {
                    let key = field.node.response_key().node.as_str();
                    grouped.entry(key).or_default().push(field);
                }
                Selection::FragmentSpread(spread) => {
                    if let Some(fragment) = self
                        .document
                        .fragments
                        .get(spread.node.fragment_name.node.as_str())
                    {
                        self.collect_fields(&fragment.node.selection_set.node, grouped);
                    }
                }
                Selection::InlineFragment(inline) => {
                    self.collect_fields(&inline.node.selection_set.node, grouped);
                }
            }
        }
    }

    fn resolve_field<'s>(
        &'s self,
        object: &'a ObjectType,
        parent: Option<&'s ConstValue>,
        key: &'s str,
        fields: &'s [&'a Positioned<Field>],
        mut path: Vec<PathSegment>,
    ) -> BoxFuture<'s, Completion> {
        async move {
            let field = fields[0];
            let name = field.node.name.node.as_str();
            path.push(PathSegment::Field(key.to_string()));

            if name == "__typename" {
                return Ok(ConstValue::String(object.name().to_string()));
            }
            let Some(definition) = object.field(name) else {
                // Validation rejects unknown fields before execution.
                return self.fail(
                    field,
                    &TypeRef::named(TypeRef::STRING),
                    FieldError::new(format!("Unknown field \"{name}\"")),
                    path,
                );
            };

            let value = match &definition.resolver {
                Some(resolver) => {
                    match self
                        .invoke(resolver, definition, field, parent.cloned(), &path)
                        .await
                    {
                        Ok(value) => value,
                        Err(err) => return self.fail(field, &definition.ty, err, path),
                    }
                }
                None => match parent {
                    Some(ConstValue::Object(map)) => {
                        map.get(name).cloned().unwrap_or(ConstValue::Null)
                    }
                    _ => ConstValue::Null,
                },
            };

            self.complete(&definition.ty, value, fields, path).await
        }
        .boxed()
    }

    /// Coerces arguments, injects capabilities and runs the resolver with
    /// panic isolation and the configured timeout.
    async fn invoke(
        &self,
        resolver: &ResolverFn,
        definition: &FieldDef,
        field: &Positioned<Field>,
        parent: Option<ConstValue>,
        path: &[PathSegment],
    ) -> Result<ConstValue, FieldError> {
        let args = self.coerce_arguments(definition, field)?;

        // Factories run user code; a panic there is a field error too.
        let instances = std::panic::catch_unwind(AssertUnwindSafe(|| {
            definition
                .capabilities()
                .iter()
                .map(|capability| {
                    self.scope
                        .resolve_erased(capability)
                        .map(|instance| (capability.clone(), instance))
                })
                .collect::<Result<Vec<_>, _>>()
        }))
        .map_err(|payload| {
            FieldError::new(format!(
                "Capability construction panicked: {}",
                panic_detail(payload.as_ref())
            ))
            .with_code("INTERNAL_SERVER_ERROR")
        })??;
        let injected = Injected::new(instances);

        debug!(
            request_id = %self.scope.request_id(),
            field = %definition.name(),
            depth = path.len(),
            "Resolving field"
        );

        let future = std::panic::catch_unwind(AssertUnwindSafe(move || {
            resolver(ResolverArgs::new(args, parent), injected)
        }))
        .map_err(panic_error)?;
        let guarded = AssertUnwindSafe(future).catch_unwind();

        let outcome = match self.schema.limits().field_timeout {
            Some(limit) => tokio::time::timeout(limit, guarded).await.map_err(|_| {
                FieldError::new(format!(
                    "Field \"{}\" timed out after {}ms",
                    definition.name(),
                    limit.as_millis()
                ))
                .with_code("TIMEOUT")
            })?,
            None => guarded.await,
        };

        outcome.map_err(panic_error)?
    }

    fn coerce_arguments(
        &self,
        definition: &FieldDef,
        field: &Positioned<Field>,
    ) -> Result<IndexMap<Name, ConstValue>, FieldError> {
        let mut args = IndexMap::with_capacity(definition.arguments().len());
        for input in definition.arguments() {
            let supplied = field
                .node
                .get_argument(input.name())
                .and_then(|value| self.substitute_variables(&value.node));

            let raw = match supplied {
                Some(value) => value?,
                None => match &input.default_value {
                    Some(default) => default.clone(),
                    None => ConstValue::Null,
                },
            };

            let value = coerce_input(raw, input.ty()).map_err(|()| {
                FieldError::new(format!(
                    "Invalid value for argument \"{}\", expected type \"{}\"",
                    input.name(),
                    input.ty()
                ))
                .with_code("BAD_USER_INPUT")
            })?;
            args.insert(Name::new(input.name()), value);
        }
        Ok(args)
    }

    /// Replaces variable references with their values. Returns `None` when
    /// the argument is a lone variable that was not provided, so the
    /// argument default applies.
    fn substitute_variables(&self, value: &Value) -> Option<Result<ConstValue, FieldError>> {
        if let Value::Variable(name) = value {
            return self.variables.get(name.as_str()).cloned().map(Ok);
        }
        Some(
            value
                .clone()
                .into_const_with(|name| {
                    self.variables.get(name.as_str()).cloned().ok_or_else(|| {
                        FieldError::new(format!("Variable \"${name}\" is not defined"))
                            .with_code("BAD_USER_INPUT")
                    })
                }),
        )
    }

    fn complete<'s>(
        &'s self,
        ty: &'a TypeRef,
        value: ConstValue,
        fields: &'s [&'a Positioned<Field>],
        path: Vec<PathSegment>,
    ) -> BoxFuture<'s, Completion> {
        async move {
            match ty {
                TypeRef::NonNull(inner) => {
                    let completed = self.complete_inner(inner, value, fields, path.clone()).await?;
                    if matches!(completed, ConstValue::Null) {
                        self.push_error(
                            ServerError::new(format!(
                                "Cannot return null for non-nullable field \"{}\" of type \"{ty}\"",
                                fields[0].node.name.node
                            ))
                            .at(fields[0].pos)
                            .with_path(path),
                        );
                        return Err(Propagate);
                    }
                    Ok(completed)
                }
                nullable => Ok(self
                    .complete_inner(nullable, value, fields, path)
                    .await
                    .unwrap_or(ConstValue::Null)),
            }
        }
        .boxed()
    }

    /// Completes a value at a nullable position. `Err` means an error was
    /// recorded here or below and this position must become null.
    async fn complete_inner(
        &self,
        ty: &'a TypeRef,
        value: ConstValue,
        fields: &[&'a Positioned<Field>],
        path: Vec<PathSegment>,
    ) -> Completion {
        if matches!(value, ConstValue::Null) {
            return Ok(ConstValue::Null);
        }

        match ty {
            TypeRef::NonNull(_) => self.complete(ty, value, fields, path).await,
            TypeRef::List(item_ty) => {
                let ConstValue::List(items) = value else {
                    return self.mismatch(fields, path, &format!("a list for type \"{ty}\""));
                };
                let mut completed = Vec::with_capacity(items.len());
                for (idx, item) in items.into_iter().enumerate() {
                    let mut item_path = path.clone();
                    item_path.push(PathSegment::Index(idx));
                    completed.push(self.complete(item_ty, item, fields, item_path).await?);
                }
                Ok(ConstValue::List(completed))
            }
            TypeRef::Named(name) => match self.schema.object(name) {
                Some(object) => self.complete_object(object, value, fields, path).await,
                None => match coerce_output(value, name) {
                    Some(value) => Ok(value),
                    None => self.mismatch(fields, path, &format!("a value of type \"{name}\"")),
                },
            },
        }
    }

    /// Projects the sub-selection of an object value.
    async fn complete_object(
        &self,
        object: &'a ObjectType,
        value: ConstValue,
        fields: &[&'a Positioned<Field>],
        path: Vec<PathSegment>,
    ) -> Completion {
        if !matches!(value, ConstValue::Object(_)) {
            return self.mismatch(fields, path, &format!("an object for type \"{}\"", object.name()));
        }

        let mut grouped = GroupedFields::new();
        for field in fields {
            self.collect_fields(&field.node.selection_set.node, &mut grouped);
        }

        let mut projected = IndexMap::with_capacity(grouped.len());
        for (key, sub_fields) in &grouped {
            let completed = self
                .resolve_field(object, Some(&value), key, sub_fields, path.clone())
                .await?;
            projected.insert(Name::new(*key), completed);
        }
        Ok(ConstValue::Object(projected))
    }

    fn mismatch(&self, fields: &[&Positioned<Field>], path: Vec<PathSegment>, expected: &str) -> Completion {
        self.push_error(
            ServerError::new(format!("Resolver returned an invalid value, expected {expected}"))
                .at(fields[0].pos)
                .with_path(path),
        );
        Err(Propagate)
    }

    fn fail(
        &self,
        field: &Positioned<Field>,
        ty: &TypeRef,
        err: FieldError,
        path: Vec<PathSegment>,
    ) -> Completion {
        let mut error = ServerError::new(err.message).at(field.pos).with_path(path);
        if let Some(code) = err.code {
            error = error.with_code(code);
        }
        self.push_error(error);
        if ty.is_non_null() {
            Err(Propagate)
        } else {
            Ok(ConstValue::Null)
        }
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn panic_error(payload: Box<dyn std::any::Any + Send>) -> FieldError {
    FieldError::new(format!("Resolver panicked: {}", panic_detail(payload.as_ref())))
        .with_code("INTERNAL_SERVER_ERROR")
}
