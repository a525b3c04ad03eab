//! Document validation against the schema.
//!
//! Runs before execution. Any error found here is request-level: the
//! response carries no `data`.

use async_graphql_parser::Positioned;
use async_graphql_parser::types::{ExecutableDocument, Field, Selection, SelectionSet};

use super::response::ServerError;
use crate::schema::{ObjectType, Schema};

const TYPENAME: &str = "__typename";

struct Validator<'a> {
    schema: &'a Schema,
    document: &'a ExecutableDocument,
    max_depth: usize,
    fragment_stack: Vec<&'a str>,
    errors: Vec<ServerError>,
}

/// Validates `selection_set` rooted at `root`.
pub(crate) fn validate(
    schema: &Schema,
    document: &ExecutableDocument,
    root: &ObjectType,
    selection_set: &Positioned<SelectionSet>,
) -> Result<(), Vec<ServerError>> {
    let mut validator = Validator {
        schema,
        document,
        max_depth: schema.limits().max_depth,
        fragment_stack: Vec::new(),
        errors: Vec::new(),
    };
    validator.selection_set(root, selection_set, 1);

    if validator.errors.is_empty() {
        Ok(())
    } else {
        Err(validator.errors)
    }
}

impl<'a> Validator<'a> {
    fn selection_set(
        &mut self,
        object: &'a ObjectType,
        selection_set: &'a Positioned<SelectionSet>,
        depth: usize,
    ) {
        if depth > self.max_depth {
            self.errors.push(
                ServerError::new(format!(
                    "Query depth {depth} exceeds maximum allowed {}",
                    self.max_depth
                ))
                .at(selection_set.pos)
                .with_code("DEPTH_EXCEEDED"),
            );
            return;
        }

        for selection in &selection_set.node.items {
            match &selection.node {
                Selection::Field(field) => self.field(object, field, depth),
                Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.as_str();
                    let Some(fragment) = self.document.fragments.get(name) else {
                        self.errors.push(
                            ServerError::new(format!("Unknown fragment \"{name}\""))
                                .at(spread.pos)
                                .with_code("GRAPHQL_VALIDATION_FAILED"),
                        );
                        continue;
                    };
                    if self.fragment_stack.contains(&name) {
                        self.errors.push(
                            ServerError::new(format!("Cannot spread fragment \"{name}\" within itself"))
                                .at(spread.pos)
                                .with_code("GRAPHQL_VALIDATION_FAILED"),
                        );
                        continue;
                    }
                    let on = fragment.node.type_condition.node.on.node.as_str();
                    if !self.type_condition_matches(object, on, spread.pos) {
                        continue;
                    }
                    self.fragment_stack.push(name);
                    self.selection_set(object, &fragment.node.selection_set, depth);
                    self.fragment_stack.pop();
                }
                Selection::InlineFragment(inline) => {
                    if let Some(condition) = &inline.node.type_condition {
                        let on = condition.node.on.node.as_str();
                        if !self.type_condition_matches(object, on, inline.pos) {
                            continue;
                        }
                    }
                    self.selection_set(object, &inline.node.selection_set, depth);
                }
            }
        }
    }

    fn type_condition_matches(
        &mut self,
        object: &ObjectType,
        on: &str,
        pos: async_graphql_parser::Pos,
    ) -> bool {
        if on == object.name() {
            return true;
        }
        self.errors.push(
            ServerError::new(format!(
                "Fragment on \"{on}\" cannot be spread on type \"{}\"",
                object.name()
            ))
            .at(pos)
            .with_code("GRAPHQL_VALIDATION_FAILED"),
        );
        false
    }

    fn field(&mut self, object: &'a ObjectType, field: &'a Positioned<Field>, depth: usize) {
        let name = field.node.name.node.as_str();
        let has_selection = !field.node.selection_set.node.items.is_empty();

        if name == TYPENAME {
            if has_selection {
                self.errors.push(leaf_with_selection(name, "String!", field));
            }
            return;
        }

        let Some(definition) = object.field(name) else {
            self.errors.push(
                ServerError::new(format!(
                    "Unknown field \"{name}\" on type \"{}\"",
                    object.name()
                ))
                .at(field.pos)
                .with_code("GRAPHQL_VALIDATION_FAILED"),
            );
            return;
        };

        for (arg_name, _) in &field.node.arguments {
            if definition.argument_def(arg_name.node.as_str()).is_none() {
                self.errors.push(
                    ServerError::new(format!(
                        "Unknown argument \"{}\" on field \"{}.{name}\"",
                        arg_name.node,
                        object.name()
                    ))
                    .at(arg_name.pos)
                    .with_code("GRAPHQL_VALIDATION_FAILED"),
                );
            }
        }

        match self.schema.object(definition.ty().base_name()) {
            Some(child) if has_selection => {
                self.selection_set(child, &field.node.selection_set, depth + 1);
            }
            Some(_) => {
                self.errors.push(
                    ServerError::new(format!(
                        "Field \"{name}\" of type \"{}\" must have a selection of subfields",
                        definition.ty()
                    ))
                    .at(field.pos)
                    .with_code("GRAPHQL_VALIDATION_FAILED"),
                );
            }
            None if has_selection => {
                self.errors
                    .push(leaf_with_selection(name, &definition.ty().to_string(), field));
            }
            None => {}
        }
    }
}

fn leaf_with_selection(name: &str, ty: &str, field: &Positioned<Field>) -> ServerError {
    ServerError::new(format!(
        "Field \"{name}\" must not have a selection since type \"{ty}\" has no subfields"
    ))
    .at(field.pos)
    .with_code("GRAPHQL_VALIDATION_FAILED")
}
