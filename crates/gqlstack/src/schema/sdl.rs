//! Schema definition language rendering for schema export.

use std::fmt::Write;

use super::builder::{ObjectType, Schema};
use super::types::{Field, InputValue};

pub(crate) fn render(schema: &Schema) -> String {
    let mut out = String::new();

    out.push_str("schema {\n");
    let _ = writeln!(out, "  query: {}", schema.query_type().name());
    if let Some(mutation) = schema.mutation_type() {
        let _ = writeln!(out, "  mutation: {}", mutation.name());
    }
    out.push_str("}\n");

    for object in schema.objects() {
        out.push('\n');
        render_object(&mut out, object);
    }

    out
}

fn render_object(out: &mut String, object: &ObjectType) {
    if let Some(description) = &object.description {
        render_description(out, description, "");
    }
    let _ = writeln!(out, "type {} {{", object.name);
    for field in object.fields() {
        render_field(out, field);
    }
    out.push_str("}\n");
}

fn render_field(out: &mut String, field: &Field) {
    if let Some(description) = &field.description {
        render_description(out, description, "  ");
    }
    out.push_str("  ");
    out.push_str(&field.name);
    if field.arguments.iter().any(|arg| arg.description.is_some()) {
        // Described arguments go one per line.
        out.push_str("(\n");
        for argument in &field.arguments {
            if let Some(description) = &argument.description {
                render_description(out, description, "    ");
            }
            let _ = writeln!(out, "    {}", render_argument(argument));
        }
        out.push_str("  )");
    } else if !field.arguments.is_empty() {
        let args: Vec<String> = field.arguments.iter().map(render_argument).collect();
        let _ = write!(out, "({})", args.join(", "));
    }
    let _ = writeln!(out, ": {}", field.ty);
}

fn render_argument(argument: &InputValue) -> String {
    let mut rendered = format!("{}: {}", argument.name, argument.ty);
    if let Some(default) = &argument.default_value {
        let _ = write!(rendered, " = {default}");
    }
    rendered
}

fn render_description(out: &mut String, description: &str, indent: &str) {
    if description.contains('\n') {
        let _ = writeln!(out, "{indent}\"\"\"");
        for line in description.lines() {
            let _ = writeln!(out, "{indent}{line}");
        }
        let _ = writeln!(out, "{indent}\"\"\"");
    } else {
        let escaped = description.replace('\\', "\\\\").replace('"', "\\\"");
        let _ = writeln!(out, "{indent}\"{escaped}\"");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_graphql_value::ConstValue;

    use crate::registry::ServiceRegistry;
    use crate::schema::{Field, InputValue, Object, Schema, TypeRef};

    #[test]
    fn test_render_sdl() {
        let add = Field::new("add", TypeRef::named_nn(TypeRef::INT), |_, _| async {
            Ok(ConstValue::from(0))
        })
        .argument(InputValue::new("count", TypeRef::named_nn(TypeRef::INT)))
        .argument(InputValue::new("times", TypeRef::named(TypeRef::INT)).default_value(1));
        let person = Field::new("person", TypeRef::named_nn("Person"), |_, _| async {
            Ok(ConstValue::Null)
        })
        .description("The \"current\" person");

        let schema = Schema::build(Arc::new(ServiceRegistry::new()))
            .query(Object::new("Query").field(person))
            .mutation(Object::new("Mutation").field(add))
            .register(
                Object::new("Person")
                    .description("A person\nwith a name")
                    .field(Field::projected("firstName", TypeRef::named_nn(TypeRef::STRING))),
            )
            .finish()
            .unwrap();

        let expected = r#"schema {
  query: Query
  mutation: Mutation
}

type Query {
  "The \"current\" person"
  person: Person!
}

type Mutation {
  add(count: Int!, times: Int = 1): Int!
}

"""
A person
with a name
"""
type Person {
  firstName: String!
}
"#;
        assert_eq!(schema.sdl(), expected);
    }

    #[test]
    fn test_render_argument_descriptions() {
        let add = Field::new("add", TypeRef::named_nn(TypeRef::INT), |_, _| async {
            Ok(ConstValue::from(0))
        })
        .argument(
            InputValue::new("count", TypeRef::named_nn(TypeRef::INT))
                .description("Amount to add"),
        )
        .argument(InputValue::new("times", TypeRef::named(TypeRef::INT)).default_value(1));

        let schema = Schema::build(Arc::new(ServiceRegistry::new()))
            .query(Object::new("Query").field(add))
            .finish()
            .unwrap();

        let expected = r#"schema {
  query: Query
}

type Query {
  add(
    "Amount to add"
    count: Int!
    times: Int = 1
  ): Int!
}
"#;
        assert_eq!(schema.sdl(), expected);
    }
}
