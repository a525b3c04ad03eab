//! Schema export through the stack.

use gqlstack::GqlStack;
use gqlstack::config::StackConfig;

#[test]
fn test_sdl_describes_default_schema() {
    let stack = GqlStack::with_defaults(StackConfig::default()).unwrap();
    let sdl = stack.sdl();

    assert_eq!(
        sdl,
        "schema {\n  query: Query\n  mutation: Mutation\n}\n\n\
         type Query {\n  person: Person!\n}\n\n\
         type Mutation {\n  add(count: Int!): Int!\n}\n\n\
         type Person {\n  firstName: String!\n  lastName: String!\n}\n"
    );
}

#[test]
fn test_export_schema_writes_file() {
    let stack = GqlStack::with_defaults(StackConfig::default()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("schema.graphql");

    stack.export_schema(&path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, stack.sdl());
    assert!(written.contains("type Query"));
    assert!(written.contains("type Mutation"));
    assert!(written.contains("type Person"));
}

#[test]
fn test_export_to_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StackConfig::default();
    config.schema.output_path = dir.path().join("out.graphql");

    let stack = GqlStack::with_defaults(config).unwrap();
    stack.export_schema(&stack.config().schema.output_path).unwrap();

    assert!(dir.path().join("out.graphql").exists());
}
