//! Code-first schema declarations and schema assembly.
//!
//! ## Components
//!
//! - [`Object`], [`Field`], [`InputValue`], [`TypeRef`] - type declarations
//! - [`SchemaBuilder`] - validates declarations against the service registry
//! - [`Schema`] - the immutable result consumed by the execution engine
//!
//! Resolvers are plain async functions receiving coerced [`ResolverArgs`]
//! and the [`Injected`] capabilities they declared with
//! [`Field::requires`].

mod builder;
mod sdl;
mod types;

pub use builder::{ExecutionLimits, ObjectType, Schema, SchemaBuilder};
pub use types::{
    Field, FieldError, InputValue, Injected, Object, ResolverArgs, ResolverFuture, SCALARS,
    TypeRef, to_value,
};

pub(crate) use types::ResolverFn;
