//! Input and output coercion for built-in scalars.

use async_graphql_value::{ConstValue, Number};

use crate::schema::TypeRef;

/// Coerces an argument value against its declared input type.
///
/// Follows GraphQL input coercion: `null` is only accepted for nullable
/// types, a single value is wrapped into a one-element list, and integers
/// are accepted where a `Float` or `ID` is expected.
pub(crate) fn coerce_input(value: ConstValue, ty: &TypeRef) -> Result<ConstValue, ()> {
    match ty {
        TypeRef::NonNull(inner) => match value {
            ConstValue::Null => Err(()),
            other => coerce_input(other, inner),
        },
        _ if matches!(value, ConstValue::Null) => Ok(ConstValue::Null),
        TypeRef::List(inner) => match value {
            ConstValue::List(items) => items
                .into_iter()
                .map(|item| coerce_input(item, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(ConstValue::List),
            single => coerce_input(single, inner).map(|v| ConstValue::List(vec![v])),
        },
        TypeRef::Named(name) => coerce_scalar(value, name).ok_or(()),
    }
}

/// Checks a resolved leaf value against a scalar output type.
pub(crate) fn coerce_output(value: ConstValue, scalar: &str) -> Option<ConstValue> {
    match (scalar, value) {
        // Output coercion may stringify any integer for ID.
        (TypeRef::ID, ConstValue::Number(n)) if n.is_i64() || n.is_u64() => {
            Some(ConstValue::String(n.to_string()))
        }
        (_, value) => coerce_scalar(value, scalar),
    }
}

fn coerce_scalar(value: ConstValue, scalar: &str) -> Option<ConstValue> {
    match (scalar, value) {
        (TypeRef::INT, ConstValue::Number(n)) => {
            let v = n.as_i64()?;
            i32::try_from(v).ok().map(ConstValue::from)
        }
        (TypeRef::FLOAT, ConstValue::Number(n)) => {
            Number::from_f64(n.as_f64()?).map(ConstValue::Number)
        }
        (TypeRef::STRING, v @ ConstValue::String(_)) => Some(v),
        (TypeRef::BOOLEAN, v @ ConstValue::Boolean(_)) => Some(v),
        (TypeRef::ID, v @ ConstValue::String(_)) => Some(v),
        (TypeRef::ID, ConstValue::Number(n)) if n.is_i64() => Some(ConstValue::String(n.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_nn() -> TypeRef {
        TypeRef::named_nn(TypeRef::INT)
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(coerce_input(ConstValue::from(3), &int_nn()), Ok(ConstValue::from(3)));
        assert!(coerce_input(ConstValue::from("3"), &int_nn()).is_err());
        let fractional = ConstValue::Number(Number::from_f64(1.5).unwrap());
        assert!(coerce_input(fractional, &int_nn()).is_err());
        assert!(coerce_input(ConstValue::from(i64::from(i32::MAX) + 1), &int_nn()).is_err());
    }

    #[test]
    fn test_null_handling() {
        assert!(coerce_input(ConstValue::Null, &int_nn()).is_err());
        assert_eq!(
            coerce_input(ConstValue::Null, &TypeRef::named(TypeRef::INT)),
            Ok(ConstValue::Null)
        );
    }

    #[test]
    fn test_float_accepts_int() {
        let value = coerce_input(ConstValue::from(2), &TypeRef::named(TypeRef::FLOAT)).unwrap();
        let ConstValue::Number(n) = value else {
            panic!("expected number");
        };
        assert_eq!(n.as_f64(), Some(2.0));
    }

    #[test]
    fn test_id_accepts_int_and_string() {
        let id = TypeRef::named(TypeRef::ID);
        assert_eq!(coerce_input(ConstValue::from(7), &id), Ok(ConstValue::from("7")));
        assert_eq!(coerce_input(ConstValue::from("x"), &id), Ok(ConstValue::from("x")));
        assert!(coerce_input(ConstValue::Boolean(true), &id).is_err());
    }

    #[test]
    fn test_list_coercion() {
        let ty = TypeRef::named_nn_list_nn(TypeRef::INT);
        assert_eq!(
            coerce_input(ConstValue::from(1), &ty),
            Ok(ConstValue::List(vec![ConstValue::from(1)]))
        );
        assert!(coerce_input(ConstValue::List(vec![ConstValue::Null]), &ty).is_err());
    }

    #[test]
    fn test_output_checks() {
        assert_eq!(coerce_output(ConstValue::from("a"), TypeRef::STRING), Some(ConstValue::from("a")));
        assert_eq!(coerce_output(ConstValue::from(9), TypeRef::ID), Some(ConstValue::from("9")));
        assert_eq!(coerce_output(ConstValue::from("a"), TypeRef::INT), None);
    }
}
