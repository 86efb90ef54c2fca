//! Destination field kinds the enrichment engine can populate
//!
//! Only strings and integers are supported. Any other field type used in a binding fails to
//! compile because it does not implement [`FieldValue`].

use serde_json::Value;

use crate::{error::EnrichError, tag::Tag};

/// A field that can be assigned from a source value
pub trait FieldValue {
    fn assign(&mut self, value: Value, tag: &Tag) -> Result<(), EnrichError>;
}

impl FieldValue for String {
    fn assign(&mut self, value: Value, tag: &Tag) -> Result<(), EnrichError> {
        match value {
            Value::String(s) => {
                if tag.is_not_empty() && s.is_empty() {
                    return Err(EnrichError::Empty(tag.key.clone()));
                }
                *self = s;
                Ok(())
            }
            other => Err(EnrichError::NotAString(other)),
        }
    }
}

/// Integers accept JSON integers or strings parseable as the target type
macro_rules! integer_field {
    ($($ty:ty),* $(,)?) => {$(
        impl FieldValue for $ty {
            fn assign(&mut self, value: Value, tag: &Tag) -> Result<(), EnrichError> {
                let parsed = match &value {
                    Value::Number(n) => n
                        .as_i64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .or_else(|| n.as_u64().and_then(|v| <$ty>::try_from(v).ok()))
                        .ok_or_else(|| EnrichError::NotAnInteger(value.clone()))?,
                    Value::String(s) => s.parse::<$ty>().map_err(|source| EnrichError::Parse {
                        key: tag.key.clone(),
                        value: s.clone(),
                        source,
                    })?,
                    _ => return Err(EnrichError::NotAnInteger(value.clone())),
                };
                if tag.is_not_empty() && parsed == 0 {
                    return Err(EnrichError::Zero(tag.key.clone()));
                }
                *self = parsed;
                Ok(())
            }
        }
    )*};
}

integer_field!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag(raw: &str) -> Tag {
        Tag::parse(raw).unwrap()
    }

    #[test]
    fn test_string_rejects_non_strings() {
        for value in [json!(123), json!(123.45), json!(true), json!(null), json!({}), json!([])] {
            let mut field = String::from("untouched");
            let err = field.assign(value, &tag("Str")).unwrap_err();
            assert!(err.to_string().contains("is not a string"), "{err}");
            assert_eq!(field, "untouched");
        }
    }

    #[test]
    fn test_string_not_empty() {
        let mut field = String::new();
        assert_eq!(
            field.assign(json!(""), &tag("Str,notEmpty")),
            Err(EnrichError::Empty("Str".into()))
        );
        field.assign(json!(""), &tag("Str,required")).unwrap();
        field.assign(json!("a"), &tag("Str,notEmpty")).unwrap();
        assert_eq!(field, "a");
    }

    #[test]
    fn test_integer_conversions() {
        let mut field = 0i64;
        field.assign(json!("123"), &tag("Int")).unwrap();
        assert_eq!(field, 123);
        field.assign(json!(-7), &tag("Int")).unwrap();
        assert_eq!(field, -7);

        let err = field.assign(json!("str"), &tag("Int")).unwrap_err();
        assert!(matches!(err, EnrichError::Parse { ref value, .. } if value == "str"));

        for value in [json!(123.45), json!(true), json!(null), json!({}), json!(["1"])] {
            let err = field.assign(value, &tag("Int")).unwrap_err();
            assert!(err.to_string().contains("cannot be converted to int"), "{err}");
        }
    }

    #[test]
    fn test_integer_range_and_zero() {
        let mut small = 0u8;
        assert!(matches!(
            small.assign(json!(300), &tag("n")),
            Err(EnrichError::NotAnInteger(_))
        ));
        assert!(matches!(
            small.assign(json!("-1"), &tag("n")),
            Err(EnrichError::Parse { .. })
        ));

        let mut count = 5usize;
        assert_eq!(
            count.assign(json!("0"), &tag("n,notEmpty")),
            Err(EnrichError::Zero("n".into()))
        );
        assert_eq!(count, 5);
        count.assign(json!(0), &tag("n,required")).unwrap();
        assert_eq!(count, 0);
    }
}
