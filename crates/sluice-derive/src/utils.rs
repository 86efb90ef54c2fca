//! Attribute parsing shared by the derive implementation

use syn::{Attribute, Field, LitStr, Result};

/// Sources a field can be bound to, named as the `Binding` builder methods
pub const FIELD_SOURCES: [&str; 4] = ["header", "cookie", "context", "query"];

/// Whether the container carries `#[bind(body)]`
pub fn extract_container_body(attrs: &[Attribute]) -> Result<bool> {
    let mut body = false;
    for attr in attrs.iter().filter(|attr| attr.path().is_ident("bind")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("body") {
                body = true;
                Ok(())
            } else {
                Err(meta.error("expected #[bind(body)] on the struct"))
            }
        })?;
    }
    Ok(body)
}

/// Source and tag of one bound field
#[derive(Debug, PartialEq, Eq)]
pub struct FieldBinding {
    pub source: &'static str,
    pub tag: String,
}

/// Same rules as `sluice_bind::Tag::parse`, checked at expansion time
pub fn check_tag(raw: &str) -> std::result::Result<(), &'static str> {
    let key = match raw.split_once(',') {
        None => raw,
        Some((key, modifier)) => {
            if key.ends_with(char::is_whitespace) {
                return Err("no whitespace allowed before the comma in a bind tag");
            }
            if !matches!(modifier.trim(), "required" | "notEmpty") {
                return Err("bind tag modifier must be `required` or `notEmpty`");
            }
            key
        }
    };
    if key.is_empty() {
        return Err("bind tag must not be empty");
    }
    Ok(())
}

/// Read `#[bind(<source> = "tag")]` from a field; at most one source per field
pub fn extract_field_binding(field: &Field) -> Result<Option<FieldBinding>> {
    let mut binding: Option<FieldBinding> = None;

    for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("bind")) {
        attr.parse_nested_meta(|meta| {
            let Some(source) = FIELD_SOURCES
                .into_iter()
                .find(|source| meta.path.is_ident(source))
            else {
                return Err(meta.error(
                    "expected one of header, cookie, context or query, e.g. #[bind(query = \"page\")]",
                ));
            };
            let tag: LitStr = meta.value()?.parse()?;
            check_tag(&tag.value()).map_err(|msg| syn::Error::new_spanned(&tag, msg))?;
            if binding.is_some() {
                return Err(meta.error("a field can be bound to one source only"));
            }
            binding = Some(FieldBinding {
                source,
                tag: tag.value(),
            });
            Ok(())
        })?;
    }

    Ok(binding)
}
