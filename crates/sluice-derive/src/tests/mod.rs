//! Expansion and attribute parsing tests for the Bind derive

use syn::{DeriveInput, parse_quote};

use crate::bind_derive::derive_bind_impl;
use crate::utils::{FieldBinding, check_tag, extract_container_body, extract_field_binding};

/// Compare generated code ignoring whitespace
fn contains_pattern(code: &str, pattern: &str) -> bool {
    let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
    strip(code).contains(&strip(pattern))
}

fn first_field(input: &DeriveInput) -> &syn::Field {
    match &input.data {
        syn::Data::Struct(data) => data.fields.iter().next().unwrap(),
        _ => unreachable!(),
    }
}

#[test]
fn test_container_body_flag() {
    let with_body: DeriveInput = parse_quote! {
        #[bind(body)]
        struct Order { id: i64 }
    };
    let without: DeriveInput = parse_quote! {
        #[derive(Default)]
        struct Order { id: i64 }
    };
    assert!(extract_container_body(&with_body.attrs).unwrap());
    assert!(!extract_container_body(&without.attrs).unwrap());

    let unknown: DeriveInput = parse_quote! {
        #[bind(json)]
        struct Order { id: i64 }
    };
    assert!(extract_container_body(&unknown.attrs).is_err());
}

#[test]
fn test_field_binding_extraction() {
    let input: DeriveInput = parse_quote! {
        struct Order {
            #[serde(skip)]
            #[bind(header = "X-Supplier-Id, notEmpty")]
            supplier_id: String,
        }
    };
    assert_eq!(
        extract_field_binding(first_field(&input)).unwrap(),
        Some(FieldBinding {
            source: "header",
            tag: "X-Supplier-Id, notEmpty".to_string(),
        })
    );

    let plain: DeriveInput = parse_quote! {
        struct Order { price: i64 }
    };
    assert_eq!(extract_field_binding(first_field(&plain)).unwrap(), None);
}

#[test]
fn test_field_binding_errors() {
    let unknown_source: DeriveInput = parse_quote! {
        struct Order {
            #[bind(path = "id")]
            id: String,
        }
    };
    assert!(extract_field_binding(first_field(&unknown_source)).is_err());

    let two_sources: DeriveInput = parse_quote! {
        struct Order {
            #[bind(header = "id", query = "id")]
            id: String,
        }
    };
    let err = extract_field_binding(first_field(&two_sources)).unwrap_err();
    assert!(err.to_string().contains("one source only"));

    let empty_tag: DeriveInput = parse_quote! {
        struct Order {
            #[bind(query = "")]
            id: String,
        }
    };
    assert!(extract_field_binding(first_field(&empty_tag)).is_err());
}

#[test]
fn test_malformed_tags_fail_at_expansion() {
    let spaced: DeriveInput = parse_quote! {
        struct Order {
            #[bind(query = "id ,required")]
            id: String,
        }
    };
    let err = derive_bind_impl(spaced).unwrap_err();
    assert!(err.to_string().contains("before the comma"));

    let unknown_modifier: DeriveInput = parse_quote! {
        struct Order {
            #[bind(header = "X-Id,mandatory")]
            id: String,
        }
    };
    let err = extract_field_binding(first_field(&unknown_modifier)).unwrap_err();
    assert!(err.to_string().contains("`required` or `notEmpty`"));

    let no_key: DeriveInput = parse_quote! {
        struct Order {
            #[bind(context = ",notEmpty")]
            id: String,
        }
    };
    assert!(derive_bind_impl(no_key).is_err());

    assert_eq!(check_tag("X-Id, notEmpty"), Ok(()));
    assert_eq!(check_tag("page"), Ok(()));
}

#[test]
fn test_expansion_builds_binding_in_field_order() {
    let input: DeriveInput = parse_quote! {
        #[bind(body)]
        struct SetPrice {
            price: i64,
            #[bind(query = "region,required")]
            region: String,
            #[bind(context = "tenant")]
            tenant: String,
        }
    };
    let code = derive_bind_impl(input).unwrap().to_string();

    assert!(contains_pattern(&code, "impl ::sluice_bind::Bind for SetPrice"));
    assert!(contains_pattern(
        &code,
        "let binding = ::sluice_bind::Binding::<Self>::from_body();"
    ));
    let query = code.find("region,required").unwrap();
    let context = code.find("\"tenant\"").unwrap();
    assert!(query < context);
    assert!(contains_pattern(&code, "&mut target.region"));
    assert!(!contains_pattern(&code, "target.price"));
}

#[test]
fn test_expansion_defaults_without_body_and_keeps_generics() {
    let input: DeriveInput = parse_quote! {
        struct Paged<T: Default> where T: Send {
            #[bind(query = "page")]
            page: u32,
            items: Vec<T>,
        }
    };
    let code = derive_bind_impl(input).unwrap().to_string();

    assert!(contains_pattern(&code, "::sluice_bind::Binding::<Self>::new()"));
    assert!(contains_pattern(
        &code,
        "impl<T: Default> ::sluice_bind::Bind for Paged<T> where T: Send"
    ));
}

#[test]
fn test_rejects_enums_and_tuple_structs() {
    let input: DeriveInput = parse_quote! {
        enum Choice { A, B }
    };
    assert!(derive_bind_impl(input).is_err());

    let input: DeriveInput = parse_quote! {
        struct Pair(String, String);
    };
    assert!(derive_bind_impl(input).is_err());
}
