//! Bind derive macro implementation

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, Fields, Ident, Result};

use crate::utils::{extract_container_body, extract_field_binding};

pub fn derive_bind_impl(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Bind can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Bind can only be derived for structs",
            ));
        }
    };

    let seed = if extract_container_body(&input.attrs)? {
        quote! { ::sluice_bind::Binding::<Self>::from_body() }
    } else {
        quote! { ::sluice_bind::Binding::<Self>::new() }
    };

    let mut steps = Vec::new();
    for field in fields {
        let Some(binding) = extract_field_binding(field)? else {
            continue;
        };
        let Some(field_name) = &field.ident else {
            continue;
        };
        let method = Ident::new(binding.source, Span::call_site());
        let tag = &binding.tag;
        steps.push(quote! {
            let binding = binding.#method(#tag, |target: &mut Self| &mut target.#field_name)?;
        });
    }

    Ok(quote! {
        impl #impl_generics ::sluice_bind::Bind for #name #ty_generics #where_clause {
            fn binding() -> ::std::result::Result<
                ::sluice_bind::Binding<Self>,
                ::sluice_bind::ConfigError,
            > {
                let binding = #seed;
                #(#steps)*
                ::std::result::Result::Ok(binding)
            }
        }
    })
}
