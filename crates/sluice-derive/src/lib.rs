//! # Sluice Derive
//!
//! `#[derive(Bind)]` generates the `sluice_bind::Bind` implementation for a request struct.
//!
//! ## Attributes
//!
//! - `#[bind(body)]` on the struct: start from the JSON body decoded as the struct (needs
//!   `Deserialize`); without it the struct starts from `Default`
//! - `#[bind(header = "...")]`, `#[bind(cookie = "...")]`, `#[bind(context = "...")]`,
//!   `#[bind(query = "...")]` on a field: fill it from that source, using the string as the
//!   tag (`key`, `key,required` or `key,notEmpty`)
//!
//! Fields must be `String` or an integer type; anything else fails to compile on the
//! `FieldValue` bound.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sluice_bind::Bind;
//!
//! #[derive(Default, Bind)]
//! struct ListOrders {
//!     #[bind(context = "tenant,notEmpty")]
//!     tenant: String,
//!     #[bind(query = "page")]
//!     page: u32,
//! }
//! ```

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod bind_derive;
mod utils;

#[cfg(test)]
mod tests;

/// Derive macro for `sluice_bind::Bind`
#[proc_macro_derive(Bind, attributes(bind))]
pub fn derive_bind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    bind_derive::derive_bind_impl(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
