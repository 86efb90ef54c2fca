//! # Sluice Bind
//!
//! Keeps transport out of business code. Declare every input of a business operation as a
//! field of one request struct, say where each field comes from, and let a [`Vat`] turn a
//! single business function into an HTTP pipeline step and a JSON-RPC call handler.
//!
//! ## Sources
//!
//! A request value is produced in a fixed order:
//!
//! 1. **body**: the JSON body (or JSON-RPC params) decoded into the struct, if it reads one
//! 2. **header**: request headers; an empty header counts as absent
//! 3. **cookie**: request cookies
//! 4. **context**: the pipeline value bag
//! 5. **query**: first value of a query parameter
//!
//! Each field binding carries a tag `key[,modifier]` where the modifier is `required`
//! (must be present) or `notEmpty` (present and not empty or zero). The first failure stops
//! the remaining sources and the business call and is answered with 400.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde::{Deserialize, Serialize};
//! use sluice_bind::{Bind, CallContext, Vat};
//! use sluice_http::{Pipeline, RequestError, Router};
//!
//! #[derive(Default, Deserialize, Bind)]
//! #[bind(body)]
//! struct SetPrice {
//!     price: i64,
//!     #[serde(skip)]
//!     #[bind(header = "X-Supplier-Id,notEmpty")]
//!     supplier_id: String,
//! }
//!
//! #[derive(Serialize)]
//! struct Accepted {
//!     supplier_id: String,
//!     price: i64,
//! }
//!
//! async fn set_price(req: SetPrice, _cx: CallContext) -> Result<Accepted, RequestError> {
//!     Ok(Accepted {
//!         supplier_id: req.supplier_id,
//!         price: req.price,
//!     })
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let vat = Vat::new(set_price)?;
//! let mut router = Router::new();
//! router.post("/setPrice", Pipeline::builder().step(vat.step()).build())?;
//! # Ok(())
//! # }
//! ```

extern crate self as sluice_bind;

pub mod binding;
pub mod error;
pub mod field;
pub mod json_rpc;
pub mod tag;
pub mod vat;

#[cfg(test)]
mod tests;

pub use binding::{Bind, Binding, Source, SourceLookup, Sources};
pub use error::{ConfigError, EnrichError};
pub use field::FieldValue;
pub use json_rpc::VatCallHandler;
pub use tag::{Modifier, Tag};
pub use vat::{CallContext, Reply, Vat, VatStep};

#[cfg(feature = "derive")]
pub use sluice_derive::Bind;

use serde::{Deserialize, Serialize};

/// Empty response body, serialized as `{}`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct None {}
