//! Request body plumbing shared by the router, pipeline and server loop

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full, combinators::UnsyncBoxBody};

use crate::BoxError;

/// Inbound request body type used throughout the crate
///
/// Boxed so that handlers do not depend on the transport; the server loop converts
/// hyper's `Incoming` into this and tests build it from byte strings.
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// Wrap any byte body into [`Body`]
pub fn boxed<B>(body: B) -> Body
where
    B: http_body::Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

pub fn full(data: impl Into<Bytes>) -> Body {
    boxed(Full::new(data.into()))
}

pub fn empty() -> Body {
    boxed(Empty::<Bytes>::new())
}
