//! JSON-RPC call handler around a [`Vat`](crate::Vat) business function

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::value::RawValue;
use sluice_http::RpcContext;
use sluice_json_rpc::{CallHandler, JsonRpcErrorObject};

use crate::{
    binding::{Binding, Seed, Source},
    vat::{BusinessFn, CallContext, Reply},
};

/// Produced by [`Vat::json_rpc_handler`](crate::Vat::json_rpc_handler)
///
/// Params are decoded into the request when its type reads the body, then context fields are
/// filled from the value bag. Only the value bag exists on the JSON-RPC side, so cookie fields
/// are never asked for and keep their default. Errors map onto JSON-RPC codes: undecodable params are Invalid
/// params, everything else is Internal error.
pub struct VatCallHandler<T, R> {
    binding: Arc<Binding<T>>,
    business: BusinessFn<T, R>,
}

impl<T, R> VatCallHandler<T, R> {
    pub(crate) fn new(binding: Arc<Binding<T>>, business: BusinessFn<T, R>) -> Self {
        Self { binding, business }
    }
}

#[async_trait]
impl<T, R> CallHandler<RpcContext> for VatCallHandler<T, R>
where
    T: Send + 'static,
    R: Serialize + Send + 'static,
{
    async fn call(
        &self,
        ctx: &RpcContext,
        params: Option<&RawValue>,
    ) -> Result<Box<RawValue>, JsonRpcErrorObject> {
        let mut request = match self.binding.seed() {
            Seed::Body(decode) => {
                let params = params.map(RawValue::get).unwrap_or("null");
                decode(params.as_bytes())
                    .map_err(|err| JsonRpcErrorObject::invalid_params(err.to_string()))?
            }
            Seed::Default(init) => init(),
        };

        let values = ctx.values();
        if let Err(err) = self
            .binding
            .enrich(&mut request, Source::Context, |key| values.get(key).cloned())
        {
            ctx.logger().warn(format_args!("error while enriching: {}", err));
            return Err(JsonRpcErrorObject::internal_error(Some(
                "error filling request from context".to_string(),
            )));
        }

        match (self.business)(request, CallContext::from(ctx)).await {
            Ok(Reply::Json(response)) => serde_json::value::to_raw_value(&response)
                .map_err(|err| JsonRpcErrorObject::internal_error(Some(err.to_string()))),
            Ok(Reply::Raw(data)) => String::from_utf8(data.to_vec())
                .ok()
                .and_then(|text| RawValue::from_string(text).ok())
                .ok_or_else(|| {
                    JsonRpcErrorObject::internal_error(Some(
                        "cached response is not valid JSON".to_string(),
                    ))
                }),
            Err(err) => {
                ctx.logger().warn(format_args!("{}: {}", ctx.uri, err));
                Err(JsonRpcErrorObject::internal_error(
                    err.public_message().map(str::to_string),
                ))
            }
        }
    }
}
