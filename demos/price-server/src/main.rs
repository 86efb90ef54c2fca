//! # Price Server
//!
//! A small price book served two ways from the same business functions:
//!
//! - `POST /prices` binds the JSON body, the `X-Supplier-Id` header and a pipeline value
//! - `GET /prices/:sku?qty=N` binds the path parameter (via the value bag) and a query value
//! - `POST /rpc` exposes `set_price` and `get_price` as JSON-RPC methods
//! - `GET /metrics` renders the request counters in text form
//!
//! ```bash
//! cargo run -p price-server -- --port 8672 --region eu
//! curl -X POST localhost:8672/prices -H 'content-type: application/json' \
//!      -H 'X-Supplier-Id: acme' -d '{"sku":"bolt","amount":12}'
//! curl 'localhost:8672/prices/bolt?qty=3'
//! ```

mod book;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use http::{StatusCode, request::Parts};
use sluice_bind::{CallContext, Vat};
use sluice_http::{
    Flow, HttpMetrics, JsonRpcStep, MetricsRegistry, Pipeline, PipelineBuilder, ResponseSink,
    Router, Server, ServerConfig, step_fn,
};
use sluice_json_rpc::JsonRpcServer;
use tracing::{error, info};

use crate::book::{GetPrice, PriceBook, PriceLookup, SetPrice};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8672")]
    port: u16,

    /// Region stamped on every price set through this instance
    #[arg(long, default_value = "eu")]
    region: String,

    /// Request deadline in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Request body ceiling in bytes
    #[arg(long, default_value = "65536")]
    max_body_bytes: usize,
}

fn recover(writer: &mut dyn ResponseSink, request: &Parts, _payload: Box<dyn Any + Send>) {
    error!("handler panicked on {} {}", request.method, request.uri);
    writer.write_status(StatusCode::INTERNAL_SERVER_ERROR);
}

fn base_pipeline(args: &Args, metrics: HttpMetrics) -> PipelineBuilder {
    Pipeline::builder()
        .value("region", args.region.as_str())
        .request_timeout(Duration::from_millis(args.timeout_ms))
        .max_body_bytes(args.max_body_bytes)
        .metrics(metrics)
        .panic_hook(recover)
}

fn build_router(args: &Args, book: PriceBook, registry: Arc<MetricsRegistry>) -> Result<Router> {
    let set_price = {
        let book = book.clone();
        Vat::new(move |req: SetPrice, cx: CallContext| {
            let book = book.clone();
            async move { book.set(req, cx).await }
        })?
    };
    let get_price = {
        let book = book.clone();
        Vat::new(move |req: GetPrice, cx: CallContext| {
            let book = book.clone();
            async move { book.quote(req, cx).await }
        })?
    };
    let lookup = Vat::new(move |req: PriceLookup, cx: CallContext| {
        let book = book.clone();
        async move { book.lookup(req, cx).await }
    })?;

    let rpc = JsonRpcServer::new()
        .add_method("set_price", set_price.json_rpc_handler()?)
        .add_method("get_price", lookup.json_rpc_handler()?);

    let mut router = Router::new();

    router.post(
        "/prices",
        base_pipeline(args, HttpMetrics::register(&registry, "price", "set_price")?)
            .step(set_price.step())
            .build(),
    )?;

    router.get(
        "/prices/:sku",
        base_pipeline(args, HttpMetrics::register(&registry, "price", "get_price")?)
            .step(step_fn(|ctx| {
                Box::pin(async move {
                    let sku = ctx.path_param("sku").unwrap_or_default().to_string();
                    ctx.values_mut().insert("sku", sku);
                    Ok(Flow::Continue)
                })
            }))
            .step(get_price.step())
            .build(),
    )?;

    router.post(
        "/rpc",
        base_pipeline(args, HttpMetrics::register(&registry, "price", "rpc")?)
            .step(JsonRpcStep::new(rpc))
            .build(),
    )?;

    router.get(
        "/metrics",
        Pipeline::builder()
            .step(step_fn(move |ctx| {
                let registry = Arc::clone(&registry);
                Box::pin(async move {
                    ctx.send_text(StatusCode::OK, &registry.render());
                    Ok(Flow::Halt)
                })
            }))
            .build(),
    )?;

    Ok(router)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("price_server=info,sluice_http=info,sluice_bind=info")
        .init();

    let args = Args::parse();
    let registry = Arc::new(MetricsRegistry::new());
    let router = build_router(&args, PriceBook::new(), registry)?;

    let bind_address = SocketAddr::from(([127, 0, 0, 1], args.port));
    info!("Starting price server on {bind_address}, region {}", args.region);

    Server::new(ServerConfig { bind_address }, router).run().await?;
    Ok(())
}
