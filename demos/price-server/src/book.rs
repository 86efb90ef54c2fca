//! In-memory price book shared by the REST and JSON-RPC surfaces

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sluice_bind::{Bind, CallContext};
use sluice_http::RequestError;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Price {
    pub sku: String,
    pub amount: i64,
    pub region: String,
    pub supplier_id: String,
}

/// `POST /prices`: body plus the supplier header and the region set on the pipeline
#[derive(Debug, Default, Deserialize, Bind)]
#[bind(body)]
pub struct SetPrice {
    pub sku: String,
    pub amount: i64,
    #[serde(skip)]
    #[bind(header = "X-Supplier-Id,notEmpty")]
    pub supplier_id: String,
    #[serde(skip)]
    #[bind(context = "region,required")]
    pub region: String,
}

/// `GET /prices/:sku`, the path parameter is copied into the value bag by an earlier step
#[derive(Debug, Default, Bind)]
pub struct GetPrice {
    #[bind(context = "sku,notEmpty")]
    pub sku: String,
    #[bind(query = "qty")]
    pub quantity: u32,
}

/// `get_price` over JSON-RPC, params only
#[derive(Debug, Default, Deserialize, Bind)]
#[bind(body)]
pub struct PriceLookup {
    pub sku: String,
    #[serde(skip)]
    #[bind(context = "region")]
    pub region: String,
}

#[derive(Debug, Serialize)]
pub struct Quote {
    pub sku: String,
    pub unit: i64,
    pub quantity: u32,
    pub total: i64,
}

#[derive(Clone, Default)]
pub struct PriceBook {
    prices: Arc<RwLock<HashMap<String, Price>>>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, req: SetPrice, cx: CallContext) -> Result<Price, RequestError> {
        if req.sku.is_empty() {
            return Err(RequestError::bad_request("sku is required"));
        }
        if req.amount < 0 {
            return Err(RequestError::bad_request("amount must not be negative"));
        }

        let price = Price {
            sku: req.sku,
            amount: req.amount,
            region: req.region,
            supplier_id: req.supplier_id,
        };
        cx.logger()
            .debug(format_args!("price of {} set to {}", price.sku, price.amount));
        self.prices.write().insert(price.sku.clone(), price.clone());
        Ok(price)
    }

    pub async fn quote(&self, req: GetPrice, _cx: CallContext) -> Result<Quote, RequestError> {
        let unit = self.find(&req.sku)?.amount;
        let quantity = req.quantity.max(1);
        Ok(Quote {
            sku: req.sku,
            unit,
            quantity,
            total: unit.saturating_mul(i64::from(quantity)),
        })
    }

    pub async fn lookup(&self, req: PriceLookup, _cx: CallContext) -> Result<Price, RequestError> {
        let price = self.find(&req.sku)?;
        if !req.region.is_empty() && price.region != req.region {
            return Err(RequestError::new(
                StatusCode::NOT_FOUND,
                format!("no price for {} in {}", req.sku, req.region),
            ));
        }
        Ok(price)
    }

    fn find(&self, sku: &str) -> Result<Price, RequestError> {
        self.prices
            .read()
            .get(sku)
            .cloned()
            .ok_or_else(|| RequestError::new(StatusCode::NOT_FOUND, format!("unknown sku '{sku}'")))
    }
}
