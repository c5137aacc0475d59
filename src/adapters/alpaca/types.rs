//! Wire types for the Alpaca trading and market data REST APIs.

use crate::domain::order::OrderIntent;
use serde::{Deserialize, Serialize};

/// `GET /v2/account`. Monetary fields arrive as decimal strings.
#[derive(Debug, Deserialize)]
pub struct Account {
    pub cash: String,
}

/// `GET /v2/stocks/{symbol}/trades/latest`.
#[derive(Debug, Deserialize)]
pub struct LatestTradeResponse {
    pub trade: Trade,
}

#[derive(Debug, Deserialize)]
pub struct Trade {
    #[serde(rename = "p")]
    pub price: f64,
}

/// One page of `GET /v2/stocks/{symbol}/bars`.
#[derive(Debug, Deserialize)]
pub struct BarsPage {
    #[serde(default)]
    pub bars: Option<Vec<Bar>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Bar {
    pub t: String,
    pub o: f64,
    pub h: f64,
    pub l: f64,
    pub c: f64,
    pub v: f64,
}

/// Body of `POST /v2/orders` for a bracket entry.
#[derive(Debug, Serialize, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub qty: String,
    pub side: &'static str,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub time_in_force: &'static str,
    pub order_class: &'static str,
    pub take_profit: TakeProfit,
    pub stop_loss: StopLoss,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct TakeProfit {
    pub limit_price: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StopLoss {
    pub stop_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub id: String,
}

/// One entry of `GET /v2/orders?status=open`. Bracket legs are listed
/// alongside their parent.
#[derive(Debug, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

/// Alpaca rejects sub-penny limit and stop prices on stocks priced above $1.
pub fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

impl From<&OrderIntent> for OrderRequest {
    fn from(intent: &OrderIntent) -> Self {
        OrderRequest {
            symbol: intent.symbol.clone(),
            qty: intent.quantity.to_string(),
            side: intent.side.as_str(),
            order_type: "market",
            time_in_force: "gtc",
            order_class: "bracket",
            take_profit: TakeProfit {
                limit_price: round_cents(intent.take_profit_price),
            },
            stop_loss: StopLoss {
                stop_price: round_cents(intent.stop_loss_price),
            },
        }
    }
}
