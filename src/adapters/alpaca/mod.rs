//! Alpaca REST adapter for live and paper trading.
//!
//! Account, orders and positions go to the trading base URL; bars and
//! latest trades go to the market data URL. All calls are blocking.

pub mod types;

use crate::adapters::credentials::Credentials;
use crate::domain::error::CrosstraderError;
use crate::domain::ohlcv::{normalize, PriceBar};
use crate::domain::order::OrderIntent;
use crate::ports::broker_port::BrokerPort;
use crate::ports::data_port::MarketDataPort;
use chrono::{DateTime, NaiveDate};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};
use types::{
    Account, ApiError, Bar, BarsPage, LatestTradeResponse, OpenOrder, OrderRequest, OrderResponse,
};

const PAGE_LIMIT: &str = "10000";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CANCEL_POLL_ATTEMPTS: usize = 10;
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct AlpacaClient {
    http: Client,
    base_url: String,
    data_url: String,
}

impl AlpacaClient {
    pub fn new(credentials: &Credentials) -> Result<Self, CrosstraderError> {
        let mut headers = HeaderMap::new();
        headers.insert("apca-api-key-id", header_value("API_KEY", &credentials.key_id)?);
        headers.insert("apca-api-secret-key", header_value("API_SECRET", &credentials.secret)?);

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| CrosstraderError::Broker {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(AlpacaClient {
            http,
            base_url: credentials.base_url.clone(),
            data_url: credentials.data_url.clone(),
        })
    }

    fn fetch_bars_page(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        page_token: Option<&str>,
    ) -> Result<BarsPage, String> {
        let url = format!("{}/v2/stocks/{}/bars", self.data_url, symbol);
        let start = start.format("%Y-%m-%d").to_string();
        // Daily bars are stamped after midnight UTC, so a bare end date would drop the last day.
        let end = format!("{}T23:59:59Z", end.format("%Y-%m-%d"));

        let mut query: Vec<(&str, &str)> = vec![
            ("timeframe", "1Day"),
            ("start", start.as_str()),
            ("end", end.as_str()),
            ("limit", PAGE_LIMIT),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .map_err(|e| e.to_string())?;
        let response = check_status(response)?;
        response.json::<BarsPage>().map_err(|e| e.to_string())
    }

    fn open_order_ids(&self, symbol: &str) -> Result<Vec<String>, String> {
        let url = format!("{}/v2/orders", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("status", "open"), ("symbols", symbol)])
            .send()
            .map_err(|e| e.to_string())?;
        let orders: Vec<OpenOrder> = check_status(response)?.json().map_err(|e| e.to_string())?;
        Ok(orders
            .into_iter()
            .filter(|o| o.symbol.is_empty() || o.symbol == symbol)
            .map(|o| o.id)
            .collect())
    }

    /// Cancel every open order on `symbol` and wait until none are listed.
    ///
    /// The take-profit and stop-loss legs of a bracket hold the position's
    /// shares, and Alpaca refuses to liquidate shares held by open orders.
    fn cancel_open_orders(&self, symbol: &str) -> Result<(), String> {
        let ids = self.open_order_ids(symbol)?;
        if ids.is_empty() {
            return Ok(());
        }
        for id in &ids {
            let url = format!("{}/v2/orders/{}", self.base_url, id);
            let response = self.http.delete(&url).send().map_err(|e| e.to_string())?;
            match response.status() {
                // Already filled or cancelled, including the OCO sibling of a cancelled leg.
                StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
                    debug!(symbol, order_id = %id, "order no longer cancelable");
                }
                _ => {
                    check_status(response)?;
                    debug!(symbol, order_id = %id, "order cancel requested");
                }
            }
        }

        for _ in 0..CANCEL_POLL_ATTEMPTS {
            if self.open_order_ids(symbol)?.is_empty() {
                info!(symbol, cancelled = ids.len(), "open orders cancelled");
                return Ok(());
            }
            std::thread::sleep(CANCEL_POLL_INTERVAL);
        }
        Err(format!("open orders on {symbol} still pending cancel"))
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, CrosstraderError> {
    HeaderValue::from_str(value).map_err(|_| CrosstraderError::MissingCredential {
        name: format!("{name} (contains characters not allowed in a header)"),
    })
}

/// Pass 2xx responses through; turn anything else into the API's error message.
fn check_status(response: Response) -> Result<Response, String> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(describe_error(status, &body))
}

fn describe_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(err) if !err.message.is_empty() => match err.code {
            Some(code) => format!("{status} ({code}): {}", err.message),
            None => format!("{status}: {}", err.message),
        },
        _ if body.trim().is_empty() => status.to_string(),
        _ => format!("{status}: {}", body.trim()),
    }
}

fn bar_to_price_bar(symbol: &str, bar: &Bar) -> Result<PriceBar, String> {
    let date = DateTime::parse_from_rfc3339(&bar.t)
        .map_err(|e| format!("invalid bar timestamp {:?}: {e}", bar.t))?
        .date_naive();
    Ok(PriceBar {
        symbol: symbol.to_string(),
        date,
        open: bar.o,
        high: bar.h,
        low: bar.l,
        close: bar.c,
        volume: bar.v as i64,
    })
}

impl MarketDataPort for AlpacaClient {
    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, CrosstraderError> {
        let unavailable = |reason: String| CrosstraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let mut bars = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .fetch_bars_page(symbol, start, end, page_token.as_deref())
                .map_err(unavailable)?;
            for bar in page.bars.unwrap_or_default() {
                bars.push(bar_to_price_bar(symbol, &bar).map_err(unavailable)?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(symbol, %start, %end, bars = bars.len(), "fetched bars");
        Ok(normalize(bars))
    }
}

impl BrokerPort for AlpacaClient {
    fn get_cash(&self) -> Result<f64, CrosstraderError> {
        let broker = |reason: String| CrosstraderError::Broker { reason };
        let url = format!("{}/v2/account", self.base_url);

        let response = self.http.get(&url).send().map_err(|e| broker(e.to_string()))?;
        let account: Account = check_status(response)
            .map_err(broker)?
            .json()
            .map_err(|e| broker(e.to_string()))?;
        account
            .cash
            .parse::<f64>()
            .map_err(|_| broker(format!("unparseable account cash {:?}", account.cash)))
    }

    fn get_last_price(&self, symbol: &str) -> Result<f64, CrosstraderError> {
        let unavailable = |reason: String| CrosstraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };
        let url = format!("{}/v2/stocks/{}/trades/latest", self.data_url, symbol);

        let response = self.http.get(&url).send().map_err(|e| unavailable(e.to_string()))?;
        let latest: LatestTradeResponse = check_status(response)
            .map_err(unavailable)?
            .json()
            .map_err(|e| unavailable(e.to_string()))?;
        if !(latest.trade.price.is_finite() && latest.trade.price > 0.0) {
            return Err(unavailable(format!("invalid last price {}", latest.trade.price)));
        }
        Ok(latest.trade.price)
    }

    fn submit_order(&mut self, intent: &OrderIntent) -> Result<String, CrosstraderError> {
        let url = format!("{}/v2/orders", self.base_url);
        let body = OrderRequest::from(intent);

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| CrosstraderError::Broker { reason: e.to_string() })?;
        let order: OrderResponse = check_status(response)
            .map_err(|reason| CrosstraderError::OrderRejected {
                symbol: intent.symbol.clone(),
                reason,
            })?
            .json()
            .map_err(|e| CrosstraderError::Broker { reason: e.to_string() })?;

        info!(
            order_id = %order.id,
            symbol = %intent.symbol,
            side = %intent.side,
            qty = intent.quantity,
            take_profit = body.take_profit.limit_price,
            stop_loss = body.stop_loss.stop_price,
            "order submitted"
        );
        Ok(order.id)
    }

    fn close_position(&mut self, symbol: &str) -> Result<(), CrosstraderError> {
        self.cancel_open_orders(symbol)
            .map_err(|reason| CrosstraderError::OrderRejected {
                symbol: symbol.to_string(),
                reason: format!("cancelling open orders: {reason}"),
            })?;

        let url = format!("{}/v2/positions/{}", self.base_url, symbol);

        let response = self
            .http
            .delete(&url)
            .send()
            .map_err(|e| CrosstraderError::Broker { reason: e.to_string() })?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(symbol, "no open position to close");
            return Ok(());
        }
        check_status(response).map_err(|reason| CrosstraderError::OrderRejected {
            symbol: symbol.to_string(),
            reason,
        })?;

        info!(symbol, "position closed");
        Ok(())
    }
}
