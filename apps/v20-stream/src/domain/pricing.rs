//! Pricing Stream Types
//!
//! Payloads of `GET /v3/accounts/{accountID}/pricing/stream`.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {"type":"PRICE","instrument":"EUR_USD","time":"2016-09-20T15:05:47.960449532Z",
//!  "tradeable":true,"status":"tradeable",
//!  "bids":[{"price":"1.11515","liquidity":10000000}],
//!  "asks":[{"price":"1.11530","liquidity":10000000}],
//!  "closeoutBid":"1.11500","closeoutAsk":"1.11545"}
//! {"type":"HEARTBEAT","time":"2016-09-20T15:05:50.163791738Z"}
//! ```
//!
//! Heartbeats and prices share one record shape so a single pooled
//! [`Price`] can be decoded from either and classified afterwards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::HEARTBEAT_TYPE;

/// One level of the order book offered by the pricing stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBucket {
    /// Price offered at this level.
    pub price: Decimal,

    /// Units available at this price.
    #[serde(default)]
    pub liquidity: i64,
}

/// Home currency conversion factors attached to a price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteHomeConversionFactors {
    /// Factor applied to a positive amount in the quote currency.
    pub positive_units: Decimal,
    /// Factor applied to a negative amount in the quote currency.
    pub negative_units: Decimal,
}

/// A price tick (or heartbeat) from the pricing stream.
///
/// Every field defaults so a heartbeat frame, which only carries `type`
/// and `time`, decodes into the same record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Price {
    /// Type tag: `PRICE` or `HEARTBEAT`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Instrument name, e.g. `EUR_USD`.
    pub instrument: String,

    /// Time the price was created.
    pub time: DateTime<Utc>,

    /// Whether the instrument can currently be traded.
    pub tradeable: bool,

    /// Deprecated status string kept by the server for older clients.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Bid side of the book, best first.
    pub bids: Vec<PriceBucket>,

    /// Ask side of the book, best first.
    pub asks: Vec<PriceBucket>,

    /// Closeout bid price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closeout_bid: Option<Decimal>,

    /// Closeout ask price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closeout_ask: Option<Decimal>,

    /// Conversion factors into the account home currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_home_conversion_factors: Option<QuoteHomeConversionFactors>,
}

impl Price {
    /// Whether this record is a keep-alive rather than a price.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.kind == HEARTBEAT_TYPE
    }

    /// Best (first) bid, if the book has one.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|b| b.price)
    }

    /// Best (first) ask, if the book has one.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|b| b.price)
    }

    /// Mid price from the best bid and ask.
    #[must_use]
    pub fn mid(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid + ask) / Decimal::TWO)
    }

    /// Ask minus bid at the top of the book.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()? - self.best_bid()?)
    }
}

/// Keep-alive notification from the pricing stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingHeartbeat {
    /// Server time carried by the heartbeat.
    pub time: DateTime<Utc>,
}
