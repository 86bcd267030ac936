//! Transaction Stream Types
//!
//! Payloads of `GET /v3/accounts/{accountID}/transactions/stream`.
//!
//! Every frame carries a `type` string. `HEARTBEAT` frames report the last
//! transaction ID seen by the server; every other frame is one account
//! transaction. The set of transaction types is open: known types decode
//! into typed structs, anything else is kept as raw JSON in
//! [`Transaction::Other`] so new server-side types never break a stream.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {"type":"HEARTBEAT","lastTransactionID":"6356","time":"2016-09-20T18:14:08.437411473Z"}
//! {"id":"6357","accountID":"101-004-1435156-001","userID":1435156,"batchID":"6357",
//!  "time":"2016-09-20T18:14:12.337419376Z","type":"MARKET_ORDER","instrument":"EUR_USD",
//!  "units":"100","timeInForce":"FOK","positionFill":"DEFAULT","reason":"CLIENT_ORDER"}
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::HEARTBEAT_TYPE;

// =============================================================================
// Shared Pieces
// =============================================================================

/// Fields present on every transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Transaction ID.
    pub id: String,

    /// Time the transaction was executed.
    pub time: DateTime<Utc>,

    /// User that initiated the transaction.
    #[serde(rename = "userID", default)]
    pub user_id: i64,

    /// Account the transaction belongs to.
    #[serde(rename = "accountID", default)]
    pub account_id: String,

    /// ID of the first transaction in the same batch.
    #[serde(rename = "batchID", default)]
    pub batch_id: String,

    /// Request that produced the transaction.
    #[serde(rename = "requestID", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Client-supplied tags attached to orders and trades.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientExtensions {
    /// Client ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Client tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Client comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

// =============================================================================
// Account Transactions
// =============================================================================

/// `CREATE`: account creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransaction {
    /// Common fields.
    #[serde(flatten)]
    pub header: TransactionHeader,
    /// Division the account belongs to.
    #[serde(rename = "divisionID", default)]
    pub division_id: i64,
    /// Site the account belongs to.
    #[serde(rename = "siteID", default)]
    pub site_id: i64,
    /// User that owns the account.
    #[serde(rename = "accountUserID", default)]
    pub account_user_id: i64,
    /// Account number within the user.
    #[serde(default)]
    pub account_number: Option<i64>,
    /// Home currency of the account.
    #[serde(default)]
    pub home_currency: String,
}

/// `CLIENT_CONFIGURE`: alias or margin rate changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfigureTransaction {
    /// Common fields.
    #[serde(flatten)]
    pub header: TransactionHeader,
    /// New account alias.
    #[serde(default)]
    pub alias: Option<String>,
    /// New margin rate.
    #[serde(default)]
    pub margin_rate: Option<Decimal>,
}

/// `TRANSFER_FUNDS`: deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferFundsTransaction {
    /// Common fields.
    #[serde(flatten)]
    pub header: TransactionHeader,
    /// Amount deposited (positive) or withdrawn (negative).
    pub amount: Decimal,
    /// Why the funds moved.
    #[serde(default)]
    pub funding_reason: Option<String>,
    /// Free-form comment.
    #[serde(default)]
    pub comment: Option<String>,
    /// Balance after the transfer.
    #[serde(default)]
    pub account_balance: Option<Decimal>,
}

/// `DAILY_FINANCING`: financing charged or paid at rollover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyFinancingTransaction {
    /// Common fields.
    #[serde(flatten)]
    pub header: TransactionHeader,
    /// Financing amount in the home currency.
    pub financing: Decimal,
    /// Balance after financing.
    #[serde(default)]
    pub account_balance: Option<Decimal>,
    /// Financing mode in effect.
    #[serde(default)]
    pub account_financing_mode: Option<String>,
}

/// `MARGIN_CALL_ENTER`, `MARGIN_CALL_EXTEND`, `MARGIN_CALL_EXIT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginCallTransaction {
    /// Common fields.
    #[serde(flatten)]
    pub header: TransactionHeader,
    /// Which margin call transition this is.
    #[serde(rename = "type")]
    pub kind: String,
    /// Number of extensions granted so far (`MARGIN_CALL_EXTEND` only).
    #[serde(default)]
    pub extension_number: Option<i64>,
}

// =============================================================================
// Order Transactions
// =============================================================================

/// Order creation: `MARKET_ORDER`, `LIMIT_ORDER`, `STOP_ORDER`,
/// `TAKE_PROFIT_ORDER`, `STOP_LOSS_ORDER`, `TRAILING_STOP_LOSS_ORDER`, ...
///
/// The order types share most fields, so one struct keeps the type tag and
/// leaves type-specific fields optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTransaction {
    /// Common fields.
    #[serde(flatten)]
    pub header: TransactionHeader,
    /// Order type tag, e.g. `LIMIT_ORDER`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Instrument ordered (absent on dependent orders).
    #[serde(default)]
    pub instrument: Option<String>,
    /// Units; negative for sells.
    #[serde(default)]
    pub units: Option<Decimal>,
    /// Trigger or limit price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Price distance for trailing and distance-based orders.
    #[serde(default)]
    pub distance: Option<Decimal>,
    /// Trade a dependent order is attached to.
    #[serde(rename = "tradeID", default)]
    pub trade_id: Option<String>,
    /// Time in force, e.g. `FOK`, `GTC`.
    #[serde(default)]
    pub time_in_force: Option<String>,
    /// Expiry for `GTD` orders.
    #[serde(default)]
    pub gtd_time: Option<DateTime<Utc>>,
    /// Position fill behaviour.
    #[serde(default)]
    pub position_fill: Option<String>,
    /// Which side of the book triggers the order.
    #[serde(default)]
    pub trigger_condition: Option<String>,
    /// Why the order was created.
    #[serde(default)]
    pub reason: Option<String>,
    /// Client tags.
    #[serde(default)]
    pub client_extensions: Option<ClientExtensions>,
    /// Order this one replaces.
    #[serde(rename = "replacesOrderID", default)]
    pub replaces_order_id: Option<String>,
}

/// Any `*_ORDER_REJECT` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRejectTransaction {
    /// The rejected order request.
    #[serde(flatten)]
    pub order: OrderTransaction,
    /// Why the server rejected it.
    #[serde(default)]
    pub reject_reason: Option<String>,
}

/// Trade opened by a fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeOpen {
    /// ID of the new trade.
    #[serde(rename = "tradeID")]
    pub trade_id: String,
    /// Units opened.
    pub units: Decimal,
    /// Average open price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Client tags of the trade.
    #[serde(default)]
    pub client_extensions: Option<ClientExtensions>,
}

/// Trade closed or reduced by a fill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReduce {
    /// ID of the affected trade.
    #[serde(rename = "tradeID")]
    pub trade_id: String,
    /// Units closed.
    pub units: Decimal,
    /// Average close price.
    #[serde(default)]
    pub price: Option<Decimal>,
    /// Profit or loss realized.
    #[serde(rename = "realizedPL", default)]
    pub realized_pl: Option<Decimal>,
    /// Financing paid or collected.
    #[serde(default)]
    pub financing: Option<Decimal>,
}

/// `ORDER_FILL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFillTransaction {
    /// Common fields.
    #[serde(flatten)]
    pub header: TransactionHeader,
    /// Filled order.
    #[serde(rename = "orderID")]
    pub order_id: String,
    /// Client ID of the filled order.
    #[serde(rename = "clientOrderID", default)]
    pub client_order_id: Option<String>,
    /// Instrument filled.
    pub instrument: String,
    /// Units filled.
    pub units: Decimal,
    /// Volume-weighted average fill price.
    #[serde(rename = "fullVWAP", default)]
    pub full_vwap: Option<Decimal>,
    /// Why the fill happened.
    #[serde(default)]
    pub reason: Option<String>,
    /// Realized profit or loss.
    #[serde(rename = "pl", default)]
    pub pl: Option<Decimal>,
    /// Financing paid or collected.
    #[serde(default)]
    pub financing: Option<Decimal>,
    /// Commission charged.
    #[serde(default)]
    pub commission: Option<Decimal>,
    /// Cost of the half spread.
    #[serde(default)]
    pub half_spread_cost: Option<Decimal>,
    /// Balance after the fill.
    #[serde(default)]
    pub account_balance: Option<Decimal>,
    /// Trade opened by the fill.
    #[serde(default)]
    pub trade_opened: Option<TradeOpen>,
    /// Trades fully closed by the fill.
    #[serde(default)]
    pub trades_closed: Vec<TradeReduce>,
    /// Trade partially closed by the fill.
    #[serde(default)]
    pub trade_reduced: Option<TradeReduce>,
}

/// `ORDER_CANCEL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelTransaction {
    /// Common fields.
    #[serde(flatten)]
    pub header: TransactionHeader,
    /// Cancelled order.
    #[serde(rename = "orderID")]
    pub order_id: String,
    /// Client ID of the cancelled order.
    #[serde(rename = "clientOrderID", default)]
    pub client_order_id: Option<String>,
    /// Why the order was cancelled.
    #[serde(default)]
    pub reason: Option<String>,
    /// Order that replaced the cancelled one.
    #[serde(rename = "replacedByOrderID", default)]
    pub replaced_by_order_id: Option<String>,
}

// =============================================================================
// Resolved Transaction
// =============================================================================

/// A transaction resolved from its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    /// `CREATE`.
    Create(CreateTransaction),
    /// `CLOSE`.
    Close(TransactionHeader),
    /// `REOPEN`.
    Reopen(TransactionHeader),
    /// `CLIENT_CONFIGURE`.
    ClientConfigure(ClientConfigureTransaction),
    /// `TRANSFER_FUNDS`.
    TransferFunds(TransferFundsTransaction),
    /// Any order creation transaction.
    Order(OrderTransaction),
    /// Any `*_ORDER_REJECT` transaction.
    OrderReject(OrderRejectTransaction),
    /// `ORDER_FILL`.
    OrderFill(OrderFillTransaction),
    /// `ORDER_CANCEL`.
    OrderCancel(OrderCancelTransaction),
    /// Margin call transitions.
    MarginCall(MarginCallTransaction),
    /// `DAILY_FINANCING`.
    DailyFinancing(DailyFinancingTransaction),
    /// A type this client has no typed struct for.
    Other {
        /// The `type` tag.
        kind: String,
        /// The full frame.
        body: serde_json::Value,
    },
}

const ORDER_TYPES: &[&str] = &[
    "MARKET_ORDER",
    "FIXED_PRICE_ORDER",
    "LIMIT_ORDER",
    "STOP_ORDER",
    "MARKET_IF_TOUCHED_ORDER",
    "TAKE_PROFIT_ORDER",
    "STOP_LOSS_ORDER",
    "GUARANTEED_STOP_LOSS_ORDER",
    "TRAILING_STOP_LOSS_ORDER",
];

impl Transaction {
    /// Resolve the concrete variant for `kind` from an already parsed frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match the shape of a known type.
    pub fn from_value(kind: &str, body: serde_json::Value) -> Result<Self, serde_json::Error> {
        let transaction = match kind {
            "CREATE" => Self::Create(serde_json::from_value(body)?),
            "CLOSE" => Self::Close(serde_json::from_value(body)?),
            "REOPEN" => Self::Reopen(serde_json::from_value(body)?),
            "CLIENT_CONFIGURE" => Self::ClientConfigure(serde_json::from_value(body)?),
            "TRANSFER_FUNDS" => Self::TransferFunds(serde_json::from_value(body)?),
            "ORDER_FILL" => Self::OrderFill(serde_json::from_value(body)?),
            "ORDER_CANCEL" => Self::OrderCancel(serde_json::from_value(body)?),
            "DAILY_FINANCING" => Self::DailyFinancing(serde_json::from_value(body)?),
            "MARGIN_CALL_ENTER" | "MARGIN_CALL_EXTEND" | "MARGIN_CALL_EXIT" => {
                Self::MarginCall(serde_json::from_value(body)?)
            }
            k if ORDER_TYPES.contains(&k) => Self::Order(serde_json::from_value(body)?),
            k if k.ends_with("_ORDER_REJECT") => Self::OrderReject(serde_json::from_value(body)?),
            other => Self::Other {
                kind: other.to_string(),
                body,
            },
        };
        Ok(transaction)
    }

    /// The `type` tag of this transaction.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Create(_) => "CREATE",
            Self::Close(_) => "CLOSE",
            Self::Reopen(_) => "REOPEN",
            Self::ClientConfigure(_) => "CLIENT_CONFIGURE",
            Self::TransferFunds(_) => "TRANSFER_FUNDS",
            Self::Order(t) => &t.kind,
            Self::OrderReject(t) => &t.order.kind,
            Self::OrderFill(_) => "ORDER_FILL",
            Self::OrderCancel(_) => "ORDER_CANCEL",
            Self::MarginCall(t) => &t.kind,
            Self::DailyFinancing(_) => "DAILY_FINANCING",
            Self::Other { kind, .. } => kind,
        }
    }

    /// Common fields, when the variant is typed.
    #[must_use]
    pub const fn header(&self) -> Option<&TransactionHeader> {
        match self {
            Self::Create(t) => Some(&t.header),
            Self::Close(h) | Self::Reopen(h) => Some(h),
            Self::ClientConfigure(t) => Some(&t.header),
            Self::TransferFunds(t) => Some(&t.header),
            Self::Order(t) => Some(&t.header),
            Self::OrderReject(t) => Some(&t.order.header),
            Self::OrderFill(t) => Some(&t.header),
            Self::OrderCancel(t) => Some(&t.header),
            Self::MarginCall(t) => Some(&t.header),
            Self::DailyFinancing(t) => Some(&t.header),
            Self::Other { .. } => None,
        }
    }

    /// Transaction ID, also for untyped variants.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Other { body, .. } => body.get("id").and_then(serde_json::Value::as_str),
            typed => typed.header().map(|h| h.id.as_str()),
        }
    }
}

/// Keep-alive notification from the transaction stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeartbeat {
    /// ID of the most recent transaction on the account.
    #[serde(rename = "lastTransactionID", default)]
    pub last_transaction_id: String,

    /// Server time carried by the heartbeat.
    pub time: DateTime<Utc>,
}

/// One classified frame of the transaction stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionEvent {
    /// Keep-alive.
    Heartbeat(TransactionHeartbeat),
    /// Account transaction.
    Transaction(Box<Transaction>),
}

impl TransactionEvent {
    /// Classify and decode one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object with a string
    /// `type` tag, or if a known type has the wrong shape.
    pub fn from_slice(frame: &[u8]) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_slice(frame)?;

        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| <serde_json::Error as serde::de::Error>::missing_field("type"))?;

        if kind == HEARTBEAT_TYPE {
            return Ok(Self::Heartbeat(serde_json::from_value(value)?));
        }

        let transaction = Transaction::from_value(&kind, value)?;
        Ok(Self::Transaction(Box::new(transaction)))
    }
}
