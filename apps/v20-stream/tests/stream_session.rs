//! Stream Session Integration Tests
//!
//! Runs sessions against a minimal HTTP/1.1 server that writes chunked
//! bodies with chunk boundaries that do not line up with frames.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use v20_stream::{
    ClientConfig, Credentials, DecoderConfig, Environment, HandlerErrorPolicy, Pooled, Price,
    PriceHandler, PricingHeartbeat, SessionOptions, SessionState, StreamClient, Transaction,
    TransactionHandler, TransactionHeartbeat,
};

const ACCOUNT: &str = "101-004-1435156-001";

// =============================================================================
// Chunked HTTP server
// =============================================================================

/// What the server does after writing its chunks.
#[derive(Clone, Copy)]
enum Ending {
    /// Terminate the chunked body.
    Finish,
    /// Keep the connection open until the client goes away.
    HoldOpen,
}

struct ServedRequest {
    head: String,
    /// Fires when the client has closed the connection.
    client_gone: oneshot::Receiver<()>,
}

async fn read_request_head(socket: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if socket.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

async fn write_chunk(socket: &mut TcpStream, chunk: &[u8]) {
    socket
        .write_all(format!("{:x}\r\n", chunk.len()).as_bytes())
        .await
        .unwrap();
    socket.write_all(chunk).await.unwrap();
    socket.write_all(b"\r\n").await.unwrap();
    socket.flush().await.unwrap();
}

/// Serve one streaming response and return its base URL.
async fn serve(chunks: &[&str], ending: Ending) -> (String, oneshot::Receiver<ServedRequest>) {
    let chunks: Vec<String> = chunks.iter().map(|c| (*c).to_string()).collect();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (served_tx, served_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_request_head(&mut socket).await;
        let (gone_tx, gone_rx) = oneshot::channel();
        let _ = served_tx.send(ServedRequest {
            head,
            client_gone: gone_rx,
        });

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nTransfer-Encoding: chunked\r\n\r\n",
            )
            .await
            .unwrap();

        for chunk in &chunks {
            write_chunk(&mut socket, chunk.as_bytes()).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        match ending {
            Ending::Finish => {
                let _ = socket.write_all(b"0\r\n\r\n").await;
                let _ = socket.shutdown().await;
            }
            Ending::HoldOpen => {
                let mut sink = [0u8; 64];
                loop {
                    match socket.read(&mut sink).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                let _ = gone_tx.send(());
            }
        }
    });

    (format!("http://{addr}"), served_rx)
}

// =============================================================================
// Recording handler
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Price(String),
    Heartbeat,
    Transaction(String),
}

#[derive(Clone)]
struct Recorder {
    events: mpsc::UnboundedSender<Event>,
    closes: Arc<AtomicUsize>,
}

impl Recorder {
    fn new() -> (Self, mpsc::UnboundedReceiver<Event>, Arc<AtomicUsize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        (
            Self {
                events: tx,
                closes: Arc::clone(&closes),
            },
            rx,
            closes,
        )
    }
}

impl PriceHandler for Recorder {
    fn on_price(&mut self, price: Pooled<Price>) -> anyhow::Result<()> {
        if price.instrument == "FAIL" {
            anyhow::bail!("refusing {}", price.instrument);
        }
        let _ = self.events.send(Event::Price(price.instrument.clone()));
        Ok(())
    }

    fn on_heartbeat(&mut self, _heartbeat: PricingHeartbeat) -> anyhow::Result<()> {
        let _ = self.events.send(Event::Heartbeat);
        Ok(())
    }

    fn on_close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl TransactionHandler for Recorder {
    fn on_transaction(&mut self, transaction: Transaction) -> anyhow::Result<()> {
        let _ = self
            .events
            .send(Event::Transaction(transaction.kind().to_string()));
        Ok(())
    }

    fn on_heartbeat(&mut self, _heartbeat: TransactionHeartbeat) -> anyhow::Result<()> {
        let _ = self.events.send(Event::Heartbeat);
        Ok(())
    }

    fn on_close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn client_for(base_url: &str) -> StreamClient {
    let mut config = ClientConfig::new(
        Environment::Practice,
        Credentials::new("test-token".to_string(), ACCOUNT.to_string()),
    );
    config.stream_url = Some(base_url.to_string());
    StreamClient::new(&config).unwrap()
}

fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn pricing_frames_split_across_chunks_arrive_in_order() {
    let (url, served) = serve(
        &[
            r#"{"type":"PRICE","instrument":"EUR_USD","time":"2016-09-20T15:05:47Z","#,
            r#""bids":[{"price":"1.1","liquidity":1}],"asks":[]}"#,
            "\n{\"type\":\"HEARTBEAT\",\"time\":\"2016-09-20T15:05:50Z\"}\n{\"type\":\"PRI",
            r#"CE","instrument":"USD_JPY","time":"2016-09-20T15:05:51Z"}"#,
        ],
        Ending::Finish,
    )
    .await;

    let (recorder, mut events, closes) = Recorder::new();
    let session = client_for(&url)
        .stream_pricing(&["EUR_USD", "USD_JPY"], true, recorder)
        .await
        .unwrap();

    timeout(Duration::from_secs(5), session.wait())
        .await
        .expect("server ends the stream");

    assert_eq!(
        drain(&mut events),
        vec![
            Event::Price("EUR_USD".to_string()),
            Event::Heartbeat,
            Event::Price("USD_JPY".to_string()),
        ]
    );
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(session.state(), SessionState::Closed);

    let request = served.await.unwrap();
    let head = request.head.to_lowercase();
    assert!(head.starts_with(&format!(
        "get /v3/accounts/{}/pricing/stream?instruments=eur_usd%2cusd_jpy&snapshot=true ",
        ACCOUNT.to_lowercase()
    )));
    assert!(head.contains("authorization: bearer test-token"));
    assert!(head.contains("accept-datetime-format: rfc3339"));
}

#[tokio::test]
async fn close_releases_the_connection_before_notifying() {
    let (url, served) = serve(
        &["{\"type\":\"HEARTBEAT\",\"lastTransactionID\":\"1\",\"time\":\"2016-09-20T18:14:08Z\"}\n"],
        Ending::HoldOpen,
    )
    .await;

    let (recorder, mut events, closes) = Recorder::new();
    let session = client_for(&url)
        .stream_transactions(recorder)
        .await
        .unwrap();

    let first = timeout(Duration::from_secs(5), events.recv()).await.unwrap();
    assert_eq!(first, Some(Event::Heartbeat));
    assert_eq!(session.state(), SessionState::Running);

    let done = session.done();
    assert!(session.close());
    done.await;
    session.wait().await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    let request = served.await.unwrap();
    timeout(Duration::from_secs(5), request.client_gone)
        .await
        .expect("connection closed after session close")
        .unwrap();

    assert!(!session.close());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_closes_notify_once() {
    let (url, _served) = serve(&[], Ending::HoldOpen).await;

    let (recorder, _events, closes) = Recorder::new();
    let session = Arc::new(
        client_for(&url)
            .stream_transactions(recorder)
            .await
            .unwrap(),
    );

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.close() })
        })
        .collect();

    let mut performed = 0;
    for handle in handles {
        performed += usize::from(handle.await.unwrap());
    }
    session.wait().await;

    assert_eq!(performed, 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transaction_stream_closes_itself_at_end_of_stream() {
    let (url, _served) = serve(
        &[
            r#"{"id":"6357","time":"2016-09-20T18:14:12Z","type":"MARKET_ORDER","instrument":"EUR_USD","units":"100"}"#,
            "\n{\"id\":\"6360\",\"time\":\"2016-09-20T18:14:13Z\",\"type\":\"SOMETHING_NEW\"}\n",
        ],
        Ending::Finish,
    )
    .await;

    let (recorder, mut events, closes) = Recorder::new();
    let session = client_for(&url)
        .stream_transactions(recorder)
        .await
        .unwrap();

    timeout(Duration::from_secs(5), session.done())
        .await
        .expect("end of stream closes the session");
    session.wait().await;

    assert_eq!(
        drain(&mut events),
        vec![
            Event::Transaction("MARKET_ORDER".to_string()),
            Event::Transaction("SOMETHING_NEW".to_string()),
        ]
    );
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oversized_frame_terminates_the_session() {
    let padding = " ".repeat(256);
    let (url, _served) = serve(
        &[
            "{\"type\":\"HEARTBEAT\",\"time\":\"2016-09-20T15:05:50Z\"}\n{\"type\":",
            padding.as_str(),
            padding.as_str(),
        ],
        Ending::HoldOpen,
    )
    .await;

    let (recorder, mut events, closes) = Recorder::new();
    let options = SessionOptions {
        decoder: DecoderConfig {
            initial_capacity: 64,
            grow_by: 64,
            min_free: 16,
            max_capacity: 256,
        },
        on_handler_error: HandlerErrorPolicy::Continue,
    };
    let session = client_for(&url)
        .with_session_options(options)
        .stream_pricing(&["EUR_USD"], false, recorder)
        .await
        .unwrap();

    timeout(Duration::from_secs(5), session.wait())
        .await
        .expect("ceiling closes the session");

    assert_eq!(drain(&mut events), vec![Event::Heartbeat]);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn handler_errors_follow_the_session_policy() {
    let chunks = [
        "{\"type\":\"PRICE\",\"instrument\":\"FAIL\",\"time\":\"2016-09-20T15:05:47Z\"}\n",
        "not json\n",
        "{\"type\":\"PRICE\",\"instrument\":\"EUR_USD\",\"time\":\"2016-09-20T15:05:48Z\"}\n",
    ];

    // Report: both failures are forwarded, the stream carries on.
    let (url, _served) = serve(&chunks, Ending::Finish).await;
    let (report_tx, mut report_rx) = mpsc::channel(8);
    let (recorder, mut events, _closes) = Recorder::new();
    let session = client_for(&url)
        .with_session_options(SessionOptions {
            on_handler_error: HandlerErrorPolicy::Report(report_tx),
            ..SessionOptions::default()
        })
        .stream_pricing(&["EUR_USD"], false, recorder)
        .await
        .unwrap();
    session.wait().await;

    assert_eq!(drain(&mut events), vec![Event::Price("EUR_USD".to_string())]);
    assert!(matches!(
        report_rx.recv().await,
        Some(v20_stream::RouteError::Handler(_))
    ));
    assert!(matches!(
        report_rx.recv().await,
        Some(v20_stream::RouteError::Decode(_))
    ));

    // Close: the first failure ends the session.
    let (url, _served) = serve(&chunks, Ending::HoldOpen).await;
    let (recorder, mut events, closes) = Recorder::new();
    let session = client_for(&url)
        .with_session_options(SessionOptions {
            on_handler_error: HandlerErrorPolicy::Close,
            ..SessionOptions::default()
        })
        .stream_pricing(&["EUR_USD"], false, recorder)
        .await
        .unwrap();
    timeout(Duration::from_secs(5), session.wait())
        .await
        .expect("failure closes the session");

    assert!(drain(&mut events).is_empty());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
