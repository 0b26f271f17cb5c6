//! End-to-End Relay Tests
//!
//! Fake Kite ticker → `KiteTicker` → `TickPipeline` → `SubscriberRegistry`
//! → `/ws` subscribers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use kite_tick_relay::{
    AppState, Credentials, FeedState, InstrumentRecord, KiteTicker, RelayContext, RelayServer,
    SubscriberRegistry, TickPipeline, TickerConfig, select_top_n,
};

const WAIT: Duration = Duration::from_secs(5);

fn ltp_frame(ticks: &[(u32, u32)]) -> Vec<u8> {
    let mut out = u16::try_from(ticks.len()).unwrap().to_be_bytes().to_vec();
    for (token, paise) in ticks {
        out.extend_from_slice(&8u16.to_be_bytes());
        out.extend_from_slice(&token.to_be_bytes());
        out.extend_from_slice(&paise.to_be_bytes());
    }
    out
}

struct Relay {
    ws_url: String,
    registry: Arc<SubscriberRegistry>,
    ticker: Arc<KiteTicker>,
    cancel: CancellationToken,
}

/// Start the relay against `upstream`, subscribed to the first `limit`
/// of ZETA (101) and ALPHA (102).
async fn start_relay(upstream: std::net::SocketAddr, limit: usize) -> Relay {
    let context = Arc::new(RelayContext::new(select_top_n(
        vec![
            InstrumentRecord::new(101, "ZETA", "NSE", "EQ"),
            InstrumentRecord::new(102, "ALPHA", "NSE", "EQ"),
        ],
        limit,
    )));
    let cancel = CancellationToken::new();
    let feed_state = Arc::new(FeedState::new());
    let registry = Arc::new(SubscriberRegistry::new(16));

    let (tx, rx) = mpsc::channel(64);
    let pipeline = TickPipeline::new(
        Arc::clone(&context),
        Arc::clone(&registry) as _,
        Arc::clone(&feed_state),
    );
    tokio::spawn(pipeline.run(rx));

    let ticker = Arc::new(KiteTicker::new(
        TickerConfig::new(
            format!("ws://{upstream}"),
            Credentials::new("key", "token").unwrap(),
        ),
        context.subscription().clone(),
        tx,
        cancel.clone(),
    ));
    tokio::spawn(Arc::clone(&ticker).run());

    let state = AppState {
        version: "test".to_string(),
        started_at: Instant::now(),
        feed_state,
        registry: Arc::clone(&registry),
        ticker: Arc::clone(&ticker),
        subscription_size: context.subscription().len(),
        cancel: cancel.clone(),
    };
    let server = RelayServer::bind(0, state).await.unwrap();
    let port = server.local_addr().unwrap().port();
    tokio::spawn(server.serve());

    Relay {
        ws_url: format!("ws://127.0.0.1:{port}/ws"),
        registry,
        ticker,
        cancel,
    }
}

async fn wait_for_subscribers(registry: &SubscriberRegistry, count: usize) {
    timeout(WAIT, async {
        while registry.len() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn subscribers_receive_enriched_tick_events() {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay = start_relay(upstream.local_addr().unwrap(), 1).await;

    let (mut client_a, _) = tokio_tungstenite::connect_async(&relay.ws_url)
        .await
        .unwrap();
    let (mut client_b, _) = tokio_tungstenite::connect_async(&relay.ws_url)
        .await
        .unwrap();
    wait_for_subscribers(&relay.registry, 2).await;

    assert!(relay.ticker.request_connect());
    let (stream, _) = upstream.accept().await.unwrap();
    let mut kite = tokio_tungstenite::accept_async(stream).await.unwrap();

    let mut requests = Vec::new();
    while requests.len() < 2 {
        if let Message::Text(text) = kite.next().await.unwrap().unwrap() {
            requests.push(text.to_string());
        }
    }
    assert_eq!(requests[0], r#"{"a":"subscribe","v":[102]}"#);
    assert_eq!(requests[1], r#"{"a":"mode","v":["full",[102]]}"#);

    kite.send(Message::Binary(
        ltp_frame(&[(102, 25_050), (999, 100)]).into(),
    ))
    .await
    .unwrap();

    for client in [&mut client_a, &mut client_b] {
        let message = timeout(WAIT, client.next()).await.unwrap().unwrap().unwrap();
        let text = message.into_text().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["event"], "tick");
        let data = value["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["token"], 102);
        assert_eq!(data[0]["symbol"], "ALPHA");
        assert_eq!(data[0]["lastPrice"], 250.5);
        assert_eq!(data[1]["token"], 999);
        assert_eq!(data[1]["symbol"], "UNKNOWN");
    }

    relay.cancel.cancel();
}

#[tokio::test]
async fn disconnected_subscriber_is_unregistered() {
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay = start_relay(upstream.local_addr().unwrap(), 200).await;

    let (client, _) = tokio_tungstenite::connect_async(&relay.ws_url)
        .await
        .unwrap();
    wait_for_subscribers(&relay.registry, 1).await;

    drop(client);
    wait_for_subscribers(&relay.registry, 0).await;

    relay.cancel.cancel();
}
