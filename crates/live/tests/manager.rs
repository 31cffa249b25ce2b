//! Integration test: live connection manager
//!
//! Drives the manager against an in-memory connector under a paused clock:
//! connection sharing, reconnect policy, routing and shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use meridian_core::Interval;
use meridian_live::{
    ConnectionState, Connector, LiveConfig, LiveError, LiveManager, LiveResult, Transport,
};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use url::Url;

enum Feed {
    Text(String),
    RemoteClose,
}

/// Records connect attempts; each connection reads from its own feed
#[derive(Default)]
struct MockConnector {
    urls: Mutex<Vec<String>>,
    attempts: Mutex<Vec<Instant>>,
    feeds: Mutex<Vec<mpsc::UnboundedSender<Feed>>>,
    fail_next: AtomicUsize,
    /// Time each connect attempt takes
    connect_delay: Mutex<Option<Duration>>,
}

impl MockConnector {
    fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }

    fn feed(&self, connection: usize) -> mpsc::UnboundedSender<Feed> {
        self.feeds.lock()[connection].clone()
    }

    fn push(&self, connection: usize, text: impl Into<String>) {
        let _ = self.feed(connection).send(Feed::Text(text.into()));
    }
}

struct MockTransport {
    feed: mpsc::UnboundedReceiver<Feed>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> LiveResult<Box<dyn Transport>> {
        self.attempts.lock().push(Instant::now());
        let delay = *self.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LiveError::Connection("refused".to_string()));
        }

        self.urls.lock().push(url.to_string());
        let (tx, feed) = mpsc::unbounded_channel();
        self.feeds.lock().push(tx);
        Ok(Box::new(MockTransport { feed }))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn next_message(&mut self) -> Option<LiveResult<String>> {
        match self.feed.recv().await {
            Some(Feed::Text(text)) => Some(Ok(text)),
            Some(Feed::RemoteClose) | None => None,
        }
    }

    async fn close(&mut self) -> LiveResult<()> {
        Ok(())
    }
}

fn config() -> LiveConfig {
    LiveConfig {
        endpoint: "ws://localhost:9000/stream".to_string(),
        initial_backoff_ms: 1_000,
        max_backoff_ms: 8_000,
        channel_capacity: 16,
    }
}

fn start(config: LiveConfig) -> (Arc<MockConnector>, LiveManager) {
    let connector = Arc::new(MockConnector::default());
    let manager = LiveManager::start(config, connector.clone()).unwrap();
    (connector, manager)
}

fn minute() -> Interval {
    Interval::parse("1m").unwrap()
}

fn kline(stream: &str, open_time: i64, close: &str) -> String {
    format!(
        r#"{{"stream":"{stream}","data":{{"e":"kline","k":{{"t":{open_time},"o":"{close}","h":"{close}","l":"{close}","c":"{close}","v":"1","x":true}}}}}}"#
    )
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_no_connection_without_subscribers() {
    let (connector, manager) = start(config());
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(connector.attempts.lock().is_empty());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_share_one_connection() {
    let (connector, manager) = start(config());
    let states = manager.watch_state();
    let mut a = manager.subscribe("BTCUSDT", &minute()).unwrap();
    let mut b = manager.subscribe("btcusdt", &minute()).unwrap();
    settle().await;

    assert_eq!(manager.connection_count(), 1);
    assert_eq!(*states.borrow(), ConnectionState::Connected);
    assert_eq!(
        connector.urls(),
        vec!["ws://localhost:9000/stream?streams=btcusdt@kline_1m".to_string()]
    );
    assert_eq!(manager.subscriber_count(), 2);

    connector.push(0, kline("btcusdt@kline_1m", 0, "100"));
    settle().await;
    assert_eq!(a.try_recv().unwrap().bar.close(), dec!(100));
    assert_eq!(b.try_recv().unwrap().bar.close(), dec!(100));
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_keeps_remaining_subscriber() {
    let (connector, manager) = start(config());
    let mut a = manager.subscribe("BTCUSDT", &minute()).unwrap();
    let mut b = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;

    assert!(manager.unsubscribe(a.id()));
    assert!(!manager.unsubscribe(a.id()));
    settle().await;

    connector.push(0, kline("btcusdt@kline_1m", 0, "101"));
    settle().await;
    assert_eq!(b.try_recv().unwrap().bar.close(), dec!(101));
    assert_eq!(a.try_recv(), Err(TryRecvError::Disconnected));
    assert_eq!(manager.connection_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_last_unsubscribe_disconnects_without_reconnect() {
    let (connector, manager) = start(config());
    let sub = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;

    manager.unsubscribe(sub.id());
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(manager.active_streams().is_empty());

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(connector.attempts.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_stream_reconnects_immediately() {
    let (connector, manager) = start(config());
    let mut btc = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;

    let before = Instant::now();
    let mut eth = manager
        .subscribe("ETHUSDT", &Interval::parse("60m").unwrap())
        .unwrap();
    settle().await;

    assert!(before.elapsed() < Duration::from_millis(1_000));
    assert_eq!(manager.connection_count(), 2);
    assert_eq!(
        connector.urls()[1],
        "ws://localhost:9000/stream?streams=btcusdt@kline_1m/ethusdt@kline_1h"
    );

    connector.push(1, kline("ethusdt@kline_1h", 0, "2500"));
    connector.push(1, kline("btcusdt@kline_1m", 0, "42000"));
    settle().await;
    assert_eq!(eth.try_recv().unwrap().symbol, "ETHUSDT");
    assert_eq!(btc.try_recv().unwrap().bar.close(), dec!(42000));
}

#[tokio::test(start_paused = true)]
async fn test_remote_close_backs_off() {
    let (connector, manager) = start(config());
    let _sub = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;

    let _ = connector.feed(0).send(Feed::RemoteClose);
    settle().await;
    assert_eq!(manager.connection_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(manager.connection_count(), 2);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_connects_double_the_delay() {
    let (connector, manager) = start(config());
    connector.fail_next.store(3, Ordering::SeqCst);
    let _sub = manager.subscribe("BTCUSDT", &minute()).unwrap();

    tokio::time::sleep(Duration::from_secs(8)).await;
    assert_eq!(manager.connection_count(), 1);

    let attempts = connector.attempts.lock().clone();
    assert_eq!(attempts.len(), 4);
    for (pair, expected) in attempts.windows(2).zip([1_000u64, 2_000, 4_000]) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_millis(expected), "gap {gap:?}");
        assert!(gap < Duration::from_millis(expected + 10), "gap {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_bad_messages_are_dropped() {
    let (connector, manager) = start(config());
    let mut sub = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;

    connector.push(0, "garbage");
    connector.push(0, r#"{"stream":"btcusdt@trade","data":{"e":"trade","p":"1"}}"#);
    connector.push(0, kline("ethusdt@kline_1m", 0, "1"));
    connector.push(0, kline("btcusdt@kline_1m", 60_000, "102"));
    settle().await;

    let update = sub.try_recv().unwrap();
    assert_eq!(update.bar.time().timestamp_millis(), 60_000);
    assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));
    assert_eq!(manager.connection_count(), 1);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_drops_updates_in_order() {
    let (connector, manager) = start(LiveConfig {
        channel_capacity: 2,
        ..config()
    });
    let mut sub = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;

    for (i, close) in ["1", "2", "3"].iter().enumerate() {
        connector.push(0, kline("btcusdt@kline_1m", i as i64 * 60_000, close));
    }
    settle().await;
    assert_eq!(sub.try_recv().unwrap().bar.close(), dec!(1));
    assert_eq!(sub.try_recv().unwrap().bar.close(), dec!(2));
    assert_eq!(sub.try_recv(), Err(TryRecvError::Empty));

    connector.push(0, kline("btcusdt@kline_1m", 180_000, "4"));
    settle().await;
    assert_eq!(sub.try_recv().unwrap().bar.close(), dec!(4));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_receiver_is_pruned() {
    let (connector, manager) = start(config());
    let btc = manager.subscribe("BTCUSDT", &minute()).unwrap();
    let _eth = manager.subscribe("ETHUSDT", &minute()).unwrap();
    settle().await;
    drop(btc);

    connector.push(0, kline("btcusdt@kline_1m", 0, "1"));
    settle().await;

    assert_eq!(manager.active_streams(), vec!["ethusdt@kline_1m".to_string()]);
    assert_eq!(manager.connection_count(), 2);
    assert_eq!(
        connector.urls()[1],
        "ws://localhost:9000/stream?streams=ethusdt@kline_1m"
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_ends_subscriptions() {
    let (_connector, manager) = start(config());
    let mut sub = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;

    manager.shutdown().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(sub.recv().await.is_none());
    assert!(matches!(
        manager.subscribe("BTCUSDT", &minute()),
        Err(LiveError::Shutdown)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_pending_connect() {
    let (connector, manager) = start(config());
    *connector.connect_delay.lock() = Some(Duration::from_secs(3_600));
    let mut sub = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;
    assert_eq!(manager.state(), ConnectionState::Connecting);

    let stopped = tokio::time::timeout(Duration::from_secs(5), manager.shutdown()).await;
    assert!(stopped.is_ok());
    assert_eq!(manager.connection_count(), 0);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(sub.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_subscription_during_connect_reconnects_with_new_list() {
    let (connector, manager) = start(config());
    *connector.connect_delay.lock() = Some(Duration::from_secs(1));
    let _btc = manager.subscribe("BTCUSDT", &minute()).unwrap();
    settle().await;
    let _eth = manager.subscribe("ETHUSDT", &minute()).unwrap();

    tokio::time::sleep(Duration::from_millis(2_500)).await;

    assert_eq!(
        connector.urls(),
        vec![
            "ws://localhost:9000/stream?streams=btcusdt@kline_1m".to_string(),
            "ws://localhost:9000/stream?streams=btcusdt@kline_1m/ethusdt@kline_1m".to_string(),
        ]
    );
    assert_eq!(manager.connection_count(), 2);
    assert_eq!(manager.state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_start_rejects_invalid_config() {
    let result = LiveManager::start(
        LiveConfig {
            initial_backoff_ms: 0,
            ..config()
        },
        Arc::new(MockConnector::default()),
    );
    assert!(matches!(result, Err(LiveError::Config(_))));
}
