//! Integration test: live klines into a pipeline
//!
//! Runs the connection manager against an in-memory feed and checks that
//! only closed klines reach the pipeline.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meridian_core::Interval;
use meridian_indicators::{BuiltinProvider, IndicatorRuntime};
use meridian_live::{Connector, LiveConfig, LiveManager, LiveResult, Transport};
use meridian_runner::config::GeneratorConfig;
use meridian_runner::{Pipeline, live_feed};
use meridian_series::{FootprintMode, KagiReversal};
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use url::Url;

/// Hands out one transport fed by the test
struct ScriptedConnector {
    feed: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<String>>>,
}

struct ScriptedTransport {
    feed: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &Url) -> LiveResult<Box<dyn Transport>> {
        match self.feed.lock().take() {
            Some(feed) => Ok(Box::new(ScriptedTransport { feed })),
            None => Err(meridian_live::LiveError::Connection("feed used".to_string())),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn next_message(&mut self) -> Option<LiveResult<String>> {
        self.feed.recv().await.map(Ok)
    }

    async fn close(&mut self) -> LiveResult<()> {
        Ok(())
    }
}

fn kline(minute: i64, close: &str, closed: bool) -> String {
    let open_time = 1_704_067_200_000 + minute * 60_000;
    format!(
        r#"{{"stream":"btcusdt@kline_1m","data":{{"e":"kline","k":{{"t":{open_time},"s":"BTCUSDT","o":"{close}","h":"{close}","l":"{close}","c":"{close}","v":"2","x":{closed}}}}}}}"#
    )
}

#[tokio::test(start_paused = true)]
async fn test_closed_klines_extend_the_pipeline() {
    let (tx, feed) = mpsc::unbounded_channel();
    let connector = Arc::new(ScriptedConnector {
        feed: parking_lot::Mutex::new(Some(feed)),
    });
    let manager = LiveManager::start(
        LiveConfig {
            endpoint: "ws://localhost:9000/stream".to_string(),
            ..Default::default()
        },
        connector,
    )
    .unwrap();

    let runtime = Arc::new(IndicatorRuntime::new(Arc::new(BuiltinProvider::with_builtins())));
    let pipeline = Pipeline::new(
        "BTCUSDT",
        Interval::parse("1m").unwrap(),
        vec![Interval::parse("5m").unwrap()],
        &GeneratorConfig {
            brick_size: dec!(1),
            kagi: KagiReversal::Points(dec!(1)),
            pnf_box_size: dec!(1),
            pnf_reversal: 1,
            range_size: dec!(1),
            footprint_mode: FootprintMode::Approximate,
            footprint_step: Some(dec!(0.5)),
        },
        runtime,
    )
    .unwrap();

    let subscription = manager.subscribe(pipeline.symbol(), pipeline.base()).unwrap();
    let feed_task = tokio::spawn(live_feed::drive(pipeline, subscription));
    tokio::time::sleep(Duration::from_millis(10)).await;

    tx.send(kline(0, "100", true)).unwrap();
    tx.send(kline(1, "101", false)).unwrap();
    tx.send(kline(1, "103", true)).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    manager.shutdown().await;
    let pipeline = feed_task.await.unwrap();

    let closes: Vec<_> = pipeline.history().iter().map(|b| b.close()).collect();
    assert_eq!(closes, vec![dec!(100), dec!(103)]);
    assert_eq!(pipeline.bricks().len(), 3);
    assert_eq!(
        pipeline.resampled(&Interval::parse("5m").unwrap()).unwrap().len(),
        1
    );
}
