//! Feeding live klines into a pipeline

use meridian_live::Subscription;
use tracing::{debug, info, trace};

use crate::pipeline::Pipeline;

/// Apply every closed kline from `subscription` until it ends, then hand
/// the pipeline back
pub async fn drive(mut pipeline: Pipeline, mut subscription: Subscription) -> Pipeline {
    info!(
        symbol = %pipeline.symbol(),
        stream = %subscription.stream(),
        "Streaming live klines"
    );

    while let Some(update) = subscription.recv().await {
        if !update.closed {
            trace!(stream = %update.stream, "Forming kline skipped");
            continue;
        }
        let outputs = pipeline.on_closed_bar(update.bar);
        debug!(
            symbol = %pipeline.symbol(),
            time = %update.bar.time(),
            close = %update.bar.close(),
            indicators = outputs.len(),
            "Closed bar applied"
        );
    }

    info!(symbol = %pipeline.symbol(), "Live stream ended");
    pipeline
}
