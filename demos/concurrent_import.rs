mod simulated;

use std::{sync::Arc, time::Duration};

use rec_helper::{
    protocol::{ImportRequest, Stage, WriteRequest, TOPIC_BEHAVIOR, TOPIC_ITEM},
    ConcurrentHelper, HelperOptions, RequestOptions, Submission, Vertical,
};
use serde_json::json;
use simulated::SimulatedClient;

const IMPORT_TIMEOUT: Duration = Duration::from_millis(800);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let options = HelperOptions::from_env().map_err(anyhow::Error::msg)?;
    let client = Arc::new(SimulatedClient::new(Vertical::General));
    let helper = ConcurrentHelper::new(client, options);

    for batch in 0..3 {
        let data = (0..10)
            .filter_map(|i| {
                json!({ "item_id": format!("item-{batch}-{i}"), "price": 100 + i })
                    .as_object()
                    .cloned()
            })
            .collect();
        let opts = RequestOptions::daily(Stage::PreSync, "2021-10-01", IMPORT_TIMEOUT);
        if let Err(err) = helper
            .submit(
                Submission::Import(ImportRequest {
                    topic: TOPIC_ITEM.to_owned(),
                    data,
                }),
                opts,
            )
            .await
        {
            tracing::error!(batch, error = %err, "submit import failed");
        }
    }

    for batch in 0..5 {
        let data = (0..5)
            .filter_map(|i| {
                json!({ "user_id": format!("user-{i}"), "event_type": "click", "batch": batch })
                    .as_object()
                    .cloned()
            })
            .collect();
        if let Err(err) = helper
            .submit(
                Submission::Write(WriteRequest {
                    topic: TOPIC_BEHAVIOR.to_owned(),
                    data,
                }),
                RequestOptions::streaming(IMPORT_TIMEOUT),
            )
            .await
        {
            tracing::error!(batch, error = %err, "submit write failed");
        }
    }

    helper.shutdown().await;
    Ok(())
}
