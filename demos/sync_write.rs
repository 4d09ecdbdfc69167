mod simulated;

use std::{sync::Arc, time::Duration};

use rec_helper::{
    protocol::{
        CallbackRequest, DoneRequest, PredictRequest, Stage, WriteRequest, TOPIC_USER,
    },
    status::is_success,
    Client, HelperOptions, RequestHelper, RequestOptions, Vertical,
};
use serde_json::json;
use simulated::SimulatedClient;

const WRITE_TIMEOUT: Duration = Duration::from_millis(800);
const DONE_TIMEOUT: Duration = Duration::from_millis(800);
const PREDICT_TIMEOUT: Duration = Duration::from_millis(800);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let options = HelperOptions::from_env().map_err(anyhow::Error::msg)?;
    let client = Arc::new(SimulatedClient::new(Vertical::General));
    let helper = RequestHelper::new(client, options);

    write_streaming(&helper).await;
    write_done(&helper).await;
    recommend_and_callback(&helper).await;

    Ok(())
}

async fn write_streaming(helper: &RequestHelper<SimulatedClient>) {
    let data = (0..3)
        .filter_map(|i| {
            json!({ "user_id": format!("user-{i}"), "register_time": 1_634_000_000 + i })
                .as_object()
                .cloned()
        })
        .collect();
    let request = WriteRequest {
        topic: TOPIC_USER.to_owned(),
        data,
    };
    let client = helper.client();

    for round in 0..3 {
        let result = helper
            .do_with_retry(
                |req, opts| client.write_data(req, opts),
                request.clone(),
                RequestOptions::streaming(WRITE_TIMEOUT),
                helper.options().retry_times,
            )
            .await;
        match result {
            Ok(response) if is_success(&response.status) => {
                tracing::info!(round, "write success");
            }
            Ok(response) => tracing::error!(round, ?response, "write find failure info"),
            Err(err) => tracing::error!(round, error = %err, "write occur error"),
        }
    }
}

async fn write_done(helper: &RequestHelper<SimulatedClient>) {
    let request = DoneRequest {
        topic: TOPIC_USER.to_owned(),
        data_dates: vec!["20211001".to_owned()],
    };
    let opts = RequestOptions::default()
        .with_stage(Stage::PreSync)
        .with_timeout(DONE_TIMEOUT);
    let client = helper.client();

    match helper
        .do_with_retry(
            |req, opts| client.done(req, opts),
            request,
            opts,
            helper.options().retry_times,
        )
        .await
    {
        Ok(response) if is_success(&response.status) => tracing::info!("done success"),
        Ok(response) => tracing::error!(?response, "done find failure info"),
        Err(err) => tracing::error!(error = %err, "done occur error"),
    }
}

async fn recommend_and_callback(helper: &RequestHelper<SimulatedClient>) {
    let scene = "home";
    let request = PredictRequest {
        uid: "uid-1".to_owned(),
        size: 20,
        ..PredictRequest::default()
    };
    let opts = RequestOptions::default()
        .with_timeout(PREDICT_TIMEOUT)
        .with_scene(scene);

    let prediction = match helper.client().predict(request.clone(), opts).await {
        Ok(response) if is_success(&response.status) => response,
        Ok(response) => {
            tracing::error!(?response, "predict find failure info");
            return;
        }
        Err(err) => {
            tracing::error!(error = %err, "predict occur error");
            return;
        }
    };
    tracing::info!(items = prediction.items.len(), "predict success");

    let callback = CallbackRequest::from_prediction(&request.uid, scene, &prediction);
    let client = helper.client();
    match helper
        .do_with_retry(
            |req, opts| client.callback(req, opts),
            callback,
            RequestOptions::default().with_timeout(PREDICT_TIMEOUT),
            helper.options().retry_times,
        )
        .await
    {
        Ok(response) if is_success(&response.status) => tracing::info!("callback success"),
        Ok(response) => tracing::error!(?response, "callback find failure info"),
        Err(err) => tracing::error!(error = %err, "callback occur error"),
    }
}
