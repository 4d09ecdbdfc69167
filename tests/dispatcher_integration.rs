mod support;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rec_helper::{
    protocol::{
        CallbackRequest, DoneRequest, ImportRequest, WriteRequest, WriteResponse,
        STATUS_CODE_INVALID_REQUEST, STATUS_CODE_SUCCESS, TOPIC_USER,
    },
    ConcurrentHelper, HelperOptions, Observer, RecError, RequestKind, RequestOptions, Submission,
    TaskOutcome, TaskReport, Vertical,
};
use serde_json::json;
use support::{operation, status, MockClient, Step};

#[derive(Clone, Debug, PartialEq)]
enum Seen {
    Success(RequestKind),
    Failure(RequestKind, i32),
    Error(RequestKind),
}

fn recorder() -> (Observer, Arc<Mutex<Vec<Seen>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let observer: Observer = Arc::new(move |report: &TaskReport| {
        let entry = match &report.outcome {
            TaskOutcome::Success => Seen::Success(report.kind),
            TaskOutcome::Failure(status) => Seen::Failure(report.kind, status.code),
            TaskOutcome::Error(_) => Seen::Error(report.kind),
        };
        sink.lock()
            .expect("observer mutex must not be poisoned")
            .push(entry);
    });
    (observer, seen)
}

fn options(worker_count: usize) -> HelperOptions {
    HelperOptions {
        worker_count,
        ..HelperOptions::default()
    }
}

fn write(rows: usize) -> Submission {
    let data = (0..rows)
        .map(|i| {
            json!({ "user_id": format!("user-{i}"), "gender": "female" })
                .as_object()
                .cloned()
                .unwrap_or_default()
        })
        .collect();
    Submission::Write(WriteRequest {
        topic: TOPIC_USER.to_owned(),
        data,
    })
}

#[tokio::test]
async fn pool_size_is_fixed() {
    let client = Arc::new(MockClient::default());
    let helper = ConcurrentHelper::new(client, options(3));
    assert_eq!(helper.worker_count(), 3);
    helper.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn in_flight_tasks_never_exceed_worker_count() {
    let client = Arc::new(MockClient::with_delay(Duration::from_millis(50)));
    let (observer, seen) = recorder();
    let helper = ConcurrentHelper::new(Arc::clone(&client), options(2)).with_observer(observer);

    for _ in 0..6 {
        helper
            .submit(write(2), RequestOptions::streaming(Duration::from_millis(800)))
            .await
            .expect("submit must be accepted");
    }
    helper.shutdown().await;

    assert_eq!(client.calls_to("write_data").len(), 6);
    assert!(client.max_in_flight() <= 2);
    let seen = seen.lock().expect("observer mutex must not be poisoned");
    assert_eq!(seen.len(), 6);
    assert!(seen
        .iter()
        .all(|entry| *entry == Seen::Success(RequestKind::Write)));
}

#[tokio::test(start_paused = true)]
async fn submit_blocks_while_all_workers_are_busy() {
    let client = Arc::new(MockClient::with_delay(Duration::from_secs(1)));
    let helper = ConcurrentHelper::new(Arc::clone(&client), options(1));

    helper
        .submit(write(1), RequestOptions::default())
        .await
        .expect("idle worker takes the first task");

    let blocked = tokio::time::timeout(
        Duration::from_millis(100),
        helper.submit(write(1), RequestOptions::default()),
    )
    .await;
    assert!(blocked.is_err(), "second submit must wait for the busy worker");

    helper
        .submit(write(1), RequestOptions::default())
        .await
        .expect("worker frees up after the first task");
    helper.shutdown().await;

    assert_eq!(client.calls_to("write_data").len(), 2);
}

#[tokio::test]
async fn unsupported_kind_is_rejected_without_queueing() {
    let client = Arc::new(MockClient::for_vertical(Vertical::Retail));
    let helper = ConcurrentHelper::new(Arc::clone(&client), options(1));

    let err = helper
        .submit(
            Submission::Done(DoneRequest {
                topic: TOPIC_USER.to_owned(),
                data_dates: vec!["20211001".to_owned()],
            }),
            RequestOptions::default(),
        )
        .await
        .expect_err("retail has no done endpoint");

    assert!(matches!(
        err,
        RecError::UnsupportedRequest(RequestKind::Done)
    ));
    helper.shutdown().await;
    assert!(client.calls().is_empty());
}

#[tokio::test]
async fn import_without_data_date_is_rejected() {
    let client = Arc::new(MockClient::default());
    let helper = ConcurrentHelper::new(Arc::clone(&client), options(1));

    let err = helper
        .submit(
            Submission::Import(ImportRequest::default()),
            RequestOptions::default(),
        )
        .await
        .expect_err("imports need a data date");

    assert!(matches!(err, RecError::MissingOption("data_date")));
    helper.shutdown().await;
    assert!(client.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn import_task_polls_operation_in_background() {
    let client = Arc::new(MockClient::default());
    client
        .imports
        .push(Step::Respond(operation("op-7", STATUS_CODE_SUCCESS, false, None)));
    client
        .operations
        .push(Step::Respond(operation("op-7", STATUS_CODE_SUCCESS, false, None)));
    client.operations.push(Step::Respond(operation(
        "op-7",
        STATUS_CODE_SUCCESS,
        true,
        Some(json!({ "status": { "code": 0 } })),
    )));
    let (observer, seen) = recorder();
    let helper = ConcurrentHelper::new(Arc::clone(&client), options(2)).with_observer(observer);

    helper
        .submit(
            Submission::Import(ImportRequest::default()),
            RequestOptions::default().with_data_date("2021-10-01"),
        )
        .await
        .expect("import must be queued");
    helper.shutdown().await;

    assert_eq!(client.calls_to("get_operation").len(), 2);
    assert_eq!(
        *seen.lock().expect("observer mutex must not be poisoned"),
        vec![Seen::Success(RequestKind::Import)]
    );
}

#[tokio::test]
async fn failures_are_reported_and_workers_keep_running() {
    let client = Arc::new(MockClient::default());
    client.writes.push(Step::Transport("connection refused"));
    client.writes.push(Step::Respond(WriteResponse {
        status: status(STATUS_CODE_INVALID_REQUEST),
        errors: Vec::new(),
    }));
    let (observer, seen) = recorder();
    let helper = ConcurrentHelper::new(Arc::clone(&client), options(1)).with_observer(observer);

    helper
        .submit(write(1), RequestOptions::default())
        .await
        .expect("submit must be accepted");
    helper
        .submit(write(1), RequestOptions::default())
        .await
        .expect("submit must be accepted");
    helper
        .submit(
            Submission::Callback(CallbackRequest::default()),
            RequestOptions::default(),
        )
        .await
        .expect("submit must be accepted");
    helper.shutdown().await;

    assert_eq!(
        *seen.lock().expect("observer mutex must not be poisoned"),
        vec![
            Seen::Error(RequestKind::Write),
            Seen::Failure(RequestKind::Write, STATUS_CODE_INVALID_REQUEST),
            Seen::Success(RequestKind::Callback),
        ]
    );
}

#[tokio::test]
async fn submitted_tasks_carry_a_request_id() {
    let client = Arc::new(MockClient::default());
    let reports: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let helper = ConcurrentHelper::new(Arc::clone(&client), options(1)).with_observer(Arc::new(
        move |report: &TaskReport| {
            sink.lock()
                .expect("observer mutex must not be poisoned")
                .push(report.request_id.clone());
        },
    ));

    helper
        .submit(write(1), RequestOptions::default().with_request_id("req-42"))
        .await
        .expect("submit must be accepted");
    helper.shutdown().await;

    assert_eq!(
        *reports.lock().expect("observer mutex must not be poisoned"),
        vec![Some("req-42".to_owned())]
    );
    assert_eq!(
        client.calls_to("write_data")[0].request_id.as_deref(),
        Some("req-42")
    );
}
