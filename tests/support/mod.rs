#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use rec_helper::{
    protocol::{
        AckImpressionsRequest, AckImpressionsResponse, CallbackRequest, CallbackResponse,
        DoneRequest, DoneResponse, GetOperationRequest, ImportRequest, ListOperationsRequest,
        ListOperationsResponse, Operation, OperationResponse, PredictRequest, PredictResponse,
        Status, WriteRequest, WriteResponse,
    },
    Client, RecError, RequestKind, RequestOptions, Result, Vertical,
};
use serde_json::Value as JsonValue;

pub enum Step<T> {
    Respond(T),
    Timeout,
    Transport(&'static str),
}

/// Scripted replies, consumed front to back. An empty script answers with
/// `T::default()`.
pub struct Script<T>(Mutex<VecDeque<Step<T>>>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }
}

impl<T: Default> Script<T> {
    pub fn push(&self, step: Step<T>) {
        self.0
            .lock()
            .expect("script mutex must not be poisoned")
            .push_back(step);
    }

    fn next(&self) -> Result<T> {
        let step = self
            .0
            .lock()
            .expect("script mutex must not be poisoned")
            .pop_front();
        match step {
            Some(Step::Respond(value)) => Ok(value),
            Some(Step::Timeout) => Err(RecError::Timeout("mock deadline exceeded".to_owned())),
            Some(Step::Transport(message)) => Err(RecError::Transport(message.to_owned())),
            None => Ok(T::default()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub request_id: Option<String>,
    pub timeout: Option<Duration>,
    pub page_token: Option<String>,
}

#[derive(Default)]
pub struct MockClient {
    pub writes: Script<WriteResponse>,
    pub imports: Script<OperationResponse>,
    pub dones: Script<DoneResponse>,
    pub callbacks: Script<CallbackResponse>,
    pub acks: Script<AckImpressionsResponse>,
    pub operations: Script<OperationResponse>,
    pub listings: Script<ListOperationsResponse>,
    pub calls: Mutex<Vec<RecordedCall>>,
    pub delay: Duration,
    pub vertical: Option<Vertical>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockClient {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn for_vertical(vertical: Vertical) -> Self {
        Self {
            vertical: Some(vertical),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .expect("calls mutex must not be poisoned")
            .clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn serve<T: Default>(
        &self,
        method: &'static str,
        opts: &RequestOptions,
        page_token: Option<String>,
        script: &Script<T>,
    ) -> Result<T> {
        self.calls
            .lock()
            .expect("calls mutex must not be poisoned")
            .push(RecordedCall {
                method,
                request_id: opts.request_id.clone(),
                timeout: opts.timeout,
                page_token,
            });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        script.next()
    }
}

impl Client for MockClient {
    async fn write_data(&self, _request: WriteRequest, opts: RequestOptions) -> Result<WriteResponse> {
        self.serve("write_data", &opts, None, &self.writes).await
    }

    async fn import_data(
        &self,
        _request: ImportRequest,
        opts: RequestOptions,
    ) -> Result<OperationResponse> {
        self.serve("import_data", &opts, None, &self.imports).await
    }

    async fn done(&self, _request: DoneRequest, opts: RequestOptions) -> Result<DoneResponse> {
        self.serve("done", &opts, None, &self.dones).await
    }

    async fn predict(
        &self,
        _request: PredictRequest,
        _opts: RequestOptions,
    ) -> Result<PredictResponse> {
        Ok(PredictResponse::default())
    }

    async fn callback(
        &self,
        _request: CallbackRequest,
        opts: RequestOptions,
    ) -> Result<CallbackResponse> {
        self.serve("callback", &opts, None, &self.callbacks).await
    }

    async fn ack_impressions(
        &self,
        _request: AckImpressionsRequest,
        opts: RequestOptions,
    ) -> Result<AckImpressionsResponse> {
        self.serve("ack_impressions", &opts, None, &self.acks).await
    }

    async fn get_operation(
        &self,
        _request: GetOperationRequest,
        opts: RequestOptions,
    ) -> Result<OperationResponse> {
        self.serve("get_operation", &opts, None, &self.operations).await
    }

    async fn list_operations(
        &self,
        request: ListOperationsRequest,
        opts: RequestOptions,
    ) -> Result<ListOperationsResponse> {
        self.serve("list_operations", &opts, Some(request.page_token), &self.listings)
            .await
    }

    fn supports(&self, kind: RequestKind) -> bool {
        self.vertical.map_or(true, |vertical| vertical.supports(kind))
    }
}

pub fn status(code: i32) -> Status {
    Status::new(code, format!("code {code}"))
}

pub fn operation(name: &str, code: i32, done: bool, response: Option<JsonValue>) -> OperationResponse {
    OperationResponse {
        status: status(code),
        operation: Operation {
            name: name.to_owned(),
            done,
            response,
        },
    }
}
