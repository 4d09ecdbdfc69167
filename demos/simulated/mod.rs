//! In-process stand-in for the vendor SDK so the demos run without
//! credentials or network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rec_helper::{
    protocol::{
        AckImpressionsRequest, AckImpressionsResponse, CallbackRequest, CallbackResponse,
        DoneRequest, DoneResponse, GetOperationRequest, ImportRequest, ListOperationsRequest,
        ListOperationsResponse, Operation, OperationResponse, PredictItem, PredictRequest,
        PredictResponse, Status, WriteRequest, WriteResponse, STATUS_CODE_TOO_MANY_REQUEST,
    },
    Client, RecError, RequestKind, RequestOptions, Result, Vertical,
};
use serde_json::json;

/// Polls answered "not done" before an operation completes.
const POLLS_UNTIL_DONE: usize = 3;

pub struct SimulatedClient {
    vertical: Vertical,
    writes: AtomicUsize,
    imports: AtomicUsize,
    polls: AtomicUsize,
}

impl SimulatedClient {
    pub fn new(vertical: Vertical) -> Self {
        Self {
            vertical,
            writes: AtomicUsize::new(0),
            imports: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        }
    }
}

impl Client for SimulatedClient {
    async fn write_data(&self, request: WriteRequest, opts: RequestOptions) -> Result<WriteResponse> {
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Every third write hits a timeout so the retry path shows up in logs.
        if self.writes.fetch_add(1, Ordering::SeqCst) % 3 == 2 {
            return Err(RecError::Timeout(format!(
                "write of {} rows to {} timed out after {:?}",
                request.data.len(),
                request.topic,
                opts.timeout
            )));
        }
        Ok(WriteResponse {
            status: Status::success(),
            errors: Vec::new(),
        })
    }

    async fn import_data(
        &self,
        _request: ImportRequest,
        _opts: RequestOptions,
    ) -> Result<OperationResponse> {
        let index = self.imports.fetch_add(1, Ordering::SeqCst);
        // The first import is throttled once.
        let status = if index == 0 {
            Status::new(STATUS_CODE_TOO_MANY_REQUEST, "too many requests")
        } else {
            Status::success()
        };
        Ok(OperationResponse {
            status,
            operation: Operation {
                name: format!("operations/import-{index}"),
                done: false,
                response: None,
            },
        })
    }

    async fn done(&self, _request: DoneRequest, _opts: RequestOptions) -> Result<DoneResponse> {
        Ok(DoneResponse {
            status: Status::success(),
        })
    }

    async fn predict(
        &self,
        request: PredictRequest,
        _opts: RequestOptions,
    ) -> Result<PredictResponse> {
        let items = (0..request.size.min(3))
            .map(|rank| PredictItem {
                id: format!("item-{rank}"),
                rank,
                extra: None,
            })
            .collect();
        Ok(PredictResponse {
            status: Status::new(200, "ok"),
            request_id: format!("predict-{}", request.uid),
            items,
        })
    }

    async fn callback(
        &self,
        _request: CallbackRequest,
        _opts: RequestOptions,
    ) -> Result<CallbackResponse> {
        Ok(CallbackResponse {
            status: Status::success(),
        })
    }

    async fn ack_impressions(
        &self,
        _request: AckImpressionsRequest,
        _opts: RequestOptions,
    ) -> Result<AckImpressionsResponse> {
        Ok(AckImpressionsResponse {
            status: Status::success(),
        })
    }

    async fn get_operation(
        &self,
        request: GetOperationRequest,
        _opts: RequestOptions,
    ) -> Result<OperationResponse> {
        let done = self.polls.fetch_add(1, Ordering::SeqCst) % (POLLS_UNTIL_DONE + 1)
            == POLLS_UNTIL_DONE;
        Ok(OperationResponse {
            status: Status::success(),
            operation: Operation {
                name: request.name,
                done,
                response: done.then(|| json!({ "status": { "code": 0, "message": "imported" } })),
            },
        })
    }

    async fn list_operations(
        &self,
        _request: ListOperationsRequest,
        _opts: RequestOptions,
    ) -> Result<ListOperationsResponse> {
        Ok(ListOperationsResponse {
            status: Status::success(),
            operations: Vec::new(),
            next_page_token: String::new(),
        })
    }

    fn supports(&self, kind: RequestKind) -> bool {
        self.vertical.supports(kind)
    }
}
