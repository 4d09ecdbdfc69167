use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, warn};

use crate::{
    options::ensure_request_id,
    protocol::{
        GetOperationRequest, HasStatus, ListOperationsRequest, ListOperationsResponse,
        OperationResponse,
    },
    status::{is_operation_lost, is_server_overload, is_upload_success},
    Client, HelperOptions, RecError, RequestOptions, Result,
};

/// Retry, overload backoff and import polling around a shared [`Client`].
pub struct RequestHelper<C> {
    client: Arc<C>,
    options: HelperOptions,
}

impl<C> Clone for RequestHelper<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            options: self.options.clone(),
        }
    }
}

impl<C> fmt::Debug for RequestHelper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHelper")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<C: Client> RequestHelper<C> {
    pub fn new(client: Arc<C>, options: HelperOptions) -> Self {
        Self { client, options }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn options(&self) -> &HelperOptions {
        &self.options
    }

    /// Invokes `call`, retrying transport timeouts up to `retry_times` times.
    ///
    /// Every attempt carries the same request id so the server can drop
    /// duplicates of a request it already stored. A response is returned as
    /// soon as one attempt gets through, whatever its status says.
    pub async fn do_with_retry<Req, Resp, F, Fut>(
        &self,
        call: F,
        request: Req,
        opts: RequestOptions,
        retry_times: usize,
    ) -> Result<Resp>
    where
        Req: Clone,
        F: Fn(Req, RequestOptions) -> Fut,
        Fut: Future<Output = Result<Resp>>,
    {
        let opts = ensure_request_id(opts);
        let attempts = retry_times.saturating_add(1);

        for attempt in 0..attempts {
            match call(request.clone(), opts.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_timeout() => {
                    debug!(
                        request_id = ?opts.request_id,
                        attempt,
                        error = %err,
                        "request timed out"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        error!(
            request_id = ?opts.request_id,
            attempts,
            "request still failing after retries"
        );
        Err(RecError::RetryExhausted { attempts })
    }

    /// Like [`RequestHelper::do_with_retry`], but also backs off and retries
    /// while the server reports overload.
    ///
    /// Each outer attempt hands the inner retry a shrinking budget, so the
    /// overall number of calls stays bounded by `retry_times`.
    pub async fn do_with_retry_although_overload<Req, Resp, F, Fut>(
        &self,
        call: F,
        request: Req,
        opts: RequestOptions,
        retry_times: usize,
    ) -> Result<Resp>
    where
        Req: Clone,
        Resp: HasStatus,
        F: Fn(Req, RequestOptions) -> Fut,
        Fut: Future<Output = Result<Resp>>,
    {
        let opts = ensure_request_id(opts);
        let attempts = retry_times.saturating_add(1);

        for attempt in 0..attempts {
            let response = self
                .do_with_retry(&call, request.clone(), opts.clone(), retry_times - attempt)
                .await?;
            if !is_server_overload(response.status()) {
                return Ok(response);
            }
            if attempt + 1 == attempts {
                break;
            }

            let wait = self.overload_backoff(attempt);
            warn!(
                request_id = ?opts.request_id,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "server overloaded, backing off"
            );
            sleep(wait).await;
        }

        error!(request_id = ?opts.request_id, attempts, "server still overloaded");
        Err(RecError::ServerOverload { attempts })
    }

    /// Submits an import and waits for its operation to finish, returning the
    /// decoded result the operation carries.
    pub async fn do_import<Req, Resp, F, Fut>(
        &self,
        call: F,
        request: Req,
        opts: RequestOptions,
        retry_times: usize,
    ) -> Result<Resp>
    where
        Req: Clone,
        Resp: DeserializeOwned,
        F: Fn(Req, RequestOptions) -> Fut,
        Fut: Future<Output = Result<OperationResponse>>,
    {
        if opts.data_date.is_none() {
            return Err(RecError::MissingOption("data_date"));
        }

        let submitted = self
            .do_with_retry_although_overload(call, request, opts, retry_times)
            .await?;
        if !is_upload_success(&submitted.status) {
            error!(
                code = submitted.status.code,
                message = %submitted.status.message,
                "import returned failure"
            );
            return Err(RecError::ImportFailure {
                code: submitted.status.code,
                message: submitted.status.message,
            });
        }

        let payload = self.poll_operation(&submitted.operation.name).await?;
        serde_json::from_value(payload).map_err(|err| {
            RecError::Decode(format!(
                "invalid response of operation {}: {err}",
                submitted.operation.name
            ))
        })
    }

    /// Fetches one operation by name.
    pub async fn get_operation(&self, name: &str) -> Result<OperationResponse> {
        let request = GetOperationRequest {
            name: name.to_owned(),
        };
        let opts = RequestOptions::default().with_timeout(self.options.get_operation_timeout);
        self.client.get_operation(request, opts).await
    }

    /// Fetches one page of operations. Pass an empty `page_token` for the
    /// first page and the returned `next_page_token` afterwards.
    pub async fn list_operations(
        &self,
        filter: &str,
        page_size: u32,
        page_token: &str,
    ) -> Result<ListOperationsResponse> {
        let request = ListOperationsRequest {
            filter: filter.to_owned(),
            page_size,
            page_token: page_token.to_owned(),
        };
        let opts = RequestOptions::default().with_timeout(self.options.list_operations_timeout);
        self.client.list_operations(request, opts).await
    }

    /// Randomized wait before overload attempt `attempt + 1`.
    pub fn overload_backoff(&self, attempt: usize) -> Duration {
        overload_backoff(
            self.options.overload_retry_interval,
            self.options.overload_increase_speed,
            attempt,
            rand::random::<f64>(),
        )
    }

    async fn poll_operation(&self, name: &str) -> Result<Value> {
        let timeout = self.options.polling_timeout;
        let deadline = Instant::now() + timeout;

        while Instant::now() < deadline {
            // A fetch still in flight at the deadline is abandoned.
            let Ok(fetched) = timeout_at(deadline, self.fetch_polling_operation(name)).await
            else {
                break;
            };
            if let Some(response) = fetched? {
                if is_operation_lost(&response.status) {
                    error!(operation = name, "operation lost");
                    return Err(RecError::OperationLost {
                        name: name.to_owned(),
                    });
                }
                if response.operation.done {
                    return response.operation.response.ok_or_else(|| {
                        RecError::Decode(format!("operation {name} finished without response"))
                    });
                }
                debug!(operation = name, "operation not done yet");
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(self.options.polling_interval.min(remaining)).await;
        }

        error!(operation = name, ?timeout, "polling import result timeout");
        Err(RecError::PollingTimeout {
            name: name.to_owned(),
            timeout,
        })
    }

    /// `Ok(None)` means a transient timeout: keep polling.
    async fn fetch_polling_operation(&self, name: &str) -> Result<Option<OperationResponse>> {
        match self.get_operation(name).await {
            Ok(response) => Ok(Some(response)),
            Err(err) if err.is_timeout() => {
                warn!(operation = name, error = %err, "get operation timed out");
                Ok(None)
            }
            Err(err) => {
                error!(operation = name, error = %err, "get operation failed");
                Err(err)
            }
        }
    }
}

/// `interval * (1 + sample * speed^attempt)` with `sample` in `[0, 1)`.
pub(crate) fn overload_backoff(
    interval: Duration,
    speed: f64,
    attempt: usize,
    sample: f64,
) -> Duration {
    let exp = attempt.min(16) as i32;
    let rate = 1.0 + sample.clamp(0.0, 1.0) * speed.max(1.0).powi(exp);
    interval.mul_f64(rate)
}
