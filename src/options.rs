use std::collections::BTreeMap;
use std::time::Duration;

use crate::protocol::Stage;

/// Gap left between the server-side deadline and the client timeout so the
/// server can still answer before the client gives up.
const SERVER_TIMEOUT_MARGIN: Duration = Duration::from_millis(100);

/// Per-call options forwarded to the SDK.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Client-side request timeout.
    pub timeout: Option<Duration>,
    /// Time the server should answer within; keep it below `timeout`.
    pub server_timeout: Option<Duration>,
    /// Idempotency token. Retries of one logical request share it.
    pub request_id: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub stage: Option<Stage>,
    /// Date the data was produced, `YYYY-MM-DD`. Required by imports.
    pub data_date: Option<String>,
    pub scene: Option<String>,
}

impl RequestOptions {
    /// Options for real-time writes.
    pub fn streaming(timeout: Duration) -> Self {
        Self::default()
            .with_stage(Stage::IncrementalSyncStreaming)
            .with_timeout(timeout)
            .with_server_timeout(timeout.saturating_sub(SERVER_TIMEOUT_MARGIN))
    }

    /// Options for daily offline uploads of `data_date`.
    pub fn daily(stage: Stage, data_date: impl Into<String>, timeout: Duration) -> Self {
        Self::default()
            .with_stage(stage)
            .with_data_date(data_date)
            .with_timeout(timeout)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = Some(timeout);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_data_date(mut self, data_date: impl Into<String>) -> Self {
        self.data_date = Some(data_date.into());
        self
    }

    pub fn with_scene(mut self, scene: impl Into<String>) -> Self {
        self.scene = Some(scene.into());
        self
    }
}

/// Returns `opts` carrying a request id, generating one only when the caller
/// did not supply it.
pub fn ensure_request_id(mut opts: RequestOptions) -> RequestOptions {
    if opts.request_id.is_none() {
        opts.request_id = Some(uuid::Uuid::new_v4().to_string());
    }
    opts
}

/// Configures retry, polling and concurrency behavior of the helpers.
#[derive(Clone, Debug, PartialEq)]
pub struct HelperOptions {
    /// Retries after the initial attempt.
    pub retry_times: usize,
    /// Fixed number of dispatcher workers.
    pub worker_count: usize,
    /// Upper bound on waiting for an import operation to finish.
    pub polling_timeout: Duration,
    /// Pause between two operation fetches.
    pub polling_interval: Duration,
    /// Base interval of the overload backoff.
    pub overload_retry_interval: Duration,
    /// Growth base of the overload backoff's random factor.
    pub overload_increase_speed: f64,
    pub get_operation_timeout: Duration,
    pub list_operations_timeout: Duration,
}

impl Default for HelperOptions {
    fn default() -> Self {
        Self {
            retry_times: 2,
            worker_count: 5,
            polling_timeout: Duration::from_secs(10),
            polling_interval: Duration::from_millis(100),
            overload_retry_interval: Duration::from_millis(200),
            overload_increase_speed: 3.0,
            get_operation_timeout: Duration::from_millis(500),
            list_operations_timeout: Duration::from_millis(800),
        }
    }
}

impl HelperOptions {
    /// Builds options from defaults overridden by environment variables.
    ///
    /// Reads, when set:
    /// - `REC_HELPER_RETRY_TIMES`
    /// - `REC_HELPER_WORKER_COUNT`
    /// - `REC_HELPER_POLLING_TIMEOUT_MS`
    /// - `REC_HELPER_POLLING_INTERVAL_MS`
    /// - `REC_HELPER_OVERLOAD_RETRY_INTERVAL_MS`
    /// - `REC_HELPER_GET_OPERATION_TIMEOUT_MS`
    /// - `REC_HELPER_LIST_OPERATIONS_TIMEOUT_MS`
    ///
    /// Returns an error if a variable is set but is not an unsigned integer.
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| -> std::result::Result<Option<u64>, String> {
            match lookup(key) {
                Some(raw) if !raw.trim().is_empty() => raw
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|err| format!("invalid {key} value '{raw}': {err}")),
                _ => Ok(None),
            }
        };

        let count = |key: &str, value: u64| -> std::result::Result<usize, String> {
            usize::try_from(value).map_err(|err| format!("invalid {key} value '{value}': {err}"))
        };

        let mut opts = Self::default();
        if let Some(value) = read("REC_HELPER_RETRY_TIMES")? {
            opts.retry_times = count("REC_HELPER_RETRY_TIMES", value)?;
        }
        if let Some(value) = read("REC_HELPER_WORKER_COUNT")? {
            opts.worker_count = count("REC_HELPER_WORKER_COUNT", value)?;
        }
        if let Some(value) = read("REC_HELPER_POLLING_TIMEOUT_MS")? {
            opts.polling_timeout = Duration::from_millis(value);
        }
        if let Some(value) = read("REC_HELPER_POLLING_INTERVAL_MS")? {
            opts.polling_interval = Duration::from_millis(value);
        }
        if let Some(value) = read("REC_HELPER_OVERLOAD_RETRY_INTERVAL_MS")? {
            opts.overload_retry_interval = Duration::from_millis(value);
        }
        if let Some(value) = read("REC_HELPER_GET_OPERATION_TIMEOUT_MS")? {
            opts.get_operation_timeout = Duration::from_millis(value);
        }
        if let Some(value) = read("REC_HELPER_LIST_OPERATIONS_TIMEOUT_MS")? {
            opts.list_operations_timeout = Duration::from_millis(value);
        }
        Ok(opts)
    }

    /// Worker count actually spawned; a pool is never empty.
    pub(crate) fn effective_worker_count(&self) -> usize {
        self.worker_count.max(1)
    }
}
