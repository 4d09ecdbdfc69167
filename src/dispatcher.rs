use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    options::ensure_request_id,
    protocol::{
        AckImpressionsRequest, CallbackRequest, DoneRequest, HasStatus, ImportRequest,
        ImportResponse, Status, WriteRequest,
    },
    status::{classify, StatusClass},
    Client, HelperOptions, RecError, RequestHelper, RequestKind, RequestOptions, Result,
};

type Runner = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Called once for every finished task.
pub type Observer = Arc<dyn Fn(&TaskReport) + Send + Sync>;

/// A request handed to [`ConcurrentHelper::submit`].
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    Write(WriteRequest),
    Import(ImportRequest),
    Done(DoneRequest),
    Callback(CallbackRequest),
    AckImpressions(AckImpressionsRequest),
}

impl Submission {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Write(_) => RequestKind::Write,
            Self::Import(_) => RequestKind::Import,
            Self::Done(_) => RequestKind::Done,
            Self::Callback(_) => RequestKind::Callback,
            Self::AckImpressions(_) => RequestKind::AckImpressions,
        }
    }
}

#[derive(Debug)]
pub enum TaskOutcome {
    Success,
    /// The call went through but the server reported a failure status.
    Failure(Status),
    Error(RecError),
}

#[derive(Debug)]
pub struct TaskReport {
    pub kind: RequestKind,
    pub request_id: Option<String>,
    pub outcome: TaskOutcome,
}

/// Fixed pool of workers executing submitted requests in the background.
///
/// The queue has no buffer: [`ConcurrentHelper::submit`] waits until a worker
/// picks the task up, so at most `worker_count` tasks run at any time.
/// Results are logged and passed to the observer, never returned to the
/// submitter.
pub struct ConcurrentHelper<C> {
    request_helper: RequestHelper<C>,
    sender: flume::Sender<Runner>,
    workers: Vec<JoinHandle<()>>,
    observer: Option<Observer>,
}

impl<C> fmt::Debug for ConcurrentHelper<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentHelper")
            .field("request_helper", &self.request_helper)
            .field("workers", &self.workers.len())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl<C: Client> ConcurrentHelper<C> {
    /// Spawns the worker pool. Must be called within a tokio runtime.
    pub fn new(client: Arc<C>, options: HelperOptions) -> Self {
        let (sender, receiver) = flume::bounded::<Runner>(0);
        let workers = (0..options.effective_worker_count())
            .map(|id| spawn_worker(id, receiver.clone()))
            .collect();

        Self {
            request_helper: RequestHelper::new(client, options),
            sender,
            workers,
            observer: None,
        }
    }

    /// Registers a callback receiving the report of every finished task.
    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn request_helper(&self) -> &RequestHelper<C> {
        &self.request_helper
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues `submission` for background execution.
    ///
    /// Resolves once a worker has accepted the task. Kinds the client does not
    /// support, and imports without a data date, are rejected here without
    /// queueing anything.
    pub async fn submit(&self, submission: Submission, opts: RequestOptions) -> Result<()> {
        let kind = submission.kind();
        if !self.request_helper.client().supports(kind) {
            return Err(RecError::UnsupportedRequest(kind));
        }
        if kind == RequestKind::Import && opts.data_date.is_none() {
            return Err(RecError::MissingOption("data_date"));
        }

        let runner = self.runner(submission, ensure_request_id(opts));
        self.sender
            .send_async(runner)
            .await
            .map_err(|_| RecError::DispatcherClosed)
    }

    /// Stops accepting tasks and waits until the workers finish the ones
    /// already handed to them.
    pub async fn shutdown(self) {
        let Self {
            sender, workers, ..
        } = self;
        drop(sender);

        for worker in workers {
            if let Err(err) = worker.await {
                warn!(error = %err, "worker terminated abnormally");
            }
        }
    }

    fn runner(&self, submission: Submission, opts: RequestOptions) -> Runner {
        let helper = self.request_helper.clone();
        let observer = self.observer.clone();

        Box::pin(async move {
            let kind = submission.kind();
            let request_id = opts.request_id.clone();
            let retry_times = helper.options().retry_times;
            let client = helper.client();

            let outcome = match submission {
                Submission::Write(request) => status_outcome(
                    helper
                        .do_with_retry(
                            |req, opts| client.write_data(req, opts),
                            request,
                            opts,
                            retry_times,
                        )
                        .await,
                ),
                Submission::Import(request) => status_outcome(
                    helper
                        .do_import::<_, ImportResponse, _, _>(
                            |req, opts| client.import_data(req, opts),
                            request,
                            opts,
                            retry_times,
                        )
                        .await,
                ),
                Submission::Done(request) => status_outcome(
                    helper
                        .do_with_retry(|req, opts| client.done(req, opts), request, opts, retry_times)
                        .await,
                ),
                Submission::Callback(request) => status_outcome(
                    helper
                        .do_with_retry(
                            |req, opts| client.callback(req, opts),
                            request,
                            opts,
                            retry_times,
                        )
                        .await,
                ),
                Submission::AckImpressions(request) => status_outcome(
                    helper
                        .do_with_retry(
                            |req, opts| client.ack_impressions(req, opts),
                            request,
                            opts,
                            retry_times,
                        )
                        .await,
                ),
            };

            let report = TaskReport {
                kind,
                request_id,
                outcome,
            };
            log_report(&report);
            if let Some(observer) = observer {
                observer(&report);
            }
        })
    }
}

fn spawn_worker(id: usize, receiver: flume::Receiver<Runner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Ok(task) = receiver.recv_async().await {
            // A panicking task must not take the worker down with it.
            if let Err(err) = tokio::spawn(task).await {
                error!(worker = id, error = %err, "task panicked");
            }
        }
        debug!(worker = id, "worker stopped");
    })
}

/// Idempotent duplicates count as success: an earlier attempt already landed.
fn status_outcome<R: HasStatus>(result: Result<R>) -> TaskOutcome {
    match result {
        Ok(response) => match classify(response.status()) {
            StatusClass::Success | StatusClass::Idempotent => TaskOutcome::Success,
            _ => TaskOutcome::Failure(response.status().clone()),
        },
        Err(err) => TaskOutcome::Error(err),
    }
}

fn log_report(report: &TaskReport) {
    let kind = report.kind.as_str();
    let request_id = report.request_id.as_deref().unwrap_or_default();

    match &report.outcome {
        TaskOutcome::Success => info!(kind, request_id, "async request success"),
        TaskOutcome::Failure(status) => error!(
            kind,
            request_id,
            code = status.code,
            message = %status.message,
            "async request fail"
        ),
        TaskOutcome::Error(err) => {
            error!(kind, request_id, error = %err, "async request occur error")
        }
    }
}
