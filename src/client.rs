use std::fmt;
use std::future::Future;

use crate::{
    protocol::{
        AckImpressionsRequest, AckImpressionsResponse, CallbackRequest, CallbackResponse,
        DoneRequest, DoneResponse, GetOperationRequest, ImportRequest, ListOperationsRequest,
        ListOperationsResponse, OperationResponse, PredictRequest, PredictResponse, WriteRequest,
        WriteResponse,
    },
    RequestOptions, Result,
};

/// Logical kind of a request accepted by the concurrent dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Write,
    Import,
    Done,
    Callback,
    AckImpressions,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Import => "import",
            Self::Done => "done",
            Self::Callback => "callback",
            Self::AckImpressions => "ack_impressions",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product line of the recommendation platform. Each exposes its own
/// subset of data endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Vertical {
    General,
    Byteair,
    Media,
    Retail,
    RetailV2,
}

impl Vertical {
    pub fn supports(self, kind: RequestKind) -> bool {
        use RequestKind::*;

        match self {
            Self::General => matches!(kind, Write | Import | Done | Callback),
            Self::Byteair => matches!(kind, Write | Done | Callback),
            Self::Media | Self::RetailV2 => matches!(kind, Write | Done | AckImpressions),
            Self::Retail => matches!(kind, Write | Import | AckImpressions),
        }
    }
}

/// Recommendation-platform SDK client.
///
/// Implementations own transport, signing and serialization. A timeout must
/// be reported as [`crate::RecError::Timeout`]; it is the only error the
/// helpers retry. The client is shared across dispatcher workers, so every
/// method must tolerate concurrent calls.
pub trait Client: Send + Sync + 'static {
    fn write_data(
        &self,
        request: WriteRequest,
        opts: RequestOptions,
    ) -> impl Future<Output = Result<WriteResponse>> + Send;

    /// Starts a bulk import. The returned operation is polled by name.
    fn import_data(
        &self,
        request: ImportRequest,
        opts: RequestOptions,
    ) -> impl Future<Output = Result<OperationResponse>> + Send;

    /// Marks the daily data of the given dates as complete.
    fn done(
        &self,
        request: DoneRequest,
        opts: RequestOptions,
    ) -> impl Future<Output = Result<DoneResponse>> + Send;

    fn predict(
        &self,
        request: PredictRequest,
        opts: RequestOptions,
    ) -> impl Future<Output = Result<PredictResponse>> + Send;

    fn callback(
        &self,
        request: CallbackRequest,
        opts: RequestOptions,
    ) -> impl Future<Output = Result<CallbackResponse>> + Send;

    fn ack_impressions(
        &self,
        request: AckImpressionsRequest,
        opts: RequestOptions,
    ) -> impl Future<Output = Result<AckImpressionsResponse>> + Send;

    fn get_operation(
        &self,
        request: GetOperationRequest,
        opts: RequestOptions,
    ) -> impl Future<Output = Result<OperationResponse>> + Send;

    fn list_operations(
        &self,
        request: ListOperationsRequest,
        opts: RequestOptions,
    ) -> impl Future<Output = Result<ListOperationsResponse>> + Send;

    /// Whether this client exposes an endpoint for `kind`.
    fn supports(&self, _kind: RequestKind) -> bool {
        true
    }
}
