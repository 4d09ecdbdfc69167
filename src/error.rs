use std::time::Duration;

use crate::client::RequestKind;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum RecError {
    /// The SDK gave up waiting for the server. Retryable.
    #[error("request timeout: {0}")]
    Timeout(String),
    /// Any other network or request execution error from the SDK.
    #[error("transport error: {0}")]
    Transport(String),
    /// Every attempt of a retried call ended in a timeout.
    #[error("still fail after {attempts} attempts")]
    RetryExhausted { attempts: usize },
    /// The server kept reporting overload after all backoff attempts.
    #[error("server overload after {attempts} attempts")]
    ServerOverload { attempts: usize },
    /// An import call was accepted by the transport but refused by the server.
    #[error("import return failure info, code {code}: {message}")]
    ImportFailure { code: i32, message: String },
    /// The server lost track of an operation. The data of the originating
    /// import must be reconciled with the vendor.
    #[error("operation lost: {name}")]
    OperationLost { name: String },
    /// Polling gave up before the operation reported completion.
    #[error("polling import result of {name} timeout after {timeout:?}")]
    PollingTimeout { name: String, timeout: Duration },
    /// Response payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// A call kind requires an option that was not provided.
    #[error("missing required option: {0}")]
    MissingOption(&'static str),
    /// The client's vertical has no endpoint for this request kind.
    #[error("can't support this request type: {0}")]
    UnsupportedRequest(RequestKind),
    /// All dispatcher workers are gone.
    #[error("concurrent helper is closed")]
    DispatcherClosed,
}

impl RecError {
    /// Returns `true` for transport timeouts, the only error class retried.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<serde_json::Error> for RecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::RecError;

    #[test]
    fn only_timeouts_are_timeouts() {
        assert!(RecError::Timeout("deadline".to_owned()).is_timeout());
        assert!(!RecError::Transport("reset".to_owned()).is_timeout());
        assert!(!RecError::RetryExhausted { attempts: 3 }.is_timeout());
    }

    #[test]
    fn errors_render_their_context() {
        let err = RecError::ImportFailure {
            code: 400,
            message: "bad topic".to_owned(),
        };
        assert_eq!(err.to_string(), "import return failure info, code 400: bad topic");
    }
}
