use crate::protocol::{
    Status, STATUS_CODE_HTTP_OK, STATUS_CODE_IDEMPOTENT, STATUS_CODE_OPERATION_LOSS,
    STATUS_CODE_SUCCESS, STATUS_CODE_TOO_MANY_REQUEST,
};

/// Semantic outcome of a response status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Success,
    /// Duplicate of an already processed request id. Counts as an upload success.
    Idempotent,
    Overloaded,
    OperationLost,
    Failure,
}

pub fn classify(status: &Status) -> StatusClass {
    match status.code {
        STATUS_CODE_SUCCESS | STATUS_CODE_HTTP_OK => StatusClass::Success,
        STATUS_CODE_IDEMPOTENT => StatusClass::Idempotent,
        STATUS_CODE_TOO_MANY_REQUEST => StatusClass::Overloaded,
        STATUS_CODE_OPERATION_LOSS => StatusClass::OperationLost,
        _ => StatusClass::Failure,
    }
}

/// Upload accepted, either freshly or as an idempotent duplicate.
pub fn is_upload_success(status: &Status) -> bool {
    status.code == STATUS_CODE_SUCCESS || status.code == STATUS_CODE_IDEMPOTENT
}

pub fn is_success(status: &Status) -> bool {
    is_success_code(status.code)
}

pub fn is_success_code(code: i32) -> bool {
    code == STATUS_CODE_SUCCESS || code == STATUS_CODE_HTTP_OK
}

pub fn is_server_overload(status: &Status) -> bool {
    status.code == STATUS_CODE_TOO_MANY_REQUEST
}

pub fn is_operation_lost(status: &Status) -> bool {
    status.code == STATUS_CODE_OPERATION_LOSS
}
