use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const STATUS_CODE_SUCCESS: i32 = 0;
/// Success code used by predict/callback style endpoints.
pub const STATUS_CODE_HTTP_OK: i32 = 200;
pub const STATUS_CODE_INVALID_REQUEST: i32 = 400;
/// Request id already processed; the duplicate was rejected.
pub const STATUS_CODE_IDEMPOTENT: i32 = 409;
pub const STATUS_CODE_OPERATION_LOSS: i32 = 410;
pub const STATUS_CODE_TOO_MANY_REQUEST: i32 = 429;

pub const TOPIC_USER: &str = "user";
pub const TOPIC_ITEM: &str = "item";
pub const TOPIC_BEHAVIOR: &str = "behavior";

/// One row of user, item or behavior data.
pub type DataRecord = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl Status {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn success() -> Self {
        Self::new(STATUS_CODE_SUCCESS, "")
    }
}

/// Response records that carry a [`Status`].
pub trait HasStatus {
    fn status(&self) -> &Status;
}

macro_rules! impl_has_status {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HasStatus for $ty {
                fn status(&self) -> &Status {
                    &self.status
                }
            }
        )*
    };
}

impl_has_status!(
    WriteResponse,
    ImportResponse,
    DoneResponse,
    PredictResponse,
    CallbackResponse,
    AckImpressionsResponse,
    OperationResponse,
    ListOperationsResponse,
);

/// Synchronisation stage of uploaded data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    IncrementalSyncStreaming,
    IncrementalSyncDaily,
    PreSync,
    HistorySync,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IncrementalSyncStreaming => "incremental_sync_streaming",
            Self::IncrementalSyncDaily => "incremental_sync_daily",
            Self::PreSync => "pre_sync",
            Self::HistorySync => "history_sync",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct WriteRequest {
    pub topic: String,
    pub data: Vec<DataRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub errors: Vec<DataError>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportRequest {
    pub topic: String,
    pub data: Vec<DataRecord>,
}

/// Final result of an import, embedded in the finished [`Operation`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ImportResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub errors: Vec<DataError>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DoneRequest {
    pub topic: String,
    /// Finished data dates, `YYYYMMDD`.
    pub data_dates: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DoneResponse {
    #[serde(default)]
    pub status: Status,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PredictRequest {
    pub uid: String,
    pub size: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidate_item_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_item_id: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PredictItem {
    pub id: String,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub extra: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub items: Vec<PredictItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CallbackItem {
    pub id: String,
    pub pos: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub extra: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CallbackRequest {
    pub predict_request_id: String,
    pub uid: String,
    pub scene: String,
    pub items: Vec<CallbackItem>,
}

impl CallbackRequest {
    /// Builds the callback for the items of `prediction` that were shown to
    /// `uid`, positioned from 1 in display order.
    pub fn from_prediction(
        uid: impl Into<String>,
        scene: impl Into<String>,
        prediction: &PredictResponse,
    ) -> Self {
        let extra = json!({ "reason": "kept" }).to_string();
        let items = prediction
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| CallbackItem {
                id: item.id.clone(),
                pos: (index + 1).to_string(),
                extra: extra.clone(),
            })
            .collect();

        Self {
            predict_request_id: prediction.request_id.clone(),
            uid: uid.into(),
            scene: scene.into(),
            items,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct CallbackResponse {
    #[serde(default)]
    pub status: Status,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AckItem {
    pub id: String,
    pub action: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AckImpressionsRequest {
    pub predict_request_id: String,
    pub uid: String,
    pub scene: String,
    pub items: Vec<AckItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct AckImpressionsResponse {
    #[serde(default)]
    pub status: Status,
}

/// Server-side asynchronous job.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    /// Result payload, only present once `done` is set.
    #[serde(default)]
    pub response: Option<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct OperationResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub operation: Operation,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GetOperationRequest {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ListOperationsRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filter: String,
    pub page_size: u32,
    /// Empty for the first page.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub page_token: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ListOperationsResponse {
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub next_page_token: String,
}
