use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
pub struct CursorPosition {
    pub line: u32,
    pub column: u32,
}

/// Selection between two positions, in the order the client reported them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
pub struct SelectionRange {
    pub start: CursorPosition,
    pub end: CursorPosition,
}

/// One user's live presence within one document's session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveParticipant {
    pub user_id: String,
    pub user_name: String,
    pub color: String,
    #[serde(default)]
    pub cursor: Option<CursorPosition>,
    #[serde(default)]
    pub selection: Option<SelectionRange>,
    /// Application-defined presence fields set through presence updates
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl ActiveParticipant {
    pub fn new(user_id: &str, user_name: &str, color: String) -> Self {
        Self {
            user_id: user_id.to_string(),
            user_name: user_name.to_string(),
            color,
            cursor: None,
            selection: None,
            extra: Map::new(),
        }
    }

    /// Shallow-merge `patch` over this record.
    ///
    /// Keys absent from the patch keep their value, `userId` cannot be
    /// changed, and a patch that leaves a known field with the wrong shape is
    /// rejected as a whole.
    pub fn merged_with(&self, patch: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        let Value::Object(mut record) = serde_json::to_value(self)? else {
            return Err(serde_json::Error::custom("participant did not serialize to an object"));
        };
        for (key, value) in patch {
            if key == "userId" {
                continue;
            }
            record.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(record))
    }
}
