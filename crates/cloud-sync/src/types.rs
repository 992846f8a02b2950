//! Wire types for the document API.

use bloomtrack_core::sync::RemoteDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A document as the API returns it. `name` is the full document path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResponse {
    pub name: String,
    #[serde(default)]
    pub fields: Value,
    pub create_time: DateTime<Utc>,
    #[serde(default)]
    pub update_time: Option<DateTime<Utc>>,
}

impl DocumentResponse {
    pub fn document_id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

impl From<DocumentResponse> for RemoteDocument {
    fn from(doc: DocumentResponse) -> Self {
        RemoteDocument {
            id: doc.document_id().to_string(),
            fields: doc.fields,
            create_time: doc.create_time,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<DocumentResponse>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeDocumentRequest<'a> {
    pub fields: &'a Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}
