use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /write`: the full new content of the jot
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct WriteRequest {
    pub content: String,
}
