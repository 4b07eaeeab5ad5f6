use serde::{Deserialize, Serialize};

use crate::openai::list_models::types::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListObjectType {
    #[serde(rename = "list")]
    List,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListModelsResponse {
    /// The object type, which is always "list".
    pub object: ListObjectType,
    /// The list of model objects.
    pub data: Vec<Model>,
}
