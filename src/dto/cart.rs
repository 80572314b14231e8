use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::Item;

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct MergeQuery {
    /// Anonymous session identifier
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ItemList {
    #[schema(value_type = Vec<Item>)]
    pub items: Vec<Item>,
}
