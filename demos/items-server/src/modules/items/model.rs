use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateItem {
    pub name: String,
    #[serde(default)]
    pub price: f64,
}
