use serde::{Deserialize, Serialize};

/// One agent listing as it appears in the output spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Phone")]
    pub phone: Option<String>,
    #[serde(rename = "Zip Code")]
    pub postal_code: String,
}

impl AgentRecord {
    pub fn new(name: impl Into<String>, phone: Option<String>, postal_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone,
            postal_code: postal_code.into(),
        }
    }
}
