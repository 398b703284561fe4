use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub title: String,
    /// Inserted verbatim into the composer.
    pub content: String,
}

impl Template {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
        }
    }
}

/// Append a template body to whatever the composer already holds.
pub fn insert_template(current: &str, body: &str) -> String {
    if current.is_empty() {
        body.to_string()
    } else {
        format!("{current}\n\n{body}")
    }
}
