use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An event as returned by the model: usually a sentence, sometimes an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventDescriptor {
    Summary(String),
    Detailed(Map<String, Value>),
}

/// Structured profile extracted from one chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextProfile {
    pub about_person: String,
    pub speaking_style: String,
    pub events: Vec<EventDescriptor>,
    /// Keys the model added beyond the three required ones.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
