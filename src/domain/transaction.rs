use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Normal,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub urgency: Urgency,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Transaction {
    pub fn new(amount_minor: i64, currency: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount_minor,
            currency: currency.to_uppercase(),
            urgency: Urgency::Normal,
            region: None,
            tags: Vec::new(),
        }
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_uppercase());
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }
}
