//! Static in-memory source for local runs and tests.

use anyhow::Result;
use async_trait::async_trait;

use super::Source;
use crate::model::RawItem;

pub struct FixtureSource {
    name: String,
    items: Vec<RawItem>,
}

impl FixtureSource {
    pub fn new(name: impl Into<String>, items: Vec<RawItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    /// Load items from a JSON array of `RawItem`.
    pub fn from_json(name: impl Into<String>, json: &str) -> Result<Self> {
        let items: Vec<RawItem> = serde_json::from_str(json)?;
        Ok(Self::new(name, items))
    }
}

#[async_trait]
impl Source for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<RawItem>> {
        Ok(self.items.clone())
    }
}
