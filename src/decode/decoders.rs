//! Page decoder implementation

use super::types::{PageLayout, RawPage};
use crate::error::{Error, Result};
use crate::types::{extract_path, extract_string, extract_u64, ParentEntity, RawRecord};
use serde_json::Value;

/// Decodes listing responses into [`RawPage`]s
#[derive(Debug, Clone)]
pub struct PageDecoder {
    layout: PageLayout,
}

impl PageDecoder {
    /// Create a decoder for a layout
    pub fn new(layout: PageLayout) -> Self {
        Self { layout }
    }

    /// Get the layout
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    /// Decode a response body, attaching `parent` to every record
    ///
    /// A missing records field decodes as an empty page; a records field that
    /// is not an array is a decode error.
    pub fn decode(&self, body: &Value, parent: Option<&ParentEntity>) -> Result<RawPage> {
        let items = match extract_path(body, &self.layout.records_path) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .cloned()
                .map(|item| RawRecord::new(item, parent.cloned()))
                .collect(),
            Some(other) => {
                return Err(Error::decode(format!(
                    "Expected array at '{}', found {}",
                    self.layout.records_path,
                    type_name(other)
                )))
            }
        };

        let reported_total = self
            .layout
            .total_path
            .as_deref()
            .and_then(|path| extract_u64(body, path));

        let next_cursor = self
            .layout
            .next_path
            .as_deref()
            .and_then(|path| extract_string(body, path))
            .filter(|next| !next.is_empty());

        Ok(RawPage {
            items,
            reported_total,
            next_cursor,
        })
    }

    /// Read only the reported total from a body
    pub fn reported_total(&self, body: &Value) -> Option<u64> {
        self.layout
            .total_path
            .as_deref()
            .and_then(|path| extract_u64(body, path))
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
