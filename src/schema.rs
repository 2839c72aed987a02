// ABOUTME: Structured-output schema translation for CLI agent flags.
// ABOUTME: Turns an ordered name -> type descriptor mapping into a JSON object schema.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Ordered mapping of property name to an opaque type descriptor.
///
/// Every declared property is required in the translated schema; there is
/// no way to mark one optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    properties: Map<String, Value>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a property. Re-declaring a name replaces its descriptor in place.
    pub fn property(mut self, name: impl Into<String>, descriptor: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), descriptor.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// `{type: "object", properties: {...}, required: [every name]}`
    pub fn translate(&self) -> Value {
        let required: Vec<&str> = self.names().collect();
        json!({
            "type": "object",
            "properties": self.properties,
            "required": required,
        })
    }

    /// Translated schema encoded for a command-line flag value
    pub fn to_flag_value(&self) -> String {
        self.translate().to_string()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Schema {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Schema::new(), |schema, (name, descriptor)| {
                schema.property(name, descriptor)
            })
    }
}
