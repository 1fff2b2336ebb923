use kvmap_types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::traits::Entity;

/// Schemaless entity: an identity plus arbitrary JSON attributes.
///
/// Useful where the attribute set is only known at runtime (tooling, the
/// CLI). Pair it with [`SerdeMapping`](crate::SerdeMapping).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(flatten)]
    pub attributes: Map<String, Json>,
}

impl Document {
    pub fn new(attributes: Map<String, Json>) -> Self {
        Self {
            id: None,
            attributes,
        }
    }

    /// Parse a JSON object into a document. An `id` member becomes the identity.
    pub fn from_json(json: Json) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json)
    }

    pub fn get(&self, attribute: &str) -> Option<&Json> {
        self.attributes.get(attribute)
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<Json>) {
        self.attributes.insert(attribute.into(), value.into());
    }

    /// The document as a JSON object, identity included.
    pub fn to_json(&self) -> Json {
        let mut object = self.attributes.clone();
        if let Some(id) = &self.id {
            object.insert("id".into(), serde_json::to_value(id).unwrap_or(Json::Null));
        }
        Json::Object(object)
    }
}

impl Entity for Document {
    fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}
