use std::collections::BTreeMap;
use std::marker::PhantomData;

use kvmap_types::{NativeKey, PropertyBag, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value as Json};

use crate::error::{MappingError, MappingResult};
use crate::traits::{Entity, MappedCollection};

/// Maps any `serde` entity through its JSON form.
///
/// The entity must serialize to a JSON object. The identity attribute
/// (`id` by default) is stripped on the way in and rebuilt from the native
/// key on the way out. Top-level attributes can be renamed to different
/// native property names; nested objects are stored as embedded entities
/// with their own names unchanged.
///
/// # Examples
///
/// ```
/// use kvmap_mapper::{Entity, MappedCollection, SerdeMapping};
/// use kvmap_types::EntityId;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Widget {
///     id: Option<EntityId>,
///     name: String,
/// }
///
/// impl Entity for Widget {
///     fn id(&self) -> Option<&EntityId> { self.id.as_ref() }
///     fn set_id(&mut self, id: EntityId) { self.id = Some(id); }
/// }
///
/// let mapping = SerdeMapping::<Widget>::new("Widget").rename("name", "Name");
/// let bag = mapping.serialize(&Widget { id: None, name: "A".into() }).unwrap();
/// assert_eq!(bag.get("Name").and_then(|v| v.as_str()), Some("A"));
/// assert!(!bag.contains("id"));
/// ```
pub struct SerdeMapping<E> {
    kind: String,
    id_attribute: String,
    renames: BTreeMap<String, String>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> SerdeMapping<E> {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id_attribute: "id".into(),
            renames: BTreeMap::new(),
            _entity: PhantomData,
        }
    }

    /// Use a different attribute as the identity field.
    pub fn with_id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    /// Store `attribute` under the native property name `native`.
    pub fn rename(mut self, attribute: impl Into<String>, native: impl Into<String>) -> Self {
        self.renames.insert(attribute.into(), native.into());
        self
    }

    pub fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    fn attribute_for(&self, native: &str) -> String {
        self.renames
            .iter()
            .find(|(_, n)| n.as_str() == native)
            .map(|(attr, _)| attr.clone())
            .unwrap_or_else(|| native.to_string())
    }
}

impl<E> std::fmt::Debug for SerdeMapping<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerdeMapping")
            .field("kind", &self.kind)
            .field("id_attribute", &self.id_attribute)
            .field("renames", &self.renames)
            .finish()
    }
}

impl<E> MappedCollection<E> for SerdeMapping<E>
where
    E: Entity + Serialize + DeserializeOwned,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn native_property(&self, attribute: &str) -> String {
        self.renames
            .get(attribute)
            .cloned()
            .unwrap_or_else(|| attribute.to_string())
    }

    fn serialize(&self, entity: &E) -> MappingResult<PropertyBag> {
        let json = serde_json::to_value(entity).map_err(|e| MappingError::Serialize(e.to_string()))?;
        let attributes = match json {
            Json::Object(attributes) => attributes,
            other => {
                return Err(MappingError::NotAnObject {
                    found: json_type(&other),
                })
            }
        };

        let mut bag = PropertyBag::new();
        for (attribute, value) in attributes {
            if attribute == self.id_attribute {
                continue;
            }
            let value = json_to_value(&attribute, value)?;
            bag.insert(self.native_property(&attribute), value);
        }
        Ok(bag)
    }

    fn deserialize(&self, key: &NativeKey, properties: PropertyBag) -> MappingResult<E> {
        let mut object = Map::new();
        for (native, value) in properties {
            let attribute = self.attribute_for(&native);
            object.insert(attribute.clone(), value_to_json(&attribute, value)?);
        }
        let id = serde_json::to_value(&key.id).map_err(|e| MappingError::Serialize(e.to_string()))?;
        object.insert(self.id_attribute.clone(), id);

        serde_json::from_value(Json::Object(object)).map_err(|e| MappingError::Deserialize {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }
}

fn json_type(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}

/// Convert one JSON attribute to a store value.
pub fn json_to_value(attribute: &str, json: Json) -> MappingResult<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if n.is_u64() {
                return Err(MappingError::UnsupportedValue {
                    attribute: attribute.to_string(),
                    reason: format!("integer {n} exceeds the signed 64-bit range"),
                });
            } else {
                match n.as_f64() {
                    Some(f) => Value::Double(f),
                    None => {
                        return Err(MappingError::UnsupportedValue {
                            attribute: attribute.to_string(),
                            reason: format!("number {n} is not representable"),
                        })
                    }
                }
            }
        }
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| json_to_value(attribute, item))
                .collect::<MappingResult<_>>()?,
        ),
        Json::Object(fields) => {
            let mut bag = PropertyBag::new();
            for (name, value) in fields {
                let nested = format!("{attribute}.{name}");
                bag.insert(name, json_to_value(&nested, value)?);
            }
            Value::Entity(bag)
        }
    })
}

/// Convert one store value back to JSON.
pub fn value_to_json(attribute: &str, value: Value) -> MappingResult<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Boolean(b) => Json::Bool(b),
        Value::Integer(i) => Json::Number(i.into()),
        Value::Double(f) => match Number::from_f64(f) {
            Some(n) => Json::Number(n),
            None => {
                return Err(MappingError::UnsupportedValue {
                    attribute: attribute.to_string(),
                    reason: format!("double {f} has no JSON form"),
                })
            }
        },
        Value::String(s) => Json::String(s),
        Value::Blob(bytes) => Json::Array(bytes.into_iter().map(|b| Json::Number(b.into())).collect()),
        Value::Key(key) => serde_json::to_value(&key).map_err(|e| MappingError::Serialize(e.to_string()))?,
        Value::Array(items) => Json::Array(
            items
                .into_iter()
                .map(|item| value_to_json(attribute, item))
                .collect::<MappingResult<_>>()?,
        ),
        Value::Entity(bag) => {
            let mut object = Map::new();
            for (name, value) in bag {
                let nested = format!("{attribute}.{name}");
                object.insert(name, value_to_json(&nested, value)?);
            }
            Json::Object(object)
        }
    })
}
