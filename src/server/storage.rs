//! In-memory storage for the reference audit server.
//!
//! Each collection hands out sequential ids starting at 1 and validates
//! bodies the way the production backend does: required fields, unique
//! institution codes, and existing parents.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::models::EntityType;

/// Field name to messages, serialized as the 400 response body.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

const REQUIRED: &str = "This field is required.";

#[derive(Debug, Default)]
struct Collection {
    last_id: i64,
    rows: Vec<Map<String, Value>>,
}

impl Collection {
    fn find(&self, id: i64) -> Option<&Map<String, Value>> {
        self.rows
            .iter()
            .find(|row| row.get("id").and_then(Value::as_i64) == Some(id))
    }
}

fn required_fields(entity_type: EntityType) -> &'static [&'static str] {
    match entity_type {
        EntityType::Institution => &["codigo", "nombre", "tipo"],
        EntityType::Visit => &["institucion", "fecha", "tipo_comida"],
        EntityType::Dish => &["visita", "nombre"],
        EntityType::Ingredient => &["plato", "alimento", "cantidad"],
    }
}

#[derive(Debug, Default)]
pub struct AuditStore {
    collections: RwLock<HashMap<EntityType, Collection>>,
}

impl AuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores `body`, returning it with its assigned `id`.
    pub async fn create(&self, entity_type: EntityType, body: Value) -> Result<Value, FieldErrors> {
        let Value::Object(mut fields) = body else {
            let mut errors = FieldErrors::new();
            errors.insert(
                "non_field_errors".to_string(),
                vec!["Invalid data. Expected a dictionary.".to_string()],
            );
            return Err(errors);
        };

        let mut collections = self.collections.write().await;
        let errors = validate(&collections, entity_type, &fields);
        if !errors.is_empty() {
            return Err(errors);
        }

        let collection = collections.entry(entity_type).or_default();
        collection.last_id += 1;
        fields.insert("id".to_string(), Value::from(collection.last_id));
        collection.rows.push(fields.clone());
        tracing::debug!(%entity_type, id = collection.last_id, "Created");

        Ok(Value::Object(fields))
    }

    pub async fn get(&self, entity_type: EntityType, id: i64) -> Option<Value> {
        let collections = self.collections.read().await;
        collections
            .get(&entity_type)
            .and_then(|c| c.find(id))
            .cloned()
            .map(Value::Object)
    }

    /// Every row of a collection whose string fields contain `search`,
    /// case-insensitively. No search returns everything.
    pub async fn list(&self, entity_type: EntityType, search: Option<&str>) -> Vec<Value> {
        let needle = search.map(str::to_lowercase).filter(|s| !s.is_empty());
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(&entity_type) else {
            return Vec::new();
        };

        collection
            .rows
            .iter()
            .filter(|row| match &needle {
                Some(needle) => row
                    .values()
                    .filter_map(Value::as_str)
                    .any(|v| v.to_lowercase().contains(needle.as_str())),
                None => true,
            })
            .cloned()
            .map(Value::Object)
            .collect()
    }
}

fn validate(
    collections: &HashMap<EntityType, Collection>,
    entity_type: EntityType,
    fields: &Map<String, Value>,
) -> FieldErrors {
    let mut errors = FieldErrors::new();

    for field in required_fields(entity_type) {
        let missing = match fields.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        };
        if missing {
            errors
                .entry(field.to_string())
                .or_default()
                .push(REQUIRED.to_string());
        }
    }

    if let (Some(parent_type), Some(parent_field)) =
        (entity_type.parent(), entity_type.parent_field())
    {
        if let Some(value) = fields.get(parent_field).filter(|v| !v.is_null()) {
            let exists = value
                .as_i64()
                .and_then(|id| collections.get(&parent_type).and_then(|c| c.find(id)))
                .is_some();
            if !exists {
                let shown = value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
                errors.entry(parent_field.to_string()).or_default().push(format!(
                    "Invalid pk \"{}\" - object does not exist.",
                    shown
                ));
            }
        }
    }

    if entity_type == EntityType::Institution {
        if let Some(code) = fields.get("codigo").and_then(Value::as_str) {
            let taken = collections
                .get(&EntityType::Institution)
                .map(|c| {
                    c.rows
                        .iter()
                        .any(|row| row.get("codigo").and_then(Value::as_str) == Some(code))
                })
                .unwrap_or(false);
            if taken {
                errors
                    .entry("codigo".to_string())
                    .or_default()
                    .push("institución with this codigo already exists.".to_string());
            }
        }
    }

    errors
}
