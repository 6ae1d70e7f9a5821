//! HTTP implementation of the remote API.
//!
//! Talks to the audit REST backend: `POST <base>/auditoria/<collection>/`
//! with a flat JSON body, answered by `{"id": <remote id>, ...}`. Listings
//! are `GET` on the same collection, paginated with `results` and `next`.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::RemoteApi;
use crate::models::{
    Dish, EntityType, Ingredient, Institution, MealType, NaturalKey, ParentRef, Payload, RemoteId,
    Visit,
};
use crate::sync::error::RemoteError;

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: i64,
}

#[derive(Debug, Clone)]
pub struct HttpRemoteApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteApi {
    /// `base_url` is the API root, e.g. `http://10.0.2.2:8000/api`. Every
    /// request is bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn collection_url(&self, entity_type: EntityType) -> String {
        format!("{}/auditoria/{}/", self.base_url, entity_type.collection())
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn create(&self, token: &str, payload: &Payload) -> Result<RemoteId, RemoteError> {
        let url = self.collection_url(payload.entity_type());

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&wire_body(payload))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            let created: CreatedResponse = response
                .json()
                .await
                .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;
            return Ok(RemoteId(created.id));
        }

        // Error bodies are best effort; some proxies answer with HTML
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(classify_failure(status, &body, payload.natural_key().as_ref()))
    }

    async fn find_by_natural_key(
        &self,
        token: &str,
        entity_type: EntityType,
        key: &NaturalKey,
    ) -> Result<Option<RemoteId>, RemoteError> {
        let mut next = Some(self.list_url(entity_type, Some(&key.value))?);

        for _ in 0..MAX_PAGES {
            let Some(url) = next.take() else {
                return Ok(None);
            };
            let page = self.fetch_page(token, url).await?;

            let found = page
                .items
                .iter()
                .find(|item| {
                    item.get(key.field).and_then(Value::as_str) == Some(key.value.as_str())
                })
                .and_then(|item| item.get("id"))
                .and_then(Value::as_i64);
            if let Some(id) = found {
                return Ok(Some(RemoteId(id)));
            }
            next = page.next;
        }

        Err(too_many_pages())
    }

    async fn list(
        &self,
        token: &str,
        entity_type: EntityType,
    ) -> Result<Vec<(RemoteId, Payload)>, RemoteError> {
        let mut rows = Vec::new();
        let mut next = Some(self.list_url(entity_type, None)?);

        for _ in 0..MAX_PAGES {
            let Some(url) = next.take() else {
                return Ok(rows);
            };
            let page = self.fetch_page(token, url).await?;

            for item in page.items {
                match payload_from_wire(entity_type, item) {
                    Ok(row) => rows.push(row),
                    Err(e) => tracing::warn!(%entity_type, "Skipping unreadable remote row: {}", e),
                }
            }
            next = page.next;
        }

        Err(too_many_pages())
    }
}

/// Upper bound on pages followed by one listing.
const MAX_PAGES: usize = 1000;

/// One page of a list endpoint.
struct ListPage {
    items: Vec<Value>,
    next: Option<Url>,
}

impl HttpRemoteApi {
    fn list_url(&self, entity_type: EntityType, search: Option<&str>) -> Result<Url, RemoteError> {
        let mut url = Url::parse(&self.collection_url(entity_type))
            .map_err(|e| RemoteError::Unavailable(format!("invalid server url: {}", e)))?;
        if let Some(search) = search {
            url.query_pairs_mut().append_pair("search", search);
        }
        Ok(url)
    }

    async fn fetch_page(&self, token: &str, url: Url) -> Result<ListPage, RemoteError> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            return Err(classify_failure(status, &body, None));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::MalformedResponse(e.to_string()))?;

        // Paginated endpoints wrap the list in `results` and link the next
        // page, absolute or relative to the current one
        match body {
            Value::Array(items) => Ok(ListPage { items, next: None }),
            Value::Object(mut fields) => {
                let Some(Value::Array(items)) = fields.remove("results") else {
                    return Err(RemoteError::MalformedResponse("expected a list".to_string()));
                };
                let next = fields
                    .get("next")
                    .and_then(Value::as_str)
                    .map(|link| url.join(link))
                    .transpose()
                    .map_err(|e| RemoteError::MalformedResponse(format!("bad next link: {}", e)))?;
                Ok(ListPage { items, next })
            }
            _ => Err(RemoteError::MalformedResponse("expected a list".to_string())),
        }
    }
}

fn too_many_pages() -> RemoteError {
    RemoteError::MalformedResponse(format!("listing exceeded {} pages", MAX_PAGES))
}

#[derive(Debug, Deserialize)]
struct InstitutionRow {
    id: i64,
    codigo: String,
    nombre: String,
    #[serde(default)]
    tipo: String,
    direccion: Option<String>,
    barrio: Option<String>,
    comuna: Option<String>,
    #[serde(default = "active_by_default")]
    activo: bool,
}

fn active_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct VisitRow {
    id: i64,
    institucion: i64,
    fecha: NaiveDate,
    tipo_comida: MealType,
    observaciones: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DishRow {
    id: i64,
    visita: i64,
    nombre: String,
    tipo_plato: Option<String>,
    porciones_servidas: Option<i32>,
    notas: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IngredientRow {
    id: i64,
    plato: i64,
    alimento: i64,
    cantidad: f64,
    unidad: String,
}

/// Decodes one row of a list response into the server's id and the payload
/// it describes. The inverse of [`wire_body`].
pub fn payload_from_wire(
    entity_type: EntityType,
    row: Value,
) -> Result<(RemoteId, Payload), serde_json::Error> {
    let decoded = match entity_type {
        EntityType::Institution => {
            let row: InstitutionRow = serde_json::from_value(row)?;
            let institution = Institution {
                code: row.codigo,
                name: row.nombre,
                kind: row.tipo,
                address: row.direccion,
                neighborhood: row.barrio,
                district: row.comuna,
                active: row.activo,
            };
            (RemoteId(row.id), institution.into())
        }
        EntityType::Visit => {
            let row: VisitRow = serde_json::from_value(row)?;
            let visit = Visit {
                institution: ParentRef::Remote(RemoteId(row.institucion)),
                date: row.fecha,
                meal_type: row.tipo_comida,
                notes: row.observaciones,
            };
            (RemoteId(row.id), visit.into())
        }
        EntityType::Dish => {
            let row: DishRow = serde_json::from_value(row)?;
            let dish = Dish {
                visit: ParentRef::Remote(RemoteId(row.visita)),
                name: row.nombre,
                dish_type: row.tipo_plato,
                servings: row.porciones_servidas,
                notes: row.notas,
            };
            (RemoteId(row.id), dish.into())
        }
        EntityType::Ingredient => {
            let row: IngredientRow = serde_json::from_value(row)?;
            let ingredient = Ingredient {
                dish: ParentRef::Remote(RemoteId(row.plato)),
                food_code: row.alimento,
                quantity: row.cantidad,
                unit: row.unidad,
            };
            (RemoteId(row.id), ingredient.into())
        }
    };
    Ok(decoded)
}

/// Flat JSON body for a create call, using the remote field names.
pub fn wire_body(payload: &Payload) -> Value {
    match payload {
        Payload::Institution(institution) => json!({
            "codigo": institution.code,
            "nombre": institution.name,
            "tipo": institution.kind,
            "direccion": institution.address,
            "barrio": institution.neighborhood,
            "comuna": institution.district,
            "activo": institution.active,
        }),
        Payload::Visit(visit) => json!({
            "institucion": visit.institution.wire_value(),
            "fecha": visit.date.format("%Y-%m-%d").to_string(),
            "tipo_comida": visit.meal_type.to_string(),
            "observaciones": visit.notes,
        }),
        Payload::Dish(dish) => json!({
            "visita": dish.visit.wire_value(),
            "nombre": dish.name,
            "tipo_plato": dish.dish_type,
            "porciones_servidas": dish.servings,
            "notas": dish.notes,
        }),
        Payload::Ingredient(ingredient) => json!({
            "plato": ingredient.dish.wire_value(),
            "alimento": ingredient.food_code,
            "cantidad": ingredient.quantity,
            "unidad": ingredient.unit,
        }),
    }
}

fn transport_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Unavailable(e.to_string())
    }
}

/// Maps a non-2xx response onto the error taxonomy.
fn classify_failure(
    status: StatusCode,
    body: &Value,
    natural_key: Option<&NaturalKey>,
) -> RemoteError {
    match status.as_u16() {
        401 | 403 => RemoteError::Unauthorized,
        408 => RemoteError::Timeout,
        409 => conflict_for(natural_key),
        400 if is_uniqueness_violation(body, natural_key) => conflict_for(natural_key),
        429 | 500..=599 => RemoteError::Unavailable(format!("server returned {}", status)),
        code => RemoteError::Rejected {
            status: code,
            message: describe_error_body(body),
        },
    }
}

fn conflict_for(natural_key: Option<&NaturalKey>) -> RemoteError {
    match natural_key {
        Some(key) => RemoteError::Conflict {
            field: key.field.to_string(),
            value: key.value.clone(),
        },
        None => RemoteError::Conflict {
            field: "unknown".to_string(),
            value: String::new(),
        },
    }
}

/// Validation bodies look like `{"codigo": ["... already exists."]}`.
fn is_uniqueness_violation(body: &Value, natural_key: Option<&NaturalKey>) -> bool {
    let Some(key) = natural_key else {
        return false;
    };
    let Some(messages) = body.get(key.field) else {
        return false;
    };

    let texts: Vec<String> = match messages {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect(),
        Value::String(s) => vec![s.to_lowercase()],
        _ => Vec::new(),
    };

    texts
        .iter()
        .any(|t| t.contains("already exists") || t.contains("ya existe") || t.contains("unique"))
}

/// Flattens a validation body into `field: message; field: message`.
fn describe_error_body(body: &Value) -> String {
    match body {
        Value::Object(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(field, value)| match value {
                    Value::Array(items) => {
                        let messages: Vec<String> = items
                            .iter()
                            .map(|m| {
                                m.as_str()
                                    .map(str::to_string)
                                    .unwrap_or_else(|| m.to_string())
                            })
                            .collect();
                        format!("{}: {}", field, messages.join(", "))
                    }
                    Value::String(s) => format!("{}: {}", field, s),
                    other => format!("{}: {}", field, other),
                })
                .collect();
            parts.join("; ")
        }
        Value::Null => "no details".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
