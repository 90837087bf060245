use super::client::RemoteClient;
use crate::adapter::{Creatable, Deletable, Updatable};
use crate::error::{ApplyError, ApplyResult, LoadError, PermanentKind, RemoteError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use ssot_model::{Attributes, FieldValue, Handle, IdentityKey, ModelError, Record, RecordType};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Binds a record type to a REST collection path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub record_type: String,
    /// Collection path with trailing slash, e.g. `/api/ipam/vlans/`.
    pub path: String,
    /// Field name to request body key.
    pub wire_names: BTreeMap<String, String>,
    /// Fields carried as API choices, `{"value": .., "label": ..}` on read.
    pub choices: BTreeSet<String>,
}

impl CollectionSpec {
    pub fn new(record_type: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            record_type: record_type.into(),
            path: path.into(),
            wire_names: BTreeMap::new(),
            choices: BTreeSet::new(),
        }
    }

    /// Sends `field` as `wire_name` in create and update bodies.
    pub fn rename(mut self, field: impl Into<String>, wire_name: impl Into<String>) -> Self {
        self.wire_names.insert(field.into(), wire_name.into());
        self
    }

    /// Binds `field` to the choice stored under `wire_name`.
    ///
    /// Reads resolve to the choice label (or `name` where the API nests a
    /// related object instead). Writes send the lower-cased label, which is
    /// the choice value.
    pub fn choice(mut self, field: impl Into<String>, wire_name: impl Into<String>) -> Self {
        let field = field.into();
        self.choices.insert(field.clone());
        self.rename(field, wire_name)
    }

    pub fn wire_name<'a>(&'a self, field: &'a str) -> &'a str {
        self.wire_names.get(field).map(String::as_str).unwrap_or(field)
    }

    pub fn item_path(&self, handle: &Handle) -> String {
        format!("{}{}/", self.path, handle)
    }
}

#[derive(Debug, Deserialize)]
struct Page {
    results: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
}

/// A bound collection with CRUD against the remote API.
pub(crate) struct RemoteCollection {
    pub(crate) spec: CollectionSpec,
    pub(crate) record_type: Arc<RecordType>,
    pub(crate) client: Arc<RemoteClient>,
}

impl RemoteCollection {
    /// Reads every page of the collection.
    pub(crate) async fn fetch_all(&self) -> Result<Vec<Map<String, Value>>, RemoteError> {
        let mut items = Vec::new();
        let mut url = self.client.first_page(&self.spec.path);
        let mut pages = 0usize;
        let mut visited = HashSet::from([url.clone()]);

        loop {
            let body = self.client.get_json(&url).await?;
            let page: Page = serde_json::from_value(body).map_err(|e| RemoteError::Decode {
                url: url.clone(),
                reason: format!("not a paginated collection: {e}"),
            })?;
            pages += 1;

            for item in page.results {
                match item {
                    Value::Object(map) => items.push(map),
                    other => {
                        return Err(RemoteError::Decode {
                            url,
                            reason: format!("collection item is not an object: {other}"),
                        });
                    }
                }
            }

            match page.next.filter(|next| !next.is_empty()) {
                Some(next) => {
                    let next = self.client.cursor(&url, &next)?;
                    if !visited.insert(next.clone()) {
                        return Err(RemoteError::Decode {
                            url,
                            reason: format!("pagination cursor revisits `{next}`"),
                        });
                    }
                    url = next;
                }
                None => break,
            }
        }

        debug!(
            record_type = %self.spec.record_type,
            pages,
            count = items.len(),
            "fetched remote collection"
        );
        Ok(items)
    }

    /// Projects one API object into a record and its handle.
    pub(crate) fn decode(&self, item: &Map<String, Value>) -> Result<(Record, Handle), LoadError> {
        let handle = handle_of(item.get("id")).ok_or_else(|| ModelError::MalformedRecord {
            record_type: self.record_type.name().to_string(),
            field: "id".into(),
            reason: "is required but missing".into(),
        })?;
        let record = Record::from_raw(&self.record_type, &self.read_choices(item))?;
        Ok((record, handle))
    }

    /// Flattens choice objects to their label under the declared field name.
    fn read_choices<'a>(&self, item: &'a Map<String, Value>) -> Cow<'a, Map<String, Value>> {
        if self.spec.choices.is_empty() {
            return Cow::Borrowed(item);
        }
        let mut raw = item.clone();
        for field in &self.spec.choices {
            let value = match item.get(self.spec.wire_name(field)) {
                Some(Value::Object(choice)) => choice
                    .get("label")
                    .or_else(|| choice.get("name"))
                    .cloned()
                    .unwrap_or_else(|| Value::Object(choice.clone())),
                Some(other) => other.clone(),
                None => Value::Null,
            };
            raw.insert(field.clone(), value);
        }
        Cow::Owned(raw)
    }

    fn body<'a>(&self, fields: impl Iterator<Item = (&'a str, &'a FieldValue)>) -> Value {
        let map: Map<String, Value> = fields
            .map(|(field, value)| {
                let json = match value {
                    FieldValue::Text(label) if self.spec.choices.contains(field) => {
                        Value::String(label.to_lowercase())
                    }
                    other => other.to_json(),
                };
                (self.spec.wire_name(field).to_string(), json)
            })
            .collect();
        Value::Object(map)
    }
}

fn handle_of(id: Option<&Value>) -> Option<Handle> {
    match id? {
        Value::Number(n) => n.as_i64().map(Handle::from),
        Value::String(s) if !s.is_empty() => Some(Handle::new(s.as_str())),
        _ => None,
    }
}

#[async_trait]
impl Creatable for RemoteCollection {
    async fn create(&self, identity: &IdentityKey, attributes: &Attributes) -> ApplyResult<Handle> {
        let body = self.body(
            identity
                .fields()
                .chain(attributes.iter().map(|(k, v)| (k.as_str(), v))),
        );
        let created = self.client.post_json(&self.spec.path, &body).await?;
        handle_of(created.get("id")).ok_or_else(|| {
            ApplyError::permanent(PermanentKind::Decode, "create response carries no `id`")
        })
    }
}

#[async_trait]
impl Updatable for RemoteCollection {
    async fn update(&self, handle: &Handle, changed: &Attributes) -> ApplyResult<()> {
        let body = self.body(changed.iter().map(|(k, v)| (k.as_str(), v)));
        self.client
            .patch_json(&self.spec.item_path(handle), &body)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Deletable for RemoteCollection {
    async fn delete(&self, handle: &Handle) -> ApplyResult<()> {
        self.client.delete(&self.spec.item_path(handle)).await?;
        Ok(())
    }
}
