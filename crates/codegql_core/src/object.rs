//! Selection trees and field dispatch.
//!
//! Queries arrive as an already-parsed selection tree. Each GraphQL type is an
//! [`Object`] that resolves one field at a time; [`resolve_object`] walks the
//! selection, collects field errors into the request context and nulls the
//! failed fields so sibling fields still resolve.

use crate::context::RequestContext;
use crate::error::{GqlError, GqlResult, PathSegment};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Arguments passed to a field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    args: IndexMap<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds arguments from a JSON object.
    pub fn from_value(value: &Value) -> GqlResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Ok(Self {
                args: map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            }),
            other => Err(GqlError::bad_request(format!(
                "field arguments must be an object, got {}",
                other
            ))),
        }
    }

    /// Adds an argument and returns self.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        self.set(name, serde_json::to_value(value).unwrap_or(Value::Null));
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.args.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Gets an argument as a specific type, ignoring values that do not parse.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.args
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Gets an optional argument. `null` and absent are both `None`.
    pub fn optional<T: DeserializeOwned>(&self, name: &str) -> GqlResult<Option<T>> {
        match self.args.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => serde_json::from_value(v.clone()).map(Some).map_err(|e| {
                GqlError::invalid_argument(format!("invalid value for argument {:?}: {}", name, e))
            }),
        }
    }

    /// Gets a required argument.
    pub fn require<T: DeserializeOwned>(&self, name: &str) -> GqlResult<T> {
        self.optional(name)?.ok_or_else(|| {
            GqlError::invalid_argument(format!("missing required argument {:?}", name))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// One selected field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectedField {
    /// The schema field name. Differs from the response key when aliased.
    pub name: String,
    pub args: Arguments,
    pub selection: Selection,
}

/// A selection set keyed by response key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    fields: IndexMap<String, SelectedField>,
}

const STRUCTURED_KEYS: [&str; 3] = ["args", "fields", "field"];

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a selection from JSON.
    ///
    /// `{"name": true}` selects a leaf. `{"repo": {"name": true}}` selects
    /// nested fields. `{"r": {"field": "repository", "args": {..},
    /// "fields": {..}}}` carries arguments and an alias.
    pub fn parse(value: &Value) -> GqlResult<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(GqlError::bad_request(format!(
                    "selection must be an object, got {}",
                    other
                )))
            }
        };

        let mut fields = IndexMap::new();
        for (key, entry) in map {
            let field = match entry {
                Value::Bool(true) => SelectedField {
                    name: key.clone(),
                    ..SelectedField::default()
                },
                Value::Bool(false) => continue,
                Value::Object(inner) if is_structured(inner) => SelectedField {
                    name: match inner.get("field") {
                        Some(Value::String(name)) => name.clone(),
                        Some(other) => {
                            return Err(GqlError::bad_request(format!(
                                "selection field name must be a string, got {}",
                                other
                            )))
                        }
                        None => key.clone(),
                    },
                    args: Arguments::from_value(inner.get("args").unwrap_or(&Value::Null))?,
                    selection: Self::parse(inner.get("fields").unwrap_or(&Value::Null))?,
                },
                Value::Object(_) => SelectedField {
                    name: key.clone(),
                    args: Arguments::default(),
                    selection: Self::parse(entry)?,
                },
                other => {
                    return Err(GqlError::bad_request(format!(
                        "invalid selection for {:?}: {}",
                        key, other
                    )))
                }
            };
            fields.insert(key.clone(), field);
        }
        Ok(Self { fields })
    }

    /// Adds a field and returns self.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, field: SelectedField) -> Self {
        self.fields.insert(key.into(), field);
        self
    }


    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Iterates `(response key, field)` pairs in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SelectedField)> {
        self.fields.iter()
    }

    /// Returns true if any selected field has the given schema name.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.values().any(|f| f.name == name)
    }

    /// Returns the first selected field with the given schema name.
    pub fn get(&self, name: &str) -> Option<&SelectedField> {
        self.fields.values().find(|f| f.name == name)
    }
}

fn is_structured(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|k| STRUCTURED_KEYS.contains(&k.as_str()))
}

/// A GraphQL object type.
#[async_trait]
pub trait Object: Send + Sync {
    /// The GraphQL type name, also returned for `__typename`.
    fn type_name(&self) -> &'static str;

    /// Fields resolved when the selection is empty.
    fn default_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// Resolves one field.
    async fn resolve_field(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value>;
}

#[async_trait]
impl Object for Box<dyn Object> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn default_fields(&self) -> &'static [&'static str] {
        (**self).default_fields()
    }

    async fn resolve_field(
        &self,
        field: &str,
        args: &Arguments,
        selection: &Selection,
        ctx: &RequestContext,
    ) -> GqlResult<Value> {
        (**self).resolve_field(field, args, selection, ctx).await
    }
}

/// Resolves `selection` against `obj` into a JSON object.
///
/// Field errors are recorded in `ctx` and the field resolves to `null`.
pub async fn resolve_object<O: Object + ?Sized>(
    obj: &O,
    selection: &Selection,
    ctx: &RequestContext,
) -> Value {
    let mut out = Map::new();
    if selection.is_empty() {
        let empty = Selection::default();
        let no_args = Arguments::default();
        for name in obj.default_fields() {
            let value = resolve_one(obj, name, name, &no_args, &empty, ctx).await;
            out.insert((*name).to_string(), value);
        }
    } else {
        for (key, field) in selection.iter() {
            let value =
                resolve_one(obj, key, &field.name, &field.args, &field.selection, ctx).await;
            out.insert(key.clone(), value);
        }
    }
    Value::Object(out)
}

async fn resolve_one<O: Object + ?Sized>(
    obj: &O,
    key: &str,
    name: &str,
    args: &Arguments,
    selection: &Selection,
    ctx: &RequestContext,
) -> Value {
    if name == "__typename" {
        return Value::String(obj.type_name().to_string());
    }
    ctx.push_path(PathSegment::Field(key.to_string()));
    let value = match obj.resolve_field(name, args, selection, ctx).await {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(
                type_name = obj.type_name(),
                field = name,
                error = %err,
                "field resolution failed"
            );
            ctx.record_error(err);
            Value::Null
        }
    };
    ctx.pop_path();
    value
}

/// Resolves each item of a list.
pub async fn resolve_list<T: Object>(
    items: &[T],
    selection: &Selection,
    ctx: &RequestContext,
) -> Value {
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        ctx.push_path(PathSegment::Index(i));
        out.push(resolve_object(item, selection, ctx).await);
        ctx.pop_path();
    }
    Value::Array(out)
}

/// Resolves a nullable object.
pub async fn resolve_optional<T: Object>(
    item: Option<&T>,
    selection: &Selection,
    ctx: &RequestContext,
) -> Value {
    match item {
        Some(item) => resolve_object(item, selection, ctx).await,
        None => Value::Null,
    }
}

/// Serializes a leaf value.
pub fn to_value<T: Serialize>(value: T) -> GqlResult<Value> {
    serde_json::to_value(value).map_err(GqlError::from)
}

/// An object whose fields are plain JSON values.
#[derive(Debug, Clone)]
pub struct ValueObject {
    type_name: &'static str,
    fields: Map<String, Value>,
}

impl ValueObject {
    /// Wraps a serializable struct. Non-object values produce an empty object.
    pub fn new<T: Serialize>(type_name: &'static str, value: &T) -> GqlResult<Self> {
        let fields = match serde_json::to_value(value)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Self { type_name, fields })
    }
}

#[async_trait]
impl Object for ValueObject {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    async fn resolve_field(
        &self,
        field: &str,
        _args: &Arguments,
        selection: &Selection,
        _ctx: &RequestContext,
    ) -> GqlResult<Value> {
        self.fields
            .get(field)
            .map(|value| project(value, selection))
            .ok_or_else(|| GqlError::field_not_found(self.type_name, field))
    }
}

/// Restricts a JSON value to the selected keys.
fn project(value: &Value, selection: &Selection) -> Value {
    if selection.is_empty() {
        return value.clone();
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, field) in selection.iter() {
                let projected = map
                    .get(&field.name)
                    .map_or(Value::Null, |v| project(v, &field.selection));
                out.insert(key.clone(), projected);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| project(v, selection)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Actor;
    use serde_json::json;

    struct Widget {
        name: &'static str,
        parts: Vec<Widget>,
    }

    #[async_trait]
    impl Object for Widget {
        fn type_name(&self) -> &'static str {
            "Widget"
        }

        fn default_fields(&self) -> &'static [&'static str] {
            &["name"]
        }

        async fn resolve_field(
            &self,
            field: &str,
            args: &Arguments,
            selection: &Selection,
            ctx: &RequestContext,
        ) -> GqlResult<Value> {
            match field {
                "name" => Ok(json!(self.name)),
                "shout" => {
                    let times: usize = args.optional("times")?.unwrap_or(1);
                    Ok(json!(self.name.to_uppercase().repeat(times)))
                }
                "parts" => Ok(resolve_list(&self.parts, selection, ctx).await),
                "broken" => Err(GqlError::internal("boom")),
                _ => Err(GqlError::field_not_found(self.type_name(), field)),
            }
        }
    }

    fn widget() -> Widget {
        Widget {
            name: "root",
            parts: vec![
                Widget {
                    name: "a",
                    parts: vec![],
                },
                Widget {
                    name: "b",
                    parts: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_parse_selection_forms() {
        let selection = Selection::parse(&json!({
            "name": true,
            "loud": {"field": "shout", "args": {"times": 2}},
            "parts": {"name": true},
            "skipped": false
        }))
        .unwrap();
        assert_eq!(selection.len(), 3);
        let loud = selection.get("shout").unwrap();
        assert_eq!(loud.args.require::<usize>("times").unwrap(), 2);
        assert!(selection.get("parts").unwrap().selection.contains("name"));
        assert!(Selection::parse(&json!({"name": 1})).is_err());
    }

    #[tokio::test]
    async fn test_resolve_object_with_alias_and_list() {
        let ctx = RequestContext::new(Actor::anonymous());
        let selection = Selection::parse(&json!({
            "__typename": true,
            "loud": {"field": "shout", "args": {"times": 2}},
            "parts": {"name": true}
        }))
        .unwrap();
        let value = resolve_object(&widget(), &selection, &ctx).await;
        assert_eq!(
            value,
            json!({
                "__typename": "Widget",
                "loud": "ROOTROOT",
                "parts": [{"name": "a"}, {"name": "b"}]
            })
        );
        assert!(ctx.errors().is_empty());
    }

    #[tokio::test]
    async fn test_field_errors_null_the_field() {
        let ctx = RequestContext::new(Actor::anonymous());
        let selection = Selection::parse(&json!({
            "name": true,
            "broken": true,
            "parts": {"missing": true}
        }))
        .unwrap();
        let value = resolve_object(&widget(), &selection, &ctx).await;
        assert_eq!(
            value,
            json!({
                "name": "root",
                "broken": null,
                "parts": [{"missing": null}, {"missing": null}]
            })
        );
        let errors = ctx.errors();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].path, vec![PathSegment::Field("broken".into())]);
        assert_eq!(
            errors[2].path,
            vec![
                PathSegment::Field("parts".into()),
                PathSegment::Index(1),
                PathSegment::Field("missing".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_default_fields() {
        let ctx = RequestContext::new(Actor::anonymous());
        let value = resolve_object(&widget(), &Selection::new(), &ctx).await;
        assert_eq!(value, json!({"name": "root"}));
    }

    #[tokio::test]
    async fn test_value_object_projection() {
        let ctx = RequestContext::new(Actor::anonymous());
        let obj = ValueObject::new(
            "File",
            &json!({"path": "a.txt", "range": {"startLine": 1, "lines": 4}}),
        )
        .unwrap();
        let selection = Selection::parse(&json!({"range": {"lines": true}})).unwrap();
        let value = resolve_object(&obj, &selection, &ctx).await;
        assert_eq!(value, json!({"range": {"lines": 4}}));
    }
}
