//! Request-scoped context: the acting user, headers, typed data and the
//! response path/error sink used while a selection is resolved.

use crate::error::{FieldError, GqlError, PathSegment};
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// The user (or internal caller) a request acts on behalf of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actor {
    pub uid: Option<i32>,
    pub internal: bool,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(uid: i32) -> Self {
        Self {
            uid: Some(uid),
            internal: false,
        }
    }

    /// An internal service actor, which bypasses per-user checks.
    pub fn internal() -> Self {
        Self {
            uid: None,
            internal: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.uid.is_some()
    }

    pub fn is_internal(&self) -> bool {
        self.internal
    }
}

/// TypeId-keyed storage for request-scoped data.
#[derive(Default)]
pub struct TypedContext {
    data: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl TypedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.data
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.data.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for TypedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedContext")
            .field("data_count", &self.data.len())
            .finish()
    }
}

/// Everything a resolver can see about the current request.
#[derive(Default)]
pub struct RequestContext {
    actor: Actor,
    headers: HashMap<String, String>,
    data: TypedContext,
    path: Mutex<Vec<PathSegment>>,
    errors: Mutex<Vec<FieldError>>,
}

impl RequestContext {
    pub fn new(actor: Actor) -> Self {
        Self {
            actor,
            ..Self::default()
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    /// Adds a header and returns self. Header names are stored lowercase.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Adds typed data and returns self.
    #[must_use]
    pub fn with<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.data.insert(value);
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn data(&self) -> &TypedContext {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut TypedContext {
        &mut self.data
    }

    /// Pushes a segment onto the current response path.
    pub fn push_path(&self, segment: PathSegment) {
        self.path
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(segment);
    }

    pub fn pop_path(&self) {
        self.path.lock().unwrap_or_else(|e| e.into_inner()).pop();
    }

    pub fn current_path(&self) -> Vec<PathSegment> {
        self.path.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Records a field error at the current path.
    pub fn record_error(&self, err: GqlError) {
        let field_error = FieldError::from_error(err, self.current_path());
        self.errors
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(field_error);
    }

    pub fn errors(&self) -> Vec<FieldError> {
        self.errors.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn take_errors(&self) -> Vec<FieldError> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("actor", &self.actor)
            .field("headers", &self.headers)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Marker(u8);

    #[test]
    fn test_typed_context() {
        let mut data = TypedContext::new();
        assert!(data.insert(Marker(1)).is_none());
        assert_eq!(data.insert(Marker(2)), Some(Marker(1)));
        assert_eq!(data.get::<Marker>(), Some(&Marker(2)));
        assert!(data.get::<String>().is_none());
        assert_eq!(data.remove::<Marker>(), Some(Marker(2)));
        assert!(!data.contains::<Marker>());
    }

    #[test]
    fn test_headers_case_insensitive() {
        let ctx = RequestContext::new(Actor::user(1)).with_header("X-Actor-UID", "1");
        assert_eq!(ctx.header("x-actor-uid"), Some("1"));
        assert!(ctx.actor().is_authenticated());
    }

    #[test]
    fn test_errors_record_current_path() {
        let ctx = RequestContext::new(Actor::anonymous());
        ctx.push_path(PathSegment::Field("users".into()));
        ctx.push_path(PathSegment::Index(2));
        ctx.record_error(GqlError::forbidden("nope"));
        ctx.pop_path();
        ctx.pop_path();
        let errors = ctx.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].path,
            vec![PathSegment::Field("users".into()), PathSegment::Index(2)]
        );
        assert!(ctx.errors().is_empty());
        assert!(ctx.current_path().is_empty());
    }
}
