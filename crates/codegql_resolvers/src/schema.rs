//! Request execution against the query and mutation roots.

use crate::loader::UserLoader;
use crate::mutation::MutationRoot;
use crate::query::QueryRoot;
use crate::services::Services;
use codegql_core::{resolve_object, FieldError, GqlError, RequestContext, Selection};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Which root a request selects from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    #[default]
    Query,
    Mutation,
}

impl OperationType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
        }
    }
}

/// A request: an operation type plus a JSON selection tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub operation: OperationType,
    pub selection: Value,
}

impl Request {
    pub fn query(selection: Value) -> Self {
        Self {
            operation: OperationType::Query,
            selection,
        }
    }

    pub fn mutation(selection: Value) -> Self {
        Self {
            operation: OperationType::Mutation,
            selection,
        }
    }
}

/// The response body: resolved data plus every field error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl Response {
    /// A response for a request that failed before any field resolved.
    pub fn from_error(err: GqlError) -> Self {
        Self {
            data: Value::Null,
            errors: vec![FieldError::from_error(err, Vec::new())],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The executable schema.
#[derive(Debug, Clone)]
pub struct Schema {
    services: Arc<Services>,
}

impl Schema {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Executes `request` as the actor in `ctx`.
    ///
    /// Field errors never abort the request: the failed field is `null` and
    /// the error is reported with its path.
    pub async fn execute(&self, request: Request, mut ctx: RequestContext) -> Response {
        let selection = match Selection::parse(&request.selection) {
            Ok(selection) if selection.is_empty() => {
                return Response::from_error(GqlError::bad_request("empty selection"));
            }
            Ok(selection) => selection,
            Err(err) => return Response::from_error(err),
        };
        ctx.data_mut()
            .insert(UserLoader::new(self.services.db.clone()));

        let span = info_span!(
            "execute",
            operation = request.operation.as_str(),
            actor = ?ctx.actor().uid,
        );
        let data = async {
            match request.operation {
                OperationType::Query => {
                    let root = QueryRoot::new(self.services.clone());
                    resolve_object(&root, &selection, &ctx).await
                }
                OperationType::Mutation => {
                    let root = MutationRoot::new(self.services.clone());
                    resolve_object(&root, &selection, &ctx).await
                }
            }
        }
        .instrument(span)
        .await;

        let errors = ctx.take_errors();
        debug!(errors = errors.len(), "request executed");
        Response { data, errors }
    }
}
