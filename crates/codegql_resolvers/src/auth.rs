//! Actor checks.

use crate::services::Services;
use codegql_backend::types::User;
use codegql_core::{GqlError, GqlResult, RequestContext};

/// Loads the user behind the current actor, if any.
pub(crate) async fn current_user(
    services: &Services,
    ctx: &RequestContext,
) -> GqlResult<Option<User>> {
    match ctx.actor().uid {
        Some(uid) => crate::loader::load_user(services, ctx, uid).await,
        None => Ok(None),
    }
}

/// Returns true for internal actors and site admins.
pub(crate) async fn is_site_admin(services: &Services, ctx: &RequestContext) -> bool {
    if ctx.actor().is_internal() {
        return true;
    }
    matches!(current_user(services, ctx).await, Ok(Some(user)) if user.site_admin)
}

pub(crate) async fn check_site_admin(services: &Services, ctx: &RequestContext) -> GqlResult<()> {
    if ctx.actor().is_internal() {
        return Ok(());
    }
    if !ctx.actor().is_authenticated() {
        return Err(GqlError::unauthenticated());
    }
    if is_site_admin(services, ctx).await {
        Ok(())
    } else {
        Err(GqlError::forbidden("must be site admin"))
    }
}

/// Passes for the user `user_id` itself and for site admins.
pub(crate) async fn check_same_user_or_site_admin(
    services: &Services,
    ctx: &RequestContext,
    user_id: i32,
) -> GqlResult<()> {
    if ctx.actor().uid == Some(user_id) {
        return Ok(());
    }
    if !ctx.actor().is_authenticated() {
        return Err(GqlError::unauthenticated());
    }
    if is_site_admin(services, ctx).await {
        Ok(())
    } else {
        Err(GqlError::forbidden(
            "must be authenticated as the authorized user or site admin",
        ))
    }
}
