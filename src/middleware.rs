//! Chain middleware.

use crate::router::{Link, middleware};

/// Require a valid bearer token and record its user id on the context.
///
/// A missing, malformed, forged or expired token ends the chain with the
/// matching 401 error.
pub fn jwt_auth() -> Link {
    middleware(|mut ctx, next| async move {
        match crate::auth::extract_user_id(&ctx.headers, &ctx.config.auth) {
            Ok(user_id) => {
                ctx.user_id = Some(user_id);
                next.run(ctx).await
            }
            Err(e) => {
                tracing::warn!(path = %ctx.uri.path(), "JWT authentication failed: {e}");
                Err(e)
            }
        }
    })
}
