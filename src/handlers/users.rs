//! `/api/user` endpoints.

use hyper::StatusCode;
use serde::{Deserialize, Serialize};

use crate::middleware::jwt_auth;
use crate::module::Module;
use crate::route::{GroupRouter, Route, RouteMethod};
use crate::router::{Context, Link, handler};
use crate::user::Service;
use crate::{Error, auth, response};

/// User account endpoints.
pub struct Users {
    users: Service,
}

impl Users {
    pub fn new(users: Service) -> Self {
        Self { users }
    }

    fn public_group(&self) -> GroupRouter {
        GroupRouter::new("/api/user").add_route(
            Route::new("/login", RouteMethod::Post)
                .handle(self.login())
                .with_description("User login"),
        )
    }

    fn account_group(&self) -> GroupRouter {
        GroupRouter::new("/api/user")
            .with_middleware(jwt_auth())
            .add_route(
                Route::new("/logout", RouteMethod::Post)
                    .handle(logout())
                    .with_description("User logout"),
            )
            .add_route(
                Route::new("/info", RouteMethod::Get)
                    .handle(self.info())
                    .with_description("Get user information"),
            )
            .add_route(
                Route::new("/info", RouteMethod::Put)
                    .handle(self.update_info())
                    .with_description("Update user information"),
            )
    }

    fn login(&self) -> Link {
        let users = self.users.clone();
        handler(move |ctx: Context| {
            let users = users.clone();
            async move {
                let req: LoginRequest = ctx.json()?;
                if req.username.is_empty() || req.password.is_empty() {
                    return Err(Error::BadRequest("Invalid request parameters".to_string()));
                }

                let user = match users.authenticate(&req.username, &req.password).await {
                    Ok(user) => user,
                    Err(e) => {
                        tracing::warn!(username = %req.username, "Login failed: {e}");
                        return Err(e);
                    }
                };

                let token = auth::create_token(&ctx.config.auth, user.id)?;
                tracing::info!(user_id = user.id, "User logged in");
                response::ok(
                    "Login successful",
                    &LoginResponse {
                        id: user.id,
                        username: user.username,
                        token: token.value,
                        exp: token.expires_at.as_second(),
                    },
                )
            }
        })
    }

    fn info(&self) -> Link {
        let users = self.users.clone();
        handler(move |ctx: Context| {
            let users = users.clone();
            async move {
                let user = users.get(ctx.require_user_id()?).await?;
                response::ok("Success", &user.sanitize())
            }
        })
    }

    fn update_info(&self) -> Link {
        let users = self.users.clone();
        handler(move |ctx: Context| {
            let users = users.clone();
            async move {
                let user_id = ctx.require_user_id()?;
                let req: UpdateInfoRequest = ctx.json()?;
                let user = users.get(user_id).await?;

                if let Some(new_password) = req.new_password.filter(|p| !p.is_empty()) {
                    let old_password = req
                        .old_password
                        .filter(|p| !p.is_empty())
                        .ok_or_else(|| Error::BadRequest("Old password is required".to_string()))?;
                    match users.change_password(user.id, &old_password, &new_password).await {
                        Ok(()) => tracing::info!(user_id, "Password changed"),
                        Err(Error::InvalidCredentials) => {
                            return Ok(response::error(
                                StatusCode::UNAUTHORIZED,
                                "Invalid old password",
                            ));
                        }
                        Err(e) => return Err(e),
                    }
                }

                if let Some(username) = req.username.filter(|u| !u.is_empty() && *u != user.username) {
                    match users.rename(user.id, &username).await {
                        Ok(()) => tracing::info!(user_id, username = %username, "Username changed"),
                        Err(Error::Conflict(_)) => {
                            return Err(Error::BadRequest("Username already exists".to_string()));
                        }
                        Err(e) => return Err(e),
                    }
                }

                Ok(response::message(
                    StatusCode::OK,
                    "User information updated successfully",
                ))
            }
        })
    }
}

fn logout() -> Link {
    handler(|ctx: Context| async move {
        let user_id = ctx.require_user_id()?;
        tracing::info!(user_id, "User logged out");
        Ok(response::message(StatusCode::OK, "Logout successful"))
    })
}

impl Module for Users {
    fn name(&self) -> &'static str {
        "users"
    }

    fn groups(&self) -> Option<Vec<GroupRouter>> {
        Some(vec![self.public_group(), self.account_group()])
    }
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    id: i64,
    username: String,
    token: String,
    exp: i64,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateInfoRequest {
    #[serde(default)]
    old_password: Option<String>,
    #[serde(default)]
    new_password: Option<String>,
    #[serde(default)]
    username: Option<String>,
}
