use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, patch, post, put};
use castellan_core::AppError;
use tower_http::trace::TraceLayer;

use crate::handlers::{auth, grants, health, permissions, roles, users};
use crate::middleware;
use crate::state::AppState;

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/password", post(auth::change_password_handler))
        .route("/api/authorize", post(users::authorize_handler))
        .route(
            "/api/roles",
            get(roles::list_roles_handler).post(roles::create_role_handler),
        )
        .route("/api/roles/hierarchy", get(roles::role_hierarchy_handler))
        .route(
            "/api/roles/{role_id}",
            get(roles::get_role_handler)
                .patch(roles::update_role_handler)
                .delete(roles::delete_role_handler),
        )
        .route(
            "/api/roles/{role_id}/permissions",
            get(roles::role_permissions_handler),
        )
        .route(
            "/api/permissions",
            get(permissions::list_permissions_handler)
                .post(permissions::create_permission_handler),
        )
        .route(
            "/api/permissions/matrix",
            get(permissions::permission_matrix_handler),
        )
        .route(
            "/api/permissions/{permission_id}",
            put(permissions::update_permission_handler)
                .delete(permissions::delete_permission_handler),
        )
        .route(
            "/api/users/{user_id}/roles",
            get(grants::list_user_roles_handler).post(grants::assign_role_handler),
        )
        .route(
            "/api/users/{user_id}/roles/{role_id}",
            patch(grants::update_role_grant_handler)
                .delete(grants::revoke_role_handler),
        )
        .route(
            "/api/users/{user_id}/permissions",
            get(users::effective_permissions_handler),
        )
        .route(
            "/api/users/{user_id}/scopes",
            get(users::list_user_scopes_handler).put(users::replace_user_scopes_handler),
        )
        .route(
            "/api/users/{user_id}/sessions/revoke",
            post(users::terminate_sessions_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_auth,
        ));

    Ok(Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/login", post(auth::login_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
