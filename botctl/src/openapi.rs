//! OpenAPI document assembly.

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::login,
        api::handlers::auth::verify_second_factor,
        api::handlers::auth::logout,
        api::handlers::auth::login_audit_log,
        api::handlers::auth::setup_second_factor,
    ),
    components(schemas(
        api::models::auth::LoginRequest,
        api::models::auth::LoginResponse,
        api::models::auth::SecondFactorRequest,
        api::models::auth::SecondFactorResponse,
        api::models::auth::StatusResponse,
        api::models::auth::SecondFactorSetupResponse,
        crate::db::models::audit_log::LoginAuditEntry,
    )),
    modifiers(&SecurityAddon),
    tags((name = "auth", description = "Administrator authentication"))
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_token",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
        );
    }
}
