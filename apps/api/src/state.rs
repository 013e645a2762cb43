use castellan_application::{SecurityAdminService, SessionService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub security_admin_service: SecurityAdminService,
    pub session_service: SessionService,
}
