//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and the gate middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::AuthAppState;
pub use middleware::{
    GateState, NEW_ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER, require_permission_api,
    require_permission_web,
};
pub use router::{auth_operations, auth_router, auth_router_generic};
