//! Domain Layer
//!
//! Contains entities, value objects, repository traits, the token codec
//! and the declared operation registry.

pub mod entity;
pub mod operation;
pub mod repository;
pub mod token;
pub mod value_object;

// Re-exports
pub use entity::{
    permission::Permission, principal::Principal, role::Role, user::User,
};
pub use operation::{Operation, OperationRegistry, Surface};
pub use repository::{PermissionRepository, RoleRepository, UserRepository};
pub use token::{Claims, TokenCodec, TokenKind};
