//! `chama-core`: shared building blocks for the savings-group identity layer.
//!
//! This crate contains **pure** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod phone;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AssignmentId, PrincipalId, RoleId, SessionId};
pub use phone::PhoneNumber;
pub use value_object::ValueObject;
