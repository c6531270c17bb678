//! Data Transfer Objects for REST request/response serialization.
//!
//! Request DTOs convert into service inputs; response DTOs are built from
//! domain records so handlers never serialize storage types directly.

pub mod boost_dto;
pub mod common_dto;
pub mod ledger_dto;

pub use boost_dto::*;
pub use common_dto::*;
pub use ledger_dto::*;
