//! Validation modules

pub mod schema;

pub use schema::validate_generation_result;
