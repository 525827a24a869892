//! HTTP API for document indexing, retrieval, and extraction

pub mod ask;
pub mod documents;
pub mod extract;
pub mod form;
pub mod models;
pub mod routes;

pub use models::{ApiError, ErrorResponse};
pub use routes::build_router;
