//! API Module
//!
//! HTTP façade over a string-keyed slot cache: `PUT /set`, `GET /get/:key`,
//! `DELETE /del/:key`, `GET /stats`, `POST /defrag` and `GET /health`.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
