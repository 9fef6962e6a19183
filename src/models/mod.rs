//! Request and response bodies for the HTTP API.

pub mod requests;
pub mod responses;

pub use requests::{RequestedTtl, SetRequest};
pub use responses::{
    DefragResponse, ErrorResponse, GetResponse, HealthResponse, KeyResponse, StatsResponse,
};
