//! HTTP ingestion API: routes, authentication, rate limiting, DTOs and OpenAPI documentation.

pub mod auth;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod rate_limit;
pub mod routes;
pub mod state;
