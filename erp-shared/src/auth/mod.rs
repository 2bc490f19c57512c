//! Authentication
//!
//! Thin JWT support: token issuance and validation for HS256 access tokens
//! ([`jwt`]) and bearer token checks that turn a request into an
//! [`AuthContext`](middleware::AuthContext) ([`middleware`]). Login and token
//! issuance flows live outside this service.

pub mod jwt;
pub mod middleware;
