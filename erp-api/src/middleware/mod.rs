pub mod auth;
pub mod security;
pub mod tenant;
