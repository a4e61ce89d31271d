// =============================================================================
// HTTP API — REST endpoints and bearer authentication
// =============================================================================

pub mod auth;
pub mod rest;
