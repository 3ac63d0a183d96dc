//! API Module
//!
//! HTTP handlers and routing for the cache admin API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache statistics
//! - `PUT /entries` - Write an entry
//! - `GET /entries/:key` - Read an entry
//! - `DELETE /entries/:key` - Delete an entry
//! - `POST /tags/:tag/invalidate` - Invalidate by tag
//! - `POST /clear` - Clear the cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
