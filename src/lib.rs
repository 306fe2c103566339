//! Sankhya Portal API Library
//!
//! This library provides the core functionality for the Sankhya portal backend,
//! including the authenticated gateway to the Sankhya REST services, ERP query
//! construction, response decoding, data models, and HTTP handlers.
//!
//! # Modules
//!
//! - `auth`: ERP login and session-token caching.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `flatten`: Decoding of the gateway's positional entity responses.
//! - `gateway`: Authenticated client for the Sankhya service endpoints.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `query`: Criteria strings and service payload builders.
//! - `services`: Domain services (receivables, partners, products, activities, sellers).
//! - `ttl_cache`: Clock-driven TTL cache with checksummed entries.

// Re-export primary modules for shared use in tests
pub mod auth;
pub mod config;
pub mod errors;
pub mod flatten;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod query;
pub mod services;
pub mod ttl_cache;
