//! # EstateX API
//!
//! REST endpoints for price estimates and property recommendations.

pub mod rest;

pub use rest::{configure, RestApi};
