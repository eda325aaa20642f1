//! Paginated entity cache and consistency layer for an e-commerce admin
//! dashboard.
//!
//! Each domain (brands, coupons, product variants, order items, user
//! addresses) gets an [`EntityFacade`](facade::EntityFacade) that owns one
//! page of entities plus the entity open in a detail view. Intents dispatch
//! remote calls; their results are folded into the cache in the order they
//! resolve, and derived views (filter, sort, group, format) are memoized on
//! the content they were computed from.

pub mod cache;
pub mod config;
pub mod dashboard;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod facade;
pub mod query;
pub mod service;
pub mod view;

pub use dashboard::Dashboard;
pub use error::{DashError, ServiceError, ValidationError};
