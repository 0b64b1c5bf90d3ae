//! Rollcall Core: roster reconciliation, organization membership, webhooks, jobs and storage.

pub mod config;
pub mod connectors;
pub mod db;
pub mod error;
pub mod jobs;
pub mod membership;
pub mod models;
pub mod org;
pub mod reconcile;
pub mod sync;
pub mod webhooks;
