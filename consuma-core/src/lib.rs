//! Engine crate: the request/callback model, the work function, SSRF
//! defense, the durable store, callback delivery, the queue/worker pool,
//! and configuration. The HTTP surface lives in `consuma-server`, which
//! depends on this crate the way `hook-api`/`hook-worker` depend on
//! `hook-common`.

pub mod callback;
pub mod config;
pub mod error;
pub mod models;
pub mod queue;
pub mod retry;
pub mod ssrf;
pub mod store;
pub mod work;
