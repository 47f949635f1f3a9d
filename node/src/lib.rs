// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod api;
pub mod server;
pub mod store;
pub mod events;
pub mod stream;
pub mod federation;
pub mod network;
pub mod rate_limit;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;
