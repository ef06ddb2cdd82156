// Copyright (c) 2024 Botho Foundation

//! Leaderboard gateway library.
//!
//! Accumulates per-player scores in an embedded store and relays NFT
//! ownership checks to an EVM chain node, behind a small HTTP API.

pub mod chain;
pub mod config;
pub mod identity;
pub mod rpc;
pub mod service;
pub mod store;
pub mod telemetry;

// Re-export commands module for CLI binary
pub mod commands;
