// Placerank - Keyword Rank-Tracking Core
//
// This crate provides the rank-tracking backend: batch dispatch of keyword
// tracking work to external queue workers, in-process job lifecycle tracking,
// and real-time progress streaming to dashboard observers over SSE.

pub mod config;
pub mod kernel;
pub mod server;

pub use config::*;
