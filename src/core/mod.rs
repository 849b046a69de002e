//! Core building blocks: configuration, corpus discovery, chunking, paths.

pub mod chunker;
pub mod config;
pub mod corpus;
pub mod paths;
