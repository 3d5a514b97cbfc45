#![doc = "group-snapshot-core: core logic library for group-snapshot."]

//! This crate holds the data model, collaborator contracts and the document assembly
//! pipeline for group-snapshot. It performs no network I/O itself: the directory and the
//! blob store are reached through the traits in [`contract`].
//!
//! # Usage
//! Depend on this crate from any binary that provides concrete [`contract::DirectoryClient`]
//! and [`contract::BlobPublisher`] implementations, then call [`snapshot::snapshot`].

pub mod assemble;
pub mod contract;
pub mod error;
pub mod model;
pub mod query;
pub mod snapshot;
