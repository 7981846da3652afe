//! Cross-store consistency orchestrator for auction user accounts.
//!
//! The relational write store is authoritative; an identity provider mirrors
//! each user as a login account and a document read model serves queries.
//! Commands run as sagas (`sagas`) that mutate all three within one logical
//! operation; the read model is fed asynchronously through broker events
//! (`events`) applied by projection consumers (`projection`).
//!
//! Layout:
//! - `domain`: the `User` aggregate and its role assignment
//! - `events`: domain events and their queue bindings
//! - `bus`: broker connection sharing and event publishing
//! - `identity`: identity-provider management-API gateway
//! - `storage`: transactional write-store repositories
//! - `readmodel`: denormalized document store
//! - `sagas`: create / update / delete / forgot-password command handlers
//! - `projection`: event consumers keeping the read model in sync
//! - `config`: file/environment configuration

pub mod bus;
pub mod config;
pub mod domain;
pub mod events;
pub mod identity;
pub mod projection;
pub mod readmodel;
pub mod sagas;
pub mod storage;
