//! Core business logic - framework-agnostic ledger, split, balance, settlement
//! and group operations. Every function takes a database connection and the
//! owner id it is scoped to.

pub mod account;
pub mod balance;
pub mod group;
pub mod money;
pub mod party;
pub mod person;
pub mod settlement;
pub mod split;
pub mod transaction;
