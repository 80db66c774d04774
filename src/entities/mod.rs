//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.
//! Money columns hold integer minor units; see [`crate::core::money`].

pub mod account;
pub mod group;
pub mod group_member;
pub mod person;
pub mod person_limit;
pub mod settlement;
pub mod split_share;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use group::{Column as GroupColumn, Entity as Group, Model as GroupModel};
pub use group_member::{
    Column as GroupMemberColumn, Entity as GroupMember, Model as GroupMemberModel,
};
pub use person::{Column as PersonColumn, Entity as Person, Model as PersonModel};
pub use person_limit::{
    Column as PersonLimitColumn, Entity as PersonLimit, Model as PersonLimitModel,
};
pub use settlement::{Column as SettlementColumn, Entity as Settlement, Model as SettlementModel};
pub use split_share::{Column as SplitShareColumn, Entity as SplitShare, Model as SplitShareModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
