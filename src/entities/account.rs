//! Account entity - A bank account or cash wallet that transactions move money through.
//!
//! Balances are stored in integer minor units of the account currency and are
//! only ever changed with atomic `balance = balance + delta` updates.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of money container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Bank account
    #[sea_orm(string_value = "bank")]
    Bank,
    /// Cash wallet
    #[sea_orm(string_value = "cash")]
    Cash,
}

impl AccountKind {
    /// Lowercase name, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Cash => "cash",
        }
    }
}

/// Account database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user account
    pub owner_id: String,
    /// Display name (bank name or wallet name)
    pub name: String,
    /// Bank or cash
    pub kind: AccountKind,
    /// ISO 4217 currency code
    pub currency: String,
    /// Balance the account was opened with, in minor units
    pub opening_balance_minor: i64,
    /// Current balance in minor units
    pub current_balance_minor: i64,
    /// Archived accounts accept no new transactions
    pub is_archived: bool,
    /// When the account was created
    pub created_at: DateTimeUtc,
    /// When the account was last modified
    pub updated_at: DateTimeUtc,
}

/// Accounts are referenced by transactions; the relation is declared on the transaction side.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
