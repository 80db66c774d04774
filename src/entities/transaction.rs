//! Transaction entity - Represents every money movement in the ledger.
//!
//! A transaction with `split_type` other than `none` and no `parent_transaction_id`
//! is a *parent split*: its amount is divided among people, recorded as ordered
//! rows in `split_shares` and as one child transaction per non-zero share.
//! Children point back through `parent_transaction_id` and never move account
//! balances. Rows are soft-deleted through `deleted_at` and kept for audit.

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of the money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
    #[sea_orm(string_value = "transfer")]
    Transfer,
}

/// Lifecycle state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Cancelled transactions never moved money and are ignored by every aggregate
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// How the amount of a parent split is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    /// Plain transaction or split child
    #[sea_orm(string_value = "none")]
    #[serde(rename = "none")]
    NotSplit,
    #[sea_orm(string_value = "equal")]
    Equal,
    #[sea_orm(string_value = "percentage")]
    Percentage,
    #[sea_orm(string_value = "custom")]
    Custom,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user account
    pub owner_id: String,
    /// Account the money moved through
    pub account_id: i64,
    /// Destination account of a transfer
    pub transfer_to_account_id: Option<i64>,
    /// Income, expense or transfer
    pub transaction_type: TransactionType,
    /// Positive amount in minor units of `currency`
    pub amount_minor: i64,
    /// ISO 4217 code, always equal to the account currency
    pub currency: String,
    /// Human-readable description
    pub description: String,
    /// Optional category name
    pub category: Option<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Payer of a parent split, participant of a child, counterparty otherwise.
    /// `None` on a parent split means the owner paid.
    pub person_id: Option<i64>,
    /// Value date
    pub date: NaiveDate,
    /// Pending, completed or cancelled
    pub status: TransactionStatus,
    /// Set on split children
    pub parent_transaction_id: Option<i64>,
    /// Group tag
    pub group_id: Option<i64>,
    /// Settlement this row belongs to: the settlement's cash movement, or a
    /// split child that the settlement paid off
    pub settlement_id: Option<i64>,
    /// `none` for plain transactions and children
    pub split_type: SplitType,
    /// Client-generated key making split creation retry-safe
    pub idempotency_key: Option<String>,
    /// Soft-delete marker
    pub deleted_at: Option<DateTimeUtc>,
    /// When the transaction was created
    pub created_at: DateTimeUtc,
    /// When the transaction was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// True for a live parent split.
    #[must_use]
    pub fn is_split_parent(&self) -> bool {
        self.split_type != SplitType::NotSplit && self.parent_transaction_id.is_none()
    }
}

/// Defines relationships between Transaction and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transaction belongs to one account
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id"
    )]
    Account,
    /// A parent split has many share rows
    #[sea_orm(has_many = "super::split_share::Entity")]
    SplitShares,
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::split_share::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SplitShares.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
