//! Settlement entity - A recorded payment from one party to another.
//!
//! A `None` person id on either side stands for the owning user. Status moves
//! `pending -> settled` or `pending -> cancelled`, both terminal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settlement lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "settled")]
    Settled,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Settled => "settled",
            Self::Cancelled => "cancelled",
        })
    }
}

/// How the money changed hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum SettlementMethod {
    #[sea_orm(string_value = "bank")]
    Bank,
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Settlement database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    /// Unique identifier for the settlement
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user account
    pub owner_id: String,
    /// Paying person, `None` for the owner
    pub from_person_id: Option<i64>,
    /// Receiving person, `None` for the owner
    pub to_person_id: Option<i64>,
    /// Positive amount in minor units of `currency`
    pub amount_minor: i64,
    /// ISO 4217 code
    pub currency: String,
    /// Pending, settled or cancelled
    pub status: SettlementStatus,
    /// Bank, cash or other
    pub method: Option<SettlementMethod>,
    /// When the payment happened; stamped on settle
    pub settlement_date: Option<DateTimeUtc>,
    /// Free-form notes
    pub notes: Option<String>,
    /// Transaction recording the cash movement, if one was created
    pub transaction_id: Option<i64>,
    /// When the settlement was recorded
    pub created_at: DateTimeUtc,
    /// When the settlement last changed state
    pub updated_at: DateTimeUtc,
}

/// Settlements reference people and transactions by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
