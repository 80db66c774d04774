//! Group entity - A named set of people sharing expenses over a time window.
//!
//! Groups are tags: transactions point at a group through `group_id` and the
//! group summary aggregates over them. Membership lives in `group_members`.

use chrono::NaiveDate;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What the group is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
    #[sea_orm(string_value = "trip")]
    Trip,
    #[sea_orm(string_value = "fees")]
    Fees,
    #[sea_orm(string_value = "event")]
    Event,
    #[sea_orm(string_value = "custom")]
    Custom,
}

/// Group database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    /// Unique identifier for the group
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user account
    pub owner_id: String,
    /// Display name (e.g., "Goa trip")
    pub name: String,
    /// What the group is for
    pub kind: GroupKind,
    /// First day of the group's window
    pub start_date: Option<NaiveDate>,
    /// Last day of the group's window
    pub end_date: Option<NaiveDate>,
    /// Optional budget in minor units of `currency`
    pub budget_minor: Option<i64>,
    /// Currency every group transaction must use
    pub currency: String,
    /// Free-form notes
    pub notes: Option<String>,
    /// Inactive groups are hidden from listings by default
    pub is_active: bool,
    /// When the group was created
    pub created_at: DateTimeUtc,
    /// When the group was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Group and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One group has many member rows
    #[sea_orm(has_many = "super::group_member::Entity")]
    Members,
}

impl Related<super::group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
