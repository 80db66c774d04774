//! Person entity - A party who can owe or be owed money.
//!
//! People are not system users. They carry optional spending limits: one
//! overall limit on the person row and any number of per-category limits in
//! `person_limits`, all expressed in `limit_currency`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Relationship of the person to the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "lowercase")]
pub enum PersonKind {
    #[sea_orm(string_value = "child")]
    Child,
    #[sea_orm(string_value = "friend")]
    Friend,
    #[sea_orm(string_value = "employee")]
    Employee,
    #[sea_orm(string_value = "family")]
    Family,
    #[sea_orm(string_value = "other")]
    Other,
}

/// Window a spending limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum LimitPeriod {
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

impl LimitPeriod {
    /// Lowercase name, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

/// Person database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "people")]
pub struct Model {
    /// Unique identifier for the person
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user account
    pub owner_id: String,
    /// Display name
    pub name: String,
    /// Relationship to the owner
    pub kind: PersonKind,
    /// Free-form notes
    pub notes: Option<String>,
    /// Overall spending limit in minor units of `limit_currency`
    pub overall_limit_minor: Option<i64>,
    /// Period of the overall limit
    pub limit_period: Option<LimitPeriod>,
    /// Currency every limit of this person is expressed in
    pub limit_currency: Option<String>,
    /// Deleted people are deactivated, never removed
    pub is_active: bool,
    /// When the person was created
    pub created_at: DateTimeUtc,
    /// When the person was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Person and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One person has many category limits
    #[sea_orm(has_many = "super::person_limit::Entity")]
    CategoryLimits,
}

impl Related<super::person_limit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CategoryLimits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
