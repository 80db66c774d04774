//! Per-category spending limit of a person.

use super::person::LimitPeriod;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category limit database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "person_limits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Person the limit belongs to
    pub person_id: i64,
    /// Category name the limit applies to
    pub category: String,
    /// Limit in minor units of the person's `limit_currency`
    pub amount_minor: i64,
    /// Window the limit applies to
    pub period: LimitPeriod,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::PersonId",
        to = "super::person::Column::Id",
        on_delete = "Cascade"
    )]
    Person,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Person.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
