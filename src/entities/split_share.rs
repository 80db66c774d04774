//! Split share entity - One line of a parent split's breakdown.
//!
//! Shares are ordered by `position`, the participant's index in the request,
//! which is what remainder distribution is keyed on.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Split share database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "split_shares")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Parent split transaction
    pub transaction_id: i64,
    /// Participant, `None` for the owner's own share
    pub person_id: Option<i64>,
    /// Index of the participant in the split request
    pub position: i32,
    /// Share in minor units of the parent currency
    pub amount_minor: i64,
    /// Requested percentage for percentage splits, as decimal text
    pub percentage: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transaction::Entity",
        from = "Column::TransactionId",
        to = "super::transaction::Column::Id",
        on_delete = "Cascade"
    )]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
