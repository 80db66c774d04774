//! Group business logic - tagging transactions and reporting on them.
//!
//! A group is a label with a currency, an optional budget and a member list.
//! The summary is read-only and recomputed from the tagged transactions on
//! every call.

use crate::{
    core::{
        money,
        party::{Party, PersonRef, PersonSummary},
        person,
    },
    entities::{
        Group, GroupMember, SplitShare, Transaction,
        group::{self, GroupKind},
        group_member, split_share,
        transaction::{self, TransactionStatus, TransactionType},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

/// Request to create a group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Option<Decimal>,
    pub currency: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, rename = "members", alias = "memberIds")]
    pub member_ids: Vec<PersonRef>,
}

/// Partial update of a group.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<GroupKind>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

/// Group as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
    pub currency: String,
    pub notes: Option<String>,
    pub members: Vec<PersonSummary>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupView {
    fn new(model: group::Model, members: Vec<PersonSummary>) -> Self {
        Self {
            budget: model
                .budget_minor
                .map(|units| money::from_minor(units, &model.currency)),
            id: model.id,
            name: model.name,
            kind: model.kind,
            start_date: model.start_date,
            end_date: model.end_date,
            currency: model.currency,
            notes: model.notes,
            members,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// What one party put into and took out of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonShare {
    pub person_id: Option<i64>,
    pub person_name: String,
    /// Sum of the party's breakdown amounts
    pub share: Decimal,
    /// Sum of the split amounts the party paid
    pub paid: Decimal,
    /// `share - paid`; positive means the party owes the group
    pub balance: Decimal,
}

/// Budget against spending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetVsActual {
    pub budget: Decimal,
    pub actual: Decimal,
    pub difference: Decimal,
    pub percentage: Decimal,
}

/// Spending report of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub group: GroupView,
    pub total_spent: Decimal,
    pub transaction_count: usize,
    pub per_person_share: Vec<PersonShare>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_vs_actual: Option<BudgetVsActual>,
}

fn check_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(Error::validation(
                "endDate",
                format!("End date {end} is before start date {start}"),
            ));
        }
    }
    Ok(())
}

/// Finds one of the owner's groups, active or not.
pub async fn require_group<C>(conn: &C, owner_id: &str, group_id: i64) -> Result<group::Model>
where
    C: ConnectionTrait,
{
    Group::find_by_id(group_id)
        .filter(group::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await?
        .ok_or(Error::GroupNotFound { id: group_id })
}

async fn members_of<C>(conn: &C, owner_id: &str, group_id: i64) -> Result<Vec<PersonSummary>>
where
    C: ConnectionTrait,
{
    let rows = GroupMember::find()
        .filter(group_member::Column::GroupId.eq(group_id))
        .order_by_asc(group_member::Column::Position)
        .order_by_asc(group_member::Column::Id)
        .all(conn)
        .await?;
    let ids: Vec<i64> = rows.iter().map(|r| r.person_id).collect();
    let names = person::names_for(conn, owner_id, &ids).await?;
    Ok(rows
        .into_iter()
        .map(|r| PersonSummary {
            name: names.get(&r.person_id).cloned().unwrap_or_default(),
            id: r.person_id,
        })
        .collect())
}

async fn insert_member<C>(conn: &C, group_id: i64, person_id: i64, position: i32) -> Result<()>
where
    C: ConnectionTrait,
{
    group_member::ActiveModel {
        group_id: Set(group_id),
        person_id: Set(person_id),
        position: Set(position),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Creates a group with its initial members.
pub async fn create_group(
    db: &DatabaseConnection,
    owner_id: &str,
    request: NewGroup,
) -> Result<GroupView> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "Group name cannot be empty"));
    }
    check_dates(request.start_date, request.end_date)?;
    let currency = money::normalize_currency(&request.currency)?;
    let budget_minor = request
        .budget
        .map(|b| money::non_negative_minor(b, &currency, "budget"))
        .transpose()?;

    let mut member_ids: Vec<i64> = Vec::with_capacity(request.member_ids.len());
    for id in request.member_ids.iter().map(PersonRef::id) {
        if !member_ids.contains(&id) {
            member_ids.push(id);
        }
    }

    let txn = db.begin().await?;
    person::require_people(&txn, owner_id, &member_ids).await?;

    let now = Utc::now();
    let model = group::ActiveModel {
        owner_id: Set(owner_id.to_string()),
        name: Set(name.to_string()),
        kind: Set(request.kind),
        start_date: Set(request.start_date),
        end_date: Set(request.end_date),
        budget_minor: Set(budget_minor),
        currency: Set(currency),
        notes: Set(request.notes),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    for (position, person_id) in member_ids.iter().enumerate() {
        insert_member(&txn, model.id, *person_id, i32::try_from(position)?).await?;
    }
    let members = members_of(&txn, owner_id, model.id).await?;
    txn.commit().await?;

    info!(group_id = model.id, "Created group '{}'", model.name);
    Ok(GroupView::new(model, members))
}

/// Lists groups ordered by name.
pub async fn list_groups(
    db: &DatabaseConnection,
    owner_id: &str,
    include_inactive: bool,
) -> Result<Vec<GroupView>> {
    let mut query = Group::find().filter(group::Column::OwnerId.eq(owner_id));
    if !include_inactive {
        query = query.filter(group::Column::IsActive.eq(true));
    }
    let groups = query.order_by_asc(group::Column::Name).all(db).await?;

    let mut views = Vec::with_capacity(groups.len());
    for model in groups {
        let members = members_of(db, owner_id, model.id).await?;
        views.push(GroupView::new(model, members));
    }
    Ok(views)
}

/// Retrieves a group with its members.
pub async fn get_group(db: &DatabaseConnection, owner_id: &str, group_id: i64) -> Result<GroupView> {
    let model = require_group(db, owner_id, group_id).await?;
    let members = members_of(db, owner_id, group_id).await?;
    Ok(GroupView::new(model, members))
}

/// Applies a partial update.
pub async fn update_group(
    db: &DatabaseConnection,
    owner_id: &str,
    group_id: i64,
    update: GroupUpdate,
) -> Result<GroupView> {
    let existing = require_group(db, owner_id, group_id).await?;
    check_dates(
        update.start_date.or(existing.start_date),
        update.end_date.or(existing.end_date),
    )?;
    let budget_minor = update
        .budget
        .map(|b| money::non_negative_minor(b, &existing.currency, "budget"))
        .transpose()?;

    let mut active: group::ActiveModel = existing.into();
    if let Some(name) = update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "Group name cannot be empty"));
        }
        active.name = Set(name.to_string());
    }
    if let Some(kind) = update.kind {
        active.kind = Set(kind);
    }
    if let Some(start) = update.start_date {
        active.start_date = Set(Some(start));
    }
    if let Some(end) = update.end_date {
        active.end_date = Set(Some(end));
    }
    if let Some(budget) = budget_minor {
        active.budget_minor = Set(Some(budget));
    }
    if let Some(notes) = update.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(is_active) = update.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now());
    let model = active.update(db).await?;

    debug!(group_id, "Updated group");
    let members = members_of(db, owner_id, group_id).await?;
    Ok(GroupView::new(model, members))
}

/// Deactivates a group. Its transactions keep their tag.
pub async fn delete_group(db: &DatabaseConnection, owner_id: &str, group_id: i64) -> Result<()> {
    let existing = require_group(db, owner_id, group_id).await?;
    let mut active: group::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    info!(group_id, "Deactivated group");
    Ok(())
}

/// Adds a person to a group; adding an existing member changes nothing.
pub async fn add_member(
    db: &DatabaseConnection,
    owner_id: &str,
    group_id: i64,
    person_id: i64,
) -> Result<GroupView> {
    let txn = db.begin().await?;
    let model = require_group(&txn, owner_id, group_id).await?;
    person::require_active_person(&txn, owner_id, person_id).await?;

    let rows = GroupMember::find()
        .filter(group_member::Column::GroupId.eq(group_id))
        .all(&txn)
        .await?;
    if !rows.iter().any(|r| r.person_id == person_id) {
        let next = rows.iter().map(|r| r.position + 1).max().unwrap_or(0);
        insert_member(&txn, group_id, person_id, next).await?;
        info!(group_id, person_id, "Added group member");
    }
    let members = members_of(&txn, owner_id, group_id).await?;
    txn.commit().await?;
    Ok(GroupView::new(model, members))
}

/// Removes a person from a group.
pub async fn remove_member(
    db: &DatabaseConnection,
    owner_id: &str,
    group_id: i64,
    person_id: i64,
) -> Result<GroupView> {
    let txn = db.begin().await?;
    let model = require_group(&txn, owner_id, group_id).await?;
    let removed = GroupMember::delete_many()
        .filter(group_member::Column::GroupId.eq(group_id))
        .filter(group_member::Column::PersonId.eq(person_id))
        .exec(&txn)
        .await?;
    if removed.rows_affected == 0 {
        return Err(Error::PersonNotFound { id: person_id });
    }
    let members = members_of(&txn, owner_id, group_id).await?;
    txn.commit().await?;
    info!(group_id, person_id, "Removed group member");
    Ok(GroupView::new(model, members))
}

async fn tagged_transactions<C>(
    conn: &C,
    owner_id: &str,
    group_id: i64,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .filter(transaction::Column::GroupId.eq(group_id))
        .filter(transaction::Column::ParentTransactionId.is_null())
        .filter(transaction::Column::DeletedAt.is_null())
        .filter(transaction::Column::Status.ne(TransactionStatus::Cancelled))
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Live transactions tagged with a group, newest first.
pub async fn group_transactions(
    db: &DatabaseConnection,
    owner_id: &str,
    group_id: i64,
) -> Result<Vec<transaction::Model>> {
    require_group(db, owner_id, group_id).await?;
    tagged_transactions(db, owner_id, group_id).await
}

fn percentage_of(actual: i64, budget: i64) -> Decimal {
    (Decimal::from(actual) * Decimal::ONE_HUNDRED / Decimal::from(budget))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Totals, per-party shares and budget usage of a group.
#[instrument(skip(db, owner_name))]
pub async fn group_summary(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    group_id: i64,
) -> Result<GroupSummary> {
    let txn = db.begin().await?;

    let model = require_group(&txn, owner_id, group_id).await?;
    let members = members_of(&txn, owner_id, group_id).await?;
    let tagged = tagged_transactions(&txn, owner_id, group_id).await?;

    // Income and transfers are tagged for reference only
    let total_minor: i64 = tagged
        .iter()
        .filter(|t| t.transaction_type == TransactionType::Expense)
        .map(|t| t.amount_minor)
        .sum();
    let parents: HashMap<i64, &transaction::Model> = tagged
        .iter()
        .filter(|t| t.is_split_parent())
        .map(|t| (t.id, t))
        .collect();

    // (share, paid) per party
    let mut shares: BTreeMap<Party, (i64, i64)> = BTreeMap::new();
    for parent in parents.values() {
        shares
            .entry(Party::from_person_id(parent.person_id))
            .or_default()
            .1 += parent.amount_minor;
    }
    if !parents.is_empty() {
        let rows = SplitShare::find()
            .filter(split_share::Column::TransactionId.is_in(parents.keys().copied()))
            .all(&txn)
            .await?;
        for row in rows {
            shares
                .entry(Party::from_person_id(row.person_id))
                .or_default()
                .0 += row.amount_minor;
        }
    }
    let ids: Vec<i64> = shares.keys().filter_map(|p| p.person_id()).collect();
    let names = person::names_for(&txn, owner_id, &ids).await?;
    txn.commit().await?;

    let currency = model.currency.clone();
    let per_person_share = shares
        .into_iter()
        .map(|(party, (share, paid))| PersonShare {
            person_id: party.person_id(),
            person_name: match party {
                Party::Owner => owner_name.to_string(),
                Party::Person(id) => names.get(&id).cloned().unwrap_or_default(),
            },
            share: money::from_minor(share, &currency),
            paid: money::from_minor(paid, &currency),
            balance: money::from_minor(share - paid, &currency),
        })
        .collect();

    let budget_vs_actual = model
        .budget_minor
        .filter(|budget| *budget > 0)
        .map(|budget| BudgetVsActual {
            budget: money::from_minor(budget, &currency),
            actual: money::from_minor(total_minor, &currency),
            difference: money::from_minor(budget - total_minor, &currency),
            percentage: percentage_of(total_minor, budget),
        });

    Ok(GroupSummary {
        group: GroupView::new(model, members),
        total_spent: money::from_minor(total_minor, &currency),
        transaction_count: tagged.len(),
        per_person_share,
        budget_vs_actual,
    })
}
