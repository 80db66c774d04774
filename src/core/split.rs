//! Split business logic - dividing a transaction among people.
//!
//! A split turns one parent transaction into an ordered breakdown of shares
//! (`split_shares`) and one child transaction per non-zero share. All
//! arithmetic happens on integer minor units, so the shares always add up to
//! the parent amount exactly. Remainders are handed out one minor unit at a
//! time in participant order.
//!
//! The parent, its breakdown and its children are always written in one
//! database transaction.

use crate::{
    core::{
        account::{self, Effect},
        money,
        party::{Party, PersonRef},
        person,
        transaction::{self as ledger, NewTransaction, TransactionView},
    },
    entities::{
        SplitShare, Transaction, split_share,
        transaction::{self, SplitType, TransactionStatus, TransactionType},
    },
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    DbErr, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Split policies a caller can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Equal,
    Percentage,
    Custom,
}

impl From<SplitKind> for SplitType {
    fn from(kind: SplitKind) -> Self {
        match kind {
            SplitKind::Equal => Self::Equal,
            SplitKind::Percentage => Self::Percentage,
            SplitKind::Custom => Self::Custom,
        }
    }
}

/// A split policy with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitRule {
    Equal,
    /// One percentage per participant
    Percentage(Vec<Decimal>),
    /// One amount per participant
    Custom(Vec<Decimal>),
}

/// One participant's share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub party: Party,
    pub amount_minor: i64,
    pub percentage: Option<Decimal>,
}

/// How to divide a transaction, as sent by callers.
///
/// A `null` entry in `personIds` is the owner's own share.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPolicy {
    pub split_type: SplitKind,
    pub person_ids: Vec<Option<PersonRef>>,
    #[serde(default)]
    pub percentages: Option<Vec<Decimal>>,
    #[serde(default, rename = "customAmounts", alias = "amounts")]
    pub amounts: Option<Vec<Decimal>>,
}

impl SplitPolicy {
    /// Participants in request order.
    #[must_use]
    pub fn parties(&self) -> Vec<Party> {
        self.person_ids
            .iter()
            .map(|p| Party::from_person_id(p.as_ref().map(PersonRef::id)))
            .collect()
    }

    /// The rule with its parameter list, checked against the participant count.
    pub fn rule(&self) -> Result<SplitRule> {
        let expect_len = |values: &Option<Vec<Decimal>>, field: &str| -> Result<Vec<Decimal>> {
            let values = values
                .clone()
                .ok_or_else(|| Error::validation(field, format!("{field} are required")))?;
            if values.len() != self.person_ids.len() {
                return Err(Error::validation(
                    field,
                    format!(
                        "{} {field} given for {} participants",
                        values.len(),
                        self.person_ids.len()
                    ),
                ));
            }
            Ok(values)
        };
        match self.split_type {
            SplitKind::Equal => Ok(SplitRule::Equal),
            SplitKind::Percentage => Ok(SplitRule::Percentage(expect_len(
                &self.percentages,
                "percentages",
            )?)),
            SplitKind::Custom => Ok(SplitRule::Custom(expect_len(&self.amounts, "customAmounts")?)),
        }
    }
}

/// Request to record a new transaction and split it in one step.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSplit {
    #[serde(flatten)]
    pub transaction: NewTransaction,
    #[serde(flatten)]
    pub policy: SplitPolicy,
    /// Client-generated key; a retry with the same key returns the first result
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// One line of a split breakdown as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitShareView {
    pub person_id: Option<i64>,
    pub person_name: String,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<Decimal>,
}

/// A parent split with its children and breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitDetails {
    pub parent_transaction: TransactionView,
    pub child_transactions: Vec<TransactionView>,
    pub split_breakdown: Vec<SplitShareView>,
}

/// Divides `amount_minor` among `parties` according to `rule`.
///
/// The returned shares are in participant order and always sum to
/// `amount_minor`.
pub fn allocate(
    amount_minor: i64,
    currency: &str,
    parties: &[Party],
    rule: &SplitRule,
) -> Result<Vec<Allocation>> {
    if parties.is_empty() {
        return Err(Error::EmptyParticipants);
    }
    let mut seen = HashSet::with_capacity(parties.len());
    for party in parties {
        if !seen.insert(*party) {
            let who = match party {
                Party::Owner => "the owner".to_string(),
                Party::Person(id) => format!("person {id}"),
            };
            return Err(Error::validation(
                "personIds",
                format!("{who} appears more than once"),
            ));
        }
    }
    if amount_minor <= 0 {
        return Err(Error::InvalidAmount {
            field: "amount".to_string(),
            amount: money::from_minor(amount_minor, currency),
            reason: "must be greater than zero".to_string(),
        });
    }

    let (shares, percentages) = match rule {
        SplitRule::Equal => (equal_shares(amount_minor, parties.len())?, None),
        SplitRule::Percentage(percentages) => {
            check_len(percentages, parties.len(), "percentages")?;
            (
                percentage_shares(amount_minor, percentages)?,
                Some(percentages.as_slice()),
            )
        }
        SplitRule::Custom(amounts) => {
            check_len(amounts, parties.len(), "customAmounts")?;
            (custom_shares(amount_minor, currency, amounts)?, None)
        }
    };

    Ok(parties
        .iter()
        .zip(shares)
        .enumerate()
        .map(|(index, (party, amount_minor))| Allocation {
            party: *party,
            amount_minor,
            percentage: percentages.map(|p| p[index]),
        })
        .collect())
}

fn check_len(values: &[Decimal], expected: usize, field: &str) -> Result<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(Error::validation(
            field,
            format!("{} {field} given for {expected} participants", values.len()),
        ))
    }
}

fn equal_shares(amount_minor: i64, count: usize) -> Result<Vec<i64>> {
    let n = i64::try_from(count)?;
    let base = amount_minor / n;
    let remainder = usize::try_from(amount_minor % n)?;
    Ok((0..count)
        .map(|index| base + i64::from(index < remainder))
        .collect())
}

fn percentage_shares(amount_minor: i64, percentages: &[Decimal]) -> Result<Vec<i64>> {
    for (index, value) in percentages.iter().enumerate() {
        if *value < Decimal::ZERO || *value > Decimal::ONE_HUNDRED {
            return Err(Error::PercentageOutOfRange {
                index,
                value: *value,
            });
        }
    }
    let total: Decimal = percentages.iter().sum();
    if (total - Decimal::ONE_HUNDRED).abs() > money::SUM_TOLERANCE {
        return Err(Error::SumMismatch {
            field: "percentages".to_string(),
            computed: total,
            expected: Decimal::ONE_HUNDRED,
        });
    }

    let units = Decimal::from(amount_minor);
    let mut shares = percentages
        .iter()
        .map(|p| {
            money::round_units(units * *p / Decimal::ONE_HUNDRED).ok_or_else(|| {
                Error::InvalidAmount {
                    field: "percentages".to_string(),
                    amount: *p,
                    reason: "produces a share out of range".to_string(),
                }
            })
        })
        .collect::<Result<Vec<i64>>>()?;
    let residual = amount_minor - shares.iter().sum::<i64>();
    money::distribute_residual(&mut shares, residual);
    Ok(shares)
}

fn custom_shares(amount_minor: i64, currency: &str, amounts: &[Decimal]) -> Result<Vec<i64>> {
    for value in amounts {
        if *value < Decimal::ZERO {
            return Err(Error::InvalidAmount {
                field: "customAmounts".to_string(),
                amount: *value,
                reason: "must not be negative".to_string(),
            });
        }
    }
    let total: Decimal = amounts.iter().sum();
    let expected = money::from_minor(amount_minor, currency);
    if (total - expected).abs() > money::SUM_TOLERANCE {
        return Err(Error::SumMismatch {
            field: "customAmounts".to_string(),
            computed: total,
            expected,
        });
    }

    let mut shares = amounts
        .iter()
        .map(|a| money::round_to_minor(*a, currency, "customAmounts"))
        .collect::<Result<Vec<i64>>>()?;
    let residual = amount_minor - shares.iter().sum::<i64>();
    if residual != 0 {
        debug!(residual, "Absorbing custom split residual");
    }
    money::distribute_residual(&mut shares, residual);
    Ok(shares)
}

/// Checks participants against the directory and computes the breakdown.
async fn plan<C>(
    conn: &C,
    owner_id: &str,
    amount_minor: i64,
    currency: &str,
    policy: &SplitPolicy,
) -> Result<(SplitType, Vec<Allocation>)>
where
    C: ConnectionTrait,
{
    let parties = policy.parties();
    let rule = policy.rule()?;
    let allocations = allocate(amount_minor, currency, &parties, &rule)?;

    let person_ids: Vec<i64> = parties.iter().filter_map(|p| p.person_id()).collect();
    person::require_people(conn, owner_id, &person_ids).await?;

    Ok((policy.split_type.into(), allocations))
}

fn ensure_splittable(tx: &transaction::Model) -> Result<()> {
    if tx.is_split_parent() || tx.parent_transaction_id.is_some() {
        return Err(Error::AlreadySplit { id: tx.id });
    }
    if tx.transaction_type == TransactionType::Transfer {
        return Err(Error::validation("type", "Transfers cannot be split"));
    }
    if tx.status == TransactionStatus::Cancelled {
        return Err(Error::validation(
            "status",
            "Cancelled transactions cannot be split",
        ));
    }
    if tx.settlement_id.is_some() {
        return Err(Error::validation(
            "transactionId",
            "Settlement payments cannot be split",
        ));
    }
    Ok(())
}

/// Writes the breakdown rows and one child per non-zero share.
async fn write_breakdown<C>(
    conn: &C,
    parent: &transaction::Model,
    allocations: &[Allocation],
) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    for (position, allocation) in allocations.iter().enumerate() {
        split_share::ActiveModel {
            transaction_id: Set(parent.id),
            person_id: Set(allocation.party.person_id()),
            position: Set(i32::try_from(position)?),
            amount_minor: Set(allocation.amount_minor),
            percentage: Set(allocation.percentage.map(|p| p.normalize().to_string())),
            ..Default::default()
        }
        .insert(conn)
        .await?;

        if allocation.amount_minor == 0 {
            continue;
        }
        transaction::ActiveModel {
            owner_id: Set(parent.owner_id.clone()),
            account_id: Set(parent.account_id),
            transfer_to_account_id: Set(None),
            transaction_type: Set(parent.transaction_type),
            amount_minor: Set(allocation.amount_minor),
            currency: Set(parent.currency.clone()),
            description: Set(parent.description.clone()),
            category: Set(parent.category.clone()),
            notes: Set(None),
            person_id: Set(allocation.party.person_id()),
            date: Set(parent.date),
            status: Set(parent.status),
            parent_transaction_id: Set(Some(parent.id)),
            group_id: Set(None),
            settlement_id: Set(None),
            split_type: Set(SplitType::NotSplit),
            idempotency_key: Set(None),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn clear_breakdown<C>(conn: &C, parent_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let removed = ledger::soft_delete_children(conn, parent_id).await?;
    SplitShare::delete_many()
        .filter(split_share::Column::TransactionId.eq(parent_id))
        .exec(conn)
        .await?;
    debug!(parent_id, removed, "Cleared split breakdown");
    Ok(())
}

async fn find_by_idempotency_key<C>(
    conn: &C,
    owner_id: &str,
    key: &str,
) -> Result<Option<transaction::Model>>
where
    C: ConnectionTrait,
{
    Transaction::find()
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .filter(transaction::Column::IdempotencyKey.eq(key))
        .one(conn)
        .await
        .map_err(Into::into)
}

fn unique_violation_to_conflict(err: DbErr, key: Option<&str>) -> Error {
    match (err.sql_err(), key) {
        (Some(SqlErr::UniqueConstraintViolation(_)), Some(key)) => {
            warn!(key, "Lost an idempotency key race");
            Error::DuplicateRequest {
                key: key.to_string(),
            }
        }
        _ => err.into(),
    }
}

/// Records a new transaction and splits it.
///
/// A request carrying an idempotency key that this owner already used returns
/// the split created by the first request.
#[instrument(skip(db, request, owner_name), fields(split_type = ?request.policy.split_type))]
pub async fn create_split(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    request: NewSplit,
) -> Result<SplitDetails> {
    let key = request
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(ToString::to_string);

    if let Some(key) = &key {
        if let Some(existing) = find_by_idempotency_key(db, owner_id, key).await? {
            if existing.deleted_at.is_some() || !existing.is_split_parent() {
                return Err(Error::DuplicateRequest { key: key.clone() });
            }
            info!(transaction_id = existing.id, "Replayed split creation");
            return load_details(db, owner_id, owner_name, existing).await;
        }
    }

    let txn = db.begin().await?;

    let entry = ledger::prepare_entry(&txn, owner_id, &request.transaction).await?;
    if entry.transaction_type == TransactionType::Transfer {
        return Err(Error::validation("type", "Transfers cannot be split"));
    }
    let (split_type, allocations) = plan(
        &txn,
        owner_id,
        entry.amount_minor,
        &entry.currency,
        &request.policy,
    )
    .await?;

    let mut active = entry.to_active_model(owner_id);
    active.split_type = Set(split_type);
    active.idempotency_key = Set(key.clone());
    let parent = active
        .insert(&txn)
        .await
        .map_err(|e| unique_violation_to_conflict(e, key.as_deref()))?;

    write_breakdown(&txn, &parent, &allocations).await?;
    account::apply_transaction_effect(&txn, &parent, Effect::Apply).await?;
    txn.commit().await?;

    info!(
        transaction_id = parent.id,
        participants = allocations.len(),
        "Created split"
    );
    load_details(db, owner_id, owner_name, parent).await
}

/// Splits a plain transaction in place.
///
/// The split type is claimed with a conditional update, so of two concurrent
/// requests exactly one succeeds and the other gets a conflict.
#[instrument(skip(db, policy, owner_name))]
pub async fn split_existing(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    transaction_id: i64,
    policy: SplitPolicy,
) -> Result<SplitDetails> {
    let txn = db.begin().await?;

    let existing = ledger::require_transaction(&txn, owner_id, transaction_id).await?;
    ensure_splittable(&existing)?;
    let (split_type, allocations) = plan(
        &txn,
        owner_id,
        existing.amount_minor,
        &existing.currency,
        &policy,
    )
    .await?;

    let claimed = Transaction::update_many()
        .col_expr(transaction::Column::SplitType, Expr::value(split_type))
        .col_expr(transaction::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::SplitType.eq(SplitType::NotSplit))
        .filter(transaction::Column::ParentTransactionId.is_null())
        .filter(transaction::Column::DeletedAt.is_null())
        .exec(&txn)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(Error::AlreadySplit { id: transaction_id });
    }

    let parent = ledger::require_transaction(&txn, owner_id, transaction_id).await?;
    write_breakdown(&txn, &parent, &allocations).await?;
    txn.commit().await?;

    info!(transaction_id, "Split existing transaction");
    load_details(db, owner_id, owner_name, parent).await
}

async fn require_split_parent<C>(
    conn: &C,
    owner_id: &str,
    transaction_id: i64,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let tx = ledger::require_transaction(conn, owner_id, transaction_id)
        .await
        .map_err(|e| match e {
            Error::TransactionNotFound { id } => Error::SplitNotFound { id },
            other => other,
        })?;
    if !tx.is_split_parent() {
        return Err(Error::SplitNotFound { id: transaction_id });
    }
    Ok(tx)
}

/// Parent, children and breakdown of a split.
pub async fn get_split_details(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    transaction_id: i64,
) -> Result<SplitDetails> {
    let parent = require_split_parent(db, owner_id, transaction_id).await?;
    load_details(db, owner_id, owner_name, parent).await
}

/// Recomputes a split with a new policy and replaces its children.
#[instrument(skip(db, policy, owner_name))]
pub async fn update_split(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    transaction_id: i64,
    policy: SplitPolicy,
) -> Result<SplitDetails> {
    let txn = db.begin().await?;

    let parent = require_split_parent(&txn, owner_id, transaction_id).await?;
    let (split_type, allocations) = plan(
        &txn,
        owner_id,
        parent.amount_minor,
        &parent.currency,
        &policy,
    )
    .await?;

    clear_breakdown(&txn, parent.id).await?;
    let mut active: transaction::ActiveModel = parent.into();
    active.split_type = Set(split_type);
    active.updated_at = Set(Utc::now());
    let parent = active.update(&txn).await?;
    write_breakdown(&txn, &parent, &allocations).await?;
    txn.commit().await?;

    info!(transaction_id, "Updated split");
    load_details(db, owner_id, owner_name, parent).await
}

/// Undoes a split: children are soft-deleted, the breakdown is dropped and
/// the parent becomes a plain transaction again.
#[instrument(skip(db))]
pub async fn remove_split(
    db: &DatabaseConnection,
    owner_id: &str,
    transaction_id: i64,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    let parent = require_split_parent(&txn, owner_id, transaction_id).await?;
    clear_breakdown(&txn, parent.id).await?;
    let mut active: transaction::ActiveModel = parent.into();
    active.split_type = Set(SplitType::NotSplit);
    active.updated_at = Set(Utc::now());
    let plain = active.update(&txn).await?;
    txn.commit().await?;

    info!(transaction_id, "Removed split");
    Ok(plain)
}

/// Ordered breakdown rows of a parent split.
pub(crate) async fn shares_of<C>(conn: &C, parent_id: i64) -> Result<Vec<split_share::Model>>
where
    C: ConnectionTrait,
{
    SplitShare::find()
        .filter(split_share::Column::TransactionId.eq(parent_id))
        .order_by_asc(split_share::Column::Position)
        .all(conn)
        .await
        .map_err(Into::into)
}

fn parse_percentage(stored: Option<&str>) -> Result<Option<Decimal>> {
    stored
        .map(|text| {
            Decimal::from_str(text).map_err(|e| {
                Error::Database(DbErr::Type(format!("invalid stored percentage '{text}': {e}")))
            })
        })
        .transpose()
}

async fn load_details<C>(
    conn: &C,
    owner_id: &str,
    owner_name: &str,
    parent: transaction::Model,
) -> Result<SplitDetails>
where
    C: ConnectionTrait,
{
    let shares = shares_of(conn, parent.id).await?;
    let children = ledger::live_children(conn, parent.id).await?;
    let ids: Vec<i64> = shares.iter().filter_map(|s| s.person_id).collect();
    let names = person::names_for(conn, owner_id, &ids).await?;

    let split_breakdown = shares
        .iter()
        .map(|share| {
            let person_name = match share.person_id {
                None => owner_name.to_string(),
                Some(id) => names.get(&id).cloned().unwrap_or_default(),
            };
            Ok(SplitShareView {
                person_id: share.person_id,
                person_name,
                amount: money::from_minor(share.amount_minor, &parent.currency),
                percentage: parse_percentage(share.percentage.as_deref())?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SplitDetails {
        parent_transaction: parent.into(),
        child_transactions: children.into_iter().map(Into::into).collect(),
        split_breakdown,
    })
}
