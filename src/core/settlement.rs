//! Settlement business logic - recording payments between parties.
//!
//! A settlement starts `pending` and ends either `settled` or `cancelled`.
//! Both transitions are compare-and-swap updates on `status = 'pending'`, so
//! when two requests race exactly one of them wins and the other gets a
//! conflict. Only settled settlements count against pending balances.

use crate::{
    core::{
        account::{self, Effect},
        balance::{self, NetBalance},
        money,
        party::{self, Party, PersonRef},
        person,
        transaction as ledger,
    },
    entities::{
        Settlement, Transaction,
        account::AccountKind,
        settlement::{self, SettlementMethod, SettlementStatus},
        transaction::{self, SplitType, TransactionStatus, TransactionType},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Request to record a settlement.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSettlement {
    /// Paying person; absent for the owner
    #[serde(default)]
    pub from_person_id: Option<PersonRef>,
    /// Receiving person; absent for the owner
    #[serde(default)]
    pub to_person_id: Option<PersonRef>,
    pub amount: Decimal,
    pub currency: String,
    #[serde(default, rename = "settlementMethod", alias = "method")]
    pub method: Option<SettlementMethod>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Also record the cash movement on `account_id`
    #[serde(default)]
    pub create_transaction: bool,
    #[serde(default)]
    pub account_id: Option<i64>,
    /// Kind the caller believes `account_id` is; checked when given
    #[serde(default)]
    pub account_type: Option<AccountKind>,
    /// Date of the linked transaction, defaults to today
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// When a settlement was paid: a full timestamp or just a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SettlementDate {
    Instant(DateTime<Utc>),
    Day(NaiveDate),
}

impl SettlementDate {
    /// Days are taken at midnight UTC.
    #[must_use]
    pub fn to_utc(self) -> DateTime<Utc> {
        match self {
            Self::Instant(at) => at,
            Self::Day(day) => day.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }
}

/// Settlement as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementView {
    pub id: i64,
    pub from_person_id: Option<i64>,
    pub from_person_name: String,
    pub to_person_id: Option<i64>,
    pub to_person_name: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: SettlementStatus,
    #[serde(rename = "settlementMethod")]
    pub method: Option<SettlementMethod>,
    pub settlement_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub transaction_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of settlement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementPage {
    pub settlements: Vec<SettlementView>,
    pub total: u64,
}

/// Net amount one party owes another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingBalance {
    pub from_person_id: Option<i64>,
    pub from_person_name: String,
    pub to_person_id: Option<i64>,
    pub to_person_name: String,
    pub amount: Decimal,
    pub currency: String,
}

fn display_name(party: Party, owner_name: &str, names: &BTreeMap<i64, String>) -> String {
    match party {
        Party::Owner => owner_name.to_string(),
        Party::Person(id) => names.get(&id).cloned().unwrap_or_default(),
    }
}

async fn to_views<C>(
    conn: &C,
    owner_id: &str,
    owner_name: &str,
    models: Vec<settlement::Model>,
) -> Result<Vec<SettlementView>>
where
    C: ConnectionTrait,
{
    let ids: Vec<i64> = models
        .iter()
        .flat_map(|m| [m.from_person_id, m.to_person_id])
        .flatten()
        .collect();
    let names = person::names_for(conn, owner_id, &ids).await?;

    Ok(models
        .into_iter()
        .map(|m| SettlementView {
            from_person_name: display_name(
                Party::from_person_id(m.from_person_id),
                owner_name,
                &names,
            ),
            to_person_name: display_name(Party::from_person_id(m.to_person_id), owner_name, &names),
            amount: money::from_minor(m.amount_minor, &m.currency),
            id: m.id,
            from_person_id: m.from_person_id,
            to_person_id: m.to_person_id,
            currency: m.currency,
            status: m.status,
            method: m.method,
            settlement_date: m.settlement_date,
            notes: m.notes,
            transaction_id: m.transaction_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
        .collect())
}

async fn to_view<C>(
    conn: &C,
    owner_id: &str,
    owner_name: &str,
    model: settlement::Model,
) -> Result<SettlementView>
where
    C: ConnectionTrait,
{
    let id = model.id;
    to_views(conn, owner_id, owner_name, vec![model])
        .await?
        .pop()
        .ok_or(Error::SettlementNotFound { id })
}

async fn require_settlement<C>(
    conn: &C,
    owner_id: &str,
    settlement_id: i64,
) -> Result<settlement::Model>
where
    C: ConnectionTrait,
{
    Settlement::find_by_id(settlement_id)
        .filter(settlement::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await?
        .ok_or(Error::SettlementNotFound { id: settlement_id })
}

/// Records a pending settlement, optionally with its cash movement.
///
/// The linked transaction is income when the owner receives and an expense
/// otherwise. It is never split, so it never turns into a debt.
#[instrument(skip(db, request, owner_name))]
pub async fn create_settlement(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    request: NewSettlement,
) -> Result<SettlementView> {
    let from = Party::from_person_id(party::resolve(request.from_person_id.as_ref()));
    let to = Party::from_person_id(party::resolve(request.to_person_id.as_ref()));
    if from == to {
        return Err(Error::SameParty);
    }
    let currency = money::normalize_currency(&request.currency)?;
    let amount_minor = money::positive_minor(request.amount, &currency, "amount")?;
    let counterparty = match (from, to) {
        (Party::Owner, other) | (other, Party::Owner) => Some(other),
        _ => None,
    };
    if request.create_transaction && counterparty.is_none() {
        return Err(Error::validation(
            "createTransaction",
            "Only settlements involving the owner can record a transaction",
        ));
    }

    let txn = db.begin().await?;

    for id in [from.person_id(), to.person_id()].into_iter().flatten() {
        person::require_person(&txn, owner_id, id).await?;
    }
    let linked_account = if request.create_transaction {
        let account_id = request
            .account_id
            .ok_or_else(|| Error::validation("accountId", "An account is required"))?;
        let account = account::require_open_account(&txn, owner_id, account_id).await?;
        account::check_kind(&account, request.account_type)?;
        if account.currency != currency {
            return Err(Error::CurrencyMismatch {
                expected: account.currency,
                actual: currency,
            });
        }
        Some(account)
    } else {
        None
    };

    let now = Utc::now();
    let notes = request.notes.filter(|n| !n.trim().is_empty());
    let mut model = settlement::ActiveModel {
        owner_id: Set(owner_id.to_string()),
        from_person_id: Set(from.person_id()),
        to_person_id: Set(to.person_id()),
        amount_minor: Set(amount_minor),
        currency: Set(currency.clone()),
        status: Set(SettlementStatus::Pending),
        method: Set(request.method),
        settlement_date: Set(None),
        notes: Set(notes.clone()),
        transaction_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if let Some(account) = linked_account {
        let transaction_type = if to == Party::Owner {
            TransactionType::Income
        } else {
            TransactionType::Expense
        };
        let linked = transaction::ActiveModel {
            owner_id: Set(owner_id.to_string()),
            account_id: Set(account.id),
            transfer_to_account_id: Set(None),
            transaction_type: Set(transaction_type),
            amount_minor: Set(amount_minor),
            currency: Set(currency),
            description: Set(format!("Settlement #{}", model.id)),
            category: Set(Some("Settlement".to_string())),
            notes: Set(notes),
            person_id: Set(counterparty.and_then(Party::person_id)),
            date: Set(request.date.unwrap_or_else(|| now.date_naive())),
            status: Set(TransactionStatus::Completed),
            parent_transaction_id: Set(None),
            group_id: Set(None),
            settlement_id: Set(Some(model.id)),
            split_type: Set(SplitType::NotSplit),
            idempotency_key: Set(None),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        account::apply_transaction_effect(&txn, &linked, Effect::Apply).await?;

        let mut active: settlement::ActiveModel = model.into();
        active.transaction_id = Set(Some(linked.id));
        model = active.update(&txn).await?;
    }

    txn.commit().await?;
    info!(settlement_id = model.id, "Recorded pending settlement");
    to_view(db, owner_id, owner_name, model).await
}

/// Moves a settlement from `pending` to `status`, or reports who got there first.
async fn transition<C>(
    conn: &C,
    owner_id: &str,
    settlement_id: i64,
    status: SettlementStatus,
    settlement_date: Option<DateTime<Utc>>,
) -> Result<settlement::Model>
where
    C: ConnectionTrait,
{
    require_settlement(conn, owner_id, settlement_id).await?;

    let mut update = Settlement::update_many()
        .col_expr(settlement::Column::Status, Expr::value(status))
        .col_expr(settlement::Column::UpdatedAt, Expr::value(Utc::now()));
    if let Some(at) = settlement_date {
        update = update.col_expr(settlement::Column::SettlementDate, Expr::value(at));
    }
    let result = update
        .filter(settlement::Column::Id.eq(settlement_id))
        .filter(settlement::Column::OwnerId.eq(owner_id))
        .filter(settlement::Column::Status.eq(SettlementStatus::Pending))
        .exec(conn)
        .await?;

    let current = require_settlement(conn, owner_id, settlement_id).await?;
    if result.rows_affected == 0 {
        return Err(Error::SettlementNotPending {
            id: settlement_id,
            status: current.status,
        });
    }
    Ok(current)
}

/// Marks a pending settlement as settled.
///
/// The oldest unclaimed debts from the payer to the payee in the same
/// currency are stamped with the settlement while they fit in its amount.
/// Stamping leaves the net balance unchanged.
#[instrument(skip(db, owner_name))]
pub async fn settle(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    settlement_id: i64,
    settlement_date: Option<SettlementDate>,
) -> Result<SettlementView> {
    let txn = db.begin().await?;

    let at = settlement_date.map_or_else(Utc::now, SettlementDate::to_utc);
    let settled = transition(
        &txn,
        owner_id,
        settlement_id,
        SettlementStatus::Settled,
        Some(at),
    )
    .await?;

    let from = Party::from_person_id(settled.from_person_id);
    let to = Party::from_person_id(settled.to_person_id);
    let mut covered = 0;
    let mut claimed = Vec::new();
    for debt in balance::live_debts(&txn, owner_id).await? {
        if debt.child.settlement_id.is_some()
            || debt.debtor() != from
            || debt.creditor != to
            || debt.child.currency != settled.currency
        {
            continue;
        }
        if covered + debt.child.amount_minor > settled.amount_minor {
            break;
        }
        covered += debt.child.amount_minor;
        claimed.push(debt.child.id);
    }
    if !claimed.is_empty() {
        Transaction::update_many()
            .col_expr(transaction::Column::SettlementId, Expr::value(settlement_id))
            .filter(transaction::Column::Id.is_in(claimed.iter().copied()))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;
    info!(
        settlement_id,
        stamped = claimed.len(),
        "Settled settlement"
    );
    to_view(db, owner_id, owner_name, settled).await
}

/// Cancels a pending settlement. A linked transaction is soft-deleted and its
/// account effect reversed.
#[instrument(skip(db, owner_name))]
pub async fn cancel(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    settlement_id: i64,
) -> Result<SettlementView> {
    let txn = db.begin().await?;

    let cancelled = transition(
        &txn,
        owner_id,
        settlement_id,
        SettlementStatus::Cancelled,
        None,
    )
    .await?;
    if let Some(transaction_id) = cancelled.transaction_id {
        match ledger::require_transaction(&txn, owner_id, transaction_id).await {
            Ok(linked) => ledger::soft_delete(&txn, linked).await?,
            Err(Error::TransactionNotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    txn.commit().await?;
    info!(settlement_id, "Cancelled settlement");
    to_view(db, owner_id, owner_name, cancelled).await
}

/// Retrieves a settlement by id.
pub async fn get_settlement(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    settlement_id: i64,
) -> Result<SettlementView> {
    let model = require_settlement(db, owner_id, settlement_id).await?;
    to_view(db, owner_id, owner_name, model).await
}

/// All settlements, newest first, one page at a time.
pub async fn history(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
    limit: u64,
    skip: u64,
) -> Result<SettlementPage> {
    let query = Settlement::find().filter(settlement::Column::OwnerId.eq(owner_id));
    let total = query.clone().count(db).await?;
    let models = query
        .order_by_desc(settlement::Column::CreatedAt)
        .order_by_desc(settlement::Column::Id)
        .offset(skip)
        .limit(limit)
        .all(db)
        .await?;
    Ok(SettlementPage {
        settlements: to_views(db, owner_id, owner_name, models).await?,
        total,
    })
}

/// Settlements still waiting to be settled or cancelled, oldest first.
pub async fn pending_list(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
) -> Result<Vec<SettlementView>> {
    let models = Settlement::find()
        .filter(settlement::Column::OwnerId.eq(owner_id))
        .filter(settlement::Column::Status.eq(SettlementStatus::Pending))
        .order_by_asc(settlement::Column::CreatedAt)
        .order_by_asc(settlement::Column::Id)
        .all(db)
        .await?;
    to_views(db, owner_id, owner_name, models).await
}

/// Net balances between every pair of parties, with display names.
#[instrument(skip(db, owner_name))]
pub async fn pending_balances(
    db: &DatabaseConnection,
    owner_id: &str,
    owner_name: &str,
) -> Result<Vec<PendingBalance>> {
    let txn = db.begin().await?;
    let net = balance::load_balance_sheet(&txn, owner_id).await?.net();
    let ids: Vec<i64> = net
        .iter()
        .flat_map(|b| [b.debtor.person_id(), b.creditor.person_id()])
        .flatten()
        .collect();
    let names = person::names_for(&txn, owner_id, &ids).await?;
    txn.commit().await?;

    Ok(net
        .into_iter()
        .map(|NetBalance { currency, debtor, creditor, amount_minor }| PendingBalance {
            from_person_id: debtor.person_id(),
            from_person_name: display_name(debtor, owner_name, &names),
            to_person_id: creditor.person_id(),
            to_person_name: display_name(creditor, owner_name, &names),
            amount: money::from_minor(amount_minor, &currency),
            currency,
        })
        .collect())
}
