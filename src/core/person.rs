//! People business logic - the owner's directory of counterparties.
//!
//! People are never removed: deleting one deactivates it so historical splits
//! and settlements keep resolving their names. Spending limits are checked on
//! request against expenses attributed to the person in the limit's current
//! period.

use crate::{
    core::money,
    entities::{
        Person, PersonLimit, Transaction,
        person::{self, LimitPeriod, PersonKind},
        person_limit,
        transaction::{self, SplitType, TransactionStatus, TransactionType},
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info};

const UNCATEGORIZED: &str = "Uncategorized";

/// One per-category limit in a request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLimitInput {
    pub category: String,
    pub amount: Decimal,
    pub period: LimitPeriod,
}

/// Request to add a person.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PersonKind,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub overall_limit: Option<Decimal>,
    #[serde(default)]
    pub limit_period: Option<LimitPeriod>,
    #[serde(default)]
    pub limit_currency: Option<String>,
    #[serde(default)]
    pub category_limits: Vec<CategoryLimitInput>,
}

/// Partial update of a person. Absent fields are left alone; a present
/// `categoryLimits` list replaces the stored one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonUpdate {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PersonKind>,
    pub notes: Option<String>,
    pub overall_limit: Option<Decimal>,
    pub limit_period: Option<LimitPeriod>,
    pub limit_currency: Option<String>,
    pub category_limits: Option<Vec<CategoryLimitInput>>,
    pub is_active: Option<bool>,
}

/// Category limit as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLimitView {
    pub category: String,
    pub amount: Decimal,
    pub period: LimitPeriod,
}

/// Person as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PersonKind,
    pub notes: Option<String>,
    pub overall_limit: Option<Decimal>,
    pub limit_period: Option<LimitPeriod>,
    pub limit_currency: Option<String>,
    pub category_limits: Vec<CategoryLimitView>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonView {
    /// Combines a person row with its category limits.
    #[must_use]
    pub fn new(model: person::Model, limits: Vec<person_limit::Model>) -> Self {
        let currency = model.limit_currency.clone().unwrap_or_default();
        Self {
            overall_limit: model
                .overall_limit_minor
                .map(|units| money::from_minor(units, &currency)),
            category_limits: limits
                .into_iter()
                .map(|limit| CategoryLimitView {
                    amount: money::from_minor(limit.amount_minor, &currency),
                    category: limit.category,
                    period: limit.period,
                })
                .collect(),
            id: model.id,
            name: model.name,
            kind: model.kind,
            notes: model.notes,
            limit_period: model.limit_period,
            limit_currency: model.limit_currency,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Spending of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpending {
    pub category: String,
    pub amount: Decimal,
}

/// Spending in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencySpending {
    pub currency: String,
    pub total: Decimal,
    pub transaction_count: usize,
    pub by_category: Vec<CategorySpending>,
}

/// Expenses attributed to a person over an optional date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingSummary {
    pub person_id: i64,
    pub person_name: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub totals: Vec<CurrencySpending>,
}

/// State of one limit for a prospective expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitStatus {
    /// `None` for the overall limit
    pub category: Option<String>,
    pub period: LimitPeriod,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub limit: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percentage: Decimal,
    pub breached: bool,
}

/// Result of [`check_limits`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitCheck {
    pub person_id: i64,
    pub currency: Option<String>,
    pub amount: Decimal,
    pub limits: Vec<LimitStatus>,
    pub any_breached: bool,
}

struct ValidatedLimits {
    overall_limit_minor: Option<i64>,
    limit_period: Option<LimitPeriod>,
    limit_currency: Option<String>,
    category_limits: Vec<(String, i64, LimitPeriod)>,
}

fn validate_limits(
    overall_limit: Option<Decimal>,
    limit_period: Option<LimitPeriod>,
    limit_currency: Option<&str>,
    category_limits: &[CategoryLimitInput],
) -> Result<ValidatedLimits> {
    let needs_currency = overall_limit.is_some() || !category_limits.is_empty();
    let limit_currency = match limit_currency {
        Some(code) => Some(money::normalize_currency(code)?),
        None if needs_currency => {
            return Err(Error::validation(
                "limitCurrency",
                "Spending limits need a currency",
            ));
        }
        None => None,
    };
    let currency = limit_currency.as_deref().unwrap_or_default();

    let overall_limit_minor = match overall_limit {
        Some(amount) => {
            if limit_period.is_none() {
                return Err(Error::validation(
                    "limitPeriod",
                    "An overall limit needs a period",
                ));
            }
            Some(money::positive_minor(amount, currency, "overallLimit")?)
        }
        None => None,
    };

    let mut seen = HashSet::new();
    let mut validated = Vec::with_capacity(category_limits.len());
    for limit in category_limits {
        let category = limit.category.trim();
        if category.is_empty() {
            return Err(Error::validation(
                "categoryLimits",
                "Category limits need a category",
            ));
        }
        if !seen.insert(category.to_lowercase()) {
            return Err(Error::validation(
                "categoryLimits",
                format!("Category '{category}' has more than one limit"),
            ));
        }
        let amount = money::positive_minor(limit.amount, currency, "categoryLimits")?;
        validated.push((category.to_string(), amount, limit.period));
    }

    Ok(ValidatedLimits {
        overall_limit_minor,
        limit_period: overall_limit.and(limit_period),
        limit_currency,
        category_limits: validated,
    })
}

async fn replace_category_limits<C>(
    conn: &C,
    person_id: i64,
    limits: &[(String, i64, LimitPeriod)],
) -> Result<()>
where
    C: ConnectionTrait,
{
    PersonLimit::delete_many()
        .filter(person_limit::Column::PersonId.eq(person_id))
        .exec(conn)
        .await?;
    for (category, amount_minor, period) in limits {
        person_limit::ActiveModel {
            person_id: Set(person_id),
            category: Set(category.clone()),
            amount_minor: Set(*amount_minor),
            period: Set(*period),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn category_limits_of<C>(conn: &C, person_id: i64) -> Result<Vec<person_limit::Model>>
where
    C: ConnectionTrait,
{
    PersonLimit::find()
        .filter(person_limit::Column::PersonId.eq(person_id))
        .order_by_asc(person_limit::Column::Id)
        .all(conn)
        .await
        .map_err(Into::into)
}

/// Adds a person with optional spending limits.
pub async fn create_person(
    db: &DatabaseConnection,
    owner_id: &str,
    request: NewPerson,
) -> Result<PersonView> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "Person name cannot be empty"));
    }
    let limits = validate_limits(
        request.overall_limit,
        request.limit_period,
        request.limit_currency.as_deref(),
        &request.category_limits,
    )?;

    let txn = db.begin().await?;
    let now = Utc::now();
    let model = person::ActiveModel {
        owner_id: Set(owner_id.to_string()),
        name: Set(name.to_string()),
        kind: Set(request.kind),
        notes: Set(request.notes),
        overall_limit_minor: Set(limits.overall_limit_minor),
        limit_period: Set(limits.limit_period),
        limit_currency: Set(limits.limit_currency),
        is_active: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    replace_category_limits(&txn, model.id, &limits.category_limits).await?;
    let stored = category_limits_of(&txn, model.id).await?;
    txn.commit().await?;

    info!(person_id = model.id, "Added person '{}'", model.name);
    Ok(PersonView::new(model, stored))
}

/// Finds one of the owner's people, active or not.
pub async fn require_person<C>(conn: &C, owner_id: &str, person_id: i64) -> Result<person::Model>
where
    C: ConnectionTrait,
{
    Person::find_by_id(person_id)
        .filter(person::Column::OwnerId.eq(owner_id))
        .one(conn)
        .await?
        .ok_or(Error::PersonNotFound { id: person_id })
}

/// Finds a person that new records may reference.
pub async fn require_active_person<C>(
    conn: &C,
    owner_id: &str,
    person_id: i64,
) -> Result<person::Model>
where
    C: ConnectionTrait,
{
    let person = require_person(conn, owner_id, person_id).await?;
    if !person.is_active {
        return Err(Error::validation(
            "personId",
            format!("Person {person_id} is inactive"),
        ));
    }
    Ok(person)
}

/// Loads active people in the order of `ids`; the first unknown id fails.
pub async fn require_people<C>(
    conn: &C,
    owner_id: &str,
    ids: &[i64],
) -> Result<Vec<person::Model>>
where
    C: ConnectionTrait,
{
    let found: HashMap<i64, person::Model> = Person::find()
        .filter(person::Column::OwnerId.eq(owner_id))
        .filter(person::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    ids.iter()
        .map(|id| {
            let person = found
                .get(id)
                .cloned()
                .ok_or(Error::PersonNotFound { id: *id })?;
            if !person.is_active {
                return Err(Error::validation(
                    "personIds",
                    format!("Person {id} is inactive"),
                ));
            }
            Ok(person)
        })
        .collect()
}

/// Display names of the given people, including inactive ones.
pub async fn names_for<C>(conn: &C, owner_id: &str, ids: &[i64]) -> Result<BTreeMap<i64, String>>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(Person::find()
        .filter(person::Column::OwnerId.eq(owner_id))
        .filter(person::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p.name))
        .collect())
}

/// Lists people ordered by name.
pub async fn list_people(
    db: &DatabaseConnection,
    owner_id: &str,
    include_inactive: bool,
) -> Result<Vec<PersonView>> {
    let mut query = Person::find().filter(person::Column::OwnerId.eq(owner_id));
    if !include_inactive {
        query = query.filter(person::Column::IsActive.eq(true));
    }
    let people = query.order_by_asc(person::Column::Name).all(db).await?;

    let mut limits: HashMap<i64, Vec<person_limit::Model>> = HashMap::new();
    let all_limits = PersonLimit::find()
        .filter(person_limit::Column::PersonId.is_in(people.iter().map(|p| p.id)))
        .order_by_asc(person_limit::Column::Id)
        .all(db)
        .await?;
    for limit in all_limits {
        limits.entry(limit.person_id).or_default().push(limit);
    }

    Ok(people
        .into_iter()
        .map(|p| {
            let own = limits.remove(&p.id).unwrap_or_default();
            PersonView::new(p, own)
        })
        .collect())
}

/// Retrieves a person with their limits.
pub async fn get_person(
    db: &DatabaseConnection,
    owner_id: &str,
    person_id: i64,
) -> Result<PersonView> {
    let person = require_person(db, owner_id, person_id).await?;
    let limits = category_limits_of(db, person_id).await?;
    Ok(PersonView::new(person, limits))
}

/// Applies a partial update.
pub async fn update_person(
    db: &DatabaseConnection,
    owner_id: &str,
    person_id: i64,
    update: PersonUpdate,
) -> Result<PersonView> {
    let txn = db.begin().await?;
    let existing = require_person(&txn, owner_id, person_id).await?;
    let current_limits = category_limits_of(&txn, person_id).await?;
    let current_view = PersonView::new(existing.clone(), current_limits);

    let category_inputs: Vec<CategoryLimitInput> = match update.category_limits {
        Some(inputs) => inputs,
        None => current_view
            .category_limits
            .iter()
            .map(|l| CategoryLimitInput {
                category: l.category.clone(),
                amount: l.amount,
                period: l.period,
            })
            .collect(),
    };
    let limits = validate_limits(
        update.overall_limit.or(current_view.overall_limit),
        update.limit_period.or(current_view.limit_period),
        update
            .limit_currency
            .as_deref()
            .or(current_view.limit_currency.as_deref()),
        &category_inputs,
    )?;

    let mut active: person::ActiveModel = existing.into();
    if let Some(name) = update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "Person name cannot be empty"));
        }
        active.name = Set(name.to_string());
    }
    if let Some(kind) = update.kind {
        active.kind = Set(kind);
    }
    if let Some(notes) = update.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(is_active) = update.is_active {
        active.is_active = Set(is_active);
    }
    active.overall_limit_minor = Set(limits.overall_limit_minor);
    active.limit_period = Set(limits.limit_period);
    active.limit_currency = Set(limits.limit_currency);
    active.updated_at = Set(Utc::now());
    let model = active.update(&txn).await?;

    replace_category_limits(&txn, person_id, &limits.category_limits).await?;
    let stored = category_limits_of(&txn, person_id).await?;
    txn.commit().await?;

    debug!(person_id, "Updated person");
    Ok(PersonView::new(model, stored))
}

/// Deactivates a person. History keeps pointing at the row.
pub async fn delete_person(db: &DatabaseConnection, owner_id: &str, person_id: i64) -> Result<()> {
    let existing = require_person(db, owner_id, person_id).await?;
    let mut active: person::ActiveModel = existing.into();
    active.is_active = Set(false);
    active.updated_at = Set(Utc::now());
    active.update(db).await?;
    info!(person_id, "Deactivated person");
    Ok(())
}

/// Live expenses attributed to a person: plain expenses naming them and
/// split children allocated to them. Parent splits name the payer and
/// settlement cash movements are repayments, so neither counts.
async fn attributed_expenses<C>(
    conn: &C,
    owner_id: &str,
    person_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<transaction::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Transaction::find()
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .filter(transaction::Column::PersonId.eq(person_id))
        .filter(transaction::Column::TransactionType.eq(TransactionType::Expense))
        .filter(transaction::Column::SplitType.eq(SplitType::NotSplit))
        .filter(transaction::Column::Status.ne(TransactionStatus::Cancelled))
        .filter(transaction::Column::DeletedAt.is_null());
    if let Some(from) = from {
        query = query.filter(transaction::Column::Date.gte(from));
    }
    if let Some(to) = to {
        query = query.filter(transaction::Column::Date.lte(to));
    }
    Ok(query
        .order_by_asc(transaction::Column::Date)
        .all(conn)
        .await?
        .into_iter()
        .filter(|tx| tx.parent_transaction_id.is_some() || tx.settlement_id.is_none())
        .collect())
}

/// Totals of expenses attributed to a person, per currency and category.
pub async fn spending_summary(
    db: &DatabaseConnection,
    owner_id: &str,
    person_id: i64,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<SpendingSummary> {
    let person = require_person(db, owner_id, person_id).await?;
    let expenses = attributed_expenses(db, owner_id, person_id, from, to).await?;

    let mut buckets: BTreeMap<String, (i64, usize, BTreeMap<String, i64>)> = BTreeMap::new();
    for tx in &expenses {
        let bucket = buckets.entry(tx.currency.clone()).or_default();
        bucket.0 += tx.amount_minor;
        bucket.1 += 1;
        let category = tx
            .category
            .clone()
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        *bucket.2.entry(category).or_default() += tx.amount_minor;
    }

    let totals = buckets
        .into_iter()
        .map(|(currency, (total, count, categories))| CurrencySpending {
            total: money::from_minor(total, &currency),
            transaction_count: count,
            by_category: categories
                .into_iter()
                .map(|(category, amount)| CategorySpending {
                    category,
                    amount: money::from_minor(amount, &currency),
                })
                .collect(),
            currency,
        })
        .collect();

    Ok(SpendingSummary {
        person_id,
        person_name: person.name,
        from,
        to,
        totals,
    })
}

/// Inclusive first and last day of the period containing `today`.
pub fn period_bounds(period: LimitPeriod, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let out_of_range = || Error::validation("date", format!("{today} is out of range"));
    let (start, end) = match period {
        LimitPeriod::Daily => (today, today),
        LimitPeriod::Weekly => {
            let start = today
                .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
                .ok_or_else(out_of_range)?;
            (start, start.checked_add_days(Days::new(6)).ok_or_else(out_of_range)?)
        }
        LimitPeriod::Monthly => {
            let start = today.with_day(1).ok_or_else(out_of_range)?;
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            let next = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(out_of_range)?;
            (start, next.pred_opt().ok_or_else(out_of_range)?)
        }
        LimitPeriod::Yearly => (
            NaiveDate::from_ymd_opt(today.year(), 1, 1).ok_or_else(out_of_range)?,
            NaiveDate::from_ymd_opt(today.year(), 12, 31).ok_or_else(out_of_range)?,
        ),
    };
    Ok((start, end))
}

fn percentage_of(used: i64, limit: i64) -> Decimal {
    if limit == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(used) * Decimal::ONE_HUNDRED / Decimal::from(limit))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Checks a prospective expense of `amount` against every limit of a person.
///
/// The overall limit always sees the amount; a category limit only when
/// `category` names it. Spending is counted in the period containing `today`.
pub async fn check_limits(
    db: &DatabaseConnection,
    owner_id: &str,
    person_id: i64,
    amount: Decimal,
    category: Option<&str>,
    today: NaiveDate,
) -> Result<LimitCheck> {
    let person = require_person(db, owner_id, person_id).await?;
    let Some(currency) = person.limit_currency.clone() else {
        return Ok(LimitCheck {
            person_id,
            currency: None,
            amount,
            limits: Vec::new(),
            any_breached: false,
        });
    };
    let amount_minor = money::non_negative_minor(amount, &currency, "amount")?;
    let category = category.map(str::trim).filter(|c| !c.is_empty());

    let mut checks: Vec<(Option<String>, LimitPeriod, i64, bool)> = Vec::new();
    if let (Some(limit), Some(period)) = (person.overall_limit_minor, person.limit_period) {
        checks.push((None, period, limit, true));
    }
    for limit in category_limits_of(db, person_id).await? {
        let applies = category.is_some_and(|c| c.eq_ignore_ascii_case(&limit.category));
        checks.push((Some(limit.category), limit.period, limit.amount_minor, applies));
    }

    let mut limits = Vec::with_capacity(checks.len());
    for (limit_category, period, limit_minor, applies) in checks {
        let (start, end) = period_bounds(period, today)?;
        let spent: i64 = attributed_expenses(db, owner_id, person_id, Some(start), Some(end))
            .await?
            .iter()
            .filter(|tx| tx.currency == currency)
            .filter(|tx| match &limit_category {
                None => true,
                Some(name) => tx
                    .category
                    .as_deref()
                    .is_some_and(|c| c.eq_ignore_ascii_case(name)),
            })
            .map(|tx| tx.amount_minor)
            .sum();
        let projected = spent + if applies { amount_minor } else { 0 };
        limits.push(LimitStatus {
            category: limit_category,
            period,
            period_start: start,
            period_end: end,
            limit: money::from_minor(limit_minor, &currency),
            spent: money::from_minor(spent, &currency),
            remaining: money::from_minor(limit_minor - projected, &currency),
            percentage: percentage_of(projected, limit_minor),
            breached: projected > limit_minor,
        });
    }

    let any_breached = limits.iter().any(|l| l.breached);
    Ok(LimitCheck {
        person_id,
        currency: Some(currency),
        amount,
        limits,
        any_breached,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::transaction::{self as ledger, NewTransaction};
    use crate::test_utils::*;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn friend(name: &str) -> NewPerson {
        NewPerson {
            name: name.to_string(),
            kind: PersonKind::Friend,
            notes: None,
            overall_limit: None,
            limit_period: None,
            limit_currency: None,
            category_limits: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_person_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_person(&db, OWNER, friend(" ")).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let mut no_currency = friend("Ravi");
        no_currency.overall_limit = Some(dec!(100));
        no_currency.limit_period = Some(LimitPeriod::Monthly);
        let result = create_person(&db, OWNER, no_currency).await;
        assert_eq!(result.unwrap_err().field(), Some("limitCurrency"));

        let mut no_period = friend("Ravi");
        no_period.overall_limit = Some(dec!(100));
        no_period.limit_currency = Some("INR".to_string());
        let result = create_person(&db, OWNER, no_period).await;
        assert_eq!(result.unwrap_err().field(), Some("limitPeriod"));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_update_and_deactivate() -> Result<()> {
        let db = setup_test_db().await?;
        let mut request = friend("Asha");
        request.limit_currency = Some("inr".to_string());
        request.category_limits = vec![CategoryLimitInput {
            category: "Food".to_string(),
            amount: dec!(2000),
            period: LimitPeriod::Monthly,
        }];
        let created = create_person(&db, OWNER, request).await?;
        assert_eq!(created.limit_currency.as_deref(), Some("INR"));
        assert_eq!(created.category_limits.len(), 1);
        assert_eq!(created.category_limits[0].amount, dec!(2000));

        let updated = update_person(
            &db,
            OWNER,
            created.id,
            PersonUpdate {
                name: Some("Asha K".to_string()),
                ..PersonUpdate::default()
            },
        )
        .await?;
        assert_eq!(updated.name, "Asha K");
        assert_eq!(updated.category_limits.len(), 1);

        delete_person(&db, OWNER, created.id).await?;
        assert!(list_people(&db, OWNER, false).await?.is_empty());
        let all = list_people(&db, OWNER, true).await?;
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active);

        let result = require_active_person(&db, OWNER, created.id).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_require_people_preserves_order_and_reports_missing() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_person(&db, "A").await?;
        let b = create_test_person(&db, "B").await?;

        let people = require_people(&db, OWNER, &[b.id, a.id]).await?;
        assert_eq!(people.iter().map(|p| p.id).collect::<Vec<_>>(), vec![b.id, a.id]);

        let result = require_people(&db, OWNER, &[a.id, 999]).await;
        assert!(matches!(result, Err(Error::PersonNotFound { id: 999 })));

        let result = require_people(&db, OTHER_OWNER, &[a.id]).await;
        assert!(matches!(result, Err(Error::PersonNotFound { .. })));
        Ok(())
    }

    #[test]
    fn test_period_bounds() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap(); // Wednesday
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();

        assert_eq!(period_bounds(LimitPeriod::Daily, today).unwrap(), (today, today));
        assert_eq!(
            period_bounds(LimitPeriod::Weekly, today).unwrap(),
            (d(2024, 2, 12), d(2024, 2, 18))
        );
        assert_eq!(
            period_bounds(LimitPeriod::Monthly, today).unwrap(),
            (d(2024, 2, 1), d(2024, 2, 29))
        );
        assert_eq!(
            period_bounds(LimitPeriod::Monthly, d(2024, 12, 3)).unwrap(),
            (d(2024, 12, 1), d(2024, 12, 31))
        );
        assert_eq!(
            period_bounds(LimitPeriod::Yearly, today).unwrap(),
            (d(2024, 1, 1), d(2024, 12, 31))
        );
    }

    #[tokio::test]
    async fn test_spending_summary_and_limits() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_test_account(&db, "INR").await?;
        let mut request = friend("Kid");
        request.kind = PersonKind::Child;
        request.overall_limit = Some(dec!(1000));
        request.limit_period = Some(LimitPeriod::Monthly);
        request.limit_currency = Some("INR".to_string());
        request.category_limits = vec![CategoryLimitInput {
            category: "Snacks".to_string(),
            amount: dec!(300),
            period: LimitPeriod::Monthly,
        }];
        let kid = create_person(&db, OWNER, request).await?;
        let today = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();

        for (amount, category) in [(dec!(250), "Snacks"), (dec!(400), "Books")] {
            ledger::create_transaction(
                &db,
                OWNER,
                NewTransaction {
                    account_id: account.id,
                    account_type: None,
                    transaction_type: TransactionType::Expense,
                    amount,
                    currency: None,
                    description: category.to_string(),
                    category: Some(category.to_string()),
                    notes: None,
                    person_id: Some(kid.id.into()),
                    date: Some(today),
                    status: None,
                    transfer_to_account_id: None,
                    group_id: None,
                },
            )
            .await?;
        }

        let summary = spending_summary(&db, OWNER, kid.id, None, None).await?;
        assert_eq!(summary.totals.len(), 1);
        assert_eq!(summary.totals[0].total, dec!(650));
        assert_eq!(summary.totals[0].transaction_count, 2);
        assert_eq!(summary.totals[0].by_category.len(), 2);

        let check = check_limits(&db, OWNER, kid.id, dec!(100), Some("snacks"), today).await?;
        assert_eq!(check.limits.len(), 2);
        let overall = &check.limits[0];
        assert_eq!(overall.spent, dec!(650));
        assert_eq!(overall.remaining, dec!(250));
        assert_eq!(overall.percentage, dec!(75));
        assert!(!overall.breached);
        let snacks = &check.limits[1];
        assert_eq!(snacks.spent, dec!(250));
        assert!(snacks.breached);
        assert!(check.any_breached);
        Ok(())
    }
}
