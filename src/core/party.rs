//! Parties of a debt and person references as they arrive on the wire.

use serde::{Deserialize, Serialize};

/// One side of a debt or a settlement.
///
/// A `None` person id in storage stands for the owning user. `Owner` sorts
/// before every person so reports list the owner first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Party {
    /// The account holder
    Owner,
    /// A person from the owner's directory
    Person(i64),
}

impl Party {
    /// Maps a stored person id onto a party.
    #[must_use]
    pub const fn from_person_id(person_id: Option<i64>) -> Self {
        match person_id {
            Some(id) => Self::Person(id),
            None => Self::Owner,
        }
    }

    /// Stored form of the party.
    #[must_use]
    pub const fn person_id(self) -> Option<i64> {
        match self {
            Self::Owner => None,
            Self::Person(id) => Some(id),
        }
    }
}

/// Id and display name of a person, as embedded in responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSummary {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// A person given either as a bare id or as an expanded object.
///
/// Clients echo back whatever shape they last received, so both are accepted
/// and collapsed to the id before anything else looks at them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersonRef {
    Reference(i64),
    Expanded(PersonSummary),
}

impl PersonRef {
    /// Id of the referenced person.
    #[must_use]
    pub const fn id(&self) -> i64 {
        match self {
            Self::Reference(id) => *id,
            Self::Expanded(summary) => summary.id,
        }
    }
}

impl From<i64> for PersonRef {
    fn from(id: i64) -> Self {
        Self::Reference(id)
    }
}

/// Collapses an optional reference to its id.
#[must_use]
pub fn resolve(reference: Option<&PersonRef>) -> Option<i64> {
    reference.map(PersonRef::id)
}
