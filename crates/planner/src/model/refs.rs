//! Serde helpers for the `{ "id": .. }` reference objects the entity store nests in records.

use super::Id;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Serialize, Deserialize)]
struct EntityRef {
    id: Id,
}

pub fn serialize<S: Serializer>(id: &Id, serializer: S) -> Result<S::Ok, S::Error> {
    EntityRef { id: *id }.serialize(serializer)
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Id, D::Error> {
    EntityRef::deserialize(deserializer).map(|r| r.id)
}

/// Same shape for optional references; `null` and a missing field both read as `None`.
pub mod option {
    use super::{EntityRef, Id};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(id: &Option<Id>, serializer: S) -> Result<S::Ok, S::Error> {
        id.map(|id| EntityRef { id }).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Id>, D::Error> {
        Option::<EntityRef>::deserialize(deserializer).map(|r| r.map(|r| r.id))
    }
}
