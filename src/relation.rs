//! Tagged many-to-one references
//!
//! The server represents a many-to-one link as `false` when unset, a bare
//! integer id, or a two-element `[id, label]` pair depending on whether the
//! field was requested with its label. Normalizing at the deserialization
//! boundary means no downstream code branches on array length.

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

/// A many-to-one field value as returned by the server
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Relation {
    /// The field is not set (wire value `false`)
    #[default]
    Unset,
    /// Bare record id
    Id(i64),
    /// Record id with its display label
    IdWithLabel(i64, String),
}

impl Relation {
    /// Referenced record id, if the field is set
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Unset => None,
            Self::Id(id) | Self::IdWithLabel(id, _) => Some(*id),
        }
    }

    /// Display label, if the field was requested with one
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::IdWithLabel(_, label) => Some(label),
            _ => None,
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, Self::Unset)
    }
}

impl Serialize for Relation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Unset => serializer.serialize_bool(false),
            Self::Id(id) => serializer.serialize_i64(*id),
            Self::IdWithLabel(id, label) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(id)?;
                seq.serialize_element(label)?;
                seq.end()
            }
        }
    }
}

struct RelationVisitor;

impl<'de> Visitor<'de> for RelationVisitor {
    type Value = Relation;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("false, an integer id, or an [id, label] pair")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Relation, E> {
        if value {
            Err(E::custom("relation fields are never `true`"))
        } else {
            Ok(Relation::Unset)
        }
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Relation, E> {
        Ok(Relation::Id(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Relation, E> {
        i64::try_from(value)
            .map(Relation::Id)
            .map_err(|_| E::custom("relation id out of range"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Relation, E> {
        Ok(Relation::Unset)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Relation, A::Error> {
        let id: i64 = seq
            .next_element()?
            .ok_or_else(|| de::Error::custom("relation pair is missing its id"))?;
        let label: String = seq
            .next_element()?
            .ok_or_else(|| de::Error::custom("relation pair is missing its label"))?;
        if seq.next_element::<serde_json::Value>()?.is_some() {
            return Err(de::Error::custom("relation pair has more than two elements"));
        }
        Ok(Relation::IdWithLabel(id, label))
    }
}

impl<'de> Deserialize<'de> for Relation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RelationVisitor)
    }
}
