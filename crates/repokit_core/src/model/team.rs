//! Team entity.

use crate::query::{Entity, EntityMeta, FieldMeta, RawRow, ValueType};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

pub static TEAM_META: EntityMeta = EntityMeta {
    kind: "Team",
    table: "team",
    id: FieldMeta {
        name: "id",
        column: "team_id",
        ty: ValueType::Integer,
        nullable: false,
    },
    fields: &[
        FieldMeta {
            name: "name",
            column: "name",
            ty: ValueType::Text,
            nullable: false,
        },
        FieldMeta {
            name: "nationality",
            column: "nationality",
            ty: ValueType::Text,
            nullable: true,
        },
    ],
    named_queries: &[],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: Option<i64>,
    pub name: String,
    pub nationality: Option<String>,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            nationality: None,
        }
    }

    pub fn with_nationality(name: impl Into<String>, nationality: impl Into<String>) -> Self {
        Self {
            nationality: Some(nationality.into()),
            ..Self::new(name)
        }
    }
}

impl Entity for Team {
    fn meta() -> &'static EntityMeta {
        &TEAM_META
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn from_row(row: &RawRow) -> Result<Self, String> {
        Ok(Self {
            id: Some(row.get("team_id")?),
            name: row.get("name")?,
            nationality: row.get("nationality")?,
        })
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            self.nationality.clone().map_or(Value::Null, Value::Text),
        ]
    }
}
