//! Member entity and its projection DTO.
//!
//! # Invariants
//! - `username` is non-empty and `age` is non-negative before save.
//! - `team_id` references a saved team or is `None`.

use crate::model::team::Team;
use crate::query::{
    Entity, EntityCacheContext, EntityMeta, FieldMeta, NamedQuery, Projectable, RawRow, ValueType,
};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub static MEMBER_META: EntityMeta = EntityMeta {
    kind: "Member",
    table: "member",
    id: FieldMeta {
        name: "id",
        column: "member_id",
        ty: ValueType::Integer,
        nullable: false,
    },
    fields: &[
        FieldMeta {
            name: "username",
            column: "username",
            ty: ValueType::Text,
            nullable: false,
        },
        FieldMeta {
            name: "age",
            column: "age",
            ty: ValueType::Integer,
            nullable: false,
        },
        FieldMeta {
            name: "teamId",
            column: "team_id",
            ty: ValueType::Integer,
            nullable: true,
        },
    ],
    named_queries: &[NamedQuery {
        name: "Member.findByUsername",
        template: "SELECT m.* FROM member m WHERE m.username = :username",
    }],
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: Option<i64>,
    pub username: String,
    pub age: i64,
    pub team_id: Option<i64>,
}

/// Validation failures for [`Member`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberValidationError {
    EmptyUsername,
    NegativeAge(i64),
}

impl Display for MemberValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUsername => write!(f, "username must not be empty"),
            Self::NegativeAge(age) => write!(f, "age must not be negative, got {age}"),
        }
    }
}

impl std::error::Error for MemberValidationError {}

impl Member {
    pub fn new(username: impl Into<String>, age: i64) -> Self {
        Self {
            id: None,
            username: username.into(),
            age,
            team_id: None,
        }
    }

    /// Creates an unsaved member already assigned to `team`.
    pub fn with_team(username: impl Into<String>, age: i64, team: &Team) -> Self {
        let mut member = Self::new(username, age);
        member.change_team(team);
        member
    }

    /// Moves the member to `team`; an unsaved team clears the reference.
    pub fn change_team(&mut self, team: &Team) {
        self.team_id = team.id;
    }

    pub fn validate(&self) -> Result<(), MemberValidationError> {
        if self.username.trim().is_empty() {
            return Err(MemberValidationError::EmptyUsername);
        }
        if self.age < 0 {
            return Err(MemberValidationError::NegativeAge(self.age));
        }
        Ok(())
    }
}

impl Entity for Member {
    fn meta() -> &'static EntityMeta {
        &MEMBER_META
    }

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn from_row(row: &RawRow) -> Result<Self, String> {
        Ok(Self {
            id: Some(row.get("member_id")?),
            username: row.get("username")?,
            age: row.get("age")?,
            team_id: row.get("team_id")?,
        })
    }

    fn validate(&self) -> Result<(), String> {
        Member::validate(self).map_err(|err| err.to_string())
    }

    fn column_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.username.clone()),
            Value::Integer(self.age),
            self.team_id.map_or(Value::Null, Value::Integer),
        ]
    }
}

/// Member joined with its team name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDto {
    pub id: i64,
    pub username: String,
    pub team_name: Option<String>,
}

impl From<&Member> for MemberDto {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.unwrap_or_default(),
            username: member.username.clone(),
            team_name: None,
        }
    }
}

impl Projectable for MemberDto {
    fn project(row: &RawRow, _cache: &mut EntityCacheContext) -> Result<Self, String> {
        let team_name = match row.column_index("team_name") {
            Some(index) => row.get_at(index)?,
            None => None,
        };
        Ok(Self {
            id: row.get("member_id")?,
            username: row.get("username")?,
            team_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Member, MemberValidationError, MEMBER_META};
    use crate::model::team::Team;

    #[test]
    fn validate_rejects_blank_names_and_negative_ages() {
        assert_eq!(
            Member::new("  ", 10).validate(),
            Err(MemberValidationError::EmptyUsername)
        );
        assert_eq!(
            Member::new("member1", -1).validate(),
            Err(MemberValidationError::NegativeAge(-1))
        );
        assert!(Member::new("member1", 0).validate().is_ok());
    }

    #[test]
    fn change_team_copies_the_team_id() {
        let mut team = Team::new("teamA");
        team.id = Some(4);
        let member = Member::with_team("member1", 10, &team);
        assert_eq!(member.team_id, Some(4));
    }

    #[test]
    fn meta_resolves_fields_by_property_name() {
        assert_eq!(MEMBER_META.field("teamId").unwrap().column, "team_id");
        assert_eq!(MEMBER_META.field("id").unwrap().column, "member_id");
        assert!(MEMBER_META.field("team_id").is_none());
        assert_eq!(MEMBER_META.select_list(), "member_id, username, age, team_id");
    }
}
