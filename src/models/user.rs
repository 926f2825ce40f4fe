//! The user record.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::query::SqlValue;
use crate::models::record::{ColumnDef, ColumnType, Draft, Patch, Record, RecordMeta};

const NAME_TYPE: ColumnType = ColumnType::Text { max_len: 255 };

/// An application user. Stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub name: String,
    pub last_name: Option<String>,
}

impl Record for User {
    type Draft = NewUser;
    type Patch = UserPatch;

    const COLUMNS: &'static [ColumnDef] = &[
        ColumnDef::required("email", NAME_TYPE).unique(),
        ColumnDef::required("hashed_password", NAME_TYPE),
        ColumnDef::required("name", NAME_TYPE),
        ColumnDef::optional("last_name", NAME_TYPE),
    ];

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<User(id={}, email={}, name={})>",
            self.meta.id, self.email, self.name
        )
    }
}

/// Fields for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub id: Option<Uuid>,
    pub email: String,
    pub hashed_password: String,
    pub name: String,
    pub last_name: Option<String>,
}

impl NewUser {
    pub fn new(
        email: impl Into<String>,
        hashed_password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            email: email.into(),
            hashed_password: hashed_password.into(),
            name: name.into(),
            last_name: None,
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }
}

impl Draft for NewUser {
    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("email", self.email.clone().into()),
            ("hashed_password", self.hashed_password.clone().into()),
            ("name", self.name.clone().into()),
            ("last_name", self.last_name.clone().into()),
        ]
    }
}

/// Changes to a user. `last_name: Some(None)` clears the last name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub hashed_password: Option<String>,
    pub name: Option<String>,
    pub last_name: Option<Option<String>>,
}

impl Patch for UserPatch {
    fn changes(&self) -> Vec<(&'static str, SqlValue)> {
        let mut changes = Vec::new();
        if let Some(email) = &self.email {
            changes.push(("email", email.clone().into()));
        }
        if let Some(hashed_password) = &self.hashed_password {
            changes.push(("hashed_password", hashed_password.clone().into()));
        }
        if let Some(name) = &self.name {
            changes.push(("name", name.clone().into()));
        }
        if let Some(last_name) = &self.last_name {
            changes.push(("last_name", last_name.clone().into()));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_table_name() {
        assert_eq!(User::table_name(), "users");
    }

    #[test]
    fn test_draft_values_cover_columns() {
        let draft = NewUser::new("a@x.com", "h1", "A");
        let values = draft.values();
        let names: Vec<_> = values.iter().map(|(name, _)| *name).collect();
        let declared: Vec<_> = User::COLUMNS.iter().map(|c| c.name).collect();
        assert_eq!(names, declared);
        assert_eq!(values[3].1, SqlValue::Null);
        assert!(draft.id().is_none());
    }

    #[test]
    fn test_patch_only_lists_set_fields() {
        let patch = UserPatch {
            name: Some("B".to_string()),
            last_name: Some(None),
            ..UserPatch::default()
        };
        assert_eq!(
            patch.changes(),
            vec![
                ("name", SqlValue::Text("B".to_string())),
                ("last_name", SqlValue::Null),
            ]
        );
        assert!(UserPatch::default().changes().is_empty());
    }

    #[test]
    fn test_display_and_serialize_hide_password() {
        let now = Utc::now();
        let user = User {
            meta: RecordMeta {
                id: Uuid::nil(),
                created_at: now,
                updated_at: now,
            },
            email: "a@x.com".to_string(),
            hashed_password: "h1".to_string(),
            name: "A".to_string(),
            last_name: None,
        };
        assert!(user.to_string().contains("email=a@x.com"));
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("hashed_password").is_none());
        assert_eq!(json["id"], Uuid::nil().to_string());
    }
}
