use chrono::{SecondsFormat, Utc};
use entity::employees;
use serde::{Deserialize, Serialize};

/// Employee as returned to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    pub id: i32,
    pub name: String,
    /// RFC 3339, UTC, whole seconds.
    pub created_date: String,
}

impl From<employees::Model> for EmployeeView {
    fn from(model: employees::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            created_date: model
                .created_date
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// Create request. A missing or non-positive id lets the store assign one.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    #[serde(default)]
    pub id: Option<i32>,
    #[serde(default)]
    pub name: Option<String>,
}

impl NewEmployee {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: Some(name.into()),
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }
}

/// Update request; only the name is writable.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    pub id: i32,
    #[serde(default)]
    pub name: Option<String>,
}

impl EmployeeUpdate {
    pub fn rename(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }
}
