use chrono::Utc;
use entity::employees;
use platform_db::{DbPool, advance_id_sequence, is_unique_violation};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, DbErr, EntityName, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::{
    employee::{EmployeeUpdate, EmployeeView, NewEmployee},
    error::{HrError, HrResult},
    validation::{NameRejection, validate_new_name},
};

const DEMO_NAMES: &[&str] = &["John Doe", "Jane Doe"];

/// How much checking an update performs before writing the new name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Same rules as create; uniqueness ignores the employee being renamed.
    #[default]
    Strict,
    /// Write any non-empty name as given. Meant for repairing legacy rows;
    /// the unique index still applies.
    Lenient,
}

impl UpdatePolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(UpdatePolicy::Strict),
            "lenient" => Some(UpdatePolicy::Lenient),
            _ => None,
        }
    }
}

/// CRUD over employee records.
#[derive(Clone, Debug)]
pub struct EmployeeService {
    db: DbPool,
    update_policy: UpdatePolicy,
}

impl EmployeeService {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            update_policy: UpdatePolicy::default(),
        }
    }

    pub fn with_update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn update_policy(&self) -> UpdatePolicy {
        self.update_policy
    }

    #[instrument(name = "hr.employees.list", skip(self))]
    pub async fn list(&self) -> HrResult<Vec<EmployeeView>> {
        let rows = employees::Entity::find().all(&self.db).await?;
        debug!(count = rows.len(), "employees listed");
        Ok(rows.into_iter().map(EmployeeView::from).collect())
    }

    /// `Ok(None)` when no employee has this id.
    #[instrument(name = "hr.employees.get", skip(self))]
    pub async fn get_by_id(&self, id: i32) -> HrResult<Option<EmployeeView>> {
        let row = employees::Entity::find_by_id(id).one(&self.db).await?;
        Ok(row.map(EmployeeView::from))
    }

    #[instrument(name = "hr.employees.create", skip(self, input), fields(requested_id = input.id))]
    pub async fn create(&self, input: NewEmployee) -> HrResult<EmployeeView> {
        let name = input.name.unwrap_or_default();
        let taken = self.names_held_by_others(&name, None).await?;
        if let Err(rejection) = validate_new_name(&name, taken.iter().map(String::as_str)) {
            warn!(code = rejection.code(), "employee name rejected");
            return Err(rejection.into());
        }

        let explicit_id = input.id.filter(|id| *id > 0);
        if let Some(id) = explicit_id {
            if employees::Entity::find_by_id(id).one(&self.db).await?.is_some() {
                warn!(id, "employee id already in use");
                return Err(HrError::IdTaken(id));
            }
        }

        let model = employees::ActiveModel {
            id: match explicit_id {
                Some(id) => Set(id),
                None => NotSet,
            },
            name: Set(name.clone()),
            created_date: Set(Utc::now().into()),
        };
        // The row and the sequence advance commit together.
        let txn = self.db.begin().await?;
        let created = match model.insert(&txn).await {
            Ok(created) => created,
            Err(err) if is_unique_violation(&err) => {
                txn.rollback().await?;
                return Err(self.conflict_error(err, &name, explicit_id).await);
            }
            Err(err) => return Err(err.into()),
        };
        if explicit_id.is_some() {
            advance_id_sequence(&txn, employees::Entity.table_name(), "id").await?;
        }
        txn.commit().await?;
        info!(id = created.id, "employee created");
        Ok(created.into())
    }

    /// Renames an employee. `id` and `created_date` never change.
    #[instrument(
        name = "hr.employees.update",
        skip(self, input),
        fields(id = input.id, policy = ?self.update_policy)
    )]
    pub async fn update(&self, input: EmployeeUpdate) -> HrResult<EmployeeView> {
        let Some(existing) = employees::Entity::find_by_id(input.id).one(&self.db).await? else {
            info!("update target not found");
            return Err(HrError::NotFound);
        };
        // Presence is checked under every policy.
        let Some(name) = input.name.filter(|name| !name.is_empty()) else {
            warn!(code = NameRejection::EmptyName.code(), "employee rename rejected");
            return Err(NameRejection::EmptyName.into());
        };

        if self.update_policy == UpdatePolicy::Strict {
            let taken = self.names_held_by_others(&name, Some(existing.id)).await?;
            if let Err(rejection) = validate_new_name(&name, taken.iter().map(String::as_str)) {
                warn!(code = rejection.code(), "employee rename rejected");
                return Err(rejection.into());
            }
        }

        let mut active: employees::ActiveModel = existing.into();
        active.name = Set(name);
        let updated = active.update(&self.db).await.map_err(rename_error)?;
        info!("employee updated");
        Ok(updated.into())
    }

    #[instrument(name = "hr.employees.delete", skip(self))]
    pub async fn delete(&self, id: i32) -> HrResult<()> {
        let result = employees::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            info!("delete target not found");
            return Err(HrError::NotFound);
        }
        info!("employee deleted");
        Ok(())
    }

    /// Inserts the demo employees that are not present yet.
    #[instrument(name = "hr.employees.seed", skip(self))]
    pub async fn seed_demo(&self) -> HrResult<Vec<EmployeeView>> {
        let mut created = Vec::new();
        for name in DEMO_NAMES {
            match self.create(NewEmployee::named(*name)).await {
                Ok(view) => created.push(view),
                Err(HrError::Rejected(NameRejection::DuplicateName)) => {
                    debug!(name, "demo employee already present");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(created)
    }

    async fn names_held_by_others(
        &self,
        name: &str,
        except_id: Option<i32>,
    ) -> Result<Vec<String>, DbErr> {
        let mut query = employees::Entity::find()
            .select_only()
            .column(employees::Column::Name)
            .filter(employees::Column::Name.eq(name));
        if let Some(id) = except_id {
            query = query.filter(employees::Column::Id.ne(id));
        }
        query.into_tuple::<String>().all(&self.db).await
    }

    /// Decides which uniqueness rule a rejected insert broke.
    async fn conflict_error(&self, err: DbErr, name: &str, explicit_id: Option<i32>) -> HrError {
        match self.names_held_by_others(name, None).await {
            Ok(names) if !names.is_empty() => {
                warn!("concurrent create took the name first");
                NameRejection::DuplicateName.into()
            }
            _ => match explicit_id {
                Some(id) => HrError::IdTaken(id),
                None => err.into(),
            },
        }
    }
}

/// Maps a failed rename write onto the domain error it stands for.
fn rename_error(err: DbErr) -> HrError {
    if is_unique_violation(&err) {
        warn!("rename collided with an existing name");
        return NameRejection::DuplicateName.into();
    }
    match err {
        // Deleted between the lookup and the write.
        DbErr::RecordNotUpdated => {
            info!("update target disappeared");
            HrError::NotFound
        }
        other => other.into(),
    }
}
