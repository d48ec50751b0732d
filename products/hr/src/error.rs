use sea_orm::DbErr;
use thiserror::Error;

use crate::validation::NameRejection;

pub type HrResult<T> = Result<T, HrError>;

#[derive(Debug, Error)]
pub enum HrError {
    #[error(transparent)]
    Rejected(#[from] NameRejection),
    #[error("Empleado no encontrado.")]
    NotFound,
    #[error("El id de empleado {0} ya está registrado.")]
    IdTaken(i32),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl HrError {
    pub fn rejection(&self) -> Option<NameRejection> {
        match self {
            HrError::Rejected(rejection) => Some(*rejection),
            _ => None,
        }
    }
}
