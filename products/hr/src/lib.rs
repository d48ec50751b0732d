//! HR vertical slice: employee records.
//!
//! [`validation`] holds the name rules shared by every surface that accepts an
//! employee name; [`EmployeeService`] is the CRUD store built on top of them.

pub mod employee;
pub mod error;
pub mod service;
pub mod validation;

pub use employee::{EmployeeUpdate, EmployeeView, NewEmployee};
pub use error::{HrError, HrResult};
pub use service::{EmployeeService, UpdatePolicy};
pub use validation::{NameRejection, validate_name_shape, validate_new_name};
