pub mod error;
pub mod filters;
pub mod models;
pub mod runtime;
pub mod validator;

pub use error::*;
pub use filters::*;
pub use models::*;
pub use runtime::*;
pub use validator::{matches, permitted_value, unique, FieldErrors, Validator, EMAIL_RX};
