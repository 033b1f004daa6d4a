pub mod ddl;
pub mod env;
pub mod error;
pub mod loader;
pub mod validator;
