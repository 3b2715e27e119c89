pub mod diff;
pub mod validator;
