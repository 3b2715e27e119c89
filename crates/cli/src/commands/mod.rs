pub mod inspect;
pub mod policy;
pub mod validate;

pub use inspect::*;
pub use policy::*;
pub use validate::*;
