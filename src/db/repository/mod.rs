//! Repository layer — entity-scoped database operations.
//!
//! Free functions over `&Connection`, one module per entity. All public
//! functions are re-exported here.

mod appointment;
mod audit;
mod medical_record;
mod payment;
mod session;
mod user;

pub use appointment::*;
pub use audit::*;
pub use medical_record::*;
pub use payment::*;
pub use session::*;
pub use user::*;
