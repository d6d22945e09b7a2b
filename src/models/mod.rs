pub mod appointment;
pub mod audit;
pub mod enums;
pub mod filters;
pub mod medical_record;
pub mod payment;
pub mod user;

pub use appointment::*;
pub use audit::*;
pub use enums::*;
pub use filters::*;
pub use medical_record::*;
pub use payment::*;
pub use user::*;
