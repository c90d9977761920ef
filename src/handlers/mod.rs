pub mod admin_handlers;
pub mod home_handlers;
pub mod profile_handlers;

pub use admin_handlers::*;
pub use home_handlers::*;
pub use profile_handlers::*;
