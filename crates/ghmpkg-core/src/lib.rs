use error::MigrateError;

pub mod api;
pub mod catalog;
pub mod csv;
pub mod error;
pub mod layout;
pub mod package_type;
pub mod state;

pub use package_type::PackageType;
pub use state::ResultState;

pub type MigrateResult<T> = std::result::Result<T, MigrateError>;
