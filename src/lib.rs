pub mod aggregate;
pub mod config;
pub mod controller;
pub mod domain;
pub mod export;
pub mod logging;
pub mod model;
pub mod narrative;
pub mod paginate;
pub mod session;
pub mod table;
pub mod ui;

pub use aggregate::{Summary, compute};
pub use config::{ColumnContract, LensConfig};
pub use domain::LensError;
pub use session::Session;
pub use table::{Table, Value};
