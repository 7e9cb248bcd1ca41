pub mod alerts;
pub mod detection;
pub mod error;
pub mod models;
pub mod requests;
pub mod telemetry;

pub use alerts::*;
pub use detection::*;
pub use error::*;
pub use models::*;
pub use requests::*;
pub use telemetry::*;
