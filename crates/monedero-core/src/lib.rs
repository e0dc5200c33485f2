//! monedero-core
//!
//! Business logic and services for Monedero.
//! Depends on monedero-domain. No UI, no direct storage interactions:
//! persistence goes through the [`store::DocumentStore`] seam.

pub mod category_service;
pub mod error;
pub mod goal_service;
pub mod session;
pub mod store;
pub mod summary_service;
pub mod transaction_service;

pub use category_service::*;
pub use error::{CoreError, CoreResult};
pub use goal_service::*;
pub use session::*;
pub use store::*;
pub use summary_service::*;
pub use transaction_service::*;
