//! monedero-domain
//!
//! Pure domain models (Transaction, Category, Goal, session state).
//! No I/O, no storage. Only data types and core enums.

pub mod category;
pub mod common;
pub mod goal;
pub mod session;
pub mod transaction;

pub use category::*;
pub use common::*;
pub use goal::*;
pub use session::*;
pub use transaction::*;
