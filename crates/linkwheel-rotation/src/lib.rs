pub mod error;
pub mod store;
pub mod types;

pub use error::RotationError;
pub use store::RotationStore;
pub use types::{CursorRecord, Selection};
