pub mod change;
pub mod error;
pub mod node;
pub mod store;

pub use change::{ChangeKey, ChangeOperation, ChangeRecord, NewChange};
pub use error::{Result, StoreError};
pub use node::{NodeKind, Revision, RevisionMarker, SyncNode};
pub use store::{SyncStore, UnitOfWork};
