//! C2: the persistent object graph.

pub mod object;
pub mod store;

pub use object::{ArgSpec, Object, ObjFlags, PrepSpec, PropPerms, PropSlot, PropSlotValue, VerbArgSpec, VerbPerms, VerbSlot};
pub use store::{ObjectStore, StoreError};
