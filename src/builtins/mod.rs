//! C9: the builtin function registry (spec §6.3's `builtin_call`
//! dispatch target).

pub mod bf_lists_maps;
pub mod bf_objects;
pub mod bf_properties;
pub mod bf_server;
pub mod bf_strings;
pub mod bf_values;
pub mod bf_verbs;
pub mod registry;

pub use registry::{BfOutcome, BuiltinDescriptor, BuiltinRegistry, SchedulerOp};

pub(crate) fn store_err_to_code(e: crate::objstore::StoreError) -> crate::value::ErrorCode {
    e.into()
}
