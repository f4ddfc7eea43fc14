//! The builtin function table: a flat vector of descriptors indexed by
//! name, populated once at startup by one `register_bf_*` call per family
//! (mirrors `BUILTIN_DESCRIPTORS`/`VM::new()` in `moor-lib-src-vm-mod.rs.rs`).

use crate::objstore::ObjectStore;
use crate::value::{ErrorCode, Var};
use crate::vm::interpreter::Vm;
use std::collections::HashMap;
use std::time::Duration;

pub enum BfOutcome {
    Value(Var),
    Error(ErrorCode),
    Suspend(Option<Duration>),
    /// A handful of builtins (`kill_task`, `resume`, `queued_tasks`) act on
    /// the scheduler's queues rather than this task's own `Vm`/`Activation`
    /// state, so their effect is described as data and carried out by
    /// whoever is driving the scheduler loop (spec §4.5), the same way
    /// `suspend`/`fork` hand a `Duration`/`ForkRequest` back up instead of
    /// reaching sideways into another task.
    SchedulerOp(SchedulerOp),
}

#[derive(Debug, Clone)]
pub enum SchedulerOp {
    KillTask(i64),
    Resume(i64, Var),
    QueuedTasks,
    /// `dump_database()`: request a checkpoint at the next opportunity. The
    /// scheduler itself has no filesystem path to write to; it just flags
    /// the request for whoever drives it (`net::listener::Server`,
    /// `moor-emergency`) to act on between scheduler turns (spec §6
    /// "Shutdown"/S6).
    DumpDatabase,
}

impl From<Result<Var, ErrorCode>> for BfOutcome {
    fn from(r: Result<Var, ErrorCode>) -> Self {
        match r {
            Ok(v) => BfOutcome::Value(v),
            Err(e) => BfOutcome::Error(e),
        }
    }
}

pub type BfFn = fn(Vec<Var>, &mut Vm, &mut ObjectStore) -> BfOutcome;

pub struct BuiltinDescriptor {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub func: BfFn,
}

pub struct BuiltinRegistry {
    descriptors: Vec<BuiltinDescriptor>,
    by_name: HashMap<&'static str, usize>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut reg = BuiltinRegistry {
            descriptors: Vec::new(),
            by_name: HashMap::new(),
        };
        crate::builtins::bf_values::register(&mut reg);
        crate::builtins::bf_objects::register(&mut reg);
        crate::builtins::bf_verbs::register(&mut reg);
        crate::builtins::bf_properties::register(&mut reg);
        crate::builtins::bf_lists_maps::register(&mut reg);
        crate::builtins::bf_strings::register(&mut reg);
        crate::builtins::bf_server::register(&mut reg);
        reg
    }

    pub fn register(&mut self, d: BuiltinDescriptor) {
        let idx = self.descriptors.len();
        self.by_name.insert(d.name, idx);
        self.descriptors.push(d);
    }

    pub fn call(
        &self,
        name: &str,
        args: Vec<Var>,
        vm: &mut Vm,
        store: &mut ObjectStore,
    ) -> BfOutcome {
        let Some(&idx) = self.by_name.get(name) else {
            return BfOutcome::Error(ErrorCode::VerbNF);
        };
        let d = &self.descriptors[idx];
        if args.len() < d.min_args || d.max_args.is_some_and(|m| args.len() > m) {
            return BfOutcome::Error(ErrorCode::Args);
        }
        (d.func)(args, vm, store)
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}
