//! Task/connection introspection builtins (`server_log`, `notify`,
//! `suspend`, `ticks_left`, `seconds_left`, `task_id`, `callers`,
//! `caller_perms`, `set_task_perms`). `notify`/`read` hand off to the
//! connection layer (C8) rather than touching a socket directly here, the
//! way the teacher's builtins hand off to `ActorRuntime` rather than
//! opening network sockets inline.

use super::registry::{BfOutcome, BuiltinDescriptor, BuiltinRegistry, SchedulerOp};
use crate::objstore::ObjectStore;
use crate::value::{ErrorCode, Var};
use crate::vm::interpreter::Vm;
use std::time::Duration;
use tracing::info;

pub fn register(reg: &mut BuiltinRegistry) {
    reg.register(BuiltinDescriptor {
        name: "server_log",
        min_args: 1,
        max_args: Some(2),
        func: bf_server_log,
    });
    reg.register(BuiltinDescriptor {
        name: "notify",
        min_args: 2,
        max_args: Some(2),
        func: bf_notify,
    });
    reg.register(BuiltinDescriptor {
        name: "suspend",
        min_args: 0,
        max_args: Some(1),
        func: bf_suspend,
    });
    reg.register(BuiltinDescriptor {
        name: "ticks_left",
        min_args: 0,
        max_args: Some(0),
        func: bf_ticks_left,
    });
    reg.register(BuiltinDescriptor {
        name: "task_id",
        min_args: 0,
        max_args: Some(0),
        func: bf_task_id,
    });
    reg.register(BuiltinDescriptor {
        name: "callers",
        min_args: 0,
        max_args: Some(0),
        func: bf_callers,
    });
    reg.register(BuiltinDescriptor {
        name: "caller_perms",
        min_args: 0,
        max_args: Some(0),
        func: bf_caller_perms,
    });
    reg.register(BuiltinDescriptor {
        name: "set_task_perms",
        min_args: 1,
        max_args: Some(1),
        func: bf_set_task_perms,
    });
    reg.register(BuiltinDescriptor {
        name: "kill_task",
        min_args: 1,
        max_args: Some(1),
        func: bf_kill_task,
    });
    reg.register(BuiltinDescriptor {
        name: "resume",
        min_args: 1,
        max_args: Some(2),
        func: bf_resume,
    });
    reg.register(BuiltinDescriptor {
        name: "queued_tasks",
        min_args: 0,
        max_args: Some(0),
        func: bf_queued_tasks,
    });
    reg.register(BuiltinDescriptor {
        name: "read",
        min_args: 0,
        max_args: Some(1),
        func: bf_read,
    });
    reg.register(BuiltinDescriptor {
        name: "dump_database",
        min_args: 0,
        max_args: Some(0),
        func: bf_dump_database,
    });
}

fn bf_server_log(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let Some(msg) = args[0].as_str() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let is_error = matches!(args.get(1), Some(v) if v.is_true());
    let text = String::from_utf8_lossy(msg);
    if is_error {
        tracing::error!(%text, "server_log");
    } else {
        info!(%text, "server_log");
    }
    BfOutcome::Value(Var::None)
}

fn bf_notify(args: Vec<Var>, vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let Some(conn) = args[0].as_obj() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let Some(text) = args[1].as_str() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    // The connection layer owns the actual socket write; the VM only
    // records that this task asked to notify a player. The scheduler
    // drains these via the task's outbox after each `run` call returns.
    vm.pending_notifications.push((conn, text.to_vec()));
    BfOutcome::Value(Var::None)
}

fn bf_suspend(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    match args.first() {
        None | Some(Var::None) => BfOutcome::Suspend(None),
        Some(Var::Int(secs)) if *secs >= 0 => {
            BfOutcome::Suspend(Some(Duration::from_secs(*secs as u64)))
        }
        Some(Var::Float(secs)) if *secs >= 0.0 => {
            BfOutcome::Suspend(Some(Duration::from_secs_f64(*secs)))
        }
        _ => BfOutcome::Error(ErrorCode::Invarg),
    }
}

fn bf_ticks_left(_args: Vec<Var>, vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(Var::Int(vm.ticks_left as i64))
}

fn bf_task_id(_args: Vec<Var>, vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Value(Var::Int(vm.task_id as i64))
}

fn bf_callers(_args: Vec<Var>, vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let frames: Vec<Var> = vm
        .stack
        .iter()
        .rev()
        .skip(1)
        .map(|a| {
            Var::list(vec![
                Var::Obj(a.this),
                Var::str(a.verb_name.as_bytes().to_vec()),
                Var::Obj(a.verb_owner),
                Var::Obj(a.player),
            ])
        })
        .collect();
    BfOutcome::Value(Var::list(frames))
}

fn bf_caller_perms(_args: Vec<Var>, vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let perms = vm
        .stack
        .iter()
        .rev()
        .nth(1)
        .map(|a| a.permissions)
        .unwrap_or(crate::value::ObjId::NOTHING);
    BfOutcome::Value(Var::Obj(perms))
}

fn bf_set_task_perms(args: Vec<Var>, vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let Some(oid) = args[0].as_obj() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    if let Some(act) = vm.stack.last_mut() {
        act.permissions = oid;
    }
    BfOutcome::Value(Var::None)
}

fn bf_kill_task(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let Some(id) = args[0].as_int() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    BfOutcome::SchedulerOp(SchedulerOp::KillTask(id))
}

fn bf_resume(args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    let Some(id) = args[0].as_int() else {
        return BfOutcome::Error(ErrorCode::Type);
    };
    let value = args.get(1).cloned().unwrap_or(Var::None);
    BfOutcome::SchedulerOp(SchedulerOp::Resume(id, value))
}

fn bf_queued_tasks(_args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::SchedulerOp(SchedulerOp::QueuedTasks)
}

/// Suspends indefinitely, same as `suspend()` with no argument; the
/// connection layer (C8) resumes the task via `Scheduler::resume` with the
/// next line of input once it arrives.
fn bf_read(_args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::Suspend(None)
}

/// Forces a checkpoint outside the usual periodic interval (spec S6). Like
/// `kill_task`/`resume`/`queued_tasks`, this reaches outside the calling
/// task's own `Vm`, so it is described as data for the scheduler/connection
/// layer to act on rather than touching a file here.
fn bf_dump_database(_args: Vec<Var>, _vm: &mut Vm, _store: &mut ObjectStore) -> BfOutcome {
    BfOutcome::SchedulerOp(SchedulerOp::DumpDatabase)
}
