//! Queued/suspended/interrupted task persistence (spec §4.3, §4.5, §9
//! "Cooperative tasks... required for checkpoint serialization").
//!
//! A verb's compiled bytecode is never written out here: each activation
//! is persisted as `(verb_owner, verb_name)` and the program is recompiled
//! by re-resolving that verb against the restored object store (spec §9
//! Open Questions: "program reference (by object+verb-index)"). This
//! keeps the textdump codec decoupled from `Op`'s representation, at the
//! cost of two known simplifications recorded in DESIGN.md: a task
//! suspended inside a `try`/`except`/`finally` loses its handler stack
//! across a checkpoint restart, and a task suspended mid-builtin
//! trampoline is restarted at the top of that builtin call instead.

use super::reader::{ReadError, Reader};
use super::writer::Writer;
use crate::objstore::ObjectStore;
use crate::scheduler::task::{Task, TaskKind};
use crate::value::Var;
use crate::vm::activation::Activation;
use crate::vm::interpreter::Vm;
use std::sync::Arc;

fn write_var_list(w: &mut Writer, items: &[Var]) {
    w.write_value(&Var::list(items.to_vec()));
}

fn read_var_list(r: &mut Reader) -> Result<Vec<Var>, ReadError> {
    match r.read_value()? {
        Var::List(items) => Ok((*items).clone()),
        _ => Err(ReadError::BadObjectHeader("expected a list of values".into())),
    }
}

pub fn write_activation(w: &mut Writer, act: &Activation) {
    w.write_obj(act.this);
    w.write_obj(act.player);
    w.write_obj(act.caller);
    w.write_obj(act.permissions);
    w.write_line(&act.verb_name);
    w.write_obj(act.verb_owner);
    w.write_int(act.pc as i64);
    write_var_list(w, &act.args);
    write_var_list(w, &act.vars);
    write_var_list(w, &act.value_stack);
}

/// Restores an activation by recompiling its verb reference against
/// `store`. Returns `None` (dropping the activation) if the verb no
/// longer exists — the same failure mode a live server hits if a verb is
/// deleted out from under a suspended task.
pub fn read_activation(r: &mut Reader, store: &ObjectStore) -> Result<Option<Activation>, ReadError> {
    let this = r.read_obj()?;
    let player = r.read_obj()?;
    let caller = r.read_obj()?;
    let permissions = r.read_obj()?;
    let verb_name = r.read_line_str()?;
    let verb_owner = r.read_obj()?;
    let pc = r.read_int()? as usize;
    let args = read_var_list(r)?;
    let vars = read_var_list(r)?;
    let value_stack = read_var_list(r)?;

    let Ok((_, _, verb)) = store.resolve_verb(verb_owner, &verb_name) else {
        return Ok(None);
    };
    let Some(program) = verb.program.clone() else {
        return Ok(None);
    };
    let mut act = Activation::new(
        Arc::new(program),
        this,
        player,
        caller,
        permissions,
        verb_name,
        verb_owner,
        args,
    );
    act.pc = pc;
    act.vars = vars;
    act.value_stack = value_stack;
    Ok(Some(act))
}

pub fn write_task(w: &mut Writer, task: &Task) {
    w.write_int(task.id as i64);
    w.write_int(match task.kind {
        TaskKind::Foreground => 0,
        TaskKind::Background => 1,
    });
    w.write_obj(task.player);
    w.write_int(task.vm.ticks_left as i64);
    w.write_int(task.vm.stack.len() as i64);
    for act in &task.vm.stack {
        write_activation(w, act);
    }
}

/// Reads one task record. Returns `None` if every activation on its stack
/// referenced a verb that no longer resolves (the whole task is then
/// unrecoverable and is dropped rather than left half-restored).
pub fn read_task(r: &mut Reader, store: &ObjectStore) -> Result<Option<Task>, ReadError> {
    let id = r.read_int()? as u64;
    let kind = match r.read_int()? {
        0 => TaskKind::Foreground,
        _ => TaskKind::Background,
    };
    let player = r.read_obj()?;
    let ticks_left = r.read_int()? as usize;
    let frame_count = r.read_int()?;
    let mut stack = Vec::with_capacity(frame_count.max(0) as usize);
    for _ in 0..frame_count {
        match read_activation(r, store)? {
            Some(act) => stack.push(act),
            None => return Ok(None),
        }
    }
    if stack.is_empty() {
        return Ok(None);
    }
    let mut vm = Vm::with_tick_limit(stack.remove(0), ticks_left);
    for act in stack {
        vm.stack.push(act);
    }
    vm.task_id = id;
    Ok(Some(Task::new(id, kind, player, vm)))
}

pub fn max_task_id(tasks: &[&Task]) -> u64 {
    tasks.iter().map(|t| t.id).max().unwrap_or(0)
}
