//! C7: the task scheduler (spec §4.5). Cooperative and single-threaded —
//! exactly one task's `Vm` dispatches opcodes at a time; forks, suspends,
//! and completions are the only points where control passes between
//! tasks.

pub mod queues;
pub mod task;

use crate::builtins::{BuiltinRegistry, SchedulerOp};
use crate::objstore::ObjectStore;
use crate::value::{ObjId, Var};
use crate::vm::activation::Activation;
use crate::vm::interpreter::{ExecutionResult, Vm};
use queues::Queues;
use std::sync::Arc;
use std::time::{Duration, Instant};
use task::{DelayedTask, ScopedResource, Task, TaskId, TaskKind};
use tracing::{info, warn};

/// `fg_ticks`/`fg_seconds`/`bg_ticks`/`bg_seconds`, read from
/// `#0.server_options` on each task start (spec §4.5). Falls back to the
/// documented defaults when the property is absent or malformed.
#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    pub fg_ticks: usize,
    pub fg_seconds: u64,
    pub bg_ticks: usize,
    pub bg_seconds: u64,
    pub max_stack_depth: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            fg_ticks: 60_000,
            fg_seconds: 5,
            bg_ticks: 30_000,
            bg_seconds: 3,
            max_stack_depth: 50,
        }
    }
}

impl ServerOptions {
    pub fn read(store: &ObjectStore) -> Self {
        let defaults = ServerOptions::default();
        let Ok((_, Var::Map(opts))) = store.resolve_property(ObjId::SYSTEM, "server_options")
        else {
            return defaults;
        };
        let get_int = |key: &str, fallback: usize| -> usize {
            opts.iter()
                .find(|(k, _)| k.to_var().as_str() == Some(key.as_bytes()))
                .and_then(|(_, v)| v.as_int())
                .filter(|n| *n >= 0)
                .map(|n| n as usize)
                .unwrap_or(fallback)
        };
        ServerOptions {
            fg_ticks: get_int("fg_ticks", defaults.fg_ticks),
            fg_seconds: get_int("fg_seconds", defaults.fg_seconds as usize) as u64,
            bg_ticks: get_int("bg_ticks", defaults.bg_ticks),
            bg_seconds: get_int("bg_seconds", defaults.bg_seconds as usize) as u64,
            max_stack_depth: get_int("max_stack_depth", defaults.max_stack_depth),
        }
    }
}

/// Outcome of running one ready task to its next suspension point, surfaced
/// to the caller (connection layer / emergency-mode REPL) so it can deliver
/// `notify()` output and tracebacks.
pub enum TaskOutcome {
    Complete {
        player: ObjId,
        result: Var,
        notifications: Vec<(ObjId, Vec<u8>)>,
    },
    Aborted {
        player: ObjId,
        traceback: String,
        notifications: Vec<(ObjId, Vec<u8>)>,
    },
    StillRunning,
}

pub struct Scheduler {
    pub queues: Queues,
    next_task_id: TaskId,
    running: Option<TaskId>,
    /// Set by `dump_database()`; cleared by whoever drives the scheduler
    /// once it has written a checkpoint (spec S6).
    pub dump_requested: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            queues: Queues::new(),
            next_task_id: 1,
            running: None,
            dump_requested: false,
        }
    }

    /// Reconstructs a scheduler from queues restored off a checkpoint (C3),
    /// continuing task-id allocation past the highest id on disk so a
    /// restored task is never handed out again.
    pub fn restore(queues: Queues, next_task_id: TaskId) -> Self {
        Scheduler {
            queues,
            next_task_id,
            running: None,
            dump_requested: false,
        }
    }

    fn alloc_id(&mut self) -> TaskId {
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    /// Enqueues a foreground task that calls `this:verb_name(args)` as
    /// `permissions`. Used by the login/command dispatcher (C8).
    pub fn enqueue_verb_call(
        &mut self,
        store: &ObjectStore,
        opts: &ServerOptions,
        this: ObjId,
        player: ObjId,
        permissions: ObjId,
        verb_name: &str,
        args: Vec<Var>,
    ) -> Result<TaskId, crate::objstore::StoreError> {
        let (definer, _idx, verb) = store.resolve_verb(this, verb_name)?;
        let program = verb
            .program
            .clone()
            .map(Arc::new)
            .unwrap_or_else(|| Arc::new(crate::compiler::program::Program::new(Vec::new())));
        let act = Activation::new(
            program,
            this,
            player,
            ObjId::NOTHING,
            permissions,
            verb_name.to_string(),
            definer,
            args,
        );
        let id = self.alloc_id();
        let mut vm = Vm::with_limits(act, opts.fg_ticks, opts.max_stack_depth);
        vm.task_id = id;
        let task = Task::new(id, TaskKind::Foreground, player, vm);
        self.queues.ready.push_back(task);
        Ok(id)
    }

    /// Like `enqueue_verb_call`, but also pre-binds the command-dispatch
    /// context locals (spec §4.4/§4.6: `dobj`, `dobjstr`, `iobj`,
    /// `iobjstr`, `prepstr`, `argstr`) a verb matched off the command line
    /// sees in addition to `this`/`player`/`caller`/`args`.
    #[allow(clippy::too_many_arguments)]
    pub fn enqueue_command_call(
        &mut self,
        store: &ObjectStore,
        opts: &ServerOptions,
        this: ObjId,
        player: ObjId,
        verb_name: &str,
        argstr: &str,
        dobj: ObjId,
        dobjstr: &str,
        prepstr: &str,
        iobj: ObjId,
        iobjstr: &str,
    ) -> Result<TaskId, crate::objstore::StoreError> {
        let (definer, _idx, verb) = store.resolve_verb(this, verb_name)?;
        let program = verb
            .program
            .clone()
            .map(Arc::new)
            .unwrap_or_else(|| Arc::new(crate::compiler::program::Program::new(Vec::new())));
        let args: Vec<Var> = argstr
            .split_whitespace()
            .map(|s| Var::str(s.as_bytes().to_vec()))
            .collect();
        let mut act = Activation::new(
            program,
            this,
            player,
            ObjId::NOTHING,
            player,
            verb_name.to_string(),
            definer,
            args,
        );
        act.bind_context_var("argstr", Var::str(argstr.as_bytes().to_vec()));
        act.bind_context_var("dobj", Var::Obj(dobj));
        act.bind_context_var("dobjstr", Var::str(dobjstr.as_bytes().to_vec()));
        act.bind_context_var("prepstr", Var::str(prepstr.as_bytes().to_vec()));
        act.bind_context_var("iobj", Var::Obj(iobj));
        act.bind_context_var("iobjstr", Var::str(iobjstr.as_bytes().to_vec()));
        let id = self.alloc_id();
        let mut vm = Vm::with_limits(act, opts.fg_ticks, opts.max_stack_depth);
        vm.task_id = id;
        let task = Task::new(id, TaskKind::Foreground, player, vm);
        self.queues.ready.push_back(task);
        Ok(id)
    }

    /// Forks `activation` as a new background task, keyed by `delay`
    /// (spec §4.5: "create a new background task with wake-at = now+d").
    fn fork_child(&mut self, parent_player: ObjId, opts: &ServerOptions, req: crate::vm::interpreter::ForkRequest) {
        let id = self.alloc_id();
        let mut vm = Vm::with_limits(req.activation, opts.bg_ticks, opts.max_stack_depth);
        vm.task_id = id;
        let task = Task::new(id, TaskKind::Background, parent_player, vm);
        if req.delay.is_zero() {
            self.queues.ready.push_back(task);
        } else {
            self.queues.time_delayed.push(DelayedTask::new(task, req.delay));
        }
    }

    pub fn kill_task(&mut self, id: TaskId) -> bool {
        if self.running == Some(id) {
            // Flagged; the running loop checks `killed` at the next opcode
            // boundary rather than being interrupted here (spec §5).
            return true;
        }
        self.queues.remove(id).is_some()
    }

    pub fn queued_tasks(&self) -> Vec<TaskId> {
        let mut out: Vec<TaskId> = self.queues.ready.iter().map(|t| t.id).collect();
        out.extend(self.queues.suspended.keys().copied());
        out.extend(self.queues.time_delayed.iter().map(|d| d.task.id));
        out
    }

    /// Resumes a task parked in the suspended queue (`suspend(-1)`, or
    /// `read()` once input arrives).
    pub fn resume(&mut self, id: TaskId, value: Var) -> bool {
        let Some(mut task) = self.queues.suspended.remove(&id) else {
            return false;
        };
        if let Some(act) = task.vm.stack.last_mut() {
            act.push(value);
        }
        self.queues.ready.push_back(task);
        true
    }

    /// Moves due time-delayed tasks into ready, then runs exactly one
    /// ready task until its next suspension point (spec §4.5 scheduler
    /// loop). Returns `None` if there was nothing ready to run.
    pub fn run_one(
        &mut self,
        store: &mut ObjectStore,
        builtins: &BuiltinRegistry,
        opts: &ServerOptions,
    ) -> Option<TaskOutcome> {
        self.queues.wake_due(Instant::now());
        let mut task = self.queues.ready.pop_front()?;
        if task.killed {
            return Some(TaskOutcome::Aborted {
                player: task.player,
                traceback: "task killed before it ran".to_string(),
                notifications: Vec::new(),
            });
        }
        self.running = Some(task.id);
        let result = task.vm.run(store, builtins);
        self.running = None;

        let notifications = std::mem::take(&mut task.vm.pending_notifications);
        let player = task.player;
        // `fork` never yields the task (spec §5), so any number of forks can
        // have accumulated by the time `run` returns for any reason at all.
        // Enqueue the children now, before the task itself goes back onto a
        // queue, so they sit behind it and don't get a turn first.
        let forks = std::mem::take(&mut task.vm.pending_forks);
        for req in forks {
            self.fork_child(player, opts, req);
        }
        match result {
            ExecutionResult::Complete(v) => Some(TaskOutcome::Complete {
                player,
                result: v,
                notifications,
            }),
            ExecutionResult::Uncaught(code, msg) => {
                let traceback = format!("{:?}: {}", code, msg);
                if task.kind == TaskKind::Background {
                    warn!(task_id = task.id, %traceback, "uncaught error in background task");
                }
                Some(TaskOutcome::Aborted {
                    player,
                    traceback,
                    notifications,
                })
            }
            ExecutionResult::TicksExhausted => Some(TaskOutcome::Aborted {
                player,
                traceback: "E_MAXREC: tick limit exhausted".to_string(),
                notifications,
            }),
            ExecutionResult::Suspend(None) => {
                self.queues.suspended.insert(task.id, task);
                Some(TaskOutcome::StillRunning)
            }
            ExecutionResult::Suspend(Some(d)) => {
                if d.is_zero() {
                    self.queues.ready.push_back(task);
                } else {
                    self.queues.time_delayed.push(DelayedTask::new(task, d));
                }
                Some(TaskOutcome::StillRunning)
            }
            ExecutionResult::NeedsScheduler(op) => self.apply_scheduler_op(task, op),
        }
    }

    /// Carries out a `kill_task`/`resume`/`queued_tasks` request on behalf
    /// of `task`, pushes the resulting value onto its current activation,
    /// and puts it back at the front of the ready queue so it resumes
    /// before anything else gets a turn (spec §4.5: these builtins do not
    /// yield the processor the way `suspend`/`fork` do).
    fn apply_scheduler_op(&mut self, mut task: Task, op: SchedulerOp) -> Option<TaskOutcome> {
        match op {
            SchedulerOp::KillTask(id) if id as u64 == task.id => {
                return Some(TaskOutcome::Aborted {
                    player: task.player,
                    traceback: "task killed itself".to_string(),
                    notifications: std::mem::take(&mut task.vm.pending_notifications),
                });
            }
            SchedulerOp::KillTask(id) => {
                let killed = self.kill_task(id as u64);
                let result = if killed { Var::Int(0) } else { Var::Err(crate::value::ErrorCode::Invarg) };
                if let Some(act) = task.vm.stack.last_mut() {
                    act.push(result);
                }
            }
            SchedulerOp::Resume(id, value) => {
                let resumed = self.resume(id as u64, value);
                let result = if resumed { Var::Int(0) } else { Var::Err(crate::value::ErrorCode::Invarg) };
                if let Some(act) = task.vm.stack.last_mut() {
                    act.push(result);
                }
            }
            SchedulerOp::QueuedTasks => {
                let ids: Vec<Var> = self.queued_tasks().into_iter().map(|i| Var::Int(i as i64)).collect();
                if let Some(act) = task.vm.stack.last_mut() {
                    act.push(Var::list(ids));
                }
            }
            SchedulerOp::DumpDatabase => {
                self.dump_requested = true;
                if let Some(act) = task.vm.stack.last_mut() {
                    act.push(Var::Int(1));
                }
            }
        }
        self.queues.ready.push_front(task);
        Some(TaskOutcome::StillRunning)
    }

    pub fn has_work(&self) -> bool {
        !self.queues.ready.is_empty() || !self.queues.time_delayed.is_empty()
    }

    /// Drains all currently-ready/due work synchronously, in the order the
    /// scheduler loop would naturally produce it. Used by emergency mode
    /// and tests that want a quiescent store before inspecting it.
    pub fn drain(
        &mut self,
        store: &mut ObjectStore,
        builtins: &BuiltinRegistry,
        opts: &ServerOptions,
        on_outcome: &mut dyn FnMut(TaskOutcome),
    ) {
        loop {
            self.queues.wake_due(Instant::now());
            if self.queues.ready.is_empty() {
                match self.queues.next_wake_at() {
                    Some(at) => {
                        std::thread::sleep(at.saturating_duration_since(Instant::now()));
                        continue;
                    }
                    None => break,
                }
            }
            let Some(outcome) = self.run_one(store, builtins, opts) else {
                break;
            };
            on_outcome(outcome);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(dead_code)]
fn release_resources(resources: Vec<ScopedResource>) {
    for r in resources {
        match r {
            ScopedResource::File(path) => {
                info!(path, "releasing scoped file handle on task termination");
            }
        }
    }
}
