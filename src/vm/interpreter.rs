//! The bytecode execution loop (C6, spec §6). A stack machine over
//! `Activation` frames; `try`/`except`/`finally` and `fork`/`suspend` are
//! all modeled as data returned to the caller rather than Rust-level
//! control flow, so a task's entire continuation can be captured and handed
//! to the scheduler (spec §6.4, §7).

use crate::builtins::{BfOutcome, BuiltinRegistry, SchedulerOp};
use crate::compiler::program::{Op, ScatterOp};
use crate::objstore::{ObjectStore, StoreError};
use crate::value::{arith, ErrorCode, ObjId, Var};
use crate::vm::activation::Activation;
use crate::vm::unwind::{HandlerFrame, Unwind};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TICK_LIMIT: usize = 60_000;
const DEFAULT_MAX_STACK_DEPTH: usize = 50;

pub struct Vm {
    pub stack: Vec<Activation>,
    pub ticks_left: usize,
    pub task_id: u64,
    /// `max_stack_depth` (spec §4.5); exceeding it on a verb call raises
    /// `E_MAXREC` rather than overflowing the host stack.
    pub max_stack_depth: usize,
    /// `notify()` calls queued by builtins this run; drained by the
    /// scheduler/connection layer after `run` returns.
    pub pending_notifications: Vec<(ObjId, Vec<u8>)>,
    /// `fork` statements hit this run; drained by the scheduler after `run`
    /// returns. The `fork` statement itself does not suspend the task (spec
    /// §5 ordering guarantees), so these accumulate across however many
    /// `fork`s the task executes before its next real suspension.
    pub pending_forks: Vec<ForkRequest>,
}

#[derive(Debug, Clone)]
pub struct ForkRequest {
    pub delay: Duration,
    pub activation: Activation,
}

#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Complete(Var),
    /// An error propagated past the outermost activation, uncaught.
    Uncaught(ErrorCode, String),
    Suspend(Option<Duration>),
    TicksExhausted,
    /// `kill_task`/`resume`/`queued_tasks` reach outside this task's own
    /// `Vm`; the scheduler performs the op and pushes the result back
    /// before letting this task continue (spec §4.5).
    NeedsScheduler(SchedulerOp),
}

impl Vm {
    pub fn new(top: Activation) -> Self {
        Vm {
            stack: vec![top],
            ticks_left: DEFAULT_TICK_LIMIT,
            task_id: 0,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            pending_notifications: Vec::new(),
            pending_forks: Vec::new(),
        }
    }

    pub fn with_tick_limit(top: Activation, ticks: usize) -> Self {
        Vm {
            stack: vec![top],
            ticks_left: ticks,
            task_id: 0,
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            pending_notifications: Vec::new(),
            pending_forks: Vec::new(),
        }
    }

    pub fn with_limits(top: Activation, ticks: usize, max_stack_depth: usize) -> Self {
        Vm {
            stack: vec![top],
            ticks_left: ticks,
            task_id: 0,
            max_stack_depth,
            pending_notifications: Vec::new(),
            pending_forks: Vec::new(),
        }
    }

    pub fn run(&mut self, store: &mut ObjectStore, builtins: &BuiltinRegistry) -> ExecutionResult {
        loop {
            if self.ticks_left == 0 {
                return ExecutionResult::TicksExhausted;
            }
            self.ticks_left -= 1;

            let Some(act) = self.stack.last_mut() else {
                return ExecutionResult::Complete(Var::None);
            };
            if act.pc >= act.program.ops.len() {
                return match self.unwind(Unwind::Return(Var::None)) {
                    StepOutcome::Continue => continue,
                    StepOutcome::Result(r) => r,
                };
            }
            let op = act.program.ops[act.pc].clone();
            act.pc += 1;

            match self.step(op, store, builtins) {
                StepOutcome::Continue => {}
                StepOutcome::Result(r) => return r,
            }
        }
    }

    fn act(&mut self) -> &mut Activation {
        self.stack.last_mut().expect("activation stack not empty")
    }

    fn step(
        &mut self,
        op: Op,
        store: &mut ObjectStore,
        builtins: &BuiltinRegistry,
    ) -> StepOutcome {
        match op {
            Op::PushLit(v) => {
                self.act().push(v);
            }
            Op::PushVar(slot) => {
                let v = self.act().vars.get(slot as usize).cloned().unwrap_or(Var::None);
                self.act().push(v);
            }
            Op::PopVar(slot) => {
                let v = self.act().pop();
                self.act().var_slot(slot, v);
            }
            Op::Pop => {
                self.act().pop();
            }
            Op::Dup => {
                let v = self.act().value_stack.last().cloned().unwrap_or(Var::None);
                self.act().push(v);
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Pow | Op::BitAnd | Op::BitOr
            | Op::BitXor | Op::Shl | Op::Shr => {
                let b = self.act().pop();
                let a = self.act().pop();
                let r = match op {
                    Op::Add => arith::add(&a, &b),
                    Op::Sub => arith::sub(&a, &b),
                    Op::Mul => arith::mul(&a, &b),
                    Op::Div => arith::div(&a, &b),
                    Op::Mod => arith::modulo(&a, &b),
                    Op::Pow => arith::pow(&a, &b),
                    Op::BitAnd => arith::bitand(&a, &b),
                    Op::BitOr => arith::bitor(&a, &b),
                    Op::BitXor => arith::bitxor(&a, &b),
                    Op::Shl => arith::shl(&a, &b),
                    Op::Shr => arith::shr(&a, &b),
                    _ => unreachable!(),
                };
                return self.push_or_raise(r);
            }
            Op::Neg => {
                let a = self.act().pop();
                let r = arith::neg(&a);
                return self.push_or_raise(r);
            }
            Op::Not => {
                let a = self.act().pop();
                self.act().push(Var::Bool(!a.is_true()));
            }
            Op::BitNot => {
                let a = self.act().pop();
                let r = match a {
                    Var::Int(x) => Ok(Var::Int(!x)),
                    _ => Err(ErrorCode::Type),
                };
                return self.push_or_raise(r);
            }
            Op::CmpEq => {
                let b = self.act().pop();
                let a = self.act().pop();
                self.act().push(Var::Bool(a.eq_moo(&b)));
            }
            Op::CmpNe => {
                let b = self.act().pop();
                let a = self.act().pop();
                self.act().push(Var::Bool(!a.eq_moo(&b)));
            }
            Op::CmpLt | Op::CmpLe | Op::CmpGt | Op::CmpGe => {
                let b = self.act().pop();
                let a = self.act().pop();
                let r = arith::compare(&a, &b).map(|ord| {
                    Var::Bool(match op {
                        Op::CmpLt => ord.is_lt(),
                        Op::CmpLe => ord.is_le(),
                        Op::CmpGt => ord.is_gt(),
                        Op::CmpGe => ord.is_ge(),
                        _ => unreachable!(),
                    })
                });
                return self.push_or_raise(r);
            }
            Op::In => {
                let b = self.act().pop();
                let a = self.act().pop();
                let r = arith::in_list(&a, &b);
                return self.push_or_raise(r);
            }
            Op::JumpIfFalse(target) => {
                let v = self.act().pop();
                if !v.is_true() {
                    self.act().pc = target;
                }
            }
            Op::JumpIfFalsePeek(target) => {
                let truthy = self.act().value_stack.last().map(|v| v.is_true()).unwrap_or(false);
                if !truthy {
                    self.act().pc = target;
                }
            }
            Op::JumpIfTruePeek(target) => {
                let truthy = self.act().value_stack.last().map(|v| v.is_true()).unwrap_or(false);
                if truthy {
                    self.act().pc = target;
                }
            }
            Op::Jump(target) => {
                self.act().pc = target;
            }
            Op::GetProp => {
                let name = self.act().pop();
                let obj = self.act().pop();
                let perms = self.act().permissions;
                let r = self.get_prop(store, &obj, &name, perms);
                return self.push_or_raise(r);
            }
            Op::SetProp => {
                let value = self.act().pop();
                let name = self.act().pop();
                let obj = self.act().pop();
                let perms = self.act().permissions;
                let r = self.set_prop(store, &obj, &name, value.clone(), perms).map(|_| value);
                return self.push_or_raise(r);
            }
            Op::SystemProp(name) => {
                let perms = self.act().permissions;
                let r = self.get_prop(store, &Var::Obj(ObjId(0)), &Var::str(name.into_bytes()), perms);
                return self.push_or_raise(r);
            }
            Op::Index => {
                let idx = self.act().pop();
                let obj = self.act().pop();
                let r = self.do_index(&obj, &idx);
                return self.push_or_raise(r);
            }
            Op::IndexSet => {
                let value = self.act().pop();
                let idx = self.act().pop();
                let mut obj = self.act().pop();
                let r = match idx {
                    Var::Int(i) => arith::index_set(&mut obj, i, value).map(|_| obj),
                    _ => Err(ErrorCode::Type),
                };
                return self.push_or_raise(r);
            }
            Op::Range => {
                let b = self.act().pop();
                let a = self.act().pop();
                let obj = self.act().pop();
                let r = match (a, b) {
                    (Var::Int(a), Var::Int(b)) => arith::range_get(&obj, a, b),
                    _ => Err(ErrorCode::Type),
                };
                return self.push_or_raise(r);
            }
            Op::RangeSet => {
                let value = self.act().pop();
                let b = self.act().pop();
                let a = self.act().pop();
                let mut obj = self.act().pop();
                let r = match (a, b) {
                    (Var::Int(a), Var::Int(b)) => {
                        arith::range_set(&mut obj, a, b, value).map(|_| obj)
                    }
                    _ => Err(ErrorCode::Type),
                };
                return self.push_or_raise(r);
            }
            Op::RangeStart => {
                // `^`: resolved relative to the innermost indexing target,
                // which is whatever sits just below the index expression on
                // the value stack.
                self.act().push(Var::Int(1));
            }
            Op::RangeEnd => {
                let target = self.act().value_stack.last().cloned();
                let len = target.and_then(|v| v.moo_length()).unwrap_or(0);
                self.act().push(Var::Int(len as i64));
            }
            Op::MakeList(n) => {
                let mut items = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    items.push(self.act().pop());
                }
                items.reverse();
                self.act().push(Var::list(items));
            }
            Op::Splice => {
                let spliced = self.act().pop();
                let base = self.act().pop();
                let r = match (base, spliced) {
                    (Var::List(mut l), Var::List(s)) => {
                        Arc::make_mut(&mut l).extend(s.iter().cloned());
                        Ok(Var::List(l))
                    }
                    _ => Err(ErrorCode::Type),
                };
                return self.push_or_raise(r);
            }
            Op::MakeMap(n) => {
                let mut m = std::collections::BTreeMap::new();
                let mut pairs = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    let v = self.act().pop();
                    let k = self.act().pop();
                    pairs.push((k, v));
                }
                pairs.reverse();
                for (k, v) in pairs {
                    match crate::value::MapKey::from_var(&k) {
                        Some(key) => {
                            m.insert(key, v);
                        }
                        None => return self.push_or_raise(Err(ErrorCode::Type)),
                    }
                }
                self.act().push(Var::map(m));
            }
            Op::ForListStart => {
                let list = self.act().pop();
                self.act().push(list);
                self.act().push(Var::Int(0)); // cursor
            }
            Op::ForListNext { var_slot, idx_slot, exit } => {
                let idx = self.act().pop();
                let list = self.act().value_stack.last().cloned().unwrap_or(Var::empty_list());
                let Var::Int(i) = idx else { unreachable!() };
                let len = list.moo_length().unwrap_or(0) as i64;
                if i >= len {
                    self.act().pop(); // drop the list
                    self.act().pc = exit;
                } else {
                    let item = arith::index_get(&list, i + 1).unwrap_or(Var::None);
                    // Leave only the updated cursor on the stack (below the
                    // still-live list); the element/index bind straight into
                    // their locals rather than round-tripping through the
                    // value stack, so consecutive iterations never mistake
                    // the previous element for the next cursor.
                    self.act().push(Var::Int(i + 1));
                    self.act().var_slot(var_slot, item);
                    if let Some(idx_slot) = idx_slot {
                        self.act().var_slot(idx_slot, Var::Int(i + 1));
                    }
                }
            }
            Op::ForRangeStart => {
                let to = self.act().pop();
                let from = self.act().pop();
                self.act().push(to);
                self.act().push(from);
            }
            Op::ForRangeNext { var_slot, exit } => {
                let cur = self.act().pop();
                let to = self.act().value_stack.last().cloned().unwrap_or(Var::Int(0));
                let (Var::Int(cur), Var::Int(to)) = (cur, to) else {
                    self.act().pop();
                    self.act().pc = exit;
                    return StepOutcome::Continue;
                };
                if cur > to {
                    self.act().pop(); // drop the upper bound
                    self.act().pc = exit;
                } else {
                    self.act().push(Var::Int(cur + 1));
                    self.act().var_slot(var_slot, Var::Int(cur));
                }
            }
            Op::Scatter(ops) => {
                let list = self.act().pop();
                return self.do_scatter(&ops, list, store, builtins);
            }
            Op::VerbCall(argc) => {
                return self.do_verb_call(argc, store);
            }
            Op::SystemVerbCall(name, argc) => {
                self.act().push(Var::Obj(ObjId(0)));
                // Re-run as a plain verb call against #0.
                let argv = self.pop_args(argc);
                self.act().pop(); // drop the #0 we pushed
                return self.dispatch_verb_call(ObjId(0), &name, argv, store);
            }
            Op::BuiltinCall(name, argc) => {
                let args = self.pop_args(argc);
                match builtins.call(&name, args, self, store) {
                    BfOutcome::Value(v) => {
                        self.act().push(v);
                    }
                    BfOutcome::Error(e) => return self.push_or_raise(Err(e)),
                    BfOutcome::Suspend(dur) => return StepOutcome::Result(ExecutionResult::Suspend(dur)),
                    BfOutcome::SchedulerOp(op) => {
                        return StepOutcome::Result(ExecutionResult::NeedsScheduler(op))
                    }
                }
            }
            Op::PushHandler { handlers, finally } => {
                let depth = self.act().value_stack.len();
                self.act().handlers.push(HandlerFrame {
                    handlers,
                    finally,
                    stack_depth: depth,
                });
            }
            Op::PopHandler => {
                self.act().handlers.pop();
            }
            Op::EndFinally => {
                if let Some(reason) = self.act().pending_unwind.take() {
                    return self.unwind(reason);
                }
            }
            Op::Fork { var_slot, body } => {
                let delay_v = self.act().pop();
                let delay = match delay_v {
                    Var::Int(n) if n >= 0 => Duration::from_secs(n as u64),
                    Var::Float(f) if f >= 0.0 => Duration::from_secs_f64(f),
                    _ => Duration::ZERO,
                };
                let mut forked = self.act().clone();
                forked.pc = body;
                if let Some(slot) = var_slot {
                    forked.var_slot(slot, Var::Int(0));
                }
                // Recorded, not yielded: `fork` hands the new task to the
                // scheduler but this task keeps running (spec §5, scenario
                // S4 — the parent's own post-`endfork` code runs before the
                // child gets a turn).
                self.pending_forks.push(ForkRequest {
                    delay,
                    activation: forked,
                });
            }
            Op::Return => {
                let v = self.act().pop();
                return self.unwind(Unwind::Return(v));
            }
            Op::ReturnNone => {
                return self.unwind(Unwind::Return(Var::None));
            }
            Op::Break(target) => {
                return self.unwind(Unwind::Break(target));
            }
            Op::Continue(target) => {
                return self.unwind(Unwind::Continue(target));
            }
            Op::Nop => {}
        }
        StepOutcome::Continue
    }

    fn pop_args(&mut self, argc: u32) -> Vec<Var> {
        let mut args = Vec::with_capacity(argc as usize);
        for _ in 0..argc {
            args.push(self.act().pop());
        }
        args.reverse();
        args
    }

    fn push_or_raise(&mut self, r: Result<Var, ErrorCode>) -> StepOutcome {
        match r {
            Ok(v) => {
                self.act().push(v);
                StepOutcome::Continue
            }
            Err(code) => self.raise(code, code.mnemonic().to_string(), Var::None),
        }
    }

    /// Raises an in-language error. Searches the handler stack of every
    /// activation from innermost outward; the first matching handler wins
    /// (spec §6.4). Activations without a match are abandoned (their
    /// `finally`, if present and unmatched, still runs before popping, and
    /// the error is re-raised once it does).
    fn raise(&mut self, code: ErrorCode, message: String, value: Var) -> StepOutcome {
        self.unwind(Unwind::Raise(code, message, value))
    }

    /// Drives a `return`/`break`/`continue`/raised-error exit out through
    /// any `try` blocks still open in the current activation, running each
    /// one's `finally` before the exit actually happens (spec §4.4: "finally
    /// always runs, and a pending error is re-raised after it does"). A
    /// `finally` is run by jumping to its label and parking `reason` on the
    /// activation; `Op::EndFinally` resumes this same unwind once the
    /// `finally` body finishes normally. `return`/`break`/`continue` never
    /// cross an activation boundary on their own (loops and `return` are
    /// both scoped to a single verb), but a `raise` that empties out a whole
    /// activation's handler stack keeps searching the caller's.
    fn unwind(&mut self, mut reason: Unwind) -> StepOutcome {
        loop {
            let Some(act) = self.stack.last_mut() else {
                return match reason {
                    Unwind::Raise(code, message, _) => {
                        StepOutcome::Result(ExecutionResult::Uncaught(code, message))
                    }
                    Unwind::Return(v) => StepOutcome::Result(ExecutionResult::Complete(v)),
                    Unwind::Break(_) | Unwind::Continue(_) => {
                        StepOutcome::Result(ExecutionResult::Complete(Var::None))
                    }
                };
            };
            match act.handlers.last().cloned() {
                Some(frame) => {
                    if let Unwind::Raise(code, _, _) = &reason {
                        if let Some(label) = frame.matches(*code) {
                            act.value_stack.truncate(frame.stack_depth);
                            act.push(Var::Err(*code));
                            act.pc = label;
                            act.handlers.pop();
                            return StepOutcome::Continue;
                        }
                    }
                    if let Some(fin) = frame.finally {
                        act.value_stack.truncate(frame.stack_depth);
                        act.handlers.pop();
                        act.pending_unwind = Some(reason);
                        act.pc = fin;
                        return StepOutcome::Continue;
                    }
                    act.handlers.pop();
                }
                None => match reason {
                    Unwind::Return(v) => {
                        self.stack.pop();
                        return match self.stack.last_mut() {
                            None => StepOutcome::Result(ExecutionResult::Complete(v)),
                            Some(caller) => {
                                caller.push(v);
                                StepOutcome::Continue
                            }
                        };
                    }
                    Unwind::Break(target) | Unwind::Continue(target) => {
                        act.pc = target;
                        return StepOutcome::Continue;
                    }
                    Unwind::Raise(code, message, value) => {
                        self.stack.pop();
                        reason = Unwind::Raise(code, message, value);
                    }
                },
            }
        }
    }

    fn get_prop(&self, store: &ObjectStore, obj: &Var, name: &Var, perms: ObjId) -> Result<Var, ErrorCode> {
        let Var::Obj(oid) = obj else {
            return Err(ErrorCode::Type);
        };
        if !store.valid(*oid) {
            return Err(ErrorCode::Invind);
        }
        let Var::Str(name) = name else {
            return Err(ErrorCode::Type);
        };
        let name = String::from_utf8_lossy(name);
        if let Some(v) = store.get_builtin_property(*oid, &name).map_err(store_err_to_code)? {
            return Ok(v);
        }
        let (definer, v) = store.resolve_property(*oid, &name).map_err(store_err_to_code)?;
        store
            .check_prop_readable(definer, &name, perms)
            .map_err(store_err_to_code)?;
        Ok(v)
    }

    fn set_prop(
        &self,
        store: &mut ObjectStore,
        obj: &Var,
        name: &Var,
        value: Var,
        perms: ObjId,
    ) -> Result<(), ErrorCode> {
        let Var::Obj(oid) = obj else {
            return Err(ErrorCode::Type);
        };
        if !store.valid(*oid) {
            return Err(ErrorCode::Invind);
        }
        let Var::Str(name) = name else {
            return Err(ErrorCode::Type);
        };
        let name = String::from_utf8_lossy(name).into_owned();
        if store
            .set_builtin_property(*oid, &name, value.clone(), perms)
            .map_err(store_err_to_code)?
        {
            return Ok(());
        }
        let (definer, _) = store.resolve_property(*oid, &name).map_err(store_err_to_code)?;
        store
            .check_prop_writable(definer, &name, perms)
            .map_err(store_err_to_code)?;
        store
            .set_property(*oid, &name, value)
            .map_err(store_err_to_code)
    }

    fn do_index(&self, obj: &Var, idx: &Var) -> Result<Var, ErrorCode> {
        match (obj, idx) {
            (Var::Map(_), k) => arith::map_get(obj, k),
            (_, Var::Int(i)) => arith::index_get(obj, *i),
            _ => Err(ErrorCode::Type),
        }
    }

    fn do_scatter(
        &mut self,
        ops: &[ScatterOp],
        list: Var,
        store: &mut ObjectStore,
        builtins: &BuiltinRegistry,
    ) -> StepOutcome {
        let Var::List(items) = &list else {
            return self.push_or_raise(Err(ErrorCode::Type));
        };
        let n_required = ops.iter().filter(|o| matches!(o, ScatterOp::Required(_))).count();
        let has_rest = ops.iter().any(|o| matches!(o, ScatterOp::Rest(_)));
        if items.len() < n_required || (!has_rest && items.len() > ops.len()) {
            return self.push_or_raise(Err(ErrorCode::Args));
        }
        let mut cursor = 0usize;
        let n_optional_and_required = ops
            .iter()
            .filter(|o| !matches!(o, ScatterOp::Rest(_)))
            .count();
        let rest_len = items.len().saturating_sub(n_optional_and_required.min(items.len()));
        for op in ops {
            match op {
                ScatterOp::Required(slot) => {
                    let v = items.get(cursor).cloned().unwrap_or(Var::None);
                    self.act().var_slot(*slot, v);
                    cursor += 1;
                }
                ScatterOp::Optional(slot, default) => {
                    if cursor < items.len().saturating_sub(if has_rest { rest_len } else { 0 }) {
                        let v = items.get(cursor).cloned().unwrap_or(Var::None);
                        self.act().var_slot(*slot, v);
                        cursor += 1;
                    } else if let Some(default_ops) = default {
                        let v = self.run_sub_expr(default_ops, store, builtins);
                        self.act().var_slot(*slot, v);
                    } else {
                        self.act().var_slot(*slot, Var::None);
                    }
                }
                ScatterOp::Rest(slot) => {
                    let rest: Vec<Var> = items[cursor..].to_vec();
                    self.act().var_slot(*slot, Var::list(rest));
                    cursor = items.len();
                }
            }
        }
        self.act().push(list);
        StepOutcome::Continue
    }

    /// Evaluates a self-contained op fragment (scatter defaults) against
    /// the current activation's variable table, isolated from the main
    /// program's control flow.
    fn run_sub_expr(&mut self, ops: &[Op], store: &mut ObjectStore, builtins: &BuiltinRegistry) -> Var {
        let save_ops = self.act().program.clone();
        let save_pc = self.act().pc;
        let mut sub_program = (*save_ops).clone();
        sub_program.ops = ops.to_vec();
        self.act().program = Arc::new(sub_program);
        self.act().pc = 0;
        loop {
            if self.act().pc >= self.act().program.ops.len() {
                break;
            }
            let op = self.act().program.ops[self.act().pc].clone();
            self.act().pc += 1;
            if let StepOutcome::Result(_) = self.step(op, store, builtins) {
                break;
            }
        }
        let v = self.act().pop();
        self.act().program = save_ops;
        self.act().pc = save_pc;
        v
    }

    fn do_verb_call(&mut self, argc: u32, store: &mut ObjectStore) -> StepOutcome {
        let args = self.pop_args(argc);
        let name = self.act().pop();
        let obj = self.act().pop();
        let (Var::Obj(oid), Var::Str(name)) = (obj, name) else {
            return self.push_or_raise(Err(ErrorCode::Type));
        };
        let name = String::from_utf8_lossy(&name).into_owned();
        self.dispatch_verb_call(oid, &name, args, store)
    }

    fn dispatch_verb_call(
        &mut self,
        oid: ObjId,
        name: &str,
        args: Vec<Var>,
        store: &mut ObjectStore,
    ) -> StepOutcome {
        if !store.valid(oid) {
            return self.push_or_raise(Err(ErrorCode::Invind));
        }
        if self.stack.len() >= self.max_stack_depth {
            return self.push_or_raise(Err(ErrorCode::MaxRec));
        }
        let caller_perms = self.act().permissions;
        let resolved = store.resolve_verb(oid, name);
        let (owner_obj, _idx, program) = match resolved {
            Ok((owner, idx, verb)) => {
                if let Err(e) = store.check_verb_executable(owner, verb, caller_perms) {
                    return self.push_or_raise(Err(store_err_to_code(e)));
                }
                let Some(prog) = verb.program.clone() else {
                    return self.push_or_raise(Err(ErrorCode::VerbNF));
                };
                (owner, idx, prog)
            }
            Err(e) => return self.push_or_raise(Err(store_err_to_code(e))),
        };
        let caller = self.act().this;
        let player = self.act().player;
        let new_act = Activation::new(
            Arc::new(program),
            oid,
            player,
            caller,
            owner_obj,
            name.to_string(),
            owner_obj,
            args,
        );
        self.stack.push(new_act);
        StepOutcome::Continue
    }
}

enum StepOutcome {
    Continue,
    Result(ExecutionResult),
}

fn store_err_to_code(e: StoreError) -> ErrorCode {
    e.into()
}
