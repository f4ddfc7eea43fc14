//! One stack frame: a verb call in progress (spec §6.2).

use crate::compiler::program::Program;
use crate::value::{ObjId, Var};
use crate::vm::unwind::{HandlerFrame, Unwind};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Activation {
    pub program: Arc<Program>,
    pub pc: usize,
    /// Local variable slots, indexed per `Program::var_names`.
    pub vars: Vec<Var>,
    /// Expression evaluation stack.
    pub value_stack: Vec<Var>,
    pub handlers: Vec<HandlerFrame>,

    pub this: ObjId,
    pub player: ObjId,
    pub caller: ObjId,
    pub permissions: ObjId,
    pub verb_name: String,
    pub verb_owner: ObjId,
    pub args: Vec<Var>,
    /// Set by a builtin that wants to be re-entered with a verb call's
    /// result rather than returning to the caller immediately (rdaum-moor's
    /// `bf_trampoline` pattern).
    pub bf_trampoline: Option<usize>,
    pub bf_trampoline_arg: Option<Var>,
    /// A return/break/continue/raise waiting to resume once the `finally`
    /// block currently executing reaches its `Op::EndFinally` (spec §4.4).
    pub pending_unwind: Option<Unwind>,
}

impl Activation {
    pub fn new(
        program: Arc<Program>,
        this: ObjId,
        player: ObjId,
        caller: ObjId,
        permissions: ObjId,
        verb_name: String,
        verb_owner: ObjId,
        args: Vec<Var>,
    ) -> Self {
        let vars = vec![Var::None; program.var_names.len()];
        let mut act = Activation {
            program,
            pc: 0,
            vars,
            value_stack: Vec::new(),
            handlers: Vec::new(),
            this,
            player,
            caller,
            permissions,
            verb_name,
            verb_owner,
            args: args.clone(),
            bf_trampoline: None,
            bf_trampoline_arg: None,
            pending_unwind: None,
        };
        act.bind_context_var("this", Var::Obj(this));
        act.bind_context_var("player", Var::Obj(player));
        act.bind_context_var("caller", Var::Obj(caller));
        act.bind_context_var("verb", Var::str(act.verb_name.as_bytes().to_vec()));
        act.bind_context_var("args", Var::list(args));
        act
    }

    /// Pre-binds one of the named context locals (spec §4.4 "Activation
    /// frame") to its slot in `program.var_names`, if this verb's source
    /// actually references that name — verbs that never mention `dobj`
    /// simply never allocated a slot for it.
    pub fn bind_context_var(&mut self, name: &str, value: Var) {
        if let Some(idx) = self.program.var_names.iter().position(|n| n == name) {
            self.vars[idx] = value;
        }
    }

    pub fn push(&mut self, v: Var) {
        self.value_stack.push(v);
    }

    pub fn pop(&mut self) -> Var {
        self.value_stack.pop().unwrap_or(Var::None)
    }

    pub fn var_slot(&mut self, slot: u32, v: Var) {
        let i = slot as usize;
        if i >= self.vars.len() {
            self.vars.resize(i + 1, Var::None);
        }
        self.vars[i] = v;
    }
}
