//! Explicit (non-host-unwinding) control-flow propagation: `try`/`except`/
//! `finally` and `break`/`continue`/`return` are modeled as data, not Rust
//! panics or early returns through `?`, so that a task can be serialized
//! mid-handler-stack across a `suspend()` (spec §6.4).

use crate::compiler::program::Label;
use crate::value::{ErrorCode, Var};

/// Why a block of statements stopped executing normally. Threaded explicitly
/// through the interpreter loop instead of `return`/`break` so `finally`
/// blocks always get a chance to run first (spec §4.4: `finally` runs on
/// every exit path out of its `try`, not just a thrown error).
#[derive(Debug, Clone)]
pub enum Unwind {
    Return(Var),
    Break(Label),
    Continue(Label),
    Raise(ErrorCode, String, Var),
}

/// One entry of the per-activation handler stack, pushed by `Op::PushHandler`
/// and popped on normal completion of the protected region or consumed by a
/// matching `Raise`.
#[derive(Debug, Clone)]
pub struct HandlerFrame {
    pub handlers: Vec<(Vec<crate::compiler::program::CatchSpec>, usize)>,
    pub finally: Option<usize>,
    /// Value stack depth at push time, restored before running a handler so
    /// partially-evaluated expressions from the protected region don't leak.
    pub stack_depth: usize,
}

impl HandlerFrame {
    pub fn matches(&self, code: ErrorCode) -> Option<usize> {
        for (specs, label) in &self.handlers {
            for spec in specs {
                match spec {
                    crate::compiler::program::CatchSpec::Any => return Some(*label),
                    crate::compiler::program::CatchSpec::Named(c) if *c == code => {
                        return Some(*label)
                    }
                    _ => {}
                }
            }
        }
        None
    }
}
