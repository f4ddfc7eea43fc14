//! AST -> bytecode compiler (C5, spec §4.5). A single linear pass with
//! backpatched jump targets, mirroring the "compile to a flat op vector,
//! patch label positions after the fact" approach used by most MOO/Scheme
//! bytecode compilers rather than a separate label-resolution pass.

use crate::compiler::ast::*;
use crate::compiler::program::{CatchSpec, Op, Program, ScatterOp};
use crate::value::ErrorCode;

pub struct CodeGen {
    ops: Vec<Op>,
    var_names: Vec<String>,
    /// Stack of (break_patch_list, continue_patch_list, label) for loops in
    /// scope, so `break`/`continue` (possibly labeled) can patch forward or
    /// backward appropriately.
    loops: Vec<LoopCtx>,
}

struct LoopCtx {
    label: Option<String>,
    break_patches: Vec<usize>,
    continue_target: usize,
}

pub fn compile(program: &Program_) -> Program {
    let mut cg = CodeGen {
        ops: Vec::new(),
        var_names: Vec::new(),
        loops: Vec::new(),
    };
    cg.compile_stmts(program);
    cg.emit(Op::ReturnNone);
    let mut out = crate::compiler::program::Program::new(cg.var_names);
    out.ops = cg.ops;
    out
}

type Program_ = Vec<Stmt>;

impl CodeGen {
    fn var_slot(&mut self, name: &str) -> u32 {
        if let Some(i) = self.var_names.iter().position(|n| n == name) {
            return i as u32;
        }
        self.var_names.push(name.to_string());
        (self.var_names.len() - 1) as u32
    }

    fn emit(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    fn here(&self) -> usize {
        self.ops.len()
    }

    fn patch_jump_target(&mut self, at: usize, target: usize) {
        match &mut self.ops[at] {
            Op::Jump(l)
            | Op::JumpIfFalse(l)
            | Op::JumpIfFalsePeek(l)
            | Op::JumpIfTruePeek(l)
            | Op::Break(l)
            | Op::Continue(l) => *l = target,
            Op::ForListNext { exit, .. } => *exit = target,
            Op::ForRangeNext { exit, .. } => *exit = target,
            other => panic!("patch_jump_target on non-jump op {:?}", other),
        }
    }

    fn compile_stmts(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            self.compile_stmt(s);
        }
    }

    fn compile_stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Expr(e) => {
                self.compile_expr(e);
                self.emit(Op::Pop);
            }
            Stmt::If(arms, else_body) => self.compile_if(arms, else_body),
            Stmt::While { label, cond, body } => self.compile_while(label.clone(), cond, body),
            Stmt::ForList {
                var,
                index_var,
                label,
                list,
                body,
            } => self.compile_for_list(var, index_var.as_deref(), label.clone(), list, body),
            Stmt::ForRange {
                var,
                label,
                from,
                to,
                body,
            } => self.compile_for_range(var, label.clone(), from, to, body),
            Stmt::Fork { var, delay, body } => self.compile_fork(var.as_deref(), delay, body),
            Stmt::Try {
                body,
                excepts,
                finally,
            } => self.compile_try(body, excepts, finally.as_deref()),
            Stmt::Return(e) => {
                match e {
                    Some(e) => {
                        self.compile_expr(e);
                        self.emit(Op::Return);
                    }
                    None => {
                        self.emit(Op::ReturnNone);
                    }
                }
            }
            Stmt::Break(label) => self.compile_break(label.as_deref()),
            Stmt::Continue(label) => self.compile_continue(label.as_deref()),
        }
    }

    fn compile_if(&mut self, arms: &[(Expr, Vec<Stmt>)], else_body: &[Stmt]) {
        let mut end_jumps = Vec::new();
        for (cond, body) in arms {
            self.compile_expr(cond);
            let skip = self.emit(Op::JumpIfFalse(0));
            self.compile_stmts(body);
            end_jumps.push(self.emit(Op::Jump(0)));
            let after = self.here();
            self.patch_jump_target(skip, after);
        }
        self.compile_stmts(else_body);
        let end = self.here();
        for j in end_jumps {
            self.patch_jump_target(j, end);
        }
    }

    fn compile_while(&mut self, label: Option<String>, cond: &Expr, body: &[Stmt]) {
        let top = self.here();
        self.compile_expr(cond);
        let exit = self.emit(Op::JumpIfFalse(0));
        self.loops.push(LoopCtx {
            label,
            break_patches: Vec::new(),
            continue_target: top,
        });
        self.compile_stmts(body);
        let ctx = self.loops.pop().unwrap();
        self.emit(Op::Jump(top));
        let after = self.here();
        self.patch_jump_target(exit, after);
        for b in ctx.break_patches {
            self.patch_jump_target(b, after);
        }
    }

    fn compile_for_list(
        &mut self,
        var: &str,
        index_var: Option<&str>,
        label: Option<String>,
        list: &Expr,
        body: &[Stmt],
    ) {
        self.compile_expr(list);
        self.emit(Op::ForListStart);
        let var_slot = self.var_slot(var);
        let idx_slot = index_var.map(|n| self.var_slot(n));
        let top = self.here();
        // Binds `var`/`index_var` directly into their slots each iteration
        // (or jumps past `exit` once the list is exhausted).
        let exit = self.emit(Op::ForListNext {
            var_slot,
            idx_slot,
            exit: 0,
        });
        self.loops.push(LoopCtx {
            label,
            break_patches: Vec::new(),
            continue_target: top,
        });
        self.compile_stmts(body);
        let ctx = self.loops.pop().unwrap();
        self.emit(Op::Jump(top));
        let after = self.here();
        self.patch_jump_target(exit, after);
        for b in ctx.break_patches {
            self.patch_jump_target(b, after);
        }
    }

    fn compile_for_range(
        &mut self,
        var: &str,
        label: Option<String>,
        from: &Expr,
        to: &Expr,
        body: &[Stmt],
    ) {
        self.compile_expr(from);
        self.compile_expr(to);
        self.emit(Op::ForRangeStart);
        let var_slot = self.var_slot(var);
        let top = self.here();
        let exit = self.emit(Op::ForRangeNext { var_slot, exit: 0 });
        self.loops.push(LoopCtx {
            label,
            break_patches: Vec::new(),
            continue_target: top,
        });
        self.compile_stmts(body);
        let ctx = self.loops.pop().unwrap();
        self.emit(Op::Jump(top));
        let after = self.here();
        self.patch_jump_target(exit, after);
        for b in ctx.break_patches {
            self.patch_jump_target(b, after);
        }
    }

    fn compile_fork(&mut self, var: Option<&str>, delay: &Expr, body: &[Stmt]) {
        self.compile_expr(delay);
        let fork_at = self.emit(Op::Fork {
            var_slot: var.map(|n| self.var_slot(n)),
            body: 0,
        });
        let skip = self.emit(Op::Jump(0));
        let body_start = self.here();
        self.compile_stmts(body);
        self.emit(Op::ReturnNone);
        let after = self.here();
        match &mut self.ops[fork_at] {
            Op::Fork { body, .. } => *body = body_start,
            _ => unreachable!(),
        }
        self.patch_jump_target(skip, after);
    }

    fn compile_try(&mut self, body: &[Stmt], excepts: &[ExceptClause], finally: Option<&[Stmt]>) {
        let push_at = self.emit(Op::PushHandler {
            handlers: Vec::new(),
            finally: None,
        });
        self.compile_stmts(body);
        self.emit(Op::PopHandler);
        let skip_handlers = self.emit(Op::Jump(0));

        let mut handler_labels = Vec::new();
        for ex in excepts {
            let label = self.here();
            if let Some(name) = &ex.var {
                let slot = self.var_slot(name);
                self.emit(Op::PopVar(slot));
            } else {
                self.emit(Op::Pop);
            }
            self.compile_stmts(&ex.body);
            handler_labels.push(label);
        }
        let after_handlers = self.here();
        self.patch_jump_target(skip_handlers, after_handlers);

        let finally_label = finally.map(|f| {
            let label = self.here();
            self.compile_stmts(f);
            self.emit(Op::EndFinally);
            label
        });

        let handlers: Vec<(Vec<CatchSpec>, usize)> = excepts
            .iter()
            .zip(handler_labels)
            .map(|(ex, label)| (to_catch_specs(&ex.codes), label))
            .collect();
        match &mut self.ops[push_at] {
            Op::PushHandler { handlers: h, finally: f } => {
                *h = handlers;
                *f = finally_label;
            }
            _ => unreachable!(),
        }
    }

    fn compile_break(&mut self, label: Option<&str>) {
        let idx = self.find_loop(label);
        let at = self.emit(Op::Break(0));
        self.loops[idx].break_patches.push(at);
    }

    fn compile_continue(&mut self, label: Option<&str>) {
        let idx = self.find_loop(label);
        let target = self.loops[idx].continue_target;
        self.emit(Op::Continue(target));
    }

    fn find_loop(&self, label: Option<&str>) -> usize {
        match label {
            Some(l) => self
                .loops
                .iter()
                .rposition(|c| c.label.as_deref() == Some(l))
                .unwrap_or(self.loops.len() - 1),
            None => self.loops.len() - 1,
        }
    }

    fn compile_expr(&mut self, e: &Expr) {
        match e {
            Expr::Literal(v) => {
                self.emit(Op::PushLit(v.clone()));
            }
            Expr::Var(name) => {
                let slot = self.var_slot(name);
                self.emit(Op::PushVar(slot));
            }
            Expr::RangeStart => {
                self.emit(Op::RangeStart);
            }
            Expr::RangeEnd => {
                self.emit(Op::RangeEnd);
            }
            Expr::Assign(lhs, rhs) => {
                self.compile_expr(rhs);
                self.emit(Op::Dup);
                self.compile_store(lhs);
            }
            Expr::ScatterAssign(targets, rhs) => {
                self.compile_expr(rhs);
                self.emit(Op::Dup);
                let ops = targets
                    .iter()
                    .map(|t| match t {
                        ScatterTarget::Required(n) => ScatterOp::Required(self.var_slot(n)),
                        ScatterTarget::Optional(n, default) => {
                            let slot = self.var_slot(n);
                            let default_ops = default.as_ref().map(|d| self.compile_sub_expr(d));
                            ScatterOp::Optional(slot, default_ops)
                        }
                        ScatterTarget::Rest(n) => ScatterOp::Rest(self.var_slot(n)),
                    })
                    .collect::<Vec<_>>();
                self.emit(Op::Scatter(ops));
            }
            Expr::Binary(op, l, r) => {
                self.compile_expr(l);
                self.compile_expr(r);
                self.emit(binop_to_op(*op));
            }
            Expr::Unary(op, v) => {
                self.compile_expr(v);
                self.emit(match op {
                    UnOp::Neg => Op::Neg,
                    UnOp::Not => Op::Not,
                    UnOp::BitNot => Op::BitNot,
                });
            }
            Expr::And(l, r) => {
                self.compile_expr(l);
                let jmp = self.emit(Op::JumpIfFalsePeek(0));
                self.emit(Op::Pop);
                self.compile_expr(r);
                let after = self.here();
                self.patch_jump_target(jmp, after);
            }
            Expr::Or(l, r) => {
                self.compile_expr(l);
                let jmp = self.emit(Op::JumpIfTruePeek(0));
                self.emit(Op::Pop);
                self.compile_expr(r);
                let after = self.here();
                self.patch_jump_target(jmp, after);
            }
            Expr::Cond(c, t, f) => {
                self.compile_expr(c);
                let else_jmp = self.emit(Op::JumpIfFalse(0));
                self.compile_expr(t);
                let end_jmp = self.emit(Op::Jump(0));
                let else_at = self.here();
                self.patch_jump_target(else_jmp, else_at);
                self.compile_expr(f);
                let end = self.here();
                self.patch_jump_target(end_jmp, end);
            }
            Expr::PropGet(obj, name) => {
                self.compile_expr(obj);
                self.compile_prop_name(name);
                self.emit(Op::GetProp);
            }
            Expr::PropSet(obj, name, val) => {
                self.compile_expr(obj);
                self.compile_prop_name(name);
                self.compile_expr(val);
                self.emit(Op::SetProp);
            }
            Expr::VerbCall(obj, name, args) => {
                self.compile_expr(obj);
                self.compile_verb_name(name);
                let n = args.len() as u32;
                for a in args {
                    self.compile_expr(a);
                }
                self.emit(Op::VerbCall(n));
            }
            Expr::BuiltinCall(name, args) => {
                let n = args.len() as u32;
                for a in args {
                    self.compile_expr(a);
                }
                self.emit(Op::BuiltinCall(name.clone(), n));
            }
            Expr::Index(obj, idx) => {
                self.compile_expr(obj);
                self.compile_expr(idx);
                self.emit(Op::Index);
            }
            Expr::IndexSet(obj, idx, val) => {
                self.compile_expr(obj);
                self.compile_expr(idx);
                self.compile_expr(val);
                self.emit(Op::IndexSet);
            }
            Expr::Range(obj, a, b) => {
                self.compile_expr(obj);
                self.compile_expr(a);
                self.compile_expr(b);
                self.emit(Op::Range);
            }
            Expr::RangeSet(obj, a, b, val) => {
                self.compile_expr(obj);
                self.compile_expr(a);
                self.compile_expr(b);
                self.compile_expr(val);
                self.emit(Op::RangeSet);
            }
            Expr::List(items) => {
                let mut n = 0u32;
                for item in items {
                    match item {
                        ListItem::Single(e) => {
                            self.compile_expr(e);
                            n += 1;
                        }
                        ListItem::Splice(e) => {
                            self.compile_expr(e);
                            self.emit(Op::Splice);
                        }
                    }
                }
                self.emit(Op::MakeList(n));
            }
            Expr::Map(pairs) => {
                for (k, v) in pairs {
                    self.compile_expr(k);
                    self.compile_expr(v);
                }
                self.emit(Op::MakeMap(pairs.len() as u32));
            }
            Expr::Catch(body, codes, default) => {
                let specs = to_catch_specs(codes);
                let push_at = self.emit(Op::PushHandler {
                    handlers: Vec::new(),
                    finally: None,
                });
                self.compile_expr(body);
                self.emit(Op::PopHandler);
                let skip = self.emit(Op::Jump(0));
                let handler_label = self.here();
                match default {
                    Some(d) => {
                        self.emit(Op::Pop);
                        self.compile_expr(d);
                    }
                    None => {}
                }
                let after = self.here();
                self.patch_jump_target(skip, after);
                match &mut self.ops[push_at] {
                    Op::PushHandler { handlers, .. } => {
                        *handlers = vec![(specs, handler_label)];
                    }
                    _ => unreachable!(),
                }
            }
            Expr::SystemProp(name) => {
                self.emit(Op::SystemProp(name.clone()));
            }
            Expr::SystemVerbCall(name, args) => {
                let n = args.len() as u32;
                for a in args {
                    self.compile_expr(a);
                }
                self.emit(Op::SystemVerbCall(name.clone(), n));
            }
        }
    }

    fn compile_prop_name(&mut self, name: &PropName) {
        match name {
            PropName::Literal(s) => {
                self.emit(Op::PushLit(crate::value::Var::Str(std::sync::Arc::new(
                    s.as_bytes().to_vec(),
                ))));
            }
            PropName::Dynamic(e) => self.compile_expr(e),
        }
    }

    fn compile_verb_name(&mut self, name: &VerbName) {
        match name {
            VerbName::Literal(s) => {
                self.emit(Op::PushLit(crate::value::Var::Str(std::sync::Arc::new(
                    s.as_bytes().to_vec(),
                ))));
            }
            VerbName::Dynamic(e) => self.compile_expr(e),
        }
    }

    /// Compiles `e` into its own self-contained op sequence (no jump targets
    /// into or out of the enclosing program), for contexts like scatter
    /// defaults where the VM evaluates a fragment in isolation. Shares the
    /// variable slot table so the fragment can reference enclosing locals.
    fn compile_sub_expr(&mut self, e: &Expr) -> Vec<Op> {
        let saved = std::mem::take(&mut self.ops);
        self.compile_expr(e);
        std::mem::replace(&mut self.ops, saved)
    }

    fn compile_store(&mut self, lhs: &Expr) {
        match lhs {
            Expr::Var(name) => {
                let slot = self.var_slot(name);
                self.emit(Op::PopVar(slot));
            }
            other => panic!("invalid assignment target in codegen: {:?}", other),
        }
    }
}

fn binop_to_op(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Mod => Op::Mod,
        BinOp::Pow => Op::Pow,
        BinOp::Eq => Op::CmpEq,
        BinOp::Ne => Op::CmpNe,
        BinOp::Lt => Op::CmpLt,
        BinOp::Le => Op::CmpLe,
        BinOp::Gt => Op::CmpGt,
        BinOp::Ge => Op::CmpGe,
        BinOp::In => Op::In,
        BinOp::BitAnd => Op::BitAnd,
        BinOp::BitOr => Op::BitOr,
        BinOp::BitXor => Op::BitXor,
        BinOp::Shl => Op::Shl,
        BinOp::Shr => Op::Shr,
    }
}

fn to_catch_specs(codes: &[CatchCode]) -> Vec<CatchSpec> {
    codes
        .iter()
        .map(|c| match c {
            CatchCode::Any => CatchSpec::Any,
            CatchCode::Named(n) => ErrorCode::from_mnemonic(n)
                .map(CatchSpec::Named)
                .unwrap_or(CatchSpec::Any),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::parser::parse_program;

    #[test]
    fn compiles_arithmetic_and_assignment() {
        let ast = parse_program("x = 1 + 2 * 3;").unwrap();
        let prog = compile(&ast);
        assert!(matches!(prog.ops.last(), Some(Op::ReturnNone)));
        assert!(prog.ops.iter().any(|op| matches!(op, Op::Add)));
        assert!(prog.ops.iter().any(|op| matches!(op, Op::Mul)));
    }

    #[test]
    fn compiles_if_with_jumps_in_range() {
        let ast = parse_program("if (x) y = 1; else y = 2; endif").unwrap();
        let prog = compile(&ast);
        for op in &prog.ops {
            if let Op::JumpIfFalse(t) | Op::Jump(t) = op {
                assert!(*t <= prog.ops.len());
            }
        }
    }

    #[test]
    fn compiles_while_loop_back_edge() {
        let ast = parse_program("while (x) x = x - 1; endwhile").unwrap();
        let prog = compile(&ast);
        assert!(prog.ops.iter().any(|op| matches!(op, Op::Jump(t) if *t == 0)));
    }
}
