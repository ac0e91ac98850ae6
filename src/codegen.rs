// src/codegen.rs
use std::collections::HashMap;

use crate::ast::*;
use crate::cube;
use crate::error::{Error, SemanticError};
use crate::memory::{Addr, Const, VirtualMemory};
use crate::symbols::{FuncDir, VarKind, GLOBAL_SCOPE};

/// One compiled instruction. Jump targets stay `None` until backpatched;
/// freezing the program guarantees none survive.
#[derive(Debug, Clone, PartialEq)]
pub enum Quad {
    Binary { op: BinOp, left: Addr, right: Addr, dest: Addr },
    Neg { value: Addr, dest: Addr },
    Assign { value: Addr, dest: Addr },
    Goto { target: Option<usize> },
    GotoFalse { cond: Addr, target: Option<usize> },
    Era { callee: String },
    Param { value: Addr, index: usize },
    Gosub { callee: String },
    Return { value: Addr },
    EndFunc,
    Print { value: Addr },
    End,
}

fn fmt_target(target: &Option<usize>) -> String {
    match target {
        Some(t) => t.to_string(),
        None => "?".to_string(),
    }
}

impl std::fmt::Display for Quad {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Quad::Binary { op, left, right, dest } => {
                write!(f, "({}, {}, {}, {})", op, left, right, dest)
            }
            Quad::Neg { value, dest } => write!(f, "(neg, {}, _, {})", value, dest),
            Quad::Assign { value, dest } => write!(f, "(=, {}, _, {})", value, dest),
            Quad::Goto { target } => write!(f, "(GOTO, _, _, {})", fmt_target(target)),
            Quad::GotoFalse { cond, target } => {
                write!(f, "(GOTOF, {}, _, {})", cond, fmt_target(target))
            }
            Quad::Era { callee } => write!(f, "(ERA, _, _, {})", callee),
            Quad::Param { value, index } => write!(f, "(PARAM, {}, _, P{})", value, index),
            Quad::Gosub { callee } => write!(f, "(GOSUB, _, _, {})", callee),
            Quad::Return { value } => write!(f, "(RETURN, _, _, {})", value),
            Quad::EndFunc => write!(f, "(ENDFUNC, _, _, _)"),
            Quad::Print { value } => write!(f, "(PRINT, _, _, {})", value),
            Quad::End => write!(f, "(END, _, _, _)"),
        }
    }
}

/// The frozen compile/execute interface: the instruction list, the function
/// directory and the constant table. Nothing else crosses that boundary.
#[derive(Debug)]
pub struct CompiledProgram {
    pub quads: Vec<Quad>,
    pub functions: FuncDir,
    pub constants: HashMap<Addr, Const>,
}

impl CompiledProgram {
    /// Classic indexed `(op, left, right, result)` table.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (i, quad) in self.quads.iter().enumerate() {
            out.push_str(&format!("{:3}: {}\n", i, quad));
        }
        out
    }
}

/// A call whose arguments are still being generated.
struct PendingCall {
    callee: String,
    next_arg: usize,
}

pub struct Codegen {
    quads: Vec<Quad>,
    memory: VirtualMemory,
    functions: FuncDir,
    // Operand and type stacks are pushed and popped in matched pairs.
    operands: Vec<Addr>,
    types: Vec<Type>,
    // Pending jump indices, resolved innermost-first.
    jumps: Vec<usize>,
    calls: Vec<PendingCall>,
    scope: String,
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            quads: Vec::with_capacity(256),
            memory: VirtualMemory::new(),
            functions: FuncDir::new(),
            operands: Vec::new(),
            types: Vec::new(),
            jumps: Vec::new(),
            calls: Vec::new(),
            scope: GLOBAL_SCOPE.to_string(),
        }
    }

    fn emit(&mut self, quad: Quad) -> usize {
        let pos = self.quads.len();
        self.quads.push(quad);
        pos
    }

    fn patch(&mut self, pos: usize, target: usize) {
        match &mut self.quads[pos] {
            Quad::Goto { target: t } | Quad::GotoFalse { target: t, .. } => {
                debug_assert!(t.is_none(), "jump at {} patched twice", pos);
                *t = Some(target);
            }
            _ => unreachable!("patch target at {} is not a jump", pos),
        }
    }

    fn push_operand(&mut self, addr: Addr, ty: Type) {
        self.operands.push(addr);
        self.types.push(ty);
    }

    fn pop_operand(&mut self) -> (Addr, Type) {
        let addr = self.operands.pop().expect("operand stack underflow");
        let ty = self.types.pop().expect("type stack underflow");
        (addr, ty)
    }

    fn pop_jump(&mut self) -> usize {
        self.jumps.pop().expect("jump stack underflow")
    }

    /// Current function's table first, then the global one.
    fn resolve(&self, name: &str) -> Result<(Addr, Type), SemanticError> {
        let local = self.functions.get(&self.scope).and_then(|f| f.vars.lookup(name));
        let info = match local {
            Some(info) => info,
            None => self
                .functions
                .get(GLOBAL_SCOPE)
                .and_then(|f| f.vars.lookup(name))
                .ok_or_else(|| SemanticError::UndeclaredVariable { name: name.to_string() })?,
        };
        Ok((info.addr, info.ty))
    }

    pub fn compile(mut self, program: &Program) -> Result<CompiledProgram, Error> {
        self.functions.declare(GLOBAL_SCOPE, None, &mut self.memory)?;
        for decl in &program.globals {
            for name in &decl.names {
                self.functions
                    .get_mut(GLOBAL_SCOPE)
                    .expect("global scope vanished")
                    .vars
                    .declare(name, decl.ty, VarKind::Plain, &mut self.memory)?;
            }
        }

        // Function bodies come first in the instruction stream; execution
        // starts by jumping over them into the main block.
        let main_jump = self.emit(Quad::Goto { target: None });

        for func in &program.functions {
            self.function(func)?;
        }

        let main_entry = self.quads.len();
        self.patch(main_jump, main_entry);
        self.scope = GLOBAL_SCOPE.to_string();
        for stmt in &program.main {
            self.stmt(stmt)?;
        }
        self.emit(Quad::End);

        self.freeze()
    }

    fn function(&mut self, func: &FuncDecl) -> Result<(), Error> {
        self.functions.declare(&func.name, func.return_type, &mut self.memory)?;
        self.memory.reset_locals();
        for param in &func.params {
            self.functions.add_parameter(&func.name, &param.name, param.ty, &mut self.memory)?;
        }
        for decl in &func.locals {
            for name in &decl.names {
                self.functions
                    .get_mut(&func.name)
                    .expect("function vanished")
                    .vars
                    .declare(name, decl.ty, VarKind::Plain, &mut self.memory)?;
            }
        }

        self.memory.reset_temporaries();
        let entry = self.quads.len();
        self.functions.get_mut(&func.name).expect("function vanished").entry = Some(entry);
        self.scope = func.name.clone();
        for stmt in &func.body {
            self.stmt(stmt)?;
        }
        self.emit(Quad::EndFunc);
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match stmt {
            Stmt::Assign { name, value } => {
                self.expr(value)?;
                let (src, src_ty) = self.pop_operand();
                let (dest, dest_ty) = self.resolve(name)?;
                if cube::assign(dest_ty, src_ty).is_none() {
                    return Err(SemanticError::IncompatibleAssignment {
                        name: name.clone(),
                        expected: dest_ty,
                        found: src_ty,
                    }
                    .into());
                }
                self.emit(Quad::Assign { value: src, dest });
            }
            Stmt::If { cond, then, otherwise } => {
                self.condition(cond)?;
                for stmt in then {
                    self.stmt(stmt)?;
                }
                match otherwise {
                    None => {
                        let skip = self.pop_jump();
                        let here = self.quads.len();
                        self.patch(skip, here);
                    }
                    Some(body) => {
                        // The taken branch jumps over the else body; the
                        // false branch lands right after this goto.
                        let exit = self.emit(Quad::Goto { target: None });
                        let skip = self.pop_jump();
                        let here = self.quads.len();
                        self.patch(skip, here);
                        self.jumps.push(exit);
                        for stmt in body {
                            self.stmt(stmt)?;
                        }
                        let exit = self.pop_jump();
                        let here = self.quads.len();
                        self.patch(exit, here);
                    }
                }
            }
            Stmt::While { cond, body } => {
                let start = self.quads.len();
                self.jumps.push(start);
                self.condition(cond)?;
                for stmt in body {
                    self.stmt(stmt)?;
                }
                let skip = self.pop_jump();
                let start = self.pop_jump();
                self.emit(Quad::Goto { target: Some(start) });
                let here = self.quads.len();
                self.patch(skip, here);
            }
            Stmt::Print(items) => {
                for item in items {
                    let addr = match item {
                        PrintItem::Text(text) => self.memory.str_constant(text),
                        PrintItem::Value(expr) => {
                            self.expr(expr)?;
                            self.pop_operand().0
                        }
                    };
                    self.emit(Quad::Print { value: addr });
                }
            }
            Stmt::Call { callee, args } => {
                let pushed = self.call(callee, args)?;
                if pushed {
                    // Statement position discards the result.
                    self.pop_operand();
                }
            }
            Stmt::Return(value) => {
                if self.scope == GLOBAL_SCOPE {
                    return Err(SemanticError::ReturnOutsideFunction.into());
                }
                let expected = match self.functions.get(&self.scope).and_then(|f| f.return_type) {
                    Some(ty) => ty,
                    None => {
                        return Err(SemanticError::ReturnInVoid { func: self.scope.clone() }.into())
                    }
                };
                self.expr(value)?;
                let (addr, ty) = self.pop_operand();
                if cube::assign(expected, ty).is_none() {
                    return Err(SemanticError::ReturnType {
                        func: self.scope.clone(),
                        expected,
                        found: ty,
                    }
                    .into());
                }
                self.emit(Quad::Return { value: addr });
            }
        }
        Ok(())
    }

    /// Generates a control-flow condition and leaves its pending `GOTOF`
    /// index on the jump stack.
    fn condition(&mut self, cond: &Expr) -> Result<(), Error> {
        self.expr(cond)?;
        let (addr, ty) = self.pop_operand();
        if ty != Type::Bool {
            return Err(SemanticError::NonBoolCondition { found: ty }.into());
        }
        let skip = self.emit(Quad::GotoFalse { cond: addr, target: None });
        self.jumps.push(skip);
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), Error> {
        match expr {
            Expr::Int(v) => {
                let addr = self.memory.int_constant(*v);
                self.push_operand(addr, Type::Int);
            }
            Expr::Float(v) => {
                let addr = self.memory.float_constant(*v);
                self.push_operand(addr, Type::Float);
            }
            Expr::Ident(name) => {
                let (addr, ty) = self.resolve(name)?;
                self.push_operand(addr, ty);
            }
            Expr::Binary { op, left, right } => {
                self.expr(left)?;
                self.expr(right)?;
                // Right operand was pushed last, so it pops first.
                let (right_addr, right_ty) = self.pop_operand();
                let (left_addr, left_ty) = self.pop_operand();
                let result_ty = cube::binary(*op, left_ty, right_ty).ok_or(
                    SemanticError::TypeMismatch { op: *op, left: left_ty, right: right_ty },
                )?;
                let dest = self.memory.temporary(result_ty);
                self.emit(Quad::Binary { op: *op, left: left_addr, right: right_addr, dest });
                self.push_operand(dest, result_ty);
            }
            Expr::Neg(inner) => {
                self.expr(inner)?;
                let (addr, ty) = self.pop_operand();
                if !matches!(ty, Type::Int | Type::Float) {
                    return Err(SemanticError::BadNegation { found: ty }.into());
                }
                let dest = self.memory.temporary(ty);
                self.emit(Quad::Neg { value: addr, dest });
                self.push_operand(dest, ty);
            }
            Expr::Call { callee, args } => {
                let pushed = self.call(callee, args)?;
                if !pushed {
                    return Err(SemanticError::VoidInExpression { func: callee.clone() }.into());
                }
            }
        }
        Ok(())
    }

    /// Emits the ERA / PARAM... / GOSUB linkage for one call. Returns true
    /// when a result operand was pushed (non-void callee). A stack of
    /// in-progress calls keeps argument counting correct when a call is
    /// nested inside another call's argument expression.
    fn call(&mut self, callee: &str, args: &[Expr]) -> Result<bool, Error> {
        if callee == GLOBAL_SCOPE || self.functions.get(callee).is_none() {
            return Err(SemanticError::UndeclaredFunction { name: callee.to_string() }.into());
        }

        self.emit(Quad::Era { callee: callee.to_string() });
        self.calls.push(PendingCall { callee: callee.to_string(), next_arg: 0 });

        for arg in args {
            self.expr(arg)?;
            let (addr, ty) = self.pop_operand();
            let index = self.calls.last().expect("no call in progress").next_arg;
            let info = self.functions.get(callee).expect("callee vanished");
            if index >= info.param_count() {
                return Err(SemanticError::TooManyArguments {
                    func: callee.to_string(),
                    expected: info.param_count(),
                }
                .into());
            }
            let expected = info.param_types[index];
            if cube::assign(expected, ty).is_none() {
                return Err(SemanticError::ArgumentType {
                    func: callee.to_string(),
                    index: index + 1,
                    expected,
                    found: ty,
                }
                .into());
            }
            self.emit(Quad::Param { value: addr, index: index + 1 });
            self.calls.last_mut().expect("no call in progress").next_arg += 1;
        }

        let call = self.calls.pop().expect("no call in progress");
        debug_assert_eq!(call.callee, callee);
        let info = self.functions.get(callee).expect("callee vanished");
        if call.next_arg != info.param_count() {
            return Err(SemanticError::TooFewArguments {
                func: callee.to_string(),
                expected: info.param_count(),
                found: call.next_arg,
            }
            .into());
        }

        let (return_type, return_addr) = (info.return_type, info.return_addr);
        self.emit(Quad::Gosub { callee: callee.to_string() });

        match (return_type, return_addr) {
            (Some(ty), Some(ret)) => {
                // Copy the delivered return value into a fresh temporary
                // before anything can reuse the shared cell.
                let dest = self.memory.temporary(ty);
                self.emit(Quad::Assign { value: ret, dest });
                self.push_operand(dest, ty);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn freeze(self) -> Result<CompiledProgram, Error> {
        for (i, quad) in self.quads.iter().enumerate() {
            if let Quad::Goto { target: None } | Quad::GotoFalse { target: None, .. } = quad {
                return Err(Error::Internal(format!("unpatched jump at quad {}", i)));
            }
        }
        Ok(CompiledProgram {
            quads: self.quads,
            functions: self.functions,
            constants: self.memory.into_constants(),
        })
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}
