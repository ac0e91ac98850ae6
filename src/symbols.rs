// src/symbols.rs
use std::collections::HashMap;

use crate::ast::Type;
use crate::error::SemanticError;
use crate::memory::{Addr, VirtualMemory};

/// Top-level code is kept in the directory under this reserved name.
pub const GLOBAL_SCOPE: &str = "global";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Plain,
    Param,
}

#[derive(Debug, Clone)]
pub struct VarInfo {
    pub name: String,
    pub ty: Type,
    pub kind: VarKind,
    pub addr: Addr,
}

/// One scope's name-to-binding table. The owning scope decides the segment:
/// the global table allocates global addresses, every function table
/// allocates local ones.
#[derive(Debug)]
pub struct VarTable {
    scope: String,
    vars: HashMap<String, VarInfo>,
}

impl VarTable {
    fn new(scope: &str) -> Self {
        Self { scope: scope.to_string(), vars: HashMap::new() }
    }

    pub fn declare(
        &mut self,
        name: &str,
        ty: Type,
        kind: VarKind,
        memory: &mut VirtualMemory,
    ) -> Result<(), SemanticError> {
        if self.vars.contains_key(name) {
            return Err(SemanticError::DuplicateVariable {
                name: name.to_string(),
                scope: self.scope.clone(),
            });
        }
        let addr = if self.scope == GLOBAL_SCOPE {
            memory.global(ty)
        } else {
            memory.local(ty)
        };
        self.vars.insert(name.to_string(), VarInfo { name: name.to_string(), ty, kind, addr });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&VarInfo> {
        self.vars.get(name)
    }
}

#[derive(Debug)]
pub struct FunctionInfo {
    pub name: String,
    /// `None` for void functions.
    pub return_type: Option<Type>,
    /// Global cell the return value is delivered to; readable after the
    /// callee's frame is gone. `None` for void functions.
    pub return_addr: Option<Addr>,
    pub param_names: Vec<String>,
    pub param_types: Vec<Type>,
    pub vars: VarTable,
    /// Index of the function's first quadruple, set when its body is
    /// generated.
    pub entry: Option<usize>,
}

impl FunctionInfo {
    pub fn param_count(&self) -> usize {
        self.param_types.len()
    }

    /// Address of the k-th parameter (0-based), resolved through the
    /// function's own variable table.
    pub fn param_addr(&self, index: usize) -> Option<Addr> {
        self.param_names
            .get(index)
            .and_then(|name| self.vars.lookup(name))
            .map(|info| info.addr)
    }
}

/// The program-wide function directory.
#[derive(Debug, Default)]
pub struct FuncDir {
    functions: HashMap<String, FunctionInfo>,
}

impl FuncDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the directory entry. Non-void functions get their return
    /// cell allocated here, at declaration time, so call sites generated
    /// before the body (recursion, forward-declared headers) already know
    /// where the result lands.
    pub fn declare(
        &mut self,
        name: &str,
        return_type: Option<Type>,
        memory: &mut VirtualMemory,
    ) -> Result<(), SemanticError> {
        if self.functions.contains_key(name) {
            return Err(SemanticError::DuplicateFunction { name: name.to_string() });
        }
        let return_addr = return_type.map(|ty| memory.global(ty));
        self.functions.insert(
            name.to_string(),
            FunctionInfo {
                name: name.to_string(),
                return_type,
                return_addr,
                param_names: vec![],
                param_types: vec![],
                vars: VarTable::new(name),
                entry: None,
            },
        );
        Ok(())
    }

    /// Appends a parameter to `func`'s ordered list and declares it in the
    /// function's variable table.
    pub fn add_parameter(
        &mut self,
        func: &str,
        name: &str,
        ty: Type,
        memory: &mut VirtualMemory,
    ) -> Result<(), SemanticError> {
        let info = self.functions.get_mut(func).expect("parameter added to unknown function");
        info.vars.declare(name, ty, VarKind::Param, memory)?;
        info.param_names.push(name.to_string());
        info.param_types.push(ty);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FunctionInfo> {
        self.functions.get_mut(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_variable_is_rejected() {
        let mut mem = VirtualMemory::new();
        let mut table = VarTable::new(GLOBAL_SCOPE);
        table.declare("x", Type::Int, VarKind::Plain, &mut mem).unwrap();
        let err = table.declare("x", Type::Float, VarKind::Plain, &mut mem).unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateVariable { .. }));
    }

    #[test]
    fn parameters_keep_declaration_order() {
        let mut mem = VirtualMemory::new();
        let mut dir = FuncDir::new();
        dir.declare("f", Some(Type::Int), &mut mem).unwrap();
        dir.add_parameter("f", "a", Type::Int, &mut mem).unwrap();
        dir.add_parameter("f", "b", Type::Float, &mut mem).unwrap();

        let info = dir.get("f").unwrap();
        assert_eq!(info.param_count(), 2);
        assert_eq!(info.param_types, vec![Type::Int, Type::Float]);
        assert_eq!(info.param_addr(0), Some(Addr::Local(Type::Int, 0)));
        assert_eq!(info.param_addr(1), Some(Addr::Local(Type::Float, 0)));
        assert_eq!(info.param_addr(2), None);
    }

    #[test]
    fn return_cell_is_global_and_allocated_at_declaration() {
        let mut mem = VirtualMemory::new();
        let mut dir = FuncDir::new();
        dir.declare("f", Some(Type::Float), &mut mem).unwrap();
        dir.declare("g", None, &mut mem).unwrap();
        assert_eq!(dir.get("f").unwrap().return_addr, Some(Addr::Global(Type::Float, 0)));
        assert_eq!(dir.get("g").unwrap().return_addr, None);
    }

    #[test]
    fn duplicate_function_is_rejected() {
        let mut mem = VirtualMemory::new();
        let mut dir = FuncDir::new();
        dir.declare("f", None, &mut mem).unwrap();
        let err = dir.declare("f", Some(Type::Int), &mut mem).unwrap_err();
        assert!(matches!(err, SemanticError::DuplicateFunction { .. }));
    }
}
