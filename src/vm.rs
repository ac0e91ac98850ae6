// src/vm.rs
use std::collections::HashMap;

use crate::ast::{BinOp, Type};
use crate::codegen::{CompiledProgram, Quad};
use crate::error::RuntimeError;
use crate::memory::{Addr, Const};
use crate::symbols::GLOBAL_SCOPE;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl Value {
    fn zero(ty: Type) -> Value {
        match ty {
            Type::Int => Value::Int(0),
            Type::Float => Value::Float(0.0),
            Type::Bool => Value::Bool(false),
            Type::Str => Value::Str(String::new()),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&Const> for Value {
    fn from(c: &Const) -> Value {
        match c {
            Const::Int(v) => Value::Int(*v),
            Const::Float(v) => Value::Float(*v),
            Const::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            // Floats always carry a decimal point, even when whole.
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

fn arith(a: &Value, b: &Value, iop: fn(i64, i64) -> i64, fop: fn(f64, f64) -> f64) -> Option<Value> {
    match (a, b) {
        (Value::Int(a), Value::Int(b)) => Some(Value::Int(iop(*a, *b))),
        (Value::Float(a), Value::Float(b)) => Some(Value::Float(fop(*a, *b))),
        (Value::Int(a), Value::Float(b)) => Some(Value::Float(fop(*a as f64, *b))),
        (Value::Float(a), Value::Int(b)) => Some(Value::Float(fop(*a, *b as f64))),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value, cmp: fn(f64, f64) -> bool) -> Option<Value> {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => Some(Value::Bool(cmp(x, y))),
        _ => None,
    }
}

fn equals(a: &Value, b: &Value) -> Option<bool> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Some(x == y),
        (Value::Str(x), Value::Str(y)) => Some(x == y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Some(x == y),
            _ => None,
        },
    }
}

/// Int written into a float cell widens; everything else lands as-is.
fn coerce(ty: Type, value: Value) -> Value {
    match (ty, value) {
        (Type::Float, Value::Int(v)) => Value::Float(v as f64),
        (_, v) => v,
    }
}

/// One activation's private storage. `ret` is the activation's pending
/// return value; it is delivered to the function's global return cell when
/// the frame is popped, never before.
#[derive(Debug)]
struct Frame {
    func: String,
    locals: HashMap<Addr, Value>,
    temps: HashMap<Addr, Value>,
    ret: Option<Value>,
}

impl Frame {
    fn new(func: &str) -> Self {
        Self { func: func.to_string(), locals: HashMap::new(), temps: HashMap::new(), ret: None }
    }
}

/// Fetch-execute loop over a frozen quadruple program.
pub struct Vm<'a> {
    program: &'a CompiledProgram,
    globals: HashMap<Addr, Value>,
    frame: Frame,
    call_stack: Vec<(Frame, usize)>,
    // Frames built by ERA and not yet activated. A stack, so a call nested
    // inside another call's argument expression keeps both alive.
    pending: Vec<Frame>,
    ip: usize,
    pub output: String,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a CompiledProgram) -> Self {
        Self {
            program,
            globals: HashMap::new(),
            frame: Frame::new(GLOBAL_SCOPE),
            call_stack: Vec::new(),
            pending: Vec::new(),
            ip: 0,
            output: String::new(),
        }
    }

    fn read(&self, addr: Addr) -> Result<Value, RuntimeError> {
        match addr {
            Addr::Const(..) => self
                .program
                .constants
                .get(&addr)
                .map(Value::from)
                .ok_or(RuntimeError::MissingConstant { at: self.ip }),
            // Unwritten cells read as the type's zero value.
            Addr::Global(ty, _) => {
                Ok(self.globals.get(&addr).cloned().unwrap_or_else(|| Value::zero(ty)))
            }
            Addr::Local(ty, _) => {
                Ok(self.frame.locals.get(&addr).cloned().unwrap_or_else(|| Value::zero(ty)))
            }
            Addr::Temp(ty, _) => {
                Ok(self.frame.temps.get(&addr).cloned().unwrap_or_else(|| Value::zero(ty)))
            }
        }
    }

    fn write(&mut self, addr: Addr, value: Value) -> Result<(), RuntimeError> {
        let value = coerce(addr.ty(), value);
        match addr {
            Addr::Global(..) => {
                self.globals.insert(addr, value);
            }
            Addr::Local(..) => {
                self.frame.locals.insert(addr, value);
            }
            Addr::Temp(..) => {
                self.frame.temps.insert(addr, value);
            }
            Addr::Const(..) => return Err(RuntimeError::WriteToConstant { at: self.ip }),
        }
        Ok(())
    }

    fn binary(&self, op: BinOp, a: Value, b: Value) -> Result<Value, RuntimeError> {
        let result = match op {
            BinOp::Add => arith(&a, &b, |x, y| x + y, |x, y| x + y),
            BinOp::Sub => arith(&a, &b, |x, y| x - y, |x, y| x - y),
            BinOp::Mul => arith(&a, &b, |x, y| x * y, |x, y| x * y),
            // Division is float division regardless of operand types.
            BinOp::Div => match (a.as_f64(), b.as_f64()) {
                (Some(_), Some(y)) if y == 0.0 => {
                    return Err(RuntimeError::DivisionByZero { at: self.ip })
                }
                (Some(x), Some(y)) => Some(Value::Float(x / y)),
                _ => None,
            },
            BinOp::Lt => compare(&a, &b, |x, y| x < y),
            BinOp::Gt => compare(&a, &b, |x, y| x > y),
            BinOp::Eq => equals(&a, &b).map(Value::Bool),
            BinOp::Ne => equals(&a, &b).map(|e| Value::Bool(!e)),
        };
        result.ok_or_else(|| RuntimeError::UnsupportedOperands { op: op.to_string(), at: self.ip })
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        while self.ip < self.program.quads.len() {
            let quad = &self.program.quads[self.ip];
            match quad {
                Quad::Binary { op, left, right, dest } => {
                    let a = self.read(*left)?;
                    let b = self.read(*right)?;
                    let v = self.binary(*op, a, b)?;
                    self.write(*dest, v)?;
                }
                Quad::Neg { value, dest } => {
                    let v = match self.read(*value)? {
                        Value::Int(v) => Value::Int(-v),
                        Value::Float(v) => Value::Float(-v),
                        _ => {
                            return Err(RuntimeError::UnsupportedOperands {
                                op: "neg".to_string(),
                                at: self.ip,
                            })
                        }
                    };
                    self.write(*dest, v)?;
                }
                Quad::Assign { value, dest } => {
                    let v = self.read(*value)?;
                    self.write(*dest, v)?;
                }
                Quad::Goto { target } => {
                    self.ip = target.ok_or(RuntimeError::UnresolvedJump { at: self.ip })?;
                    continue;
                }
                Quad::GotoFalse { cond, target } => {
                    let target = target.ok_or(RuntimeError::UnresolvedJump { at: self.ip })?;
                    match self.read(*cond)? {
                        Value::Bool(false) => {
                            self.ip = target;
                            continue;
                        }
                        Value::Bool(true) => {}
                        _ => return Err(RuntimeError::BadCondition { at: self.ip }),
                    }
                }
                Quad::Era { callee } => {
                    self.pending.push(Frame::new(callee));
                }
                Quad::Param { value, index } => {
                    let v = self.read(*value)?;
                    let callee = match self.pending.last() {
                        Some(frame) => frame.func.clone(),
                        None => return Err(RuntimeError::MissingActivationRecord { at: self.ip }),
                    };
                    let info = self
                        .program
                        .functions
                        .get(&callee)
                        .ok_or_else(|| RuntimeError::UnknownFunction { name: callee.clone() })?;
                    let addr = info.param_addr(index - 1).ok_or_else(|| {
                        RuntimeError::BadParameter { func: callee.clone(), index: *index }
                    })?;
                    let frame = self.pending.last_mut().expect("pending frame checked above");
                    frame.locals.insert(addr, coerce(addr.ty(), v));
                }
                Quad::Gosub { callee } => {
                    let info = self
                        .program
                        .functions
                        .get(callee)
                        .ok_or_else(|| RuntimeError::UnknownFunction { name: callee.clone() })?;
                    let entry = info
                        .entry
                        .ok_or_else(|| RuntimeError::MissingEntry { func: callee.clone() })?;
                    let frame = self
                        .pending
                        .pop()
                        .ok_or(RuntimeError::MissingActivationRecord { at: self.ip })?;
                    let saved = std::mem::replace(&mut self.frame, frame);
                    self.call_stack.push((saved, self.ip + 1));
                    self.ip = entry;
                    continue;
                }
                Quad::Return { value } => {
                    let info = self.program.functions.get(&self.frame.func);
                    if info.and_then(|f| f.return_addr).is_none() {
                        return Err(RuntimeError::MissingReturnSlot {
                            func: self.frame.func.clone(),
                        });
                    }
                    let v = self.read(*value)?;
                    self.frame.ret = Some(v);
                }
                Quad::EndFunc => {
                    let (saved, return_ip) = self
                        .call_stack
                        .pop()
                        .ok_or(RuntimeError::CallStackUnderflow { at: self.ip })?;
                    let finished = std::mem::replace(&mut self.frame, saved);
                    // Deliver the activation's return value to the shared
                    // cell now, right before the caller's copy runs.
                    if let Some(v) = finished.ret {
                        let ret = self
                            .program
                            .functions
                            .get(&finished.func)
                            .and_then(|f| f.return_addr)
                            .ok_or_else(|| RuntimeError::MissingReturnSlot {
                                func: finished.func.clone(),
                            })?;
                        self.write(ret, v)?;
                    }
                    self.ip = return_ip;
                    continue;
                }
                Quad::Print { value } => {
                    let v = self.read(*value)?;
                    self.output.push_str(&v.to_string());
                }
                Quad::End => {
                    self.output.push('\n');
                    return Ok(());
                }
            }
            self.ip += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_render_in_their_natural_form() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::Float(4.0).to_string(), "4.0");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Str("hola".to_string()).to_string(), "hola");
    }

    #[test]
    fn arithmetic_promotes_mixed_operands() {
        let v = arith(&Value::Int(3), &Value::Float(0.5), |x, y| x + y, |x, y| x + y);
        assert_eq!(v, Some(Value::Float(3.5)));
        let v = arith(&Value::Int(3), &Value::Int(4), |x, y| x * y, |x, y| x * y);
        assert_eq!(v, Some(Value::Int(12)));
        assert_eq!(arith(&Value::Bool(true), &Value::Int(1), |x, y| x + y, |x, y| x + y), None);
    }

    #[test]
    fn equality_crosses_numeric_types_only() {
        assert_eq!(equals(&Value::Int(3), &Value::Float(3.0)), Some(true));
        assert_eq!(equals(&Value::Bool(true), &Value::Bool(true)), Some(true));
        assert_eq!(equals(&Value::Str("a".into()), &Value::Str("b".into())), Some(false));
        assert_eq!(equals(&Value::Int(1), &Value::Bool(true)), None);
    }

    #[test]
    fn int_written_to_a_float_cell_widens() {
        assert_eq!(coerce(Type::Float, Value::Int(3)), Value::Float(3.0));
        assert_eq!(coerce(Type::Int, Value::Int(3)), Value::Int(3));
        assert_eq!(coerce(Type::Float, Value::Float(1.5)), Value::Float(1.5));
    }
}
