//! Tree-walking evaluator for macro bodies.
//!
//! [`Interp`] owns the global table and the output sink and lives as long as the host.
//! Every host call runs on a short-lived [`Exec`], which carries the reader stream (if
//! any), the call depth and the current source position for error messages.
//!
//! ## Error Handling
//!
//! Runtime errors are `MacroError::Invocation` with a `chunk:line: message` text, the way
//! the scripting language reports them. Call depth is bounded by `max_depth`; exceeding it
//! raises `stack overflow`.

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::atoms::external::OutputSink;
use crate::atoms::register_all_atoms;
use crate::runtime::ast::{BinOp, Block, Expr, Field, FuncBody, Stat, UnOp};
use crate::runtime::value::{Capability, Closure, Key, Table, TableRef, Value};
use crate::runtime::ReaderStream;
use crate::{err_msg, MacroError};

// ============================================================================
// SCOPES
// ============================================================================

/// One lexical level. Every `local` statement opens a new level so closures keep
/// seeing the variable they captured even if the name is declared again later.
#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Rc<RefCell<Value>>>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn root() -> Rc<Scope> {
        Rc::new(Scope::default())
    }

    pub fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn declare(&self, name: &str, value: Value) {
        self.vars
            .borrow_mut()
            .insert(name.to_string(), Rc::new(RefCell::new(value)));
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<RefCell<Value>>> {
        if let Some(cell) = self.vars.borrow().get(name) {
            return Some(Rc::clone(cell));
        }
        self.parent.as_ref()?.lookup(name)
    }
}

/// Per-call state that is not lexically scoped.
struct Frame {
    varargs: Vec<Value>,
}

enum Flow {
    Normal,
    Break,
    Return(Vec<Value>),
}

// ============================================================================
// INTERPRETER
// ============================================================================

pub struct Interp {
    globals: TableRef,
    output: Rc<RefCell<dyn OutputSink>>,
    max_depth: usize,
}

impl Interp {
    pub fn new(output: Rc<RefCell<dyn OutputSink>>, max_depth: usize) -> Self {
        let mut globals = Table::default();
        register_all_atoms(&mut globals);
        Self {
            globals: Rc::new(RefCell::new(globals)),
            output,
            max_depth,
        }
    }

    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    /// Wraps a compiled chunk into a callable closure over a fresh top-level scope.
    pub fn load(&self, chunk: Rc<FuncBody>) -> Value {
        Value::Function(Rc::new(Closure {
            body: chunk,
            env: Scope::root(),
        }))
    }

    /// Calls `callable`, giving it `stream` for the reader capabilities.
    pub fn call<'a>(
        &'a self,
        callable: &Value,
        args: Vec<Value>,
        stream: Option<&'a mut dyn ReaderStream>,
    ) -> Result<Vec<Value>, MacroError> {
        let mut exec = Exec {
            interp: self,
            stream,
            depth: 0,
            chunk: Rc::from("?"),
            line: 0,
        };
        exec.call(callable, args)
    }
}

/// One activation of the evaluator.
pub struct Exec<'a> {
    interp: &'a Interp,
    stream: Option<&'a mut dyn ReaderStream>,
    depth: usize,
    chunk: Rc<str>,
    line: usize,
}

impl<'a> Exec<'a> {
    /// A runtime error at the current position.
    pub fn error(&self, message: impl std::fmt::Display) -> MacroError {
        err_msg!(Invocation, "{}:{}: {}", self.chunk, self.line, message)
    }

    pub fn output(&self) -> RefMut<'_, dyn OutputSink> {
        self.interp.output.borrow_mut()
    }

    pub fn globals(&self) -> &TableRef {
        &self.interp.globals
    }

    pub fn call(&mut self, callable: &Value, args: Vec<Value>) -> Result<Vec<Value>, MacroError> {
        match callable {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Native(native) => (native.func)(self, args),
            Value::Capability(cap) => self.call_capability(*cap, args),
            other => Err(self.error(format!("attempt to call a {} value", other.type_name()))),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, mut args: Vec<Value>) -> Result<Vec<Value>, MacroError> {
        if self.depth >= self.interp.max_depth {
            return Err(self.error("stack overflow"));
        }
        let body = &closure.body;
        let nparams = body.params.len();
        let varargs = if body.vararg && args.len() > nparams {
            args.split_off(nparams)
        } else {
            Vec::new()
        };
        let scope = Scope::child(&closure.env);
        let mut args = args.into_iter();
        for param in &body.params {
            scope.declare(param, args.next().unwrap_or_default());
        }
        let frame = Frame { varargs };

        let saved_chunk = std::mem::replace(&mut self.chunk, Rc::clone(&body.chunk));
        let saved_line = self.line;
        self.depth += 1;
        let result = self.exec_block(&body.body, &scope, &frame);
        self.depth -= 1;
        self.chunk = saved_chunk;
        self.line = saved_line;

        match result? {
            Flow::Return(values) => Ok(values),
            Flow::Normal | Flow::Break => Ok(Vec::new()),
        }
    }

    fn call_capability(&mut self, cap: Capability, args: Vec<Value>) -> Result<Vec<Value>, MacroError> {
        if self.stream.is_none() {
            return Err(self.error("reader capability used outside its reader macro"));
        }
        let delimiter = match (cap, args.first()) {
            (Capability::Word, Some(Value::Str(s))) => s.chars().next(),
            (Capability::Word, Some(Value::Nil) | None) => None,
            (Capability::Word, Some(other)) => {
                return Err(self.error(format!(
                    "bad argument #1 to 'word' (string expected, got {})",
                    other.type_name()
                )))
            }
            _ => None,
        };
        let Some(stream) = self.stream.as_deref_mut() else {
            return Ok(vec![Value::Nil]);
        };
        let value = match cap {
            Capability::Advance => Value::str(&stream.advance()?.to_string()),
            Capability::Peek => match stream.peek() {
                Some(c) => Value::str(&c.to_string()),
                None => Value::Nil,
            },
            Capability::Word => match stream.word(delimiter)? {
                Some(word) => Value::str(&word),
                None => Value::Nil,
            },
        };
        Ok(vec![value])
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_block(&mut self, block: &Block, scope: &Rc<Scope>, frame: &Frame) -> Result<Flow, MacroError> {
        self.exec_stats(block, scope, frame).map(|(flow, _)| flow)
    }

    /// Runs `block` and also hands back its innermost scope (`repeat ... until` needs it).
    fn exec_stats(
        &mut self,
        block: &Block,
        scope: &Rc<Scope>,
        frame: &Frame,
    ) -> Result<(Flow, Rc<Scope>), MacroError> {
        let mut scope = Rc::clone(scope);
        for (stat, line) in &block.stats {
            self.line = *line;
            match stat {
                Stat::Local(names, exprs) => {
                    let mut values = self.eval_list(exprs, &scope, frame)?.into_iter();
                    let next = Scope::child(&scope);
                    for name in names {
                        next.declare(name, values.next().unwrap_or_default());
                    }
                    scope = next;
                }
                Stat::LocalFunction(name, body) => {
                    let next = Scope::child(&scope);
                    next.declare(name, Value::Nil);
                    let function = Value::Function(Rc::new(Closure {
                        body: Rc::clone(body),
                        env: Rc::clone(&next),
                    }));
                    if let Some(cell) = next.lookup(name) {
                        *cell.borrow_mut() = function;
                    }
                    scope = next;
                }
                Stat::Assign(targets, exprs) => {
                    let mut values = self.eval_list(exprs, &scope, frame)?.into_iter();
                    for target in targets {
                        let value = values.next().unwrap_or_default();
                        self.assign(target, value, &scope, frame)?;
                    }
                }
                Stat::Call(expr) => {
                    self.eval_multi(expr, &scope, frame)?;
                }
                Stat::Do(body) => match self.exec_block(body, &scope, frame)? {
                    Flow::Normal => {}
                    flow => return Ok((flow, scope)),
                },
                Stat::While(cond, body) => {
                    while self.eval(cond, &scope, frame)?.truthy() {
                        match self.exec_block(body, &scope, frame)? {
                            Flow::Normal => {}
                            Flow::Break => break,
                            flow => return Ok((flow, scope)),
                        }
                    }
                }
                Stat::Repeat(body, cond) => loop {
                    let (flow, inner) = self.exec_stats(body, &scope, frame)?;
                    match flow {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow => return Ok((flow, scope)),
                    }
                    if self.eval(cond, &inner, frame)?.truthy() {
                        break;
                    }
                },
                Stat::If(arms, otherwise) => {
                    let mut chosen = otherwise.as_ref();
                    for (cond, body) in arms {
                        if self.eval(cond, &scope, frame)?.truthy() {
                            chosen = Some(body);
                            break;
                        }
                    }
                    if let Some(body) = chosen {
                        match self.exec_block(body, &scope, frame)? {
                            Flow::Normal => {}
                            flow => return Ok((flow, scope)),
                        }
                    }
                }
                Stat::NumericFor {
                    var,
                    start,
                    limit,
                    step,
                    body,
                } => {
                    if let Flow::Return(values) =
                        self.numeric_for(var, start, limit, step.as_ref(), body, &scope, frame)?
                    {
                        return Ok((Flow::Return(values), scope));
                    }
                }
                Stat::GenericFor { names, exprs, body } => {
                    if let Flow::Return(values) = self.generic_for(names, exprs, body, &scope, frame)? {
                        return Ok((Flow::Return(values), scope));
                    }
                }
                Stat::Return(exprs) => {
                    let values = self.eval_list(exprs, &scope, frame)?;
                    return Ok((Flow::Return(values), scope));
                }
                Stat::Break => return Ok((Flow::Break, scope)),
            }
        }
        Ok((Flow::Normal, scope))
    }

    #[allow(clippy::too_many_arguments)]
    fn numeric_for(
        &mut self,
        var: &str,
        start: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        body: &Block,
        scope: &Rc<Scope>,
        frame: &Frame,
    ) -> Result<Flow, MacroError> {
        let start = self.for_number(start, "initial", scope, frame)?;
        let limit = self.for_number(limit, "limit", scope, frame)?;
        let step = match step {
            Some(expr) => self.for_number(expr, "step", scope, frame)?,
            None => Value::Int(1),
        };
        match (start, limit, step) {
            (Value::Int(start), Value::Int(limit), Value::Int(step)) => {
                if step == 0 {
                    return Err(self.error("'for' step is zero"));
                }
                let mut i = start;
                while (step > 0 && i <= limit) || (step < 0 && i >= limit) {
                    let iteration = Scope::child(scope);
                    iteration.declare(var, Value::Int(i));
                    match self.exec_block(body, &iteration, frame)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow => return Ok(flow),
                    }
                    let Some(next) = i.checked_add(step) else {
                        break;
                    };
                    i = next;
                }
            }
            (start, limit, step) => {
                let (start, limit, step) = (
                    start.to_float().unwrap_or(0.0),
                    limit.to_float().unwrap_or(0.0),
                    step.to_float().unwrap_or(0.0),
                );
                if step == 0.0 {
                    return Err(self.error("'for' step is zero"));
                }
                let mut i = start;
                while (step > 0.0 && i <= limit) || (step < 0.0 && i >= limit) {
                    let iteration = Scope::child(scope);
                    iteration.declare(var, Value::Float(i));
                    match self.exec_block(body, &iteration, frame)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow => return Ok(flow),
                    }
                    i += step;
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn for_number(&mut self, expr: &Expr, what: &str, scope: &Rc<Scope>, frame: &Frame) -> Result<Value, MacroError> {
        let value = self.eval(expr, scope, frame)?;
        match value {
            Value::Int(_) | Value::Float(_) => Ok(value),
            _ => Err(self.error(format!("'for' {} value must be a number", what))),
        }
    }

    fn generic_for(
        &mut self,
        names: &[String],
        exprs: &[Expr],
        body: &Block,
        scope: &Rc<Scope>,
        frame: &Frame,
    ) -> Result<Flow, MacroError> {
        let mut init = self.eval_list(exprs, scope, frame)?.into_iter();
        let iterator = init.next().unwrap_or_default();
        let state = init.next().unwrap_or_default();
        let mut control = init.next().unwrap_or_default();
        loop {
            let line = self.line;
            let results = self.call(&iterator, vec![state.clone(), control.clone()])?;
            self.line = line;
            let first = results.first().cloned().unwrap_or_default();
            if first.is_nil() {
                break;
            }
            control = first;
            let iteration = Scope::child(scope);
            let mut results = results.into_iter();
            for name in names {
                iteration.declare(name, results.next().unwrap_or_default());
            }
            match self.exec_block(body, &iteration, frame)? {
                Flow::Normal => {}
                Flow::Break => break,
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Expr, value: Value, scope: &Rc<Scope>, frame: &Frame) -> Result<(), MacroError> {
        match target {
            Expr::Name(name) => {
                match scope.lookup(name) {
                    Some(cell) => *cell.borrow_mut() = value,
                    None => self.interp.globals.borrow_mut().set_str(name, value),
                }
                Ok(())
            }
            Expr::Index(object, key) => {
                let table = self.eval(object, scope, frame)?;
                let key = self.eval(key, scope, frame)?;
                let Value::Table(table) = table else {
                    return Err(self.error(format!(
                        "attempt to index a {} value{}",
                        table.type_name(),
                        describe(object, scope)
                    )));
                };
                let key = Key::from_value(&key).map_err(|reason| self.error(reason))?;
                table.borrow_mut().set(key, value);
                Ok(())
            }
            _ => Err(self.error("cannot assign to this expression")),
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// Evaluates a list; only the last expression contributes more than one value.
    fn eval_list(&mut self, exprs: &[Expr], scope: &Rc<Scope>, frame: &Frame) -> Result<Vec<Value>, MacroError> {
        let mut values = Vec::with_capacity(exprs.len());
        for (i, expr) in exprs.iter().enumerate() {
            if i + 1 == exprs.len() && expr.is_multi() {
                values.extend(self.eval_multi(expr, scope, frame)?);
            } else {
                values.push(self.eval(expr, scope, frame)?);
            }
        }
        Ok(values)
    }

    fn eval_multi(&mut self, expr: &Expr, scope: &Rc<Scope>, frame: &Frame) -> Result<Vec<Value>, MacroError> {
        match expr {
            Expr::Call(function, args) => {
                let callee = self.eval(function, scope, frame)?;
                let args = self.eval_list(args, scope, frame)?;
                if !is_callable(&callee) {
                    return Err(self.error(format!(
                        "attempt to call a {} value{}",
                        callee.type_name(),
                        describe(function, scope)
                    )));
                }
                let line = self.line;
                let result = self.call(&callee, args);
                self.line = line;
                result
            }
            Expr::Method(object, name, args) => {
                let receiver = self.eval(object, scope, frame)?;
                let method = self.index(&receiver, &Value::str(name), object, scope)?;
                if !is_callable(&method) {
                    return Err(self.error(format!(
                        "attempt to call a {} value (method '{}')",
                        method.type_name(),
                        name
                    )));
                }
                let mut call_args = vec![receiver];
                call_args.extend(self.eval_list(args, scope, frame)?);
                let line = self.line;
                let result = self.call(&method, call_args);
                self.line = line;
                result
            }
            Expr::Vararg => Ok(frame.varargs.clone()),
            other => Ok(vec![self.eval(other, scope, frame)?]),
        }
    }

    fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>, frame: &Frame) -> Result<Value, MacroError> {
        let value = match expr {
            Expr::Nil => Value::Nil,
            Expr::True => Value::Bool(true),
            Expr::False => Value::Bool(false),
            Expr::Int(i) => Value::Int(*i),
            Expr::Float(f) => Value::Float(*f),
            Expr::Str(s) => Value::Str(Rc::clone(s)),
            Expr::Call(..) | Expr::Method(..) | Expr::Vararg => {
                self.eval_multi(expr, scope, frame)?.into_iter().next().unwrap_or_default()
            }
            Expr::Paren(inner) => self.eval(inner, scope, frame)?,
            Expr::Function(body) => Value::Function(Rc::new(Closure {
                body: Rc::clone(body),
                env: Rc::clone(scope),
            })),
            Expr::Name(name) => match scope.lookup(name) {
                Some(cell) => cell.borrow().clone(),
                None => self.interp.globals.borrow().get_str(name),
            },
            Expr::Index(object, key) => {
                let base = self.eval(object, scope, frame)?;
                let key = self.eval(key, scope, frame)?;
                self.index(&base, &key, object, scope)?
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left, scope, frame)?;
                let right = self.eval(right, scope, frame)?;
                self.binary(*op, &left, &right)?
            }
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, scope, frame)?;
                self.unary(*op, &value)?
            }
            Expr::And(left, right) => {
                let left = self.eval(left, scope, frame)?;
                if left.truthy() {
                    self.eval(right, scope, frame)?
                } else {
                    left
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left, scope, frame)?;
                if left.truthy() {
                    left
                } else {
                    self.eval(right, scope, frame)?
                }
            }
            Expr::Table(fields) => self.table(fields, scope, frame)?,
        };
        Ok(value)
    }

    fn table(&mut self, fields: &[Field], scope: &Rc<Scope>, frame: &Frame) -> Result<Value, MacroError> {
        let mut table = Table::default();
        let mut next_index = 1;
        for (i, field) in fields.iter().enumerate() {
            match field {
                Field::Positional(expr) if i + 1 == fields.len() && expr.is_multi() => {
                    for value in self.eval_multi(expr, scope, frame)? {
                        table.set(Key::Int(next_index), value);
                        next_index += 1;
                    }
                }
                Field::Positional(expr) => {
                    let value = self.eval(expr, scope, frame)?;
                    table.set(Key::Int(next_index), value);
                    next_index += 1;
                }
                Field::Keyed(key, value) => {
                    let key = self.eval(key, scope, frame)?;
                    let key = Key::from_value(&key).map_err(|reason| self.error(reason))?;
                    let value = self.eval(value, scope, frame)?;
                    table.set(key, value);
                }
            }
        }
        Ok(Value::Table(Rc::new(RefCell::new(table))))
    }

    /// `base[key]`; strings index the `string` library table.
    fn index(&self, base: &Value, key: &Value, origin: &Expr, scope: &Rc<Scope>) -> Result<Value, MacroError> {
        match base {
            Value::Table(table) => Ok(match Key::from_value(key) {
                Ok(key) => table.borrow().get(&key),
                Err(_) => Value::Nil,
            }),
            Value::Str(_) => match self.interp.globals.borrow().get_str("string") {
                Value::Table(lib) => Ok(match Key::from_value(key) {
                    Ok(key) => lib.borrow().get(&key),
                    Err(_) => Value::Nil,
                }),
                _ => Ok(Value::Nil),
            },
            other => Err(self.error(format!(
                "attempt to index a {} value{}",
                other.type_name(),
                describe(origin, scope)
            ))),
        }
    }

    pub fn binary(&self, op: BinOp, left: &Value, right: &Value) -> Result<Value, MacroError> {
        match op {
            BinOp::Eq => Ok(Value::Bool(left.raw_eq(right))),
            BinOp::Ne => Ok(Value::Bool(!left.raw_eq(right))),
            BinOp::Lt => self.less(left, right, false).map(Value::Bool),
            BinOp::Le => self.less(left, right, true).map(Value::Bool),
            BinOp::Gt => self.less(right, left, false).map(Value::Bool),
            BinOp::Ge => self.less(right, left, true).map(Value::Bool),
            BinOp::Concat => match (left.to_text(), right.to_text()) {
                (Some(a), Some(b)) => Ok(Value::str(&format!("{}{}", a, b))),
                (None, _) => Err(self.error(format!("attempt to concatenate a {} value", left.type_name()))),
                (_, None) => Err(self.error(format!("attempt to concatenate a {} value", right.type_name()))),
            },
            _ => self.arith(op, left, right),
        }
    }

    fn less(&self, left: &Value, right: &Value, or_equal: bool) -> Result<bool, MacroError> {
        match (left, right) {
            (Value::Int(a), Value::Int(b)) => Ok(if or_equal { a <= b } else { a < b }),
            (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
                let (a, b) = (left.to_float().unwrap_or(f64::NAN), right.to_float().unwrap_or(f64::NAN));
                Ok(if or_equal { a <= b } else { a < b })
            }
            (Value::Str(a), Value::Str(b)) => Ok(if or_equal { a <= b } else { a < b }),
            _ if left.type_name() == right.type_name() => Err(self.error(format!(
                "attempt to compare two {} values",
                left.type_name()
            ))),
            _ => Err(self.error(format!(
                "attempt to compare {} with {}",
                left.type_name(),
                right.type_name()
            ))),
        }
    }

    fn arith(&self, op: BinOp, left: &Value, right: &Value) -> Result<Value, MacroError> {
        let (Some(a), Some(b)) = (left.to_number(), right.to_number()) else {
            let bad = if left.to_number().is_none() { left } else { right };
            return Err(self.error(format!(
                "attempt to perform arithmetic on a {} value",
                bad.type_name()
            )));
        };
        if let (Value::Int(x), Value::Int(y)) = (&a, &b) {
            let (x, y) = (*x, *y);
            match op {
                BinOp::Add => return Ok(Value::Int(x.wrapping_add(y))),
                BinOp::Sub => return Ok(Value::Int(x.wrapping_sub(y))),
                BinOp::Mul => return Ok(Value::Int(x.wrapping_mul(y))),
                BinOp::IDiv => {
                    if y == 0 {
                        return Err(self.error("attempt to perform 'n//0'"));
                    }
                    let q = x.wrapping_div(y);
                    let adjust = x.wrapping_rem(y) != 0 && ((x < 0) != (y < 0));
                    return Ok(Value::Int(if adjust { q - 1 } else { q }));
                }
                BinOp::Mod => {
                    if y == 0 {
                        return Err(self.error("attempt to perform 'n%%0'"));
                    }
                    let r = x.wrapping_rem(y);
                    return Ok(Value::Int(if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r }));
                }
                _ => {}
            }
        }
        let x = a.to_float().unwrap_or(f64::NAN);
        let y = b.to_float().unwrap_or(f64::NAN);
        let result = match op {
            BinOp::Add => x + y,
            BinOp::Sub => x - y,
            BinOp::Mul => x * y,
            BinOp::Div => x / y,
            BinOp::IDiv => (x / y).floor(),
            BinOp::Mod => {
                let r = x % y;
                if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                    r + y
                } else {
                    r
                }
            }
            BinOp::Pow => x.powf(y),
            _ => return Err(self.error("unsupported arithmetic operator")),
        };
        Ok(Value::Float(result))
    }

    fn unary(&self, op: UnOp, value: &Value) -> Result<Value, MacroError> {
        match op {
            UnOp::Not => Ok(Value::Bool(!value.truthy())),
            UnOp::Neg => match value.to_number() {
                Some(Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
                Some(Value::Float(f)) => Ok(Value::Float(-f)),
                _ => Err(self.error(format!(
                    "attempt to perform arithmetic on a {} value",
                    value.type_name()
                ))),
            },
            UnOp::Len => match value {
                Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::Table(t) => Ok(Value::Int(t.borrow().len())),
                other => Err(self.error(format!("attempt to get length of a {} value", other.type_name()))),
            },
        }
    }
}

fn is_callable(value: &Value) -> bool {
    matches!(value, Value::Function(_) | Value::Native(_) | Value::Capability(_))
}

/// Names the variable an erroring expression came from, for messages.
fn describe(expr: &Expr, scope: &Rc<Scope>) -> String {
    match expr {
        Expr::Name(name) if scope.lookup(name).is_some() => format!(" (local '{}')", name),
        Expr::Name(name) => format!(" (global '{}')", name),
        Expr::Index(_, key) => match key.as_ref() {
            Expr::Str(field) => format!(" (field '{}')", field),
            _ => String::new(),
        },
        Expr::Method(_, name, _) => format!(" (method '{}')", name),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::external::BufferSink;
    use crate::runtime::parser::Parser;
    use crate::syntax::tokenize_plain;

    fn run(src: &str) -> Result<Vec<Value>, MacroError> {
        let sink = Rc::new(RefCell::new(BufferSink::default()));
        let interp = Interp::new(sink, 50);
        let chunk = Parser::new("t", tokenize_plain("t", src)?).parse_chunk()?;
        let main = interp.load(chunk);
        interp.call(&main, Vec::new(), None)
    }

    fn first(src: &str) -> String {
        run(src).unwrap().into_iter().next().unwrap_or_default().to_string()
    }

    #[test]
    fn arithmetic_keeps_integer_and_float_apart() {
        assert_eq!(first("return 7 // 2"), "3");
        assert_eq!(first("return -7 // 2"), "-4");
        assert_eq!(first("return 7 / 2"), "3.5");
        assert_eq!(first("return -7 % 3"), "2");
        assert_eq!(first("return 2 ^ 10"), "1024.0");
        assert_eq!(first("return '10' + 1"), "11");
    }

    #[test]
    fn closures_share_upvalues() {
        let src = "
            local function counter()
                local n = 0
                return function() n = n + 1 return n end
            end
            local c = counter()
            c() c()
            return c()
        ";
        assert_eq!(first(src), "3");
    }

    #[test]
    fn shadowing_local_does_not_rebind_captures() {
        let src = "local x = 1 local f = function() return x end local x = 2 return f() + x";
        assert_eq!(first(src), "3");
    }

    #[test]
    fn loops_and_varargs() {
        let src = "
            local function sum(...)
                local total = 0
                for _, v in ipairs({...}) do total = total + v end
                return total, select('#', ...)
            end
            local acc = {}
            for i = 10, 1, -3 do acc[#acc + 1] = i end
            local n = 0
            repeat local done = n >= 2 n = n + 1 until done
            return sum(1, 2, 3), table.concat(acc, ','), n
        ";
        let values = run(src).unwrap();
        // `sum` is not last in the list, so only its first value survives.
        assert_eq!(values.len(), 3);
        assert_eq!(values[0].to_string(), "6");
        assert_eq!(values[1].to_string(), "10,7,4,1");
        assert_eq!(values[2].to_string(), "3");
    }

    #[test]
    fn runtime_errors_carry_position() {
        let err = run("local t = nil\nreturn t.x").unwrap_err();
        assert_eq!(err.to_string(), "t:2: attempt to index a nil value (local 't')");
        let err = run("local function f() return f() end return f()").unwrap_err();
        assert!(err.to_string().contains("stack overflow"));
        let err = run("return 1 < 'x'").unwrap_err();
        assert!(err.to_string().contains("attempt to compare number with string"));
    }

    #[test]
    fn capabilities_need_a_stream() {
        let err = run("return nil").map(|_| ());
        assert!(err.is_ok());
        let sink = Rc::new(RefCell::new(BufferSink::default()));
        let interp = Interp::new(sink, 10);
        let err = interp
            .call(&Value::Capability(Capability::Peek), Vec::new(), None)
            .unwrap_err();
        assert!(err.to_string().contains("outside its reader macro"));
    }
}
