//! The tree-walking evaluator (§4.2): executes a [`Program`] against a
//! capability profile, producing a result value, side effects through an
//! [`IoBackend`], and optional structured trace events.

pub mod frame;
pub mod io;
pub mod trace;

use crate::ast::{Node, Path, Program};
use crate::registry::{registry, Evaluator};
use crate::runtime_error::{excerpt, RichContext, RuntimeError, RuntimeErrorKind};
use crate::value::Value;
use frame::{Frame, FuncDef};
use io::{Capabilities, IoBackend};
use std::rc::Rc;
use trace::{record, TraceKind, TraceSink};

const DEFAULT_RECURSION_LIMIT: usize = 2000;

/// How a statement (or statement-like form) finished: either it produced a
/// value and control falls through to the next statement, or it's
/// `return`ing out of the enclosing function invocation (§4.2 state
/// machine: `Active → returned | fell-through | failed`).
enum Signal {
    Value(Value),
    Return(Value),
}

pub struct Vm<'a> {
    io: &'a mut dyn IoBackend,
    caps: Capabilities,
    trace: Option<&'a mut dyn TraceSink>,
    rich_errors: bool,
    recursion_limit: usize,
    next_call_id: u64,
    call_stack: Vec<String>,
    depth: usize,
    global: Frame,
}

impl<'a> Vm<'a> {
    pub fn new(io: &'a mut dyn IoBackend, caps: Capabilities, trace: Option<&'a mut dyn TraceSink>) -> Self {
        Vm {
            io,
            caps,
            trace,
            rich_errors: false,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            next_call_id: 0,
            call_stack: Vec::new(),
            depth: 0,
            global: Frame::global(),
        }
    }

    pub fn with_rich_errors(mut self, enabled: bool) -> Self {
        self.rich_errors = enabled;
        self
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Runs a whole program: hoists top-level `def`s into the global frame
    /// (forward references are permitted, §4.2), then executes the
    /// top-level sequence. Returns the last statement's value.
    pub fn run(&mut self, program: &Program) -> Result<Value, RuntimeError> {
        for stmt in &program.statements {
            if let Some(("def", payload)) = stmt.discriminator() {
                self.global.define_function(parse_func_def(stmt, payload)?);
            }
        }
        let global = self.global.clone();
        match self.exec_block(&program.statements, &global, &Path::root())? {
            Signal::Value(v) => Ok(v),
            Signal::Return(_) => Err(self.error(RuntimeErrorKind::ReturnOutsideFn, &Node::Null, &Path::root())),
        }
    }

    fn error(&self, kind: RuntimeErrorKind, node: &Node, path: &Path) -> RuntimeError {
        let err = RuntimeError::new(kind);
        if self.rich_errors {
            err.with_context(RichContext {
                path: path.clone(),
                call_stack: self.call_stack.clone(),
                excerpt: excerpt(node),
            })
        } else {
            err
        }
    }

    fn exec_block(&mut self, stmts: &[Node], frame: &Frame, path: &Path) -> Result<Signal, RuntimeError> {
        let mut last = Value::Null;
        for (i, stmt) in stmts.iter().enumerate() {
            let stmt_path = path.index(i);
            match self.exec_stmt(stmt, frame, &stmt_path)? {
                Signal::Return(v) => return Ok(Signal::Return(v)),
                Signal::Value(v) => last = v,
            }
        }
        Ok(Signal::Value(last))
    }

    fn exec_stmt(&mut self, stmt: &Node, frame: &Frame, path: &Path) -> Result<Signal, RuntimeError> {
        let Some((key, payload)) = stmt.discriminator() else {
            return Err(self.error(
                RuntimeErrorKind::TypeRuntime { message: "malformed statement node".into() },
                stmt,
                path,
            ));
        };
        let payload_path = path.field(key);
        match key {
            "let" => {
                let name = field_str(payload, "name", stmt, path, self)?;
                let value_node = payload.field("value").ok_or_else(|| {
                    self.error(RuntimeErrorKind::TypeRuntime { message: "'let' missing 'value'".into() }, stmt, path)
                })?;
                let value = self.eval_expr(value_node, frame, &payload_path.field("value"))?;
                frame.define(name, value.clone());
                Ok(Signal::Value(value))
            }
            "set" => {
                let name = field_str(payload, "name", stmt, path, self)?;
                let value_node = payload.field("value").ok_or_else(|| {
                    self.error(RuntimeErrorKind::TypeRuntime { message: "'set' missing 'value'".into() }, stmt, path)
                })?;
                let value = self.eval_expr(value_node, frame, &payload_path.field("value"))?;
                if !frame.set(name, value.clone()) {
                    return Err(self.error(RuntimeErrorKind::UndefinedVar { name: name.to_string() }, stmt, path));
                }
                Ok(Signal::Value(value))
            }
            "def" => {
                frame.define_function(parse_func_def(stmt, payload)?);
                Ok(Signal::Value(Value::Null))
            }
            "if" => {
                let cond_node = payload.field("cond").ok_or_else(|| {
                    self.error(RuntimeErrorKind::TypeRuntime { message: "'if' missing 'cond'".into() }, stmt, path)
                })?;
                let cond = self.eval_expr(cond_node, frame, &payload_path.field("cond"))?;
                let branch_key = if cond.truthy() { "then" } else { "else" };
                let branch = payload.field(branch_key).and_then(Node::as_list).unwrap_or(&[]);
                let branch_frame = Frame::child_of(frame);
                self.exec_block(branch, &branch_frame, &payload_path.field(branch_key))
            }
            "return" => {
                let value = self.eval_expr(payload, frame, &payload_path)?;
                Ok(Signal::Return(value))
            }
            "print" => {
                if self.caps.deny_print {
                    return Err(self.error(RuntimeErrorKind::CapDenied { capability: "print" }, stmt, path));
                }
                let items = payload.as_list().ok_or_else(|| {
                    self.error(RuntimeErrorKind::TypeRuntime { message: "'print' requires a list of arguments".into() }, stmt, path)
                })?;
                let mut values = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    let item_path = payload_path.index(i);
                    if let Some(("spread", spread_expr)) = item.discriminator() {
                        let spread_value = self.eval_expr(spread_expr, frame, &item_path.field("spread"))?;
                        match spread_value {
                            Value::List(elems) => values.extend(elems),
                            other => values.push(other),
                        }
                    } else {
                        values.push(self.eval_expr(item, frame, &item_path)?);
                    }
                }
                let text: Vec<String> = values.iter().map(ToString::to_string).collect();
                let line = format!("{}\n", text.join(" "));
                self.io.write_stdout(&line)?;
                self.trace_effect(&payload_path, "stdout");
                Ok(Signal::Value(Value::Null))
            }
            "expr" => {
                let value = self.eval_expr(payload, frame, &payload_path)?;
                Ok(Signal::Value(value))
            }
            other => Err(self.error(
                RuntimeErrorKind::TypeRuntime { message: format!("'{other}' is not a statement form") },
                stmt,
                path,
            )),
        }
    }

    fn eval_expr(&mut self, node: &Node, frame: &Frame, path: &Path) -> Result<Value, RuntimeError> {
        match node {
            Node::Int(i) => Ok(Value::Int(*i)),
            Node::Float(f) => Ok(Value::Float(*f)),
            Node::Bool(b) => Ok(Value::Bool(*b)),
            Node::Str(s) => Ok(Value::Str(s.clone())),
            Node::Null => Ok(Value::Null),
            Node::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(self.eval_expr(item, frame, &path.index(i))?);
                }
                Ok(Value::List(out))
            }
            Node::Map(_) => {
                let Some((key, payload)) = node.discriminator() else {
                    return Err(self.error(
                        RuntimeErrorKind::TypeRuntime { message: "malformed expression node".into() },
                        node,
                        path,
                    ));
                };
                self.eval_structured(key, payload, node, frame, path)
            }
        }
    }

    fn eval_structured(&mut self, key: &str, payload: &Node, node: &Node, frame: &Frame, path: &Path) -> Result<Value, RuntimeError> {
        let payload_path = path.field(key);
        match key {
            "var" => {
                let name = payload.as_str().ok_or_else(|| {
                    self.error(RuntimeErrorKind::TypeRuntime { message: "'var' requires a string name".into() }, node, path)
                })?;
                frame
                    .get(name)
                    .ok_or_else(|| self.error(RuntimeErrorKind::UndefinedVar { name: name.to_string() }, node, path))
            }
            "call" => self.eval_call(payload, node, frame, path, &payload_path),
            "and" => self.eval_and_or(payload, frame, &payload_path, true),
            "or" => self.eval_and_or(payload, frame, &payload_path, false),
            op if op == "input" => self.eval_input(payload, node, frame, path, &payload_path),
            op => self.eval_operator(op, payload, node, frame, path, &payload_path),
        }
    }

    fn eval_and_or(&mut self, payload: &Node, frame: &Frame, payload_path: &Path, is_and: bool) -> Result<Value, RuntimeError> {
        let operands = payload.as_list().unwrap_or(&[]);
        let mut last = true;
        for (i, operand) in operands.iter().enumerate() {
            let value = self.eval_expr(operand, frame, &payload_path.index(i))?;
            last = value.truthy();
            if is_and && !last {
                return Ok(Value::Bool(false));
            }
            if !is_and && last {
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(last))
    }

    fn eval_input(&mut self, payload: &Node, node: &Node, frame: &Frame, path: &Path, payload_path: &Path) -> Result<Value, RuntimeError> {
        if self.caps.deny_input {
            return Err(self.error(RuntimeErrorKind::CapDenied { capability: "input" }, node, path));
        }
        let args = payload.as_list().unwrap_or(&[]);
        let prompt = match args.first() {
            Some(expr) => match self.eval_expr(expr, frame, &payload_path.index(0))? {
                Value::Str(s) => Some(s),
                other => return Err(self.error(
                    RuntimeErrorKind::TypeRuntime { message: format!("'input' prompt must be a Str, got {}", other.type_name()) },
                    node,
                    path,
                )),
            },
            None => None,
        };
        let line = self.io.read_line(prompt.as_deref())?;
        self.trace_effect(path, "stdin");
        Ok(Value::Str(line))
    }

    fn eval_operator(&mut self, op: &str, payload: &Node, node: &Node, frame: &Frame, path: &Path, payload_path: &Path) -> Result<Value, RuntimeError> {
        let operands = payload.as_list().unwrap_or(std::slice::from_ref(payload));
        let mut args = Vec::with_capacity(operands.len());
        for (i, operand) in operands.iter().enumerate() {
            args.push(self.eval_expr(operand, frame, &payload_path.index(i))?);
        }
        let spec = registry().lookup(op).ok_or_else(|| {
            self.error(RuntimeErrorKind::TypeRuntime { message: format!("unknown operator '{op}'") }, node, path)
        })?;
        if !spec.arity.accepts(args.len()) {
            return Err(self.error(
                RuntimeErrorKind::ArgCount { expected: spec.arity.describe(), actual: args.len() },
                node,
                path,
            ));
        }
        self.trace_eval(path, op);
        match spec.eval {
            Evaluator::Pure(f) => f(&args),
            Evaluator::ShortCircuit | Evaluator::Effectful => unreachable!("handled before generic dispatch"),
        }
        .map_err(|e| self.attach_context(e, node, path))
    }

    fn eval_call(&mut self, payload: &Node, node: &Node, frame: &Frame, path: &Path, payload_path: &Path) -> Result<Value, RuntimeError> {
        let id = payload.field("id").and_then(Node::as_str);
        let name = payload.field("name").and_then(Node::as_str);
        let arg_nodes = payload.field("args").and_then(Node::as_list).unwrap_or(&[]);
        let args_path = payload_path.field("args");
        let mut args = Vec::with_capacity(arg_nodes.len());
        for (i, arg) in arg_nodes.iter().enumerate() {
            args.push(self.eval_expr(arg, frame, &args_path.index(i))?);
        }
        let func = frame.resolve_function(id, name).ok_or_else(|| {
            let reference = id.or(name).unwrap_or("<unknown>").to_string();
            self.error(RuntimeErrorKind::UnknownFunc { reference }, node, path)
        })?;
        if func.params.len() != args.len() {
            return Err(self.error(
                RuntimeErrorKind::ArgCount { expected: format!("exactly {}", func.params.len()), actual: args.len() },
                node,
                path,
            ));
        }
        self.call_function(func, args, path)
    }

    /// Invokes a resolved function: a fresh frame whose parent is the
    /// *global* frame (§9 "Lexical-global functions"), never the caller's.
    fn call_function(&mut self, func: Rc<FuncDef>, args: Vec<Value>, path: &Path) -> Result<Value, RuntimeError> {
        self.depth += 1;
        if self.depth > self.recursion_limit {
            self.depth -= 1;
            return Err(self.error(RuntimeErrorKind::Recursion { depth: self.depth }, &Node::Null, path));
        }
        let call_id = self.next_call_id;
        self.next_call_id += 1;
        let label = func.name.clone().or_else(|| func.id.clone()).unwrap_or_else(|| "<anonymous>".to_string());
        self.call_stack.push(label.clone());
        self.trace(call_id, TraceKind::Enter, path.clone(), Some(label.clone()), None);

        let call_frame = Frame::child_of(&self.global);
        for (param, value) in func.params.iter().zip(args) {
            call_frame.define(param.clone(), value);
        }
        let result = self.exec_block(&func.body, &call_frame, path);

        self.trace(call_id, TraceKind::Exit, path.clone(), Some(label), None);
        self.call_stack.pop();
        self.depth -= 1;

        match result? {
            Signal::Return(v) => Ok(v),
            Signal::Value(_) => Ok(Value::Null),
        }
    }

    fn trace(&mut self, call_id: u64, kind: TraceKind, path: Path, op: Option<String>, channel: Option<&'static str>) {
        if let Some(sink) = self.trace.as_deref_mut() {
            record(sink, call_id, kind, path.to_string(), op, channel);
        }
    }

    fn trace_eval(&mut self, path: &Path, op: &str) {
        let call_id = self.next_call_id;
        self.trace(call_id, TraceKind::Eval, path.clone(), Some(op.to_string()), None);
    }

    fn trace_effect(&mut self, path: &Path, channel: &'static str) {
        let call_id = self.next_call_id;
        self.trace(call_id, TraceKind::Effect, path.clone(), None, Some(channel));
    }

    fn attach_context(&self, err: RuntimeError, node: &Node, path: &Path) -> RuntimeError {
        if err.context.is_some() || !self.rich_errors {
            return err;
        }
        err.with_context(RichContext {
            path: path.clone(),
            call_stack: self.call_stack.clone(),
            excerpt: excerpt(node),
        })
    }
}

fn field_str<'n>(payload: &'n Node, name: &str, stmt: &Node, path: &Path, vm: &Vm<'_>) -> Result<&'n str, RuntimeError> {
    payload
        .field(name)
        .and_then(Node::as_str)
        .ok_or_else(|| vm.error(RuntimeErrorKind::TypeRuntime { message: format!("missing or non-string '{name}'") }, stmt, path))
}

fn parse_func_def(stmt: &Node, payload: &Node) -> Result<FuncDef, RuntimeError> {
    let name = payload.field("name").and_then(Node::as_str).map(str::to_string);
    let id = stmt.id().map(str::to_string);
    let params = payload
        .field("params")
        .and_then(Node::as_list)
        .map(|items| items.iter().filter_map(Node::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let body = payload.field("body").and_then(Node::as_list).map(<[Node]>::to_vec).unwrap_or_default();
    Ok(FuncDef { name, id, params, body })
}
