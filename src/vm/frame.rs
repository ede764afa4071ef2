//! Lexical frames (§4.2, §9 "Lexical-global functions").
//!
//! A frame owns its own variable and function bindings and (except the
//! global frame) holds a reference to its parent. Function calls push a new
//! frame whose parent is always the *global* frame, never the caller's —
//! Amorph has no closures, so a called function only ever sees its own
//! parameters, its own nested bindings, and whatever is defined globally.

use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: Option<String>,
    pub id: Option<String>,
    pub params: Vec<String>,
    pub body: Vec<crate::ast::Node>,
}

#[derive(Default)]
struct FrameData {
    vars: HashMap<String, Value>,
    funcs_by_name: HashMap<String, Rc<FuncDef>>,
    funcs_by_id: HashMap<String, Rc<FuncDef>>,
    parent: Option<Frame>,
}

/// A reference-counted, interior-mutable frame. Cloning a `Frame` shares the
/// same underlying bindings (needed so `set` can mutate an enclosing frame
/// in place rather than a snapshot of it).
#[derive(Clone)]
pub struct Frame(Rc<RefCell<FrameData>>);

impl Frame {
    pub fn global() -> Frame {
        Frame(Rc::new(RefCell::new(FrameData::default())))
    }

    pub fn child_of(parent: &Frame) -> Frame {
        Frame(Rc::new(RefCell::new(FrameData {
            parent: Some(parent.clone()),
            ..Default::default()
        })))
    }

    /// Defines (or shadows) `name` in *this* frame (used by `let` and
    /// function parameter binding).
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.borrow_mut().vars.insert(name.into(), value);
    }

    /// Reads `name`, walking outward through enclosing frames.
    pub fn get(&self, name: &str) -> Option<Value> {
        let data = self.0.borrow();
        if let Some(v) = data.vars.get(name) {
            return Some(v.clone());
        }
        data.parent.as_ref()?.get(name)
    }

    /// Updates `name` in the nearest frame (this one or an ancestor) that
    /// already binds it. Returns `false` if no such frame exists.
    pub fn set(&self, name: &str, value: Value) -> bool {
        if self.0.borrow().vars.contains_key(name) {
            self.0.borrow_mut().vars.insert(name.to_string(), value);
            return true;
        }
        let parent = self.0.borrow().parent.clone();
        match parent {
            Some(p) => p.set(name, value),
            None => false,
        }
    }

    pub fn define_function(&self, def: FuncDef) {
        let def = Rc::new(def);
        let mut data = self.0.borrow_mut();
        if let Some(name) = &def.name {
            data.funcs_by_name.insert(name.clone(), def.clone());
        }
        if let Some(id) = &def.id {
            data.funcs_by_id.insert(id.clone(), def.clone());
        }
    }

    /// Resolves a call target by id first, then by name (§4.2), walking
    /// outward through enclosing frames.
    pub fn resolve_function(&self, id: Option<&str>, name: Option<&str>) -> Option<Rc<FuncDef>> {
        let data = self.0.borrow();
        if let Some(id) = id {
            if let Some(f) = data.funcs_by_id.get(id) {
                return Some(f.clone());
            }
        }
        if let Some(name) = name {
            if let Some(f) = data.funcs_by_name.get(name) {
                return Some(f.clone());
            }
        }
        data.parent.as_ref()?.resolve_function(id, name)
    }
}
