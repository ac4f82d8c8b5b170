//! Runtime environments: a chain of binding frames

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::value::Value;

pub type Env = Rc<Frame>;

pub struct Frame {
    bindings: RefCell<BTreeMap<String, Value>>,
    parent: Option<Env>,
    /// Function frames (and the global frame) receive `var` declarations
    function_level: bool,
}

impl Frame {
    pub fn global() -> Env {
        Rc::new(Frame {
            bindings: RefCell::new(BTreeMap::new()),
            parent: None,
            function_level: true,
        })
    }

    pub fn function(parent: &Env) -> Env {
        Rc::new(Frame {
            bindings: RefCell::new(BTreeMap::new()),
            parent: Some(Rc::clone(parent)),
            function_level: true,
        })
    }

    pub fn block(parent: &Env) -> Env {
        Rc::new(Frame {
            bindings: RefCell::new(BTreeMap::new()),
            parent: Some(Rc::clone(parent)),
            function_level: false,
        })
    }

    /// Bind in this frame, shadowing outer bindings
    pub fn declare(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    /// Bind in the nearest function frame
    pub fn declare_var(self: &Rc<Self>, name: &str, value: Value) {
        let mut frame = Rc::clone(self);
        while !frame.function_level {
            match &frame.parent {
                Some(parent) => frame = Rc::clone(parent),
                None => break,
            }
        }
        frame.declare(name, value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.lookup(name))
    }

    /// Overwrite an existing binding; false when the name is unbound
    pub fn assign(&self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.bindings.borrow_mut().get_mut(name) {
            *slot = value;
            return true;
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => false,
        }
    }
}
