use gc::{Finalize, Trace};
use std::collections::HashMap;
use std::fmt::{Debug, Error as FmtError, Formatter};

use super::gc::{shared, GcShared};
use super::printer::stringify;
use super::symbol::Symbol;
use super::value::{ParamSpec, Value};
use super::ExecutionError;

/// A frame of bindings. Lookups that miss continue in the parent.
pub struct Environment {
    pub(super) parent: Option<GcShared<Environment>>,
    pub(super) bindings: HashMap<Symbol, Value>,
}

impl Default for Environment {
    fn default() -> Environment {
        Environment {
            parent: None,
            bindings: HashMap::new(),
        }
    }
}

impl Debug for Environment {
    fn fmt(&self, fmt: &mut Formatter) -> Result<(), FmtError> {
        fmt.debug_struct("Environment")
            .field("parent", &self.parent)
            .field("bindings", &self.bindings.keys())
            .finish()
    }
}

impl Finalize for Environment {}
unsafe impl Trace for Environment {
    custom_trace!(this, {
        if let Some(ref env) = this.parent {
            mark(env);
        }
        for v in this.bindings.values() {
            mark(v);
        }
    });
}

impl Environment {
    /// A frame binding `params` to `args` on top of `parent`.
    ///
    /// Mismatched argument counts are only warned about: missing parameters
    /// are bound to the empty list and extra arguments are dropped.
    pub fn extend(
        params: &ParamSpec,
        args: Vec<Value>,
        parent: GcShared<Environment>,
    ) -> GcShared<Environment> {
        if !params.accepts(args.len()) {
            warn!(
                "Wrong number of arguments: expected {} got {}",
                describe(params),
                stringify(&Value::list(args.clone()), true)
            );
        }

        let mut bindings = HashMap::new();
        let mut args = args.into_iter();

        match *params {
            ParamSpec::Fixed(ref names) => {
                for &name in names {
                    bindings.insert(name, args.next().unwrap_or(Value::Nil));
                }
            }
            ParamSpec::FixedPlusRest(ref names, rest) => {
                for &name in names {
                    bindings.insert(name, args.next().unwrap_or(Value::Nil));
                }
                bindings.insert(rest, Value::list(args.collect()));
            }
            ParamSpec::AllRest(rest) => {
                bindings.insert(rest, Value::list(args.collect()));
            }
        }

        shared(Environment {
            parent: Some(parent),
            bindings,
        })
    }

    pub fn lookup(&self, name: Symbol) -> Result<Value, ExecutionError> {
        ret_some!(self.bindings.get(&name).cloned());

        let mut next = self.parent.clone();
        while let Some(env) = next {
            let frame = env.borrow();
            ret_some!(frame.bindings.get(&name).cloned());
            next = frame.parent.clone();
        }

        raise!("Unbound variable: {}", name)
    }

    /// Binds `name` in this very frame, naming anonymous procedures after it.
    pub fn define(&mut self, name: Symbol, value: Value) {
        match value {
            Value::Closure(ref closure) | Value::Macro(ref closure) => {
                closure.name_if_anonymous(name)
            }
            _ => {}
        }
        self.bindings.insert(name, value);
    }

    /// Mutates the nearest binding of `name`.
    pub fn set(
        env: &GcShared<Environment>,
        name: Symbol,
        value: Value,
    ) -> Result<Value, ExecutionError> {
        let mut env = env.clone();

        loop {
            env = {
                let mut frame = env.borrow_mut();
                if let Some(slot) = frame.bindings.get_mut(&name) {
                    *slot = value.clone();
                    return Ok(value);
                }
                match frame.parent.clone() {
                    Some(parent) => parent,
                    None => raise!("Unbound variable: {}", name),
                }
            }
        }
    }
}

fn describe(params: &ParamSpec) -> String {
    let names = |names: &[Symbol]| {
        names
            .iter()
            .map(|n| n.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    };

    match *params {
        ParamSpec::Fixed(ref fixed) => format!("({})", names(fixed)),
        ParamSpec::FixedPlusRest(ref fixed, rest) => format!("({} . {})", names(fixed), rest),
        ParamSpec::AllRest(rest) => rest.to_string(),
    }
}
