use super::environment::Environment;
use super::gc::{address, boxed, count_bytes, same, shared, GcShared};
use super::port::{InputPort, OutputPort};
use super::printer::stringify;
use super::stdlib::Primitive;
use super::symbol::Symbol;
use super::ExecutionError;
use gc::{Finalize, Gc, GcCell, Trace};
use std::collections::HashSet;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::mem;

/// Scheme values
#[derive(Clone)]
pub enum Value {
    /// The empty list `'()`
    Nil,
    /// A boolean; only `#f` is false
    Boolean(bool),
    /// Every number is a double
    Number(f64),
    /// A character
    Character(char),
    /// An interned symbol
    Symbol(Symbol),
    /// A mutable, fixed-length string
    String(GcShared<Vec<char>>),
    /// A mutable, fixed-length vector
    Vector(GcShared<Vec<Value>>),
    /// A pair (`'(1 . 2)`)
    Pair(GcShared<Pair>),
    /// A natively implemented procedure
    Primitive(Primitive),
    /// A user procedure
    Closure(Gc<Closure>),
    /// A syntax transformer, applied to unevaluated operands
    Macro(Gc<Closure>),
    /// An escape-only continuation
    Continuation(Gc<Continuation>),
    InputPort(GcShared<InputPort>),
    OutputPort(GcShared<OutputPort>),
    /// The end-of-file object
    Eof,
}

pub struct Pair {
    pub first: Value,
    pub rest: Value,
}

impl Finalize for Pair {}
unsafe impl Trace for Pair {
    custom_trace!(this, {
        mark(&this.first);
        mark(&this.rest);
    });
}

/// The shape of a lambda list.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamSpec {
    /// `(a b c)`
    Fixed(Vec<Symbol>),
    /// `(a b . rest)`
    FixedPlusRest(Vec<Symbol>, Symbol),
    /// `args`
    AllRest(Symbol),
}

impl Finalize for ParamSpec {}
unsafe impl Trace for ParamSpec {
    unsafe_empty_trace!();
}

impl ParamSpec {
    pub fn parse(params: &Value) -> Result<ParamSpec, ExecutionError> {
        let mut names = Vec::new();
        let mut tail = params.clone();

        loop {
            tail = match tail {
                Value::Nil => return Ok(ParamSpec::Fixed(names)),
                Value::Symbol(rest) if names.is_empty() => return Ok(ParamSpec::AllRest(rest)),
                Value::Symbol(rest) => return Ok(ParamSpec::FixedPlusRest(names, rest)),
                Value::Pair(ref pair) => {
                    let pair = pair.borrow();
                    names.push(pair.first.sym()?);
                    pair.rest.clone()
                }
                _ => raise!("Bad parameter list: {}", stringify(params, true)),
            }
        }
    }

    /// Whether `argc` arguments fill these parameters exactly.
    pub fn accepts(&self, argc: usize) -> bool {
        match *self {
            ParamSpec::Fixed(ref names) => names.len() == argc,
            ParamSpec::FixedPlusRest(ref names, _) => names.len() <= argc,
            ParamSpec::AllRest(_) => true,
        }
    }
}

pub struct Closure {
    pub params: ParamSpec,
    pub body: Value,
    pub env: GcShared<Environment>,
    name: GcCell<Option<Symbol>>,
}

impl Finalize for Closure {}
unsafe impl Trace for Closure {
    custom_trace!(this, {
        mark(&this.body);
        mark(&this.env);
    });
}

impl Closure {
    /// A body of several forms is wrapped in a `begin`.
    pub fn new(params: ParamSpec, body: Value, env: GcShared<Environment>) -> Closure {
        let body = match body {
            Value::Pair(ref pair) if pair.borrow().rest.is_null() => pair.borrow().first.clone(),
            body => Value::cons(Value::Symbol(super::keywords().begin), body),
        };

        Closure {
            params,
            body,
            env,
            name: GcCell::new(None),
        }
    }

    pub fn name(&self) -> Option<Symbol> {
        *self.name.borrow()
    }

    pub fn name_if_anonymous(&self, name: Symbol) {
        let mut current = self.name.borrow_mut();
        if current.is_none() {
            *current = Some(name);
        }
    }
}

/// The receiving end of an escape. Invoking it stores the value in the slot
/// and unwinds with the token; the `call/cc` frame that created it picks the
/// value up again.
pub struct Continuation {
    pub token: u64,
    slot: GcCell<Value>,
    active: GcCell<bool>,
}

impl Finalize for Continuation {}
unsafe impl Trace for Continuation {
    custom_trace!(this, {
        mark(&this.slot);
    });
}

impl Continuation {
    pub fn new(token: u64) -> Continuation {
        Continuation {
            token,
            slot: GcCell::new(Value::Nil),
            active: GcCell::new(true),
        }
    }

    pub fn throw(&self, value: Value) -> Result<Value, ExecutionError> {
        if !*self.active.borrow() {
            raise!("Continuation invoked after its extent ended: {}", stringify(&value, true));
        }
        *self.slot.borrow_mut() = value;
        Err(ExecutionError::Escape(self.token))
    }

    pub fn take(&self) -> Value {
        mem::replace(&mut *self.slot.borrow_mut(), Value::Nil)
    }

    pub fn deactivate(&self) {
        *self.active.borrow_mut() = false;
    }
}

impl Finalize for Value {}
unsafe impl Trace for Value {
    custom_trace!(this, {
        use self::Value::*;
        match *this {
            String(ref s) => mark(s),
            Vector(ref v) => mark(v),
            Pair(ref pair) => mark(pair),
            Closure(ref closure) | Macro(ref closure) => mark(closure),
            Continuation(ref k) => mark(k),
            InputPort(ref port) => mark(port),
            OutputPort(ref port) => mark(port),
            Nil | Boolean(_) | Number(_) | Character(_) | Symbol(_) | Primitive(_) | Eof => {}
        }
    });
}

// eqv?: numbers and characters by value, everything on the heap by identity
impl PartialEq<Value> for Value {
    fn eq(&self, other: &Value) -> bool {
        use self::Value::*;

        match (self, other) {
            (&Nil, &Nil) | (&Eof, &Eof) => true,
            (&Boolean(x), &Boolean(y)) => x == y,
            (&Number(x), &Number(y)) => x == y,
            (&Character(x), &Character(y)) => x == y,
            (&Symbol(x), &Symbol(y)) => x == y,
            (&String(ref x), &String(ref y)) => same(x, y),
            (&Vector(ref x), &Vector(ref y)) => same(x, y),
            (&Pair(ref x), &Pair(ref y)) => same(x, y),
            (&Closure(ref x), &Closure(ref y)) | (&Macro(ref x), &Macro(ref y)) => same(x, y),
            (&Continuation(ref x), &Continuation(ref y)) => same(x, y),
            (&InputPort(ref x), &InputPort(ref y)) => same(x, y),
            (&OutputPort(ref x), &OutputPort(ref y)) => same(x, y),
            (&Primitive(ref x), &Primitive(ref y)) => x == y,
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(&stringify(self, true))
    }
}

impl<'a> From<&'a Value> for bool {
    fn from(v: &Value) -> bool {
        match *v {
            Value::Boolean(false) => false,
            _ => true,
        }
    }
}

macro_rules! simple_type {
    ($name:ident, $($var:pat_param)|+) => {
        pub fn $name(&self) -> bool {
            match *self {
                $($var)|+ => true,
                _ => false,
            }
        }
    };
}

macro_rules! coercion {
    ($name:ident, $kind:expr, $ty:ty, $var:ident($x:ident) => $out:expr) => {
        pub fn $name(&self) -> Result<$ty, ExecutionError> {
            match *self {
                Value::$var(ref $x) => Ok($out),
                ref other => raise!("expected {}, got: {}", $kind, stringify(other, true)),
            }
        }
    };
}

impl Value {
    pub fn cons(first: Value, rest: Value) -> Value {
        Value::Pair(shared(Pair { first, rest }))
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::list_star(values, Value::Nil)
    }

    /// `(v1 v2 ... . tail)`
    pub fn list_star(values: Vec<Value>, tail: Value) -> Value {
        values
            .into_iter()
            .rev()
            .fold(tail, |rest, first| Value::cons(first, rest))
    }

    pub fn new_string(s: &str) -> Value {
        Value::from_chars(s.chars().collect())
    }

    pub fn from_chars(chars: Vec<char>) -> Value {
        count_bytes(chars.len() * mem::size_of::<char>());
        Value::String(shared(chars))
    }

    pub fn new_vector(values: Vec<Value>) -> Value {
        count_bytes(values.len() * mem::size_of::<Value>());
        Value::Vector(shared(values))
    }

    pub fn closure(closure: Closure) -> Value {
        Value::Closure(boxed(closure))
    }

    pub fn is_true(&self) -> bool {
        self.into()
    }

    simple_type!(is_null, Value::Nil);
    simple_type!(is_pair, Value::Pair(..));
    simple_type!(is_symbol, Value::Symbol(..));
    simple_type!(is_number, Value::Number(..));
    simple_type!(is_boolean, Value::Boolean(..));
    simple_type!(is_char, Value::Character(..));
    simple_type!(is_string, Value::String(..));
    simple_type!(is_vector, Value::Vector(..));
    simple_type!(is_eof, Value::Eof);
    simple_type!(is_input_port, Value::InputPort(..));
    simple_type!(is_output_port, Value::OutputPort(..));
    simple_type!(
        is_procedure,
        Value::Primitive(..) | Value::Closure(..) | Value::Macro(..) | Value::Continuation(..)
    );

    /// `car` that tolerates non-pairs
    pub fn first(&self) -> Value {
        match *self {
            Value::Pair(ref pair) => pair.borrow().first.clone(),
            _ => Value::Nil,
        }
    }

    /// `cdr` that tolerates non-pairs
    pub fn rest(&self) -> Value {
        match *self {
            Value::Pair(ref pair) => pair.borrow().rest.clone(),
            _ => Value::Nil,
        }
    }

    pub fn second(&self) -> Value {
        self.rest().first()
    }

    pub fn third(&self) -> Value {
        self.rest().rest().first()
    }

    /// Iterates over the elements of a list, stopping at the first non-pair.
    pub fn iter(&self) -> ListIter {
        ListIter { next: self.clone() }
    }

    /// The elements of a proper list.
    pub fn to_vec(&self) -> Result<Vec<Value>, ExecutionError> {
        let mut values = Vec::new();
        let mut tail = self.clone();

        loop {
            tail = match tail {
                Value::Nil => return Ok(values),
                Value::Pair(ref pair) => {
                    let pair = pair.borrow();
                    values.push(pair.first.clone());
                    pair.rest.clone()
                }
                _ => raise!("expected a proper list, got: {}", stringify(self, true)),
            }
        }
    }

    /// A proper, finite list. Cycles are caught with Floyd's algorithm.
    pub fn is_list(&self) -> bool {
        let mut slow = self.clone();
        let mut fast = self.clone();

        loop {
            for _ in 0..2 {
                fast = match fast {
                    Value::Nil => return true,
                    Value::Pair(ref pair) => pair.borrow().rest.clone(),
                    _ => return false,
                };
            }
            slow = slow.rest();
            if let (Value::Pair(ref x), Value::Pair(ref y)) = (&slow, &fast) {
                if same(x, y) {
                    return false;
                }
            }
        }
    }

    /// The number of pairs along the spine, or `None` for a cycle.
    pub fn spine_len(&self) -> Option<usize> {
        let mut slow = self.clone();
        let mut fast = self.clone();
        let mut len = 0;

        loop {
            for _ in 0..2 {
                fast = match fast {
                    Value::Pair(ref pair) => pair.borrow().rest.clone(),
                    _ => return Some(len),
                };
                len += 1;
            }
            slow = slow.rest();
            if let (Value::Pair(ref x), Value::Pair(ref y)) = (&slow, &fast) {
                if same(x, y) {
                    return None;
                }
            }
        }
    }

    coercion!(num, "a number", f64, Number(n) => *n);
    coercion!(chr, "a character", char, Character(c) => *c);
    coercion!(sym, "a symbol", Symbol, Symbol(s) => *s);
    coercion!(string, "a string", GcShared<Vec<char>>, String(s) => s.clone());
    coercion!(vector, "a vector", GcShared<Vec<Value>>, Vector(v) => v.clone());
    coercion!(pair, "a pair", GcShared<Pair>, Pair(p) => p.clone());
    coercion!(input_port, "an input port", GcShared<InputPort>, InputPort(p) => p.clone());
    coercion!(output_port, "an output port", GcShared<OutputPort>, OutputPort(p) => p.clone());

    /// A non-negative integer, truncating any fraction.
    pub fn index(&self) -> Result<usize, ExecutionError> {
        let n = self.num()?.trunc();
        if n >= 0.0 && n.is_finite() {
            Ok(n as usize)
        } else {
            raise!("expected a non-negative integer, got: {}", stringify(self, true))
        }
    }

    /// `eq?`: like `eqv?`, but numbers must be the very same bits.
    pub fn is_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (&Value::Number(x), &Value::Number(y)) => x.to_bits() == y.to_bits(),
            _ => self == other,
        }
    }
}

/// `equal?`
pub trait DeepEqual {
    fn equal(&self, other: &Self) -> bool;
}

impl DeepEqual for Value {
    // Pairs of containers already being compared are assumed equal, which
    // makes the comparison terminate on cyclic structure.
    fn equal(&self, other: &Value) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        let mut seen = HashSet::new();

        while let Some((a, b)) = pending.pop() {
            match (&a, &b) {
                (&Value::Pair(ref x), &Value::Pair(ref y)) => {
                    if same(x, y) || !seen.insert((address(x), address(y))) {
                        continue;
                    }
                    let (x, y) = (x.borrow(), y.borrow());
                    pending.push((x.rest.clone(), y.rest.clone()));
                    pending.push((x.first.clone(), y.first.clone()));
                }
                (&Value::Vector(ref x), &Value::Vector(ref y)) => {
                    if same(x, y) || !seen.insert((address(x), address(y))) {
                        continue;
                    }
                    let (x, y) = (x.borrow(), y.borrow());
                    if x.len() != y.len() {
                        return false;
                    }
                    pending.extend(x.iter().cloned().zip(y.iter().cloned()));
                }
                (&Value::String(ref x), &Value::String(ref y)) => {
                    if *x.borrow() != *y.borrow() {
                        return false;
                    }
                }
                _ => {
                    if a != b {
                        return false;
                    }
                }
            }
        }

        true
    }
}

pub struct ListIter {
    next: Value,
}

impl Iterator for ListIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let (first, rest) = match self.next {
            Value::Pair(ref pair) => {
                let pair = pair.borrow();
                (pair.first.clone(), pair.rest.clone())
            }
            _ => return None,
        };
        self.next = rest;
        Some(first)
    }
}
