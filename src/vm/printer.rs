//! External representations of values.
use super::gc::address;
use super::symbol::keywords;
use super::value::Value;
use std::collections::HashSet;
use std::fmt::Write;

/// Renders `value`. In quoted mode (`write`) strings and characters are
/// printed so that the reader gives them back; otherwise (`display`) they are
/// printed raw.
///
/// Containers already being printed are shown as `...`, so cyclic structure
/// prints in finite space.
pub fn stringify(value: &Value, quoted: bool) -> String {
    let mut printer = Printer {
        out: String::new(),
        quoted,
        open: HashSet::new(),
    };
    printer.print(value);
    printer.out
}

struct Printer {
    out: String,
    quoted: bool,
    open: HashSet<usize>,
}

impl Printer {
    fn print(&mut self, value: &Value) {
        match *value {
            Value::Nil => self.out.push_str("()"),
            Value::Boolean(b) => self.out.push_str(if b { "#t" } else { "#f" }),
            Value::Number(n) => self.out.push_str(&number_to_string(n)),
            Value::Character(c) if self.quoted => {
                self.out.push_str("#\\");
                match c {
                    ' ' => self.out.push_str("space"),
                    '\n' => self.out.push_str("newline"),
                    c => self.out.push(c),
                }
            }
            Value::Character(c) => self.out.push(c),
            Value::Symbol(s) => self.out.push_str(s.as_str()),
            Value::String(ref s) if self.quoted => {
                self.out.push('"');
                for &c in s.borrow().iter() {
                    if c == '"' || c == '\\' {
                        self.out.push('\\');
                    }
                    self.out.push(c);
                }
                self.out.push('"');
            }
            Value::String(ref s) => self.out.extend(s.borrow().iter()),
            Value::Vector(ref v) => {
                let key = address(v);
                if !self.open.insert(key) {
                    return self.out.push_str("...");
                }
                self.out.push_str("#(");
                for (i, x) in v.borrow().iter().enumerate() {
                    if i > 0 {
                        self.out.push(' ');
                    }
                    self.print(x);
                }
                self.out.push(')');
                self.open.remove(&key);
            }
            Value::Pair(_) => self.print_pair(value),
            Value::Primitive(ref p) => {
                let _ = write!(self.out, "{{{}}}", p.name);
            }
            Value::Closure(ref c) | Value::Macro(ref c) => match c.name() {
                Some(name) => {
                    let _ = write!(self.out, "{{{}}}", name);
                }
                None => self.out.push_str("{anonymous procedure}"),
            },
            Value::Continuation(_) => self.out.push_str("{continuation}"),
            Value::InputPort(_) => self.out.push_str("#<input-port>"),
            Value::OutputPort(_) => self.out.push_str("#<output-port>"),
            Value::Eof => self.out.push_str("#!eof"),
        }
    }

    fn print_pair(&mut self, list: &Value) {
        let kw = keywords();

        // (quote x) and friends print in their abbreviated form
        if let (&Value::Pair(ref pair), Value::Symbol(head), Value::Pair(_)) =
            (list, list.first(), list.rest())
        {
            if list.rest().rest().is_null() {
                if let Some(prefix) = kw.abbreviation(head) {
                    let key = address(pair);
                    if !self.open.insert(key) {
                        return self.out.push_str("...");
                    }
                    self.out.push_str(prefix);
                    self.print(&list.second());
                    self.open.remove(&key);
                    return;
                }
            }
        }

        let mut spine = Vec::new();
        let mut tail = list.clone();
        self.out.push('(');

        while let Value::Pair(ref pair) = tail.clone() {
            let key = address(pair);
            if !self.open.insert(key) {
                self.out.push_str(if spine.is_empty() { "..." } else { " ..." });
                tail = Value::Nil;
                break;
            }
            spine.push(key);
            if spine.len() > 1 {
                self.out.push(' ');
            }
            let first = pair.borrow().first.clone();
            self.print(&first);
            tail = pair.borrow().rest.clone();
        }

        if !tail.is_null() {
            self.out.push_str(" . ");
            self.print(&tail);
        }
        self.out.push(')');

        for key in spine {
            self.open.remove(&key);
        }
    }
}

/// Whole numbers print without a fraction.
pub fn number_to_string(n: f64) -> String {
    if n.is_finite() && n == n.trunc() && n.abs() < 9.2e18 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
