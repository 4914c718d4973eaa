use gc::{Finalize, Trace};
use lasso::{Spur, ThreadedRodeo};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::sync::OnceLock;

static INTERNER: OnceLock<ThreadedRodeo> = OnceLock::new();
static KEYWORDS: OnceLock<Keywords> = OnceLock::new();

fn interner() -> &'static ThreadedRodeo {
    INTERNER.get_or_init(ThreadedRodeo::new)
}

/// An interned symbol. Two symbols are `eq?` exactly when their names are
/// equal, so comparisons never look at the text.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(Spur);

impl Symbol {
    pub fn intern(name: &str) -> Symbol {
        Symbol(interner().get_or_intern(name))
    }

    pub fn as_str(&self) -> &'static str {
        interner().resolve(&self.0)
    }
}

impl Finalize for Symbol {}
unsafe impl Trace for Symbol {
    unsafe_empty_trace!();
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "Symbol({})", self.as_str())
    }
}

/// Special form heads recognized by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecialForm {
    Quote,
    Begin,
    Define,
    Set,
    If,
    Cond,
    Lambda,
    Macro,
}

/// Symbols the evaluator, the reader and the printer compare against.
pub struct Keywords {
    pub quote: Symbol,
    pub quasiquote: Symbol,
    pub unquote: Symbol,
    pub unquote_splicing: Symbol,
    pub begin: Symbol,
    pub define: Symbol,
    pub set: Symbol,
    pub if_: Symbol,
    pub cond: Symbol,
    pub lambda: Symbol,
    pub macro_: Symbol,
    pub else_: Symbol,
    pub arrow: Symbol,
}

impl Keywords {
    pub fn special_form(&self, symbol: Symbol) -> Option<SpecialForm> {
        let form = if symbol == self.quote {
            SpecialForm::Quote
        } else if symbol == self.begin {
            SpecialForm::Begin
        } else if symbol == self.define {
            SpecialForm::Define
        } else if symbol == self.set {
            SpecialForm::Set
        } else if symbol == self.if_ {
            SpecialForm::If
        } else if symbol == self.cond {
            SpecialForm::Cond
        } else if symbol == self.lambda {
            SpecialForm::Lambda
        } else if symbol == self.macro_ {
            SpecialForm::Macro
        } else {
            return None;
        };
        Some(form)
    }

    /// The reader abbreviation for a quoting symbol, if it has one.
    pub fn abbreviation(&self, symbol: Symbol) -> Option<&'static str> {
        if symbol == self.quote {
            Some("'")
        } else if symbol == self.quasiquote {
            Some("`")
        } else if symbol == self.unquote {
            Some(",")
        } else if symbol == self.unquote_splicing {
            Some(",@")
        } else {
            None
        }
    }
}

pub fn keywords() -> &'static Keywords {
    KEYWORDS.get_or_init(|| Keywords {
        quote: Symbol::intern("quote"),
        quasiquote: Symbol::intern("quasiquote"),
        unquote: Symbol::intern("unquote"),
        unquote_splicing: Symbol::intern("unquote-splicing"),
        begin: Symbol::intern("begin"),
        define: Symbol::intern("define"),
        set: Symbol::intern("set!"),
        if_: Symbol::intern("if"),
        cond: Symbol::intern("cond"),
        lambda: Symbol::intern("lambda"),
        macro_: Symbol::intern("macro"),
        else_: Symbol::intern("else"),
        arrow: Symbol::intern("=>"),
    })
}
