use super::gc::shared;
use super::port::{InputPort, OutputPort};
use super::printer::{number_to_string, stringify};
use super::symbol::Symbol;
use super::value::{DeepEqual, Value};
use super::{ExecutionError, Interpreter};
use crate::helpers::Tuple2Helper;
use crate::lexer::parse_number;
use gc::{Finalize, Trace};
use std::cmp::Ordering;
use std::fmt::{Debug, Formatter, Result as FmtResult};

/// No upper bound on the number of arguments
pub const MANY: usize = usize::MAX;

/// Largest magnitude still considered an exact integer.
const MAX_EXACT: f64 = 102962884861573423.0;

/// Longest string or vector `make-string` and `make-vector` will build.
const MAX_LENGTH: usize = 1 << 26;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Compare {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Compare {
    fn holds<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Compare::Lt => a < b,
            Compare::Le => a <= b,
            Compare::Eq => a == b,
            Compare::Ge => a >= b,
            Compare::Gt => a > b,
        }
    }
}

/// Opcodes of the native procedures. `bool` payloads mark the
/// case-insensitive variants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // Equivalence and types
    Not,
    BooleanQ,
    EqQ,
    EqvQ,
    EqualQ,
    PairQ,
    ListQ,
    NullQ,
    SymbolQ,
    NumberQ,
    IntegerQ,
    InexactQ,
    CharQ,
    StringQ,
    VectorQ,
    ProcedureQ,
    // Pairs and lists
    Car,
    Cdr,
    Cxr,
    Cons,
    SetCar,
    SetCdr,
    List,
    ListStar,
    Length,
    Append,
    Reverse,
    ListTail,
    ListRef,
    Memq,
    Memv,
    Member,
    Assq,
    Assv,
    Assoc,
    // Numbers
    NumCompare(Compare),
    Plus,
    Minus,
    Times,
    Divide,
    Quotient,
    Remainder,
    Modulo,
    Max,
    Min,
    Abs,
    Floor,
    Ceiling,
    Truncate,
    Round,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sqrt,
    Expt,
    Gcd,
    Lcm,
    ZeroQ,
    PositiveQ,
    NegativeQ,
    OddQ,
    EvenQ,
    NumberToString,
    StringToNumber,
    // Characters
    CharCompare(Compare, bool),
    CharAlphabeticQ,
    CharNumericQ,
    CharWhitespaceQ,
    CharUpperCaseQ,
    CharLowerCaseQ,
    CharToInteger,
    IntegerToChar,
    CharUpcase,
    CharDowncase,
    // Strings and symbols
    StringCompare(Compare, bool),
    MakeString,
    String,
    StringLength,
    StringRef,
    StringSet,
    Substring,
    StringAppend,
    StringToList,
    ListToString,
    SymbolToString,
    StringToSymbol,
    // Vectors
    MakeVector,
    Vector,
    VectorLength,
    VectorRef,
    VectorSet,
    VectorToList,
    ListToVector,
    // Control
    Apply,
    Map,
    ForEach,
    CallCc,
    Force,
    Eval,
    MacroExpand,
    Error,
    Exit,
    TimeCall,
    // Input and output
    EofObjectQ,
    InputPortQ,
    OutputPortQ,
    CurrentInputPort,
    CurrentOutputPort,
    OpenInputFile,
    OpenOutputFile,
    CloseInputPort,
    CloseOutputPort,
    CallWithInputFile,
    CallWithOutputFile,
    Read,
    ReadChar,
    PeekChar,
    Write,
    Display,
    Newline,
    Load,
}

/// A natively implemented procedure
#[derive(Clone, Copy, PartialEq)]
pub struct Primitive {
    pub(super) op: Op,
    pub min_args: usize,
    pub max_args: usize,
    pub name: &'static str,
}

impl Debug for Primitive {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "Primitive({}, {:?})", self.name, self.op)
    }
}

impl Finalize for Primitive {}
unsafe impl Trace for Primitive {
    unsafe_empty_trace!();
}

use self::Compare::*;

#[rustfmt::skip]
pub(super) const PRIMITIVES: &[(&str, Op, usize, usize)] = &[
    ("*",                   Op::Times,                   0, MANY),
    ("+",                   Op::Plus,                    0, MANY),
    ("-",                   Op::Minus,                   1, MANY),
    ("/",                   Op::Divide,                  1, MANY),
    ("<",                   Op::NumCompare(Lt),          2, MANY),
    ("<=",                  Op::NumCompare(Le),          2, MANY),
    ("=",                   Op::NumCompare(Eq),          2, MANY),
    (">",                   Op::NumCompare(Gt),          2, MANY),
    (">=",                  Op::NumCompare(Ge),          2, MANY),
    ("_list*",              Op::ListStar,                0, MANY),
    ("abs",                 Op::Abs,                     1, 1),
    ("acos",                Op::Acos,                    1, 1),
    ("append",              Op::Append,                  0, MANY),
    ("apply",               Op::Apply,                   2, MANY),
    ("asin",                Op::Asin,                    1, 1),
    ("assoc",               Op::Assoc,                   2, 2),
    ("assq",                Op::Assq,                    2, 2),
    ("assv",                Op::Assv,                    2, 2),
    ("atan",                Op::Atan,                    1, 2),
    ("boolean?",            Op::BooleanQ,                1, 1),
    ("caaaar",              Op::Cxr,                     1, 1),
    ("caaadr",              Op::Cxr,                     1, 1),
    ("caaar",               Op::Cxr,                     1, 1),
    ("caadar",              Op::Cxr,                     1, 1),
    ("caaddr",              Op::Cxr,                     1, 1),
    ("caadr",               Op::Cxr,                     1, 1),
    ("caar",                Op::Cxr,                     1, 1),
    ("cadaar",              Op::Cxr,                     1, 1),
    ("cadadr",              Op::Cxr,                     1, 1),
    ("cadar",               Op::Cxr,                     1, 1),
    ("caddar",              Op::Cxr,                     1, 1),
    ("cadddr",              Op::Cxr,                     1, 1),
    ("caddr",               Op::Cxr,                     1, 1),
    ("cadr",                Op::Cxr,                     1, 1),
    ("call-with-current-continuation", Op::CallCc,      1, 1),
    ("call-with-input-file", Op::CallWithInputFile,      2, 2),
    ("call-with-output-file", Op::CallWithOutputFile,    2, 2),
    ("car",                 Op::Car,                     1, 1),
    ("cdaaar",              Op::Cxr,                     1, 1),
    ("cdaadr",              Op::Cxr,                     1, 1),
    ("cdaar",               Op::Cxr,                     1, 1),
    ("cdadar",              Op::Cxr,                     1, 1),
    ("cdaddr",              Op::Cxr,                     1, 1),
    ("cdadr",               Op::Cxr,                     1, 1),
    ("cdar",                Op::Cxr,                     1, 1),
    ("cddaar",              Op::Cxr,                     1, 1),
    ("cddadr",              Op::Cxr,                     1, 1),
    ("cddar",               Op::Cxr,                     1, 1),
    ("cdddar",              Op::Cxr,                     1, 1),
    ("cddddr",              Op::Cxr,                     1, 1),
    ("cdddr",               Op::Cxr,                     1, 1),
    ("cddr",                Op::Cxr,                     1, 1),
    ("cdr",                 Op::Cdr,                     1, 1),
    ("ceiling",             Op::Ceiling,                 1, 1),
    ("char->integer",       Op::CharToInteger,           1, 1),
    ("char-alphabetic?",    Op::CharAlphabeticQ,         1, 1),
    ("char-ci<=?",          Op::CharCompare(Le, true),   2, 2),
    ("char-ci<?",           Op::CharCompare(Lt, true),   2, 2),
    ("char-ci=?",           Op::CharCompare(Eq, true),   2, 2),
    ("char-ci>=?",          Op::CharCompare(Ge, true),   2, 2),
    ("char-ci>?",           Op::CharCompare(Gt, true),   2, 2),
    ("char-downcase",       Op::CharDowncase,            1, 1),
    ("char-lower-case?",    Op::CharLowerCaseQ,          1, 1),
    ("char-numeric?",       Op::CharNumericQ,            1, 1),
    ("char-upcase",         Op::CharUpcase,              1, 1),
    ("char-upper-case?",    Op::CharUpperCaseQ,          1, 1),
    ("char-whitespace?",    Op::CharWhitespaceQ,         1, 1),
    ("char<=?",             Op::CharCompare(Le, false),  2, 2),
    ("char<?",              Op::CharCompare(Lt, false),  2, 2),
    ("char=?",              Op::CharCompare(Eq, false),  2, 2),
    ("char>=?",             Op::CharCompare(Ge, false),  2, 2),
    ("char>?",              Op::CharCompare(Gt, false),  2, 2),
    ("char?",               Op::CharQ,                   1, 1),
    ("close-input-port",    Op::CloseInputPort,          1, 1),
    ("close-output-port",   Op::CloseOutputPort,         1, 1),
    ("complex?",            Op::NumberQ,                 1, 1),
    ("cons",                Op::Cons,                    2, 2),
    ("cos",                 Op::Cos,                     1, 1),
    ("current-input-port",  Op::CurrentInputPort,        0, 0),
    ("current-output-port", Op::CurrentOutputPort,       0, 0),
    ("display",             Op::Display,                 1, 2),
    ("eof-object?",         Op::EofObjectQ,              1, 1),
    ("eq?",                 Op::EqQ,                     2, 2),
    ("equal?",              Op::EqualQ,                  2, 2),
    ("eqv?",                Op::EqvQ,                    2, 2),
    ("error",               Op::Error,                   0, MANY),
    ("eval",                Op::Eval,                    1, 2),
    ("even?",               Op::EvenQ,                   1, 1),
    ("exact?",              Op::IntegerQ,                1, 1),
    ("exit",                Op::Exit,                    0, 1),
    ("exp",                 Op::Exp,                     1, 1),
    ("expt",                Op::Expt,                    2, 2),
    ("floor",               Op::Floor,                   1, 1),
    ("for-each",            Op::ForEach,                 1, MANY),
    ("force",               Op::Force,                   1, 1),
    ("gcd",                 Op::Gcd,                     0, MANY),
    ("inexact?",            Op::InexactQ,                1, 1),
    ("input-port?",         Op::InputPortQ,              1, 1),
    ("integer->char",       Op::IntegerToChar,           1, 1),
    ("integer?",            Op::IntegerQ,                1, 1),
    ("lcm",                 Op::Lcm,                     0, MANY),
    ("length",              Op::Length,                  1, 1),
    ("list",                Op::List,                    0, MANY),
    ("list->string",        Op::ListToString,            1, 1),
    ("list->vector",        Op::ListToVector,            1, 1),
    ("list-ref",            Op::ListRef,                 2, 2),
    ("list-tail",           Op::ListTail,                2, 2),
    ("list?",               Op::ListQ,                   1, 1),
    ("load",                Op::Load,                    1, 1),
    ("log",                 Op::Log,                     1, 1),
    ("macro-expand",        Op::MacroExpand,             1, 1),
    ("make-string",         Op::MakeString,              1, 2),
    ("make-vector",         Op::MakeVector,              1, 2),
    ("map",                 Op::Map,                     1, MANY),
    ("max",                 Op::Max,                     1, MANY),
    ("member",              Op::Member,                  2, 2),
    ("memq",                Op::Memq,                    2, 2),
    ("memv",                Op::Memv,                    2, 2),
    ("min",                 Op::Min,                     1, MANY),
    ("modulo",              Op::Modulo,                  2, 2),
    ("negative?",           Op::NegativeQ,               1, 1),
    ("newline",             Op::Newline,                 0, 1),
    ("not",                 Op::Not,                     1, 1),
    ("null?",               Op::NullQ,                   1, 1),
    ("number->string",      Op::NumberToString,          1, 2),
    ("number?",             Op::NumberQ,                 1, 1),
    ("odd?",                Op::OddQ,                    1, 1),
    ("open-input-file",     Op::OpenInputFile,           1, 1),
    ("open-output-file",    Op::OpenOutputFile,          1, 1),
    ("output-port?",        Op::OutputPortQ,             1, 1),
    ("pair?",               Op::PairQ,                   1, 1),
    ("peek-char",           Op::PeekChar,                0, 1),
    ("positive?",           Op::PositiveQ,               1, 1),
    ("procedure?",          Op::ProcedureQ,              1, 1),
    ("quotient",            Op::Quotient,                2, 2),
    ("rational?",           Op::IntegerQ,                1, 1),
    ("read",                Op::Read,                    0, 1),
    ("read-char",           Op::ReadChar,                0, 1),
    ("real?",               Op::NumberQ,                 1, 1),
    ("remainder",           Op::Remainder,               2, 2),
    ("reverse",             Op::Reverse,                 1, 1),
    ("round",               Op::Round,                   1, 1),
    ("set-car!",            Op::SetCar,                  2, 2),
    ("set-cdr!",            Op::SetCdr,                  2, 2),
    ("sin",                 Op::Sin,                     1, 1),
    ("sqrt",                Op::Sqrt,                    1, 1),
    ("string",              Op::String,                  0, MANY),
    ("string->list",        Op::StringToList,            1, 1),
    ("string->number",      Op::StringToNumber,          1, 2),
    ("string->symbol",      Op::StringToSymbol,          1, 1),
    ("string-append",       Op::StringAppend,            0, MANY),
    ("string-ci<=?",        Op::StringCompare(Le, true), 2, 2),
    ("string-ci<?",         Op::StringCompare(Lt, true), 2, 2),
    ("string-ci=?",         Op::StringCompare(Eq, true), 2, 2),
    ("string-ci>=?",        Op::StringCompare(Ge, true), 2, 2),
    ("string-ci>?",         Op::StringCompare(Gt, true), 2, 2),
    ("string-length",       Op::StringLength,            1, 1),
    ("string-ref",          Op::StringRef,               2, 2),
    ("string-set!",         Op::StringSet,               3, 3),
    ("string<=?",           Op::StringCompare(Le, false), 2, 2),
    ("string<?",            Op::StringCompare(Lt, false), 2, 2),
    ("string=?",            Op::StringCompare(Eq, false), 2, 2),
    ("string>=?",           Op::StringCompare(Ge, false), 2, 2),
    ("string>?",            Op::StringCompare(Gt, false), 2, 2),
    ("string?",             Op::StringQ,                 1, 1),
    ("substring",           Op::Substring,               3, 3),
    ("symbol->string",      Op::SymbolToString,          1, 1),
    ("symbol?",             Op::SymbolQ,                 1, 1),
    ("tan",                 Op::Tan,                     1, 1),
    ("time-call",           Op::TimeCall,                1, 2),
    ("truncate",            Op::Truncate,                1, 1),
    ("vector",              Op::Vector,                  0, MANY),
    ("vector->list",        Op::VectorToList,            1, 1),
    ("vector-length",       Op::VectorLength,            1, 1),
    ("vector-ref",          Op::VectorRef,               2, 2),
    ("vector-set!",         Op::VectorSet,               3, 3),
    ("vector?",             Op::VectorQ,                 1, 1),
    ("write",               Op::Write,                   1, 2),
    ("write-char",          Op::Display,                 1, 2),
    ("zero?",               Op::ZeroQ,                   1, 1),
];

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Nil)
}

pub(super) fn call(
    interp: &mut Interpreter,
    primitive: Primitive,
    args: Vec<Value>,
) -> Result<Value, ExecutionError> {
    let argc = args.len();
    if argc < primitive.min_args {
        raise!(
            "too few args, {}, for {}: {}",
            argc,
            primitive.name,
            stringify(&Value::list(args), true)
        );
    }
    if argc > primitive.max_args {
        raise!(
            "too many args, {}, for {}: {}",
            argc,
            primitive.name,
            stringify(&Value::list(args), true)
        );
    }

    let x = arg(&args, 0);
    let y = arg(&args, 1);

    let value = match primitive.op {
        Op::Not => Value::Boolean(!x.is_true()),
        Op::BooleanQ => Value::Boolean(x.is_boolean()),
        Op::EqQ => Value::Boolean(x.is_eq(&y)),
        Op::EqvQ => Value::Boolean(x == y),
        Op::EqualQ => Value::Boolean(x.equal(&y)),
        Op::PairQ => Value::Boolean(x.is_pair()),
        Op::ListQ => Value::Boolean(x.is_list()),
        Op::NullQ => Value::Boolean(x.is_null()),
        Op::SymbolQ => Value::Boolean(x.is_symbol()),
        Op::NumberQ => Value::Boolean(x.is_number()),
        Op::IntegerQ => Value::Boolean(is_exact(&x)),
        Op::InexactQ => Value::Boolean(x.num().map(|_| !is_exact(&x))?),
        Op::CharQ => Value::Boolean(x.is_char()),
        Op::StringQ => Value::Boolean(x.is_string()),
        Op::VectorQ => Value::Boolean(x.is_vector()),
        Op::ProcedureQ => Value::Boolean(x.is_procedure()),

        Op::Car => x.first(),
        Op::Cdr => x.rest(),
        Op::Cxr => cxr(x, primitive.name),
        Op::Cons => Value::cons(x, y),
        Op::SetCar => {
            x.pair()?.borrow_mut().first = y.clone();
            y
        }
        Op::SetCdr => {
            x.pair()?.borrow_mut().rest = y.clone();
            y
        }
        Op::List => Value::list(args),
        Op::ListStar => list_star(args),
        Op::Length => match x.spine_len() {
            Some(n) => Value::Number(n as f64),
            None => raise!("length: circular list"),
        },
        Op::Append => append(args),
        Op::Reverse => x.iter().fold(Value::Nil, |rest, first| Value::cons(first, rest)),
        Op::ListTail => list_tail(x, y.index()?),
        Op::ListRef => list_tail(x, y.index()?).first(),
        Op::Memq => member(&x, &y, |a, b| a.is_eq(b)),
        Op::Memv => member(&x, &y, |a, b| a == b),
        Op::Member => member(&x, &y, |a, b| a.equal(b)),
        Op::Assq => assoc(&x, &y, |a, b| a.is_eq(b)),
        Op::Assv => assoc(&x, &y, |a, b| a == b),
        Op::Assoc => assoc(&x, &y, |a, b| a.equal(b)),

        Op::NumCompare(cmp) => {
            let nums = numbers(&args)?;
            Value::Boolean(nums.windows(2).all(|w| cmp.holds(w[0], w[1])))
        }
        Op::Plus => Value::Number(numbers(&args)?.iter().sum()),
        Op::Times => Value::Number(numbers(&args)?.iter().product()),
        Op::Minus => {
            let nums = numbers(&args)?;
            match nums.split_first() {
                Some((&n, [])) => Value::Number(-n),
                Some((&n, rest)) => Value::Number(rest.iter().fold(n, |acc, m| acc - m)),
                None => Value::Number(0.0),
            }
        }
        Op::Divide => {
            let nums = numbers(&args)?;
            match nums.split_first() {
                Some((&n, [])) => Value::Number(1.0 / n),
                Some((&n, rest)) => Value::Number(rest.iter().fold(n, |acc, m| acc / m)),
                None => Value::Number(1.0),
            }
        }
        Op::Quotient => {
            let (a, b) = divisor_pair(&x, &y)?;
            Value::Number((a / b).trunc())
        }
        Op::Remainder => {
            let (a, b) = divisor_pair(&x, &y)?;
            Value::Number((a as i64).wrapping_rem(b as i64) as f64)
        }
        Op::Modulo => {
            let (a, b) = divisor_pair(&x, &y)?;
            let (a, b) = (a as i64, b as i64);
            let m = a.wrapping_rem(b);
            if m != 0 && (m < 0) != (b < 0) {
                Value::Number((m + b) as f64)
            } else {
                Value::Number(m as f64)
            }
        }
        Op::Max => Value::Number(numbers(&args)?.into_iter().fold(f64::NEG_INFINITY, f64::max)),
        Op::Min => Value::Number(numbers(&args)?.into_iter().fold(f64::INFINITY, f64::min)),
        Op::Abs => Value::Number(x.num()?.abs()),
        Op::Floor => Value::Number(x.num()?.floor()),
        Op::Ceiling => Value::Number(x.num()?.ceil()),
        Op::Truncate => Value::Number(x.num()?.trunc()),
        Op::Round => Value::Number(x.num()?.round_ties_even()),
        Op::Exp => Value::Number(x.num()?.exp()),
        Op::Log => Value::Number(x.num()?.ln()),
        Op::Sin => Value::Number(x.num()?.sin()),
        Op::Cos => Value::Number(x.num()?.cos()),
        Op::Tan => Value::Number(x.num()?.tan()),
        Op::Asin => Value::Number(x.num()?.asin()),
        Op::Acos => Value::Number(x.num()?.acos()),
        Op::Atan if argc == 2 => Value::Number(x.num()?.atan2(y.num()?)),
        Op::Atan => Value::Number(x.num()?.atan()),
        Op::Sqrt => Value::Number(x.num()?.sqrt()),
        Op::Expt => {
            let (base, power) = (x.num(), y.num()).result()?;
            Value::Number(base.powf(power))
        }
        Op::Gcd => Value::Number(integers(&args)?.into_iter().fold(0, gcd) as f64),
        Op::Lcm => Value::Number(integers(&args)?.into_iter().fold(1, lcm) as f64),
        Op::ZeroQ => Value::Boolean(x.num()? == 0.0),
        Op::PositiveQ => Value::Boolean(x.num()? > 0.0),
        Op::NegativeQ => Value::Boolean(x.num()? < 0.0),
        Op::OddQ => Value::Boolean(x.num()?.abs() % 2.0 != 0.0),
        Op::EvenQ => Value::Boolean(x.num()?.abs() % 2.0 == 0.0),
        Op::NumberToString => {
            let radix = if argc > 1 { y.index()? } else { 10 };
            Value::new_string(&format_number(x.num()?, radix)?)
        }
        Op::StringToNumber => {
            let radix = if argc > 1 { y.index()? } else { 10 };
            parse_radix(&text(&x)?, radix).map_or(Value::Boolean(false), Value::Number)
        }

        Op::CharCompare(cmp, fold) => {
            let (a, b) = (x.chr(), y.chr()).result()?;
            if fold {
                Value::Boolean(cmp.holds(lowercase(a), lowercase(b)))
            } else {
                Value::Boolean(cmp.holds(a, b))
            }
        }
        Op::CharAlphabeticQ => Value::Boolean(x.chr()?.is_alphabetic()),
        Op::CharNumericQ => Value::Boolean(x.chr()?.is_numeric()),
        Op::CharWhitespaceQ => Value::Boolean(x.chr()?.is_whitespace()),
        Op::CharUpperCaseQ => Value::Boolean(x.chr()?.is_uppercase()),
        Op::CharLowerCaseQ => Value::Boolean(x.chr()?.is_lowercase()),
        Op::CharToInteger => Value::Number(x.chr()? as u32 as f64),
        Op::IntegerToChar => match u32::try_from(x.index()?).ok().and_then(char::from_u32) {
            Some(c) => Value::Character(c),
            None => raise!("integer->char: no character with code {}", stringify(&x, true)),
        },
        Op::CharUpcase => Value::Character(uppercase(x.chr()?)),
        Op::CharDowncase => Value::Character(lowercase(x.chr()?)),

        Op::StringCompare(cmp, fold) => {
            let (a, b) = (x.string(), y.string()).result()?;
            let (a, b) = (a.borrow(), b.borrow());
            let ordering = if fold {
                a.iter().map(|&c| uppercase(c)).cmp(b.iter().map(|&c| uppercase(c)))
            } else {
                a.iter().cmp(b.iter())
            };
            Value::Boolean(cmp.holds(ordering, Ordering::Equal))
        }
        Op::MakeString => {
            let fill = if argc > 1 { y.chr()? } else { ' ' };
            Value::from_chars(vec![fill; allocation_length(&x, "make-string")?])
        }
        Op::String => Value::from_chars(args.iter().map(Value::chr).collect::<Result<_, _>>()?),
        Op::StringLength => Value::Number(x.string()?.borrow().len() as f64),
        Op::StringRef => {
            let s = x.string()?;
            let s = s.borrow();
            Value::Character(s[checked_index(&y, s.len())?])
        }
        Op::StringSet => {
            let c = arg(&args, 2).chr()?;
            let s = x.string()?;
            let mut s = s.borrow_mut();
            let i = checked_index(&y, s.len())?;
            s[i] = c;
            Value::Character(c)
        }
        Op::Substring => {
            let s = x.string()?;
            let s = s.borrow();
            let (start, end) = (y.index(), arg(&args, 2).index()).result()?;
            if start > end || end > s.len() {
                raise!("substring: bad range {} to {} of {}", start, end, stringify(&x, true));
            }
            Value::from_chars(s[start..end].to_vec())
        }
        Op::StringAppend => {
            let text: String = args.iter().map(|a| stringify(a, false)).collect();
            Value::new_string(&text)
        }
        Op::StringToList => Value::list(
            x.string()?
                .borrow()
                .iter()
                .map(|&c| Value::Character(c))
                .collect(),
        ),
        Op::ListToString => Value::from_chars(
            x.to_vec()?
                .iter()
                .map(Value::chr)
                .collect::<Result<_, _>>()?,
        ),
        Op::SymbolToString => Value::new_string(x.sym()?.as_str()),
        Op::StringToSymbol => {
            Value::Symbol(Symbol::intern(&text(&x)?))
        }

        Op::MakeVector => Value::new_vector(vec![y; allocation_length(&x, "make-vector")?]),
        Op::Vector => Value::new_vector(args),
        Op::VectorLength => Value::Number(x.vector()?.borrow().len() as f64),
        Op::VectorRef => {
            let v = x.vector()?;
            let v = v.borrow();
            v[checked_index(&y, v.len())?].clone()
        }
        Op::VectorSet => {
            let value = arg(&args, 2);
            let v = x.vector()?;
            let mut v = v.borrow_mut();
            let i = checked_index(&y, v.len())?;
            v[i] = value.clone();
            value
        }
        Op::VectorToList => Value::list(x.vector()?.borrow().clone()),
        Op::ListToVector => Value::new_vector(x.to_vec()?),

        Op::Apply => {
            let mut args = args;
            let last = args.pop().unwrap_or(Value::Nil);
            let mut spread = args.split_off(1);
            spread.extend(last.to_vec()?);
            interp.apply(&x, spread)?
        }
        Op::Map => map(interp, &x, args[1..].to_vec(), true)?,
        Op::ForEach => map(interp, &x, args[1..].to_vec(), false)?,
        Op::CallCc => interp.call_cc(&x)?,
        Op::Force => {
            if x.is_procedure() {
                interp.apply(&x, vec![])?
            } else {
                x
            }
        }
        Op::Eval => interp.eval_global(x)?,
        Op::MacroExpand => interp.macro_expand(x)?,
        Op::Error => return super::raise(error_message(&args)),
        Op::Exit => {
            let code = if argc > 0 { x.num()? as i32 } else { 0 };
            return interp.exit(code);
        }
        Op::TimeCall => time_call(interp, &x, if argc > 1 { y.index()? } else { 1 })?,

        Op::EofObjectQ => Value::Boolean(x.is_eof()),
        Op::InputPortQ => Value::Boolean(x.is_input_port()),
        Op::OutputPortQ => Value::Boolean(x.is_output_port()),
        Op::CurrentInputPort => Value::InputPort(interp.input_port()),
        Op::CurrentOutputPort => Value::OutputPort(interp.output_port()),
        Op::OpenInputFile => open_input_file(interp, &x)?,
        Op::OpenOutputFile => open_output_file(interp, &x)?,
        Op::CloseInputPort => {
            x.input_port()?.borrow_mut().close();
            Value::Boolean(true)
        }
        Op::CloseOutputPort => {
            x.output_port()?.borrow_mut().close();
            Value::Boolean(true)
        }
        Op::CallWithInputFile => {
            let port = open_input_file(interp, &x)?;
            let result = interp.apply(&y, vec![port.clone()]);
            port.input_port()?.borrow_mut().close();
            result?
        }
        Op::CallWithOutputFile => {
            let port = open_output_file(interp, &x)?;
            let result = interp.apply(&y, vec![port.clone()]);
            port.output_port()?.borrow_mut().close();
            result?
        }
        Op::Read => input(interp, &args, 0)?.borrow_mut().read()?,
        Op::ReadChar => input(interp, &args, 0)?.borrow_mut().read_char()?,
        Op::PeekChar => input(interp, &args, 0)?.borrow_mut().peek_char()?,
        Op::Write => {
            output(interp, &args, 1)?.borrow_mut().write_str(&stringify(&x, true))?;
            x
        }
        Op::Display => {
            output(interp, &args, 1)?.borrow_mut().write_str(&stringify(&x, false))?;
            x
        }
        Op::Newline => {
            output(interp, &args, 0)?.borrow_mut().write_str("\n")?;
            Value::Boolean(true)
        }
        Op::Load => interp.load(&text(&x)?)?,
    };

    Ok(value)
}

fn is_exact(x: &Value) -> bool {
    match *x {
        Value::Number(n) => n == n.round() && n.abs() < MAX_EXACT,
        _ => false,
    }
}

fn numbers(args: &[Value]) -> Result<Vec<f64>, ExecutionError> {
    args.iter().map(Value::num).collect()
}

fn integers(args: &[Value]) -> Result<Vec<i64>, ExecutionError> {
    args.iter().map(|a| a.num().map(|n| n as i64)).collect()
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.wrapping_abs(), b.wrapping_abs());
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        return 0;
    }
    (a / gcd(a, b)).wrapping_mul(b).wrapping_abs()
}

/// Both operands of an integer division, refusing a zero divisor.
fn divisor_pair(x: &Value, y: &Value) -> Result<(f64, f64), ExecutionError> {
    let (a, b) = (x.num(), y.num()).result()?;
    if b.trunc() == 0.0 {
        raise!("Division by zero: {} by {}", number_to_string(a), number_to_string(b));
    }
    Ok((a, b))
}

fn allocation_length(length: &Value, name: &str) -> Result<usize, ExecutionError> {
    let n = length.index()?;
    if n > MAX_LENGTH {
        raise!("{}: length too large: {}", name, stringify(length, true));
    }
    Ok(n)
}

fn checked_index(index: &Value, len: usize) -> Result<usize, ExecutionError> {
    let i = index.index()?;
    if i >= len {
        raise!("Index {} out of range for length {}", i, len);
    }
    Ok(i)
}

fn lowercase(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn uppercase(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

fn format_number(n: f64, radix: usize) -> Result<String, ExecutionError> {
    if radix == 10 {
        return Ok(number_to_string(n));
    }
    if !(2..=36).contains(&radix) || n != n.trunc() || !n.is_finite() {
        raise!("number->string: can't print {} in base {}", number_to_string(n), radix);
    }

    let mut digits = Vec::new();
    let mut rest = (n as i64).unsigned_abs();
    loop {
        digits.push(std::char::from_digit((rest % radix as u64) as u32, radix as u32).unwrap_or('?'));
        rest /= radix as u64;
        if rest == 0 {
            break;
        }
    }
    if n < 0.0 {
        digits.push('-');
    }
    Ok(digits.into_iter().rev().collect())
}

fn parse_radix(text: &str, radix: usize) -> Option<f64> {
    match radix {
        10 => parse_number(text),
        2..=36 => i64::from_str_radix(text, radix as u32).ok().map(|n| n as f64),
        _ => None,
    }
}

/// `c[ad]+r`: the letters are applied right to left.
fn cxr(x: Value, name: &str) -> Value {
    name[1..name.len() - 1]
        .chars()
        .rev()
        .fold(x, |x, op| if op == 'a' { x.first() } else { x.rest() })
}

fn list_star(mut args: Vec<Value>) -> Value {
    match args.pop() {
        Some(tail) => Value::list_star(args, tail),
        None => Value::Nil,
    }
}

fn list_tail(mut list: Value, k: usize) -> Value {
    for _ in 0..k {
        list = list.rest();
    }
    list
}

/// Copies every list but the last, which is shared.
fn append(mut args: Vec<Value>) -> Value {
    let mut result = match args.pop() {
        Some(last) => last,
        None => return Value::Nil,
    };

    for list in args.into_iter().rev() {
        result = Value::list_star(list.iter().collect(), result);
    }
    result
}

fn member(x: &Value, list: &Value, test: fn(&Value, &Value) -> bool) -> Value {
    let mut tail = list.clone();
    while tail.is_pair() {
        if test(x, &tail.first()) {
            return tail;
        }
        tail = tail.rest();
    }
    Value::Boolean(false)
}

fn assoc(x: &Value, list: &Value, test: fn(&Value, &Value) -> bool) -> Value {
    list.iter()
        .find(|entry| test(x, &entry.first()))
        .unwrap_or(Value::Boolean(false))
}

/// `map` and `for-each` over any number of lists, up to the shortest one.
fn map(
    interp: &mut Interpreter,
    f: &Value,
    mut lists: Vec<Value>,
    collect: bool,
) -> Result<Value, ExecutionError> {
    let mut results = Vec::new();

    while !lists.is_empty() && lists.iter().all(Value::is_pair) {
        let args = lists.iter().map(Value::first).collect();
        for list in lists.iter_mut() {
            *list = list.rest();
        }

        let value = interp.apply(f, args)?;
        if collect {
            results.push(value);
        }
    }

    Ok(Value::list(results))
}

fn error_message(args: &[Value]) -> String {
    if args.is_empty() {
        return "error".to_owned();
    }

    args.iter()
        .enumerate()
        .map(|(i, a)| stringify(a, !(i == 0 && a.is_string())))
        .collect::<Vec<_>>()
        .join(" ")
}

fn time_call(interp: &mut Interpreter, thunk: &Value, times: usize) -> Result<Value, ExecutionError> {
    ::gc::force_collect();
    let start_bytes = interp.host().bytes_allocated();
    let start = interp.host().elapsed();

    let mut result = Value::Boolean(false);
    for _ in 0..times {
        result = interp.apply(thunk, vec![])?;
    }

    let msec = interp.host().elapsed().saturating_sub(start).as_millis() as f64;
    let bytes = interp.host().bytes_allocated().saturating_sub(start_bytes) as f64;
    let stat = |n: f64, unit: &str| Value::list(vec![Value::Number(n), Value::new_string(unit)]);

    Ok(Value::list(vec![
        result,
        Value::list(vec![stat(msec, "msec"), stat(bytes, "bytes")]),
    ]))
}

/// The contents of a string argument.
fn text(x: &Value) -> Result<String, ExecutionError> {
    Ok(x.string()?.borrow().iter().collect())
}

fn open_input_file(interp: &mut Interpreter, name: &Value) -> Result<Value, ExecutionError> {
    let path = text(name)?;
    match interp.host().open_input(&path) {
        Ok(source) => Ok(Value::InputPort(shared(InputPort::new(source)))),
        Err(e) => raise!("can't open {} for reading: {}", path, e),
    }
}

fn open_output_file(interp: &mut Interpreter, name: &Value) -> Result<Value, ExecutionError> {
    let path = text(name)?;
    match interp.host().open_output(&path) {
        Ok(sink) => Ok(Value::OutputPort(shared(OutputPort::new(sink)))),
        Err(e) => raise!("can't open {} for writing: {}", path, e),
    }
}

/// The port given as argument `i`, or the current one.
fn input(
    interp: &Interpreter,
    args: &[Value],
    i: usize,
) -> Result<super::GcShared<InputPort>, ExecutionError> {
    match args.get(i) {
        Some(port) => port.input_port(),
        None => Ok(interp.input_port()),
    }
}

fn output(
    interp: &Interpreter,
    args: &[Value],
    i: usize,
) -> Result<super::GcShared<OutputPort>, ExecutionError> {
    match args.get(i) {
        Some(port) => port.output_port(),
        None => Ok(interp.output_port()),
    }
}
