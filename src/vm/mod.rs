//! The evaluator and everything it needs at run time.
use ::gc::Gc;
use fallible_iterator::FallibleIterator;
use thiserror::Error;

use self::gc::{boxed, shared};
use crate::reader::{Datums, Reader};

pub use self::environment::Environment;
pub use self::gc::{bytes_allocated, GcShared};
pub use self::host::{Host, StdHost};
pub use self::port::{InputPort, OutputPort};
pub use self::printer::{number_to_string, stringify};
pub use self::stdlib::Primitive;
pub use self::symbol::{keywords, Keywords, SpecialForm, Symbol};
pub use self::value::{Closure, Continuation, DeepEqual, ListIter, Pair, ParamSpec, Value};

mod bootstrap;
mod environment;
mod gc;
mod host;
mod port;
mod printer;
mod stdlib;
mod symbol;
mod value;

/// Nesting of non-tail evaluations allowed before giving up with an error
/// rather than overflowing the native stack.
///
/// Each level costs several native frames, and collecting a long list marks
/// it recursively, so this limit assumes a thread of about
/// [`RECOMMENDED_STACK_SIZE`]. Hosts running on a default-sized thread should
/// lower it with [`Interpreter::set_max_depth`].
pub const DEFAULT_MAX_DEPTH: usize = 4_000;

/// Native stack size the interpreter thread should be spawned with.
pub const RECOMMENDED_STACK_SIZE: usize = 512 << 20;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    /// Evaluation failed with a message
    #[error("{0}")]
    Failed(String),
    /// The input ended in the middle of a datum
    #[error("EOF during read")]
    UnexpectedEof,
    /// A continuation unwinding to the `call/cc` that issued the token
    #[error("continuation {0} escaped its extent")]
    Escape(u64),
    /// `(exit)` on a host whose exit returns
    #[error("exit with code {0}")]
    Exit(i32),
}

/// Logs `message` and fails with it.
pub fn raise<T>(message: String) -> Result<T, ExecutionError> {
    error!("{}", message);
    Err(ExecutionError::Failed(message))
}

/// What a special form leaves for the trampoline.
enum Step {
    Return(Value),
    Continue(Value),
}

pub struct Interpreter {
    global: GcShared<Environment>,
    input: GcShared<InputPort>,
    output: GcShared<OutputPort>,
    host: Box<dyn Host>,
    last_escape: u64,
    depth: usize,
    max_depth: usize,
}

pub fn default_env() -> GcShared<Environment> {
    let mut env = Environment::default();

    for &(name, op, min_args, max_args) in stdlib::PRIMITIVES.iter() {
        env.define(
            Symbol::intern(name),
            Value::Primitive(Primitive {
                op,
                min_args,
                max_args,
                name,
            }),
        );
    }

    shared(env)
}

impl Interpreter {
    /// An interpreter with the primitives and the bootstrap library loaded.
    pub fn new<H: Host + 'static>(host: H) -> Result<Interpreter, ExecutionError> {
        let mut interpreter = Interpreter::bare(host);
        interpreter.run(Reader::from_str(bootstrap::BOOTSTRAP))?;
        Ok(interpreter)
    }

    /// An interpreter with the primitives only.
    pub fn bare<H: Host + 'static>(host: H) -> Interpreter {
        Interpreter {
            global: default_env(),
            input: shared(InputPort::new(host.stdin())),
            output: shared(OutputPort::new(host.stdout())),
            host: Box::new(host),
            last_escape: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    pub fn global(&self) -> GcShared<Environment> {
        self.global.clone()
    }

    pub fn host(&self) -> &dyn Host {
        &*self.host
    }

    /// Binds `name` in the global environment.
    pub fn define(&mut self, name: &str, value: Value) {
        self.global.borrow_mut().define(Symbol::intern(name), value);
    }

    pub fn input_port(&self) -> GcShared<InputPort> {
        self.input.clone()
    }

    pub fn output_port(&self) -> GcShared<OutputPort> {
        self.output.clone()
    }

    pub fn eval_global(&mut self, x: Value) -> Result<Value, ExecutionError> {
        let env = self.global.clone();
        self.eval(x, env)
    }

    /// Evaluates every datum in `reader`, returning the last value.
    pub fn run(&mut self, reader: Reader) -> Result<Value, ExecutionError> {
        let mut datums = Datums::new(reader);
        let mut last = Value::Nil;

        while let Some(x) = datums.next()? {
            last = self.eval_global(x)?;
        }

        Ok(last)
    }

    pub fn load(&mut self, path: &str) -> Result<Value, ExecutionError> {
        let source = match self.host.open_input(path) {
            Ok(source) => source,
            Err(e) => raise!("can't load {}: {}", path, e),
        };

        info!("Loading {}", path);
        self.run(Reader::new(source))?;
        Ok(Value::Boolean(true))
    }

    pub fn exit(&mut self, code: i32) -> Result<Value, ExecutionError> {
        self.host.exit(code);
        Err(ExecutionError::Exit(code))
    }

    pub fn eval(&mut self, x: Value, env: GcShared<Environment>) -> Result<Value, ExecutionError> {
        if self.depth >= self.max_depth {
            raise!("Recursion too deep: more than {} nested evaluations", self.max_depth);
        }

        self.depth += 1;
        let result = self.trampoline(x, env);
        self.depth -= 1;
        result
    }

    fn trampoline(
        &mut self,
        mut x: Value,
        mut env: GcShared<Environment>,
    ) -> Result<Value, ExecutionError> {
        let kw = keywords();

        loop {
            let pair = match x {
                Value::Symbol(name) => {
                    let frame = env.borrow();
                    return frame.lookup(name);
                }
                Value::Pair(ref pair) => pair.clone(),
                _ => return Ok(x),
            };

            let (head, args) = {
                let pair = pair.borrow();
                (pair.first.clone(), pair.rest.clone())
            };

            if let Value::Symbol(name) = head {
                if let Some(form) = kw.special_form(name) {
                    let step = self.special_form(form, &args, &env)?;
                    match step {
                        Step::Return(value) => return Ok(value),
                        Step::Continue(next) => {
                            x = next;
                            continue;
                        }
                    }
                }
            }

            match self.eval(head, env.clone())? {
                Value::Macro(ref transformer) => {
                    x = self.expand(&pair, transformer, &args)?;
                }
                Value::Closure(ref closure) => {
                    let values = self.eval_args(&args, &env)?;
                    env = Environment::extend(&closure.params, values, closure.env.clone());
                    x = closure.body.clone();
                }
                procedure => {
                    let values = self.eval_args(&args, &env)?;
                    return self.apply(&procedure, values);
                }
            }
        }
    }

    fn special_form(
        &mut self,
        form: SpecialForm,
        args: &Value,
        env: &GcShared<Environment>,
    ) -> Result<Step, ExecutionError> {
        let step = match form {
            SpecialForm::Quote => Step::Return(args.first()),
            SpecialForm::Begin => Step::Continue(self.eval_body(args, env)?),
            SpecialForm::Define => Step::Return(self.define_form(args, env)?),
            SpecialForm::Set => {
                let name = args.first().sym()?;
                let value = self.eval(args.second(), env.clone())?;
                Step::Return(Environment::set(env, name, value)?)
            }
            SpecialForm::If => {
                let test = self.eval(args.first(), env.clone())?;
                if test.is_true() {
                    Step::Continue(args.second())
                } else {
                    // A missing alternative is the empty list
                    Step::Continue(args.third())
                }
            }
            SpecialForm::Cond => self.reduce_cond(args, env)?,
            SpecialForm::Lambda => {
                let params = ParamSpec::parse(&args.first())?;
                Step::Return(Value::closure(Closure::new(params, args.rest(), env.clone())))
            }
            SpecialForm::Macro => {
                let params = ParamSpec::parse(&args.first())?;
                let transformer = Closure::new(params, args.rest(), env.clone());
                Step::Return(Value::Macro(boxed(transformer)))
            }
        };
        Ok(step)
    }

    /// Evaluates all but the last form of a body, which is returned.
    fn eval_body(&mut self, body: &Value, env: &GcShared<Environment>) -> Result<Value, ExecutionError> {
        let mut body = body.clone();
        while body.rest().is_pair() {
            self.eval(body.first(), env.clone())?;
            body = body.rest();
        }
        Ok(body.first())
    }

    fn define_form(&mut self, args: &Value, env: &GcShared<Environment>) -> Result<Value, ExecutionError> {
        let target = args.first();

        let (name, value) = match target {
            // (define (name . params) body...)
            Value::Pair(_) => {
                let name = target.first().sym()?;
                let params = ParamSpec::parse(&target.rest())?;
                let closure = Closure::new(params, args.rest(), env.clone());
                (name, Value::closure(closure))
            }
            _ => {
                let name = target.sym()?;
                (name, self.eval(args.second(), env.clone())?)
            }
        };

        env.borrow_mut().define(name, value);
        Ok(Value::Symbol(name))
    }

    fn reduce_cond(&mut self, clauses: &Value, env: &GcShared<Environment>) -> Result<Step, ExecutionError> {
        let kw = keywords();

        for clause in clauses.iter() {
            let test = clause.first();
            let result = if test == Value::Symbol(kw.else_) {
                Value::Boolean(true)
            } else {
                self.eval(test, env.clone())?
            };

            if !result.is_true() {
                continue;
            }

            let body = clause.rest();
            return Ok(if body.is_null() {
                Step::Return(result)
            } else if body.first() == Value::Symbol(kw.arrow) {
                let quoted = Value::list(vec![Value::Symbol(kw.quote), result]);
                Step::Continue(Value::list(vec![body.second(), quoted]))
            } else {
                Step::Continue(Value::cons(Value::Symbol(kw.begin), body))
            });
        }

        Ok(Step::Return(Value::Boolean(false)))
    }

    fn eval_args(&mut self, args: &Value, env: &GcShared<Environment>) -> Result<Vec<Value>, ExecutionError> {
        let mut values = Vec::new();
        let mut tail = args.clone();

        loop {
            tail = match tail {
                Value::Nil => return Ok(values),
                Value::Pair(ref pair) => {
                    let (first, rest) = {
                        let pair = pair.borrow();
                        (pair.first.clone(), pair.rest.clone())
                    };
                    values.push(self.eval(first, env.clone())?);
                    rest
                }
                _ => raise!("Illegal argument list: {}", stringify(args, true)),
            }
        }
    }

    pub fn apply(&mut self, procedure: &Value, args: Vec<Value>) -> Result<Value, ExecutionError> {
        match *procedure {
            Value::Primitive(primitive) => stdlib::call(self, primitive, args),
            Value::Closure(ref closure) | Value::Macro(ref closure) => {
                let env = Environment::extend(&closure.params, args, closure.env.clone());
                self.eval(closure.body.clone(), env)
            }
            Value::Continuation(ref k) => k.throw(args.into_iter().next().unwrap_or(Value::Nil)),
            ref other => raise!("Not a procedure: {}", stringify(other, true)),
        }
    }

    /// Runs `transformer` on the unevaluated operands and splices the
    /// expansion into the call site itself.
    fn expand(
        &mut self,
        site: &GcShared<Pair>,
        transformer: &Gc<Closure>,
        operands: &Value,
    ) -> Result<Value, ExecutionError> {
        let env = Environment::extend(&transformer.params, operands.to_vec()?, transformer.env.clone());
        let expansion = self.eval(transformer.body.clone(), env)?;
        debug!("Expanded {:?} into {:?}", transformer.name(), expansion);

        let (first, rest) = match expansion {
            Value::Pair(ref pair) => {
                let pair = pair.borrow();
                (pair.first.clone(), pair.rest.clone())
            }
            other => (Value::Symbol(keywords().begin), Value::list(vec![other])),
        };

        {
            let mut site = site.borrow_mut();
            site.first = first;
            site.rest = rest;
        }
        Ok(Value::Pair(site.clone()))
    }

    /// One expansion step of a macro call, without evaluating the result.
    pub fn macro_expand(&mut self, x: Value) -> Result<Value, ExecutionError> {
        let site = match x {
            Value::Pair(ref pair) => pair.clone(),
            _ => return Ok(x),
        };

        match self.eval_global(x.first())? {
            Value::Macro(ref transformer) => self.expand(&site, transformer, &x.rest()),
            _ => Ok(x),
        }
    }

    pub fn call_cc(&mut self, receiver: &Value) -> Result<Value, ExecutionError> {
        self.last_escape += 1;
        let k = boxed(Continuation::new(self.last_escape));

        let result = self.apply(receiver, vec![Value::Continuation(k.clone())]);
        k.deactivate();

        match result {
            Err(ExecutionError::Escape(token)) if token == k.token => Ok(k.take()),
            other => other,
        }
    }
}
