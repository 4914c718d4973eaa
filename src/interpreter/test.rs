use super::{interpret, repl};
use crate::vm::{stringify, ExecutionError, Host, Interpreter};
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use self::ExecutionError::*;

/// Standard input from a string, standard output into a buffer the test can
/// inspect afterwards, and an `exit` that returns.
struct BufferHost {
    input: String,
    output: Rc<RefCell<Vec<u8>>>,
    exit_code: Rc<Cell<Option<i32>>>,
    start: Instant,
}

struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Host for BufferHost {
    fn stdin(&self) -> Box<dyn BufRead> {
        Box::new(Cursor::new(self.input.clone().into_bytes()))
    }

    fn stdout(&self) -> Box<dyn Write> {
        Box::new(SharedBuffer(self.output.clone()))
    }

    fn open_input(&self, path: &str) -> io::Result<Box<dyn BufRead>> {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }

    fn open_output(&self, path: &str) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(File::create(path)?))
    }

    fn exit(&self, code: i32) {
        self.exit_code.set(Some(code));
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// What a test run leaves behind, in a form that can leave its thread.
#[derive(Debug)]
struct Outcome {
    result: Result<String, ExecutionError>,
    output: String,
    exit_code: Option<i32>,
}

/// Runs `f` against a fresh interpreter on a thread with a large stack.
fn session<F>(input: &str, bootstrap: bool, f: F) -> Outcome
where
    F: FnOnce(&mut Interpreter) -> Result<String, ExecutionError> + Send + 'static,
{
    session_with_stack(256 << 20, input, bootstrap, f)
}

fn session_with_stack<F>(stack_size: usize, input: &str, bootstrap: bool, f: F) -> Outcome
where
    F: FnOnce(&mut Interpreter) -> Result<String, ExecutionError> + Send + 'static,
{
    let input = input.to_owned();

    thread::Builder::new()
        .stack_size(stack_size)
        .spawn(move || {
            let output = Rc::new(RefCell::new(Vec::new()));
            let exit_code = Rc::new(Cell::new(None));
            let host = BufferHost {
                input,
                output: output.clone(),
                exit_code: exit_code.clone(),
                start: Instant::now(),
            };

            let mut interpreter = if bootstrap {
                Interpreter::new(host).expect("bootstrap")
            } else {
                Interpreter::bare(host)
            };
            let result = f(&mut interpreter);
            let output = String::from_utf8(output.borrow().clone()).expect("utf-8 output");

            Outcome {
                result,
                output,
                exit_code: exit_code.get(),
            }
        })
        .expect("spawn")
        .join()
        .expect("interpreter thread")
}

fn run(code: &str) -> Outcome {
    let code = code.to_owned();
    session("", true, move |interp| {
        interpret(&code, interp).map(|v| stringify(&v, true))
    })
}

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("dandy-scheme-{}-{}", std::process::id(), name))
}

macro_rules! with_std {
    ($code:expr) => {
        run($code).result
    };
}

macro_rules! with_bare {
    ($code:expr) => {{
        let code: &str = $code;
        let code = code.to_owned();
        session("", false, move |interp| {
            interpret(&code, interp).map(|v| stringify(&v, true))
        })
        .result
    }};
}

macro_rules! output_of {
    ($code:expr) => {
        run($code).output
    };
}

macro_rules! ok {
    ($repr:expr) => {
        Ok(String::from($repr))
    };
}

macro_rules! rt_err {
    ($message:expr) => {
        Err(Failed(String::from($message)))
    };
}

#[test]
fn symbol() {
    assert_eq![with_std!["'a"], ok!["a"]];
}

#[test]
fn two_expressions() {
    assert_eq![with_std!["'a\n'b"], ok!["b"]];
}

#[test]
fn empty_program() {
    assert_eq![with_std![""], ok!["()"]];
}

#[test]
fn primitives_without_bootstrap() {
    assert_eq![with_bare!["(car (cons 1 2))"], ok!["1"]];
    assert_eq![with_bare!["(let ((x 1)) x)"], rt_err!["Unbound variable: let"]];
}

#[test]
fn cons_argc() {
    assert_eq![with_std!["(cons)"], rt_err!["too few args, 0, for cons: ()"]];
    assert_eq![
        with_std!["(cons 'a 'b 'c)"],
        rt_err!["too many args, 3, for cons: (a b c)"]
    ];
}

#[test]
fn basic_call() {
    assert_eq![with_std!["((lambda () 'a))"], ok!["a"]];
    assert_eq![with_std!["((lambda (x y) (+ x y)) 1 2)"], ok!["3"]];
    assert_eq![with_std!["((lambda args args) 1 2)"], ok!["(1 2)"]];
    assert_eq![with_std!["((lambda (a . rest) rest) 1 2 3)"], ok!["(2 3)"]];
}

#[test]
fn missing_arguments_are_empty_lists() {
    assert_eq![with_std!["((lambda (a b) b) 1)"], ok!["()"]];
}

#[test]
fn define_returns_name() {
    assert_eq![with_std!["(define x 1)"], ok!["x"]];
    assert_eq![with_std!["(define (f) 1)"], ok!["f"]];
}

#[test]
fn if_without_alternative() {
    assert_eq![with_std!["(if #f 1)"], ok!["()"]];
    assert_eq![with_std!["(if '() 1 2)"], ok!["1"]];
}

#[test]
fn cond_clauses() {
    assert_eq![
        with_std!["(cond ((assv 2 '((1 . a) (2 . b))) => cdr) (else 'none))"],
        ok!["b"]
    ];
    assert_eq![with_std!["(cond (#f 1) ((+ 1 1)))"], ok!["2"]];
    assert_eq![with_std!["(cond (#f 1))"], ok!["#f"]];
    assert_eq![with_std!["(cond (#f 1) (else 2 3))"], ok!["3"]];
}

#[test]
fn set_walks_the_environment_chain() {
    assert_eq![
        with_std!["(define n 1) ((lambda () (set! n 5))) n"],
        ok!["5"]
    ];
    assert_eq![with_std!["(set! nowhere 1)"], rt_err!["Unbound variable: nowhere"]];
}

#[test]
fn tail_calls_run_in_constant_space() {
    assert_eq![
        with_std!["(define (loop n) (if (= n 0) 'done (loop (- n 1)))) (loop 1000000)"],
        ok!["done"]
    ];
    assert_eq![
        with_std![
            "(define (count n acc) (cond ((= n 0) acc) (else (count (- n 1) (+ acc 1)))))
             (count 100000 0)"
        ],
        ok!["100000"]
    ];
}

#[test]
fn deep_recursion_is_an_error() {
    let code = "(define (f n) (if (= n 0) 0 (+ 1 (f (- n 1)))))";
    assert_eq![with_std![&format!("{} (f 1000)", code)], ok!["1000"]];
    assert_eq![
        with_std![&format!("{} (f 100000)", code)],
        rt_err!["Recursion too deep: more than 4000 nested evaluations"]
    ];
}

#[test]
fn max_depth_is_configurable() {
    let outcome = session("", true, |interp| {
        interp.set_max_depth(50);
        interpret("(define (f n) (if (= n 0) 0 (+ 1 (f (- n 1))))) (f 100)", interp)
            .map(|v| stringify(&v, true))
    });
    assert![outcome.result.is_err()];
}

#[test]
fn lowered_max_depth_fits_a_default_thread() {
    let outcome = session_with_stack(8 << 20, "", true, |interp| {
        interp.set_max_depth(200);
        let shallow =
            interpret("(define (f n) (if (= n 0) 0 (+ 1 (f (- n 1))))) (f 150)", interp)?;
        assert_eq![stringify(&shallow, true), "150"];
        interpret("(f 3990)", interp).map(|v| stringify(&v, true))
    });
    assert_eq![
        outcome.result,
        rt_err!["Recursion too deep: more than 200 nested evaluations"]
    ];
}

#[test]
fn closures_keep_their_state() {
    assert_eq![
        with_std![
            "(define (make-counter) (let ((n 0)) (lambda () (set! n (+ n 1)) n)))
             (define c (make-counter))
             (define d (make-counter))
             (list (c) (c) (d))"
        ],
        ok!["(1 2 1)"]
    ];
}

#[test]
fn integer_division() {
    assert_eq![with_std!["(quotient 17 5)"], ok!["3"]];
    assert_eq![with_std!["(quotient -17 5)"], ok!["-3"]];
    assert_eq![with_std!["(remainder -17 5)"], ok!["-2"]];
    assert_eq![with_std!["(modulo -17 5)"], ok!["3"]];
    assert_eq![with_std!["(modulo 17 -5)"], ok!["-3"]];
    assert_eq![with_std!["(quotient 7 2)"], ok!["3"]];
    assert_eq![with_std!["(quotient -7 2)"], ok!["-3"]];
    assert_eq![with_std!["(remainder 7 -2)"], ok!["1"]];
    assert_eq![with_std!["(modulo 7 -2)"], ok!["-1"]];
    assert_eq![with_std!["(quotient 1 0)"], rt_err!["Division by zero: 1 by 0"]];
}

#[test]
fn arithmetic() {
    assert_eq![with_std!["(+)"], ok!["0"]];
    assert_eq![with_std!["(*)"], ok!["1"]];
    assert_eq![with_std!["(- 5)"], ok!["-5"]];
    assert_eq![with_std!["(- 10 1 2)"], ok!["7"]];
    assert_eq![with_std!["(/ 1 4)"], ok!["0.25"]];
    assert_eq![with_std!["(max 1 3 2)"], ok!["3"]];
    assert_eq![with_std!["(min 1 3 2)"], ok!["1"]];
    assert_eq![with_std!["(expt 2 10)"], ok!["1024"]];
    assert_eq![with_std!["(gcd 12 18)"], ok!["6"]];
    assert_eq![with_std!["(lcm 4 6)"], ok!["12"]];
    assert_eq![with_std!["(abs -4)"], ok!["4"]];
    assert_eq![with_std!["(< 1 2 3)"], ok!["#t"]];
    assert_eq![with_std!["(< 1 3 2)"], ok!["#f"]];
    assert_eq![with_std!["(= 2 2 2)"], ok!["#t"]];
    assert_eq![with_std!["(+ 1 'a)"], rt_err!["expected a number, got: a"]];
}

#[test]
fn rounding() {
    assert_eq![with_std!["(round 2.5)"], ok!["2"]];
    assert_eq![with_std!["(round 3.5)"], ok!["4"]];
    assert_eq![with_std!["(round -2.5)"], ok!["-2"]];
    assert_eq![with_std!["(floor -1.5)"], ok!["-2"]];
    assert_eq![with_std!["(ceiling 1.2)"], ok!["2"]];
    assert_eq![with_std!["(truncate -1.7)"], ok!["-1"]];
}

#[test]
fn number_predicates() {
    assert_eq![with_std!["(integer? 2)"], ok!["#t"]];
    assert_eq![with_std!["(integer? 2.5)"], ok!["#f"]];
    assert_eq![with_std!["(inexact? 2.5)"], ok!["#t"]];
    assert_eq![with_std!["(odd? 3)"], ok!["#t"]];
    assert_eq![with_std!["(even? -4)"], ok!["#t"]];
    assert_eq![with_std!["(zero? 0)"], ok!["#t"]];
    assert_eq![with_std!["(negative? -1)"], ok!["#t"]];
}

#[test]
fn number_conversions() {
    assert_eq![with_std!["(number->string 255 16)"], ok!["\"ff\""]];
    assert_eq![with_std!["(number->string -5 2)"], ok!["\"-101\""]];
    assert_eq![with_std!["(number->string 1.5)"], ok!["\"1.5\""]];
    assert_eq![with_std!["(string->number \"ff\" 16)"], ok!["255"]];
    assert_eq![with_std!["(string->number \"1e3\")"], ok!["1000"]];
    assert_eq![with_std!["(string->number \"abc\")"], ok!["#f"]];
}

#[test]
fn equivalence_ladder() {
    assert_eq![with_std!["(eq? 'a 'a)"], ok!["#t"]];
    assert_eq![with_std!["(eq? '() '())"], ok!["#t"]];
    assert_eq![with_std!["(eq? \"ab\" \"ab\")"], ok!["#f"]];
    assert_eq![with_std!["(eqv? 2 2)"], ok!["#t"]];
    assert_eq![with_std!["(eqv? 2.0 2.0)"], ok!["#t"]];
    assert_eq![with_std!["(eq? (list 1) (list 1))"], ok!["#f"]];
    assert_eq![with_std!["(eqv? (list 1) (list 1))"], ok!["#f"]];
    assert_eq![with_std!["(equal? (list 1) (list 1))"], ok!["#t"]];
    assert_eq![with_std!["(equal? \"ab\" \"ab\")"], ok!["#t"]];
    assert_eq![with_std!["(equal? '(1 (2 #(3))) '(1 (2 #(3))))"], ok!["#t"]];
    assert_eq![with_std!["(equal? '(1 2) '(1 3))"], ok!["#f"]];
}

#[test]
fn list_operations() {
    assert_eq![with_std!["(list)"], ok!["()"]];
    assert_eq![with_std!["(append '(1) '(2 3) '(4))"], ok!["(1 2 3 4)"]];
    assert_eq![with_std!["(append '(1) 2)"], ok!["(1 . 2)"]];
    assert_eq![with_std!["(append)"], ok!["()"]];
    assert_eq![with_std!["(reverse '(1 2 3))"], ok!["(3 2 1)"]];
    assert_eq![with_std!["(length '(1 2 3))"], ok!["3"]];
    assert_eq![with_std!["(list-tail '(1 2 3) 1)"], ok!["(2 3)"]];
    assert_eq![with_std!["(list-ref '(1 2 3) 2)"], ok!["3"]];
    assert_eq![with_std!["(memv 2 '(1 2 3))"], ok!["(2 3)"]];
    assert_eq![with_std!["(memq 'z '(a b))"], ok!["#f"]];
    assert_eq![with_std!["(member '(1) '(a (1) b))"], ok!["((1) b)"]];
    assert_eq![
        with_std!["(assoc \"b\" '((\"a\" . 1) (\"b\" . 2)))"],
        ok!["(\"b\" . 2)"]
    ];
    assert_eq![with_std!["(assq 'c '((a 1)))"], ok!["#f"]];
    assert_eq![with_std!["(caddr '(1 2 3))"], ok!["3"]];
    assert_eq![with_std!["(cdadr '(1 (2 3)))"], ok!["(3)"]];
    assert_eq![with_std!["(_list* 1 2 '(3))"], ok!["(1 2 3)"]];
    assert_eq![with_std!["(car '())"], ok!["()"]];
}

#[test]
fn pair_mutation() {
    assert_eq![with_std!["(let ((p (cons 1 2))) (set-car! p 3) p)"], ok!["(3 . 2)"]];
    assert_eq![with_std!["(let ((p (list 1 2))) (set-cdr! p 5) p)"], ok!["(1 . 5)"]];
}

#[test]
fn cyclic_lists() {
    let cycle = "(define l (list 1 2)) (set-cdr! (cdr l) l)";
    assert_eq![with_std![&format!("{} (list? l)", cycle)], ok!["#f"]];
    assert_eq![with_std![&format!("{} (length l)", cycle)], rt_err!["length: circular list"]];
    assert_eq![with_std![&format!("{} (equal? l l)", cycle)], ok!["#t"]];
    assert_eq![with_std![&format!("{} l", cycle)], ok!["(1 2 ...)"]];

    let quoted = "(define q (list 'quote 1)) (set-car! (cdr q) q)";
    assert_eq![with_std![&format!("{} q", quoted)], ok!["'..."]];
    let outcome = run(&format!("{} (write q) (display (list q))", quoted));
    assert_eq![outcome.output, "'...('...)"];
}

#[test]
fn apply_and_map() {
    assert_eq![with_std!["(apply + 1 2 '(3 4))"], ok!["10"]];
    assert_eq![with_std!["(apply + '(1 2 3))"], ok!["6"]];
    assert_eq![with_std!["(apply list '())"], ok!["()"]];
    assert_eq![with_std!["(map + '(1 2 3) '(10 20 30))"], ok!["(11 22 33)"]];
    assert_eq![with_std!["(map + '(1 2 3) '(10 20))"], ok!["(11 22)"]];
    assert_eq![with_std!["(map (lambda (x) (* x x)) '(1 2 3))"], ok!["(1 4 9)"]];
    assert_eq![with_std!["(for-each display '(1 2 3))"], ok!["()"]];
    assert_eq![output_of!["(for-each display '(1 2 3))"], "123"];
    assert_eq![with_std!["(apply + 1 2)"], rt_err!["expected a proper list, got: 2"]];
}

#[test]
fn characters() {
    assert_eq![with_std!["(char->integer #\\a)"], ok!["97"]];
    assert_eq![with_std!["(integer->char 65)"], ok!["#\\A"]];
    assert_eq![
        with_std!["(integer->char 4294967361)"],
        rt_err!["integer->char: no character with code 4294967361"]
    ];
    assert_eq![with_std!["(char-upcase #\\a)"], ok!["#\\A"]];
    assert_eq![with_std!["(char<? #\\a #\\b)"], ok!["#t"]];
    assert_eq![with_std!["(char-ci=? #\\a #\\A)"], ok!["#t"]];
    assert_eq![with_std!["(char-alphabetic? #\\1)"], ok!["#f"]];
    assert_eq![with_std!["(char-whitespace? #\\space)"], ok!["#t"]];
}

#[test]
fn strings() {
    assert_eq![with_std!["(string-append \"ab\" \"cd\")"], ok!["\"abcd\""]];
    assert_eq![with_std!["(string-append \"n=\" 1)"], ok!["\"n=1\""]];
    assert_eq![with_std!["(substring \"hello\" 1 3)"], ok!["\"el\""]];
    assert_eq![with_std!["(string-length \"hello\")"], ok!["5"]];
    assert_eq![with_std!["(string-ref \"hello\" 1)"], ok!["#\\e"]];
    assert_eq![with_std!["(make-string 3 #\\x)"], ok!["\"xxx\""]];
    assert_eq![with_std!["(string #\\a #\\b)"], ok!["\"ab\""]];
    assert_eq![
        with_std!["(let ((s (make-string 2 #\\a))) (string-set! s 1 #\\b) s)"],
        ok!["\"ab\""]
    ];
    assert_eq![with_std!["(string<? \"abc\" \"abd\")"], ok!["#t"]];
    assert_eq![with_std!["(string-ci=? \"AbC\" \"aBc\")"], ok!["#t"]];
    assert_eq![with_std!["(string->list \"ab\")"], ok!["(#\\a #\\b)"]];
    assert_eq![with_std!["(list->string (list #\\a #\\b))"], ok!["\"ab\""]];
}

#[test]
fn symbols() {
    assert_eq![with_std!["(symbol->string 'Abc)"], ok!["\"abc\""]];
    assert_eq![with_std!["(string->symbol \"Hi\")"], ok!["Hi"]];
    assert_eq![with_std!["(eq? 'abc (string->symbol \"abc\"))"], ok!["#t"]];
}

#[test]
fn vectors() {
    assert_eq![
        with_std!["(let ((v (make-vector 3 0))) (vector-set! v 0 'a) v)"],
        ok!["#(a 0 0)"]
    ];
    assert_eq![with_std!["(vector-ref (vector 1 2) 1)"], ok!["2"]];
    assert_eq![with_std!["(vector-length #(1 2 3))"], ok!["3"]];
    assert_eq![with_std!["(vector->list #(1 2))"], ok!["(1 2)"]];
    assert_eq![with_std!["(list->vector '(1 2))"], ok!["#(1 2)"]];
    assert_eq![
        with_std!["(vector-ref (vector 1 2) 5)"],
        rt_err!["Index 5 out of range for length 2"]
    ];
    assert_eq![
        with_std!["(make-vector 1e12 0)"],
        rt_err!["make-vector: length too large: 1000000000000"]
    ];
    assert_eq![
        with_std!["(make-string 1e12)"],
        rt_err!["make-string: length too large: 1000000000000"]
    ];
}

#[test]
fn type_predicates() {
    assert_eq![with_std!["(procedure? car)"], ok!["#t"]];
    assert_eq![with_std!["(procedure? (lambda () 1))"], ok!["#t"]];
    assert_eq![with_std!["(procedure? 'car)"], ok!["#f"]];
    assert_eq![with_std!["(boolean? #f)"], ok!["#t"]];
    assert_eq![with_std!["(null? '())"], ok!["#t"]];
    assert_eq![with_std!["(pair? '())"], ok!["#f"]];
    assert_eq![with_std!["(vector? #(1))"], ok!["#t"]];
    assert_eq![with_std!["(string? \"a\")"], ok!["#t"]];
    assert_eq![with_std!["(not 0)"], ok!["#f"]];
}

#[test]
fn printing_procedures() {
    assert_eq![with_std!["car"], ok!["{car}"]];
    assert_eq![with_std!["(define (sq x) (* x x)) sq"], ok!["{sq}"]];
    assert_eq![with_std!["(lambda (x) x)"], ok!["{anonymous procedure}"]];
    assert_eq![with_std!["(define f (lambda (x) x)) f"], ok!["{f}"]];
}

#[test]
fn macros_expand_in_place() {
    assert_eq![
        with_std![
            "(define inc! (macro (v) (list 'set! v (list '+ v 1))))
             (define n 0)
             (define code '(inc! n))
             (eval code)
             (eval code)
             (list n code)"
        ],
        ok!["(2 (set! n (+ n 1)))"]
    ];
}

#[test]
fn macro_expand_one_step() {
    assert_eq![
        with_std![
            "(define inc! (macro (v) (list 'set! v (list '+ v 1))))
             (macro-expand '(inc! n))"
        ],
        ok!["(set! n (+ n 1))"]
    ];
    assert_eq![with_std!["(macro-expand '(car x))"], ok!["(car x)"]];
}

#[test]
fn escaping_continuations() {
    assert_eq![with_std!["(+ 1 (call/cc (lambda (k) (+ 10 (k 10)))))"], ok!["11"]];
    assert_eq![with_std!["(+ 1 (call/cc (lambda (k) (k 10) 999)))"], ok!["11"]];
    assert_eq![with_std!["(call/cc (lambda (k) 5))"], ok!["5"]];
    assert_eq![
        with_std![
            "(define (find-first pred l)
               (call/cc (lambda (return)
                 (for-each (lambda (x) (if (pred x) (return x))) l)
                 #f)))
             (find-first even? '(1 3 4 5 6))"
        ],
        ok!["4"]
    ];
}

#[test]
fn nested_continuations_reach_their_own_frame() {
    assert_eq![
        with_std![
            "(call/cc (lambda (outer)
               (+ 1 (call/cc (lambda (inner) (outer 42))))))"
        ],
        ok!["42"]
    ];
}

#[test]
fn stale_continuation_is_an_error() {
    assert_eq![
        with_std!["(define saved #f) (call/cc (lambda (k) (set! saved k) 1)) (saved 5)"],
        rt_err!["Continuation invoked after its extent ended: 5"]
    ];
}

#[test]
fn let_forms() {
    assert_eq![with_std!["(let ((x 1) (y 2)) (+ x y))"], ok!["3"]];
    assert_eq![
        with_std!["(let loop ((i 0) (acc '())) (if (= i 3) acc (loop (+ i 1) (cons i acc))))"],
        ok!["(2 1 0)"]
    ];
    assert_eq![with_std!["(let* ((x 1) (y (+ x 1))) (* x y))"], ok!["2"]];
    assert_eq![
        with_std![
            "(letrec ((ev? (lambda (n) (if (= n 0) #t (od? (- n 1)))))
                      (od? (lambda (n) (if (= n 0) #f (ev? (- n 1))))))
               (ev? 100))"
        ],
        ok!["#t"]
    ];
}

#[test]
fn case_and_do() {
    assert_eq![
        with_std!["(case (* 2 3) ((2 3 5 7) 'prime) ((1 4 6 8 9) 'composite))"],
        ok!["composite"]
    ];
    assert_eq![with_std!["(case 'x ((a) 1) (else 2))"], ok!["2"]];
    assert_eq![
        with_std!["(do ((i 0 (+ i 1)) (acc '() (cons i acc))) ((= i 3) acc))"],
        ok!["(2 1 0)"]
    ];
}

#[test]
fn and_or() {
    assert_eq![with_std!["(and)"], ok!["#t"]];
    assert_eq![with_std!["(and 1 2 3)"], ok!["3"]];
    assert_eq![with_std!["(and 1 #f 3)"], ok!["#f"]];
    assert_eq![with_std!["(or)"], ok!["#f"]];
    assert_eq![with_std!["(or #f 2)"], ok!["2"]];
}

#[test]
fn quasiquotation() {
    assert_eq![
        with_std!["(let ((x 1) (ys '(2 3))) `(a ,x ,@ys b))"],
        ok!["(a 1 2 3 b)"]
    ];
    assert_eq![with_std!["`(1 2)"], ok!["(1 2)"]];
}

#[test]
fn promises() {
    let code = "(define p (delay (begin (display \"x\") 1))) (+ (force p) (force p))";
    let outcome = run(code);
    assert_eq![outcome.result, ok!["2"]];
    assert_eq![outcome.output, "x"];
    assert_eq![with_std!["(force 3)"], ok!["3"]];
}

#[test]
fn timing() {
    assert_eq![with_std!["(car (time (+ 1 2)))"], ok!["3"]];
    assert_eq![with_std!["(map cadr (cadr (time 1)))"], ok!["(\"msec\" \"bytes\")"]];
    assert_eq![
        with_std!["(map (lambda (stat) (string? (cadr stat))) (cadr (time 1)))"],
        ok!["(#t #t)"]
    ];
}

#[test]
fn eval_in_global_environment() {
    assert_eq![with_std!["(eval '(+ 1 2))"], ok!["3"]];
    assert_eq![with_std!["(eval (list 'define 'z 4)) z"], ok!["4"]];
}

#[test]
fn errors() {
    assert_eq![
        with_std!["(error \"bad thing:\" 42 'x \"s\")"],
        rt_err!["bad thing: 42 x \"s\""]
    ];
    assert_eq![with_std!["(error)"], rt_err!["error"]];
    assert_eq![with_std!["(undefined-var)"], rt_err!["Unbound variable: undefined-var"]];
    assert_eq![with_std!["(\"notproc\")"], rt_err!["Not a procedure: \"notproc\""]];
    assert_eq![with_std!["(car)"], rt_err!["too few args, 0, for car: ()"]];
}

#[test]
fn display_and_write() {
    assert_eq![
        output_of!["(write \"a\\\"b\") (display \"a\\\"b\") (write #\\a) (write #\\space) (newline)"],
        "\"a\\\"b\"a\"b#\\a#\\space\n"
    ];
    assert_eq![output_of!["(display '(1 \"two\" #\\3))"], "(1 two 3)"];
    assert_eq![output_of!["(write-char #\\z)"], "z"];
    assert_eq![with_std!["(display 1)"], ok!["1"]];
}

#[test]
fn exit_unwinds() {
    let outcome = run("(display \"bye\") (exit 3) (display \"unreachable\")");
    assert_eq![outcome.result, Err(Exit(3))];
    assert_eq![outcome.exit_code, Some(3)];
    assert_eq![outcome.output, "bye"];
}

#[test]
fn reading_from_current_input() {
    let outcome = session("(1 2) foo", true, |interp| {
        interpret("(list (read) (read) (read))", interp).map(|v| stringify(&v, true))
    });
    assert_eq![outcome.result, ok!["((1 2) foo #!eof)"]];

    let outcome = session("ab", true, |interp| {
        interpret(
            "(list (peek-char) (read-char) (read-char) (read-char) (eof-object? (read-char)))",
            interp,
        )
        .map(|v| stringify(&v, true))
    });
    assert_eq![outcome.result, ok!["(#\\a #\\a #\\b #!eof #t)"]];
}

#[test]
fn current_ports() {
    assert_eq![with_std!["(input-port? (current-input-port))"], ok!["#t"]];
    assert_eq![with_std!["(current-output-port)"], ok!["#<output-port>"]];
    assert_eq![output_of!["(display 'x (current-output-port))"], "x"];
}

#[test]
fn file_round_trip() {
    let path = temp_file("round-trip.scm");
    let code = format!(
        "(call-with-output-file \"{0}\" (lambda (p) (write '(a \"b\" #\\c 1.5) p)))
         (call-with-input-file \"{0}\" read)",
        path.display()
    );
    assert_eq![with_std![&code], ok!["(a \"b\" #\\c 1.5)"]];

    let code = format!(
        "(define p (open-input-file \"{0}\"))
         (define first-datum (read p))
         (define rest-datum (read p))
         (close-input-port p)
         (list first-datum rest-datum)",
        path.display()
    );
    assert_eq![with_std![&code], ok!["((a \"b\" #\\c 1.5) #!eof)"]];
    let _ = std::fs::remove_file(path);
}

#[test]
fn file_port_is_closed_when_callback_fails() {
    let path = temp_file("closed.scm");
    std::fs::write(&path, "1 2 3").expect("write temp file");
    let name = path.display().to_string();

    let outcome = session("", true, move |interp| {
        let failed = interpret(
            &format!(
                "(define saved #f)
                 (call-with-input-file \"{}\" (lambda (p) (set! saved p) (error \"boom\")))",
                name
            ),
            interp,
        );
        assert_eq![failed, Err(Failed("boom".into()))];
        interpret("(read saved)", interp).map(|v| stringify(&v, true))
    });

    assert_eq![outcome.result, rt_err!["Input port is closed"]];
    let _ = std::fs::remove_file(path);
}

#[test]
fn output_file_port_is_closed_when_callback_fails() {
    let path = temp_file("closed-output.scm");
    let name = path.display().to_string();

    let outcome = session("", true, move |interp| {
        let failed = interpret(
            &format!(
                "(define saved #f)
                 (call-with-output-file \"{}\" (lambda (p) (set! saved p) (error \"boom\")))",
                name
            ),
            interp,
        );
        assert_eq![failed, Err(Failed("boom".into()))];
        interpret("(write 1 saved)", interp).map(|v| stringify(&v, true))
    });

    assert_eq![outcome.result, rt_err!["Output port is closed"]];
    let _ = std::fs::remove_file(path);
}

#[test]
fn loading_files() {
    let path = temp_file("load.scm");
    std::fs::write(&path, "(define loaded 42)\n(define (twice x) (* 2 x))\n")
        .expect("write temp file");

    assert_eq![
        with_std![&format!("(load \"{}\") (twice loaded)", path.display())],
        ok!["84"]
    ];
    assert_eq![with_std![&format!("(load \"{}\")", path.display())], ok!["#t"]];
    let _ = std::fs::remove_file(path);

    match with_std!["(load \"/nonexistent/dir/file.scm\")"] {
        Err(Failed(message)) => assert![message.starts_with("can't load /nonexistent/dir/file.scm")],
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn unterminated_input() {
    assert_eq![with_std!["(+ 1"], Err(UnexpectedEof)];
}

#[test]
fn repl_survives_errors() {
    let input = "(define x 2)\n(* x 3)\n(car)\n'done\n";
    let outcome = session(input, true, |interp| repl(interp).map(|_| String::new()));

    assert_eq![outcome.result, ok![""]];
    assert_eq![
        outcome.output,
        "> x\n> 6\n> Error: too few args, 0, for car: ()\n> done\n> "
    ];
}

#[test]
fn repl_stops_on_exit() {
    let outcome = session("(exit 7)\n'after\n", true, |interp| {
        repl(interp).map(|_| String::new())
    });

    assert_eq![outcome.result, Err(Exit(7))];
    assert_eq![outcome.exit_code, Some(7)];
    assert_eq![outcome.output, "> "];
}
