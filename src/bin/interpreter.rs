#[cfg(target_os = "emscripten")]
fn main() {}

#[cfg(not(target_os = "emscripten"))]
fn main() {
    not_web::main();
}

#[cfg(not(target_os = "emscripten"))]
mod not_web {
    use dandy_scheme::reader::{Datums, Reader};
    use dandy_scheme::vm::{stringify, ExecutionError, Interpreter, StdHost, RECOMMENDED_STACK_SIZE};
    use dandy_scheme::{interpret, repl};
    use fallible_iterator::FallibleIterator;
    use log::{debug, error};
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use std::env::{args, var};
    use std::process;
    use std::thread;

    struct Options {
        interactive: bool,
        plain: bool,
        files: Vec<String>,
    }

    fn parse_args() -> Options {
        let mut options = Options {
            interactive: false,
            plain: false,
            files: Vec::new(),
        };

        for arg in args().skip(1) {
            match &arg[..] {
                "-i" => options.interactive = true,
                "--plain" => options.plain = true,
                _ => options.files.push(arg),
            }
        }
        options
    }

    fn env_number(name: &str) -> Option<usize> {
        var(name).ok().and_then(|s| s.trim().parse().ok())
    }

    pub fn main() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

        let options = parse_args();
        let stack_size = env_number("SCHEME_STACK_MB")
            .map(|mb| mb << 20)
            .unwrap_or(RECOMMENDED_STACK_SIZE);
        debug!("Running with a {}MB stack", stack_size >> 20);

        // Non-tail recursion in Scheme code is recursion in the evaluator
        let worker = thread::Builder::new()
            .name("scheme".into())
            .stack_size(stack_size)
            .spawn(move || run(options));

        let code = match worker.map(|handle| handle.join()) {
            Ok(Ok(code)) => code,
            Ok(Err(_)) => 101,
            Err(e) => {
                eprintln!("Unable to start the interpreter thread: {}", e);
                1
            }
        };
        process::exit(code);
    }

    fn run(options: Options) -> i32 {
        let mut interpreter = match Interpreter::new(StdHost::new()) {
            Ok(interpreter) => interpreter,
            Err(e) => {
                eprintln!("Error loading the bootstrap library: {}", e);
                return 1;
            }
        };

        if let Some(max_depth) = env_number("SCHEME_MAX_DEPTH") {
            interpreter.set_max_depth(max_depth);
        }

        for file in options.files.iter() {
            match interpreter.load(file) {
                Ok(_) => {}
                Err(ExecutionError::Exit(code)) => return code,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            }
        }

        if !options.files.is_empty() && !options.interactive {
            return 0;
        }

        let result = if options.plain {
            repl(&mut interpreter)
        } else {
            run_repl(&mut interpreter)
        };

        match result {
            Ok(()) => 0,
            Err(ExecutionError::Exit(code)) => code,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        }
    }

    /// Whether `source` can be read without running out of input.
    fn is_complete(source: &str) -> bool {
        let mut datums = Datums::new(Reader::from_str(source));
        loop {
            match datums.next() {
                Ok(Some(_)) => continue,
                Err(ExecutionError::UnexpectedEof) => return false,
                Ok(None) | Err(_) => return true,
            }
        }
    }

    /// Line-edited top level. Lines are accumulated until they hold complete
    /// expressions.
    fn run_repl(interpreter: &mut Interpreter) -> Result<(), ExecutionError> {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                error!("Line editing unavailable ({}), falling back to plain input", e);
                return repl(interpreter);
            }
        };
        let mut pending = String::new();

        loop {
            let prompt = if pending.is_empty() { "> " } else { "... " };
            let line = match rl.readline(prompt) {
                Ok(line) => line,
                Err(ReadlineError::Eof) => return Ok(()),
                Err(ReadlineError::Interrupted) => {
                    pending.clear();
                    continue;
                }
                Err(e) => {
                    error!("Error reading line: {}", e);
                    return Ok(());
                }
            };

            pending.push_str(&line);
            pending.push('\n');

            if !is_complete(&pending) {
                continue;
            }

            match interpret(&pending, interpreter) {
                Ok(value) => println!("{}", stringify(&value, true)),
                Err(ExecutionError::Exit(code)) => return Err(ExecutionError::Exit(code)),
                Err(e) => println!("Error: {}", e),
            }

            let _ = rl.add_history_entry(pending.trim_end());
            pending.clear();
        }
    }
}
