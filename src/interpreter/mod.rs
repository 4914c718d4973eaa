//! Drivers on top of the evaluator.
use crate::reader::Reader;
use crate::vm::{stringify, ExecutionError, Interpreter, Value};

/// Evaluates every expression in `code` in the global environment, returning
/// the value of the last one.
pub fn interpret(code: &str, interpreter: &mut Interpreter) -> Result<Value, ExecutionError> {
    interpreter.run(Reader::from_str(code))
}

/// The top-level loop over the current ports: prompt, read, evaluate,
/// print. A failing expression only aborts itself; the loop ends at the end
/// of the input or on `(exit)`.
pub fn repl(interpreter: &mut Interpreter) -> Result<(), ExecutionError> {
    let input = interpreter.input_port();
    let output = interpreter.output_port();

    loop {
        output.borrow_mut().write_str("> ")?;

        let datum = match input.borrow_mut().read() {
            Ok(Value::Eof) | Err(ExecutionError::UnexpectedEof) => return Ok(()),
            Ok(datum) => datum,
            Err(e) => {
                output.borrow_mut().write_str(&format!("Error: {}\n", e))?;
                continue;
            }
        };

        match interpreter.eval_global(datum) {
            Ok(value) => {
                let printed = stringify(&value, true);
                output.borrow_mut().write_str(&printed)?;
                output.borrow_mut().write_str("\n")?;
            }
            Err(ExecutionError::Exit(code)) => return Err(ExecutionError::Exit(code)),
            Err(e) => {
                output.borrow_mut().write_str(&format!("Error: {}\n", e))?;
            }
        }
    }
}

#[cfg(test)]
mod test;
