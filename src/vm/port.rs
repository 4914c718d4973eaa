use super::value::Value;
use super::ExecutionError;
use crate::reader::Reader;
use gc::{Finalize, Trace};
use std::io::{BufRead, Write};

/// A source of characters and data.
pub struct InputPort {
    reader: Reader,
}

impl Finalize for InputPort {}
unsafe impl Trace for InputPort {
    unsafe_empty_trace!();
}

impl InputPort {
    pub fn new(source: Box<dyn BufRead>) -> InputPort {
        InputPort {
            reader: Reader::new(source),
        }
    }

    pub fn from_str(source: &str) -> InputPort {
        InputPort {
            reader: Reader::from_str(source),
        }
    }

    pub fn read(&mut self) -> Result<Value, ExecutionError> {
        self.check_open()?;
        self.reader.read()
    }

    pub fn read_char(&mut self) -> Result<Value, ExecutionError> {
        self.check_open()?;
        Ok(self.reader.read_char().map_or(Value::Eof, Value::Character))
    }

    pub fn peek_char(&mut self) -> Result<Value, ExecutionError> {
        self.check_open()?;
        Ok(self.reader.peek_char().map_or(Value::Eof, Value::Character))
    }

    pub fn close(&mut self) {
        self.reader.close();
    }

    fn check_open(&self) -> Result<(), ExecutionError> {
        if self.reader.is_closed() {
            raise!("Input port is closed");
        }
        Ok(())
    }
}

/// A sink of characters. Every write is flushed.
pub struct OutputPort {
    sink: Option<Box<dyn Write>>,
}

impl Finalize for OutputPort {}
unsafe impl Trace for OutputPort {
    unsafe_empty_trace!();
}

impl OutputPort {
    pub fn new(sink: Box<dyn Write>) -> OutputPort {
        OutputPort { sink: Some(sink) }
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), ExecutionError> {
        let sink = match self.sink {
            Some(ref mut sink) => sink,
            None => raise!("Output port is closed"),
        };

        if let Err(e) = sink.write_all(s.as_bytes()).and_then(|_| sink.flush()) {
            raise!("Error writing to port: {}", e);
        }
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.flush() {
                warn!("Error flushing port on close: {}", e);
            }
        }
    }
}
