//! Convert tokens into values
use fallible_iterator::FallibleIterator;
use std::io::BufRead;

mod datum;

use crate::lexer::{next_token, Chars, Token};
use crate::vm::{ExecutionError, Value};

/// A tokenizer over a character source with one token of pushback.
pub struct Reader {
    chars: Chars,
    pushed: Option<Token>,
}

impl Reader {
    pub fn new(source: Box<dyn BufRead>) -> Reader {
        Reader {
            chars: Chars::new(source),
            pushed: None,
        }
    }

    pub fn from_str(source: &str) -> Reader {
        Reader {
            chars: Chars::from_str(source),
            pushed: None,
        }
    }

    /// Reads one datum; `Value::Eof` once the source is exhausted.
    pub fn read(&mut self) -> Result<Value, ExecutionError> {
        datum::parse_datum(self)
    }

    pub fn read_char(&mut self) -> Option<char> {
        self.chars.next_char()
    }

    pub fn peek_char(&mut self) -> Option<char> {
        self.chars.peek_char()
    }

    pub fn close(&mut self) {
        self.pushed = None;
        self.chars.close();
    }

    pub fn is_closed(&self) -> bool {
        self.chars.is_closed()
    }

    fn next_token(&mut self) -> Token {
        match self.pushed.take() {
            Some(token) => token,
            None => next_token(&mut self.chars),
        }
    }

    fn push_token(&mut self, token: Token) {
        self.pushed = Some(token);
    }
}

/// All the data left in a reader, ending at end of file.
pub struct Datums {
    reader: Reader,
}

impl Datums {
    pub fn new(reader: Reader) -> Datums {
        Datums { reader }
    }
}

impl FallibleIterator for Datums {
    type Item = Value;
    type Error = ExecutionError;

    fn next(&mut self) -> Result<Option<Value>, ExecutionError> {
        match self.reader.read()? {
            Value::Eof => Ok(None),
            datum => Ok(Some(datum)),
        }
    }
}
