use std::collections::VecDeque;
use std::io::{BufRead, Cursor};

/// A character source reading its underlying stream one line at a time.
///
/// A single character (or the end of input) may be pushed back and will be
/// returned by the next call to `next_char`.
pub struct Chars {
    source: Option<Box<dyn BufRead>>,
    line: VecDeque<char>,
    pushed: Option<Option<char>>,
}

impl Chars {
    pub fn new(source: Box<dyn BufRead>) -> Chars {
        Chars {
            source: Some(source),
            line: VecDeque::new(),
            pushed: None,
        }
    }

    pub fn from_str(s: &str) -> Chars {
        Chars::new(Box::new(Cursor::new(s.to_owned().into_bytes())))
    }

    pub fn next_char(&mut self) -> Option<char> {
        if let Some(c) = self.pushed.take() {
            return c;
        }

        loop {
            if let Some(c) = self.line.pop_front() {
                return Some(c);
            }
            if !self.fill() {
                return None;
            }
        }
    }

    pub fn push_back(&mut self, c: Option<char>) {
        debug_assert!(self.pushed.is_none(), "only one character of pushback");
        self.pushed = Some(c);
    }

    pub fn peek_char(&mut self) -> Option<char> {
        let c = self.next_char();
        self.push_back(c);
        c
    }

    pub fn close(&mut self) {
        self.source = None;
        self.line.clear();
        self.pushed = None;
    }

    pub fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    fn fill(&mut self) -> bool {
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return false,
        };

        let mut buffer = String::new();
        match source.read_line(&mut buffer) {
            Ok(0) => false,
            Ok(_) => {
                self.line.extend(buffer.chars());
                true
            }
            Err(e) => {
                warn!("Error reading input, treating it as end of file: {}", e);
                false
            }
        }
    }
}
