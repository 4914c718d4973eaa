//! What the interpreter needs from the world outside of it.
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::time::{Duration, Instant};

/// Capabilities injected into an [`Interpreter`](super::Interpreter).
pub trait Host {
    /// Source of the initial current input port.
    fn stdin(&self) -> Box<dyn BufRead>;
    /// Sink of the initial current output port.
    fn stdout(&self) -> Box<dyn Write>;
    fn open_input(&self, path: &str) -> io::Result<Box<dyn BufRead>>;
    fn open_output(&self, path: &str) -> io::Result<Box<dyn Write>>;
    /// Called by `(exit)`. Hosts that return get an `Exit` error unwound to
    /// the top level instead.
    fn exit(&self, code: i32);
    /// Monotonic time since some fixed point.
    fn elapsed(&self) -> Duration;
    fn bytes_allocated(&self) -> u64 {
        super::gc::bytes_allocated()
    }
}

/// The process' standard streams and file system.
pub struct StdHost {
    start: Instant,
}

impl StdHost {
    pub fn new() -> StdHost {
        StdHost {
            start: Instant::now(),
        }
    }
}

impl Default for StdHost {
    fn default() -> StdHost {
        StdHost::new()
    }
}

impl Host for StdHost {
    fn stdin(&self) -> Box<dyn BufRead> {
        Box::new(BufReader::new(io::stdin()))
    }

    fn stdout(&self) -> Box<dyn Write> {
        Box::new(io::stdout())
    }

    fn open_input(&self, path: &str) -> io::Result<Box<dyn BufRead>> {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }

    fn open_output(&self, path: &str) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }

    fn exit(&self, code: i32) {
        info!("Exiting with code {}", code);
        std::process::exit(code)
    }

    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
