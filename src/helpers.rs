/// Joins two independent results, keeping the first error.
pub trait Tuple2Helper<A, B, E> {
    fn result(self) -> Result<(A, B), E>;
}

impl<A, B, E> Tuple2Helper<A, B, E> for (Result<A, E>, Result<B, E>) {
    fn result(self) -> Result<(A, B), E> {
        match (self.0, self.1) {
            (Ok(a), Ok(b)) => Ok((a, b)),
            (Err(e), _) | (_, Err(e)) => Err(e),
        }
    }
}

//
// Macros
//

/// Logs and returns a `Failed` error from the enclosing function.
macro_rules! raise {
    ($($arg:tt)*) => (return $crate::vm::raise(format!($($arg)*)))
}

/// Returns early with the given value when it is `Some`.
macro_rules! ret_some {
    ($x:expr) => {
        if let Some(value) = $x {
            return Ok(value);
        }
    };
}
