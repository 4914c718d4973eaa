//! Convert characters into tokens
#[macro_use]
mod macros;

mod chars;
mod token;


pub use self::chars::Chars;
pub use self::token::{next_token, parse_number, Token};
