//! Reads data from stdin and writes each one back in its external
//! representation, one per line.
use dandy_scheme::reader::{Datums, Reader};
use dandy_scheme::vm::stringify;
use fallible_iterator::FallibleIterator;
use std::io::{stdin, BufReader};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut datums = Datums::new(Reader::new(Box::new(BufReader::new(stdin()))));

    loop {
        match datums.next() {
            Ok(Some(datum)) => println!("{}", stringify(&datum, true)),
            Ok(None) => break,
            Err(e) => {
                println!("Invalid datum: {}", e);
                break;
            }
        }
    }
}
