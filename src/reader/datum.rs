use super::Reader;
use crate::lexer::Token;
use crate::vm::{keywords, ExecutionError, Value};

fn unexpected_eof<T>() -> Result<T, ExecutionError> {
    error!("EOF during read.");
    Err(ExecutionError::UnexpectedEof)
}

pub(super) fn parse_datum(reader: &mut Reader) -> Result<Value, ExecutionError> {
    let kw = keywords();

    loop {
        let abbreviation = match reader.next_token() {
            Token::Open => return parse_list_datum(reader),
            Token::OpenVector => {
                let elements = parse_list_datum(reader)?.to_vec()?;
                return Ok(Value::new_vector(elements));
            }
            Token::Close => {
                warn!("Extra ) ignored.");
                continue;
            }
            Token::Dot => {
                warn!("Extra . ignored.");
                continue;
            }
            Token::Quote => kw.quote,
            Token::BackQuote => kw.quasiquote,
            Token::Comma => kw.unquote,
            Token::CommaAt => kw.unquote_splicing,
            Token::Boolean(b) => return Ok(Value::Boolean(b)),
            Token::Number(n) => return Ok(Value::Number(n)),
            Token::Character(c) => return Ok(Value::Character(c)),
            Token::String(s) => return Ok(Value::new_string(&s)),
            Token::Symbol(s) => return Ok(Value::Symbol(s)),
            Token::Eof => return Ok(Value::Eof),
        };

        let datum = parse_datum(reader)?;
        if datum.is_eof() {
            return unexpected_eof();
        }
        return Ok(Value::list(vec![Value::Symbol(abbreviation), datum]));
    }
}

/// The rest of a list whose `(` was already consumed.
fn parse_list_datum(reader: &mut Reader) -> Result<Value, ExecutionError> {
    let mut elements = Vec::new();

    loop {
        match reader.next_token() {
            Token::Eof => return unexpected_eof(),
            Token::Close => return Ok(Value::list(elements)),
            Token::Dot => {
                let tail = parse_datum(reader)?;
                if tail.is_eof() {
                    return unexpected_eof();
                }
                match reader.next_token() {
                    Token::Close => {}
                    Token::Eof => return unexpected_eof(),
                    token => {
                        warn!("Where's the ')'? Got {:?} after .", token);
                        reader.push_token(token);
                    }
                }
                return Ok(Value::list_star(elements, tail));
            }
            token => {
                reader.push_token(token);
                elements.push(parse_datum(reader)?);
            }
        }
    }
}
