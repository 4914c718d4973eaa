use super::chars::Chars;
use crate::vm::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open,
    Close,
    OpenVector,
    Quote,
    BackQuote,
    Comma,
    CommaAt,
    Dot,
    Boolean(bool),
    Number(f64),
    Character(char),
    String(String),
    Symbol(Symbol),
    Eof,
}

/// Reads the next token. Malformed input is reported with a warning and
/// skipped, so the only way for tokenizing to stop is `Token::Eof`.
pub fn next_token(chars: &mut Chars) -> Token {
    loop {
        let c = match chars.next_char() {
            Some(c) => c,
            None => return Token::Eof,
        };

        match c {
            c if c.is_whitespace() => continue,
            ';' => skip_comment(chars),
            '(' => return Token::Open,
            ')' => return Token::Close,
            '\'' => return Token::Quote,
            '`' => return Token::BackQuote,
            ',' => {
                return match chars.next_char() {
                    Some('@') => Token::CommaAt,
                    other => {
                        chars.push_back(other);
                        Token::Comma
                    }
                }
            }
            '"' => return read_string(chars),
            '#' => {
                if let Some(token) = read_hash(chars) {
                    return token;
                }
            }
            c => return read_atom(c, chars),
        }
    }
}

fn skip_comment(chars: &mut Chars) {
    loop {
        match chars.next_char() {
            None => return chars.push_back(None),
            Some('\n') | Some('\r') => return,
            Some(_) => {}
        }
    }
}

fn read_string(chars: &mut Chars) -> Token {
    let mut buffer = String::new();

    loop {
        match chars.next_char() {
            Some('"') => break,
            Some('\\') => match chars.next_char() {
                Some(c) => buffer.push(c),
                None => {
                    warn!("EOF inside of a string.");
                    break;
                }
            },
            Some(c) => buffer.push(c),
            None => {
                warn!("EOF inside of a string.");
                break;
            }
        }
    }

    Token::String(buffer)
}

/// `None` means the `#` syntax was consumed without producing a token.
fn read_hash(chars: &mut Chars) -> Option<Token> {
    match chars.next_char() {
        Some('t') | Some('T') => Some(Token::Boolean(true)),
        Some('f') | Some('F') => Some(Token::Boolean(false)),
        Some('(') => Some(Token::OpenVector),
        Some('\\') => Some(read_character(chars)),
        // Exactness and decimal prefixes change nothing for us
        Some('e') | Some('E') | Some('i') | Some('I') | Some('d') | Some('D') => None,
        Some(c @ 'b') | Some(c @ 'B') | Some(c @ 'o') | Some(c @ 'O') | Some(c @ 'x')
        | Some(c @ 'X') => {
            warn!("#{} not implemented, ignored.", c);
            None
        }
        Some(c) => {
            warn!("#{} not recognized, ignored.", c);
            None
        }
        None => {
            warn!("# at end of input, ignored.");
            None
        }
    }
}

fn read_character(chars: &mut Chars) -> Token {
    let first = match chars.next_char() {
        Some(c) => c,
        None => {
            warn!("EOF in character literal.");
            return Token::Eof;
        }
    };

    if !first.is_alphabetic() {
        return Token::Character(first);
    }

    let mut name = String::new();
    name.push(first);
    loop {
        let c = chars.next_char();
        if is_delimiter!(c) {
            chars.push_back(c);
            break;
        }
        name.extend(c);
    }

    if name.chars().count() == 1 {
        return Token::Character(first);
    }

    let c = match &name.to_lowercase()[..] {
        "space" => ' ',
        "newline" => '\n',
        _ => {
            warn!("Unknown character name #\\{}, read as #\\{}.", name, first);
            first
        }
    };
    Token::Character(c)
}

fn read_atom(first: char, chars: &mut Chars) -> Token {
    let mut buffer = String::new();
    buffer.push(first);

    loop {
        let c = chars.next_char();
        if is_delimiter!(c) {
            chars.push_back(c);
            break;
        }
        buffer.extend(c);
    }

    if buffer == "." {
        return Token::Dot;
    }

    if starts_number!(first) {
        if let Some(n) = parse_number(&buffer) {
            return Token::Number(n);
        }
    }

    Token::Symbol(Symbol::intern(&buffer.to_lowercase()))
}

/// Decimal numbers only: `inf`, `nan` and friends stay symbols.
pub fn parse_number(s: &str) -> Option<f64> {
    let has_digit = s.chars().any(|c| c.is_ascii_digit());
    let all_numeric = s.chars().all(|c| match c {
        '0'..='9' | '+' | '-' | '.' | 'e' | 'E' => true,
        _ => false,
    });

    if has_digit && all_numeric {
        s.parse::<f64>().ok()
    } else {
        None
    }
}
