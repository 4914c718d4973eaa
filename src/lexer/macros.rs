macro_rules! is_delimiter {
    ($x:expr) => {
        match $x {
            None => true,
            Some(y) => {
                y.is_whitespace()
                    || y == '('
                    || y == ')'
                    || y == '\''
                    || y == ';'
                    || y == '"'
                    || y == ','
                    || y == '`'
            }
        }
    };
}

macro_rules! starts_number {
    ($c:expr) => {
        match $c {
            '0'..='9' | '+' | '-' | '.' => true,
            _ => false,
        }
    };
}
