use crate::error::ParseError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifiers and keywords alike; the parser decides which is which.
    Word(String),
    Number(String),
    /// Raw text including the quotes.
    String(String),
    Punct(&'static str),
    Eof,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// A line terminator appeared between this token and the previous one.
    pub newline_before: bool,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Word(w) => format!("'{w}'"),
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::String(s) => format!("string {s}"),
            TokenKind::Punct(p) => format!("'{p}'"),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

// Longest first so that the first match wins.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "=>", "==", "!=", "<=", ">=", "&&",
    "||", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "**", "<<", ">>",
    "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%", "&", "|", "^", "!",
    "~", "?", ":", "=", ".",
];

/// Keywords after which a `/` starts an expression rather than dividing.
const OPERATOR_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Whether a `/` following `previous` would begin a regular expression.
fn starts_regex(previous: Option<&Token>) -> bool {
    match previous.map(|t| &t.kind) {
        None => true,
        Some(TokenKind::Punct(p)) => !matches!(*p, ")" | "]" | "}" | "++" | "--"),
        Some(TokenKind::Word(w)) => OPERATOR_KEYWORDS.contains(&w.as_str()),
        Some(_) => false,
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    /// Skip whitespace and comments, reporting whether a line break was seen.
    fn skip_trivia(&mut self) -> Result<bool, ParseError> {
        let mut newline = false;
        loop {
            match (self.current_char(), self.peek_char()) {
                (Some(ch), _) if ch.is_whitespace() => {
                    newline |= is_line_terminator(ch);
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    while let Some(ch) = self.current_char() {
                        if is_line_terminator(ch) {
                            break;
                        }
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.advance();
                    self.advance();
                    loop {
                        match (self.current_char(), self.peek_char()) {
                            (Some('*'), Some('/')) => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            (Some(ch), _) => {
                                newline |= is_line_terminator(ch);
                                self.advance();
                            }
                            (None, _) => {
                                return Err(ParseError::Unterminated {
                                    what: "comment",
                                    line,
                                    column,
                                })
                            }
                        }
                    }
                }
                _ => return Ok(newline),
            }
        }
    }

    fn read_number(&mut self) -> String {
        let mut raw = String::new();
        let radix_prefix = self.current_char() == Some('0')
            && matches!(
                self.peek_char(),
                Some('x' | 'X' | 'o' | 'O' | 'b' | 'B')
            );
        if radix_prefix {
            for _ in 0..2 {
                raw.extend(self.advance());
            }
            while let Some(ch) = self.current_char() {
                if !ch.is_ascii_alphanumeric() && ch != '_' {
                    break;
                }
                raw.push(ch);
                self.advance();
            }
            return raw;
        }

        self.read_digits(&mut raw);
        if self.current_char() == Some('.') {
            raw.push('.');
            self.advance();
            self.read_digits(&mut raw);
        }
        if matches!(self.current_char(), Some('e' | 'E')) {
            let signed = matches!(self.peek_char(), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            let has_digit = self
                .input
                .get(self.position + digit_at)
                .is_some_and(|c| c.is_ascii_digit());
            if has_digit {
                raw.extend(self.advance());
                if signed {
                    raw.extend(self.advance());
                }
                self.read_digits(&mut raw);
            }
        }
        raw
    }

    fn read_digits(&mut self, raw: &mut String) {
        while let Some(ch) = self.current_char() {
            if !ch.is_ascii_digit() && ch != '_' {
                break;
            }
            raw.push(ch);
            self.advance();
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, ParseError> {
        let (line, column) = (self.line, self.column);
        let mut raw = String::new();
        raw.extend(self.advance());
        loop {
            match self.advance() {
                Some('\\') => {
                    raw.push('\\');
                    match self.advance() {
                        Some(ch) => raw.push(ch),
                        None => break,
                    }
                }
                Some(ch) if ch == quote => {
                    raw.push(ch);
                    return Ok(raw);
                }
                Some(ch) if is_line_terminator(ch) => break,
                Some(ch) => raw.push(ch),
                None => break,
            }
        }
        Err(ParseError::Unterminated {
            what: "string literal",
            line,
            column,
        })
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.current_char() {
            if !is_ident_part(ch) {
                break;
            }
            word.push(ch);
            self.advance();
        }
        word
    }

    fn read_punct(&mut self) -> Option<&'static str> {
        let punct = PUNCTUATORS.iter().copied().find(|p| {
            p.chars()
                .enumerate()
                .all(|(i, c)| self.input.get(self.position + i) == Some(&c))
        })?;
        for _ in 0..punct.chars().count() {
            self.advance();
        }
        Some(punct)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let newline_before = self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            let Some(ch) = self.current_char() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    newline_before: true,
                    line,
                    column,
                });
                return Ok(tokens);
            };

            let starts_fraction = ch == '.' && self.peek_char().is_some_and(|c| c.is_ascii_digit());
            let kind = if ch.is_ascii_digit() || starts_fraction {
                TokenKind::Number(self.read_number())
            } else if ch == '"' || ch == '\'' {
                TokenKind::String(self.read_string(ch)?)
            } else if ch == '`' {
                return Err(ParseError::Unsupported {
                    what: "template literal",
                    line,
                    column,
                });
            } else if ch == '/' && starts_regex(tokens.last()) {
                return Err(ParseError::Unsupported {
                    what: "regular expression",
                    line,
                    column,
                });
            } else if is_ident_start(ch) {
                TokenKind::Word(self.read_word())
            } else if let Some(p) = self.read_punct() {
                TokenKind::Punct(p)
            } else {
                return Err(ParseError::UnexpectedChar { ch, line, column });
            };

            tokens.push(Token {
                kind,
                newline_before,
                line,
                column,
            });
        }
    }
}

fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_ident_part(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("lexing should succeed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keeps_numeric_spellings() {
        let numbers: Vec<String> = kinds("0x0 01000 08 1E+02 1.00 .5 2.2250738585072011e-308")
            .into_iter()
            .filter_map(|k| match k {
                TokenKind::Number(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(
            numbers,
            ["0x0", "01000", "08", "1E+02", "1.00", ".5", "2.2250738585072011e-308"]
        );
    }

    #[test]
    fn regex_literal_is_unsupported_but_division_is_not() {
        for source in ["var r = /\\d+/g;", "return /a'b/.test(s);", "f(/x/)"] {
            assert!(
                matches!(
                    tokenize(source),
                    Err(ParseError::Unsupported {
                        what: "regular expression",
                        ..
                    })
                ),
                "{source}"
            );
        }
        assert!(tokenize("a / b / (c) / d[0] / 2").is_ok());
    }

    #[test]
    fn longest_punctuator_wins() {
        assert_eq!(
            kinds("a >>>= b"),
            vec![
                TokenKind::Word("a".into()),
                TokenKind::Punct(">>>="),
                TokenKind::Word("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_line_breaks_across_comments() {
        let tokens = tokenize("a /* one\ntwo */ b // tail\nc").expect("lexing should succeed");
        let flags: Vec<bool> = tokens.iter().map(|t| t.newline_before).collect();
        assert_eq!(flags, vec![false, true, true, true]);
    }

    #[test]
    fn rejects_unterminated_string() {
        assert!(matches!(
            tokenize("'abc"),
            Err(ParseError::Unterminated { what: "string literal", .. })
        ));
    }
}
