//! Tokenizer for the selection-set sublanguage (spec §4.6).

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Int(i64),
    Dollar,
    DotDot,
    Comma,
    Pipe,
    Amp,
    Tilde,
    Question,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon(i64),
    Name(String, Option<u32>),
    Regex(String, String),
    Visibility(char),
    Function(String),
    /// A bare word, used only inside `[path]` path-set literals.
    Word(String),
    Eof,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '*')
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { chars: src.char_indices().peekable(), src }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    pub fn tokenize(mut self) -> anyhow::Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some((start, c)) = self.chars.next() else {
                tokens.push(Token::Eof);
                return Ok(tokens);
            };
            match c {
                '$' => tokens.push(Token::Dollar),
                ',' => tokens.push(Token::Comma),
                '|' => tokens.push(Token::Pipe),
                '&' => tokens.push(Token::Amp),
                '~' => tokens.push(Token::Tilde),
                '?' => tokens.push(Token::Question),
                '(' => tokens.push(Token::LParen),
                ')' => tokens.push(Token::RParen),
                '[' => tokens.push(Token::LBracket),
                ']' => tokens.push(Token::RBracket),
                '.' => {
                    if self.peek_char() == Some('.') {
                        self.chars.next();
                        tokens.push(Token::DotDot);
                    } else {
                        anyhow::bail!("unexpected '.' at byte {start}");
                    }
                }
                ':' => {
                    let digits = self.take_while(|c| c.is_ascii_digit());
                    let n: i64 = digits.parse().map_err(|_| anyhow::anyhow!("expected digits after ':' at byte {start}"))?;
                    tokens.push(Token::Colon(n));
                }
                '<' => {
                    let name = self.take_until('>')?;
                    let ordinal = self.maybe_ordinal();
                    tokens.push(Token::Name(name, ordinal));
                }
                '/' => {
                    let pattern = self.take_until('/')?;
                    let flags = self.take_while(|c| c.is_ascii_alphabetic());
                    tokens.push(Token::Regex(pattern, flags));
                }
                '=' => {
                    let Some((_, flag)) = self.chars.next() else {
                        anyhow::bail!("expected visibility flag after '=' at byte {start}");
                    };
                    tokens.push(Token::Visibility(flag));
                }
                '@' => {
                    let name = self.take_while(|c| c.is_ascii_alphabetic());
                    tokens.push(Token::Function(name));
                }
                c if c.is_ascii_digit() => {
                    let mut digits = c.to_string();
                    digits.push_str(&self.take_while(|c| c.is_ascii_digit()));
                    tokens.push(Token::Int(digits.parse()?));
                }
                c if is_word_char(c) => {
                    let mut word = c.to_string();
                    word.push_str(&self.take_while(is_word_char));
                    tokens.push(Token::Word(word));
                }
                other => anyhow::bail!("unexpected character '{other}' at byte {start}"),
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek_char() {
            if pred(c) {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }

    fn take_until(&mut self, delim: char) -> anyhow::Result<String> {
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == delim => return Ok(out),
                Some((_, c)) => out.push(c),
                None => anyhow::bail!("unterminated token in '{}', expected '{delim}'", self.src),
            }
        }
    }

    fn maybe_ordinal(&mut self) -> Option<u32> {
        if self.peek_char() == Some('#') {
            self.chars.next();
            let digits = self.take_while(|c| c.is_ascii_digit());
            digits.parse().ok()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_range_and_set_ops() {
        let tokens = Lexer::new("1..3|~:4").tokenize().unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Int(1),
                Token::DotDot,
                Token::Int(3),
                Token::Pipe,
                Token::Tilde,
                Token::Colon(4),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_named_ref_with_ordinal() {
        let tokens = Lexer::new("<master#2>").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::Name("master".to_string(), Some(2)), Token::Eof]);
    }

    #[test]
    fn tokenizes_regex_with_flags() {
        let tokens = Lexer::new("/fix.*bug/ci").tokenize().unwrap();
        assert_eq!(tokens, vec![Token::Regex("fix.*bug".to_string(), "ci".to_string()), Token::Eof]);
    }
}
