//! Tokeniser for the build-definition language.
//!
//! Newlines are significant statement terminators except inside `()`, `[]`
//! and `{}`. Comments are kept as tokens so that the formatter can preserve
//! them; the parser decides where each one belongs.

use super::error::SyntaxError;
use crate::ast::{Span, StringKind};

/// A lexical token and the source region it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Token variant.
    pub kind: TokenKind,
    /// Source region.
    pub span: Span,
}

/// Token variants.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier that is not a keyword.
    Ident(String),
    /// Integer literal.
    Int(i64),
    /// String literal with decoded contents.
    Str {
        /// Decoded contents.
        value: String,
        /// Quoting style.
        style: StringKind,
    },
    /// `# ...`
    Comment {
        /// Comment text including the `#`, without trailing whitespace.
        text: String,
        /// Whether only whitespace precedes the comment on its line.
        own_line: bool,
    },
    /// `true`
    True,
    /// `false`
    False,
    /// `if`
    If,
    /// `elif`
    Elif,
    /// `else`
    Else,
    /// `endif`
    Endif,
    /// `and`
    And,
    /// `or`
    Or,
    /// `not`
    Not,
    /// `foreach`
    Foreach,
    /// `endforeach`
    Endforeach,
    /// `in`
    In,
    /// `continue`
    Continue,
    /// `break`
    Break,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `:`
    Colon,
    /// `?`
    Question,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `%`
    Percent,
    /// `=`
    Assign,
    /// `+=`
    PlusAssign,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// End of a logical line.
    Newline,
    /// End of input.
    Eof,
}

impl TokenKind {
    /// Short human-readable description used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier \"{name}\""),
            Self::Int(value) => format!("number {value}"),
            Self::Str { .. } => "string".to_owned(),
            Self::Comment { .. } => "comment".to_owned(),
            Self::Newline => "end of line".to_owned(),
            Self::Eof => "end of file".to_owned(),
            other => format!("\"{}\"", other.spelling()),
        }
    }

    fn spelling(&self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::If => "if",
            Self::Elif => "elif",
            Self::Else => "else",
            Self::Endif => "endif",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Foreach => "foreach",
            Self::Endforeach => "endforeach",
            Self::In => "in",
            Self::Continue => "continue",
            Self::Break => "break",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Comma => ",",
            Self::Dot => ".",
            Self::Colon => ":",
            Self::Question => "?",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Assign => "=",
            Self::PlusAssign => "+=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            _ => "",
        }
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    Some(match word {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "if" => TokenKind::If,
        "elif" => TokenKind::Elif,
        "else" => TokenKind::Else,
        "endif" => TokenKind::Endif,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "foreach" => TokenKind::Foreach,
        "endforeach" => TokenKind::Endforeach,
        "in" => TokenKind::In,
        "continue" => TokenKind::Continue,
        "break" => TokenKind::Break,
        _ => return None,
    })
}

/// Split `src` into tokens, always ending with [`TokenKind::Eof`].
///
/// # Errors
///
/// Returns a [`SyntaxError`] for unknown characters, double-quoted or
/// unterminated strings, malformed numbers and unbalanced brackets.
pub fn tokenize(src: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(src).run()
}

struct Lexer<'src> {
    src: &'src str,
    pos: usize,
    open: Vec<(char, Span)>,
    line_start: bool,
    tokens: Vec<Token>,
}

impl<'src> Lexer<'src> {
    fn new(src: &'src str) -> Self {
        Self {
            src,
            pos: 0,
            open: Vec::new(),
            line_start: true,
            tokens: Vec::new(),
        }
    }

    fn rest(&self) -> &'src str {
        self.src.get(self.pos..).unwrap_or("")
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
        });
        self.line_start = false;
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while let Some(c) = self.peek() {
            let start = self.pos;
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    if self.open.is_empty() {
                        self.push(TokenKind::Newline, start);
                    }
                    self.line_start = true;
                }
                '\\' if self.rest().starts_with("\\\n") => {
                    self.pos += 2;
                }
                '\\' if self.rest().starts_with("\\\r\n") => {
                    self.pos += 3;
                }
                '#' => self.comment(start),
                '\'' => self.string(start, false)?,
                'f' if self.peek_nth(1) == Some('\'') => {
                    self.bump();
                    self.string(start, true)?;
                }
                c if c == '_' || c.is_ascii_alphabetic() => self.word(start),
                c if c.is_ascii_digit() => self.number(start)?,
                '"' => {
                    return Err(SyntaxError::new(
                        "Double quotes are not supported. Use single quotes.",
                        Span::new(start, start + 1),
                    ));
                }
                _ => self.punct(start, c)?,
            }
        }
        if let Some((_, span)) = self.open.last() {
            return Err(SyntaxError::new("Unclosed bracket", *span)
                .with_label("opened here")
                .with_help("add the matching closing bracket before the end of the file"));
        }
        let end = self.src.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end, end),
        });
        Ok(self.tokens)
    }

    fn comment(&mut self, start: usize) {
        let line = self.rest().split('\n').next().unwrap_or("");
        self.pos += line.len();
        let own_line = self.line_start;
        let text = line.trim_end().to_owned();
        self.push(TokenKind::Comment { text, own_line }, start);
    }

    fn word(&mut self, start: usize) {
        while self
            .peek()
            .is_some_and(|c| c == '_' || c.is_ascii_alphanumeric())
        {
            self.bump();
        }
        let text = self.src.get(start..self.pos).unwrap_or("");
        let kind = keyword(text).unwrap_or_else(|| TokenKind::Ident(text.to_owned()));
        self.push(kind, start);
    }

    fn number(&mut self, start: usize) -> Result<(), SyntaxError> {
        let radix = match (self.peek(), self.peek_nth(1)) {
            (Some('0'), Some('x' | 'X')) => 16,
            (Some('0'), Some('o' | 'O')) => 8,
            (Some('0'), Some('b' | 'B')) => 2,
            _ => 10,
        };
        if radix != 10 {
            self.pos += 2;
        }
        let digits_start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric()) {
            self.bump();
        }
        let span = Span::new(start, self.pos);
        let digits = self.src.get(digits_start..self.pos).unwrap_or("");
        if radix == 10 && digits.len() > 1 && digits.starts_with('0') {
            return Err(SyntaxError::new(
                "Leading zeros are not allowed in decimal integers",
                span,
            )
            .with_help("use the 0o prefix for octal numbers"));
        }
        let value = i64::from_str_radix(digits, radix).map_err(|_| {
            SyntaxError::new(format!("Invalid integer literal \"{}\"", self.src.get(start..self.pos).unwrap_or_default()), span)
        })?;
        self.push(TokenKind::Int(value), start);
        Ok(())
    }

    fn string(&mut self, start: usize, format: bool) -> Result<(), SyntaxError> {
        if self.rest().starts_with("'''") {
            self.pos += 3;
            let Some(len) = self.rest().find("'''") else {
                return Err(SyntaxError::new(
                    "Unterminated multiline string",
                    Span::new(start, self.pos),
                ));
            };
            let value = self.rest().get(..len).unwrap_or("").to_owned();
            self.pos += len + 3;
            let style = if format {
                StringKind::FormatMultiline
            } else {
                StringKind::Multiline
            };
            self.push(TokenKind::Str { value, style }, start);
            return Ok(());
        }
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(SyntaxError::new(
                        "Unterminated string",
                        Span::new(start, self.pos),
                    ));
                }
                Some('\n') => {
                    return Err(SyntaxError::new(
                        "Newline character in a string detected",
                        Span::new(start, self.pos),
                    )
                    .with_help("use ''' (three single quotes) for multiline strings instead"));
                }
                Some('\'') => break,
                Some('\\') => self.escape(&mut value)?,
                Some(c) => value.push(c),
            }
        }
        let style = if format {
            StringKind::Format
        } else {
            StringKind::Plain
        };
        self.push(TokenKind::Str { value, style }, start);
        Ok(())
    }

    fn escape(&mut self, out: &mut String) -> Result<(), SyntaxError> {
        let at = self.pos.saturating_sub(1);
        let Some(c) = self.peek() else {
            out.push('\\');
            return Ok(());
        };
        let simple = match c {
            '\\' => Some('\\'),
            '\'' => Some('\''),
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            'f' => Some('\x0c'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'v' => Some('\x0b'),
            _ => None,
        };
        if let Some(decoded) = simple {
            self.bump();
            out.push(decoded);
            return Ok(());
        }
        let (radix, width) = match c {
            '0'..='7' => (8, 3),
            'x' => (16, 2),
            'u' => (16, 4),
            'U' => (16, 8),
            'N' => {
                return Err(SyntaxError::new(
                    "Named unicode escapes are not supported",
                    Span::new(at, self.pos + 1),
                ));
            }
            _ => {
                // Unknown escapes are kept verbatim.
                out.push('\\');
                return Ok(());
            }
        };
        if radix == 16 {
            self.bump();
        }
        let digits_start = self.pos;
        let mut taken = 0;
        while taken < width && self.peek().is_some_and(|d| d.is_digit(radix)) {
            self.bump();
            taken += 1;
        }
        let digits = self.src.get(digits_start..self.pos).unwrap_or("");
        let span = Span::new(at, self.pos);
        if radix == 16 && taken != width {
            return Err(SyntaxError::new("Truncated escape sequence", span));
        }
        let decoded = u32::from_str_radix(digits, radix)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| SyntaxError::new("Invalid escape sequence", span))?;
        out.push(decoded);
        Ok(())
    }

    fn punct(&mut self, start: usize, c: char) -> Result<(), SyntaxError> {
        let two = match (c, self.peek_nth(1)) {
            ('+', Some('=')) => Some(TokenKind::PlusAssign),
            ('=', Some('=')) => Some(TokenKind::Eq),
            ('!', Some('=')) => Some(TokenKind::Ne),
            ('<', Some('=')) => Some(TokenKind::Le),
            ('>', Some('=')) => Some(TokenKind::Ge),
            _ => None,
        };
        if let Some(kind) = two {
            self.pos += 2;
            self.push(kind, start);
            return Ok(());
        }
        self.bump();
        let span = Span::new(start, self.pos);
        let kind = match c {
            '(' | '[' | '{' => {
                self.open.push((c, span));
                match c {
                    '(' => TokenKind::LParen,
                    '[' => TokenKind::LBracket,
                    _ => TokenKind::LBrace,
                }
            }
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match self.open.pop() {
                    Some((open, _)) if open == expected => {}
                    _ => {
                        return Err(SyntaxError::new(
                            format!("Unbalanced closing bracket '{c}'"),
                            span,
                        ));
                    }
                }
                match c {
                    ')' => TokenKind::RParen,
                    ']' => TokenKind::RBracket,
                    _ => TokenKind::RBrace,
                }
            }
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Assign,
            '<' => TokenKind::Lt,
            '>' => TokenKind::Gt,
            other => {
                return Err(SyntaxError::new(
                    format!("Unexpected character '{other}'"),
                    span,
                ));
            }
        };
        self.push(kind, start);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src)
            .expect("tokenize")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[rstest]
    #[case("0x1F", 31)]
    #[case("0o17", 15)]
    #[case("0b101", 5)]
    #[case("0", 0)]
    #[case("42", 42)]
    fn integers_in_every_radix(#[case] src: &str, #[case] expected: i64) {
        assert_eq!(kinds(src), vec![TokenKind::Int(expected), TokenKind::Eof]);
    }

    #[rstest]
    #[case(r"'a\nb'", "a\nb")]
    #[case(r"'it\'s'", "it's")]
    #[case(r"'\x41é'", "Aé")]
    #[case(r"'\101'", "A")]
    #[case(r"'\q'", "\\q")]
    fn escapes_are_decoded(#[case] src: &str, #[case] expected: &str) {
        let tokens = kinds(src);
        let Some(TokenKind::Str { value, style }) = tokens.first() else {
            panic!("expected string, got {tokens:?}");
        };
        assert_eq!(value, expected);
        assert_eq!(*style, StringKind::Plain);
    }

    #[test]
    fn multiline_strings_are_verbatim() {
        let tokens = kinds("'''a\\n\nb'''");
        assert_eq!(
            tokens.first(),
            Some(&TokenKind::Str {
                value: "a\\n\nb".into(),
                style: StringKind::Multiline
            })
        );
    }

    #[test]
    fn newlines_inside_brackets_are_dropped() {
        let tokens = kinds("f(\n1,\n)\nx");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("f".into()),
                TokenKind::LParen,
                TokenKind::Int(1),
                TokenKind::Comma,
                TokenKind::RParen,
                TokenKind::Newline,
                TokenKind::Ident("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_record_line_position() {
        let tokens = kinds("# head\nx = 1 # tail\n");
        assert!(tokens.contains(&TokenKind::Comment {
            text: "# head".into(),
            own_line: true
        }));
        assert!(tokens.contains(&TokenKind::Comment {
            text: "# tail".into(),
            own_line: false
        }));
    }

    #[test]
    fn line_continuation_joins_lines() {
        assert_eq!(
            kinds("a = \\\n 1"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Assign,
                TokenKind::Int(1),
                TokenKind::Eof,
            ]
        );
    }

    #[rstest]
    #[case("\"x\"", "Double quotes")]
    #[case("'abc", "Unterminated string")]
    #[case("'a\nb'", "Newline character")]
    #[case("f(]", "Unbalanced closing bracket")]
    #[case("[1, 2", "Unclosed bracket")]
    #[case("a ! b", "Unexpected character")]
    #[case("012", "Leading zeros")]
    fn lexical_errors(#[case] src: &str, #[case] needle: &str) {
        let err = tokenize(src).expect_err("should fail");
        assert!(err.message.contains(needle), "{}", err.message);
    }
}
