//! Directive tokenizer.
//!
//! Splits text into plain spans and `left + filename + right` directives. The
//! lexer is a synchronous state machine driven by [`Iterator::next`]; nothing
//! runs ahead of the consumer, so dropping a [`Lexer`] midway is always a
//! complete cancellation.

use crate::error::{AssetError, Result};
use std::borrow::Cow;
use std::iter::FusedIterator;
use std::path::Path;

/// Left delimiter used when none is configured
pub const DEFAULT_LEFT_DELIM: &str = "//include(";
/// Right delimiter used when none is configured
pub const DEFAULT_RIGHT_DELIM: &str = ")";

/// The pair of strings that open and close a directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    left: String,
    right: String,
}

impl Delimiters {
    /// Creates a delimiter pair. An empty side falls back to its default.
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        let left = left.into();
        let right = right.into();
        Self {
            left: if left.is_empty() {
                DEFAULT_LEFT_DELIM.to_string()
            } else {
                left
            },
            right: if right.is_empty() {
                DEFAULT_RIGHT_DELIM.to_string()
            } else {
                right
            },
        }
    }

    pub fn left(&self) -> &str {
        &self.left
    }

    pub fn right(&self) -> &str {
        &self.right
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new(DEFAULT_LEFT_DELIM, DEFAULT_RIGHT_DELIM)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    LeftDelim,
    RightDelim,
    FileRef,
    EndOfStream,
    Error,
}

/// A lexed span. For every kind except `Error` the value is a slice of the
/// input; for `Error` it is a description of the problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Byte offset in the input where this token starts
    pub position: usize,
    pub value: Cow<'a, str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Text,
    LeftDelim,
    FileName,
    RightDelim,
    End,
    Done,
}

/// Pull-based directive lexer
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    delimiters: &'a Delimiters,
    state: State,
    pos: usize,
    start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, delimiters: &'a Delimiters) -> Self {
        Self {
            input,
            delimiters,
            state: State::Text,
            pos: 0,
            start: 0,
        }
    }

    fn emit(&mut self, kind: TokenKind) -> Token<'a> {
        let token = Token {
            kind,
            position: self.start,
            value: Cow::Borrowed(&self.input[self.start..self.pos]),
        };
        self.start = self.pos;
        token
    }

    fn error(&mut self, message: &str) -> Token<'a> {
        self.state = State::Done;
        Token {
            kind: TokenKind::Error,
            position: self.start,
            value: Cow::Owned(message.to_string()),
        }
    }

    /// Finds the right delimiter before any line break, returning its offset.
    fn scan_file_name(&self) -> std::result::Result<usize, &'static str> {
        let rest = &self.input[self.pos..];
        let right = self.delimiters.right();
        for (offset, c) in rest.char_indices() {
            if rest[offset..].starts_with(right) {
                return Ok(self.pos + offset);
            }
            if c == '\r' || c == '\n' {
                return Err("unclosed directive: line break before right delimiter");
            }
        }
        Err("unclosed directive: end of input before right delimiter")
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::Text => match self.input[self.pos..].find(self.delimiters.left()) {
                    Some(offset) => {
                        self.pos += offset;
                        self.state = State::LeftDelim;
                        if self.pos > self.start {
                            return Some(self.emit(TokenKind::Text));
                        }
                    }
                    None => {
                        self.pos = self.input.len();
                        self.state = State::End;
                        if self.pos > self.start {
                            return Some(self.emit(TokenKind::Text));
                        }
                    }
                },
                State::LeftDelim => {
                    self.pos += self.delimiters.left().len();
                    self.state = State::FileName;
                    return Some(self.emit(TokenKind::LeftDelim));
                }
                State::FileName => {
                    return match self.scan_file_name() {
                        Ok(end) => {
                            self.pos = end;
                            self.state = State::RightDelim;
                            Some(self.emit(TokenKind::FileRef))
                        }
                        Err(message) => Some(self.error(message)),
                    };
                }
                State::RightDelim => {
                    self.pos += self.delimiters.right().len();
                    self.state = State::Text;
                    return Some(self.emit(TokenKind::RightDelim));
                }
                State::End => {
                    self.state = State::Done;
                    return Some(self.emit(TokenKind::EndOfStream));
                }
                State::Done => return None,
            }
        }
    }
}

impl FusedIterator for Lexer<'_> {}

/// A directive found in some text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The file name between the delimiters
    pub name: String,
    /// Byte offset of the left delimiter
    pub start: usize,
    /// Byte offset just past the right delimiter
    pub end: usize,
}

/// Collects every directive in `input`, in scan order.
///
/// # Errors
///
/// Returns `AssetError::UnterminatedDirective` (attributed to `source`) if a
/// directive is not closed before a line break or the end of input.
pub fn find_references(
    input: &str,
    delimiters: &Delimiters,
    source: &Path,
) -> Result<Vec<Reference>> {
    let mut references = Vec::new();
    let mut open = 0;
    let mut name = String::new();

    for token in Lexer::new(input, delimiters) {
        match token.kind {
            TokenKind::LeftDelim => open = token.position,
            TokenKind::FileRef => name = token.value.into_owned(),
            TokenKind::RightDelim => references.push(Reference {
                name: std::mem::take(&mut name),
                start: open,
                end: token.position + token.value.len(),
            }),
            TokenKind::Error => {
                return Err(AssetError::UnterminatedDirective {
                    path: source.to_path_buf(),
                    position: token.position,
                    message: token.value.into_owned(),
                });
            }
            TokenKind::Text | TokenKind::EndOfStream => {}
        }
    }

    Ok(references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn kinds(input: &str, delimiters: &Delimiters) -> Vec<TokenKind> {
        Lexer::new(input, delimiters).map(|t| t.kind).collect()
    }

    fn braces() -> Delimiters {
        Delimiters::new("{{", "}}")
    }

    #[test]
    fn test_plain_text_only() {
        let delims = braces();
        let tokens: Vec<_> = Lexer::new("body{color:red}", &delims).collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].value, "body{color:red}");
        assert_eq!(tokens[1].kind, TokenKind::EndOfStream);
        assert_eq!(tokens[1].position, 15);
    }

    #[test]
    fn test_empty_input() {
        let delims = braces();
        assert_eq!(kinds("", &delims), vec![TokenKind::EndOfStream]);
    }

    #[test]
    fn test_directive_sequence() {
        let delims = braces();
        let tokens: Vec<_> = Lexer::new("a{{b.js}}c", &delims).collect();
        let summary: Vec<_> = tokens
            .iter()
            .map(|t| (t.kind, t.position, t.value.as_ref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (TokenKind::Text, 0, "a"),
                (TokenKind::LeftDelim, 1, "{{"),
                (TokenKind::FileRef, 3, "b.js"),
                (TokenKind::RightDelim, 7, "}}"),
                (TokenKind::Text, 9, "c"),
                (TokenKind::EndOfStream, 10, ""),
            ]
        );
    }

    #[test]
    fn test_adjacent_directives() {
        let delims = braces();
        assert_eq!(
            kinds("{{a}}{{b}}", &delims),
            vec![
                TokenKind::LeftDelim,
                TokenKind::FileRef,
                TokenKind::RightDelim,
                TokenKind::LeftDelim,
                TokenKind::FileRef,
                TokenKind::RightDelim,
                TokenKind::EndOfStream,
            ]
        );
    }

    #[test]
    fn test_default_delimiters() {
        let delims = Delimiters::new("", "");
        assert_eq!(delims.left(), DEFAULT_LEFT_DELIM);
        assert_eq!(delims.right(), DEFAULT_RIGHT_DELIM);
        assert_eq!(delims, Delimiters::default());

        let refs = find_references("//include(lib.js)\nrun();", &delims, Path::new("app.js"))
            .unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].name, "lib.js");
        assert_eq!(refs[0].start, 0);
        assert_eq!(refs[0].end, 17);
    }

    #[test]
    fn test_unterminated_at_end_of_input() {
        let delims = braces();
        let tokens: Vec<_> = Lexer::new("hello {{file.txt", &delims).collect();
        let last = tokens.last().unwrap();
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.position, 8);
        assert!(last.value.contains("end of input"));
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Text, TokenKind::LeftDelim, TokenKind::Error]
        );
    }

    #[test]
    fn test_unterminated_at_line_break() {
        let delims = braces();
        let mut lexer = Lexer::new("{{file\n.txt}} more", &delims);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::LeftDelim);
        let err = lexer.next().unwrap();
        assert_eq!(err.kind, TokenKind::Error);
        assert!(err.value.contains("line break"));
        assert!(lexer.next().is_none());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_carriage_return_terminates_directive() {
        let delims = braces();
        let kinds = kinds("{{a\r\n}}", &delims);
        assert_eq!(kinds.last(), Some(&TokenKind::Error));
    }

    #[test]
    fn test_empty_file_name() {
        let delims = braces();
        let tokens: Vec<_> = Lexer::new("{{}}", &delims).collect();
        assert_eq!(tokens[1].kind, TokenKind::FileRef);
        assert_eq!(tokens[1].value, "");
    }

    #[test]
    fn test_right_delimiter_in_text_is_plain() {
        let delims = braces();
        assert_eq!(
            kinds("}} stray", &delims),
            vec![TokenKind::Text, TokenKind::EndOfStream]
        );
    }

    #[test]
    fn test_multibyte_text_and_names() {
        let delims = Delimiters::new("«", "»");
        let tokens: Vec<_> = Lexer::new("über «fä.css» ok", &delims).collect();
        assert_eq!(tokens[2].kind, TokenKind::FileRef);
        assert_eq!(tokens[2].value, "fä.css");
    }

    #[test]
    fn test_stops_after_end_of_stream() {
        let delims = braces();
        let mut lexer = Lexer::new("x", &delims);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::Text);
        assert_eq!(lexer.next().unwrap().kind, TokenKind::EndOfStream);
        assert!(lexer.next().is_none());
    }

    #[test]
    fn test_find_references_positions() {
        let delims = braces();
        let input = "A{{one.js}}B{{two.js}}C";
        let refs = find_references(input, &delims, Path::new("x.js")).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(&input[refs[0].start..refs[0].end], "{{one.js}}");
        assert_eq!(refs[1].name, "two.js");
        assert_eq!(&input[refs[1].start..refs[1].end], "{{two.js}}");
    }

    #[test]
    fn test_find_references_unterminated() {
        let delims = braces();
        let result = find_references("ok {{broken", &delims, Path::new("bad.css"));
        assert!(matches!(
            result,
            Err(AssetError::UnterminatedDirective { position: 5, .. })
        ));
    }

    fn delimiter() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("{{".to_string()),
            Just("}}".to_string()),
            Just("%%".to_string()),
            Just("«".to_string()),
            Just("»".to_string()),
            Just("//include(".to_string()),
            Just(")".to_string()),
            "[a-c{}%«»]{1,3}",
        ]
    }

    /// Text with the delimiters spliced in at random points
    fn assemble(parts: &[(u8, String)], delims: &Delimiters) -> String {
        let mut input = String::new();
        for (kind, text) in parts {
            input.push_str(text);
            match *kind {
                1 => input.push_str(delims.left()),
                2 => input.push_str(delims.right()),
                _ => {}
            }
        }
        input
    }

    fn check_partition(input: &str, delims: &Delimiters) -> std::result::Result<(), TestCaseError> {
        let tokens: Vec<_> = Lexer::new(input, delims).collect();
        let last = tokens.last().map(|t| t.kind);
        let errors = tokens.iter().filter(|t| t.kind == TokenKind::Error).count();
        let joined: String = tokens
            .iter()
            .filter(|t| t.kind != TokenKind::Error)
            .map(|t| t.value.as_ref())
            .collect();

        if last == Some(TokenKind::Error) {
            prop_assert_eq!(errors, 1);
            prop_assert!(input.starts_with(&joined));
        } else {
            prop_assert_eq!(errors, 0);
            prop_assert_eq!(last, Some(TokenKind::EndOfStream));
            prop_assert_eq!(joined.as_str(), input);
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_tokens_partition_input(
            left in delimiter(),
            right in delimiter(),
            parts in prop::collection::vec((0u8..3, "[a-c{}%«»( \\n]{0,4}"), 0..12),
        ) {
            let delims = Delimiters::new(left, right);
            let input = assemble(&parts, &delims);
            check_partition(&input, &delims)?;
        }

        #[test]
        fn prop_identical_delimiters_partition_input(
            delim in delimiter(),
            parts in prop::collection::vec((0u8..3, "[a-c«» \\n]{0,4}"), 0..12),
        ) {
            let delims = Delimiters::new(delim.clone(), delim);
            let input = assemble(&parts, &delims);
            check_partition(&input, &delims)?;
        }
    }
}
