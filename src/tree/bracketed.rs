//! Penn-style bracketed tree reader
//!
//! `(ROOT (NP (NN dog)))`. An unlabeled outer bracket wrapping a single
//! tree, as in `( (S ...) )`, is unwrapped.

use super::Tree;
use thiserror::Error;

/// Errors from the bracketed tree reader
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeParseError {
    /// Input ended inside an open bracket
    #[error("unexpected end of input (unclosed bracket)")]
    UnexpectedEnd,

    /// Token that cannot appear at this position
    #[error("unexpected token '{token}' at byte {position}")]
    UnexpectedToken {
        /// Offending token
        token: String,
        /// Byte offset of the token
        position: usize,
    },

    /// No tree found
    #[error("input contains no tree")]
    EmptyInput,

    /// A single-tree parse found more input after the tree
    #[error("trailing input after tree at byte {position}")]
    TrailingInput {
        /// Byte offset of the first trailing token
        position: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Open,
    Close,
    Atom(&'a str),
}

fn tokenize(input: &str) -> Vec<(usize, Token<'_>)> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'(' => {
                tokens.push((pos, Token::Open));
                pos += 1;
            }
            b')' => {
                tokens.push((pos, Token::Close));
                pos += 1;
            }
            b if b.is_ascii_whitespace() => pos += 1,
            _ => {
                let start = pos;
                while pos < bytes.len()
                    && !bytes[pos].is_ascii_whitespace()
                    && bytes[pos] != b'('
                    && bytes[pos] != b')'
                {
                    pos += 1;
                }
                tokens.push((start, Token::Atom(&input[start..pos])));
            }
        }
    }
    tokens
}

struct Reader<'a> {
    tokens: Vec<(usize, Token<'a>)>,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn peek(&self) -> Option<&(usize, Token<'a>)> {
        self.tokens.get(self.pos)
    }

    fn read_tree(&mut self) -> Result<Tree, TreeParseError> {
        let (offset, token) = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(TreeParseError::UnexpectedEnd)?;
        self.pos += 1;

        match token {
            Token::Atom(word) => Ok(Tree::leaf(word)),
            Token::Close => Err(TreeParseError::UnexpectedToken {
                token: ")".to_string(),
                position: offset,
            }),
            Token::Open => {
                let label = match self.peek() {
                    Some((_, Token::Atom(label))) => {
                        let label = label.to_string();
                        self.pos += 1;
                        label
                    }
                    _ => String::new(),
                };

                let mut children = Vec::new();
                loop {
                    match self.peek() {
                        None => return Err(TreeParseError::UnexpectedEnd),
                        Some((_, Token::Close)) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => children.push(self.read_tree()?),
                    }
                }

                if label.is_empty() && children.len() == 1 {
                    return Ok(children.remove(0));
                }
                if children.is_empty() {
                    return Err(TreeParseError::UnexpectedToken {
                        token: ")".to_string(),
                        position: offset,
                    });
                }
                Ok(Tree::new(label, children))
            }
        }
    }
}

/// Parse exactly one bracketed tree
pub fn parse_tree(input: &str) -> Result<Tree, TreeParseError> {
    let mut reader = Reader {
        tokens: tokenize(input),
        pos: 0,
    };
    if reader.tokens.is_empty() {
        return Err(TreeParseError::EmptyInput);
    }
    let tree = reader.read_tree()?;
    if let Some((position, _)) = reader.peek() {
        return Err(TreeParseError::TrailingInput {
            position: *position,
        });
    }
    Ok(tree)
}

/// Parse a sequence of bracketed trees separated by whitespace
pub fn parse_treebank(input: &str) -> Result<Vec<Tree>, TreeParseError> {
    let mut reader = Reader {
        tokens: tokenize(input),
        pos: 0,
    };
    let mut trees = Vec::new();
    while reader.peek().is_some() {
        trees.push(reader.read_tree()?);
    }
    Ok(trees)
}
