use crate::arena::Arena;
use crate::error::{LispError, LispResult};
use crate::eval::{STACK_GROW_SIZE, STACK_RED_ZONE};
use crate::stream::InputStream;
use crate::symbol::sym;
use crate::value::Value;

/// Default bound on atom length.
pub const MAX_TOKEN_LEN: usize = 32;

enum Token {
    Open,
    Close,
    Quote,
    Atom(Value),
}

/// Parses source bytes into arena lists and atoms.
///
/// Syntax: parenthesized lists, `'x` for `(quote x)`, and atoms. Every byte
/// up to and including space separates tokens; `(` and `)` always end an atom.
/// There are no comments, strings, or dotted pairs.
pub struct Reader<'a> {
    input: &'a mut InputStream,
    max_token_len: usize,
}

impl<'a> Reader<'a> {
    pub fn new(input: &'a mut InputStream, max_token_len: usize) -> Self {
        Reader {
            input,
            max_token_len,
        }
    }

    /// Read one expression. Returns None at end of input.
    pub fn read(&mut self, arena: &mut Arena) -> LispResult<Option<Value>> {
        match self.next_token(arena)? {
            None => Ok(None),
            Some(tok) => self.parse(tok, arena).map(Some),
        }
    }

    fn read_required(&mut self, arena: &mut Arena) -> LispResult<Value> {
        let tok = self.next_token(arena)?.ok_or(LispError::UnexpectedEof)?;
        self.parse(tok, arena)
    }

    fn parse(&mut self, tok: Token, arena: &mut Arena) -> LispResult<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.parse_token(tok, arena))
    }

    fn parse_token(&mut self, tok: Token, arena: &mut Arena) -> LispResult<Value> {
        match tok {
            Token::Open => self.read_list(arena),
            Token::Close => Err(LispError::UnexpectedCloseParen),
            Token::Quote => {
                let quoted = self.read_required(arena)?;
                let quote = Value::Atom(arena.allocate_atom(sym::QUOTE)?);
                arena.list(&[quote, quoted])
            }
            Token::Atom(v) => Ok(v),
        }
    }

    /// Read list elements up to the matching `)`. `()` is nil.
    fn read_list(&mut self, arena: &mut Arena) -> LispResult<Value> {
        let mut elements = Vec::new();
        loop {
            match self.next_token(arena)?.ok_or(LispError::UnexpectedEof)? {
                Token::Close => break,
                tok => elements.push(self.parse(tok, arena)?),
            }
        }
        arena.list(&elements)
    }

    fn next_token(&mut self, arena: &mut Arena) -> LispResult<Option<Token>> {
        let first = loop {
            match self.input.next_byte()? {
                None => return Ok(None),
                Some(b) if is_separator(b) => continue,
                Some(b) => break b,
            }
        };
        match first {
            b'(' => Ok(Some(Token::Open)),
            b')' => Ok(Some(Token::Close)),
            b'\'' => Ok(Some(Token::Quote)),
            _ => self.read_atom(first, arena).map(|v| Some(Token::Atom(v))),
        }
    }

    fn read_atom(&mut self, first: u8, arena: &mut Arena) -> LispResult<Value> {
        let mut text = vec![first];
        let mut overflow = false;
        loop {
            match self.input.next_byte()? {
                None => break,
                Some(b) if is_separator(b) => break,
                Some(b @ (b'(' | b')')) => {
                    self.input.unread(b);
                    break;
                }
                Some(b) => {
                    if text.len() >= self.max_token_len {
                        // Keep consuming so the rest of the atom is not
                        // mistaken for the next token.
                        overflow = true;
                    } else {
                        text.push(b);
                    }
                }
            }
        }
        if overflow || text.len() > self.max_token_len {
            return Err(LispError::TokenTooLong {
                limit: self.max_token_len,
            });
        }
        Ok(Value::Atom(arena.allocate_atom(&text)?))
    }
}

fn is_separator(b: u8) -> bool {
    b <= b' '
}

/// Read exactly one expression from a string.
pub fn read_str(text: &str, arena: &mut Arena) -> LispResult<Value> {
    let mut input = InputStream::from_text(text);
    Reader::new(&mut input, MAX_TOKEN_LEN)
        .read(arena)?
        .ok_or(LispError::UnexpectedEof)
}
