use std::cell::RefCell;
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;

use crate::error::LispResult;

/// A byte source with one byte of pushback.
///
/// The reader never needs more lookahead than that, which is what lets the
/// interactive prompt and the `read` primitive share standard input without
/// swallowing the next expression.
pub struct InputStream {
    inner: io::Bytes<Box<dyn Read>>,
    pending: Option<u8>,
    /// The byte most recently handed out, if it was not pushed back.
    last: Option<u8>,
}

impl InputStream {
    pub fn new(source: impl Read + 'static) -> Self {
        let boxed: Box<dyn Read> = Box::new(source);
        InputStream {
            inner: boxed.bytes(),
            pending: None,
            last: None,
        }
    }

    pub fn stdin() -> Self {
        InputStream::new(io::stdin())
    }

    pub fn from_text(text: &str) -> Self {
        InputStream::new(Cursor::new(text.as_bytes().to_vec()))
    }

    /// Next byte, or None at end of input.
    pub fn next_byte(&mut self) -> LispResult<Option<u8>> {
        let next = match self.pending.take() {
            Some(b) => Some(b),
            None => self.inner.next().transpose()?,
        };
        self.last = next;
        Ok(next)
    }

    /// Push one byte back; the next `next_byte` returns it.
    pub fn unread(&mut self, b: u8) {
        debug_assert!(self.pending.is_none(), "only one byte of pushback");
        self.pending = Some(b);
        self.last = None;
    }

    /// Discard the rest of the current line, newline included. Does nothing
    /// if the last byte read already ended the line.
    pub fn skip_line(&mut self) -> LispResult<()> {
        if self.last == Some(b'\n') {
            return Ok(());
        }
        while let Some(b) = self.next_byte()? {
            if b == b'\n' {
                break;
            }
        }
        Ok(())
    }
}

/// Where `write` and the driver's result printing go.
pub struct OutputStream {
    inner: Box<dyn Write>,
}

impl OutputStream {
    pub fn new(sink: impl Write + 'static) -> Self {
        OutputStream {
            inner: Box::new(sink),
        }
    }

    pub fn stdout() -> Self {
        OutputStream::new(io::stdout())
    }

    /// An in-memory sink plus a handle to read back what was written.
    pub fn buffer() -> (Self, SharedBuffer) {
        let buf = SharedBuffer::default();
        (OutputStream::new(buf.clone()), buf)
    }

    pub fn write_str(&mut self, text: &str) -> LispResult<()> {
        self.inner.write_all(text.as_bytes())?;
        self.inner.flush()?;
        Ok(())
    }
}

/// Cloneable in-memory writer.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
