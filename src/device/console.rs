//! Host character I/O seen by the guest.
//!
//! Two consumers share this seam: the keyboard registers (non-blocking
//! poll on every KBSR read) and the trap services (blocking reads and
//! character output). Tests swap the stdio implementation for a
//! [`BufferConsole`] with scripted input.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

use crate::terminal;

/// Character device backing the keyboard registers and trap I/O.
pub trait Console {
    /// Return a pending character without blocking, or `None` if there is none.
    fn poll_key(&mut self) -> io::Result<Option<u8>>;

    /// Block until a character is available. `None` means end of input.
    fn read_char(&mut self) -> io::Result<Option<u8>>;

    /// Write raw bytes to the output.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> io::Result<()>;
}

/// Console on the process's stdin/stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl StdConsole {
    pub fn new() -> Self {
        Self
    }
}

impl Console for StdConsole {
    fn poll_key(&mut self) -> io::Result<Option<u8>> {
        if terminal::stdin_ready()? {
            self.read_char()
        } else {
            Ok(None)
        }
    }

    fn read_char(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match io::stdin().lock().read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        io::stdout().lock().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// In-memory console with scripted input and captured output.
///
/// Clones share the same buffers, so a test can keep one handle while the
/// monitor owns another.
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    inner: Rc<RefCell<Buffers>>,
}

#[derive(Debug, Default)]
struct Buffers {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Console whose input queue starts with `input`.
    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        let console = Self::new();
        console.push_input(input);
        console
    }

    /// Queue more input.
    pub fn push_input(&self, input: impl AsRef<[u8]>) {
        self.inner
            .borrow_mut()
            .input
            .extend(input.as_ref().iter().copied());
    }

    /// Everything written so far.
    pub fn output(&self) -> Vec<u8> {
        self.inner.borrow().output.clone()
    }

    /// Output decoded lossily as UTF-8.
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.borrow().output).into_owned()
    }
}

impl Console for BufferConsole {
    fn poll_key(&mut self) -> io::Result<Option<u8>> {
        Ok(self.inner.borrow_mut().input.pop_front())
    }

    fn read_char(&mut self) -> io::Result<Option<u8>> {
        Ok(self.inner.borrow_mut().input.pop_front())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.borrow_mut().output.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_console_io() {
        let mut console = BufferConsole::with_input("ab");
        assert_eq!(console.poll_key().unwrap(), Some(b'a'));
        assert_eq!(console.read_char().unwrap(), Some(b'b'));
        assert_eq!(console.read_char().unwrap(), None);

        console.write_bytes(b"hi").unwrap();
        assert_eq!(console.output_string(), "hi");
    }

    #[test]
    fn test_clones_share_buffers() {
        let handle = BufferConsole::new();
        let mut console = handle.clone();
        assert_eq!(console.poll_key().unwrap(), None);

        handle.push_input("x");
        assert_eq!(console.poll_key().unwrap(), Some(b'x'));

        console.write_bytes(b"out").unwrap();
        assert_eq!(handle.output(), b"out".to_vec());
    }
}
