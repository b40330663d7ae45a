use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Operator-facing output shared by the protocol runners and the command loop.
///
/// Each call writes whole lines under one lock, so output from concurrent
/// runners never interleaves mid-line.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(out))),
        }
    }

    /// Console writing to the process stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Console writing into an in-memory buffer, for inspection in tests.
    pub fn buffer() -> (Self, SharedBuffer) {
        let buf = SharedBuffer::default();
        (Self::new(buf.clone()), buf)
    }

    /// Write one line.
    pub fn line(&self, args: fmt::Arguments<'_>) {
        self.emit(|out| writeln!(out, "{args}"));
    }

    /// Write without a trailing newline and flush, for prompts.
    pub fn prompt(&self, text: &str) {
        self.emit(|out| {
            out.write_all(text.as_bytes())?;
            out.flush()
        });
    }

    fn emit(&self, f: impl FnOnce(&mut dyn Write) -> io::Result<()>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = f(&mut **out) {
            log::warn!("console write failed: {e}");
        }
    }
}

/// Cloneable in-memory writer backing [`Console::buffer`].
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Everything written so far.
    pub fn contents(&self) -> String {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&inner).into_owned()
    }

    /// Written lines, without terminators.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_captured() {
        let (console, buf) = Console::buffer();
        console.prompt("> ");
        console.line(format_args!("peer id: {}", 1));
        assert_eq!(buf.contents(), "> peer id: 1\n");
    }
}
