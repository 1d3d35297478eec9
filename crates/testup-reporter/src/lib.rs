//! Testup Reporters
//!
//! Textual implementations of the testup reporter port:
//! - [`TapReporter`] writes a TAP version 13 stream
//! - [`ConsoleReporter`] prints an indented tree and a failure summary
//!
//! Both write to any [`std::io::Write`]; [`Capture`] collects output in
//! memory.

pub mod console;
pub mod format;
pub mod tap;

pub use console::ConsoleReporter;
pub use format::{word_wrap, yaml_like};
pub use tap::TapReporter;

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

/// Shared line-oriented sink
#[derive(Clone)]
pub(crate) struct Output(Rc<RefCell<Box<dyn Write>>>);

impl Output {
    pub(crate) fn new(out: impl Write + 'static) -> Self {
        Self(Rc::new(RefCell::new(Box::new(out))))
    }

    /// Write one line. Output errors are ignored, like a closed stdout.
    pub(crate) fn line(&self, text: &str) {
        let mut out = self.0.borrow_mut();
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }
}

/// In-memory writer whose clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct Capture(Rc<RefCell<Vec<u8>>>);

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
