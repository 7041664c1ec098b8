//! Output sinks for `PRINT_ITEM`, `PRINT_NEWLINE` and the `print` builtin.

use std::{
    borrow::Cow,
    io::{self, Write},
};

/// Destination of everything the executing program prints.
///
/// The engine hands over text in pieces: one call to [`PrintWriter::stdout_write`] per printed
/// value, with separators and line terminators delivered through [`PrintWriter::stdout_push`].
pub trait PrintWriter {
    /// Writes the `str()` of one printed value, without separators or terminators.
    fn stdout_write(&mut self, output: Cow<'_, str>);

    /// Writes a single separator or terminator character.
    fn stdout_push(&mut self, end: char);
}

/// Writes to the process's standard output. Used by [`crate::Engine::new`].
#[derive(Debug, Default)]
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        // a closed stdout is not the program's problem
        let _ = io::stdout().lock().write_all(output.as_bytes());
    }

    fn stdout_push(&mut self, end: char) {
        let mut buf = [0; 4];
        let mut stdout = io::stdout().lock();
        let _ = stdout.write_all(end.encode_utf8(&mut buf).as_bytes());
        if end == '\n' {
            let _ = stdout.flush();
        }
    }
}

/// Collects all output in memory.
#[derive(Debug, Default)]
pub struct CollectStringPrint(String);

impl CollectStringPrint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed so far.
    #[must_use]
    pub fn output(&self) -> &str {
        &self.0
    }

    /// Returns the collected output and starts over with an empty buffer.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.0)
    }

    #[must_use]
    pub fn into_output(self) -> String {
        self.0
    }
}

impl PrintWriter for CollectStringPrint {
    fn stdout_write(&mut self, output: Cow<'_, str>) {
        self.0.push_str(&output);
    }

    fn stdout_push(&mut self, end: char) {
        self.0.push(end);
    }
}

/// Discards all output.
#[derive(Debug, Default)]
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn stdout_write(&mut self, _output: Cow<'_, str>) {}

    fn stdout_push(&mut self, _end: char) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_and_take() {
        let mut out = CollectStringPrint::new();
        out.stdout_write("a".into());
        out.stdout_push(' ');
        out.stdout_write(Cow::Owned("b".to_owned()));
        out.stdout_push('\n');
        assert_eq!(out.output(), "a b\n");
        assert_eq!(out.take(), "a b\n");
        assert_eq!(out.output(), "");
    }
}
