use log::{debug, trace};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use crate::context::ProcessingContext;
use crate::processor::OutputProcessor;

type Sink = Box<dyn Write + Send>;

struct Inner<P, C> {
    buffer: Vec<u8>,
    // leading bytes of `buffer` already known to hold no newline
    scanned: usize,
    sink: Option<Sink>,
    processor: P,
    context: C,
}

impl<P: OutputProcessor, C: ProcessingContext> Inner<P, C> {
    fn dispatch(&mut self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        self.processor.process_line(&line, &mut self.context);
    }

    fn dispatch_complete_lines(&mut self) {
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.buffer[from..].iter().position(|&b| b == b'\n') {
            let end = from + pos;
            let line = self.buffer[start..end].to_vec();
            self.dispatch(&line);
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
    }

    fn dispatch_residual(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        trace!("dispatching unterminated line ({} bytes)", line.len());
        self.dispatch(&line);
    }
}

/// Splits a raw output stream into lines for an [`OutputProcessor`], while
/// optionally mirroring every byte to a pass-through sink.
///
/// All buffer handling happens under one lock so the sniffer can be shared
/// by several pump threads (see the `Write` impl for `&OutputSniffer`).
pub struct OutputSniffer<P, C> {
    inner: Mutex<Inner<P, C>>,
}

impl<P: OutputProcessor, C: ProcessingContext> OutputSniffer<P, C> {
    pub fn new(processor: P, context: C) -> Self {
        Self::from_parts(processor, context, None)
    }

    pub fn with_sink(processor: P, context: C, sink: impl Write + Send + 'static) -> Self {
        Self::from_parts(processor, context, Some(Box::new(sink)))
    }

    fn from_parts(processor: P, context: C, sink: Option<Sink>) -> Self {
        OutputSniffer {
            inner: Mutex::new(Inner {
                buffer: Vec::new(),
                scanned: 0,
                sink,
                processor,
                context,
            }),
        }
    }

    // a panicking pump thread must not take the parsed output down with it
    fn lock(&self) -> MutexGuard<'_, Inner<P, C>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_bytes(&self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.lock();
        if let Some(sink) = inner.sink.as_mut() {
            sink.write_all(buf)?;
        }
        inner.buffer.extend_from_slice(buf);
        inner.dispatch_complete_lines();
        Ok(buf.len())
    }

    fn flush_all(&self) -> io::Result<()> {
        let mut inner = self.lock();
        if let Some(sink) = inner.sink.as_mut() {
            sink.flush()?;
        }
        inner.dispatch_residual();
        Ok(())
    }

    /// Flushes and releases the pass-through sink, then dispatches whatever
    /// is left in the buffer as a final line.
    pub fn close(&self) -> io::Result<()> {
        let mut inner = self.lock();
        if let Some(mut sink) = inner.sink.take() {
            debug!("closing pass-through sink");
            sink.flush()?;
        }
        inner.dispatch_residual();
        Ok(())
    }

    /// Closes the sniffer and hands back the processor and its context.
    pub fn finish(self) -> io::Result<(P, C)> {
        self.close()?;
        let inner = self.inner.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok((inner.processor, inner.context))
    }
}

impl<P: OutputProcessor, C: ProcessingContext> Write for OutputSniffer<P, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_all()
    }
}

impl<P: OutputProcessor, C: ProcessingContext> Write for &OutputSniffer<P, C> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_all()
    }
}
