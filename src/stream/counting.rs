use std::cell::Cell;
use std::io::{self, Read, Write};
use std::rc::Rc;

/// Shared byte counter; stays readable after the stream that feeds it has
/// been moved into a longer pipeline.
#[derive(Clone, Debug, Default)]
pub struct Counter(Rc<Cell<u64>>);

impl Counter {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    fn add(&self, n: usize) {
        self.0.set(self.0.get() + n as u64);
    }
}

/// Pass-through reader counting the bytes read through it.
pub struct CountingReader<R> {
    inner: R,
    counter: Counter,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            counter: Counter::default(),
        }
    }

    pub fn counter(&self) -> Counter {
        self.counter.clone()
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.add(n);
        Ok(n)
    }
}

/// Pass-through writer counting the bytes written through it.
pub struct CountingWriter<W> {
    inner: W,
    counter: Counter,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            counter: Counter::default(),
        }
    }

    pub fn counter(&self) -> Counter {
        self.counter.clone()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.counter.add(n);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
