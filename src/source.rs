//! Caller-owned byte channels
//!
//! Every operation opens exactly one stream per channel right before use and
//! drops it on every exit path, so files and sockets are always closed.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// A readable resource that can be opened repeatedly.
pub trait ByteSource {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>>;

    fn open_buffered_stream(&self) -> io::Result<BufReader<Box<dyn Read + '_>>> {
        Ok(BufReader::new(self.open_stream()?))
    }
}

/// A writable resource.
pub trait ByteSink {
    fn open_stream(&mut self) -> io::Result<Box<dyn Write + '_>>;

    fn open_buffered_stream(&mut self) -> io::Result<BufWriter<Box<dyn Write + '_>>> {
        Ok(BufWriter::new(self.open_stream()?))
    }
}

/// Reads a whole source through one scoped buffered stream.
pub(crate) fn read_all<S: ByteSource + ?Sized>(source: &S) -> io::Result<Vec<u8>> {
    let mut stream = source.open_buffered_stream()?;
    let mut bytes = Vec::new();
    stream.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Writes `bytes` through one scoped buffered stream, flushing before the
/// stream is closed so write errors are not lost on drop.
pub(crate) fn write_all<K: ByteSink + ?Sized>(sink: &mut K, bytes: &[u8]) -> io::Result<()> {
    let mut stream = sink.open_buffered_stream()?;
    stream.write_all(bytes)?;
    stream.flush()
}

impl ByteSource for [u8] {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self))
    }
}

impl ByteSource for Vec<u8> {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.as_slice()))
    }
}

impl ByteSource for str {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.as_bytes()))
    }
}

impl ByteSource for String {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(self.as_bytes()))
    }
}

impl ByteSource for Path {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(File::open(self)?))
    }
}

impl ByteSource for PathBuf {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        self.as_path().open_stream()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        (**self).open_stream()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Box<T> {
    fn open_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        (**self).open_stream()
    }
}

impl ByteSink for Vec<u8> {
    fn open_stream(&mut self) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(self))
    }
}

impl ByteSink for File {
    fn open_stream(&mut self) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(self))
    }
}

/// Creates (or truncates) the file at this path.
impl ByteSink for PathBuf {
    fn open_stream(&mut self) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(File::create(self.as_path())?))
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &mut T {
    fn open_stream(&mut self) -> io::Result<Box<dyn Write + '_>> {
        (**self).open_stream()
    }
}
