use std::io::{self, ErrorKind, Read};

/// Bytes provides the ability to read bytes from a reader and push them back if they are
/// not needed, i.e., peek-and-push. Stream order of the bytes is preserved when
/// pushing bytes back.
pub(crate) struct Bytes<R>
where
    R: Read,
{
    reader: R,
    num_read: usize,
    // stack; the next byte is last
    cache: Vec<u8>,
}

impl<R> Bytes<R>
where
    R: Read,
{
    pub fn new(reader: R) -> Self {
        Bytes {
            reader,
            num_read: 0,
            cache: Vec::new(),
        }
    }

    /// Next byte, or `None` at EOF.
    pub fn next(&mut self) -> Result<Option<u8>, io::Error> {
        if let Some(b) = self.cache.pop() {
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.num_read += 1;
                    return Ok(Some(buf[0]));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    /// Fill `buf`, first from pushed back bytes. Returns false if EOF was reached before
    /// `buf` was full.
    pub fn fill(&mut self, buf: &mut [u8]) -> Result<bool, io::Error> {
        let cached = self.cache.len().min(buf.len());
        for slot in &mut buf[..cached] {
            if let Some(b) = self.cache.pop() {
                *slot = b;
            }
        }

        let rest = &mut buf[cached..];
        if rest.is_empty() {
            return Ok(true);
        }
        match self.reader.read_exact(rest) {
            Ok(()) => {
                self.num_read += rest.len();
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Push bytes back such that `dat[0]` is the next byte read.
    pub fn push(&mut self, dat: &[u8]) {
        self.cache.extend(dat.iter().rev());
    }

    /// Number of bytes consumed from the stream.
    pub fn offset(&self) -> usize {
        self.num_read - self.cache.len()
    }
}
