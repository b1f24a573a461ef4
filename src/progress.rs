//! Byte-counting reader used to drive progress bars.

use std::io::{self, Read};

/// Reader wrapper that reports the running byte total after every read.
pub struct ProgressReader<R: Read, F: FnMut(u64)> {
    inner: R,
    on_progress: F,
    bytes_read: u64,
}

impl<R: Read, F: FnMut(u64)> ProgressReader<R, F> {
    pub fn new(inner: R, on_progress: F) -> Self {
        Self {
            inner,
            on_progress,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read, F: FnMut(u64)> Read for ProgressReader<R, F> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.bytes_read += n as u64;
            (self.on_progress)(self.bytes_read);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reports_running_total() {
        let mut seen = Vec::new();
        let data = vec![0u8; 10];
        {
            let mut reader = ProgressReader::new(data.as_slice(), |n| seen.push(n));
            let mut buf = [0u8; 4];
            while reader.read(&mut buf).unwrap() > 0 {}
            assert_eq!(reader.bytes_read(), 10);
        }
        assert_eq!(seen, vec![4, 8, 10]);
    }
}
