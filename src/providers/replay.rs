//! Replay provider for datagram capture files
//!
//! A capture is a sequence of length-prefixed datagrams: a little-endian
//! `u32` byte count followed by that many bytes, repeated to end of file.

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::vec::IntoIter;

use tracing::{debug, info, trace};

use crate::provider::DatagramProvider;
use crate::{Result, TelemetryError};

/// Replays the datagrams of a capture in order, then ends the stream.
pub struct ReplayProvider {
    datagrams: IntoIter<Vec<u8>>,
    total: usize,
}

impl ReplayProvider {
    /// Load a capture file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| TelemetryError::io(format!("opening capture {}", path.display()), e))?;
        let datagrams = read_capture(BufReader::new(file))?;
        info!(path = %path.display(), datagrams = datagrams.len(), "Opened capture");
        Ok(Self::from_datagrams(datagrams))
    }

    pub fn from_datagrams(datagrams: Vec<Vec<u8>>) -> Self {
        let total = datagrams.len();
        Self { datagrams: datagrams.into_iter(), total }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn remaining(&self) -> usize {
        self.datagrams.len()
    }
}

#[async_trait::async_trait]
impl DatagramProvider for ReplayProvider {
    async fn next_datagram(&mut self) -> Result<Option<Vec<u8>>> {
        match self.datagrams.next() {
            Some(datagram) => {
                trace!(position = self.total - self.datagrams.len(), total = self.total, "Replaying datagram");
                Ok(Some(datagram))
            }
            None => {
                debug!("Reached end of capture");
                Ok(None)
            }
        }
    }
}

/// Write datagrams in capture format.
pub fn write_capture<W, I, D>(writer: W, datagrams: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = D>,
    D: AsRef<[u8]>,
{
    let mut writer = BufWriter::new(writer);
    for datagram in datagrams {
        let bytes = datagram.as_ref();
        let len = u32::try_from(bytes.len())
            .map_err(|_| TelemetryError::config(format!("datagram of {} bytes is too large", bytes.len())))?;
        writer
            .write_all(&len.to_le_bytes())
            .and_then(|_| writer.write_all(bytes))
            .map_err(|e| TelemetryError::io("writing capture", e))?;
    }
    writer.flush().map_err(|e| TelemetryError::io("writing capture", e))
}

/// Read every datagram of a capture.
///
/// A file ending in the middle of a length prefix or datagram is `Truncated`.
pub fn read_capture<R: Read>(mut reader: R) -> Result<Vec<Vec<u8>>> {
    let mut datagrams = Vec::new();
    let mut offset = 0usize;

    loop {
        let mut prefix = [0u8; 4];
        let read = read_fully(&mut reader, &mut prefix)?;
        if read == 0 {
            break;
        }
        if read < prefix.len() {
            return Err(TelemetryError::Truncated { needed: offset + prefix.len(), available: offset + read });
        }
        offset += prefix.len();

        let len = u32::from_le_bytes(prefix) as usize;
        // Grow with the data actually present; the prefix is untrusted
        let mut datagram = Vec::new();
        let read = reader
            .by_ref()
            .take(len as u64)
            .read_to_end(&mut datagram)
            .map_err(|e| TelemetryError::io("reading capture", e))?;
        if read < len {
            return Err(TelemetryError::Truncated { needed: offset + len, available: offset + read });
        }
        offset += len;
        datagrams.push(datagram);
    }

    Ok(datagrams)
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(TelemetryError::io("reading capture", e)),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_a_capture_file_in_order() {
        let file = tempfile::NamedTempFile::new().unwrap();
        write_capture(file.reopen().unwrap(), [vec![1u8, 2, 3], vec![], vec![9u8; 1464]]).unwrap();

        let mut provider = ReplayProvider::open(file.path()).unwrap();
        assert_eq!(provider.total(), 3);
        assert_eq!(provider.next_datagram().await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(provider.next_datagram().await.unwrap(), Some(vec![]));
        assert_eq!(provider.next_datagram().await.unwrap().map(|d| d.len()), Some(1464));
        assert_eq!(provider.remaining(), 0);
        assert_eq!(provider.next_datagram().await.unwrap(), None);
    }

    #[test]
    fn truncated_captures_are_rejected() {
        let mut bytes = Vec::new();
        write_capture(&mut bytes, [[7u8; 10]]).unwrap();

        assert!(matches!(read_capture(&bytes[..12]), Err(TelemetryError::Truncated { needed: 14, available: 12 })));
        assert!(matches!(read_capture(&bytes[..2]), Err(TelemetryError::Truncated { needed: 4, available: 2 })));
        assert_eq!(read_capture(&bytes[..]).unwrap(), vec![vec![7u8; 10]]);
        assert!(read_capture(&[][..]).unwrap().is_empty());
    }

    #[test]
    fn oversized_length_prefix_is_truncated_not_allocated() {
        let mut bytes = u32::MAX.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let err = read_capture(&bytes[..]).unwrap_err();
        assert!(matches!(
            err,
            TelemetryError::Truncated { needed, available: 7 } if needed == 4 + u32::MAX as usize
        ));
    }

    #[test]
    fn missing_capture_is_an_io_error() {
        let err = ReplayProvider::open("/no/such/capture.bin").err().unwrap();
        assert!(matches!(err, TelemetryError::Io { .. }));
    }
}
