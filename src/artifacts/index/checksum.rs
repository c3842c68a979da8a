use crate::artifacts::core::{CoreError, Result};
use crate::artifacts::index::CHECKSUM_SIZE;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{Read, Write};

/// Reader or writer that feeds every byte through a running SHA-1 digest,
/// so the index trailer can be produced or verified in one pass.
#[derive(Debug)]
pub struct Checksum<F> {
    file: F,
    digest: Sha1,
}

impl<F> Checksum<F> {
    pub(crate) fn new(file: F) -> Self {
        Checksum {
            file,
            digest: Sha1::new(),
        }
    }

    pub(crate) fn get_ref(&self) -> &F {
        &self.file
    }

    pub(crate) fn into_inner(self) -> F {
        self.file
    }
}

impl<F: Read> Checksum<F> {
    pub(crate) fn read(&mut self, size: usize) -> Result<Bytes> {
        let mut buffer = vec![0; size];
        self.file
            .read_exact(&mut buffer)
            .map_err(|_| CoreError::corrupt("unexpected end-of-file while reading index"))?;

        self.digest.update(&buffer);
        Ok(Bytes::from(buffer))
    }

    pub(crate) fn verify(&mut self) -> Result<()> {
        let mut expected_checksum = [0u8; CHECKSUM_SIZE];
        self.file
            .read_exact(&mut expected_checksum)
            .map_err(|_| CoreError::corrupt("index checksum is missing"))?;

        let actual_checksum = self.digest.clone().finalize();

        if expected_checksum != actual_checksum.as_slice() {
            return Err(CoreError::corrupt("checksum does not match value stored on disk"));
        }

        Ok(())
    }
}

impl<F: Write> Checksum<F> {
    pub(crate) fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        self.digest.update(data);
        Ok(())
    }

    pub(crate) fn write_checksum(&mut self) -> Result<()> {
        let checksum = self.digest.clone().finalize();
        self.file.write_all(checksum.as_slice())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn detects_flipped_bytes() {
        let mut writer = Checksum::new(Vec::new());
        writer.write(b"DIRC payload").unwrap();
        writer.write_checksum().unwrap();
        let mut bytes = writer.into_inner();
        bytes[0] = b'X';

        let mut reader = Checksum::new(Cursor::new(bytes));
        reader.read(12).unwrap();

        assert!(reader.verify().is_err());
    }

    #[test]
    fn accepts_untouched_bytes() {
        let mut writer = Checksum::new(Vec::new());
        writer.write(b"DIRC payload").unwrap();
        writer.write_checksum().unwrap();

        let mut reader = Checksum::new(Cursor::new(writer.into_inner()));
        reader.read(12).unwrap();

        assert!(reader.verify().is_ok());
    }
}
