use std::io::{self, Read, Write};

use byteorder::{BigEndian, WriteBytesExt};

pub trait Classifier: Sized {
	fn predict(&self, x: &[f64]) -> f64;

	/// Width of the input vectors this classifier was fit on.
	fn n_features(&self) -> usize;

	fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()>;
	fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// Counts, widths and columns go on the wire as u16.
pub(crate) fn write_u16_len<W: Write>(writer: &mut W, len: usize, what: &str) -> io::Result<()> {
	let len = u16::try_from(len).map_err(|_| io::Error::new(
		io::ErrorKind::InvalidInput,
		format!("{} {} exceeds the artifact limit of {}", what, len, u16::MAX),
	))?;

	writer.write_u16::<BigEndian>(len)
}

/// Fails unless `reader` is exhausted.
pub(crate) fn expect_end<R: Read>(reader: &mut R) -> io::Result<()> {
	let mut byte = [0u8; 1];
	match reader.read(&mut byte)? {
		0 => Ok(()),
		_ => Err(io::Error::new(io::ErrorKind::InvalidData, "trailing bytes after the artifact")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lengths_beyond_u16_are_refused() {
		let mut buf = Vec::new();
		write_u16_len(&mut buf, 65_535, "tree count").unwrap();
		assert_eq!(buf, vec![0xff, 0xff]);

		let err = write_u16_len(&mut buf, 65_536, "tree count").unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
		assert_eq!(buf.len(), 2);
	}

	#[test]
	fn end_of_input_is_checked() {
		assert!(expect_end(&mut &b""[..]).is_ok());
		let err = expect_end(&mut &b"\x00"[..]).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::InvalidData);
	}
}
