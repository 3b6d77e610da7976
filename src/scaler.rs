//! Standard scaler: centers every feature on its training mean and divides by
//! its population standard deviation. Statistics are fixed at fit time.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::classifier::{expect_end, write_u16_len};

const MAGIC: &[u8; 4] = b"CHSC";
const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
	means: Vec<f64>,
	scales: Vec<f64>,
}

impl StandardScaler {
	/// Fits on column-major data. A constant column keeps scale 1 so it maps
	/// to 0 instead of dividing by zero.
	pub fn fit(columns: &[Vec<f64>]) -> Self {
		let (means, scales) = columns
			.iter()
			.map(|column| {
				let n = column.len().max(1) as f64;
				let mean = column.iter().sum::<f64>() / n;
				let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
				let std = variance.sqrt();

				(mean, if std > std::f64::EPSILON { std } else { 1.0 })
			})
			.unzip();

		Self { means, scales }
	}

	pub fn n_features(&self) -> usize {
		self.means.len()
	}

	pub fn means(&self) -> &[f64] {
		&self.means
	}

	pub fn scales(&self) -> &[f64] {
		&self.scales
	}

	/// `None` when `x` is not as wide as the data the scaler was fit on.
	pub fn transform(&self, x: &[f64]) -> Option<Vec<f64>> {
		if x.len() != self.n_features() {
			return None;
		}

		Some(x
			.iter()
			.zip(self.means.iter().zip(&self.scales))
			.map(|(v, (mean, scale))| (v - mean) / scale)
			.collect())
	}

	pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		writer.write_all(MAGIC)?;
		writer.write_u16::<BigEndian>(FORMAT_VERSION)?;
		write_u16_len(writer, self.n_features(), "input width")?;

		for (mean, scale) in self.means.iter().zip(&self.scales) {
			writer.write_f64::<BigEndian>(*mean)?;
			writer.write_f64::<BigEndian>(*scale)?;
		}

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let invalid = |message: String| std::io::Error::new(std::io::ErrorKind::InvalidData, message);

		let mut magic = [0u8; 4];
		reader.read_exact(&mut magic)?;
		if &magic != MAGIC {
			return Err(invalid("not a scaler artifact".to_string()));
		}

		let version = reader.read_u16::<BigEndian>()?;
		if version != FORMAT_VERSION {
			return Err(invalid(format!("unsupported scaler format version {}", version)));
		}

		let width = reader.read_u16::<BigEndian>()? as usize;
		let mut means = Vec::with_capacity(width);
		let mut scales = Vec::with_capacity(width);

		for _ in 0..width {
			means.push(reader.read_f64::<BigEndian>()?);

			let scale = reader.read_f64::<BigEndian>()?;
			if !(scale.is_finite() && scale > 0.0) {
				return Err(invalid(format!("scale {} is not a positive number", scale)));
			}
			scales.push(scale);
		}
		expect_end(reader)?;

		Ok(Self { means, scales })
	}
}
