use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive as _, ToPrimitive as _};
use std::io::{Read, Write};

use crate::classifier::write_u16_len;

/// Deepest tree the codec reads back. Fitting never grows past it.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
enum Tag {
	Leaf = 0,
	Children = 1,
}

impl Tag {
	fn write<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
		writer.write_u16::<BigEndian>(self.to_u16().unwrap_or_default())
	}

	fn read<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let raw = reader.read_u16::<BigEndian>()?;

		Tag::from_u16(raw).ok_or_else(|| std::io::Error::new(
			std::io::ErrorKind::InvalidData,
			format!("unknown node tag {}", raw),
		))
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Split {
	pub value: f64,
	pub column: usize,
}

impl Split {
	pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		writer.write_f64::<BigEndian>(self.value)?;
		write_u16_len(writer, self.column, "split column")?;

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let value = reader.read_f64::<BigEndian>()?;
		let column = reader.read_u16::<BigEndian>()? as usize;

		Ok(Self { value, column })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
	Leaf(f64),
	Children {
		left: Box<Node>,
		right: Box<Node>,
		split: Split,
	},
}

impl Node {
	pub fn predict(&self, x: &[f64]) -> f64 {
		match &self {
			Node::Leaf(value) => *value,
			Node::Children { left, right, split } => {
				if x[split.column] < split.value {
					left.predict(x)
				} else {
					right.predict(x)
				}
			},
		}
	}

	/// Highest column any split reads, `None` for a bare leaf.
	pub fn max_column(&self) -> Option<usize> {
		match &self {
			Node::Leaf(_) => None,
			Node::Children { left, right, split } => [Some(split.column), left.max_column(), right.max_column()]
				.iter()
				.flatten()
				.copied()
				.max(),
		}
	}

	pub fn depth(&self) -> usize {
		match &self {
			Node::Leaf(_) => 1,
			Node::Children { left, right, .. } => 1 + std::cmp::max(left.depth(), right.depth()),
		}
	}

	pub fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		match &self {
			Node::Leaf(value) => {
				Tag::Leaf.write(writer)?;
				writer.write_f64::<BigEndian>(*value)?;
			},
			Node::Children { left, right, split } => {
				Tag::Children.write(writer)?;
				split.serialize(writer)?;
				left.serialize(writer)?;
				right.serialize(writer)?;
			}
		}

		Ok(())
	}

	pub fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		Node::read_within(reader, MAX_DEPTH)
	}

	fn read_within<R: Read>(reader: &mut R, depth: usize) -> std::io::Result<Self> {
		if depth == 0 {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				format!("tree is deeper than {} levels", MAX_DEPTH),
			));
		}

		match Tag::read(reader)? {
			Tag::Leaf => Ok(Node::Leaf(reader.read_f64::<BigEndian>()?)),
			Tag::Children => {
				let split = Split::deserialize(reader)?;
				let left = Box::new(Node::read_within(reader, depth - 1)?);
				let right = Box::new(Node::read_within(reader, depth - 1)?);

				Ok(Node::Children { split, left, right })
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn stump() -> Node {
		Node::Children {
			split: Split { value: 42.5, column: 2 },
			left: Box::new(Node::Leaf(0.0)),
			right: Box::new(Node::Children {
				split: Split { value: 0.5, column: 9 },
				left: Box::new(Node::Leaf(0.0)),
				right: Box::new(Node::Leaf(1.0)),
			}),
		}
	}

	#[test]
	fn routes_on_threshold() {
		let node = stump();
		let mut x = [0.0; 11];
		x[2] = 30.0;
		assert_eq!(node.predict(&x), 0.0);

		x[2] = 50.0;
		assert_eq!(node.predict(&x), 0.0);
		x[9] = 1.0;
		assert_eq!(node.predict(&x), 1.0);
	}

	#[test]
	fn reports_shape() {
		assert_eq!(stump().max_column(), Some(9));
		assert_eq!(stump().depth(), 3);
		assert_eq!(Node::Leaf(1.0).max_column(), None);
	}

	#[test]
	fn survives_the_wire() {
		let mut buf = Vec::new();
		stump().serialize(&mut buf).unwrap();
		assert_eq!(Node::deserialize(&mut buf.as_slice()).unwrap(), stump());
	}

	#[test]
	fn rejects_unknown_tags() {
		let buf = [0u8, 7];
		let err = Node::deserialize(&mut &buf[..]).unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
	}

	fn chain(depth: usize) -> Node {
		(1..depth).fold(Node::Leaf(1.0), |right, _| Node::Children {
			split: Split { value: 0.5, column: 0 },
			left: Box::new(Node::Leaf(0.0)),
			right: Box::new(right),
		})
	}

	#[test]
	fn reads_trees_up_to_the_depth_limit() {
		let deepest = chain(MAX_DEPTH);
		assert_eq!(deepest.depth(), MAX_DEPTH);

		let mut buf = Vec::new();
		deepest.serialize(&mut buf).unwrap();
		assert_eq!(Node::deserialize(&mut buf.as_slice()).unwrap(), deepest);
	}

	#[test]
	fn rejects_trees_past_the_depth_limit() {
		let mut buf = Vec::new();
		chain(MAX_DEPTH + 1).serialize(&mut buf).unwrap();
		let err = Node::deserialize(&mut buf.as_slice()).unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);

		// split tags without end, far past any stack a recursive reader could afford
		let mut endless = Vec::new();
		for _ in 0..1_000_000 {
			endless.extend_from_slice(&1u16.to_be_bytes());
			endless.extend_from_slice(&0.5f64.to_be_bytes());
			endless.extend_from_slice(&0u16.to_be_bytes());
		}
		let err = Node::deserialize(&mut endless.as_slice()).unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
	}
}
