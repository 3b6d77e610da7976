use std::io::{Read, Write};
use byteorder::{BigEndian, ReadBytesExt};
use rand::Rng;
use rand::seq::SliceRandom as _;
use ordered_float::OrderedFloat;

use crate::dataset::Dataset;
use crate::node::{self, Node, Split};
use crate::classifier::{write_u16_len, Classifier};
use crate::functions::{self, gini, most_frequent, ClassWeights, Histogram};

// Weighted gini over a window that rows move into or out of one at a time.
// Keeps the sum of squared class weights so each move is O(log classes).
struct SlidingGini {
	classes: Histogram,
	total: f64,
	squares: f64,
}

impl SlidingGini {
	fn new(targets: impl Iterator<Item = f64>, weights: &ClassWeights) -> Self {
		let (classes, total) = functions::histogram(targets, weights);
		let squares = classes.values().map(|w| w * w).sum();

		Self { classes, total, squares }
	}

	fn empty() -> Self {
		Self {
			classes: Histogram::new(),
			total: 0.0,
			squares: 0.0,
		}
	}

	fn shift(&mut self, class: f64, weight: f64) {
		let entry = self.classes.entry(OrderedFloat(class)).or_insert(0.0);
		self.squares -= *entry * *entry;
		*entry += weight;
		self.squares += *entry * *entry;
		self.total += weight;
	}

	fn inc(&mut self, class: f64, weight: f64) {
		self.shift(class, weight);
	}

	fn dec(&mut self, class: f64, weight: f64) {
		self.shift(class, -weight);
	}

	fn gini(&self) -> f64 {
		if self.total <= std::f64::EPSILON {
			return 0.0;
		}

		(1.0 - self.squares / (self.total * self.total)).max(0.0)
	}
}

struct NodeBuilder<'w, R> {
	max_features: usize,
	max_depth: usize,
	min_samples_split: usize,
	weights: &'w ClassWeights,
	rng: R
}

impl<'w, R: Rng> NodeBuilder<'w, R> {
	fn leaf(&self, dataset: &Dataset) -> Node {
		Node::Leaf(most_frequent(dataset.targets(), self.weights))
	}

	fn build(&mut self, dataset: &mut Dataset, depth: usize) -> Node {
		if depth >= self.max_depth || dataset.rows_len() < self.min_samples_split {
			return self.leaf(dataset);
		}

		let impurity = gini(dataset.targets(), self.weights);
		if impurity <= std::f64::EPSILON {
			return self.leaf(dataset);
		}

		let mut best_split: Option<Split> = None;
		let mut best_gain = std::f64::MIN;
		let columns = (0..dataset.features_len()).collect::<Vec<usize>>();
		let max_features = std::cmp::min(columns.len(), self.max_features);

		for &column in columns.choose_multiple(&mut self.rng, max_features) {
			dataset.sort(column);

			let mut left_window = SlidingGini::empty();
			let mut right_window = SlidingGini::new(dataset.targets(), self.weights);
			let node_weight = right_window.total;

			let mut moved = 0;
			let mut targets = dataset.targets();

			for (left, value) in dataset.get_splits(column) {
				for class in targets.by_ref().take(left.end - moved) {
					let weight = self.weights.get(class);
					left_window.inc(class, weight);
					right_window.dec(class, weight);
				}
				moved = left.end;

				let ratio_l = left_window.total / node_weight;
				let ratio_r = 1.0 - ratio_l;

				let gain = impurity - (ratio_l * left_window.gini() + ratio_r * right_window.gini());

				if best_gain < gain {
					best_split = Some(Split { column, value });
					best_gain = gain;
				}
			}
		}

		if let Some(split) = best_split {
			self.build_children(dataset, split, depth)
		} else {
			self.leaf(dataset)
		}
	}

	fn build_children(&mut self, dataset: &mut Dataset, split: Split, depth: usize) -> Node {
		dataset.sort(split.column);

		let split_row = dataset
			.column(split.column)
			.take_while(|&f| f < split.value)
			.count();

		let (left, right) = dataset.split(split_row, |x| Box::new(self.build(x, depth + 1)));

		Node::Children {
			left, right, split
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
	root: Node,
	n_features: usize,
}

impl DecisionTree {
	pub fn root(&self) -> &Node {
		&self.root
	}
}

impl Classifier for DecisionTree {
	fn predict(&self, x: &[f64]) -> f64 {
		self.root.predict(x)
	}

	fn n_features(&self) -> usize {
		self.n_features
	}

	fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
		write_u16_len(writer, self.n_features, "input width")?;
		self.root.serialize(writer)
	}

	fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
		let n_features = reader.read_u16::<BigEndian>()? as usize;
		let root = Node::deserialize(reader)?;

		if root.max_column().map_or(false, |c| c >= n_features) {
			return Err(std::io::Error::new(
				std::io::ErrorKind::InvalidData,
				format!("tree splits on a column beyond its {} inputs", n_features),
			));
		}

		Ok(Self {
			root,
			n_features,
		})
	}
}

pub struct DecisionTreeBuilder {
	pub max_features: Option<usize>,
	pub max_depth: usize,
	pub min_samples_split: usize,
}

impl Default for DecisionTreeBuilder {
	fn default() -> Self {
		Self {
			max_features: None,
			max_depth: 32,
			min_samples_split: 2,
		}
	}
}

impl DecisionTreeBuilder {
	pub fn fit<R: Rng + ?Sized>(&self, rng: &mut R, mut dataset: Dataset, weights: &ClassWeights) -> DecisionTree {
		let n_features = dataset.features_len();
		let max_features = self.max_features.unwrap_or(n_features);
		let root = (NodeBuilder {
			max_features,
			max_depth: self.max_depth.min(node::MAX_DEPTH),
			min_samples_split: self.min_samples_split,
			weights,
			rng
		}).build(&mut dataset, 1);

		DecisionTree { root, n_features }
	}
}
