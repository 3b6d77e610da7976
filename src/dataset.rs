use crate::classifier::Classifier;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use std::ops::Range;
use rand::seq::SliceRandom;
use rand::Rng;
use ordered_float::OrderedFloat;

/// Held-out quality of a classifier on a labeled view.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Score {
	pub accuracy: f64,
	/// Share of positive rows (churners) the classifier caught.
	pub recall: f64,
}

/// Column-major view over a `Builder`'s rows. Sorting and splitting only
/// permute `index` inside `range`; the underlying columns are never touched.
#[derive(Clone, Debug)]
pub struct Dataset<'a> {
	columns: &'a [Vec<f64>],
	targets: &'a [f64],

	index: Vec<usize>,
	range: Range<usize>,
}

impl<'a, 'b> Dataset<'a> {
	pub fn evaluate<C: Classifier + Sync>(&self, classifier: &C) -> Score {
		let outcomes = self.rows()
			.zip(self.targets())
			.collect::<Vec<_>>()
			.into_par_iter()
			.map(|(x, y)| (classifier.predict(&x), y))
			.collect::<Vec<_>>();

		let correct = outcomes.iter().filter(|(p, y)| p == y).count();
		let positives = outcomes.iter().filter(|(_, y)| *y == 1.0).count();
		let caught = outcomes.iter().filter(|(p, y)| *y == 1.0 && *p == 1.0).count();

		Score {
			accuracy: if outcomes.is_empty() { 0.0 } else { correct as f64 / outcomes.len() as f64 },
			recall: if positives == 0 { 0.0 } else { caught as f64 / positives as f64 },
		}
	}

	pub fn sort(&mut self, column: usize) {
		let values = &self.columns[column];
		self.index[self.range.start..self.range.end]
			.sort_by_key(|&x| OrderedFloat(values[x]));
	}

	/// Candidate thresholds between consecutive distinct values of a sorted
	/// column, paired with the row range left of each threshold.
	pub fn get_splits(&'b self, column: usize) -> impl 'b + Iterator<Item = (Range<usize>, f64)> {
		let column = &self.columns[column];

		self.indices()
			.map(move |x| column[x])
			.enumerate()
			.scan(None, |prev: &mut Option<f64>, (i, x)| {
				let split = match *prev {
					Some(y) if (y - x).abs() > std::f64::EPSILON => Some((0..i, (x + y) / 2.0)),
					_ => None,
				};

				*prev = Some(x);
				Some(split)
			})
			.flatten()
	}

	pub fn split<F, T>(&mut self, row: usize, mut f: F) -> (T, T)
	where
		F: FnMut(&mut Self) -> T,
	{
		let row = row + self.range.start;
		let original = self.range.clone();

		self.range.end = row;
		let left = f(self);
		self.range.end = original.end;

		self.range.start = row;
		let right = f(self);
		self.range.start = original.start;

		(left, right)
	}

	pub fn train_test_split<R: Rng + ?Sized>(mut self, rng: &mut R, test_rate: f64) -> (Self, Self) {
		self.index[self.range.start..self.range.end].shuffle(rng);
		let test_num = (self.rows_len() as f64 * test_rate).round() as usize;

		let mut train = self.clone();
		let mut test = self;
		test.range.end = test.range.start + test_num;
		train.range.start = test.range.end;

		(train, test)
	}

	/// Draws `max_samples` rows with replacement.
	pub fn bootstrap<R: Rng + ?Sized>(&self, rng: &mut R, max_samples: usize) -> Self {
		let range = 0..if self.rows_len() == 0 { 0 } else { max_samples };
		let index = range
			.clone()
			.map(|_| self.index[rng.gen_range(self.range.start, self.range.end)])
			.collect::<Vec<_>>();

		Self {
			index,
			range,
			columns: self.columns,
			targets: self.targets
		}
	}

	fn indices(&'b self) -> impl 'b + Iterator<Item = usize> + Clone {
		self.index[self.range.start..self.range.end]
			.iter()
			.copied()
	}

	pub fn targets(&'b self) -> impl 'b + Iterator<Item = f64> {
		self.indices()
			.map(move |i| self.targets[i])
	}

	pub fn column(&'b self, column: usize) -> impl 'b + Iterator<Item = f64> {
		let column = &self.columns[column];

		self.indices()
			.map(move |i| column[i])
	}

	pub fn features_len(&self) -> usize {
		self.columns.len()
	}

	pub fn rows_len(&self) -> usize {
		self.range.end - self.range.start
	}

	pub fn rows(&'b self) -> impl 'b + Iterator<Item = Vec<f64>> {
		self.indices().map(move |i| {
			(0..self.columns.len())
				.map(|j| self.columns[j][i])
				.collect()
		})
	}

	pub fn classify<C: Classifier>(&self, classifier: &C) -> Vec<f64> {
		self.rows()
			.map(|x| classifier.predict(&x))
			.collect()
	}

	/// Copies the rows of this view into a standalone builder.
	pub fn to_builder(&self) -> Builder {
		let mut builder = Builder::new();
		for (x, y) in self.rows().zip(self.targets()) {
			builder.add(&x, y);
		}

		builder
	}
}

#[derive(Debug, Default)]
pub struct Builder {
	columns: Vec<Vec<f64>>,
	targets: Vec<f64>,
}

impl Builder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn build(&self) -> Dataset {
		let range = 0..self.targets.len();

		Dataset {
			columns: &self.columns,
			targets: &self.targets,

			range: range.clone(),
			index: range.collect(),
		}
	}

	pub fn add(&mut self, x: &[f64], y: f64) {
		if self.columns.is_empty() {
			self.columns = vec![Vec::new(); x.len()];
		}

		for (column, value) in self.columns.iter_mut().zip(x) {
			column.push(*value);
		}

		self.targets.push(y);
	}

	pub fn columns(&self) -> &[Vec<f64>] {
		&self.columns
	}

	pub fn targets(&self) -> &[f64] {
		&self.targets
	}

	pub fn rows_len(&self) -> usize {
		self.targets.len()
	}

	pub fn is_empty(&self) -> bool {
		self.targets.is_empty()
	}

	/// Rewrites every row in place, e.g. to apply a fitted scaler.
	pub fn map_rows<F>(&mut self, mut f: F)
	where
		F: FnMut(&[f64]) -> Vec<f64>,
	{
		let mut row = vec![0.0; self.columns.len()];

		for i in 0..self.targets.len() {
			for (slot, column) in row.iter_mut().zip(&self.columns) {
				*slot = column[i];
			}

			for (column, value) in self.columns.iter_mut().zip(f(&row)) {
				column[i] = value;
			}
		}
	}
}
