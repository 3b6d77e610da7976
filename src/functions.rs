use std::collections::BTreeMap;
use ordered_float::OrderedFloat;

pub type Histogram = BTreeMap<OrderedFloat<f64>, f64>;

/// Per-class sample weights. Classes without an entry weigh 1.
#[derive(Clone, Debug, Default)]
pub struct ClassWeights(BTreeMap<OrderedFloat<f64>, f64>);

impl ClassWeights {
	pub fn uniform() -> Self {
		Self::default()
	}

	/// `n_samples / (n_classes * count_c)` for every class seen in `targets`.
	pub fn balanced(targets: impl Iterator<Item = f64>) -> Self {
		let (counts, len) = histogram(targets, &Self::uniform());
		let n_classes = counts.len() as f64;

		Self(counts
			.into_iter()
			.map(|(class, count)| (class, len / (n_classes * count)))
			.collect())
	}

	pub fn get(&self, class: f64) -> f64 {
		self.0.get(&OrderedFloat(class)).copied().unwrap_or(1.0)
	}
}

/// Weighted class histogram and total weight.
pub fn histogram(values: impl Iterator<Item = f64>, weights: &ClassWeights) -> (Histogram, f64) {
	let mut histogram = Histogram::new();
	let mut total = 0.0;

	for value in values {
		let weight = weights.get(value);
		*histogram.entry(OrderedFloat(value)).or_default() += weight;
		total += weight;
	}

	(histogram, total)
}

pub fn gini_val(histogram: &Histogram, total: f64) -> f64 {
	if total <= 0.0 {
		return 0.0;
	}

	1.0 - histogram
		.values()
		.map(|&w| (w / total).powi(2))
		.sum::<f64>()
}

pub fn gini(values: impl Iterator<Item = f64>, weights: &ClassWeights) -> f64 {
	let (histogram, total) = histogram(values, weights);
	gini_val(&histogram, total)
}

/// Heaviest class; ties go to the lowest class so votes are reproducible.
pub fn most_frequent(values: impl Iterator<Item = f64>, weights: &ClassWeights) -> f64 {
	let (histogram, _) = histogram(values, weights);

	histogram
		.into_iter()
		.fold(None, |best: Option<(OrderedFloat<f64>, f64)>, (k, w)| match best {
			Some((_, bw)) if bw >= w => best,
			_ => Some((k, w)),
		})
		.map(|(k, _)| k.into_inner())
		.unwrap_or(0.0)
}
