//! Named feature order shared by the dataset loader and the prediction
//! adapter. Scaler and forest artifacts record `FEATURES.len()` as their
//! input width.

/// Dataset columns, in the order they enter the feature vector.
pub const FEATURES: [&str; 11] = [
	"CreditScore",
	"Gender",
	"Age",
	"Tenure",
	"Balance",
	"NumOfProducts",
	"HasCrCard",
	"IsActiveMember",
	"EstimatedSalary",
	"Geography_Germany",
	"Geography_Spain",
];

pub const LABEL: &str = "Exited";

/// Identifier columns present in the dataset but never used as features.
pub const DROPPED: [&str; 3] = ["RowNumber", "CustomerId", "Surname"];

/// Raw columns a training file must carry. `Geography` expands into the two
/// one-hot flags of `FEATURES`.
pub const REQUIRED: [&str; 11] = [
	"CreditScore",
	"Geography",
	"Gender",
	"Age",
	"Tenure",
	"Balance",
	"NumOfProducts",
	"HasCrCard",
	"IsActiveMember",
	"EstimatedSalary",
	LABEL,
];

pub fn width() -> usize {
	FEATURES.len()
}

pub fn position(name: &str) -> Option<usize> {
	FEATURES.iter().position(|&f| f == name)
}
