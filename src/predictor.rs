use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::classifier::Classifier;
use crate::customer::CustomerRecord;
use crate::error::{ChurnError, Result};
use crate::provider::Model;
use crate::schema;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Prediction {
	Stay,
	Churn,
}

impl Prediction {
	/// Classifier output 1 is churn; anything else is read as stay.
	pub fn from_class(class: f64) -> Self {
		if class == 1.0 {
			Prediction::Churn
		} else {
			Prediction::Stay
		}
	}

	pub fn message(self) -> &'static str {
		match self {
			Prediction::Churn => "Customer is likely to CHURN",
			Prediction::Stay => "Customer is likely to STAY",
		}
	}
}

impl fmt::Display for Prediction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Prediction::Stay => "Stay",
			Prediction::Churn => "Churn",
		})
	}
}

/// Encodes, scales and classifies customer records against a shared model.
#[derive(Debug, Clone)]
pub struct Predictor {
	model: Arc<Model>,
}

impl Predictor {
	pub fn new(model: Arc<Model>) -> Self {
		Self { model }
	}

	pub fn predict(&self, record: &CustomerRecord) -> Result<Prediction> {
		record.validate()?;
		self.predict_unchecked(record)
	}

	/// Skips range validation; used for historical rows in batch scoring.
	pub fn predict_unchecked(&self, record: &CustomerRecord) -> Result<Prediction> {
		let features = record.encode();

		let scaler = self.model.scaler();
		let scaled = scaler.transform(&features).ok_or(ChurnError::VersionMismatch {
			artifact: "scaler",
			expected: schema::width(),
			actual: scaler.n_features(),
		})?;

		let prediction = Prediction::from_class(self.model.classifier().predict(&scaled));
		debug!(?features, %prediction, "customer classified");

		Ok(prediction)
	}

	pub fn predict_all(&self, records: &[CustomerRecord]) -> Result<Vec<Prediction>> {
		records.iter().map(|r| self.predict_unchecked(r)).collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::customer::{Country, Gender};
	use crate::provider::tests::trained;

	fn predictor() -> Predictor {
		Predictor::new(Arc::new(trained()))
	}

	#[test]
	fn maps_classes_to_labels() {
		assert_eq!(Prediction::from_class(1.0), Prediction::Churn);
		assert_eq!(Prediction::from_class(0.0), Prediction::Stay);
		assert_eq!(Prediction::Churn.message(), "Customer is likely to CHURN");
		assert_eq!(Prediction::Stay.message(), "Customer is likely to STAY");
	}

	#[test]
	fn predicts_boundaries_without_error() {
		let predictor = predictor();

		let lowest = CustomerRecord {
			credit_score: 300,
			gender: Gender::Female,
			age: 18,
			tenure: 0,
			balance: 0.0,
			num_products: 1,
			has_credit_card: false,
			is_active_member: false,
			estimated_salary: 0.0,
			country: Country::France,
		};
		let highest = CustomerRecord {
			credit_score: 900,
			gender: Gender::Male,
			age: 100,
			tenure: 10,
			balance: 300_000.0,
			num_products: 4,
			has_credit_card: true,
			is_active_member: true,
			estimated_salary: 200_000.0,
			country: Country::Spain,
		};

		for record in &[lowest, highest] {
			let prediction = predictor.predict(record).unwrap();
			assert!(prediction == Prediction::Stay || prediction == Prediction::Churn);
		}
	}

	#[test]
	fn prediction_is_idempotent() {
		let predictor = predictor();
		let record = CustomerRecord { age: 60, is_active_member: false, country: Country::Germany, ..Default::default() };

		let first = predictor.predict(&record).unwrap();
		for _ in 0..5 {
			assert_eq!(predictor.predict(&record).unwrap(), first);
		}
	}

	#[test]
	fn learns_the_synthetic_churn_rule() {
		let predictor = predictor();

		let churner = CustomerRecord { age: 70, is_active_member: false, country: Country::Germany, ..Default::default() };
		let inactive_french = CustomerRecord { age: 70, is_active_member: false, ..Default::default() };
		let loyal = CustomerRecord { age: 25, is_active_member: true, country: Country::France, ..Default::default() };

		assert_eq!(predictor.predict(&churner).unwrap(), Prediction::Churn);
		assert_eq!(predictor.predict(&loyal).unwrap(), Prediction::Stay);
		assert_eq!(predictor.predict(&inactive_french).unwrap(), Prediction::Stay);
	}

	#[test]
	fn out_of_range_input_is_rejected() {
		let record = CustomerRecord { num_products: 7, ..Default::default() };
		assert!(matches!(
			predictor().predict(&record),
			Err(ChurnError::Validation { field: "NumOfProducts", .. })
		));
	}

	#[test]
	fn predictor_is_shareable_across_threads() {
		let predictor = predictor();
		let record = CustomerRecord::default();
		let expected = predictor.predict(&record).unwrap();

		let handles = (0..4)
			.map(|_| {
				let predictor = predictor.clone();
				let record = record.clone();
				std::thread::spawn(move || predictor.predict(&record).unwrap())
			})
			.collect::<Vec<_>>();

		for handle in handles {
			assert_eq!(handle.join().unwrap(), expected);
		}
	}
}
