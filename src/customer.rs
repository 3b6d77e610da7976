//! Raw customer input and its encoding into the classifier's feature vector.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::{ChurnError, Result};
use crate::schema;

pub type FeatureVector = [f64; 11];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Gender {
	Male,
	Female,
}

impl Gender {
	pub fn code(self) -> f64 {
		match self {
			Gender::Male => 1.0,
			Gender::Female => 0.0,
		}
	}
}

impl FromStr for Gender {
	type Err = ChurnError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim() {
			"Male" => Ok(Gender::Male),
			"Female" => Ok(Gender::Female),
			other => Err(ChurnError::Encoding { field: "Gender", value: other.to_string() }),
		}
	}
}

impl fmt::Display for Gender {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Gender::Male => "Male",
			Gender::Female => "Female",
		})
	}
}

/// France is the baseline: both geography flags stay 0.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Country {
	France,
	Germany,
	Spain,
}

impl Country {
	/// `[IsGermany, IsSpain]`
	pub fn flags(self) -> [f64; 2] {
		match self {
			Country::France => [0.0, 0.0],
			Country::Germany => [1.0, 0.0],
			Country::Spain => [0.0, 1.0],
		}
	}
}

impl FromStr for Country {
	type Err = ChurnError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim() {
			"France" => Ok(Country::France),
			"Germany" => Ok(Country::Germany),
			"Spain" => Ok(Country::Spain),
			other => Err(ChurnError::Encoding { field: "Country", value: other.to_string() }),
		}
	}
}

impl fmt::Display for Country {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Country::France => "France",
			Country::Germany => "Germany",
			Country::Spain => "Spain",
		})
	}
}

/// Accepts `Yes`/`No` as well as the dataset's `1`/`0`.
pub fn parse_flag(field: &'static str, s: &str) -> Result<bool> {
	match s.trim() {
		"Yes" | "yes" | "1" | "true" => Ok(true),
		"No" | "no" | "0" | "false" => Ok(false),
		other => Err(ChurnError::Encoding { field, value: other.to_string() }),
	}
}

pub const CREDIT_SCORE: RangeInclusive<u32> = 300..=900;
pub const AGE: RangeInclusive<u32> = 18..=100;
pub const TENURE: RangeInclusive<u32> = 0..=10;
pub const BALANCE: RangeInclusive<f64> = 0.0..=300_000.0;
pub const NUM_PRODUCTS: RangeInclusive<u32> = 1..=4;
pub const SALARY: RangeInclusive<f64> = 0.0..=200_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
	pub credit_score: u32,
	pub gender: Gender,
	pub age: u32,
	pub tenure: u32,
	pub balance: f64,
	pub num_products: u32,
	pub has_credit_card: bool,
	pub is_active_member: bool,
	pub estimated_salary: f64,
	pub country: Country,
}

impl Default for CustomerRecord {
	fn default() -> Self {
		Self {
			credit_score: 600,
			gender: Gender::Male,
			age: 35,
			tenure: 3,
			balance: 50_000.0,
			num_products: 1,
			has_credit_card: true,
			is_active_member: true,
			estimated_salary: 50_000.0,
			country: Country::France,
		}
	}
}

fn check_int(field: &'static str, value: u32, range: &RangeInclusive<u32>) -> Result<()> {
	if range.contains(&value) {
		return Ok(());
	}

	Err(ChurnError::Validation {
		field,
		value: value as f64,
		min: *range.start() as f64,
		max: *range.end() as f64,
	})
}

fn check_float(field: &'static str, value: f64, range: &RangeInclusive<f64>) -> Result<()> {
	// NaN fails `contains`, which is what we want
	if range.contains(&value) {
		return Ok(());
	}

	Err(ChurnError::Validation {
		field,
		value,
		min: *range.start(),
		max: *range.end(),
	})
}

impl CustomerRecord {
	pub fn validate(&self) -> Result<()> {
		check_int("CreditScore", self.credit_score, &CREDIT_SCORE)?;
		check_int("Age", self.age, &AGE)?;
		check_int("Tenure", self.tenure, &TENURE)?;
		check_float("Balance", self.balance, &BALANCE)?;
		check_int("NumOfProducts", self.num_products, &NUM_PRODUCTS)?;
		check_float("EstimatedSalary", self.estimated_salary, &SALARY)?;

		Ok(())
	}

	/// Lays the record out in `schema::FEATURES` order. No range checks; the
	/// training loader feeds historical rows through here as well.
	pub fn encode(&self) -> FeatureVector {
		let [is_germany, is_spain] = self.country.flags();

		let vector = [
			self.credit_score as f64,
			self.gender.code(),
			self.age as f64,
			self.tenure as f64,
			self.balance,
			self.num_products as f64,
			if self.has_credit_card { 1.0 } else { 0.0 },
			if self.is_active_member { 1.0 } else { 0.0 },
			self.estimated_salary,
			is_germany,
			is_spain,
		];
		debug_assert_eq!(vector.len(), schema::width());

		vector
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lowest() -> CustomerRecord {
		CustomerRecord {
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
		}
	}

	fn highest() -> CustomerRecord {
		CustomerRecord {
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
		}
	}

	#[test]
	fn lower_boundary_encodes() {
		let record = lowest();
		assert!(record.validate().is_ok());
		assert_eq!(
			record.encode(),
			[300.0, 0.0, 18.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]
		);
	}

	#[test]
	fn upper_boundary_encodes() {
		let record = highest();
		assert!(record.validate().is_ok());
		assert_eq!(
			record.encode(),
			[900.0, 1.0, 100.0, 10.0, 300_000.0, 4.0, 1.0, 1.0, 200_000.0, 0.0, 1.0]
		);
	}

	#[test]
	fn country_flags() {
		assert_eq!(Country::France.flags(), [0.0, 0.0]);
		assert_eq!(Country::Germany.flags(), [1.0, 0.0]);
		assert_eq!(Country::Spain.flags(), [0.0, 1.0]);

		let mut record = lowest();
		record.country = Country::Germany;
		assert_eq!(&record.encode()[9..], &[1.0, 0.0]);
	}

	#[test]
	fn gender_codes() {
		assert_eq!(Gender::Male.code(), 1.0);
		assert_eq!(Gender::Female.code(), 0.0);
	}

	#[test]
	fn encoding_is_deterministic() {
		let record = CustomerRecord::default();
		assert_eq!(record.encode(), record.clone().encode());
	}

	#[test]
	fn unknown_categories_are_rejected() {
		assert!(matches!(
			"Italy".parse::<Country>(),
			Err(ChurnError::Encoding { field: "Country", .. })
		));
		assert!(matches!(
			"other".parse::<Gender>(),
			Err(ChurnError::Encoding { field: "Gender", .. })
		));
		assert!(parse_flag("HasCrCard", "maybe").is_err());
		assert_eq!(" Germany ".parse::<Country>().unwrap(), Country::Germany);
		assert!(parse_flag("HasCrCard", "1").unwrap());
	}

	#[test]
	fn out_of_range_fields_fail_validation() {
		let mut record = lowest();
		record.age = 17;
		assert!(matches!(record.validate(), Err(ChurnError::Validation { field: "Age", .. })));

		let mut record = highest();
		record.balance = 300_000.5;
		assert!(matches!(record.validate(), Err(ChurnError::Validation { field: "Balance", .. })));

		let mut record = highest();
		record.estimated_salary = f64::NAN;
		assert!(matches!(
			record.validate(),
			Err(ChurnError::Validation { field: "EstimatedSalary", .. })
		));
	}
}
