use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChurnError>;

#[derive(Debug, Error)]
pub enum ChurnError {
	/// Dataset missing, unreadable or holding unparsable cells.
	#[error("failed to load dataset {path}: {message}")]
	DataLoad { path: PathBuf, message: String },

	#[error("dataset {path} is missing required column `{column}`")]
	Schema { path: PathBuf, column: String },

	/// Artifact missing, truncated or not written by this crate.
	#[error("failed to load artifact {path}: {message}")]
	ArtifactLoad { path: PathBuf, message: String },

	/// Artifact input width disagrees with the feature schema.
	#[error("{artifact} expects {actual} features, encoder produces {expected}")]
	VersionMismatch {
		artifact: &'static str,
		expected: usize,
		actual: usize,
	},

	#[error("unknown {field} `{value}`")]
	Encoding { field: &'static str, value: String },

	#[error("{field} = {value} is outside {min}..={max}")]
	Validation {
		field: &'static str,
		value: f64,
		min: f64,
		max: f64,
	},

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl ChurnError {
	pub(crate) fn data_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
		Self::DataLoad {
			path: path.into(),
			message: message.to_string(),
		}
	}

	pub(crate) fn artifact_load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
		Self::ArtifactLoad {
			path: path.into(),
			message: message.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn messages_name_the_offending_field() {
		let err = ChurnError::Validation { field: "Age", value: 130.0, min: 18.0, max: 100.0 };
		assert_eq!(err.to_string(), "Age = 130 is outside 18..=100");

		let err = ChurnError::Encoding { field: "Country", value: "Italy".into() };
		assert_eq!(err.to_string(), "unknown Country `Italy`");
	}
}
