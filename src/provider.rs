//! Model providers: produce the immutable (classifier, scaler) pair that the
//! predictor shares for the life of the process.
//!
//! Two variants exist. [`TrainOnStart`] fits a forest from a labeled dataset
//! and caches the result, so training happens at most once per provider no
//! matter how often [`ModelProvider::provide`] is called. [`LoadPretrained`]
//! reads the two artifacts written by [`Model::save`].

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::churn_data;
use crate::classifier::Classifier;
use crate::dataset::Score;
use crate::error::{ChurnError, Result};
use crate::random_forest::{RandomForestBuilder, RandomForestClassifier};
use crate::scaler::StandardScaler;
use crate::schema;

pub const FOREST_FILE: &str = "model.forest";
pub const SCALER_FILE: &str = "model.scaler";

/// A fitted classifier with the scaler its inputs went through at fit time.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
	classifier: RandomForestClassifier,
	scaler: StandardScaler,
}

impl Model {
	/// Pairs a classifier with its scaler, checking both against the schema.
	pub fn new(classifier: RandomForestClassifier, scaler: StandardScaler) -> Result<Self> {
		let expected = schema::width();

		if scaler.n_features() != expected {
			return Err(ChurnError::VersionMismatch {
				artifact: "scaler",
				expected,
				actual: scaler.n_features(),
			});
		}

		if classifier.n_features() != expected {
			return Err(ChurnError::VersionMismatch {
				artifact: "classifier",
				expected,
				actual: classifier.n_features(),
			});
		}

		Ok(Self { classifier, scaler })
	}

	pub fn classifier(&self) -> &RandomForestClassifier {
		&self.classifier
	}

	pub fn scaler(&self) -> &StandardScaler {
		&self.scaler
	}

	/// Writes `model.forest` and `model.scaler` into `dir`, creating it.
	pub fn save(&self, dir: &Path) -> Result<()> {
		fs::create_dir_all(dir)?;

		let forest_path = dir.join(FOREST_FILE);
		info!(path = %forest_path.display(), "serializing classifier");
		let mut writer = BufWriter::new(File::create(&forest_path)?);
		self.classifier.serialize(&mut writer)?;
		writer.flush()?;

		let scaler_path = dir.join(SCALER_FILE);
		info!(path = %scaler_path.display(), "serializing scaler");
		let mut writer = BufWriter::new(File::create(&scaler_path)?);
		self.scaler.serialize(&mut writer)?;
		writer.flush()?;

		Ok(())
	}
}

pub trait ModelProvider {
	fn provide(&self) -> Result<Arc<Model>>;
}

/// Outcome of a training run that holds rows out for scoring.
#[derive(Debug)]
pub struct Fitted {
	pub model: Model,
	pub train: Score,
	pub test: Option<Score>,
}

/// Reads `dataset`, fits the scaler on the raw features and the forest on the
/// scaled ones. With `test_rate > 0` a shuffled share of rows is held out
/// before either is fit, then scored.
pub fn train(dataset: &Path, forest: &RandomForestBuilder, test_rate: f64) -> Result<Fitted> {
	let rows = churn_data::read(dataset)?;

	let (mut train_rows, mut test_rows) = if test_rate > 0.0 {
		let mut rng = StdRng::seed_from_u64(forest.seed.unwrap_or_default());
		let (train, test) = rows.build().train_test_split(&mut rng, test_rate);
		(train.to_builder(), Some(test.to_builder()))
	} else {
		(rows, None)
	};

	let scaler = StandardScaler::fit(train_rows.columns());
	let scale = |row: &[f64]| scaler.transform(row).unwrap_or_else(|| row.to_vec());
	train_rows.map_rows(scale);
	if let Some(test_rows) = test_rows.as_mut() {
		test_rows.map_rows(scale);
	}

	let train = train_rows.build();
	let test = test_rows.as_ref().map(|t| t.build());

	let classifier = forest.fit(train.clone());

	let train_score = train.evaluate(&classifier);
	let test_score = test.map(|t| t.evaluate(&classifier));
	info!(
		train_accuracy = train_score.accuracy,
		test_accuracy = test_score.map(|s| s.accuracy),
		test_recall = test_score.map(|s| s.recall),
		"model evaluated"
	);

	Ok(Fitted {
		model: Model::new(classifier, scaler)?,
		train: train_score,
		test: test_score,
	})
}

pub struct TrainOnStart {
	dataset: PathBuf,
	forest: RandomForestBuilder,
	model: OnceCell<Arc<Model>>,
	runs: AtomicUsize,
}

impl TrainOnStart {
	pub fn new(dataset: impl Into<PathBuf>, forest: RandomForestBuilder) -> Self {
		Self {
			dataset: dataset.into(),
			forest,
			model: OnceCell::new(),
			runs: AtomicUsize::new(0),
		}
	}

	/// How many times training actually ran.
	pub fn training_runs(&self) -> usize {
		self.runs.load(Ordering::SeqCst)
	}
}

impl ModelProvider for TrainOnStart {
	fn provide(&self) -> Result<Arc<Model>> {
		self.model
			.get_or_try_init(|| {
				self.runs.fetch_add(1, Ordering::SeqCst);
				let fitted = train(&self.dataset, &self.forest, 0.0)?;
				Ok::<_, ChurnError>(Arc::new(fitted.model))
			})
			.map(Arc::clone)
	}
}

pub struct LoadPretrained {
	forest_path: PathBuf,
	scaler_path: PathBuf,
}

impl LoadPretrained {
	pub fn new(forest_path: impl Into<PathBuf>, scaler_path: impl Into<PathBuf>) -> Self {
		Self {
			forest_path: forest_path.into(),
			scaler_path: scaler_path.into(),
		}
	}

	/// Artifacts as laid out by [`Model::save`].
	pub fn from_dir(dir: &Path) -> Self {
		Self::new(dir.join(FOREST_FILE), dir.join(SCALER_FILE))
	}
}

fn open(path: &Path) -> Result<BufReader<File>> {
	File::open(path)
		.map(BufReader::new)
		.map_err(|e| ChurnError::artifact_load(path, e))
}

impl ModelProvider for LoadPretrained {
	fn provide(&self) -> Result<Arc<Model>> {
		info!(path = %self.forest_path.display(), "deserializing classifier");
		let classifier = RandomForestClassifier::deserialize(&mut open(&self.forest_path)?)
			.map_err(|e| ChurnError::artifact_load(&self.forest_path, e))?;

		info!(path = %self.scaler_path.display(), "deserializing scaler");
		let scaler = StandardScaler::deserialize(&mut open(&self.scaler_path)?)
			.map_err(|e| ChurnError::artifact_load(&self.scaler_path, e))?;

		Ok(Arc::new(Model::new(classifier, scaler)?))
	}
}
