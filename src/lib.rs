//! Customer churn prediction over a random forest.
//!
//! A [`provider::ModelProvider`] builds the immutable (classifier, scaler)
//! pair once, either by training on a labeled CSV or by loading saved
//! artifacts. A [`predictor::Predictor`] shares that pair and turns
//! [`customer::CustomerRecord`]s into a [`predictor::Prediction`].

pub mod churn_data;
pub mod classifier;
pub mod customer;
pub mod dataset;
pub mod decision_tree;
pub mod error;
pub mod form;
pub mod functions;
pub mod node;
pub mod predictor;
pub mod provider;
pub mod random_forest;
pub mod scaler;
pub mod schema;

pub use customer::{Country, CustomerRecord, FeatureVector, Gender};
pub use error::{ChurnError, Result};
pub use predictor::{Prediction, Predictor};
pub use provider::{LoadPretrained, Model, ModelProvider, TrainOnStart};
