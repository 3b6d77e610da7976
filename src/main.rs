use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use churn_forest::form::Form;
use churn_forest::node::MAX_DEPTH;
use churn_forest::provider::{self, LoadPretrained, ModelProvider, TrainOnStart};
use churn_forest::random_forest::{ClassWeight, RandomForestBuilder};
use churn_forest::{churn_data, Country, CustomerRecord, Gender, Predictor};

/// Customer churn prediction with a random forest
#[derive(Parser, Debug)]
#[command(name = "churn-forest")]
#[command(author, version, about, long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Train on a labeled dataset and save the model artifacts
	Fit(FitCommand),

	/// Predict churn for one customer given on the command line
	Predict(PredictCommand),

	/// Predict churn for every customer in a CSV file
	Evaluate(EvaluateCommand),

	/// Ask for customer details interactively
	Form(FormCommand),
}

/// Where the model comes from: saved artifacts or training at startup.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct ModelSource {
	/// Directory holding `model.forest` and `model.scaler`
	#[arg(long, short = 'm', env = "CHURN_MODEL_DIR")]
	model_dir: Option<PathBuf>,

	/// Labeled dataset to train on before predicting
	#[arg(long, short = 'd', env = "CHURN_DATASET")]
	dataset: Option<PathBuf>,
}

impl ModelSource {
	fn predictor(&self, forest: RandomForestBuilder) -> Result<Predictor> {
		let provider: Box<dyn ModelProvider> = match (&self.model_dir, &self.dataset) {
			(Some(dir), _) => Box::new(LoadPretrained::from_dir(dir)),
			(None, Some(dataset)) => Box::new(TrainOnStart::new(dataset, forest)),
			(None, None) => anyhow::bail!("either --model-dir or --dataset is required"),
		};

		let model = provider.provide().context("failed to prepare the model")?;
		Ok(Predictor::new(model))
	}
}

#[derive(Args, Debug, Clone)]
struct ForestArgs {
	/// Number of trees in the forest
	#[arg(long, default_value = "200", value_parser = RangedU64ValueParser::<usize>::new().range(1..=u16::MAX as u64))]
	trees: usize,

	/// Maximum depth of each tree
	#[arg(long, default_value = "32", value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_DEPTH as u64))]
	max_depth: usize,

	/// Bootstrap sample size as a share of the training rows
	#[arg(long, default_value = "1.0")]
	bag_amount: f64,

	/// Seed for reproducible forests
	#[arg(long, default_value = "42")]
	seed: u64,

	/// Weight every class equally instead of balancing churners against stayers
	#[arg(long)]
	unweighted: bool,
}

impl ForestArgs {
	fn builder(&self) -> RandomForestBuilder {
		RandomForestBuilder {
			n_trees: self.trees,
			max_depth: self.max_depth,
			bag_amount: self.bag_amount,
			class_weight: if self.unweighted { ClassWeight::Uniform } else { ClassWeight::Balanced },
			seed: Some(self.seed),
		}
	}
}

#[derive(Args, Debug)]
struct FitCommand {
	/// Labeled dataset (Churn_Modelling.csv layout)
	#[arg(long, short = 'd', env = "CHURN_DATASET")]
	dataset: PathBuf,

	/// Directory to write the model artifacts into
	#[arg(long, short = 'm', env = "CHURN_MODEL_DIR")]
	model_dir: PathBuf,

	/// Share of rows held out to score the model
	#[arg(long, default_value = "0.2")]
	test_rate: f64,

	#[command(flatten)]
	forest: ForestArgs,
}

impl FitCommand {
	fn run(self) -> Result<()> {
		let fitted = provider::train(&self.dataset, &self.forest.builder(), self.test_rate)
			.with_context(|| format!("failed to train on {}", self.dataset.display()))?;

		println!("Classification rate train: {:.3}%", fitted.train.accuracy * 100.0);
		if let Some(test) = fitted.test {
			println!("Classification rate test: {:.3}% (churn recall {:.3}%)", test.accuracy * 100.0, test.recall * 100.0);
		}

		fitted.model.save(&self.model_dir)
			.with_context(|| format!("failed to save model to {}", self.model_dir.display()))?;
		info!(dir = %self.model_dir.display(), "model saved");

		Ok(())
	}
}

#[derive(Args, Debug)]
struct CustomerArgs {
	#[arg(long, default_value = "600")]
	credit_score: u32,

	/// Male or Female
	#[arg(long, default_value = "Male")]
	gender: String,

	#[arg(long, default_value = "35")]
	age: u32,

	/// Years as a customer
	#[arg(long, default_value = "3")]
	tenure: u32,

	#[arg(long, default_value = "50000")]
	balance: f64,

	#[arg(long, default_value = "1")]
	num_products: u32,

	/// Yes or No
	#[arg(long, default_value = "Yes")]
	has_credit_card: String,

	/// Yes or No
	#[arg(long, default_value = "Yes")]
	is_active_member: String,

	#[arg(long, default_value = "50000")]
	estimated_salary: f64,

	/// France, Germany or Spain
	#[arg(long, default_value = "France")]
	country: String,
}

impl CustomerArgs {
	fn record(&self) -> Result<CustomerRecord> {
		Ok(CustomerRecord {
			credit_score: self.credit_score,
			gender: self.gender.parse::<Gender>()?,
			age: self.age,
			tenure: self.tenure,
			balance: self.balance,
			num_products: self.num_products,
			has_credit_card: churn_forest::customer::parse_flag("HasCrCard", &self.has_credit_card)?,
			is_active_member: churn_forest::customer::parse_flag("IsActiveMember", &self.is_active_member)?,
			estimated_salary: self.estimated_salary,
			country: self.country.parse::<Country>()?,
		})
	}
}

#[derive(Args, Debug)]
struct PredictCommand {
	#[command(flatten)]
	source: ModelSource,

	#[command(flatten)]
	customer: CustomerArgs,

	#[command(flatten)]
	forest: ForestArgs,
}

impl PredictCommand {
	fn run(self) -> Result<()> {
		let record = self.customer.record()?;
		let predictor = self.source.predictor(self.forest.builder())?;

		let prediction = predictor.predict(&record)?;
		println!("{}", prediction.message());

		Ok(())
	}
}

#[derive(Args, Debug)]
struct EvaluateCommand {
	#[command(flatten)]
	source: ModelSource,

	/// Customers to score (dataset layout, `Exited` optional)
	#[arg(long, short = 'i')]
	input: PathBuf,

	/// File receiving one `Stay`/`Churn` line per customer
	#[arg(long, short = 'o')]
	output: PathBuf,

	#[command(flatten)]
	forest: ForestArgs,
}

impl EvaluateCommand {
	fn run(self) -> Result<()> {
		let predictor = self.source.predictor(self.forest.builder())?;
		let customers = churn_data::read_customers(&self.input)?;

		info!(customers = customers.len(), "classifying customers");
		let predictions = predictor.predict_all(&customers)?;

		let mut writer = BufWriter::new(File::create(&self.output)
			.with_context(|| format!("failed to create {}", self.output.display()))?);
		for prediction in &predictions {
			writeln!(writer, "{}", prediction)?;
		}
		writer.flush()?;

		info!(output = %self.output.display(), "predictions written");
		Ok(())
	}
}

#[derive(Args, Debug)]
struct FormCommand {
	#[command(flatten)]
	source: ModelSource,

	#[command(flatten)]
	forest: ForestArgs,
}

impl FormCommand {
	fn run(self) -> Result<()> {
		let predictor = self.source.predictor(self.forest.builder())?;

		let stdin = io::stdin();
		let mut form = Form::new(stdin.lock(), io::stdout());
		let scored = form.run(&predictor)?;
		info!(scored, "form closed");

		Ok(())
	}
}

fn main() -> Result<()> {
	tracing_subscriber::registry()
		.with(fmt::layer().with_writer(io::stderr))
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("churn_forest=info")))
		.init();

	let cli = Cli::parse();

	match cli.command {
		Commands::Fit(cmd) => cmd.run(),
		Commands::Predict(cmd) => cmd.run(),
		Commands::Evaluate(cmd) => cmd.run(),
		Commands::Form(cmd) => cmd.run(),
	}
}
