//! Line-oriented customer form. Each field is asked in turn with its default;
//! numbers outside a field's range are clamped the way a bounded input widget
//! would, and unparsable answers are asked again.

use std::fmt::Display;
use std::io::{self, BufRead, Write};

use num_traits::NumCast;
use tracing::warn;

use crate::customer::{self, parse_flag, Country, CustomerRecord, Gender};
use crate::error::Result;
use crate::predictor::Predictor;

pub struct Form<R, W> {
	input: R,
	output: W,
}

impl<R: BufRead, W: Write> Form<R, W> {
	pub fn new(input: R, output: W) -> Self {
		Self { input, output }
	}

	pub fn into_output(self) -> W {
		self.output
	}

	fn ask(&mut self, question: &str) -> io::Result<Option<String>> {
		write!(self.output, "{}", question)?;
		self.output.flush()?;

		let mut line = String::new();
		if self.input.read_line(&mut line)? == 0 {
			return Ok(None);
		}

		Ok(Some(line.trim().to_string()))
	}

	fn eof() -> io::Error {
		io::Error::new(io::ErrorKind::UnexpectedEof, "form closed before all fields were answered")
	}

	fn number<T>(&mut self, label: &str, min: T, max: T, default: T) -> io::Result<T>
	where
		T: NumCast + Copy + Display,
	{
		let question = format!("{} [{}-{}] ({}): ", label, min, max, default);
		let lo = min.to_f64().unwrap_or(std::f64::MIN);
		let hi = max.to_f64().unwrap_or(std::f64::MAX);

		loop {
			let answer = self.ask(&question)?.ok_or_else(Self::eof)?;
			if answer.is_empty() {
				return Ok(default);
			}

			match answer.parse::<f64>().ok().filter(|v| v.is_finite()) {
				Some(v) if v < lo => {
					warn!(field = label, value = v, clamped = lo, "input below range");
					return Ok(min);
				},
				Some(v) if v > hi => {
					warn!(field = label, value = v, clamped = hi, "input above range");
					return Ok(max);
				},
				Some(v) => return Ok(T::from(v).unwrap_or(default)),
				None => writeln!(self.output, "  `{}` is not a number", answer)?,
			}
		}
	}

	fn choice<T>(&mut self, label: &str, options: &[&str], default: &str, parse: impl Fn(&str) -> Result<T>) -> io::Result<T> {
		let question = format!("{} [{}] ({}): ", label, options.join("/"), default);

		loop {
			let answer = self.ask(&question)?.ok_or_else(Self::eof)?;
			let answer = if answer.is_empty() { default.to_string() } else { answer };

			match parse(&answer) {
				Ok(value) => return Ok(value),
				Err(_) => writeln!(self.output, "  choose one of {}", options.join(", "))?,
			}
		}
	}

	/// Collects one customer, field by field.
	pub fn record(&mut self) -> io::Result<CustomerRecord> {
		let defaults = CustomerRecord::default();

		Ok(CustomerRecord {
			credit_score: self.number("Credit Score", *customer::CREDIT_SCORE.start(), *customer::CREDIT_SCORE.end(), defaults.credit_score)?,
			gender: self.choice("Gender", &["Male", "Female"], "Male", str::parse::<Gender>)?,
			age: self.number("Age", *customer::AGE.start(), *customer::AGE.end(), defaults.age)?,
			tenure: self.number("Tenure (Years)", *customer::TENURE.start(), *customer::TENURE.end(), defaults.tenure)?,
			balance: self.number("Account Balance", *customer::BALANCE.start(), *customer::BALANCE.end(), defaults.balance)?,
			num_products: self.number("Number of Products", *customer::NUM_PRODUCTS.start(), *customer::NUM_PRODUCTS.end(), defaults.num_products)?,
			has_credit_card: self.choice("Has Credit Card?", &["Yes", "No"], "Yes", |s| parse_flag("HasCrCard", s))?,
			is_active_member: self.choice("Is Active Member?", &["Yes", "No"], "Yes", |s| parse_flag("IsActiveMember", s))?,
			estimated_salary: self.number("Estimated Salary", *customer::SALARY.start(), *customer::SALARY.end(), defaults.estimated_salary)?,
			country: self.choice("Country", &["France", "Germany", "Spain"], "France", str::parse::<Country>)?,
		})
	}

	/// Asks for customers until the input ends or the user declines another
	/// round, printing one verdict per customer. Returns how many were scored.
	pub fn run(&mut self, predictor: &Predictor) -> Result<usize> {
		writeln!(self.output, "Customer Churn Prediction")?;
		writeln!(self.output, "Enter customer details to predict churn")?;

		let mut scored = 0;
		loop {
			let record = self.record()?;
			let prediction = predictor.predict(&record)?;
			writeln!(self.output, "{}", prediction.message())?;
			scored += 1;

			match self.ask("Predict another? [y/N]: ")? {
				Some(answer) if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") => continue,
				_ => return Ok(scored),
			}
		}
	}
}
