use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

use tracing::{debug, info};

use crate::customer::{parse_flag, CustomerRecord};
use crate::dataset;
use crate::error::{ChurnError, Result};
use crate::schema;

/// Header lookup for one CSV file. Columns are found by name, so files may
/// order them freely and carry extra ones.
struct Header {
	columns: HashMap<String, usize>,
}

impl Header {
	fn parse(line: &str) -> Self {
		let columns = split_row(line)
			.into_iter()
			.enumerate()
			.map(|(i, name)| (name.to_string(), i))
			.collect();

		Self { columns }
	}

	fn require(&self, path: &Path, names: &[&str]) -> Result<()> {
		match names.iter().find(|name| !self.columns.contains_key(**name)) {
			Some(missing) => Err(ChurnError::Schema {
				path: path.to_path_buf(),
				column: missing.to_string(),
			}),
			None => Ok(()),
		}
	}

	fn has(&self, name: &str) -> bool {
		self.columns.contains_key(name)
	}

	fn cell<'r>(&self, row: &[&'r str], name: &str) -> Option<&'r str> {
		self.columns.get(name).and_then(|&i| row.get(i)).copied()
	}
}

fn split_row(line: &str) -> Vec<&str> {
	line.split(',')
		.map(|x| x.trim().trim_matches('"'))
		.collect()
}

struct Row<'h, 'r> {
	header: &'h Header,
	cells: Vec<&'r str>,
	line: usize,
}

impl<'h, 'r> Row<'h, 'r> {
	fn cell(&self, path: &Path, name: &str) -> Result<&'r str> {
		self.header
			.cell(&self.cells, name)
			.ok_or_else(|| ChurnError::data_load(path, format!("line {}: no value for {}", self.line, name)))
	}

	fn number<T: std::str::FromStr>(&self, path: &Path, name: &str) -> Result<T> {
		let raw = self.cell(path, name)?;

		raw.parse::<T>()
			.or_else(|_| {
				// integer columns are sometimes exported as `600.0`
				raw.parse::<f64>()
					.ok()
					.filter(|v| v.fract() == 0.0 && *v >= 0.0)
					.and_then(|v| (v as u64).to_string().parse::<T>().ok())
					.ok_or(())
			})
			.map_err(|_| ChurnError::data_load(path, format!("line {}: {} = `{}` is not a number", self.line, name, raw)))
	}

	fn record(&self, path: &Path) -> Result<CustomerRecord> {
		let encoding = |err: ChurnError| match err {
			ChurnError::Encoding { field, value } => ChurnError::data_load(
				path,
				format!("line {}: unknown {} `{}`", self.line, field, value),
			),
			other => other,
		};

		Ok(CustomerRecord {
			credit_score: self.number(path, "CreditScore")?,
			gender: self.cell(path, "Gender")?.parse().map_err(encoding)?,
			age: self.number(path, "Age")?,
			tenure: self.number(path, "Tenure")?,
			balance: self.number(path, "Balance")?,
			num_products: self.number(path, "NumOfProducts")?,
			has_credit_card: parse_flag("HasCrCard", self.cell(path, "HasCrCard")?).map_err(encoding)?,
			is_active_member: parse_flag("IsActiveMember", self.cell(path, "IsActiveMember")?).map_err(encoding)?,
			estimated_salary: self.number(path, "EstimatedSalary")?,
			country: self.cell(path, "Geography")?.parse().map_err(encoding)?,
		})
	}
}

/// Walks the data lines of a CSV file, handing each parsed row to `f`.
/// Identifier columns are never read.
fn for_each_row<F>(path: &Path, required: &[&str], mut f: F) -> Result<usize>
where
	F: FnMut(&Row) -> Result<()>,
{
	let file = fs::File::open(path).map_err(|e| ChurnError::data_load(path, e))?;
	let mut lines = io::BufReader::new(file).lines();

	let header = match lines.next() {
		Some(line) => Header::parse(&line.map_err(|e| ChurnError::data_load(path, e))?),
		None => return Err(ChurnError::data_load(path, "file is empty")),
	};
	header.require(path, required)?;

	let ignored = schema::DROPPED.iter().filter(|c| header.has(c)).count();
	debug!(ignored, "dataset header parsed");

	let mut rows = 0;
	for (i, line) in lines.enumerate() {
		let line = line.map_err(|e| ChurnError::data_load(path, e))?;
		if line.trim().is_empty() {
			continue;
		}

		let row = Row {
			header: &header,
			cells: split_row(&line),
			line: i + 2,
		};
		f(&row)?;

		rows += 1;
		if rows % 1000 == 0 {
			debug!(rows, "reading dataset");
		}
	}

	Ok(rows)
}

/// Loads a labeled churn CSV into feature columns ordered as
/// `schema::FEATURES`, with `Exited` as the target.
pub fn read(path: &Path) -> Result<dataset::Builder> {
	info!(path = %path.display(), "reading dataset");

	let mut builder = dataset::Builder::new();
	for_each_row(path, &schema::REQUIRED, |row| {
		let record = row.record(path)?;
		let label = match row.number::<u8>(path, schema::LABEL) {
			Ok(class) if class <= 1 => f64::from(class),
			_ => return Err(ChurnError::data_load(
				path,
				format!("line {}: {} = `{}` is not 0 or 1", row.line, schema::LABEL, row.cell(path, schema::LABEL)?),
			)),
		};

		builder.add(&record.encode(), label);
		Ok(())
	})?;

	if builder.is_empty() {
		return Err(ChurnError::data_load(path, "no data rows"));
	}

	info!(rows = builder.rows_len(), "dataset read");
	Ok(builder)
}

/// Loads customers without requiring a label column, for batch scoring.
pub fn read_customers(path: &Path) -> Result<Vec<CustomerRecord>> {
	let required = schema::REQUIRED
		.iter()
		.copied()
		.filter(|&c| c != schema::LABEL)
		.collect::<Vec<_>>();

	let mut customers = Vec::new();
	for_each_row(path, &required, |row| {
		customers.push(row.record(path)?);
		Ok(())
	})?;

	info!(path = %path.display(), rows = customers.len(), "customers read");
	Ok(customers)
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::customer::{Country, Gender};
	use std::io::Write;
	use tempfile::NamedTempFile;

	pub const HEADER: &str = "RowNumber,CustomerId,Surname,CreditScore,Geography,Gender,Age,Tenure,Balance,NumOfProducts,HasCrCard,IsActiveMember,EstimatedSalary,Exited";

	pub fn write_csv(lines: &[String]) -> NamedTempFile {
		let mut file = NamedTempFile::new().unwrap();
		for line in lines {
			writeln!(file, "{}", line).unwrap();
		}
		file
	}

	/// Synthetic book of customers where inactive older German customers churn.
	pub fn synthetic_rows(n: usize) -> Vec<String> {
		let mut lines = vec![HEADER.to_string()];
		let countries = ["France", "Germany", "Spain"];

		for i in 0..n {
			let country = countries[i % 3];
			let gender = if (i / 5) % 2 == 0 { "Male" } else { "Female" };
			let age = 18 + (i * 7) % 70;
			let active = (i / 7) % 2;
			let exited = (age > 45 && active == 0 && country == "Germany") as u8;

			lines.push(format!(
				"{},{},Name{},{},{},{},{},{},{:.2},{},{},{},{:.2},{}",
				i + 1,
				15_600_000 + i,
				i,
				350 + (i * 13) % 500,
				country,
				gender,
				age,
				i % 11,
				(i * 977) as f64 % 250_000.0,
				1 + (i / 13) % 4,
				(i / 11) % 2,
				active,
				(i * 1_531) as f64 % 199_000.0,
				exited,
			));
		}

		lines
	}

	#[test]
	fn reads_features_in_schema_order() {
		let file = write_csv(&[
			HEADER.to_string(),
			"1,15634602,Hargrave,619,France,Female,42,2,0.00,1,1,1,101348.88,1".to_string(),
			"2,15647311,Hill,608,Spain,Female,41,1,83807.86,1,0,1,112542.58,0".to_string(),
			"".to_string(),
		]);

		let builder = read(file.path()).unwrap();
		assert_eq!(builder.rows_len(), 2);
		assert_eq!(builder.targets(), &[1.0, 0.0]);

		let columns = builder.columns();
		assert_eq!(columns.len(), schema::width());
		assert_eq!(columns[0], vec![619.0, 608.0]);
		assert_eq!(columns[4], vec![0.0, 83807.86]);
		assert_eq!(columns[9], vec![0.0, 0.0]);
		assert_eq!(columns[10], vec![0.0, 1.0]);
	}

	#[test]
	fn labels_follow_the_whole_number_rule() {
		let file = write_csv(&[
			HEADER.to_string(),
			"1,1,A,600.0,France,Male,40,2,0.0,1,1,1,100.0,1.0".to_string(),
			"2,2,B,610,Spain,Female,41,3,0.0,2,0,1,200.0,0.0".to_string(),
			"3,3,C,620,Germany,Male,42,4,0.0,1,1,0,300.0,1".to_string(),
		]);
		assert_eq!(read(file.path()).unwrap().targets(), &[1.0, 0.0, 1.0]);

		for label in &["2", "0.5", "-1", "yes"] {
			let file = write_csv(&[
				HEADER.to_string(),
				format!("1,1,A,600,France,Male,40,2,0.0,1,1,1,100.0,{}", label),
			]);
			assert!(matches!(read(file.path()), Err(ChurnError::DataLoad { .. })), "label {}", label);
		}
	}

	#[test]
	fn column_order_is_free() {
		let file = write_csv(&[
			"Exited,Geography,Gender,CreditScore,Age,Tenure,Balance,NumOfProducts,HasCrCard,IsActiveMember,EstimatedSalary".to_string(),
			"0,Germany,Male,700,30,5,1000.5,2,1,0,5000".to_string(),
		]);

		let builder = read(file.path()).unwrap();
		let row = (0..schema::width()).map(|c| builder.columns()[c][0]).collect::<Vec<_>>();
		assert_eq!(row, vec![700.0, 1.0, 30.0, 5.0, 1000.5, 2.0, 1.0, 0.0, 5000.0, 1.0, 0.0]);
	}

	#[test]
	fn missing_column_is_a_schema_error() {
		let file = write_csv(&[
			"RowNumber,CreditScore,Geography,Gender,Age".to_string(),
			"1,600,France,Male,40".to_string(),
		]);

		match read(file.path()) {
			Err(ChurnError::Schema { column, .. }) => assert_eq!(column, "Tenure"),
			other => panic!("expected schema error, got {:?}", other),
		}
	}

	#[test]
	fn missing_or_malformed_files_fail_to_load() {
		assert!(matches!(
			read(Path::new("/definitely/not/here.csv")),
			Err(ChurnError::DataLoad { .. })
		));

		let empty = write_csv(&[]);
		assert!(matches!(read(empty.path()), Err(ChurnError::DataLoad { .. })));

		let header_only = write_csv(&[HEADER.to_string()]);
		assert!(matches!(read(header_only.path()), Err(ChurnError::DataLoad { .. })));

		let bad = write_csv(&[
			HEADER.to_string(),
			"1,1,X,abc,France,Male,42,2,0.0,1,1,1,100.0,1".to_string(),
		]);
		assert!(matches!(read(bad.path()), Err(ChurnError::DataLoad { .. })));

		let unknown_country = write_csv(&[
			HEADER.to_string(),
			"1,1,X,600,Italy,Male,42,2,0.0,1,1,1,100.0,1".to_string(),
		]);
		assert!(matches!(read(unknown_country.path()), Err(ChurnError::DataLoad { .. })));
	}

	#[test]
	fn customers_need_no_label() {
		let file = write_csv(&[
			"CreditScore,Geography,Gender,Age,Tenure,Balance,NumOfProducts,HasCrCard,IsActiveMember,EstimatedSalary".to_string(),
			"650.0,Spain,Male,33,4,0,2,0,1,42000".to_string(),
		]);

		let customers = read_customers(file.path()).unwrap();
		assert_eq!(customers.len(), 1);
		assert_eq!(customers[0].credit_score, 650);
		assert_eq!(customers[0].gender, Gender::Male);
		assert_eq!(customers[0].country, Country::Spain);
		assert!(!customers[0].has_credit_card);
	}

	#[test]
	fn synthetic_rows_parse() {
		let file = write_csv(&synthetic_rows(30));
		assert_eq!(read(file.path()).unwrap().rows_len(), 30);
	}
}
