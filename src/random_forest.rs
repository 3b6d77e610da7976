use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::classifier::{expect_end, write_u16_len, Classifier};
use crate::decision_tree::{DecisionTreeBuilder, DecisionTree};
use crate::functions::{most_frequent, ClassWeights};

const MAGIC: &[u8; 4] = b"CHRF";
const FORMAT_VERSION: u16 = 1;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClassWeight {
    Uniform,
    /// Reweights classes inversely to their frequency in the training set.
    Balanced,
}

#[derive(Debug, Clone)]
pub struct RandomForestBuilder {
    pub n_trees: usize,
    pub max_depth: usize,
    pub bag_amount: f64,
    pub class_weight: ClassWeight,
    /// Fixed seed reproduces the same forest; `None` draws one per fit.
    pub seed: Option<u64>,
}

impl Default for RandomForestBuilder {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 32,
            bag_amount: 1.0,
            class_weight: ClassWeight::Balanced,
            seed: Some(42),
        }
    }
}

/// Columns tried per split: the square root of the width, rounded down.
pub fn max_features(n_features: usize) -> usize {
    ((n_features as f64).sqrt().floor() as usize).max(1)
}

impl RandomForestBuilder {
    pub fn fit(&self, dataset: Dataset) -> RandomForestClassifier {
        let n_features = dataset.features_len();
        let feature_len = max_features(n_features);
        let weights = match self.class_weight {
            ClassWeight::Uniform => ClassWeights::uniform(),
            ClassWeight::Balanced => ClassWeights::balanced(dataset.targets()),
        };

        info!(
            trees = self.n_trees,
            depth = self.max_depth,
            rows = dataset.rows_len(),
            features = n_features,
            "fitting random forest"
        );

        let start = Instant::now();
        let done = AtomicUsize::new(0);

        let forest = self.get_rngs()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|mut rng| {
                let tree = self.fit_tree(&mut rng, &dataset, feature_len, &weights);

                let fitted = done.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    "[{:.1}%] tree {} of {} fitted",
                    fitted as f64 / self.n_trees as f64 * 100.0,
                    fitted,
                    self.n_trees,
                );

                tree
            })
            .collect::<Vec<_>>();

        info!(elapsed_s = start.elapsed().as_secs_f64(), "random forest fitted");

        RandomForestClassifier {
            forest,
            n_features,
        }
    }

    fn fit_tree<R: Rng + ?Sized>(&self, rng: &mut R, dataset: &Dataset, feature_len: usize, weights: &ClassWeights) -> DecisionTree {
        let builder = DecisionTreeBuilder {
            max_features: Some(feature_len),
            max_depth: self.max_depth,
            ..Default::default()
        };

        let max_samples = (dataset.rows_len() as f64 * self.bag_amount) as usize;
        let bootstrapped = dataset.bootstrap(rng, max_samples);

        builder.fit(rng, bootstrapped, weights)
    }

    fn get_rngs(&self) -> impl Iterator<Item = StdRng> {
        let seed = self.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let mut rng = StdRng::seed_from_u64(seed);
        (0..self.n_trees).map(move |_| {
            let mut seed = [0u8; 32];
            rng.fill(&mut seed);
            StdRng::from_seed(seed)
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RandomForestClassifier {
    forest: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForestClassifier {
    pub fn n_trees(&self) -> usize {
        self.forest.len()
    }
}

fn invalid(message: String) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, message)
}

impl Classifier for RandomForestClassifier {
    /// Majority vote; an even split goes to the lower class.
    fn predict(&self, x: &[f64]) -> f64 {
        most_frequent(self.forest.iter().map(|v| v.predict(x)), &ClassWeights::uniform())
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn serialize<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u16::<BigEndian>(FORMAT_VERSION)?;
        write_u16_len(writer, self.n_features, "input width")?;
        write_u16_len(writer, self.forest.len(), "tree count")?;

        for tree in &self.forest {
            tree.serialize(writer)?;
        }

        Ok(())
    }

    fn deserialize<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(invalid("not a random forest artifact".to_string()));
        }

        let version = reader.read_u16::<BigEndian>()?;
        if version != FORMAT_VERSION {
            return Err(invalid(format!("unsupported forest format version {}", version)));
        }

        let n_features = reader.read_u16::<BigEndian>()? as usize;
        let len = reader.read_u16::<BigEndian>()?;
        if len == 0 {
            return Err(invalid("forest holds no trees".to_string()));
        }

        let forest = (0..len)
            .map(|_| DecisionTree::deserialize(reader))
            .collect::<std::io::Result<Vec<DecisionTree>>>()?;

        if let Some(tree) = forest.iter().find(|t| t.n_features() != n_features) {
            return Err(invalid(format!(
                "tree fit on {} inputs inside a forest of {}",
                tree.n_features(),
                n_features
            )));
        }
        expect_end(reader)?;

        Ok(Self {
            forest,
            n_features,
        })
    }
}
