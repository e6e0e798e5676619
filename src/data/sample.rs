//! Seeded synthetic dose-response data.
//!
//! Three compounds drawn from distinct four-parameter logistic curves, sampled
//! at six log-spaced concentrations in triplicate with Gaussian noise. Used by
//! `dr example` and as a known-truth fixture in tests.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{ColumnMap, Dataset, Measurement, ModelKind};
use crate::error::AppError;
use crate::models::predict;

pub const EXAMPLE_FILE: &str = "example_data.txt";
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_NOISE: f64 = 0.05;

pub const REFERENCE_CONCENTRATIONS: [f64; 6] = [0.1, 1.0, 10.0, 100.0, 1000.0, 10000.0];
pub const REPLICATES: usize = 3;

/// A generating curve: 4PL `[bottom, top, ic50, hill]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceCompound {
    pub name: &'static str,
    pub params: [f64; 4],
}

impl ReferenceCompound {
    pub fn ic50(&self) -> f64 {
        self.params[2]
    }
}

pub const REFERENCE_COMPOUNDS: [ReferenceCompound; 3] = [
    ReferenceCompound {
        name: "Compound_A",
        params: [0.1, 1.0, 100.0, 1.5],
    },
    ReferenceCompound {
        name: "Compound_B",
        params: [0.05, 0.9, 500.0, 2.0],
    },
    ReferenceCompound {
        name: "Compound_C",
        params: [0.15, 0.95, 250.0, 1.8],
    },
];

/// Colors used for the reference overlay.
pub const REFERENCE_COLORS: &str = "Compound_A:#e74c3c;Compound_B:#3498db;Compound_C:#2ecc71";

/// Generate the reference dataset. Responses are clamped at zero.
pub fn generate_reference_data(seed: u64, noise: f64) -> Result<Dataset, AppError> {
    if !(noise.is_finite() && noise >= 0.0) {
        return Err(AppError::new(2, format!("Noise must be a finite value >= 0 (got {noise})")));
    }
    let normal = Normal::new(0.0, noise).map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut measurements = Vec::with_capacity(REFERENCE_COMPOUNDS.len() * REFERENCE_CONCENTRATIONS.len() * REPLICATES);
    for compound in &REFERENCE_COMPOUNDS {
        for &conc in &REFERENCE_CONCENTRATIONS {
            let mean = predict(ModelKind::FourParam, conc, &compound.params);
            for _ in 0..REPLICATES {
                let response = (mean + normal.sample(&mut rng)).max(0.0);
                measurements.push(Measurement {
                    compound: compound.name.to_string(),
                    concentration: conc,
                    response,
                });
            }
        }
    }

    Ok(Dataset::new(ColumnMap::default(), measurements))
}

/// Write a dataset as a tab-delimited table with its own column names.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create '{}': {e}", path.display())))?;
    write_dataset_to(file, dataset).map_err(|e| AppError::new(4, format!("Failed to write '{}': {e}", path.display())))?;
    log::info!("wrote {} ({} rows)", path.display(), dataset.measurements.len());
    Ok(())
}

pub fn write_dataset_to<W: Write>(out: W, dataset: &Dataset) -> csv::Result<()> {
    let mut wtr = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
    let c = &dataset.columns;
    wtr.write_record([&c.compound, &c.concentration, &c.response])?;
    for m in &dataset.measurements {
        wtr.write_record([m.compound.clone(), m.concentration.to_string(), m.response.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
