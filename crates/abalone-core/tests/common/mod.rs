//! Shared fixtures for pipeline integration tests

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

pub const HEADER: &str =
    "Sex,Length,Diameter,Height,Whole weight,Shucked weight,Viscera weight,Shell weight,Rings";

/// Write a synthetic abalone-like dataset with `rows` records
pub fn write_dataset(path: &Path, rows: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = format!("{}\n", HEADER);

    for _ in 0..rows {
        let sex = ["M", "F", "I"][rng.random_range(0..3)];
        let length: f64 = rng.random_range(0.15..0.75);
        let diameter = length * 0.8 + rng.random_range(-0.02..0.02);
        let height = length * 0.25 + rng.random_range(-0.01..0.01);
        let whole = length.powi(3) * 3.5 + rng.random_range(0.0..0.05);
        let shucked = whole * 0.43;
        let viscera = whole * 0.22;
        let shell = whole * 0.29 + rng.random_range(0.0..0.02);
        let sex_effect = if sex == "I" { -1.5 } else { 0.5 };
        let rings = (2.0 + 14.0 * length + 20.0 * shell + sex_effect + rng.random_range(-1.5..1.5))
            .round()
            .max(1.0) as i64;

        writeln!(
            csv,
            "{},{:.3},{:.3},{:.3},{:.4},{:.4},{:.4},{:.4},{}",
            sex, length, diameter, height, whole, shucked, viscera, shell, rings
        )
        .unwrap();
    }

    fs::write(path, csv).unwrap();
}

/// Write an unlabeled inference file with the given rows of
/// `(sex, length)`; other measurements are derived from length
pub fn write_inference_rows(path: &Path, rows: &[(&str, f64)]) {
    let mut csv = String::from(
        "Length,Diameter,Height,Whole weight,Shucked weight,Viscera weight,Shell weight,Sex\n",
    );
    for (sex, length) in rows {
        let whole = length.powi(3) * 3.5;
        writeln!(
            csv,
            "{:.3},{:.3},{:.3},{:.4},{:.4},{:.4},{:.4},{}",
            length,
            length * 0.8,
            length * 0.25,
            whole,
            whole * 0.43,
            whole * 0.22,
            whole * 0.29,
            sex
        )
        .unwrap();
    }
    fs::write(path, csv).unwrap();
}
