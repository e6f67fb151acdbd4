//! JSON/CSV file formats for inputs and results.
//!
//! Parse failures surface as `std::io::ErrorKind::InvalidData`, so callers deal
//! with a single error type for everything that touches the filesystem.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::correlation::CorrelationMatrix;
use crate::dataset::SampleRecord;
use crate::null::NullDistribution;
use crate::significance::ClassifiedRecord;

#[derive(Debug, Deserialize)]
struct MatrixFile {
    ids: Vec<String>,
    values: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct ProfilesFile {
    ids: Vec<String>,
    features: Vec<Vec<f64>>,
}

fn invalid_data(what: &str, e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("failed to parse {what}: {e}"),
    )
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> std::io::Result<T> {
    let raw = fs::read_to_string(path)?;
    serde_json::from_str::<T>(&raw).map_err(|e| invalid_data(what, e))
}

/// JSON array of `{id, perturbation, sample_type, plate}` objects.
pub fn load_metadata(path: &Path) -> std::io::Result<Vec<SampleRecord>> {
    read_json(path, "metadata JSON")
}

/// `{"ids": [...], "values": [[...], ...]}`.
pub fn load_correlation_matrix(path: &Path) -> std::io::Result<CorrelationMatrix> {
    let file: MatrixFile = read_json(path, "correlation matrix JSON")?;
    CorrelationMatrix::new(file.ids, file.values)
        .map_err(|e| invalid_data("correlation matrix", e))
}

/// `{"ids": [...], "features": [[...], ...]}`, correlated on load.
pub fn load_profiles(path: &Path) -> std::io::Result<CorrelationMatrix> {
    let file: ProfilesFile = read_json(path, "profiles JSON")?;
    CorrelationMatrix::from_profiles(file.ids, &file.features)
        .map_err(|e| invalid_data("profiles", e))
}

/// `{"values": [...]}`.
pub fn load_null(path: &Path) -> std::io::Result<NullDistribution> {
    read_json(path, "null distribution JSON")
}

/// One allele label per line. Blank lines and `#` comments are ignored.
pub fn load_alleles(path: &Path) -> std::io::Result<Vec<String>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    fs::write(path, json)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_pvalue(p: Option<f64>) -> String {
    p.map(|v| format!("{v:e}")).unwrap_or_default()
}

/// One row per pair: identifiers, then raw / adjusted / significant per test
/// field, then directionality (CNN only) and the label.
pub fn write_results_csv(path: &Path, classified: &[ClassifiedRecord]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let fields: Vec<&str> = classified
        .first()
        .map(|r| r.significance.iter().map(|s| s.field.as_str()).collect())
        .unwrap_or_default();
    let directional = classified.iter().any(|r| r.record.directionality.is_some());

    let mut header = vec![
        "wild_type".to_string(),
        "wt_samples".to_string(),
        "mutant".to_string(),
        "mut_samples".to_string(),
    ];
    for field in &fields {
        header.push(field.to_string());
        header.push(format!("adjusted_{field}"));
        header.push(format!("is_sig_{field}"));
    }
    if directional {
        header.push("directionality_test".to_string());
    }
    header.push("prediction".to_string());
    writeln!(writer, "{}", header.join(","))?;

    for entry in classified {
        let record = &entry.record;
        let mut row = vec![
            csv_field(&record.wild_type),
            record.wt_samples.to_string(),
            csv_field(&record.mutant),
            record.mut_samples.to_string(),
        ];
        for field in &fields {
            match entry.field(field) {
                Some(s) => {
                    row.push(csv_pvalue(s.raw));
                    row.push(csv_pvalue(s.adjusted));
                    row.push(s.significant.to_string());
                }
                None => row.extend([String::new(), String::new(), String::new()]),
            }
        }
        if directional {
            row.push(
                record
                    .directionality
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            );
        }
        row.push(entry.prediction.to_string());
        writeln!(writer, "{}", row.join(","))?;
    }
    writer.flush()
}
