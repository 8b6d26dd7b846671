//! # siteclust-io: Tabular Input and Output
//!
//! Reads site tables, generation profiles and site maps from CSV (or Parquet
//! with the `parquet` feature) and writes cluster results back out, using
//! polars data frames.
//!
//! | Function | Input / Output |
//! |----------|----------------|
//! | [`load_sites`] | one row per site: id, region, capacity, cost, extra columns |
//! | [`load_profiles`] | wide table, one column per profile key |
//! | [`load_site_map`] | two columns: site id, profile key |
//! | [`write_cluster_table`] | sites with their cluster labels |
//! | [`write_summaries`] | one row per cluster |
//! | [`write_summary_profiles`] | wide table, one column per cluster |
//! | [`write_cost_bin_summary`] | capacity per region and cost band |

use std::{
    fs::{self, File},
    path::Path,
};

use anyhow::{anyhow, Context, Result};
use polars::prelude::*;
#[cfg(feature = "parquet")]
use polars::prelude::{ParquetReader, ParquetWriter};

mod output;
mod profiles;
mod sites;

pub use output::{
    write_cluster_table, write_cost_bin_summary, write_summaries, write_summary_profiles,
};
pub use profiles::{load_profiles, load_site_map};
pub use sites::load_sites;

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

/// Read a CSV or Parquet file into a data frame, by extension.
pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let extension = extension(path);
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => {
            let reader = ParquetReader::new(&mut file);
            reader.finish().context("reading Parquet file")
        }
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => {
            let reader = CsvReader::new(&mut file);
            reader.has_header(true).finish().context("reading CSV file")
        }
        _ => Err(anyhow!(
            "unsupported file extension '{}'; use .csv or .parquet",
            extension
        )),
    }
}

/// Write a data frame as CSV or Parquet, by extension, creating parent
/// directories as needed.
pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match extension(path).as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => ParquetWriter::new(&mut file)
            .finish(df)
            .map(|_| ())
            .context("writing Parquet file"),
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => CsvWriter::new(&mut file)
            .finish(df)
            .context("writing CSV file"),
        _ => Err(anyhow!(
            "unsupported output extension for {}; use .csv or .parquet",
            path.display()
        )),
    }
}

/// A column as text, whatever its stored type.
pub(crate) fn column_text(series: &Series) -> Result<Vec<Option<String>>> {
    let text = series
        .cast(&DataType::Utf8)
        .with_context(|| format!("column '{}' cannot be read as text", series.name()))?;
    let chunked = text.utf8()?;
    Ok(chunked
        .into_iter()
        .map(|opt| opt.map(|value| value.trim().to_string()))
        .collect())
}

/// A column as floats; nulls stay `None`.
pub(crate) fn column_f64(series: &Series) -> Result<Vec<Option<f64>>> {
    let values = series
        .cast(&DataType::Float64)
        .with_context(|| format!("column '{}' must be numeric", series.name()))?;
    let chunked = values.f64()?;
    Ok(chunked.into_iter().collect())
}
