//! Runs the full reconstruction pipeline over a directory of quarterly
//! Financial Statement Data Sets and writes one JSON record per filer.
//!
//! Usage:
//!
//! ```text
//! cargo run --example run_pipeline -- <data-dir> <output-dir>
//! ```
//!
//! `<data-dir>` must contain one subdirectory per quarter (e.g. `2024q3/`)
//! holding the unpacked `sub.txt`, `num.txt` and `pre.txt` files.

use anyhow::{bail, Context, Result};
use asreported::{persist, run_pipeline, EngineConfig};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(data_dir), Some(out_dir)) = (args.next(), args.next()) else {
        bail!("usage: run_pipeline <data-dir> <output-dir>");
    };

    let mut quarters: Vec<PathBuf> = std::fs::read_dir(&data_dir)
        .with_context(|| format!("reading data directory {}", data_dir))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    quarters.sort();
    if quarters.is_empty() {
        bail!("no quarter directories found under {}", data_dir);
    }

    let records = run_pipeline(EngineConfig::default(), &quarters)?;
    println!("Built records for {} filers", records.len());

    for record in &records {
        let roe = record
            .ratios
            .return_on_equity
            .value
            .map(|v| format!("{:.2}%", v * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        println!("  CIK {:>10}  {:<40}  ROE {}", record.cik, record.name, roe);
    }

    let out = PathBuf::from(out_dir);
    persist::write_records(&records, &out)?;
    persist::write_contract_schema(&out)?;
    println!("Wrote records to {}", out.display());

    Ok(())
}
