use crate::error::Result;
use crate::schema::FilerRecord;
use log::info;
use std::fs;
use std::path::Path;

/// Writes one pretty-printed JSON document per filer, named by zero-padded
/// CIK. This is the external boundary: everything downstream reads these
/// documents and never the raw facts.
pub fn write_records(records: &[FilerRecord], dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for record in records {
        let path = dir.join(format!("{:010}.json", record.cik));
        fs::write(path, serde_json::to_string_pretty(record)?)?;
    }
    info!("Wrote {} filer records to {}", records.len(), dir.display());
    Ok(())
}

/// Writes the JSON Schema of the output contract next to the records, so
/// the rendering layers can validate what they consume.
pub fn write_contract_schema(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(
        dir.join("filer-record.schema.json"),
        FilerRecord::schema_as_json()?,
    )?;
    Ok(())
}
