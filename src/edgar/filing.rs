use anyhow::{anyhow, Result};
use chardet::detect;
use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

pub const FILING_EXTENSION: &str = "txt";

/// Company names end up in file names, so path and field separators go.
pub fn sanitize_company_name(company: &str) -> String {
    company
        .trim()
        .replace(' ', "-")
        .replace(['\\', '/', ','], "_")
}

pub fn filing_file_name(company: &str, cik: &str, fid: &str) -> String {
    format!(
        "{}_{}_{}.{}",
        sanitize_company_name(company),
        cik,
        fid,
        FILING_EXTENSION
    )
}

/// Recovers `(cik, fid)` from a name built by [`filing_file_name`].
pub fn parse_filing_file_name(name: &str) -> Result<(u64, String)> {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("Invalid filing file name: {}", name))?;

    let mut parts = stem.rsplitn(3, '_');
    let fid = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("Missing filing id in {}", name))?;
    let cik = parts
        .next()
        .ok_or_else(|| anyhow!("Missing CIK in {}", name))?
        .parse::<u64>()
        .map_err(|e| anyhow!("Invalid CIK in {}: {}", name, e))?;

    Ok((cik, fid.to_string()))
}

/// Reads a downloaded filing, decoding it with the detected character set.
pub fn read_filing(path: &Path) -> Result<String> {
    let raw = fs::read(path)?;
    let charenc = detect(&raw).0;
    log::debug!("Detected character encoding {} for {:?}", charenc, path);

    let mut reader = DecodeReaderBytesBuilder::new()
        .encoding(Encoding::for_label(charenc.as_bytes()))
        .build(BufReader::new(File::open(path)?));

    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}
