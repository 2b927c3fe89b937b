use crate::proxy::ProxyEndpoint;
use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use log::info;
use std::fs::{self, File};
use std::path::Path;

fn is_postal_header(header: &str) -> bool {
    let header = header.to_lowercase();
    header.contains("zip") || header.contains("postal")
}

/// Reads postal codes from a spreadsheet, a CSV file with a `Zip Codes`
/// style column, or a plain text file with one code per line.
pub fn load_postal_codes(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        bail!("Postal code file {} does not exist", path.display());
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    let codes = match extension.as_deref() {
        Some("xlsx") | Some("xls") | Some("xlsm") | Some("ods") => load_from_workbook(path)?,
        Some("csv") => load_from_csv(path)?,
        _ => load_from_text(path)?,
    };

    info!("Loaded {} postal codes from {}", codes.len(), path.display());
    Ok(codes)
}

fn cell_to_postal_code(cell: &Data) -> Option<String> {
    match cell {
        Data::Int(n) => Some(format!("{:05}", n)),
        Data::Float(f) if f.fract() == 0.0 => Some(format!("{:05}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Data::Empty => None,
        other => {
            let s = other.to_string();
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
    }
}

fn load_from_workbook(path: &Path) -> Result<Vec<String>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Error reading postal codes from {}", path.display()))?;

    let range = workbook
        .worksheet_range_at(0)
        .context("Workbook has no worksheets")?
        .with_context(|| format!("Failed to read first worksheet of {}", path.display()))?;

    let mut rows = range.rows();
    let header = rows.next().context("Worksheet is empty")?;
    let column = header
        .iter()
        .position(|cell| is_postal_header(&cell.to_string()))
        .context("No 'Zip Codes' column in worksheet header")?;

    Ok(rows
        .filter_map(|row| row.get(column).and_then(cell_to_postal_code))
        .collect())
}

fn load_from_csv(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open postal code file: {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let column = reader
        .headers()?
        .iter()
        .position(is_postal_header)
        .context("No 'Zip Codes' column in CSV header")?;

    let mut codes = Vec::new();
    for result in reader.records() {
        let record = result?;
        if let Some(code) = record.get(column).filter(|c| !c.is_empty()) {
            codes.push(code.to_string());
        }
    }
    Ok(codes)
}

fn meaningful_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

fn load_from_text(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read postal code file: {}", path.display()))?;
    Ok(meaningful_lines(&text)
        .map(|(_, line)| line.to_string())
        .collect())
}

pub fn load_proxies(path: &Path) -> Result<Vec<ProxyEndpoint>> {
    info!("Getting proxies from {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read proxy file: {}", path.display()))?;

    let mut proxies = Vec::new();
    for (line_no, line) in meaningful_lines(&text) {
        let proxy = ProxyEndpoint::parse(line)
            .with_context(|| format!("{}:{}: invalid proxy", path.display(), line_no))?;
        proxies.push(proxy);
    }

    info!("Loaded {} proxies", proxies.len());
    Ok(proxies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn temp_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_zip_column_from_csv() {
        let file = temp_file(".csv", "City,Zip Codes\nMissoula, 59801\nHelena,\nBillings,59101\n");
        let codes = load_postal_codes(file.path()).unwrap();
        assert_eq!(codes, vec!["59801", "59101"]);
    }

    #[test]
    fn csv_without_zip_column_is_an_error() {
        let file = temp_file(".csv", "City,State\nMissoula,MT\n");
        assert!(load_postal_codes(file.path()).is_err());
    }

    #[test]
    fn reads_plain_text_lines() {
        let file = temp_file(".txt", "# montana\n59801\n\n 59802 \n");
        let codes = load_postal_codes(file.path()).unwrap();
        assert_eq!(codes, vec!["59801", "59802"]);
    }

    #[test]
    fn missing_postal_file_is_an_error() {
        assert!(load_postal_codes(Path::new("/definitely/not/here.xlsx")).is_err());
    }

    #[test]
    fn numeric_cells_keep_leading_zeros() {
        assert_eq!(cell_to_postal_code(&Data::Float(2134.0)), Some("02134".to_string()));
        assert_eq!(cell_to_postal_code(&Data::Int(59801)), Some("59801".to_string()));
        assert_eq!(
            cell_to_postal_code(&Data::String(" 02134 ".to_string())),
            Some("02134".to_string())
        );
        assert_eq!(cell_to_postal_code(&Data::Empty), None);
    }

    #[test]
    fn loads_proxy_list() {
        let file = temp_file(".txt", "1.1.1.1:8000:u:p\n\n# spare\n2.2.2.2:8000\n");
        let proxies = load_proxies(file.path()).unwrap();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0].username.as_deref(), Some("u"));
        assert_eq!(proxies[1].host, "2.2.2.2");
    }

    #[test]
    fn bad_proxy_line_reports_line_number() {
        let file = temp_file(".txt", "1.1.1.1:8000\nnot-a-proxy\n");
        let err = load_proxies(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains(":2:"));
    }
}
