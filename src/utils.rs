use crate::models::AgentRecord;
use anyhow::{Context, Result};
use log::info;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Receives extracted records page by page.
pub trait RecordSink {
    fn accept(&mut self, records: &[AgentRecord]) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Keep everything in memory and overwrite the file at the end.
    Batch,
    /// Append to the file after every page.
    Incremental,
}

pub struct CsvSink {
    path: PathBuf,
    mode: OutputMode,
    buffered: Vec<AgentRecord>,
    written: usize,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, mode: OutputMode) -> Self {
        Self {
            path: path.into(),
            mode,
            buffered: Vec::new(),
            written: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl RecordSink for CsvSink {
    fn accept(&mut self, records: &[AgentRecord]) -> Result<()> {
        match self.mode {
            OutputMode::Batch => self.buffered.extend_from_slice(records),
            OutputMode::Incremental => {
                append_agents_to_csv(records, &self.path)?;
                self.written += records.len();
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.mode == OutputMode::Batch {
            save_agents_to_csv(&self.buffered, &self.path)?;
            self.written = self.buffered.len();
        }
        Ok(())
    }
}

pub fn save_agents_to_csv(agents: &[AgentRecord], output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;

    let mut writer = csv::Writer::from_writer(file);
    if agents.is_empty() {
        writer.write_record(["Name", "Phone", "Zip Code"])?;
    }
    for agent in agents {
        writer.serialize(agent)?;
    }
    writer.flush()?;

    info!("Data saved to {} ({} agents)", output_path.display(), agents.len());
    Ok(())
}

pub fn append_agents_to_csv(agents: &[AgentRecord], output_path: &Path) -> Result<()> {
    let is_new = output_path
        .metadata()
        .map(|meta| meta.len() == 0)
        .unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_path)
        .with_context(|| format!("Failed to open output file: {}", output_path.display()))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    for agent in agents {
        writer.serialize(agent)?;
    }
    writer.flush()?;

    if is_new {
        info!("Data saved to new file: {}", output_path.display());
    } else {
        info!("Data appended to {} ({} agents)", output_path.display(), agents.len());
    }
    Ok(())
}

pub fn load_agents_from_csv(input_path: &Path) -> Result<Vec<AgentRecord>> {
    if !input_path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(input_path)
        .with_context(|| format!("Failed to open input file: {}", input_path.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut agents = Vec::new();
    for result in reader.deserialize() {
        let agent: AgentRecord = result
            .with_context(|| format!("Malformed row in {}", input_path.display()))?;
        agents.push(agent);
    }
    Ok(agents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn jane() -> AgentRecord {
        AgentRecord::new("Jane Doe", Some("(406) 555-0101".to_string()), "59801")
    }

    fn john() -> AgentRecord {
        AgentRecord::new("John Roe", None, "59802")
    }

    #[test]
    fn batch_sink_writes_only_on_finish() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::new(&path, OutputMode::Batch);

        sink.accept(&[jane()]).unwrap();
        sink.accept(&[john()]).unwrap();
        assert!(!path.exists());

        sink.finish().unwrap();
        assert_eq!(sink.written(), 2);
        assert_eq!(load_agents_from_csv(&path).unwrap(), vec![jane(), john()]);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Name,Phone,Zip Code\n"));
        assert!(text.contains("John Roe,,59802"));
    }

    #[test]
    fn batch_sink_overwrites_previous_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save_agents_to_csv(&[jane(), john()], &path).unwrap();

        let mut sink = CsvSink::new(&path, OutputMode::Batch);
        sink.accept(&[john()]).unwrap();
        sink.finish().unwrap();

        assert_eq!(load_agents_from_csv(&path).unwrap(), vec![john()]);
    }

    #[test]
    fn empty_batch_still_writes_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut sink = CsvSink::new(&path, OutputMode::Batch);
        sink.finish().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Name,Phone,Zip Code\n");
        assert!(load_agents_from_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn incremental_sink_appends_with_single_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        save_agents_to_csv(&[jane()], &path).unwrap();

        let mut sink = CsvSink::new(&path, OutputMode::Incremental);
        sink.accept(&[john()]).unwrap();
        sink.accept(&[jane()]).unwrap();
        sink.finish().unwrap();

        assert_eq!(sink.written(), 2);
        assert_eq!(load_agents_from_csv(&path).unwrap(), vec![jane(), john(), jane()]);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("Name,Phone,Zip Code").count(), 1);
    }

    #[test]
    fn loading_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(load_agents_from_csv(&dir.path().join("nope.csv")).unwrap().is_empty());
    }
}
