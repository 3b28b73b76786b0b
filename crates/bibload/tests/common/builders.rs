//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;

use bibload::config::schema::{
    Config, CoreConfig, InstitutionConfig, LogFormat, LoggingConfig, TransformConfig,
};

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    version: String,
    working_directory: PathBuf,
    archive_directory: PathBuf,
    worker_count: usize,
    index_format: TransformConfig,
    cores: Vec<CoreConfig>,
    institutions: Vec<InstitutionConfig>,
    logging: LoggingConfig,
}

impl ConfigBuilder {
    /// Create a new builder with sensible defaults for testing.
    pub fn new() -> Self {
        Self {
            version: "1.0".to_string(),
            working_directory: PathBuf::from("/tmp/bibload/work"),
            archive_directory: PathBuf::from("/tmp/bibload/archive"),
            worker_count: 1,
            index_format: TransformConfig::Copy,
            cores: vec![],
            institutions: vec![],
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn working_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.working_directory = path.into();
        self
    }

    pub fn archive_directory<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.archive_directory = path.into();
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    pub fn index_format(mut self, transform: TransformConfig) -> Self {
        self.index_format = transform;
        self
    }

    pub fn core(mut self, name: &str, url: &str) -> Self {
        self.cores.push(CoreConfig {
            name: name.to_string(),
            url: url.to_string(),
            institution_field: "institutionID".to_string(),
        });
        self
    }

    pub fn institution(mut self, id: &str, transform: TransformConfig) -> Self {
        self.institutions.push(InstitutionConfig {
            id: id.to_string(),
            name: id.to_uppercase(),
            transform,
        });
        self
    }

    pub fn build(self) -> Config {
        Config {
            version: self.version,
            working_directory: self.working_directory,
            archive_directory: self.archive_directory,
            worker_count: self.worker_count,
            index_format: self.index_format,
            cores: self.cores,
            institutions: self.institutions,
            logging: self.logging,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Command transformation running `xsltproc` with a stylesheet.
pub fn xslt(stylesheet: &str) -> TransformConfig {
    TransformConfig::Command {
        program: "xsltproc".to_string(),
        args: vec![
            "-o".to_string(),
            "{output}".to_string(),
            stylesheet.to_string(),
            "{input}".to_string(),
        ],
    }
}

/// A zip archive holding one file.
pub fn zip_bytes(entry_name: &str, content: &str) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut buffer);
        writer
            .start_file(entry_name, zip::write::SimpleFileOptions::default())
            .expect("Failed to start zip entry");
        writer
            .write_all(content.as_bytes())
            .expect("Failed to write zip entry");
        writer.finish().expect("Failed to finish zip");
    }
    buffer.into_inner()
}
