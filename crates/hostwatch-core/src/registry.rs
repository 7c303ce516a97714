//! Ordered host registry loaded from the hosts file.
//!
//! The file is plain text, one host name per line. Trailing whitespace
//! (including a `\r` line ending) is stripped from every line, so a line of
//! only spaces counts as blank. Blank lines and lines starting with `#` are
//! skipped. There is no quoting and no inline comment
//! syntax. Names are not deduplicated: every line is its own record, and
//! records are addressed by position.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Status;

const COMMENT_MARKER: char = '#';

/// One monitored host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub name: String,
    pub status: Status,
}

impl HostRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::Unknown,
        }
    }
}

/// Hosts in file order. The sequence is fixed after load; only the
/// per-record `status` changes.
#[derive(Debug, Clone, Default)]
pub struct HostRegistry {
    records: Vec<HostRecord>,
}

impl HostRegistry {
    /// Load the registry from a hosts file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let hosts_err = |source| ConfigError::HostsFile {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(hosts_err)?;
        let registry = Self::parse(BufReader::new(file)).map_err(hosts_err)?;

        info!(path = %path.display(), entries = registry.len(), "read hosts file");
        if registry.is_empty() {
            warn!(path = %path.display(), "hosts file has no entries");
        }
        Ok(registry)
    }

    /// Parse host names from any line-oriented reader.
    pub fn parse<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let name = line.trim_end();
            if name.is_empty() || name.starts_with(COMMENT_MARKER) {
                continue;
            }
            debug!(host = name, "host entry");
            records.push(HostRecord::new(name));
        }
        Ok(Self { records })
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: names.into_iter().map(HostRecord::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&HostRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostRecord> {
        self.records.iter()
    }

    /// Mutable access to the records. The slice keeps the sequence itself
    /// immutable: records can be updated but not added or removed.
    pub fn records_mut(&mut self) -> &mut [HostRecord] {
        &mut self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_blank_and_comment_lines() {
        let input = "# core routers\nrouter-1\n\n#router-2\nrouter-3\n\nweb.example\n";
        let registry = HostRegistry::parse(input.as_bytes()).unwrap();

        let names: Vec<_> = registry.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["router-1", "router-3", "web.example"]);
    }

    #[test]
    fn records_start_unknown() {
        let registry = HostRegistry::parse("a\nb\n".as_bytes()).unwrap();
        assert!(registry.iter().all(|r| r.status == Status::Unknown));
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let registry = HostRegistry::parse("gw\nnas\ngw\n".as_bytes()).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(0).unwrap().name, "gw");
        assert_eq!(registry.get(2).unwrap().name, "gw");
    }

    #[test]
    fn strips_crlf_and_trailing_whitespace() {
        let registry = HostRegistry::parse("alpha\r\nbeta  \n   \n".as_bytes()).unwrap();
        let names: Vec<_> = registry.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["alpha", "beta"]);
    }

    #[test]
    fn last_line_without_newline() {
        let registry = HostRegistry::parse("alpha\nbeta".as_bytes()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(1).unwrap().name, "beta");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# monitored hosts").unwrap();
        writeln!(file, "10.0.0.1").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "db.internal").unwrap();

        let registry = HostRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(0).unwrap().name, "10.0.0.1");
        assert_eq!(registry.get(1).unwrap().name, "db.internal");
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HostRegistry::load(&dir.path().join("nope.hosts")).unwrap_err();
        assert!(matches!(err, ConfigError::HostsFile { .. }));
        assert!(err.to_string().contains("nope.hosts"));
    }

    #[test]
    fn records_mut_updates_status() {
        let mut registry = HostRegistry::from_names(["a", "b"]);
        registry.records_mut()[1].status = Status::Down;
        assert_eq!(registry.get(1).unwrap().status, Status::Down);
        assert_eq!(registry.get(0).unwrap().status, Status::Unknown);
    }
}
