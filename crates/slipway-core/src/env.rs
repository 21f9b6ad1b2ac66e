//! Environment entry resolution.
//!
//! An app's `env` list mixes inline `KEY=VALUE` entries with bare file
//! references. Resolution happens at deploy time: inline entries pass
//! through untouched, file references are read and split into trimmed,
//! non-empty lines.

use std::path::Path;

use crate::error::{ConfigError, ConfigResult};

/// Resolve a list of env entries into the flat `KEY=VALUE` list handed to
/// the container engine.
pub fn resolve(entries: &[String]) -> ConfigResult<Vec<String>> {
    let mut resolved = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.contains('=') {
            resolved.push(entry.clone());
        } else {
            let content = std::fs::read_to_string(Path::new(entry)).map_err(|source| {
                ConfigError::EnvFile {
                    path: entry.clone(),
                    source,
                }
            })?;
            resolved.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_owned),
            );
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn inline_entries_pass_through() {
        let resolved = resolve(&["A=1".to_string(), "B=two".to_string()]).unwrap();
        assert_eq!(resolved, vec!["A=1", "B=two"]);
    }

    #[test]
    fn file_reference_expands_to_trimmed_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DB_URL=postgres://db/app").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  SECRET=hunter2  ").unwrap();

        let entries = vec![
            "A=1".to_string(),
            file.path().to_string_lossy().into_owned(),
        ];
        let resolved = resolve(&entries).unwrap();

        // 1 inline + 2 file lines; the blank line is dropped.
        assert_eq!(
            resolved,
            vec!["A=1", "DB_URL=postgres://db/app", "SECRET=hunter2"]
        );
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = resolve(&["/no/such/env/file".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::EnvFile { .. }));
    }

    #[test]
    fn empty_list_resolves_empty() {
        assert!(resolve(&[]).unwrap().is_empty());
    }
}
