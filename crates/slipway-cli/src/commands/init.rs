//! `slipway init` — write a starter configuration.

use std::path::Path;

use anyhow::{bail, Context};

use slipway_core::Config;

pub fn run(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        bail!("{} already exists, not overwriting", path.display());
    }
    std::fs::write(path, Config::scaffold())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_parseable_scaffold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slipway.toml");

        run(&path).unwrap();
        assert!(Config::from_file(&path).is_ok());
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slipway.toml");
        std::fs::write(&path, "# existing").unwrap();

        assert!(run(&path).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# existing");
    }
}
