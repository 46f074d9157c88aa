//! Argument parsing.

use clap::Parser;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the managed directory used when no root is given.
pub const DEFAULT_ROOT_NAME: &str = "temp";

/// Temper - self-cleaning temporary storage.
///
/// Files placed under `<root>/daily`, `<root>/weekly` or `<root>/monthly` are
/// deleted once they outlive their retention class.
#[derive(Debug, Parser)]
#[command(name = "temper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Root directory to manage (default: ./temp)
    pub root: Option<PathBuf>,
}

impl Cli {
    /// Absolute root directory, resolved against `cwd` when relative.
    pub fn root_dir_in(&self, cwd: &Path) -> PathBuf {
        match &self.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => cwd.join(root),
            None => cwd.join(DEFAULT_ROOT_NAME),
        }
    }

    /// Absolute root directory, resolved against the current directory.
    pub fn root_dir(&self) -> io::Result<PathBuf> {
        Ok(self.root_dir_in(&std::env::current_dir()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root() {
        let cli = Cli::try_parse_from(["temper"]).unwrap();
        assert_eq!(cli.root_dir_in(Path::new("/work")), PathBuf::from("/work/temp"));
    }

    #[test]
    fn test_relative_and_absolute_roots() {
        let cli = Cli::try_parse_from(["temper", "scratch"]).unwrap();
        assert_eq!(cli.root_dir_in(Path::new("/work")), PathBuf::from("/work/scratch"));

        let cli = Cli::try_parse_from(["temper", "/srv/drop"]).unwrap();
        assert_eq!(cli.root_dir_in(Path::new("/work")), PathBuf::from("/srv/drop"));
    }

    #[test]
    fn test_rejects_extra_arguments() {
        assert!(Cli::try_parse_from(["temper", "a", "b"]).is_err());
        assert!(Cli::try_parse_from(["temper", "--interval", "5"]).is_err());
    }
}
