use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const REQUIRED_ENV_VARS: &[&str] = &["CLIENT_ID", "CLIENT_SECRET", "TENANT_ID", "EMAIL"];

// Names of optional environment variables
pub const OPTIONAL_ENV_VARS: &[&str] = &["MEETINGS_CSV", "FEEDBACK_MARKER", "RUST_LOG"];

/// Required variables that are unset or blank.
pub fn missing_env_vars() -> Vec<&'static str> {
    REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|var| env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true))
        .collect()
}

/// Load `.env` from the working directory (or a parent) if there is one.
pub fn load_env_file() -> Result<PathBuf, dotenvy::Error> {
    dotenvy::dotenv()
}

/// Write a `.env` template listing every variable. Returns `false` if the file
/// already exists and `force` is not set.
pub fn create_env_template(path: &Path, force: bool) -> io::Result<bool> {
    // Don't overwrite existing .env file
    if path.exists() && !force {
        return Ok(false);
    }

    let mut file = File::create(path)?;

    for var in REQUIRED_ENV_VARS {
        writeln!(file, "{}=", var)?;
    }

    for var in OPTIONAL_ENV_VARS {
        writeln!(file, "# {}=", var)?;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_env_template_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");

        assert!(create_env_template(&path, false).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "CLIENT_ID=\nCLIENT_SECRET=\nTENANT_ID=\nEMAIL=\n# MEETINGS_CSV=\n# FEEDBACK_MARKER=\n# RUST_LOG=\n"
        );
    }

    #[test]
    fn test_env_template_keeps_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "CLIENT_ID=abc\n").unwrap();

        assert!(!create_env_template(&path, false).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "CLIENT_ID=abc\n");

        assert!(create_env_template(&path, true).unwrap());
        assert!(fs::read_to_string(&path).unwrap().starts_with("CLIENT_ID=\n"));
    }
}
