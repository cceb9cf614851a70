//! Home directory resolution.
//!
//! Everything a node persists between runs lives under one directory, by
//! default `~/.proofnet`.

use camino::Utf8PathBuf;
use eyre::{eyre, Result as EyreResult};

pub const DEFAULT_HOME_DIR: &str = ".proofnet";

pub fn default_home() -> EyreResult<Utf8PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| eyre!("cannot determine home directory"))?;

    let home = Utf8PathBuf::from_path_buf(home)
        .map_err(|path| eyre!("home directory {} is not valid UTF-8", path.display()))?;

    Ok(home.join(DEFAULT_HOME_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_home_is_absolute() {
        let Ok(home) = default_home() else {
            // No home directory in this environment.
            return;
        };

        assert!(home.is_absolute());
        assert!(home.ends_with(DEFAULT_HOME_DIR));
    }
}
