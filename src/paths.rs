//! XDG-compliant path resolution for jobmail.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(jobmail::paths::no_home),
        help(
            "Set the HOME environment variable, or pass --config and --data-dir explicitly."
        )
    )]
    NoHome,
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for jobmail.
#[derive(Debug, Clone)]
pub struct JobmailPaths {
    /// `$XDG_CONFIG_HOME/jobmail/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/jobmail/`
    pub data_dir: PathBuf,
}

impl JobmailPaths {
    /// Resolve XDG directories from the process environment.
    pub fn resolve() -> PathResult<Self> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` for environment variables.
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> PathResult<Self> {
        let home = lookup("HOME").map(PathBuf::from).ok_or(PathError::NoHome)?;

        let config_dir = lookup("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".config"))
            .join("jobmail");

        let data_dir = lookup("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".local/share"))
            .join("jobmail");

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Path to the main config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults_under_home() {
        let paths = JobmailPaths::resolve_with(env(&[("HOME", "/home/ada")])).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/ada/.config/jobmail"));
        assert_eq!(paths.data_dir, PathBuf::from("/home/ada/.local/share/jobmail"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/home/ada/.config/jobmail/config.toml")
        );
    }

    #[test]
    fn xdg_overrides_respected() {
        let paths = JobmailPaths::resolve_with(env(&[
            ("HOME", "/home/ada"),
            ("XDG_CONFIG_HOME", "/cfg"),
            ("XDG_DATA_HOME", "/data"),
        ]))
        .unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/cfg/jobmail"));
        assert_eq!(paths.data_dir, PathBuf::from("/data/jobmail"));
    }

    #[test]
    fn missing_home_is_error() {
        assert!(matches!(
            JobmailPaths::resolve_with(env(&[])),
            Err(PathError::NoHome)
        ));
    }
}
