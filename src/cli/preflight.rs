//! Pre-flight checks before expensive operations.
//!
//! Validates that credentials and directories are available before starting
//! operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{ProspektError, Result};
use crate::openai::read_credential;
use crate::vector_store::IndexStorage;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Building the index needs the brochure directory.
    Index,
    /// Asking questions additionally needs the generation credential.
    Ask,
    /// Search only needs the brochure directory for a possible first build.
    Search,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Index | Operation::Search => {
            check_data_dir(settings)?;
        }
        Operation::Ask => {
            check_generation_key(settings)?;
            check_data_dir(settings)?;
        }
    }
    Ok(())
}

/// Check that the generation credential is set.
fn check_generation_key(settings: &Settings) -> Result<()> {
    let env = &settings.llm.api_key_env;
    match read_credential(env) {
        Some(_) => Ok(()),
        None => Err(ProspektError::Config(format!(
            "{} not set. Set it with: export {}='...'",
            env, env
        ))),
    }
}

/// Check that brochures can be found when no index is persisted yet.
fn check_data_dir(settings: &Settings) -> Result<()> {
    let data_dir = settings.data_dir();
    if data_dir.is_dir() || IndexStorage::is_populated(&settings.vector_store_dir()) {
        Ok(())
    } else {
        Err(ProspektError::NoDocuments(data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_in(root: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.storage.data_dir = root.join("data").display().to_string();
        settings.storage.vector_store_dir = root.join("store").display().to_string();
        settings
    }

    #[test]
    fn test_missing_data_dir_fails_index() {
        let root = tempfile::tempdir().unwrap();
        let result = check(Operation::Index, &settings_in(root.path()));
        assert!(matches!(result, Err(ProspektError::NoDocuments(_))));
    }

    #[test]
    fn test_existing_data_dir_passes_search() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();
        assert!(check(Operation::Search, &settings_in(root.path())).is_ok());
    }

    #[test]
    fn test_ask_requires_generation_key() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();
        let mut settings = settings_in(root.path());
        settings.llm.api_key_env = "PROSPEKT_TEST_UNSET_KEY".to_string();

        let result = check(Operation::Ask, &settings);
        assert!(matches!(result, Err(ProspektError::Config(_))));
    }
}
