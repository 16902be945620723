//! Doctor command - verify credentials, directories and the persisted index.

use crate::cli::Output;
use crate::config::Settings;
use crate::openai::read_credential;
use crate::parser::is_supported;
use crate::vector_store::IndexStorage;
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Prospekt Doctor");
    println!();
    println!("Checking credentials and configuration...\n");

    let mut checks = Vec::new();

    let sections: [(&str, Vec<CheckResult>); 4] = [
        ("API Configuration", check_credentials(settings)),
        ("Brochures", vec![check_data_dir(&settings.data_dir())]),
        ("Index", vec![check_index(settings)]),
        ("Configuration", vec![check_config_file()]),
    ];

    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    }

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Prospekt.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Prospekt is ready to use.");
    }

    Ok(())
}

/// Check the generation, embedding and parsing credentials.
fn check_credentials(settings: &Settings) -> Vec<CheckResult> {
    let llm_env = &settings.llm.api_key_env;
    let generation = match read_credential(llm_env) {
        Some(key) => CheckResult::ok(llm_env, &format!("configured ({})", mask(&key))),
        None => CheckResult::error(
            llm_env,
            "not set",
            &format!("Set with: export {}='...' (needed for chat and ask)", llm_env),
        ),
    };

    let embed_env = &settings.embedding.api_key_env;
    let embedding = match read_credential(embed_env) {
        Some(key) => CheckResult::ok(embed_env, &format!("configured ({})", mask(&key))),
        None => CheckResult::warning(
            embed_env,
            "not set",
            "Only needed if the embedding endpoint requires authentication",
        ),
    };

    let parse_env = &settings.parsing.api_key_env;
    let parsing = if !settings.parsing.use_remote {
        CheckResult::ok("Parser", "local parser (remote parsing disabled)")
    } else {
        match read_credential(parse_env) {
            Some(key) => CheckResult::ok(parse_env, &format!("configured ({})", mask(&key))),
            None => CheckResult::warning(
                parse_env,
                "not set, brochures will be parsed locally",
                &format!("Set with: export {}='llx-...' for table-aware parsing", parse_env),
            ),
        }
    };

    vec![generation, embedding, parsing]
}

/// Check the brochure directory and count the files the parsers accept.
fn check_data_dir(data_dir: &Path) -> CheckResult {
    let entries = match std::fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(_) => {
            return CheckResult::error(
                "Data directory",
                &format!("{} (missing)", data_dir.display()),
                "Create it and put the brochure PDFs inside",
            )
        }
    };

    let brochures = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported(path))
        .count();

    if brochures == 0 {
        CheckResult::warning(
            "Data directory",
            &format!("{} (no brochures)", data_dir.display()),
            "Add PDF, text or Markdown brochures before indexing",
        )
    } else {
        CheckResult::ok(
            "Data directory",
            &format!("{} ({} brochures)", data_dir.display(), brochures),
        )
    }
}

/// Check whether a persisted index exists and matches the configured embedding model.
fn check_index(settings: &Settings) -> CheckResult {
    let dir = settings.vector_store_dir();
    if !IndexStorage::is_populated(&dir) {
        return CheckResult::warning(
            "Vector store",
            &format!("{} (not built yet)", dir.display()),
            "Build with: prospekt index",
        );
    }

    match IndexStorage::read_metadata(&dir) {
        Ok(meta) if meta.embedding_model != settings.embedding.model => CheckResult::warning(
            "Vector store",
            &format!("built with {}, configured {}", meta.embedding_model, settings.embedding.model),
            "The index will be rebuilt on next use",
        ),
        Ok(meta) => CheckResult::ok(
            "Vector store",
            &format!(
                "{} chunks, built {}",
                meta.chunk_count,
                meta.created_at.format("%Y-%m-%d %H:%M")
            ),
        ),
        Err(e) => CheckResult::warning(
            "Vector store",
            &format!("unreadable ({})", e),
            "The index will be rebuilt on next use, or run: prospekt index --rebuild",
        ),
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            &format!("Create {} to override settings", config_path.display()),
        )
    }
}

/// Show only the ends of a secret.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_ok() {
        let result = CheckResult::ok("test", "passed");
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.hint.is_none());
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("short"), "***");
        assert_eq!(mask("AIzaSyExampleKey1234"), "AIza...1234");
    }

    #[test]
    fn test_data_dir_counts_supported_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aldi.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.docx"), b"x").unwrap();

        let result = check_data_dir(dir.path());
        assert_eq!(result.status, CheckStatus::Ok);
        assert!(result.message.contains("1 brochures"));
    }

    #[test]
    fn test_missing_data_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_data_dir(&dir.path().join("missing"));
        assert_eq!(result.status, CheckStatus::Error);
    }

    #[test]
    fn test_unbuilt_index_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.storage.vector_store_dir = dir.path().join("store").display().to_string();
        assert_eq!(check_index(&settings).status, CheckStatus::Warning);
    }
}
