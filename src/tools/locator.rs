use std::path::PathBuf;

/// Finds external programs: system PATH first, then the fallback directories.
#[derive(Debug, Clone, Default)]
pub struct ToolLocator {
    fallback_dirs: Vec<PathBuf>,
}

impl ToolLocator {
    pub fn new(fallback_dirs: Vec<PathBuf>) -> Self {
        Self { fallback_dirs }
    }

    pub fn locate(&self, program: &str) -> Option<PathBuf> {
        if let Ok(path) = which::which(program) {
            tracing::debug!("Found {} on PATH: {}", program, path.display());
            return Some(path);
        }

        let file_name = format!("{}{}", program, std::env::consts::EXE_SUFFIX);
        let found = self
            .fallback_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file());

        match &found {
            Some(path) => tracing::debug!("Found {} next to app: {}", program, path.display()),
            None => tracing::debug!("{} not found", program),
        }
        found
    }
}
