//! Path utilities for Atom data directories.
//!
//! Everything lives under `~/.atom/` unless `ATOM_HOME` points elsewhere.

use std::path::PathBuf;

/// Environment variable overriding the data directory.
pub const ATOM_HOME_ENV: &str = "ATOM_HOME";

/// Get the Atom data directory (`$ATOM_HOME` or `~/.atom/`).
pub fn atom_data_dir() -> PathBuf {
    if let Some(home) = std::env::var_os(ATOM_HOME_ENV) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".atom")
}

/// Get the models directory (`<data>/models/`).
pub fn models_dir() -> PathBuf {
    atom_data_dir().join("models")
}

/// Get the bin directory (`<data>/bin/`).
pub fn bin_dir() -> PathBuf {
    atom_data_dir().join("bin")
}

/// Get the path to the llama-server binary.
pub fn llama_server_path() -> PathBuf {
    let binary_name = if cfg!(target_os = "windows") {
        "llama-server.exe"
    } else {
        "llama-server"
    };
    bin_dir().join(binary_name)
}

/// Get the path to a model file.
pub fn model_path(filename: &str) -> PathBuf {
    models_dir().join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_rooted_in_data_dir() {
        let root = atom_data_dir();
        assert_eq!(models_dir(), root.join("models"));
        assert_eq!(bin_dir(), root.join("bin"));
        assert_eq!(
            model_path("tiny.gguf"),
            root.join("models").join("tiny.gguf")
        );
        assert!(llama_server_path().starts_with(root.join("bin")));
    }
}
