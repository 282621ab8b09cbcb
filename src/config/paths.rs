//! Platform paths for the renderer's settings, resolved with `dirs`.
//!
//! Config dir:
//!   Windows: %APPDATA%\timed-tts\
//!   macOS:   ~/Library/Application Support/timed-tts/
//!   Linux:   ~/.config/timed-tts/

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RenderPaths {
    /// Directory holding `render.toml`.
    pub config_dir: PathBuf,
    /// Full path to `render.toml`.
    pub config_file: PathBuf,
}

impl RenderPaths {
    const APP_NAME: &'static str = "timed-tts";

    /// Falls back to the working directory when the platform has no config
    /// dir.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let config_file = config_dir.join("render.toml");

        Self {
            config_dir,
            config_file,
        }
    }
}

impl Default for RenderPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_lives_in_config_dir() {
        let paths = RenderPaths::new();
        assert!(paths.config_dir.ends_with("timed-tts"));
        assert_eq!(paths.config_file.parent(), Some(paths.config_dir.as_path()));
        assert!(paths
            .config_file
            .file_name()
            .is_some_and(|n| n == "render.toml"));
    }
}
