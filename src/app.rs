use std::path::{Path, PathBuf};

use crate::cli::{Cli, OutputMode};
use crate::config::Config;
use crate::engine::SkillEngine;
use crate::error::{Result, SwError};

pub const ROOT_DIR: &str = ".skillweave";

pub struct AppContext {
    /// `.skillweave` directory (or `SW_ROOT`)
    pub root: PathBuf,
    /// Directory relative skill paths resolve against
    pub base: PathBuf,
    pub config: Config,
    pub engine: SkillEngine,
    pub output: OutputMode,
    pub verbosity: u8,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = Self::find_root()?;
        let base = root
            .parent()
            .filter(|_| root.ends_with(ROOT_DIR))
            .map_or_else(|| root.clone(), Path::to_path_buf);
        let config = Config::load(cli.config.as_deref(), &root)?;
        let engine = SkillEngine::open(&config, &base)?;

        Ok(Self {
            root,
            base,
            config,
            engine,
            output: cli.output_mode(),
            verbosity: cli.verbose,
        })
    }

    #[must_use]
    pub const fn robot(&self) -> bool {
        matches!(self.output, OutputMode::Robot)
    }

    fn find_root() -> Result<PathBuf> {
        if let Ok(root) = std::env::var("SW_ROOT") {
            return Ok(PathBuf::from(root));
        }
        let cwd = std::env::current_dir()?;
        if let Some(found) = find_upwards(&cwd, ROOT_DIR) {
            return Ok(found);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| SwError::MissingConfig("data directory not found".to_string()))?;
        Ok(data_dir.join("skillweave"))
    }
}

fn find_upwards(start: &Path, name: &str) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(name);
        if candidate.is_dir() {
            return Some(candidate);
        }
        current = dir.parent();
    }
    None
}
