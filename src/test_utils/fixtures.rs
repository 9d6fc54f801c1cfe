use std::path::PathBuf;

use tempfile::TempDir;

use crate::core::{LOCAL_OVERRIDE_FILE, Precedence, SKILL_FILE, SkillRoot};

/// Test fixture providing an isolated skills tree on disk.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitTestFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();

        println!("[FIXTURE] Created temp directory: {data_path:?}");

        Self {
            temp_dir,
            data_path,
        }
    }

    /// Create a test file with content.
    #[must_use]
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.data_path.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        println!(
            "[FIXTURE] Created file: {:?} ({} bytes)",
            full_path,
            content.len()
        );
        full_path
    }

    /// Create `skills/<name>/SKILL.md`.
    #[must_use]
    pub fn create_skill(&self, name: &str, content: &str) -> PathBuf {
        self.create_file(&format!("skills/{name}/{SKILL_FILE}"), content)
    }

    /// Create `skills/<name>/SKILL.local.md`.
    #[must_use]
    pub fn create_override(&self, name: &str, content: &str) -> PathBuf {
        self.create_file(&format!("skills/{name}/{LOCAL_OVERRIDE_FILE}"), content)
    }

    /// Create `<layer>/<name>/SKILL.md` for multi-layer tests.
    #[must_use]
    pub fn create_layer_skill(&self, layer: &str, name: &str, content: &str) -> PathBuf {
        self.create_file(&format!("{layer}/{name}/{SKILL_FILE}"), content)
    }

    /// The default `skills/` root as a project-layer root.
    #[must_use]
    pub fn skills_root(&self) -> SkillRoot {
        SkillRoot::new(self.data_path.join("skills"), Precedence::Project)
    }
}

/// Minimal `SKILL.md` text with front matter.
#[must_use]
pub fn skill_markdown(name: &str, description: &str, extra_front_matter: &str, body: &str) -> String {
    let mut doc = format!("---\nname: {name}\ndescription: {description}\n");
    if !extra_front_matter.is_empty() {
        doc.push_str(extra_front_matter.trim_end());
        doc.push('\n');
    }
    doc.push_str("---\n");
    doc.push_str(body);
    doc
}

impl Drop for UnitTestFixture {
    fn drop(&mut self) {
        println!("[FIXTURE] Cleaning up temp directory: {:?}", self.data_path);
    }
}
