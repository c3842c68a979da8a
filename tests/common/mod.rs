#![allow(dead_code)]

use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::prelude::*;
use fake::Fake;
use fake::faker::internet::en::FreeEmail;
use fake::faker::lorem::en::{Word, Words};
use fake::faker::name::en::Name;
use nbgit_core::artifacts::objects::commit::Identity;
use nbgit_core::artifacts::objects::object_id::ObjectId;
use nbgit_core::{ConfigPaths, Repository};
use std::path::PathBuf;

/// A working tree under `work/` next to private user and system config files,
/// so tests never read the real `~/.gitconfig`
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        dir.child("work").create_dir_all().expect("Failed to create work dir");

        Sandbox { dir }
    }

    pub fn work(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn user_config(&self) -> PathBuf {
        self.dir.path().join("gitconfig")
    }

    pub fn system_config(&self) -> PathBuf {
        self.dir.path().join("system-gitconfig")
    }

    pub fn config_paths(&self) -> ConfigPaths {
        ConfigPaths::new(Some(self.user_config()), Some(self.system_config()))
    }

    pub fn write(&self, relative: &str, content: &str) {
        self.dir
            .child("work")
            .child(relative)
            .write_str(content)
            .unwrap_or_else(|e| panic!("Failed to write {relative}: {e}"));
    }

    /// Random `<word>.txt` file with random words in it
    pub fn write_random_file(&self) -> (String, String) {
        let file_name = format!("{}-{}.txt", Word().fake::<String>(), (0..10_000).fake::<u32>());
        let file_content = Words(5..10).fake::<Vec<String>>().join(" ");
        self.write(&file_name, &file_content);

        (file_name, file_content)
    }

    pub fn read(&self, relative: &str) -> Option<Vec<u8>> {
        std::fs::read(self.work().join(relative)).ok()
    }

    pub fn index_bytes(&self) -> Option<Vec<u8>> {
        self.read(".git/index")
    }

    pub fn master_bytes(&self) -> Option<Vec<u8>> {
        self.read(".git/refs/heads/master")
    }

    /// Initialized repository handle writing its output nowhere
    pub async fn init_repository(&self) -> Repository {
        let mut repository = Repository::new(
            &self.work(),
            Box::new(std::io::sink()),
            &self.config_paths(),
        )
        .expect("Failed to open repository");
        repository.init().await.expect("Failed to init repository");

        repository
    }

    /// `nbgit` running inside the working tree with the sandbox config files
    pub fn nbgit(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("nbgit").expect("Failed to find nbgit binary");
        cmd.current_dir(self.work())
            .env("GIT_CONFIG_GLOBAL", self.user_config())
            .env("GIT_CONFIG_SYSTEM", self.system_config())
            .env_remove("GIT_AUTHOR_NAME")
            .env_remove("GIT_AUTHOR_EMAIL")
            .env_remove("GIT_AUTHOR_DATE")
            .args(args);

        cmd
    }
}

pub fn random_identity() -> Identity {
    Identity::new(Name().fake::<String>(), FreeEmail().fake::<String>())
}

pub fn tree_names(repository: &Repository, tree_oid: &ObjectId) -> Vec<String> {
    repository
        .database()
        .parse_object_as_tree(tree_oid)
        .expect("Failed to read tree")
        .into_entries()
        .map(|(name, _)| name)
        .collect()
}
