use nbgit_core::artifacts::objects::commit::Identity;
use nbgit_core::artifacts::objects::object::Object;
use nbgit_core::{CancelFlag, CoreError, ProgressSink};
use pretty_assertions::assert_eq;
use std::cell::{Cell, RefCell};
use std::path::Path;

mod common;
use common::{Sandbox, random_identity, tree_names};

/// Asks for cancellation once `after` paths have been processed
struct CancelAfter {
    after: usize,
    completed: Cell<usize>,
    ended: Cell<bool>,
}

impl CancelAfter {
    fn new(after: usize) -> Self {
        CancelAfter {
            after,
            completed: Cell::new(0),
            ended: Cell::new(false),
        }
    }
}

impl ProgressSink for CancelAfter {
    fn start(&self, _total: usize) {}

    fn update(&self, completed: usize) {
        self.completed.set(completed);
    }

    fn end(&self) {
        self.ended.set(true);
    }

    fn is_cancelled(&self) -> bool {
        self.completed.get() >= self.after
    }
}

/// Asks for cancellation from its `poll`-th `is_cancelled` call on
struct CancelOnPoll {
    poll: usize,
    polls: Cell<usize>,
}

impl CancelOnPoll {
    fn new(poll: usize) -> Self {
        CancelOnPoll {
            poll,
            polls: Cell::new(0),
        }
    }
}

impl ProgressSink for CancelOnPoll {
    fn start(&self, _total: usize) {}

    fn update(&self, _completed: usize) {}

    fn end(&self) {}

    fn is_cancelled(&self) -> bool {
        self.polls.set(self.polls.get() + 1);
        self.polls.get() >= self.poll
    }
}

#[tokio::test]
async fn first_commit_is_a_root_and_second_has_it_as_parent() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");

    let first = repository
        .commit_builder()
        .add("f1")
        .author(random_identity())
        .message("init")
        .write()
        .await?;

    assert!(first.is_root());
    assert_eq!(first.reference.as_ref(), "refs/heads/master");
    assert_eq!(tree_names(&repository, &first.tree_oid), vec!["f1"]);
    assert_eq!(
        sandbox.master_bytes(),
        Some(format!("{}\n", first.oid).into_bytes())
    );

    sandbox.write("f2", "there");
    let second = repository
        .commit_builder()
        .delete("f1")
        .add("f2")
        .author(random_identity())
        .message("second")
        .write()
        .await?;

    assert_eq!(second.parents, vec![first.oid.clone()]);
    assert_eq!(tree_names(&repository, &second.tree_oid), vec!["f2"]);

    let stored = repository.database().parse_object_as_commit(&second.oid)?;
    assert_eq!(stored.parents(), [first.oid]);
    assert_eq!(stored.message(), "second\n");

    Ok(())
}

#[tokio::test]
async fn staged_blob_is_stored_under_its_content_hash() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");

    repository.index_builder().add("f1").write().await?;

    let index = repository.index();
    let mut index = index.lock().await;
    index.rehydrate()?;
    let entry = index.entry_by_path(Path::new("f1")).expect("f1 is tracked");

    assert_eq!(entry.oid.as_ref(), "32f95c0d1244a78b2be1bab8de17906fabb2c4a8");
    assert!(!entry.assume_valid());
    assert!(repository.database().exists(&entry.oid));

    Ok(())
}

#[tokio::test]
async fn tree_id_does_not_depend_on_staging_order() -> anyhow::Result<()> {
    let files = [("a.txt", "a"), ("dir/b.txt", "b"), ("dir/sub/c.txt", "c"), ("dir.txt", "d")];

    let forward = Sandbox::new();
    let forward_repository = forward.init_repository().await;
    let backward = Sandbox::new();
    let backward_repository = backward.init_repository().await;
    for (path, content) in files {
        forward.write(path, content);
        backward.write(path, content);
    }

    let mut builder = forward_repository
        .index_builder()
        .add_all(files.iter().map(|(path, _)| path));
    builder.write().await?;

    for (path, _) in files.iter().rev() {
        backward_repository.index_builder().add(*path).write().await?;
    }

    let forward_tree = builder.write_tree().await?;
    let backward_tree = backward_repository.index_builder().write_tree().await?;

    assert_eq!(forward_tree, backward_tree);
    assert_eq!(
        tree_names(&forward_repository, &forward_tree),
        vec!["a.txt", "dir.txt", "dir"]
    );

    Ok(())
}

#[tokio::test]
async fn empty_write_leaves_the_index_alone() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;

    repository.index_builder().write().await?;
    assert_eq!(sandbox.index_bytes(), None);

    sandbox.write("f1", "hi");
    repository.index_builder().add("f1").write().await?;
    let before = sandbox.index_bytes();

    repository.index_builder().write().await?;

    assert!(before.is_some());
    assert_eq!(sandbox.index_bytes(), before);

    Ok(())
}

#[tokio::test]
async fn deleting_untracked_paths_is_a_no_op() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("kept", "kept");
    repository.index_builder().add("kept").write().await?;

    repository.index_builder().delete("never-tracked").write().await?;

    let tree = repository.index_builder().write_tree().await?;
    assert_eq!(tree_names(&repository, &tree), vec!["kept"]);

    Ok(())
}

#[tokio::test]
async fn deleting_a_directory_untracks_everything_below_it() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("dir/one", "1");
    sandbox.write("dir/nested/two", "2");
    sandbox.write("top", "t");
    repository.index_builder().add("dir").add("top").write().await?;

    repository.index_builder().delete("dir").write().await?;

    let tree = repository.index_builder().write_tree().await?;
    assert_eq!(tree_names(&repository, &tree), vec!["top"]);

    Ok(())
}

#[tokio::test]
async fn move_stages_old_path_deleted_and_new_path_added() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("old.txt", "content");
    repository.index_builder().add("old.txt").write().await?;
    std::fs::rename(sandbox.work().join("old.txt"), sandbox.work().join("new.txt"))?;
    let log = RefCell::new(Vec::<u8>::new());

    repository
        .index_builder()
        .log(&log)
        .move_path("old.txt", "new.txt")
        .write()
        .await?;

    assert_eq!(String::from_utf8(log.into_inner())?, "R old.txt -> new.txt\n");
    let tree = repository.index_builder().write_tree().await?;
    assert_eq!(tree_names(&repository, &tree), vec!["new.txt"]);

    Ok(())
}

#[tokio::test]
async fn paths_outside_the_working_tree_are_rejected_before_any_change() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    repository.index_builder().add("f1").write().await?;
    let before = sandbox.index_bytes();

    let result = repository
        .index_builder()
        .delete("f1")
        .add("../escape.txt")
        .write()
        .await;

    assert!(matches!(result, Err(CoreError::InvalidPath(_))));
    assert_eq!(sandbox.index_bytes(), before);

    Ok(())
}

#[tokio::test]
async fn missing_files_fail_with_an_io_error() {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;

    let result = repository.index_builder().add("ghost.txt").write().await;

    assert!(matches!(result, Err(CoreError::Io { .. })));
    assert_eq!(sandbox.index_bytes(), None);
}

#[tokio::test]
async fn empty_message_is_rejected_without_touching_the_branch() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    repository
        .commit_builder()
        .add("f1")
        .author(random_identity())
        .message("init")
        .write()
        .await?;
    let tip = sandbox.master_bytes();
    let index = sandbox.index_bytes();

    for message in ["", "  \n\t"] {
        sandbox.write("f2", "more");
        let result = repository
            .commit_builder()
            .add("f2")
            .author(random_identity())
            .message(message)
            .write()
            .await;

        assert!(matches!(result, Err(CoreError::InvalidCommit(_))));
    }

    assert_eq!(sandbox.master_bytes(), tip);
    assert_eq!(sandbox.index_bytes(), index);

    Ok(())
}

#[tokio::test]
async fn missing_identity_is_an_invalid_commit() {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");

    let result = repository.commit_builder().add("f1").message("init").write().await;

    assert!(matches!(result, Err(CoreError::InvalidCommit(_))));
    assert_eq!(sandbox.master_bytes(), None);
}

#[tokio::test]
async fn identity_defaults_come_from_the_configuration() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    std::fs::write(
        sandbox.user_config(),
        "[user]\n\tname = Global Name\n\temail = global@example.com\n",
    )?;
    let repository = sandbox.init_repository().await;
    repository.config_mut().set_user_name("Local Name")?;
    sandbox.write("f1", "hi");

    let summary = repository
        .commit_builder()
        .add("f1")
        .message("init")
        .time(1_700_000_000, 120)
        .write()
        .await?;

    let commit = repository.database().parse_object_as_commit(&summary.oid)?;
    assert_eq!(commit.author().name(), "Local Name");
    assert_eq!(commit.author().email(), "global@example.com");
    assert_eq!(
        commit.author().display(),
        "Local Name <global@example.com> 1700000000 +0200"
    );
    assert_eq!(commit.committer(), commit.author());

    Ok(())
}

#[tokio::test]
async fn separate_committer_is_recorded() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    let timestamp = Identity::timestamp_from_epoch(1_600_000_000, -300)?;
    let author = Identity::new_with_timestamp("A".into(), "a@x".into(), timestamp);
    let committer = Identity::new_with_timestamp("C".into(), "c@x".into(), timestamp);

    let summary = repository
        .commit_builder()
        .add("f1")
        .author(author.clone())
        .committer(committer.clone())
        .message("init")
        .write()
        .await?;

    let commit = repository.database().parse_object_as_commit(&summary.oid)?;
    assert_eq!(commit.author(), &author);
    assert_eq!(commit.committer(), &committer);

    Ok(())
}

#[tokio::test]
async fn cancellation_leaves_tip_and_index_byte_identical() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    repository
        .commit_builder()
        .add("f1")
        .author(random_identity())
        .message("init")
        .write()
        .await?;
    let tip = sandbox.master_bytes();
    let index = sandbox.index_bytes();

    for name in ["a", "b", "c"] {
        sandbox.write(name, name);
    }
    let progress = CancelAfter::new(2);
    let result = repository
        .commit_builder()
        .progress(&progress)
        .add_all(["a", "b", "c"])
        .delete("f1")
        .author(random_identity())
        .message("interrupted")
        .write()
        .await;

    assert!(matches!(result, Err(CoreError::Cancelled)));
    assert!(progress.ended.get());
    assert_eq!(sandbox.master_bytes(), tip);
    assert_eq!(sandbox.index_bytes(), index);
    assert!(!sandbox.work().join(".git/index.lock").exists());

    Ok(())
}

#[tokio::test]
async fn cancellation_after_the_commit_is_stored_leaves_tip_and_index_alone() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    repository
        .commit_builder()
        .add("f1")
        .author(random_identity())
        .message("init")
        .write()
        .await?;
    let tip = sandbox.master_bytes();
    let index = sandbox.index_bytes();
    sandbox.write("late.txt", "stored before the abort");

    // one poll for the path, one after staging, the last before the ref moves
    let progress = CancelOnPoll::new(3);
    let result = repository
        .commit_builder()
        .progress(&progress)
        .add("late.txt")
        .author(random_identity())
        .message("interrupted")
        .write()
        .await;

    assert!(matches!(result, Err(CoreError::Cancelled)));
    assert_eq!(progress.polls.get(), 3);
    assert_eq!(sandbox.master_bytes(), tip);
    assert_eq!(sandbox.index_bytes(), index);
    assert!(!sandbox.work().join(".git/index.lock").exists());
    assert!(!sandbox.work().join(".git/refs/heads/master.lock").exists());

    let blob = repository.workspace().parse_blob(Path::new("late.txt"))?;
    assert!(repository.database().exists(&blob.object_id()?));

    Ok(())
}

#[tokio::test]
async fn cancelled_tree_commit_keeps_the_branch() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    repository.index_builder().add("f1").write().await?;
    let tree_oid = repository.index_builder().write_tree().await?;

    let progress = CancelOnPoll::new(1);
    let result = repository
        .commit_builder()
        .progress(&progress)
        .author(random_identity())
        .message("never lands")
        .write_tree_commit(tree_oid)
        .await;

    assert!(matches!(result, Err(CoreError::Cancelled)));
    assert_eq!(progress.polls.get(), 1);
    assert_eq!(sandbox.master_bytes(), None);

    Ok(())
}

#[tokio::test]
async fn identities_that_would_corrupt_the_commit_header_are_rejected() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    let forged = Identity::new(
        format!("Ada\nparent {}\nx", "0".repeat(40)),
        String::from("a@x"),
    );

    let result = repository
        .commit_builder()
        .add("f1")
        .author(forged)
        .message("init")
        .write()
        .await;

    assert!(matches!(result, Err(CoreError::InvalidCommit(_))));
    assert_eq!(sandbox.master_bytes(), None);
    assert_eq!(sandbox.index_bytes(), None);

    repository.config_mut().set_user_name("A\nB")?;
    repository.config_mut().set_email("a@x")?;
    let result = repository.commit_builder().add("f1").message("init").write().await;

    assert!(matches!(result, Err(CoreError::InvalidCommit(_))));
    assert_eq!(sandbox.master_bytes(), None);

    repository.config_mut().set_user_name("Ada")?;
    let summary = repository.commit_builder().add("f1").message("init").write().await?;
    let commit = repository.database().parse_object_as_commit(&summary.oid)?;
    assert_eq!(commit.author().name(), "Ada");
    assert_eq!(commit.message(), "init\n");

    Ok(())
}

#[tokio::test]
async fn cancelled_index_write_keeps_the_old_index() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    repository.index_builder().add("f1").write().await?;
    let index = sandbox.index_bytes();
    sandbox.write("f2", "there");

    let cancel = CancelFlag::new();
    cancel.cancel();
    let result = repository
        .index_builder()
        .progress(&cancel)
        .add("f2")
        .write()
        .await;

    assert!(result.is_err_and(|error| error.is_cancelled()));
    assert_eq!(sandbox.index_bytes(), index);

    Ok(())
}

#[tokio::test]
async fn progress_counts_every_path() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("dir/a", "a");
    sandbox.write("dir/b", "b");
    sandbox.write("c", "c");
    let progress = CancelFlag::new();

    repository
        .index_builder()
        .progress(&progress)
        .add("dir")
        .add("c")
        .delete("gone")
        .write()
        .await?;

    assert_eq!(progress.total(), 4);
    assert_eq!(progress.completed(), 4);

    Ok(())
}

#[tokio::test]
async fn corrupt_branch_tip_is_a_repository_state_error() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write(".git/refs/heads/master", &format!("{}\n", "0".repeat(40)));
    sandbox.write("f1", "hi");

    let result = repository
        .commit_builder()
        .add("f1")
        .author(random_identity())
        .message("init")
        .write()
        .await;

    assert!(matches!(result, Err(CoreError::RepositoryState(_))));
    assert_eq!(sandbox.index_bytes(), None);

    Ok(())
}

#[tokio::test]
async fn prebuilt_tree_can_be_committed() -> anyhow::Result<()> {
    let sandbox = Sandbox::new();
    let repository = sandbox.init_repository().await;
    sandbox.write("f1", "hi");
    let log = RefCell::new(Vec::<u8>::new());

    let mut builder = repository.index_builder().log(&log).add("f1");
    builder.write().await?;
    let tree_oid = builder.write_tree().await?;

    let summary = repository
        .commit_builder()
        .author(random_identity())
        .message("from a tree\n\nwith a body")
        .write_tree_commit(tree_oid.clone())
        .await?;

    assert!(summary.is_root());
    assert_eq!(summary.tree_oid, tree_oid);
    assert_eq!(summary.short_message, "from a tree");
    assert_eq!(String::from_utf8(log.into_inner())?, "A f1\n");
    assert_eq!(repository.refs().read_head()?, Some(summary.oid));

    Ok(())
}
