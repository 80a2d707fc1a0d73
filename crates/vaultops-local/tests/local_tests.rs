use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vaultops_core::{is_volume_root, OperationItem, OpsConfig, TaskResult, Volume};
use vaultops_local::{collect_files, DirVolume, FsHostTree, LocalVolume, OverwriteWiper};
use vaultops_ops::{expand_items, expand_move_items, NullSink, OperationExecutor, TaskSupervisor};

fn setup(dir: &Path) -> OperationExecutor {
    let config = OpsConfig::default();
    let backend = DirVolume::create(dir.join("vault"), &config).unwrap();
    let volume: Arc<dyn Volume> = Arc::new(LocalVolume::new(backend));
    let supervisor = Arc::new(TaskSupervisor::new(NullSink, config));
    OperationExecutor::new(supervisor, volume)
}

fn snapshot(root: &Path) -> Vec<(PathBuf, Option<Vec<u8>>)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            let relative = path.strip_prefix(root).unwrap().to_path_buf();
            if path.is_dir() {
                stack.push(path);
                out.push((relative, None));
            } else {
                out.push((relative, Some(fs::read(&path).unwrap())));
            }
        }
    }
    out.sort();
    out
}

#[tokio::test]
async fn test_import_export_round_trip_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let executor = setup(dir.path());
    let host = Arc::new(FsHostTree::new());

    let input = dir.path().join("input");
    fs::create_dir_all(input.join("nested/deeper")).unwrap();
    fs::write(input.join("small.txt"), b"small").unwrap();
    fs::write(input.join("nested/big.bin"), vec![42u8; 3 * 4096 + 17]).unwrap();
    fs::write(input.join("nested/deeper/empty"), b"").unwrap();

    let outcome = executor
        .import_directory(Arc::clone(&host), input.clone(), "/input".to_string())
        .wait()
        .await
        .unwrap();
    assert_eq!(outcome.result, TaskResult::completed());
    assert_eq!(outcome.sources.len(), 3);

    let output = dir.path().join("output");
    fs::create_dir(&output).unwrap();
    let result = executor
        .export(
            Arc::clone(&host),
            output.clone(),
            vec![OperationItem::source_only("/input", true)],
        )
        .wait()
        .await
        .unwrap();
    assert_eq!(result, TaskResult::completed());

    assert_eq!(snapshot(&output.join("input")), snapshot(&input));
}

#[tokio::test]
async fn test_copy_and_move_inside_volume() {
    let dir = tempfile::tempdir().unwrap();
    let executor = setup(dir.path());
    let volume = Arc::clone(executor.volume());

    assert!(volume.mkdir("/docs"));
    assert!(volume.mkdir("/docs/sub"));
    let handle = volume.open_write("/docs/sub/a.txt").unwrap();
    assert_eq!(volume.write(handle, 0, b"payload"), 7);
    volume.close_file(handle);

    let items = expand_items(volume.as_ref(), "/docs", "/copy", true).unwrap();
    let result = executor.copy(items, None).wait().await.unwrap();
    assert!(result.is_success());
    assert_eq!(volume.size("/copy/sub/a.txt"), Some(7));

    // Moving onto the copy merges the two trees.
    assert!(volume.mkdir("/docs/extra"));
    let items = expand_move_items(volume.as_ref(), "/docs", "/copy", true).unwrap();
    assert!(volume.remove_file("/copy/sub/a.txt"));

    let result = executor.move_items(items).wait().await.unwrap();
    assert!(result.is_success());
    assert!(!volume.exists("/docs"));
    assert!(volume.exists("/copy/extra"));
    assert_eq!(volume.size("/copy/sub/a.txt"), Some(7));
}

fn write_file(volume: &dyn Volume, path: &str, data: &[u8]) {
    let handle = volume.open_write(path).unwrap();
    assert_eq!(volume.write(handle, 0, data), data.len() as isize);
    volume.close_file(handle);
}

#[tokio::test]
async fn test_move_directory_to_fresh_destination() {
    let dir = tempfile::tempdir().unwrap();
    let executor = setup(dir.path());
    let volume = Arc::clone(executor.volume());

    assert!(volume.mkdir("/docs"));
    assert!(volume.mkdir("/docs/sub"));
    assert!(volume.mkdir("/dst"));
    write_file(volume.as_ref(), "/docs/a.txt", b"a");
    write_file(volume.as_ref(), "/docs/sub/b.txt", b"bb");

    let items = expand_move_items(volume.as_ref(), "/docs", "/dst/docs", true).unwrap();
    let result = executor.move_items(items).wait().await.unwrap();

    assert_eq!(result, TaskResult::completed());
    assert!(!volume.exists("/docs"));
    assert_eq!(volume.size("/dst/docs/a.txt"), Some(1));
    assert_eq!(volume.size("/dst/docs/sub/b.txt"), Some(2));
}

#[tokio::test]
async fn test_merge_moves_new_subdirectory_whole() {
    let dir = tempfile::tempdir().unwrap();
    let executor = setup(dir.path());
    let volume = Arc::clone(executor.volume());

    assert!(volume.mkdir("/A"));
    assert!(volume.mkdir("/A/sub"));
    write_file(volume.as_ref(), "/A/sub/f", b"content");
    assert!(volume.mkdir("/B"));
    assert!(volume.mkdir("/B/A"));
    write_file(volume.as_ref(), "/B/A/kept", b"old");

    let items = expand_move_items(volume.as_ref(), "/A", "/B/A", true).unwrap();
    let result = executor.move_items(items).wait().await.unwrap();

    assert_eq!(result, TaskResult::completed());
    assert!(!volume.exists("/A"));
    assert_eq!(volume.size("/B/A/sub/f"), Some(7));
    assert_eq!(volume.size("/B/A/kept"), Some(3));
}

#[tokio::test]
async fn test_copy_volume_then_wipe_original() {
    let dir = tempfile::tempdir().unwrap();
    let config = OpsConfig::default();
    {
        let executor = setup(dir.path());
        let volume = executor.volume();
        assert!(volume.mkdir("/d"));
        let handle = volume.open_write("/d/f").unwrap();
        assert_eq!(volume.write(handle, 0, &[1u8; 5000]), 5000);
        volume.close_file(handle);
        volume.close();
    }

    let vault = dir.path().join("vault");
    let backups = dir.path().join("backups");
    fs::create_dir(&backups).unwrap();

    let executor = setup(&dir.path().join("scratch"));
    let host = Arc::new(FsHostTree::new());

    let outcome = executor
        .copy_volume(Arc::clone(&host), vault.clone(), backups.clone())
        .wait()
        .await
        .unwrap();
    assert!(outcome.result.is_success());
    let copy_root = outcome.destination_root.unwrap();
    assert!(is_volume_root(&copy_root, &config));
    assert_eq!(snapshot(&copy_root), snapshot(&vault));

    let files = collect_files(host.as_ref(), &vault).unwrap();
    let outcome = executor
        .wipe(
            host,
            Arc::new(OverwriteWiper::default()),
            files,
            Some(vault.clone()),
        )
        .wait()
        .await
        .unwrap();
    assert!(outcome.result.is_success());
    assert_eq!(outcome.root_removed, Some(true));
    assert!(!vault.exists());

    let reopened = DirVolume::open(&copy_root, &config).unwrap();
    assert_eq!(LocalVolume::new(reopened).size("/d/f"), Some(5000));
}
