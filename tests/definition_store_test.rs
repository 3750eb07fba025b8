// ==========================================
// DefinitionStore 集成测试
// ==========================================
// 测试目标: 保存/加载往返、写入失败回滚、枚举排除与去重、删除
// ==========================================


use csv_importer::logging;
use csv_importer::repository::{artifact_file_name, DefinitionStore, RepositoryError};
use std::fs;
use test_helpers::{definition_for, write_csv, TestWorkspace};

const SAMPLE: &str = "name,price,sku\nWidget,9.99,W-1\nGadget,19.50,G-2\n";

#[test]
fn test_store_then_load_round_trips() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let upload = ws.upload("products.csv", SAMPLE);
    let def = definition_for("Product Feed", &upload, true, Some((7, "Products")), &[(0, 1), (2, 3)]);

    let stored = store.store(&def).expect("store should succeed");

    // 样例文件迁入工作区，上传位置不再存在
    let expected_sample = ws.workspace_importers_dir().join("productfeed.csv");
    assert_eq!(stored.source_path(), Some(expected_sample.as_path()));
    assert!(expected_sample.is_file());
    assert!(!upload.exists());

    let expected_artifact = ws
        .workspace_importers_dir()
        .join(artifact_file_name("productfeed"));
    assert_eq!(stored.storage_file.as_deref(), Some(expected_artifact.as_path()));
    assert!(expected_artifact.is_file());

    let loaded = store.load("productfeed").expect("load should succeed");
    assert_eq!(loaded.mappings, def.mappings);
    assert_eq!(loaded.destination_schema_id(), Some(7));
    assert!(loaded.has_header());
    assert_eq!(loaded.source_path(), Some(expected_sample.as_path()));
    assert_eq!(loaded.storage_file.as_deref(), Some(expected_artifact.as_path()));
    assert_eq!(loaded.created_at, def.created_at);
}

#[test]
fn test_store_is_idempotent_for_stored_definition() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let upload = ws.upload("a.csv", SAMPLE);
    let def = definition_for("Feed", &upload, false, Some((1, "Products")), &[(0, 1)]);
    let first = store.store(&def).expect("first store");
    let second = store.store(&first).expect("second store");

    assert_eq!(first.source_path(), second.source_path());
    assert_eq!(first.storage_file, second.storage_file);
    assert_eq!(store.list_all().len(), 1);
}

#[test]
fn test_failed_artifact_write_rolls_back_sample_move() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    // 定义文件位置被目录占据，原子写入的 rename 必然失败
    let artifact = ws
        .workspace_importers_dir()
        .join(artifact_file_name("blocked"));
    fs::create_dir_all(&artifact).unwrap();

    let upload = ws.upload("blocked.csv", SAMPLE);
    let def = definition_for("Blocked", &upload, true, Some((1, "Products")), &[(0, 1)]);

    let err = store.store(&def).expect_err("store should fail");
    match err {
        RepositoryError::ArtifactWriteRolledBack { original, .. } => assert_eq!(original, upload),
        other => panic!("unexpected error: {other:?}"),
    }

    // 与调用前相比文件系统无净变化
    assert!(upload.is_file());
    assert_eq!(fs::read_to_string(&upload).unwrap(), SAMPLE);
    assert!(!ws.workspace_importers_dir().join("blocked.csv").exists());
    assert!(artifact.is_dir());
    assert_eq!(def.source_path(), Some(upload.as_path()));
}

#[test]
fn test_failed_restore_with_new_sample_keeps_previous_sample() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let first = store
        .store(&definition_for("Feed", &ws.upload("v1.csv", SAMPLE), true, Some((1, "Products")), &[(0, 1)]))
        .expect("first store");
    let previous_sample = first.source_path().unwrap().to_path_buf();
    let artifact = first.storage_file.clone().unwrap();

    // 定义文件位置被目录占据
    fs::remove_file(&artifact).unwrap();
    fs::create_dir(&artifact).unwrap();

    let replacement = ws.upload("v2.csv", "name\nOther\n");
    let mut second = first.clone();
    second.source_file.as_mut().unwrap().path = replacement.clone();

    let err = store.store(&second).expect_err("store should fail");
    assert!(matches!(err, RepositoryError::ArtifactWriteRolledBack { .. }), "{err:?}");

    // 旧样例原样恢复，新上传文件回到原处，不残留备份
    assert_eq!(fs::read_to_string(&previous_sample).unwrap(), SAMPLE);
    assert_eq!(fs::read_to_string(&replacement).unwrap(), "name\nOther\n");
    let mut names: Vec<String> = fs::read_dir(ws.workspace_importers_dir())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![artifact_file_name("feed"), "feed.csv".to_string()]);
}

#[test]
fn test_restore_with_new_sample_replaces_previous_sample() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let first = store
        .store(&definition_for("Feed", &ws.upload("v1.csv", SAMPLE), true, Some((1, "Products")), &[(0, 1)]))
        .expect("first store");

    let replacement = ws.upload("v2.csv", "name\nOther\n");
    let mut second = first.clone();
    second.source_file.as_mut().unwrap().path = replacement.clone();
    let stored = store.store(&second).expect("second store");

    assert_eq!(stored.source_path(), first.source_path());
    assert_eq!(fs::read_to_string(stored.source_path().unwrap()).unwrap(), "name\nOther\n");
    assert!(!replacement.exists());
    assert_eq!(fs::read_dir(ws.workspace_importers_dir()).unwrap().count(), 2);
}

#[cfg(unix)]
#[test]
fn test_unwritable_directory_fails_before_touching_files() {
    use std::os::unix::fs::PermissionsExt;

    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let dir = ws.workspace_importers_dir();
    fs::create_dir_all(&dir).unwrap();
    fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();

    let upload = ws.upload("ro.csv", SAMPLE);
    let def = definition_for("ReadOnly", &upload, true, Some((1, "Products")), &[(0, 1)]);
    let err = store.store(&def).expect_err("store should fail");

    fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(err, RepositoryError::DirectoryNotWritable { .. }));
    assert!(upload.is_file());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn test_load_unknown_handle_is_not_found() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let err = store.load("nothing").expect_err("should be absent");
    assert!(err.is_not_found());
}

#[test]
fn test_list_all_excludes_definition_with_missing_sample() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let keep = store
        .store(&definition_for("Keep", &ws.upload("k.csv", SAMPLE), true, Some((1, "Products")), &[(0, 1)]))
        .unwrap();
    let lose = store
        .store(&definition_for("Lose", &ws.upload("l.csv", SAMPLE), true, Some((1, "Products")), &[(0, 1)]))
        .unwrap();

    fs::remove_file(lose.source_path().unwrap()).unwrap();
    // 格式错误的定义文件同样被静默排除
    fs::write(ws.workspace_importers_dir().join(artifact_file_name("broken")), "{ nope").unwrap();

    let handles: Vec<String> = store.list_all().into_iter().map(|d| d.handle).collect();
    assert_eq!(handles, vec![keep.handle]);
}

#[test]
fn test_component_roots_scan_first_and_win_duplicates() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let config = ws.config().with_component("shop");
    let store = DefinitionStore::new(config.clone());

    // 工作区版本
    let workspace_def = store
        .store(&definition_for("Catalog", &ws.upload("c.csv", SAMPLE), true, Some((1, "Workspace")), &[(0, 1)]))
        .unwrap();

    // 组件目录下同句柄版本：样例与定义文件都在组件目录内
    let component_dir = ws.component_dir("shop");
    let sample = write_csv(&component_dir, "catalog.csv", SAMPLE);
    let mut component_def = definition_for("Catalog", &sample, true, Some((2, "Component")), &[(1, 2)]);
    component_def.storage_file = Some(component_dir.join(artifact_file_name("catalog")));
    let stored = store.store(&component_def).unwrap();

    // 组件文件原地保留
    assert_eq!(stored.source_path(), Some(sample.as_path()));
    assert_eq!(stored.storage_file.as_deref(), component_def.storage_file.as_deref());

    let loaded = store.load("catalog").unwrap();
    assert_eq!(loaded.destination_schema_id(), Some(2));

    let all = store.list_all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].destination_schema_id(), Some(2));
    assert_ne!(all[0].storage_file, workspace_def.storage_file);
}

#[test]
fn test_remove_and_delete() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let a = store
        .store(&definition_for("Alpha", &ws.upload("a.csv", SAMPLE), true, Some((1, "Products")), &[(0, 1)]))
        .unwrap();
    let b = store
        .store(&definition_for("Beta", &ws.upload("b.csv", SAMPLE), true, Some((1, "Products")), &[(0, 1)]))
        .unwrap();

    store.remove(&a).unwrap();
    assert!(!a.storage_file.as_ref().unwrap().exists());
    assert!(!a.source_path().unwrap().exists());

    store.delete("beta").unwrap();
    assert!(!b.source_path().unwrap().exists());
    assert!(store.list_all().is_empty());

    // 再次删除: 定义已不存在
    assert!(store.delete("beta").unwrap_err().is_not_found());
}

#[test]
fn test_remove_reports_missing_sample() {
    logging::init_test();
    let ws = TestWorkspace::new();
    let store = DefinitionStore::new(ws.config());

    let def = store
        .store(&definition_for("Gamma", &ws.upload("g.csv", SAMPLE), true, Some((1, "Products")), &[(0, 1)]))
        .unwrap();
    fs::remove_file(def.source_path().unwrap()).unwrap();

    let err = store.remove(&def).expect_err("missing sample counts as failure");
    assert!(matches!(err, RepositoryError::FileDelete { .. }));
    // 定义文件仍被删除
    assert!(!def.storage_file.as_ref().unwrap().exists());
}
