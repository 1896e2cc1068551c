//! TubGroup integration tests: loading, merged schema, counts, cross-tub generators.

mod common;

use std::collections::HashSet;

use tempfile::TempDir;

use common::{create_sample_tub, create_sample_tubs, tub_paths};
use tubstore::{Schema, TrainingConfig, Tub, TubError, TubGroup, Value};

fn tmp_dir() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn sample_group(dir: &TempDir, cnt: usize, records: usize) -> TubGroup {
    let tubs = create_sample_tubs(dir.path(), cnt, records);
    TubGroup::new(tub_paths(&tubs)).expect("group")
}

#[test]
fn test_tubgroup_load() {
    let dir = tmp_dir();
    let group = sample_group(&dir, 5, 10);
    assert_eq!(group.get_num_tubs(), 5);
}

#[test]
fn test_tubgroup_from_list() {
    let dir = tmp_dir();
    let tubs = create_sample_tubs(dir.path(), 3, 2);
    let list = tub_paths(&tubs)
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(",");

    let group = TubGroup::from_list(&format!("{list},")).expect("group");
    assert_eq!(group.get_num_tubs(), 3);
}

#[test]
fn test_tubgroup_rejects_non_tub() {
    let dir = tmp_dir();
    let mut paths = tub_paths(&create_sample_tubs(dir.path(), 2, 1));
    let empty = dir.path().join("empty");
    std::fs::create_dir(&empty).expect("mkdir");
    paths.push(empty);

    assert!(matches!(TubGroup::new(&paths), Err(TubError::NotATub { .. })));
}

#[test]
fn test_tubgroup_inputs() {
    let dir = tmp_dir();
    let group = sample_group(&dir, 5, 1);

    let mut inputs = group.inputs().to_vec();
    inputs.sort();
    assert_eq!(inputs, vec!["angle", "cam/image_array", "throttle"]);
}

#[test]
fn test_tubgroup_types() {
    let dir = tmp_dir();
    let group = sample_group(&dir, 5, 1);

    let mut types = group.types().to_vec();
    types.sort();
    assert_eq!(types, vec!["float", "float", "image_array"]);
}

#[test]
fn test_tubgroup_union_of_different_schemas() {
    let dir = tmp_dir();
    let a = create_sample_tub(&dir.path().join("tub_0"), 1);
    let schema = Schema::new(["angle", "user/mode"], ["float", "str"]).expect("schema");
    let b = Tub::new(dir.path().join("tub_1"), Some(schema)).expect("create");

    let group = TubGroup::new([a.path(), b.path()]).expect("group");
    let inputs: HashSet<&str> = group.inputs().iter().map(String::as_str).collect();
    assert_eq!(inputs, HashSet::from(["cam/image_array", "angle", "throttle", "user/mode"]));
    assert_eq!(group.types().len(), 4);
}

#[test]
fn test_tubgroup_get_num_records() {
    let dir = tmp_dir();
    let group = sample_group(&dir, 5, 5);
    assert_eq!(group.get_num_records(), 5 * 5);
}

#[test]
fn test_tubgroup_get_record_by_path() {
    let dir = tmp_dir();
    let group = sample_group(&dir, 2, 3);
    let path = dir.path().join("tub_1");

    let record = group.get_record(&path, 2).expect("record");
    assert!(matches!(record.get("angle"), Some(Value::Float(_))));
    assert!(matches!(group.get_record(&path, 9), Err(TubError::RecordNotFound { ix: 9 })));
    assert!(matches!(
        group.get_record(dir.path().join("tub_9"), 0),
        Err(TubError::NotATub { .. })
    ));
}

#[test]
fn test_tubgroup_get_df() {
    let dir = tmp_dir();
    let group = sample_group(&dir, 3, 4);
    let frames = group.get_df();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|(_, df)| df.len() == 4));
}

#[test]
fn test_tubgroup_record_gen_spans_members() {
    let dir = tmp_dir();
    let group = sample_group(&dir, 3, 2);

    let keys: Vec<(usize, usize)> = group.get_record_gen().take(7).map(|(k, _)| k).collect();
    assert_eq!(keys, vec![(0, 0), (0, 1), (1, 0), (1, 1), (2, 0), (2, 1), (0, 0)]);
}

#[test]
fn test_tubgroup_batch_and_train_val_gen() {
    let dir = tmp_dir();
    let group = sample_group(&dir, 2, 5);

    let batch = group.get_batch_gen(128, None).expect("batch gen").next().expect("batch");
    assert_eq!(batch.len(), 3);
    assert!(batch.values().all(|c| c.len() == 128));

    let cfg = TrainingConfig::default().with_batch_size(16);
    let (mut train, mut val) = group
        .get_train_val_gen(&["cam/image_array"], &["angle", "throttle"], &cfg)
        .expect("train/val gen");
    assert_eq!(train.num_records() + val.num_records(), 10);

    let (x, y) = train.next().expect("train batch");
    assert_eq!((x.len(), y.len()), (1, 2));
    assert!(x.iter().chain(y.iter()).all(|c| c.len() == 16));
    assert!(val.next().is_some());
}
