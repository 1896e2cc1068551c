//! TubHandler integration tests: enumeration, numbering, new writers.

mod common;

use tempfile::TempDir;

use common::{create_sample_tubs, sample_record, sample_schema};
use tubstore::{TubError, TubHandler};

fn tmp_dir() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

#[test]
fn test_create_tub_handler() {
    let dir = tmp_dir();
    let handler = TubHandler::new(dir.path()).expect("handler");
    assert_eq!(handler.root(), dir.path());
    assert!(handler.get_tub_list().expect("list").is_empty());
    assert_eq!(handler.next_tub_number().expect("next"), 0);
}

#[test]
fn test_missing_root_errors() {
    let dir = tmp_dir();
    let res = TubHandler::new(dir.path().join("nope"));
    assert!(matches!(res, Err(TubError::RootMissing { .. })));
}

#[test]
fn test_get_tub_list() {
    let dir = tmp_dir();
    create_sample_tubs(dir.path(), 5, 2);
    std::fs::create_dir(dir.path().join("models")).expect("mkdir");
    std::fs::write(dir.path().join("notes.txt"), "not a tub").expect("write");

    let handler = TubHandler::new(dir.path()).expect("handler");
    let tubs = handler.get_tub_list().expect("list");
    assert_eq!(tubs.len(), 5);
    assert_eq!(tubs[0], dir.path().join("tub_0"));
}

#[test]
fn test_next_tub_number() {
    let dir = tmp_dir();
    create_sample_tubs(dir.path(), 5, 1);

    let handler = TubHandler::new(dir.path()).expect("handler");
    assert_eq!(handler.next_tub_number().expect("next"), 5);
}

#[test]
fn test_next_tub_number_fills_gaps() {
    let dir = tmp_dir();
    create_sample_tubs(dir.path(), 4, 1);
    std::fs::remove_dir_all(dir.path().join("tub_2")).expect("remove tub_2");

    let handler = TubHandler::new(dir.path()).expect("handler");
    assert_eq!(handler.next_tub_number().expect("next"), 2);
}

#[test]
fn test_new_tub_writer() {
    let dir = tmp_dir();
    create_sample_tubs(dir.path(), 5, 1);

    let handler = TubHandler::new(dir.path()).expect("handler");
    let expected = handler.next_tub_number().expect("next");
    let mut writer = handler.new_tub_writer(sample_schema()).expect("writer");

    assert_eq!(handler.get_tub_list().expect("list").len(), 6);

    let name = writer.path().file_name().and_then(|n| n.to_str()).expect("name").to_string();
    let parts: Vec<&str> = name.split('_').collect();
    assert_eq!(parts[0], "tub");
    assert_eq!(parts[parts.len() - 2].parse::<usize>().expect("number"), expected);

    assert_eq!(writer.current_ix(), 0);
    writer.put_record(&sample_record(0)).expect("put");
    assert_eq!(writer.get_num_records(), 1);
    assert_eq!(handler.next_tub_number().expect("next"), 6);
}

#[test]
fn test_new_tub_writer_with_meta() {
    let dir = tmp_dir();
    let handler = TubHandler::new(dir.path()).expect("handler");
    let user_meta = [("driver".to_string(), "ada".to_string())].into_iter().collect();
    let writer = handler
        .new_tub_writer_with_meta(sample_schema(), user_meta)
        .expect("writer");

    let reopened = tubstore::Tub::open(writer.path()).expect("open");
    assert_eq!(reopened.user_meta().get("driver").map(String::as_str), Some("ada"));
}

#[test]
fn test_next_tub_number_skips_dirs_without_meta() {
    let dir = tmp_dir();
    std::fs::create_dir(dir.path().join("tub_0_24-05-01")).expect("mkdir");

    let handler = TubHandler::new(dir.path()).expect("handler");
    assert!(handler.get_tub_list().expect("list").is_empty());
    assert_eq!(handler.next_tub_number().expect("next"), 1);
}
