//! End-to-end save/replay scenarios against a real save file on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tempfile::TempDir;

use tidemark_core::{
    EffectDescriptor, EffectRef, MemoryCatalog, Session, TimelineItem,
};

fn temp_save_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("project.tidemark");
    (dir, path)
}

fn catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    for (plugin, name) in [("color", "sepia"), ("blur", "gaussian")] {
        catalog.register(EffectDescriptor {
            reference: EffectRef::new(plugin, name),
            summary: String::new(),
        });
    }
    catalog
}

fn sepia(label: &str) -> TimelineItem {
    let mut parameters = BTreeMap::new();
    parameters.insert("strength".to_string(), "0.8".to_string());
    TimelineItem::new(EffectRef::new("color", "sepia"), label, parameters)
}

#[test]
fn append_sync_reopen_round_trips_items_and_parameters() {
    let (_dir, path) = temp_save_path();
    let catalog = catalog();

    {
        let mut session = Session::create(&path).expect("create");
        session.add_item(sepia("tone")).expect("add");
        session
            .set_input_path(Some("/footage/raw.mp4".to_string()))
            .expect("input path");
        session.save().expect("save");
    } // close

    let session = Session::open(&path, &catalog).expect("reopen");
    assert_eq!(session.timeline().len(), 1);
    let item = session.timeline().get(0).expect("item");
    assert_eq!(item.label, "tone");
    assert_eq!(item.effect, EffectRef::new("color", "sepia"));
    assert_eq!(item.parameters.get("strength").map(String::as_str), Some("0.8"));
    assert_eq!(session.input_video_path(), Some("/footage/raw.mp4"));
    // Undo history does not survive reopen.
    assert_eq!(session.history().entries().len(), 0);
}

#[test]
fn reopen_fails_when_an_effect_is_no_longer_installed() {
    let (_dir, path) = temp_save_path();

    {
        let mut session = Session::create(&path).expect("create");
        session.add_item(sepia("tone")).expect("add");
        session.save().expect("save");
    }

    let empty_catalog = MemoryCatalog::new();
    assert!(Session::open(&path, &empty_catalog).is_err());
}

#[test]
fn editing_survives_save_undo_save_redo_save() {
    let (_dir, path) = temp_save_path();
    let catalog = catalog();

    let mut session = Session::create(&path).expect("create");
    session.add_item(sepia("first")).expect("add");
    session.add_item(sepia("second")).expect("add");
    session.save().expect("save both");

    session.undo().expect("undo");
    session.save().expect("save undo");

    {
        let reopened = Session::open(&path, &catalog).expect("reopen mid-undo");
        assert_eq!(reopened.timeline().len(), 1);
        assert_eq!(reopened.timeline().get(0).expect("item").label, "first");
    }

    session.redo().expect("redo");
    session.save().expect("save redo");

    let reopened = Session::open(&path, &catalog).expect("reopen after redo");
    assert_eq!(reopened.timeline().len(), 2);
    assert_eq!(reopened.timeline().get(1).expect("item").label, "second");
}

#[test]
fn move_and_edit_round_trip_through_the_save_file() {
    let (_dir, path) = temp_save_path();
    let catalog = catalog();

    let mut session = Session::create(&path).expect("create");
    for label in ["a", "b", "c"] {
        session.add_item(sepia(label)).expect("add");
    }
    session.move_item(0, 2).expect("move");
    session
        .edit_item(0, sepia("b-edited"))
        .expect("edit");
    session.save().expect("save");

    let reopened = Session::open(&path, &catalog).expect("reopen");
    let labels: Vec<&str> = reopened
        .timeline()
        .items()
        .map(|i| i.label.as_str())
        .collect();
    assert_eq!(labels, ["b-edited", "c", "a"]);
}

#[test]
fn saved_paths_round_trip_including_null() {
    let (_dir, path) = temp_save_path();
    let catalog = catalog();

    let mut session = Session::create(&path).expect("create");
    session
        .set_output_path(Some("/export/final.mp4".to_string()))
        .expect("set output");
    session.save().expect("save");

    {
        let reopened = Session::open(&path, &catalog).expect("reopen");
        assert_eq!(reopened.output_video_path(), Some("/export/final.mp4"));
        assert_eq!(reopened.input_video_path(), None);
    }

    session.set_output_path(None).expect("clear output");
    session.save().expect("save cleared");

    let reopened = Session::open(&path, &catalog).expect("reopen cleared");
    assert_eq!(reopened.output_video_path(), None);
}
