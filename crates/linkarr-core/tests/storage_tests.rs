use std::path::{Path, PathBuf};

use linkarr_core::storage::{Database, ProcessedFileRecord, StateRecorder};
use linkarr_core::SkipReason;
use tempfile::tempdir;

#[test]
fn test_upsert_keeps_one_record_per_source() {
    let db = Database::open_in_memory().unwrap();
    let source = Path::new("/src/Show.S01E02.mkv");

    db.upsert(&ProcessedFileRecord::skipped(
        source,
        SkipReason::NoUsableDestination,
        None,
        None,
    ))
    .unwrap();
    db.upsert(&ProcessedFileRecord::linked(
        source,
        Path::new("/dest/Shows/Show/Season 01/Show - S01E02.mkv"),
        Some("tmdb-1".into()),
        Some(1),
    ))
    .unwrap();

    let count: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM processed_file", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);

    let record = db.record_for(source).unwrap().unwrap();
    assert_eq!(record.season, Some(1));
    assert_eq!(record.canonical_id.as_deref(), Some("tmdb-1"));
    assert_eq!(record.skip_reason, None);
}

#[test]
fn test_skip_reason_round_trips_as_text() {
    let db = Database::open_in_memory().unwrap();
    let source = Path::new("/src/d41d8cd98f00b204e9800998ecf8427e.mkv");
    db.upsert(&ProcessedFileRecord::skipped(
        source,
        SkipReason::MissingIdentifiersOnHashFile,
        None,
        None,
    ))
    .unwrap();

    let stored: String = db
        .connection()
        .query_row(
            "SELECT skip_reason FROM processed_file WHERE source_path = ?1",
            rusqlite::params![source.to_string_lossy()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(stored, "missing media identifiers on hash file");
    assert_eq!(
        db.skip_reason_for(source).unwrap(),
        Some(SkipReason::MissingIdentifiersOnHashFile)
    );
    assert_eq!(db.destination_for(source).unwrap(), None);
}

#[test]
fn test_link_index_lookup_by_target() {
    let db = Database::open_in_memory().unwrap();
    let target = Path::new("/src/movie.mkv");
    db.record_link(Path::new("/dest/Movies/A/a.mkv"), target).unwrap();
    db.record_link(Path::new("/dest/Movies/B/b.mkv"), Path::new("/src/other.mkv"))
        .unwrap();

    assert_eq!(
        db.find_by_symlink_target(target).unwrap(),
        Some(PathBuf::from("/dest/Movies/A/a.mkv"))
    );
    db.forget_link(Path::new("/dest/Movies/A/a.mkv")).unwrap();
    assert_eq!(db.find_by_symlink_target(target).unwrap(), None);
    assert_eq!(db.destination_links().unwrap().len(), 1);
}

#[test]
fn test_stats_and_persistence_across_reopen() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("state.db");
    let path_str = path.to_str().unwrap();

    {
        let db = Database::open(path_str).unwrap();
        db.upsert(&ProcessedFileRecord::linked(
            Path::new("/src/a.mkv"),
            Path::new("/dest/a.mkv"),
            None,
            None,
        ))
        .unwrap();
        db.upsert(&ProcessedFileRecord::skipped(
            Path::new("/src/b.txt"),
            SkipReason::UnsupportedFileType,
            None,
            None,
        ))
        .unwrap();
        db.record_link(Path::new("/dest/a.mkv"), Path::new("/src/a.mkv"))
            .unwrap();
    }

    let db = Database::open(path_str).unwrap();
    let stats = db.stats().unwrap();
    assert_eq!(stats.total_records, 2);
    assert_eq!(stats.linked_records, 1);
    assert_eq!(stats.skipped_records, 1);
    assert_eq!(stats.tracked_links, 1);
    assert_eq!(db.load_all_processed().unwrap().len(), 2);

    db.remove(Path::new("/src/a.mkv")).unwrap();
    assert_eq!(db.records_with_destination().unwrap().len(), 0);
}

fn seeded(db: &Database) {
    db.upsert(&ProcessedFileRecord::linked(
        Path::new("/src/Dune.2021.mkv"),
        Path::new("/dest/Movies/Dune (2021)/Dune (2021).mkv"),
        Some("tmdb-438631".into()),
        None,
    ))
    .unwrap();
    db.record_link(
        Path::new("/dest/Movies/Dune (2021)/Dune (2021).mkv"),
        Path::new("/src/Dune.2021.mkv"),
    )
    .unwrap();
    db.upsert(&ProcessedFileRecord::linked(
        Path::new("/src/Show.S01E02.mkv"),
        Path::new("/dest/Shows/Show/Season 01/Show - S01E02.mkv"),
        Some("tvdb-81189".into()),
        Some(1),
    ))
    .unwrap();
    db.upsert(&ProcessedFileRecord::skipped(
        Path::new("/src/notes, draft.txt"),
        SkipReason::UnsupportedFileType,
        None,
        None,
    ))
    .unwrap();
}

#[test]
fn test_search_matches_source_destination_and_id() {
    let db = Database::open_in_memory().unwrap();
    seeded(&db);

    let by_source = db.search("Dune.2021").unwrap();
    assert_eq!(by_source.len(), 1);
    assert_eq!(by_source[0].source_path, PathBuf::from("/src/Dune.2021.mkv"));

    let by_destination = db.search("Season 01").unwrap();
    assert_eq!(by_destination.len(), 1);
    assert_eq!(by_destination[0].season, Some(1));

    assert_eq!(db.search("tvdb-81189").unwrap().len(), 1);
    assert_eq!(db.search("/src/").unwrap().len(), 3);
    assert!(db.search("nothing here").unwrap().is_empty());
}

#[test]
fn test_export_then_import_restores_records() {
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("records.csv");

    let db = Database::open_in_memory().unwrap();
    seeded(&db);
    assert_eq!(db.export_csv(&file).unwrap(), 3);

    let text = std::fs::read_to_string(&file).unwrap();
    assert!(text.starts_with("source_path,destination_path,canonical_id,season,skip_reason"));
    // Fields containing commas are quoted
    assert!(text.contains("\"/src/notes, draft.txt\""));

    let restored = Database::open_in_memory().unwrap();
    assert_eq!(restored.import_csv(&file).unwrap(), 3);

    assert_eq!(restored.get_all_processed().unwrap(), db.get_all_processed().unwrap());
    let skipped = restored
        .record_for(Path::new("/src/notes, draft.txt"))
        .unwrap()
        .unwrap();
    assert_eq!(skipped.destination_path, None);
    assert_eq!(skipped.canonical_id, None);
    assert_eq!(skipped.skip_reason, Some(SkipReason::UnsupportedFileType));
    assert_eq!(
        restored
            .find_by_symlink_target(Path::new("/src/Show.S01E02.mkv"))
            .unwrap(),
        Some(PathBuf::from("/dest/Shows/Show/Season 01/Show - S01E02.mkv"))
    );
}

#[test]
fn test_import_rejects_bad_season() {
    let tmp = tempdir().unwrap();
    let file = tmp.path().join("records.csv");
    std::fs::write(
        &file,
        "source_path,destination_path,canonical_id,season,skip_reason\n/src/a.mkv,,,two,\n",
    )
    .unwrap();

    let db = Database::open_in_memory().unwrap();
    assert!(db.import_csv(&file).is_err());
}

#[test]
fn test_reset_clears_records_and_links() {
    let db = Database::open_in_memory().unwrap();
    seeded(&db);

    db.reset().unwrap();

    let stats = db.stats().unwrap();
    assert_eq!(stats.total_records, 0);
    assert_eq!(stats.tracked_links, 0);
}

#[test]
fn test_maintenance_on_file_database() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("state.db");
    let db = Database::open(path.to_str().unwrap()).unwrap();
    seeded(&db);
    db.delete_processed(Path::new("/src/Dune.2021.mkv")).unwrap();

    db.vacuum().unwrap();
    db.optimize().unwrap();
    assert_eq!(db.integrity_check().unwrap(), vec!["ok".to_string()]);
    assert_eq!(db.stats().unwrap().total_records, 2);
}
