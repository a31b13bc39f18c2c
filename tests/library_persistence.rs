use penflow::api::PenflowApi;
use penflow::config::PenflowConfig;
use penflow::model::{FileUpdate, SortConfig, SortField, SortOrder};
use penflow::store::adapter::LibraryAdapter;
use penflow::store::fs_persister::FsPersister;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn config_in(temp: &TempDir, autosave_interval_ms: u64) -> PenflowConfig {
    PenflowConfig {
        database_name: "penflow".to_string(),
        data_dir: Some(temp.path().join("data")),
        autosave_interval_ms,
    }
}

#[test]
fn test_files_survive_restart() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp, 1000);

    let id = {
        let mut api = PenflowApi::open(&config).unwrap();
        api.editor().set_content("# Groceries\n\n- eggs");
        let id = api.save_current().unwrap().unwrap();
        api.library_mut()
            .update_file(&id, FileUpdate::default().tags("home, errands"))
            .unwrap();
        id
    };

    let api = PenflowApi::open(&config).unwrap();
    let file = api.library().get_file(&id).unwrap().unwrap();
    assert_eq!(file.title, "Groceries");
    assert_eq!(file.content, "# Groceries\n\n- eggs");
    assert_eq!(api.library().get_all_tags(), vec!["errands", "home"]);
}

#[test]
fn test_config_file_drives_the_stack() {
    let temp = TempDir::new().unwrap();
    let config_dir = temp.path().join("config");
    let mut config = config_in(&temp, 0);
    config.database_name = "journal".to_string();
    config.save(&config_dir).unwrap();

    let loaded = PenflowConfig::load(&config_dir).unwrap();
    let mut api = PenflowApi::open(&loaded).unwrap();
    api.library_mut()
        .create_file("day-1", "# Monday", None, "")
        .unwrap();

    let document = fs::read_to_string(temp.path().join("data").join("journal.json")).unwrap();
    assert!(document.contains("\"day-1\""));
    assert!(document.contains("\"createdAt\""));
}

#[test]
fn test_corrupt_rows_on_disk_are_skipped() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(
        data_dir.join("penflow.json"),
        r#"{
            "library": {
                "ok": {"content": "fine", "title": "Fine", "tags": "",
                       "createdAt": 1, "updatedAt": 1, "visitedAt": 1},
                "broken": {"content": "no timestamps", "title": "Broken", "tags": ""},
                "junk": 42
            }
        }"#,
    )
    .unwrap();

    let api = PenflowApi::open(&config_in(&temp, 1000)).unwrap();
    let files = api.library().get_files_array();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].id, "ok");
    assert_eq!(api.library().get_file_count().unwrap(), 2);
}

#[test]
fn test_unflushed_writes_are_lost_without_flush() {
    let temp = TempDir::new().unwrap();
    let data_dir = temp.path().join("data");

    let mut adapter = LibraryAdapter::new("penflow", FsPersister::new(data_dir.clone()))
        .with_autosave_interval(Duration::from_secs(3600));
    adapter.initialize().unwrap();
    adapter
        .create_file("a", &FileUpdate::default().title("Pending"))
        .unwrap();
    assert!(adapter.is_dirty());

    // Simulate a crash: the adapter goes away without destroy().
    drop(adapter);

    let mut reopened = LibraryAdapter::new("penflow", FsPersister::new(data_dir));
    reopened.initialize().unwrap();
    assert_eq!(reopened.get_file_count().unwrap(), 0);
}

#[test]
fn test_sorting_and_search_over_reloaded_library() {
    let temp = TempDir::new().unwrap();
    let config = config_in(&temp, 0);

    {
        let mut api = PenflowApi::open(&config).unwrap();
        let library = api.library_mut();
        for (id, title) in [("a", "Alpha"), ("b", "beta"), ("c", "Gamma")] {
            library.create_file(id, "", Some(title), "").unwrap();
        }
    }

    let api = PenflowApi::open(&config).unwrap();
    let library = api.library();
    library.set_sort_config(SortConfig::new(SortField::Title, SortOrder::Desc));
    let titles: Vec<String> = library
        .get_sorted_files()
        .into_iter()
        .map(|f| f.title)
        .collect();
    assert_eq!(titles, vec!["Gamma", "beta", "Alpha"]);

    let hits: Vec<String> = library
        .search_files("ALP")
        .into_iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(hits, vec!["a"]);
}
