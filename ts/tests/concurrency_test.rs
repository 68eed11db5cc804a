//! Several store handles on one file must not lose each other's writes

use std::thread;

use taskstore::TaskStore;
use tempfile::TempDir;

#[test]
fn test_concurrent_handles_do_not_lose_updates() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("tasks.json");

    let workers: Vec<_> = (0..4)
        .map(|w| {
            let path = path.clone();
            thread::spawn(move || {
                let store = TaskStore::open(&path).unwrap();
                for i in 0..10 {
                    store.add(format!("worker {w} task {i}")).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    let tasks = TaskStore::open(&path).unwrap().load().unwrap();
    assert_eq!(tasks.len(), 40);

    let mut ids = tasks.ids();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 40);
}

#[test]
fn test_batch_append_is_contiguous() {
    let temp = TempDir::new().unwrap();
    let store = TaskStore::open(temp.path()).unwrap();
    store.add("first").unwrap();

    let other = TaskStore::open(temp.path()).unwrap();
    let tasks = other.append_batch(["a", "b", "c"]).unwrap();

    let texts: Vec<_> = tasks.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "a", "b", "c"]);
    assert_eq!(store.load().unwrap(), tasks);
}
