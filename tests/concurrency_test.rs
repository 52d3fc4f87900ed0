/*!
 * Concurrency Tests
 * Many callers against one store through the guard and the dispatcher
 */

use kdict::{DictClient, DictError, DictStore, IoctlDispatcher, StoreConfig};
use pretty_assertions::assert_eq;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const OPS_PER_THREAD: usize = 500;

#[test]
fn test_threads_growing_one_store() {
    let store = DictStore::create(StoreConfig::new().with_initial_size(4)).unwrap();
    let dispatcher = IoctlDispatcher::new(Arc::clone(&store));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let client = DictClient::new(dispatcher.clone());
            thread::spawn(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = format!("t{}-k{}", t, i);
                    client.set(key.as_bytes(), 2, &i.to_le_bytes(), 1).unwrap();
                }
                assert_eq!(client.space().mapped_regions(), 0);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.len(), THREADS * OPS_PER_THREAD);
    let stats = store.stats();
    assert!(stats.buckets >= THREADS * OPS_PER_THREAD);
    assert!(stats.resizes > 0);

    let client = DictClient::new(dispatcher);
    for t in 0..THREADS {
        let key = format!("t{}-k{}", t, OPS_PER_THREAD - 1);
        let value = client.get(key.as_bytes(), 2).unwrap();
        assert_eq!(value.bytes, (OPS_PER_THREAD - 1).to_le_bytes().to_vec());
    }
}

#[test]
fn test_readers_race_writers_on_shared_keys() {
    let store = DictStore::create(StoreConfig::default()).unwrap();
    let dispatcher = IoctlDispatcher::new(store);
    let keys: Vec<Vec<u8>> = (0..16).map(|i| format!("shared-{}", i).into_bytes()).collect();
    let keys = Arc::new(keys);

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let client = DictClient::new(dispatcher.clone());
            let keys = Arc::clone(&keys);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..1000 {
                    let key = &keys[rng.gen_range(0..keys.len())];
                    // Length and contents agree so readers can check consistency
                    let len = rng.gen_range(1..64);
                    let value = vec![len as u8; len];
                    if rng.gen_bool(0.1) {
                        client.delete(key, 2).unwrap();
                    } else {
                        client.set(key, 2, &value, 1).unwrap();
                    }
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let client = DictClient::new(dispatcher.clone());
            let keys = Arc::clone(&keys);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..1000 {
                    let key = &keys[rng.gen_range(0..keys.len())];
                    match client.get(key, 2) {
                        Ok(value) => {
                            let len = value.bytes.len();
                            assert!(value.bytes.iter().all(|&b| b as usize == len));
                        }
                        Err(DictError::NotFound(_)) => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tokio_tasks_share_dispatcher() {
    let store = DictStore::create(StoreConfig::default()).unwrap();
    let dispatcher = IoctlDispatcher::new(Arc::clone(&store));
    let deleted = Arc::new(AtomicU64::new(0));

    let mut handles = vec![];
    for task in 0..32u32 {
        let client = DictClient::new(dispatcher.clone());
        let deleted = Arc::clone(&deleted);
        handles.push(tokio::spawn(async move {
            for i in 0..50u32 {
                let key = format!("{}/{}", task, i);
                client.set(key.as_bytes(), 2, &task.to_le_bytes(), 1).unwrap();
                if i % 2 == 0 && client.delete(key.as_bytes(), 2).unwrap() {
                    deleted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(deleted.load(Ordering::Relaxed), 32 * 25);
    assert_eq!(store.len(), 32 * 25);
    assert_eq!(store.destroy(), 32 * 25);
}
