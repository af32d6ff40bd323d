//! Concurrency: lock-free lookups racing control-plane writes, socket
//! detach racing updates and teardown, and teardown waiting for in-flight
//! readers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use reuseport_array::sock::{ReuseGroupId, SockAttrs, Socket};
use reuseport_array::{MapAttr, ReuseportArray, UpdateFlags, select_socket};

const READERS: usize = 4;

fn array(max_entries: u32) -> Arc<ReuseportArray> {
    Arc::new(ReuseportArray::new(MapAttr::fd_array(max_entries)).unwrap())
}

#[test]
fn lookups_only_observe_published_sockets() {
    let arr = array(4);
    let group = ReuseGroupId::next();
    let pool: Vec<_> = (0..8)
        .map(|_| Socket::new_reuseport(SockAttrs::udp4(), group))
        .collect();
    let published: HashSet<u64> = pool.iter().map(|sk| sk.serial()).collect();
    let published = Arc::new(published);

    let stop = Arc::new(AtomicBool::new(false));
    let start = Arc::new(Barrier::new(READERS + 1));
    let hits = Arc::new(AtomicU64::new(0));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let arr = Arc::clone(&arr);
            let stop = Arc::clone(&stop);
            let start = Arc::clone(&start);
            let hits = Arc::clone(&hits);
            let published = Arc::clone(&published);
            thread::spawn(move || {
                start.wait();
                while !stop.load(Ordering::Relaxed) {
                    for index in 0..4 {
                        if let Some(sk) = arr.lookup(index) {
                            assert!(published.contains(&sk.serial()));
                            assert_eq!(sk.reuse_group(), Some(group));
                            hits.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    start.wait();
    let deadline = Instant::now() + Duration::from_millis(200);
    let mut round = 0_usize;
    while Instant::now() < deadline {
        // Rotate sockets through slots: delete then re-place.
        let index = u32::try_from(round % 4).unwrap();
        let _ = arr.delete(index);
        for sk in &pool {
            if arr.update(index, sk, UpdateFlags::NoExist).is_ok() {
                break;
            }
        }
        round += 1;
    }
    stop.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    assert!(hits.load(Ordering::Relaxed) > 0);
    assert!(arr.check_bindings().is_empty());
}

#[test]
fn detach_racing_update_keeps_bindings_consistent() {
    for _ in 0..50 {
        let arr = array(2);
        let group = ReuseGroupId::next();
        let old = Socket::new_reuseport(SockAttrs::tcp4(), group);
        let new = Socket::new_reuseport(SockAttrs::tcp4(), group);
        arr.update(0, &old, UpdateFlags::Any).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let closer = {
            let old = Arc::clone(&old);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                old.close();
            })
        };
        barrier.wait();
        let replaced = arr.update(0, &new, UpdateFlags::Any);
        closer.join().unwrap();

        // Whatever the interleaving, `old` is unbound and `new` holds slot 0.
        replaced.unwrap();
        assert!(old.binding_snapshot().is_none());
        match arr.lookup(0) {
            Some(sk) => {
                assert!(sk.is(&new));
                assert_eq!(new.binding_snapshot(), Some((arr.registry_id(), 0)));
            }
            None => panic!("replacement evicted by a stale detach"),
        }
        assert!(arr.check_bindings().is_empty());
    }
}

#[test]
fn concurrent_updates_never_double_assign() {
    let arr = array(8);
    let sk = Socket::new_reuseport(SockAttrs::udp4(), ReuseGroupId::next());
    let barrier = Arc::new(Barrier::new(8));

    let writers: Vec<_> = (0_u32..8)
        .map(|index| {
            let arr = Arc::clone(&arr);
            let sk = Arc::clone(&sk);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                arr.update(index, &sk, UpdateFlags::NoExist).is_ok()
            })
        })
        .collect();
    let winners = writers
        .into_iter()
        .map(|w| w.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(arr.len(), 1);
    assert!(arr.check_bindings().is_empty());
}

#[test]
fn free_waits_for_selected_socket() {
    let arr = array(1);
    let group = ReuseGroupId::next();
    let sk = Socket::new_reuseport(SockAttrs::tcp6(), group);
    arr.update(0, &sk, UpdateFlags::Any).unwrap();

    let holding = Arc::new(Barrier::new(2));
    let done_reading = Arc::new(AtomicBool::new(false));

    let reader = {
        let arr = Arc::clone(&arr);
        let holding = Arc::clone(&holding);
        let done_reading = Arc::clone(&done_reading);
        thread::spawn(move || {
            let picked = select_socket(&arr, 0, group).unwrap();
            holding.wait();
            thread::sleep(Duration::from_millis(30));
            let cookie = picked.cookie();
            done_reading.store(true, Ordering::Release);
            drop(picked);
            cookie
        })
    };

    holding.wait();
    arr.free();
    assert!(
        done_reading.load(Ordering::Acquire),
        "free returned while a selected socket was still in use"
    );
    assert_ne!(reader.join().unwrap(), 0);
    assert!(arr.lookup(0).is_none());
    assert!(!sk.has_user_data());
}

#[test]
fn free_racing_close_leaves_no_bindings() {
    const SOCKETS: u32 = 16;

    for _ in 0..50 {
        let arr = array(SOCKETS);
        let group = ReuseGroupId::next();
        let socks: Vec<_> = (0..SOCKETS)
            .map(|_| Socket::new_reuseport(SockAttrs::tcp4(), group))
            .collect();
        for (index, sk) in (0_u32..).zip(&socks) {
            arr.update(index, sk, UpdateFlags::NoExist).unwrap();
        }

        let barrier = Arc::new(Barrier::new(2));
        let closer = {
            let socks = socks.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for sk in &socks {
                    sk.close();
                }
            })
        };
        barrier.wait();
        arr.free();
        closer.join().unwrap();

        assert_eq!(arr.len(), 0);
        for sk in &socks {
            assert!(!sk.has_user_data());
            assert!(sk.binding_snapshot().is_none());
        }
        let snap = arr.metrics().snapshot();
        assert_eq!(
            snap.detaches_total + snap.freed_slots_total,
            u64::from(SOCKETS)
        );
    }
}
