use kernel_sync::SpinLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

#[test]
fn guard_unlocks_on_drop() {
    let l = SpinLock::new(0_u32);

    {
        let mut g = l.lock();
        assert!(l.is_locked());
        *g = 41;
    }
    assert!(!l.is_locked());

    let mut g = l.lock();
    *g += 1;
    assert_eq!(*g, 42);
}

#[test]
fn try_lock_fails_while_held() {
    let l = SpinLock::new(1u8);

    let g1 = l.try_lock().expect("uncontended try_lock");
    assert_eq!(*g1, 1);
    assert!(l.try_lock().is_none());

    drop(g1);
    assert!(l.try_lock().is_some());
}

#[test]
fn failed_try_lock_does_not_release_holder() {
    let l = SpinLock::new(());
    let _held = l.lock();
    assert!(l.try_lock().is_none());
    assert!(l.is_locked(), "a failed try_lock must leave the holder's lock in place");
}

#[test]
fn with_lock_returns_closure_result() {
    let l = SpinLock::new(Vec::<u64>::new());
    let len = l.with_lock(|v| {
        v.extend([0x1000, 0x2000]);
        v.len()
    });
    assert_eq!(len, 2);
    assert_eq!(l.lock().as_slice(), &[0x1000, 0x2000]);
}

#[test]
fn get_mut_bypasses_locking() {
    let mut l = SpinLock::new(vec![1, 2, 3]);
    l.get_mut().push(4);
    assert_eq!(l.lock().as_slice(), &[1, 2, 3, 4]);
}

#[test]
fn contended_pushes_are_exclusive() {
    let threads = 8;
    let iters = 2_000;

    let lock = Arc::new(SpinLock::new(Vec::with_capacity(threads * iters)));
    let in_cs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let lock = Arc::clone(&lock);
            let in_cs = Arc::clone(&in_cs);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for i in 0..iters {
                    lock.with_lock(|v| {
                        let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(prev, 0, "mutual exclusion violated");
                        v.push(t * iters + i);
                        in_cs.fetch_sub(1, Ordering::SeqCst);
                    });
                    thread::yield_now();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let mut all = lock.with_lock(|v| v.clone());
    all.sort_unstable();
    assert_eq!(all, (0..threads * iters).collect::<Vec<_>>());
}

#[test]
fn lock_is_released_on_panic() {
    let l = SpinLock::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        l.with_lock(|v| {
            *v = 123;
            panic!("boom");
        });
    }));
    assert!(res.is_err(), "expected panic");
    assert_eq!(l.with_lock(|v| *v), 123);
}

#[test]
fn spinlock_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let l = SpinLock::new(0u8);
    takes_sync(&l);
}
