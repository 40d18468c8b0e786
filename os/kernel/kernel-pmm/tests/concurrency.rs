use kernel_pmm::hosted::HostedRam;
use kernel_pmm::{FramePool, PhysFrame, PhysicalAddress, Release};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

const BASE: u64 = 0x4000_0000;

fn hosted_pool(frames: usize) -> Arc<FramePool<HostedRam>> {
    let ram = HostedRam::new(PhysicalAddress::new(BASE), frames);
    Arc::new(FramePool::new(ram.range(), ram).unwrap())
}

#[test]
fn concurrent_allocations_never_hand_out_a_frame_twice() {
    const THREADS: usize = 8;
    const FRAMES: usize = 256;

    let pool = hosted_pool(FRAMES);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut got = Vec::new();
                while let Some(frame) = pool.allocate() {
                    got.push(frame);
                }
                got
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for h in handles {
        for frame in h.join().unwrap() {
            assert!(seen.insert(frame), "{frame} handed out twice");
        }
    }
    assert_eq!(seen.len(), FRAMES);
    assert_eq!(pool.free_frames(), 0);
    assert_eq!(pool.stats().allocations, FRAMES as u64);
}

#[test]
fn churn_keeps_counts_consistent() {
    const THREADS: usize = 4;
    const ROUNDS: usize = 500;

    let pool = hosted_pool(16);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    let Some(frame) = pool.allocate() else {
                        thread::yield_now();
                        continue;
                    };
                    assert_eq!(pool.ref_count(frame), Ok(1));
                    assert!(unsafe { pool.mapper().is_filled_with(frame, 0x05) });
                    assert_eq!(pool.release(frame), Release::Reclaimed);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(pool.free_frames(), 16);
    assert_eq!(pool.live_frames(), 0);
    let stats = pool.stats();
    assert_eq!(stats.allocations, stats.reclaims);
    assert_eq!(stats.over_releases, 0);
}

#[test]
fn racing_add_ref_and_release_on_one_frame() {
    const THREADS: usize = 8;
    const ROUNDS: u32 = 1_000;

    let pool = hosted_pool(2);
    let frame: PhysFrame = pool.allocate().unwrap();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..ROUNDS {
                    pool.add_ref(frame).unwrap();
                    let outcome = pool.release(frame);
                    assert!(matches!(outcome, Release::Shared { .. }));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    // Only the allocating owner is left.
    assert_eq!(pool.ref_count(frame), Ok(1));
    assert_eq!(pool.free_frames(), 1);
    assert_eq!(pool.release(frame), Release::Reclaimed);
    assert_eq!(pool.free_frames(), 2);

    let stats = pool.stats();
    assert_eq!(stats.refs_added, u64::from(ROUNDS) * THREADS as u64);
    assert_eq!(stats.shared_releases, stats.refs_added);
}
