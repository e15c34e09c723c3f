use super::*;

use crate::{
    cache::storage::MemSpillStorage,
    sound::source::MemoryAudioSource,
    task::task::TaskState,
};

const RATE: u32 = 4;

fn test_manager() -> CacheManager {
    CacheManager::new(1 << 24, Arc::new(MemSpillStorage::new()))
}

fn placed(samples: Vec<f32>, gain: f32, manager: &CacheManager) -> PlacedSound {
    PlacedSound {
        handler: SoundHandler::from_source(
            Arc::new(MemoryAudioSource::new(RATE, samples).unwrap()),
            manager,
        ),
        sample_shift: 0,
        abs_range: SampleRange { min: 0, max: i64::from(RATE) - 1 },
        volume: VolumeSnapshot::constant(gain),
        stretch: 1.0,
    }
}

#[test]
fn two_sources_mix_deterministically() {
    let manager = test_manager();
    let mut comp = SoundComposition::new(&manager, RATE);
    comp.add_sound(placed(vec![0.5, 0.5, 1.0, 1.0], 1.0, &manager)).unwrap();
    comp.add_sound(placed(vec![1.0, 0.5, 1.0, 0.25], 0.5, &manager)).unwrap();

    let mut sched = Scheduler::new(Some(2)).unwrap();
    let handle = comp.request_second(&mut sched, 0).unwrap();
    sched.wait_idle();

    assert_eq!(handle.state(), TaskState::Finished);
    // Plain sums of both contributors, second one at half gain.
    assert_eq!(
        comp.samples_at(0).unwrap().data(),
        &[1.0, 0.75, 1.5, 1.125]
    );
}

#[test]
fn the_merge_waits_for_its_readers() {
    let manager = test_manager();
    let mut comp = SoundComposition::new(&manager, RATE);
    let sound = placed(vec![0.25; 4], 1.0, &manager);
    let handler = sound.handler.clone();
    comp.add_sound(sound).unwrap();

    let mut sched = Scheduler::new(Some(1)).unwrap();
    comp.request_second(&mut sched, 0).unwrap();
    // One reader plus the dependent merge.
    assert_eq!(sched.pending_count(), 2);
    sched.wait_idle();

    assert!(handler.data().contains(0));
    assert_eq!(comp.samples_at(0).unwrap().data(), &[0.25; 4]);
}

#[test]
fn missing_sources_contribute_silence() {
    let manager = test_manager();
    let mut comp = SoundComposition::new(&manager, RATE);
    comp.add_sound(placed(vec![0.5, 0.0, 0.5, 0.0], 1.0, &manager)).unwrap();
    comp.add_sound(PlacedSound {
        handler: SoundHandler::missing(RATE, &manager),
        sample_shift: 0,
        abs_range: SampleRange { min: 0, max: 3 },
        volume: VolumeSnapshot::constant(1.0),
        stretch: 1.0,
    })
    .unwrap();

    let mut sched = Scheduler::new(Some(1)).unwrap();
    comp.request_second(&mut sched, 0).unwrap();
    sched.wait_idle();

    assert_eq!(comp.samples_at(0).unwrap().data(), &[0.5, 0.0, 0.5, 0.0]);
}

#[test]
fn in_flight_and_cached_seconds_are_not_requeued() {
    let manager = test_manager();
    let mut comp = SoundComposition::new(&manager, RATE);
    comp.add_sound(placed(vec![0.5; 4], 1.0, &manager)).unwrap();

    let mut sched = Scheduler::new(Some(1)).unwrap();
    assert!(comp.request_second(&mut sched, 0).is_some());
    assert!(comp.request_second(&mut sched, 0).is_none());
    sched.wait_idle();

    assert!(comp.contains(0));
    assert!(comp.request_second(&mut sched, 0).is_none());
}

#[test]
fn seconds_without_contributors_merge_to_silence() {
    let manager = test_manager();
    let comp = SoundComposition::new(&manager, RATE);
    let mut sched = Scheduler::new(Some(1)).unwrap();

    comp.request_second(&mut sched, 9).unwrap();
    sched.wait_idle();

    assert!(comp.samples_at(9).unwrap().data().iter().all(|&v| v == 0.0));
}

#[test]
fn cached_source_seconds_skip_the_readers() {
    let manager = test_manager();
    let sound = placed(vec![0.75; 4], 1.0, &manager);
    let handler = sound.handler.clone();

    let mut warmup = SoundComposition::new(&manager, RATE);
    warmup.add_sound(sound.clone()).unwrap();
    let mut sched = Scheduler::new(Some(1)).unwrap();
    warmup.request_second(&mut sched, 0).unwrap();
    sched.wait_idle();
    assert!(handler.data().contains(0));

    // A second composition over the same handler reuses the decoded second.
    let mut comp = SoundComposition::new(&manager, RATE);
    comp.add_sound(sound).unwrap();
    comp.request_second(&mut sched, 0).unwrap();
    assert_eq!(sched.pending_count(), 1);
    sched.wait_idle();
    assert_eq!(comp.samples_at(0).unwrap().data(), &[0.75; 4]);
}

#[test]
fn add_sound_rejects_degenerate_stretch() {
    let manager = test_manager();
    let mut comp = SoundComposition::new(&manager, RATE);
    let mut sound = placed(vec![0.5; 4], 1.0, &manager);
    sound.stretch = 0.0;
    assert!(comp.add_sound(sound.clone()).is_err());
    sound.stretch = f64::NAN;
    assert!(comp.add_sound(sound).is_err());
}

#[test]
fn clear_sounds_drops_stale_merged_seconds() {
    let manager = test_manager();
    let mut comp = SoundComposition::new(&manager, RATE);
    comp.add_sound(placed(vec![0.5; 4], 1.0, &manager)).unwrap();

    let mut sched = Scheduler::new(Some(1)).unwrap();
    comp.request_second(&mut sched, 0).unwrap();
    sched.wait_idle();
    assert!(comp.contains(0));

    comp.clear_sounds();
    assert!(!comp.contains(0));
}
