use std::cell::{Cell, RefCell};
use std::rc::Rc;

use test_case::test_case;

use super::*;
use crate::error::PlayerError;
use crate::midi::{Note, ParsedMidi, Track};

struct Rig {
    clock: Rc<ManualClock>,
    timer: Rc<IntervalTimer>,
    synth: RecordingSynth,
    transport: Rc<Transport>,
}

fn rig() -> Rig {
    let clock = Rc::new(ManualClock::new());
    let timer = Rc::new(IntervalTimer::new());
    let synth = RecordingSynth::new();
    let transport = Rc::new(Transport::new(clock.clone(), timer.clone(), Box::new(synth.clone())));
    Rig {
        clock,
        timer,
        synth,
        transport,
    }
}

/// One note per second for `seconds` seconds on track 0, and a sustained bass on track 1.
fn song(seconds: usize) -> ParsedMidi {
    let melody = (0..seconds)
        .map(|i| Note::new(if i % 2 == 0 { "C4" } else { "E4" }, i as f64, 0.5, 0.8))
        .collect();
    let bass = vec![Note::new("C2", 0.0, seconds as f64, 0.6)];
    ParsedMidi::new(vec![
        Track::new(Some("Melody".to_string()), melody),
        Track::new(Some("Bass".to_string()), bass),
    ])
    .unwrap()
}

fn loaded(seconds: usize) -> Rig {
    let rig = rig();
    rig.transport.load_parsed(song(seconds)).unwrap();
    rig
}

fn record<E: EventKind>(transport: &Transport) -> Rc<RefCell<Vec<E::Payload>>>
where
    E::Payload: Clone,
{
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    transport.add_event_listener::<E>(move |payload| sink.borrow_mut().push(payload.clone()));
    log
}

fn starts(notes: &[ScheduledNote], track: usize) -> Vec<f64> {
    notes.iter().filter(|n| n.track == track).map(|n| n.start).collect()
}

#[test]
fn test_initial_state() {
    let rig = rig();
    assert_eq!(rig.transport.status(), TransportStatus::Idle);
    assert_eq!(rig.transport.duration(), 0.0);
    assert_eq!(rig.transport.current_time(), 0.0);
    assert_eq!(rig.transport.playback_rate(), 1.0);
    assert!(!rig.transport.is_playing());
}

#[test]
fn test_play_without_song_is_noop() {
    let rig = rig();
    let plays = record::<Play>(&rig.transport);
    rig.transport.play();
    assert!(plays.borrow().is_empty());
    assert!(!rig.timer.is_running());
}

#[test]
fn test_load_allocates_one_group_per_track() {
    let rig = rig();
    let loads = Rc::new(Cell::new(0));
    let counter = loads.clone();
    rig.transport.add_event_listener::<MidiLoaded>(move |e| {
        assert_eq!(e.midi.tracks().len(), 2);
        counter.set(counter.get() + 1);
    });

    rig.transport.load_parsed(song(4)).unwrap();
    assert_eq!(loads.get(), 1);
    assert_eq!(rig.synth.live_groups(), 2);
    assert_eq!(rig.transport.status(), TransportStatus::Loaded);
    assert_eq!(rig.transport.duration(), 4.0);
}

#[test]
fn test_reload_releases_previous_voices() {
    let rig = loaded(4);
    rig.transport.play();
    rig.transport.load_parsed(song(2)).unwrap();

    assert_eq!(rig.synth.live_groups(), 2);
    assert!(!rig.transport.is_playing());
    assert_eq!(rig.transport.duration(), 2.0);
    let disposed = rig
        .synth
        .events()
        .iter()
        .filter(|e| matches!(e, SynthEvent::Dispose { .. }))
        .count();
    assert_eq!(disposed, 2);
}

#[test]
fn test_play_schedules_every_note_against_the_clock() {
    let rig = loaded(4);
    rig.clock.set(10.0);
    let plays = record::<Play>(&rig.transport);

    rig.transport.play();
    let triggers = rig.synth.triggers();
    assert_eq!(starts(&triggers, 0), vec![10.0, 11.0, 12.0, 13.0]);
    assert_eq!(starts(&triggers, 1), vec![10.0]);
    assert_eq!(triggers[0].duration, 0.5);
    assert_eq!(triggers[0].velocity, 0.8);
    assert_eq!(*plays.borrow(), vec![PlayEvent { current_time: 0.0 }]);
    assert_eq!(rig.timer.interval(), Some(DEFAULT_TICK_INTERVAL));
}

#[test]
fn test_play_twice_is_noop() {
    let rig = loaded(4);
    rig.transport.play();
    rig.transport.play();
    assert_eq!(rig.synth.triggers().len(), 5);
    assert_eq!(rig.timer.start_count(), 1);
}

#[test]
fn test_tick_reports_interpolated_time() {
    let rig = loaded(4);
    let updates = record::<TimeUpdate>(&rig.transport);
    rig.transport.play();

    rig.clock.advance(1.5);
    rig.transport.tick();
    assert_eq!(
        *updates.borrow(),
        vec![TimeUpdateEvent {
            current_time: 1.5,
            duration: 4.0
        }]
    );
}

#[test]
fn test_tick_while_paused_is_silent() {
    let rig = loaded(4);
    let updates = record::<TimeUpdate>(&rig.transport);
    rig.transport.tick();
    assert!(updates.borrow().is_empty());
}

#[test]
fn test_pause_freezes_time_and_silences() {
    let rig = loaded(4);
    rig.transport.play();
    rig.clock.advance(1.25);
    rig.transport.pause();

    assert_eq!(rig.transport.status(), TransportStatus::Paused);
    assert_eq!(rig.transport.current_time(), 1.25);
    rig.clock.advance(5.0);
    assert_eq!(rig.transport.current_time(), 1.25);
    assert!(!rig.timer.is_running());

    // Only the notes that began before the pause remain
    assert_eq!(starts(&rig.synth.pending(), 0), vec![0.0, 1.0]);
    assert!(rig.synth.events().contains(&SynthEvent::ReleaseAll { track: 0 }));
}

#[test]
fn test_pause_is_idempotent() {
    let rig = loaded(4);
    let pauses = record::<Pause>(&rig.transport);
    rig.transport.play();
    rig.clock.advance(2.0);

    rig.transport.pause();
    let events_after_one = rig.synth.events().len();
    rig.transport.pause();

    assert_eq!(pauses.borrow().len(), 1);
    assert_eq!(rig.synth.events().len(), events_after_one);
    assert_eq!(rig.transport.current_time(), 2.0);
    assert_eq!(rig.transport.status(), TransportStatus::Paused);
}

#[test]
fn test_resume_does_not_retrigger_elapsed_notes() {
    let rig = loaded(4);
    rig.transport.play();
    rig.clock.advance(1.5);
    rig.transport.pause();
    rig.synth.clear();

    rig.clock.advance(3.0);
    rig.transport.play();

    // Resumed at clock 4.5 from position 1.5: notes at 2 and 3 land at 5.0 and 6.0
    let triggers = rig.synth.triggers();
    assert_eq!(starts(&triggers, 0), vec![5.0, 6.0]);
    // The bass started at 0 and is not replayed
    assert!(starts(&triggers, 1).is_empty());
}

#[test]
fn test_stop_always_rewinds() {
    let rig = loaded(4);
    let stops = record::<Stop>(&rig.transport);

    rig.transport.stop();
    assert_eq!(rig.transport.current_time(), 0.0);

    rig.transport.play();
    rig.clock.advance(2.5);
    rig.transport.stop();
    assert_eq!(rig.transport.current_time(), 0.0);
    assert!(!rig.transport.is_playing());
    assert_eq!(rig.transport.status(), TransportStatus::Loaded);

    rig.transport.seek(3.0).unwrap();
    rig.transport.stop();
    assert_eq!(rig.transport.current_time(), 0.0);

    assert!(stops.borrow().iter().all(|e| e.current_time == 0.0));
    assert_eq!(stops.borrow().len(), 3);
}

#[test]
fn test_stop_without_song_emits_nothing() {
    let rig = rig();
    let stops = record::<Stop>(&rig.transport);
    rig.transport.stop();
    assert!(stops.borrow().is_empty());
}

#[test_case(-3.0, 0.0 ; "before start")]
#[test_case(2.25, 2.25 ; "inside")]
#[test_case(4.0, 4.0 ; "at end")]
#[test_case(99.0, 4.0 ; "past end")]
fn test_seek_clamps(target: f64, expected: f64) {
    let rig = loaded(4);
    rig.transport.seek(target).unwrap();
    assert_eq!(rig.transport.current_time(), expected);
}

#[test]
fn test_seek_rejects_non_finite() {
    let rig = loaded(4);
    rig.transport.seek(1.0).unwrap();
    assert!(matches!(rig.transport.seek(f64::NAN), Err(PlayerError::InvalidArgument(_))));
    assert!(rig.transport.seek(f64::INFINITY).is_err());
    assert_eq!(rig.transport.current_time(), 1.0);
}

#[test]
fn test_seek_while_paused_only_moves_position() {
    let rig = loaded(4);
    rig.transport.play();
    rig.clock.advance(1.0);
    rig.transport.pause();
    rig.synth.clear();

    rig.transport.seek(3.0).unwrap();
    assert!(rig.synth.triggers().is_empty());
    assert_eq!(rig.transport.status(), TransportStatus::Paused);
    assert_eq!(rig.transport.current_time(), 3.0);
}

#[test]
fn test_seek_while_playing_reschedules() {
    let rig = loaded(4);
    let updates = record::<TimeUpdate>(&rig.transport);
    rig.transport.play();
    rig.clock.advance(0.5);

    rig.transport.seek(2.0).unwrap();

    // Old triggers from now on are gone; notes at 2 and 3 are rescheduled
    // relative to the new anchor at clock -1.5
    assert_eq!(starts(&rig.synth.pending(), 0), vec![0.0, 0.5, 1.5]);
    assert_eq!(starts(&rig.synth.pending(), 1), vec![0.0]);
    assert!(rig.transport.is_playing());
    assert_eq!(rig.transport.current_time(), 2.0);
    assert_eq!(updates.borrow().last().map(|e| e.current_time), Some(2.0));

    rig.clock.advance(1.0);
    assert_eq!(rig.transport.current_time(), 3.0);
}

#[test_case(0.5 ; "half speed")]
#[test_case(1.25 ; "a bit faster")]
#[test_case(2.0 ; "double speed")]
fn test_rate_is_readable_and_scales_gaps(rate: f64) {
    let rig = loaded(4);
    let changes = record::<RateChange>(&rig.transport);
    rig.transport.set_playback_rate(rate).unwrap();
    assert_eq!(rig.transport.playback_rate(), rate);
    assert_eq!(*changes.borrow(), vec![RateChangeEvent { playback_rate: rate }]);

    rig.transport.play();
    let melody = starts(&rig.synth.triggers(), 0);
    for pair in melody.windows(2) {
        assert!((pair[1] - pair[0] - 1.0 / rate).abs() < 1e-9);
    }
    let first = &rig.synth.triggers()[0];
    assert!((first.duration - 0.5 / rate).abs() < 1e-9);
}

#[test_case(0.49 ; "too slow")]
#[test_case(2.01 ; "too fast")]
#[test_case(f64::NAN ; "not a number")]
fn test_rate_out_of_range_is_rejected(rate: f64) {
    let rig = loaded(4);
    rig.transport.set_playback_rate(1.5).unwrap();
    let result = rig.transport.set_playback_rate(rate);
    assert!(matches!(result, Err(PlayerError::InvalidArgument(_))));
    assert_eq!(rig.transport.playback_rate(), 1.5);
}

#[test]
fn test_rate_change_while_playing_keeps_position() {
    let rig = loaded(4);
    let pauses = record::<Pause>(&rig.transport);
    rig.transport.play();
    rig.clock.advance(1.0);
    rig.synth.clear();

    rig.transport.set_playback_rate(2.0).unwrap();
    assert!(rig.transport.is_playing());
    assert_eq!(rig.transport.current_time(), 1.0);
    // Remaining notes at 1, 2 and 3 now arrive every half second from clock 1.0
    assert_eq!(starts(&rig.synth.triggers(), 0), vec![1.0, 1.5, 2.0]);
    assert!(pauses.borrow().is_empty());

    rig.clock.advance(0.5);
    assert_eq!(rig.transport.current_time(), 2.0);
}

#[test]
fn test_end_of_song_stops_and_emits_ended() {
    let rig = loaded(4);
    let order = Rc::new(RefCell::new(Vec::new()));
    let sink = order.clone();
    rig.transport.add_event_listener::<Stop>(move |_| sink.borrow_mut().push("stop"));
    let sink = order.clone();
    rig.transport.add_event_listener::<Ended>(move |_| sink.borrow_mut().push("ended"));

    rig.transport.play();
    rig.clock.advance(3.9);
    rig.transport.tick();
    assert!(order.borrow().is_empty());

    rig.clock.advance(0.2);
    rig.transport.tick();
    assert_eq!(*order.borrow(), vec!["stop", "ended"]);
    assert!(!rig.transport.is_playing());
    assert_eq!(rig.transport.current_time(), 0.0);
    assert!(!rig.timer.is_running());
}

#[test]
fn test_clock_failure_reports_error() {
    let rig = loaded(4);
    let errors = record::<ErrorRaised>(&rig.transport);
    rig.clock.set_unavailable(true);

    rig.transport.play();
    assert!(!rig.transport.is_playing());
    assert!(rig.synth.triggers().is_empty());
    let errors = errors.borrow();
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0].cause, PlayerError::AudioDeviceError(_)));
    assert_eq!(errors[0].message, errors[0].cause.to_string());
}

#[test]
fn test_trigger_failure_halts_playback() {
    let rig = loaded(4);
    let errors = record::<ErrorRaised>(&rig.transport);
    rig.synth.fail_triggers(true);

    rig.transport.play();
    assert!(!rig.transport.is_playing());
    assert!(!rig.timer.is_running());
    assert_eq!(rig.transport.current_time(), 0.0);
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn test_load_failure_preserves_song() {
    let rig = loaded(4);
    rig.transport.seek(2.0).unwrap();

    let result = rig.transport.load_midi(b"not a midi file".to_vec());
    assert!(matches!(result, Err(PlayerError::LoadError(_))));
    assert_eq!(rig.transport.duration(), 4.0);
    assert_eq!(rig.transport.current_time(), 2.0);
    assert_eq!(rig.synth.live_groups(), 2);
}

#[test]
fn test_failed_allocation_leaves_idle() {
    let rig = loaded(4);
    rig.synth.fail_allocation(true);
    let result = rig.transport.load_parsed(song(2));

    assert!(matches!(result, Err(PlayerError::AudioDeviceError(_))));
    assert_eq!(rig.transport.status(), TransportStatus::Idle);
    assert_eq!(rig.synth.live_groups(), 0);
}

#[test]
fn test_listener_can_stop_from_time_update() {
    let rig = loaded(4);
    let weak = Rc::downgrade(&rig.transport);
    rig.transport.add_event_listener::<TimeUpdate>(move |e| {
        if e.current_time >= 2.0 {
            if let Some(transport) = weak.upgrade() {
                transport.stop();
            }
        }
    });
    let ended = record::<Ended>(&rig.transport);

    rig.transport.play();
    rig.clock.advance(1.0);
    rig.transport.tick();
    assert!(rig.transport.is_playing());

    rig.clock.advance(4.0);
    rig.transport.tick();
    assert!(!rig.transport.is_playing());
    assert_eq!(rig.transport.current_time(), 0.0);
    // Stopped by the listener before the end check ran
    assert!(ended.borrow().is_empty());
}

#[test]
fn test_listener_can_restart_from_ended() {
    let rig = loaded(2);
    let weak = Rc::downgrade(&rig.transport);
    rig.transport.add_event_listener::<Ended>(move |_| {
        if let Some(transport) = weak.upgrade() {
            transport.play();
        }
    });

    rig.transport.play();
    rig.clock.advance(2.0);
    rig.transport.tick();

    assert!(rig.transport.is_playing());
    assert_eq!(rig.transport.current_time(), 0.0);
    assert!(rig.timer.is_running());
}

/// A `stop` listener that immediately plays again.
fn restart_on_stop(transport: &Rc<Transport>) {
    let weak = Rc::downgrade(transport);
    transport.add_event_listener::<Stop>(move |_| {
        if let Some(transport) = weak.upgrade() {
            transport.play();
        }
    });
}

#[test]
fn test_reload_is_not_undone_by_stop_listener() {
    let rig = loaded(4);
    restart_on_stop(&rig.transport);
    rig.transport.play();

    rig.transport.load_parsed(song(2)).unwrap();
    assert_eq!(rig.transport.status(), TransportStatus::Loaded);
    assert!(!rig.transport.is_playing());
    assert!(!rig.timer.is_running());
    assert_eq!(rig.transport.duration(), 2.0);
    assert_eq!(rig.synth.live_groups(), 2);

    rig.synth.clear();
    rig.transport.play();
    assert_eq!(starts(&rig.synth.triggers(), 0), vec![0.0, 1.0]);
    assert_eq!(starts(&rig.synth.triggers(), 1), vec![0.0]);
}

#[test]
fn test_dispose_is_not_undone_by_stop_listener() {
    let rig = loaded(4);
    restart_on_stop(&rig.transport);
    rig.transport.play();

    rig.transport.dispose();
    assert_eq!(rig.transport.status(), TransportStatus::Idle);
    assert!(!rig.transport.is_playing());
    assert!(!rig.timer.is_running());
    assert_eq!(rig.transport.current_time(), 0.0);
    assert_eq!(rig.synth.live_groups(), 0);
}

#[test]
fn test_seek_from_last_time_update_loops() {
    let rig = loaded(4);
    let weak = Rc::downgrade(&rig.transport);
    rig.transport.add_event_listener::<TimeUpdate>(move |e| {
        if e.current_time >= e.duration {
            if let Some(transport) = weak.upgrade() {
                transport.seek(0.0).unwrap();
            }
        }
    });
    let ended = record::<Ended>(&rig.transport);

    rig.transport.play();
    rig.synth.clear();
    rig.clock.advance(4.0);
    rig.transport.tick();

    assert!(ended.borrow().is_empty());
    assert!(rig.transport.is_playing());
    assert!(rig.timer.is_running());
    assert_eq!(rig.transport.current_time(), 0.0);
    assert_eq!(starts(&rig.synth.pending(), 0), vec![4.0, 5.0, 6.0, 7.0]);
}

#[test]
fn test_remove_event_listener() {
    let rig = loaded(4);
    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let id = rig.transport.add_event_listener::<Play>(move |_| counter.set(counter.get() + 1));

    rig.transport.play();
    rig.transport.pause();
    assert!(rig.transport.remove_event_listener::<Play>(id));
    rig.transport.play();
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_dispose_releases_everything() {
    let rig = loaded(4);
    rig.transport.play();
    rig.transport.dispose();
    assert_eq!(rig.transport.status(), TransportStatus::Idle);
    assert_eq!(rig.synth.live_groups(), 0);
}
