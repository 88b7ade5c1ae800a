//! Generated clock fed back through the receive path.

use approx::assert_relative_eq;
use mclksync::channel::event_channel;
use mclksync::event_loop::EventLoop;
use mclksync::midi::clock::{ClockGenerator, ClockRecoverer, ClockReport, GeneratorConfig};
use mclksync::midi::{ClockMessage, EventBuffer, TimedEvent};
use mclksync::transport::{BarBeatTick, TransportSnapshot, TransportState};
use std::sync::{Arc, Mutex};

fn rolling(frame: u64) -> TransportSnapshot {
    TransportSnapshot {
        state: TransportState::Rolling,
        frame,
        frame_rate: 48000,
        bbt: None,
        bbt_offset: None,
    }
}

#[test]
fn test_recovered_tempo_matches_generated() {
    let mut gen = ClockGenerator::new(GeneratorConfig {
        user_bpm: 132.0,
        ..GeneratorConfig::default()
    });
    let mut buf = EventBuffer::default();
    let (producer, consumer) = event_channel(20);

    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink_reports = Arc::clone(&reports);
    let mut event_loop = EventLoop::new(consumer, ClockRecoverer::default(), move |r: &ClockReport| {
        sink_reports.lock().unwrap().push(*r)
    });

    for n in 0..400u64 {
        let frame = n * 256;
        buf.clear();
        gen.process(&rolling(frame), 256, &mut buf);
        for (offset, msg) in buf.messages() {
            assert!(producer.try_push(TimedEvent::new(msg, frame + u64::from(offset))));
        }
        event_loop.poll();
    }

    let reports = reports.lock().unwrap();
    assert!(matches!(
        reports[0],
        ClockReport::Transport {
            message: ClockMessage::Start,
            ..
        }
    ));
    let ClockReport::Clock(last) = reports[reports.len() - 1] else {
        panic!("expected the last report to be a clock");
    };
    // rounding to whole samples jitters the raw tempo slightly
    assert_relative_eq!(last.bpm.unwrap(), 132.0, max_relative = 0.01);
    assert_relative_eq!(last.filtered_bpm.unwrap(), 132.0, max_relative = 0.001);
    let clocks = reports.len() as u64 - 1;
    assert_eq!(
        last.position,
        Some(BarBeatTick::from_clocks(clocks - 1, 4))
    );
}

#[test]
fn test_overflowing_channel_drops_without_blocking() {
    let (producer, consumer) = event_channel(20);
    for n in 0..20 {
        assert!(producer.try_push(TimedEvent::new(ClockMessage::Clock, n)));
    }
    assert!(!producer.try_push(TimedEvent::new(ClockMessage::Clock, 20)));
    assert_eq!(consumer.dropped(), 1);

    let mut times = Vec::new();
    consumer.drain(|ev| times.push(ev.time));
    assert_eq!(times, (0..20).collect::<Vec<_>>());
    assert!(producer.try_push(TimedEvent::new(ClockMessage::Clock, 21)));
}

#[test]
fn test_producer_on_another_thread() {
    let (producer, consumer) = event_channel(64);
    let handle = std::thread::spawn(move || {
        for n in 0..50 {
            producer.try_push(TimedEvent::new(ClockMessage::Clock, n * 1000));
        }
    });
    handle.join().unwrap();

    let mut recoverer = ClockRecoverer::default();
    let mut last = None;
    consumer.drain(|ev| last = Some(recoverer.handle(ev)));
    match last {
        Some(ClockReport::Clock(tick)) => {
            assert_relative_eq!(tick.filtered_bpm.unwrap(), 120.0, epsilon = 1e-6)
        }
        other => panic!("unexpected report {:?}", other),
    }
}
