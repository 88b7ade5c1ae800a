use mclksync::midi::clock::{ClockGenerator, GeneratorConfig};
use mclksync::midi::{ClockMessage, EventBuffer, MidiSink};
use mclksync::transport::{Bbt, BarBeatTick, TransportSnapshot, TransportState};

const RATE: u32 = 48000;

fn snapshot(state: TransportState, frame: u64, bbt: Option<Bbt>) -> TransportSnapshot {
    TransportSnapshot {
        state,
        frame,
        frame_rate: RATE,
        bbt,
        bbt_offset: None,
    }
}

fn bbt(bar: i32, beat: i32, bpm: f64) -> Bbt {
    Bbt {
        bar,
        beat,
        tick: 0,
        beats_per_bar: 4.0,
        beat_type: 4.0,
        ticks_per_beat: 1920.0,
        beats_per_minute: bpm,
    }
}

fn with_bpm(bpm: f64) -> ClockGenerator {
    ClockGenerator::new(GeneratorConfig {
        user_bpm: bpm,
        ..GeneratorConfig::default()
    })
}

#[test]
fn test_start_scenario_at_120_bpm() {
    let mut gen = with_bpm(120.0);
    let mut buf = EventBuffer::default();

    // cycle 1
    gen.process(&snapshot(TransportState::Rolling, 0, None), 256, &mut buf);
    assert_eq!(
        buf.messages().collect::<Vec<_>>(),
        vec![(0, ClockMessage::Start), (0, ClockMessage::Clock)]
    );

    // cycles 2 and 3 are silent
    for frame in [256, 512] {
        buf.clear();
        gen.process(&snapshot(TransportState::Rolling, frame, None), 256, &mut buf);
        assert!(buf.is_empty());
    }

    // cycle 4
    buf.clear();
    gen.process(&snapshot(TransportState::Rolling, 768, None), 256, &mut buf);
    assert_eq!(
        buf.messages().collect::<Vec<_>>(),
        vec![(232, ClockMessage::Clock)]
    );
}

#[test]
fn test_tick_count_is_deterministic() {
    for (bpm, period) in [(97.3, 256u32), (120.0, 64), (174.0, 1024), (60.0, 333)] {
        let mut gen = with_bpm(bpm);
        let mut buf = EventBuffer::default();
        let interval = f64::from(RATE) * 60.0 / bpm / 24.0;
        let cycles = 1000u64;
        let mut clocks = 0u64;

        for n in 0..cycles {
            buf.clear();
            gen.process(
                &snapshot(TransportState::Rolling, n * u64::from(period), None),
                period,
                &mut buf,
            );
            let offsets: Vec<u32> = buf
                .messages()
                .filter(|(_, msg)| *msg == ClockMessage::Clock)
                .map(|(offset, _)| offset)
                .collect();
            assert!(offsets.windows(2).all(|w| w[0] < w[1]));
            assert!(offsets.iter().all(|&o| o < period));
            clocks += offsets.len() as u64;
        }

        let expected = (cycles as f64 * f64::from(period) / interval).floor() as i64;
        assert!(
            (clocks as i64 - expected).abs() <= 1,
            "bpm {}: {} clocks, expected {}",
            bpm,
            clocks,
            expected
        );
    }
}

#[test]
fn test_same_snapshot_twice_sends_no_transition() {
    let mut gen = ClockGenerator::default();
    let mut buf = EventBuffer::default();

    gen.process(
        &snapshot(TransportState::Stopped, 0, Some(bbt(1, 1, 120.0))),
        256,
        &mut buf,
    );
    assert!(buf.is_empty());

    let stopped = snapshot(TransportState::Stopped, 96000, Some(bbt(3, 1, 120.0)));
    gen.process(&stopped, 256, &mut buf);
    assert_eq!(
        buf.messages().collect::<Vec<_>>(),
        vec![(0, ClockMessage::SongPosition(48))]
    );
    buf.clear();
    let report = gen.process(&stopped, 256, &mut buf);
    assert!(buf.is_empty());
    assert_eq!(report.transition, None);

    let rolling = snapshot(TransportState::Rolling, 0, None);
    gen.process(&rolling, 256, &mut buf);
    buf.clear();
    gen.process(&rolling, 256, &mut buf);
    assert!(buf.messages().all(|(_, msg)| !msg.is_transport()));
}

#[test]
fn test_song_position_round_trip() {
    let pos = bbt(5, 2, 120.0).song_position(0);
    assert_eq!(pos, 68);

    let mut buf = EventBuffer::default();
    assert!(buf.write(0, ClockMessage::SongPosition(pos as u16).bytes().as_slice()));
    let received = buf.events()[0].message();
    let Some(ClockMessage::SongPosition(beats)) = received else {
        panic!("expected a song position, got {:?}", received);
    };
    let display = BarBeatTick::from_song_position(u64::from(beats), 0, 4);
    assert_eq!((display.bar, display.beat), (5, 2));
}

#[test]
fn test_stop_and_restart_from_zero() {
    let mut gen = with_bpm(120.0);
    let mut buf = EventBuffer::default();
    gen.process(&snapshot(TransportState::Rolling, 0, None), 256, &mut buf);

    buf.clear();
    gen.process(&snapshot(TransportState::Stopped, 256, None), 256, &mut buf);
    assert_eq!(
        buf.messages().collect::<Vec<_>>(),
        vec![(0, ClockMessage::Stop)]
    );

    buf.clear();
    gen.process(&snapshot(TransportState::Rolling, 0, None), 256, &mut buf);
    assert_eq!(
        buf.messages().collect::<Vec<_>>(),
        vec![(0, ClockMessage::Start), (0, ClockMessage::Clock)]
    );
}
