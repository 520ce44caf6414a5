//! End-to-end conversion: synthetic SMF bytes → extracted events → charts →
//! rendered TJA text.

use midi_tja::{
    convert, extract_events, render_tja, ConvertOptions, NoteCode, RenderOptions, TempoMap,
    TimingDefaults,
};
use midly::Smf;

/// Build a format-1 SMF: timing track plus one note track.
///
/// `notes` are (onset_tick, duration_ticks, pitch) on channel 0.
fn build_midi(ppq: u16, notes: &[(u64, u64, u8)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.extend_from_slice(&2u16.to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    // Timing track: 120 BPM, 4/4
    let mut track0 = Vec::new();
    track0.extend_from_slice(&[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20]);
    track0.extend_from_slice(&[0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08]);
    track0.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    push_track(&mut buf, &track0);

    // Note track, absolute → delta encoding
    let mut events: Vec<(u64, [u8; 3])> = Vec::new();
    for &(onset, duration, pitch) in notes {
        events.push((onset, [0x90, pitch, 100]));
        events.push((onset + duration, [0x80, pitch, 0]));
    }
    events.sort_by_key(|(tick, msg)| (*tick, msg[0]));

    let mut track1 = Vec::new();
    let mut last = 0u64;
    for (tick, msg) in events {
        write_vlq(&mut track1, (tick - last) as u32);
        track1.extend_from_slice(&msg);
        last = tick;
    }
    track1.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
    push_track(&mut buf, &track1);

    buf
}

fn push_track(buf: &mut Vec<u8>, track: &[u8]) {
    buf.extend_from_slice(b"MTrk");
    buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
    buf.extend_from_slice(track);
}

fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    bytes.reverse();
    buf.extend_from_slice(&bytes);
}

#[test]
fn hit_chart_from_quarter_notes() {
    // Four quarter-note hits fill one 4/4 measure
    let bytes = build_midi(480, &[(0, 1, 60), (480, 1, 62), (960, 1, 64), (1440, 1, 65)]);
    let smf = Smf::parse(&bytes).unwrap();
    let (notes, context) = extract_events(&smf).unwrap();

    let options = ConvertOptions {
        code: NoteCode::new('1').unwrap(),
        ..Default::default()
    };
    let result = convert(&notes, &context, &options).unwrap();
    assert!(result.feedback.is_empty());

    let text = render_tja(
        &result.value,
        &RenderOptions {
            title: "four-on-the-floor".into(),
            comment: None,
        },
    );
    assert!(text.contains("BPM:120\n"));
    assert!(text.contains("#START\n"));
    assert!(text.contains("1111,\n"), "got:\n{text}");
}

#[test]
fn balloon_chart_reports_hit_counts() {
    // One two-beat A4 balloon: 1 second at 120 BPM
    let bytes = build_midi(480, &[(0, 960, 69)]);
    let smf = Smf::parse(&bytes).unwrap();
    let (notes, context) = extract_events(&smf).unwrap();

    let result = convert(&notes, &context, &ConvertOptions::default()).unwrap();
    let chart = &result.value.charts[0];
    assert_eq!(chart.balloons.len(), 1);
    assert!(chart.balloons[0] > 400, "A4 should demand ~440 pops/second");

    let text = render_tja(&result.value, &RenderOptions::default());
    assert!(text.contains(&format!("BALLOON:{}\n", chart.balloons[0])));
    // head at cell 0, tail halfway through the measure
    assert!(text.contains("7080,\n") || text.contains("78,\n"), "got:\n{text}");
}

#[test]
fn chords_fan_out_into_parallel_charts() {
    // C-E-G chord on every beat: three simultaneous notes → three courses
    let mut notes_spec = Vec::new();
    for beat in 0..4u64 {
        for pitch in [60, 64, 67] {
            notes_spec.push((beat * 480, 240, pitch));
        }
    }
    let bytes = build_midi(480, &notes_spec);
    let smf = Smf::parse(&bytes).unwrap();
    let (notes, context) = extract_events(&smf).unwrap();

    let options = ConvertOptions {
        code: NoteCode::new('1').unwrap(),
        ..Default::default()
    };
    let result = convert(&notes, &context, &options).unwrap();
    assert_eq!(result.value.charts.len(), 3);
    for chart in &result.value.charts {
        assert_eq!(chart.measures[0].cells.len(), 4);
    }
}

#[test]
fn tick_times_survive_extraction() {
    let bytes = build_midi(480, &[(0, 480, 60)]);
    let smf = Smf::parse(&bytes).unwrap();
    let (_, context) = extract_events(&smf).unwrap();
    let map = TempoMap::new(&context, TimingDefaults::default()).unwrap();
    assert_eq!(map.tick_to_microseconds(480), 500_000);
    assert_eq!(map.tick_to_microseconds(1920), 2_000_000);
}
