use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use escapement_core::{CalibrationCfg, CalibrationRecord, build_escapement, decode_record, encode_record};
use escapement_hardware::{
    MemoryStore, OscillatorParams, SharedTemperature, SimulatedOscillator, SimulatedThermometer,
};
use escapement_traits::VirtualClock;

fn calibrated_controller() -> escapement_core::EscapementCore<
    SimulatedOscillator<VirtualClock>,
    SimulatedThermometer,
    MemoryStore,
> {
    let temp = SharedTemperature::new(20.25);
    let osc = SimulatedOscillator::new(
        OscillatorParams {
            jitter_us: 40.0,
            temp_coeff_us_per_c: 8.0,
            ..OscillatorParams::default()
        },
        VirtualClock::new(),
        temp.clone(),
    );
    let mut esc = build_escapement(
        osc,
        Some(SimulatedThermometer::new(temp)),
        Some(MemoryStore::new()),
        Some(CalibrationCfg {
            warmup_beats: 4,
            target_samples: 32,
            ..CalibrationCfg::default()
        }),
        None,
        None,
    )
    .expect("valid config");
    esc.enable(None);
    for _ in 0..64 {
        esc.beat().expect("simulated beat");
    }
    esc
}

pub fn bench_beat(c: &mut Criterion) {
    c.bench_function("beat_run_mode_x1000", |b| {
        b.iter_batched(
            calibrated_controller,
            |mut esc| {
                let mut acc = 0i64;
                for _ in 0..1000 {
                    acc = acc.wrapping_add(esc.beat().expect("simulated beat"));
                }
                black_box(acc)
            },
            BatchSize::SmallInput,
        )
    });
}

pub fn bench_codec(c: &mut Criterion) {
    let mut record = CalibrationRecord::new(50, true);
    for (i, b) in record.buckets.iter_mut().enumerate().step_by(3) {
        b.fold(500_000 + i as i64, 1);
    }
    let bytes = encode_record(&record).expect("encode");
    c.bench_function("record_encode", |b| {
        b.iter(|| black_box(encode_record(black_box(&record)).expect("encode")))
    });
    c.bench_function("record_decode", |b| {
        b.iter(|| black_box(decode_record(black_box(&bytes), Some(50)).expect("decode")))
    });
}

criterion_group!(benches, bench_beat, bench_codec);
criterion_main!(benches);
