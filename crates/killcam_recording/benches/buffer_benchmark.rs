//! # Recording Buffer Benchmark
//!
//! Measures the per-tick cost of the capture store:
//! 1. Appending a 20 Hz tick of actor samples into a full buffer (evicting)
//! 2. Encoding and compressing a first-person stream
//!
//! Run with: `cargo bench --package killcam_recording`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use killcam_recording::buffer::{FrameRule, NullSink, RecordingBuffer};
use killcam_recording::packet::{FpChar, TpChar};
use killcam_recording::{ByteOrder, DiscardedState, FpFlags, FpStream, Packet, TpFlags};
use killcam_shared::{EntityId, Quat, QuatT, Vec3};

fn actor_sample(entity: u32, t: f32) -> Packet {
    Packet::TpChar(TpChar {
        entity: EntityId::new(entity),
        location: QuatT::new(Quat::from_rotation_z(t), Vec3::new(t, entity as f32, 0.0)),
        velocity: Vec3::new(1.0, 0.0, 0.0),
        flags: TpFlags::ON_GROUND,
        layer_effects: 0,
    })
}

/// One tick: a frame marker and one sample per actor
fn bench_append_with_eviction(c: &mut Criterion) {
    let mut group = c.benchmark_group("tp_append_tick");

    for actors in [8_u32, 16, 32] {
        let tick_bytes: usize = (0..actors).map(|i| actor_sample(i, 0.0).byte_size()).sum::<usize>()
            + Packet::frame(0.0).byte_size();
        group.throughput(Throughput::Bytes(tick_bytes as u64));

        group.bench_with_input(BenchmarkId::from_parameter(actors), &actors, |b, &actors| {
            let mut buffer = RecordingBuffer::new("tp", 64 * 1024, FrameRule::Markers);
            let mut discarded = DiscardedState::new();
            let mut t = 0.0_f32;
            b.iter(|| {
                t += 0.05;
                let _ = buffer.append(Packet::frame(t), &mut discarded);
                for entity in 0..actors {
                    let _ = buffer.append(actor_sample(entity, t), &mut discarded);
                }
                black_box(buffer.len_bytes())
            });
        });
    }

    group.finish();
}

/// Evicting into a null sink isolates the buffer bookkeeping
fn bench_first_person_append(c: &mut Criterion) {
    c.bench_function("fp_append_sample", |b| {
        let mut buffer = RecordingBuffer::new("fp", 16 * 1024, FrameRule::SelfTimed);
        let mut t = 0.0_f32;
        b.iter(|| {
            t += 0.016;
            let sample = FpChar {
                frame_time: t,
                camera: QuatT::new(Quat::from_rotation_z(t), Vec3::new(0.0, 0.0, 1.7)),
                relative: QuatT::from_translation(Vec3::new(0.0, 0.0, -1.7)),
                fov: 1.2,
                flags: FpFlags::ON_GROUND,
            };
            black_box(buffer.append(Packet::FpChar(sample), &mut NullSink))
        });
    });
}

fn bench_stream_encode(c: &mut Criterion) {
    // a 4 second killcam at 60 samples per second
    let stream = FpStream {
        samples: (0..240)
            .map(|i| {
                let t = i as f32 / 60.0;
                FpChar {
                    frame_time: t,
                    camera: QuatT::new(Quat::from_rotation_z(t * 0.5), Vec3::new(t, 2.0, 1.7)),
                    relative: QuatT::from_translation(Vec3::new(0.0, 0.0, -1.7)),
                    fov: 1.2,
                    flags: FpFlags::ON_GROUND,
                }
            })
            .collect(),
        ..FpStream::default()
    };
    let raw_bytes: usize = stream.to_packets().iter().map(Packet::byte_size).sum();

    let mut group = c.benchmark_group("fp_stream");
    group.throughput(Throughput::Bytes(raw_bytes as u64));
    group.bench_function("encode_compress", |b| {
        b.iter(|| black_box(stream.encode(ByteOrder::Little)));
    });
    if let Ok(encoded) = stream.encode(ByteOrder::Little) {
        group.bench_function("decompress_decode", |b| {
            b.iter(|| black_box(FpStream::decode(&encoded, ByteOrder::Little)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append_with_eviction, bench_first_person_append, bench_stream_encode);
criterion_main!(benches);
