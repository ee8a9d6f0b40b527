// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use docuvoice::audio::{pcm, wav, SampleBuffer};

const SAMPLE_RATE: u32 = 24000;

fn generate_test_pcm(duration_seconds: usize) -> Vec<u8> {
    let num_samples = duration_seconds * SAMPLE_RATE as usize;
    let mut bytes = Vec::with_capacity(num_samples * pcm::BYTES_PER_SAMPLE);

    for i in 0..num_samples {
        let t = i as f32 / SAMPLE_RATE as f32;
        // Speech-like mix of a fundamental and two formants
        let sample = 0.4 * (2.0 * std::f32::consts::PI * 180.0 * t).sin()
            + 0.2 * (2.0 * std::f32::consts::PI * 700.0 * t).sin()
            + 0.1 * (2.0 * std::f32::consts::PI * 2200.0 * t).sin();
        bytes.extend_from_slice(&wav::quantize(sample).to_le_bytes());
    }

    bytes
}

fn benchmark_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for seconds in [1, 10, 60] {
        let bytes = generate_test_pcm(seconds);
        group.bench_with_input(BenchmarkId::from_parameter(seconds), &bytes, |b, bytes| {
            b.iter(|| {
                let buffer = pcm::decode(black_box(bytes), SAMPLE_RATE, pcm::DEFAULT_CHANNELS);
                black_box(buffer)
            })
        });
    }

    group.finish();
}

fn benchmark_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for seconds in [1, 10, 60] {
        let buffer: SampleBuffer =
            pcm::decode(&generate_test_pcm(seconds), SAMPLE_RATE, pcm::DEFAULT_CHANNELS)
                .expect("test PCM should decode");
        group.bench_with_input(BenchmarkId::from_parameter(seconds), &buffer, |b, buffer| {
            b.iter(|| {
                let bytes = wav::encode_all(black_box(buffer));
                black_box(bytes)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_decode, benchmark_encode);
criterion_main!(benches);
