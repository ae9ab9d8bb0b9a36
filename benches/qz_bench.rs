use criterion::{criterion_group, criterion_main, Criterion, black_box};
use half::bf16;
use q10n::{AccumulateOnly, Affine, IdentityScale, ScaleOnly};

// Deterministic accumulator row, roughly what a GEMM epilogue sees.
fn make_acc_row(n: usize) -> Vec<i32> {
    let mut seed = 0x1234_5678_9abc_def0u64;
    (0..n)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((seed >> 33) as i32 % 4096) - 2048
        })
        .collect()
}

fn bench_qz_s32_to_s8(c: &mut Criterion) {
    let acc = make_acc_row(4096);
    let mut dst = vec![0i8; acc.len()];

    c.bench_function("qz_identity_s32_s8_4096", |ben| {
        let qz = IdentityScale::<i32, i8>::new();
        ben.iter(|| {
            for (d, &a) in dst.iter_mut().zip(black_box(&acc)) {
                *d = qz.call(a);
            }
            black_box(&dst);
        })
    });
    c.bench_function("qz_scale_s32_s8_4096", |ben| {
        let qz = ScaleOnly::<i32, i8>::new();
        ben.iter(|| {
            for (d, &a) in dst.iter_mut().zip(black_box(&acc)) {
                *d = qz.call(a, black_box(0.0625));
            }
            black_box(&dst);
        })
    });
    c.bench_function("qz_accumulate_s32_s8_4096", |ben| {
        let qz = AccumulateOnly::<i32, i8>::new();
        ben.iter(|| {
            for (d, &a) in dst.iter_mut().zip(black_box(&acc)) {
                qz.store(a, d, black_box(0.5));
            }
            black_box(&dst);
        })
    });
    c.bench_function("qz_affine_s32_s8_4096", |ben| {
        let qz = Affine::<i32, i8>::new();
        ben.iter(|| {
            for (d, &a) in dst.iter_mut().zip(black_box(&acc)) {
                qz.store(a, d, black_box(0.0625), black_box(0.5));
            }
            black_box(&dst);
        })
    });
}

fn bench_qz_f32_to_bf16(c: &mut Criterion) {
    let src: Vec<f32> = make_acc_row(4096).into_iter().map(|v| v as f32 * 0.01).collect();
    let mut dst = vec![bf16::ZERO; src.len()];
    c.bench_function("qz_affine_f32_bf16_4096", |ben| {
        let qz = Affine::<f32, bf16>::new();
        ben.iter(|| {
            for (d, &a) in dst.iter_mut().zip(black_box(&src)) {
                qz.store(a, d, black_box(1.5), black_box(0.25));
            }
            black_box(&dst);
        })
    });
}

criterion_group!(benches, bench_qz_s32_to_s8, bench_qz_f32_to_bf16);
criterion_main!(benches);
