use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use q10n::fpenv::{effective_rounding_mode, RoundingMode, RoundingModeGuard};
use q10n::round::{self, portable};
use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;

const CHUNK: u64 = 1 << 20;
const PATTERNS: u64 = 1 << 32;

#[derive(Parser, Debug)]
#[command(
    name = "verify_round",
    about = "Sweep f32 bit patterns through the rounding primitive and compare it with the portable fallback"
)]
struct Args {
    /// Check every Nth bit pattern (1 = all 2^32 patterns)
    #[arg(long, default_value_t = 1)]
    stride: u64,

    /// Worker threads
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Rounding mode to sweep under (default: the current mode)
    #[arg(long)]
    mode: Option<RoundingMode>,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
struct Tally {
    checked: u64,
    /// NaN, infinities and values whose rounded result does not fit in i32
    out_of_range: u64,
    /// In-range inputs where the compiled path disagrees with exact rounding
    compiled_mismatches: u64,
    /// In-range inputs where the portable fallback disagrees with exact rounding
    portable_mismatches: u64,
    /// Out-of-range inputs where the compiled path and the fallback disagree
    out_of_range_disagreements: u64,
    first_compiled_mismatch: Option<u32>,
}

impl Tally {
    fn merge(self, o: Tally) -> Tally {
        Tally {
            checked: self.checked + o.checked,
            out_of_range: self.out_of_range + o.out_of_range,
            compiled_mismatches: self.compiled_mismatches + o.compiled_mismatches,
            portable_mismatches: self.portable_mismatches + o.portable_mismatches,
            out_of_range_disagreements: self.out_of_range_disagreements
                + o.out_of_range_disagreements,
            first_compiled_mismatch: match (
                self.first_compiled_mismatch,
                o.first_compiled_mismatch,
            ) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    backend: round::RoundingBackend,
    mode: RoundingMode,
    stride: u64,
    elapsed_s: f64,
    #[serde(flatten)]
    tally: Tally,
}

fn sweep_chunk(chunk: u64, stride: u64, mode: RoundingMode) -> Result<Tally> {
    // SAFETY: the loop runs the rounding primitives, exact reference rounding
    // and integer bookkeeping; the guard drops on this worker thread.
    let _guard = unsafe { RoundingModeGuard::set(mode) }
        .with_context(|| format!("set rounding mode {} on worker", mode))?;
    let lo = chunk * CHUNK;
    let hi = (lo + CHUNK).min(PATTERNS);
    let mut t = Tally::default();
    let mut bits = lo.div_ceil(stride) * stride;
    while bits < hi {
        let f = f32::from_bits(bits as u32);
        let compiled = round::round_nearest(f);
        let fallback = portable::round_nearest(f);
        let exact = mode.apply(f);
        t.checked += 1;
        if exact.is_finite() && exact >= i32::MIN as f32 && exact < 2_147_483_648.0 {
            let exact = exact as i32;
            if compiled != exact {
                t.compiled_mismatches += 1;
                t.first_compiled_mismatch.get_or_insert(bits as u32);
            }
            if fallback != exact {
                t.portable_mismatches += 1;
            }
        } else {
            t.out_of_range += 1;
            if compiled != fallback {
                t.out_of_range_disagreements += 1;
            }
        }
        bits += stride;
    }
    Ok(t)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let stride = args.stride.max(1);
    let mode = effective_rounding_mode(args.mode).context("resolve rounding mode")?;
    info!(
        "sweeping with backend {:?} under {} (stride {}, {} threads)",
        round::BACKEND, mode, stride, args.threads
    );

    let chunks = PATTERNS / CHUNK;
    let pb = ProgressBar::new(chunks);
    pb.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} chunks [{elapsed_precise}] eta {eta}")?);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads.max(1))
        .build()
        .context("build thread pool")?;
    let t0 = Instant::now();
    let tally = pool.install(|| {
        (0..chunks)
            .into_par_iter()
            .map(|c| {
                let t = sweep_chunk(c, stride, mode);
                pb.inc(1);
                t
            })
            .try_reduce(Tally::default, |a, b| Ok(a.merge(b)))
    })?;
    pb.finish_and_clear();

    let summary = Summary {
        backend: round::BACKEND,
        mode,
        stride,
        elapsed_s: t0.elapsed().as_secs_f64(),
        tally,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "backend: {:?} mode: {} stride: {} elapsed: {:.3}s",
            summary.backend, summary.mode, summary.stride, summary.elapsed_s
        );
        println!("checked: {} out-of-range: {}", tally.checked, tally.out_of_range);
        println!(
            "compiled mismatches: {} portable mismatches: {}",
            tally.compiled_mismatches, tally.portable_mismatches
        );
        println!("out-of-range disagreements (compiled vs portable): {}", tally.out_of_range_disagreements);
        if let Some(bits) = tally.first_compiled_mismatch {
            println!("first compiled mismatch: {:#010x} ({})", bits, f32::from_bits(bits));
        }
    }
    Ok(())
}
