use std::str::FromStr;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use q10n::fpenv::{RoundingMode, RoundingModeGuard};
use q10n::qz::Requantize;
use q10n::{
    round, AccumulateOnly, Affine, CoeffShape, Coeffs, Dtype, Element, IdentityScale, SaturateInto,
    ScaleOnly,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "q10n",
    version,
    about = "Quantize values into a storage type with out = alpha * in + beta * prev"
)]
struct Args {
    /// Source data type (s8, u8, s32, f32, bf16, f16)
    #[arg(long, default_value = "f32")]
    src: Dtype,

    /// Destination data type (s8, u8, s32, f32, bf16, f16)
    #[arg(long)]
    dst: Dtype,

    /// Scale applied to every input
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    alpha: f32,

    /// Weight of the previous output
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    beta: f32,

    /// Previous outputs, comma separated, one per input (read only when beta != 0)
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    prev: Vec<String>,

    /// Operator to use; `auto` picks the cheapest one the coefficients admit
    #[arg(long, value_enum, default_value_t = Variant::Auto)]
    variant: Variant,

    /// Rounding mode to run under (default: leave the current mode alone)
    #[arg(long)]
    mode: Option<RoundingMode>,

    /// Print a JSON report instead of one value per line
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Input values
    #[arg(value_name = "VALUES", required = true, allow_negative_numbers = true)]
    values: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Variant {
    Auto,
    Identity,
    Scale,
    Accumulate,
    Affine,
}

impl Variant {
    fn resolve(self, coeffs: Coeffs) -> Result<CoeffShape> {
        let shape = match self {
            Variant::Auto => return Ok(coeffs.shape()),
            Variant::Identity => CoeffShape::IdentityScale,
            Variant::Scale => CoeffShape::ScaleOnly,
            Variant::Accumulate => CoeffShape::AccumulateOnly,
            Variant::Affine => CoeffShape::Affine,
        };
        if !shape.admits(coeffs) {
            bail!("{} cannot apply alpha={} beta={}", shape, coeffs.alpha, coeffs.beta);
        }
        Ok(shape)
    }
}

#[derive(Debug, Serialize)]
struct Report {
    src: Dtype,
    dst: Dtype,
    variant: CoeffShape,
    coeffs: Coeffs,
    rounding: round::RoundingBackend,
    mode: Option<RoundingMode>,
    /// Bytes read from the inputs and written to the outputs
    src_bytes: usize,
    dst_bytes: usize,
    outputs: Vec<f64>,
}

struct Job<'a> {
    shape: CoeffShape,
    coeffs: Coeffs,
    mode: Option<RoundingMode>,
    values: &'a [String],
    prev: &'a [String],
}

fn parse_all<T>(raw: &[String], what: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.iter()
        .enumerate()
        .map(|(i, s)| s.trim().parse::<T>().with_context(|| format!("parse {} #{} `{}`", what, i, s)))
        .collect()
}

fn apply_all<In, Out, Q>(q: Q, inputs: &[In], prev: &[Out], coeffs: Coeffs) -> Vec<Out>
where
    In: Element,
    Out: Element,
    Q: Requantize<In, Out>,
{
    inputs
        .iter()
        .enumerate()
        .map(|(i, &x)| q.apply(x, || prev[i], coeffs))
        .collect()
}

fn run<In, Out>(job: &Job) -> Result<Vec<f64>>
where
    In: Element + FromStr + SaturateInto<Out>,
    In::Err: std::error::Error + Send + Sync + 'static,
    Out: Element + FromStr,
    Out::Err: std::error::Error + Send + Sync + 'static,
{
    let inputs: Vec<In> = parse_all(job.values, "input")?;
    let needs_prev = job.shape.reads_prev() && job.coeffs.beta != 0.0;
    let prev: Vec<Out> = if needs_prev {
        if job.prev.len() != inputs.len() {
            bail!("beta={} needs {} previous outputs, got {}", job.coeffs.beta, inputs.len(), job.prev.len());
        }
        parse_all(job.prev, "previous output")?
    } else {
        if !job.prev.is_empty() {
            debug!("ignoring {} previous outputs (beta is 0 or the operator reads none)", job.prev.len());
        }
        Vec::new()
    };

    // Parsing happens before the mode switch; only the kernels run under it.
    let guard = match job.mode {
        // SAFETY: the guard is dropped below, on this thread, before any
        // non-kernel floating point runs.
        Some(m) => Some(
            unsafe { RoundingModeGuard::set(m) }
                .with_context(|| format!("set rounding mode {}", m))?,
        ),
        None => None,
    };
    let outputs = match job.shape {
        CoeffShape::IdentityScale => apply_all(IdentityScale::<In, Out>::new(), &inputs, &prev, job.coeffs),
        CoeffShape::ScaleOnly => apply_all(ScaleOnly::<In, Out>::new(), &inputs, &prev, job.coeffs),
        CoeffShape::AccumulateOnly => apply_all(AccumulateOnly::<In, Out>::new(), &inputs, &prev, job.coeffs),
        CoeffShape::Affine => apply_all(Affine::<In, Out>::new(), &inputs, &prev, job.coeffs),
    };
    drop(guard);
    Ok(outputs.into_iter().map(|v| v.to_f64()).collect())
}

macro_rules! dispatch {
    (@dst $in:ty, $job:expr, $dst:expr) => {
        match $dst {
            Dtype::S8 => run::<$in, i8>($job),
            Dtype::U8 => run::<$in, u8>($job),
            Dtype::S32 => run::<$in, i32>($job),
            Dtype::F32 => run::<$in, f32>($job),
            Dtype::BF16 => run::<$in, half::bf16>($job),
            Dtype::F16 => run::<$in, half::f16>($job),
        }
    };
    ($job:expr, $src:expr, $dst:expr) => {
        match $src {
            Dtype::S8 => dispatch!(@dst i8, $job, $dst),
            Dtype::U8 => dispatch!(@dst u8, $job, $dst),
            Dtype::S32 => dispatch!(@dst i32, $job, $dst),
            Dtype::F32 => dispatch!(@dst f32, $job, $dst),
            Dtype::BF16 => dispatch!(@dst half::bf16, $job, $dst),
            Dtype::F16 => dispatch!(@dst half::f16, $job, $dst),
        }
    };
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let coeffs = Coeffs::new(args.alpha, args.beta);
    let shape = args.variant.resolve(coeffs)?;
    info!(
        "{} -> {} with {} (alpha={}, beta={}), rounding backend {:?}",
        args.src, args.dst, shape, coeffs.alpha, coeffs.beta, round::BACKEND
    );

    let job = Job { shape, coeffs, mode: args.mode, values: &args.values, prev: &args.prev };
    let outputs = dispatch!(&job, args.src, args.dst)?;

    if args.json {
        let report = Report {
            src: args.src,
            dst: args.dst,
            variant: shape,
            coeffs,
            rounding: round::BACKEND,
            mode: args.mode,
            src_bytes: args.src.size_bytes() * args.values.len(),
            dst_bytes: args.dst.size_bytes() * outputs.len(),
            outputs,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for v in outputs {
            println!("{}", v);
        }
    }
    Ok(())
}
