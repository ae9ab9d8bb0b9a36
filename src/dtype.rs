use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Storage data types the quantization kernels can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    S8,
    U8,
    S32,
    F32,
    BF16,
    F16,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown data type `{0}` (expected one of s8, u8, s32, f32, bf16, f16)")]
pub struct ParseDtypeError(pub String);

impl Dtype {
    pub const ALL: [Dtype; 6] =
        [Dtype::S8, Dtype::U8, Dtype::S32, Dtype::F32, Dtype::BF16, Dtype::F16];

    /// Size in bytes for this data type
    pub const fn size_bytes(self) -> usize {
        match self {
            Dtype::S8 | Dtype::U8 => 1,
            Dtype::BF16 | Dtype::F16 => 2,
            Dtype::S32 | Dtype::F32 => 4,
        }
    }

    pub const fn is_integral(self) -> bool {
        matches!(self, Dtype::S8 | Dtype::U8 | Dtype::S32)
    }

    /// Smallest finite value, widened to `f64` (exact for every type here).
    pub fn lowest(self) -> f64 {
        match self {
            Dtype::S8 => i8::MIN as f64,
            Dtype::U8 => 0.0,
            Dtype::S32 => i32::MIN as f64,
            Dtype::F32 => f32::MIN as f64,
            Dtype::BF16 => half::bf16::MIN.to_f64(),
            Dtype::F16 => half::f16::MIN.to_f64(),
        }
    }

    /// Largest finite value, widened to `f64` (exact for every type here).
    pub fn max(self) -> f64 {
        match self {
            Dtype::S8 => i8::MAX as f64,
            Dtype::U8 => u8::MAX as f64,
            Dtype::S32 => i32::MAX as f64,
            Dtype::F32 => f32::MAX as f64,
            Dtype::BF16 => half::bf16::MAX.to_f64(),
            Dtype::F16 => half::f16::MAX.to_f64(),
        }
    }

    /// Whether every value of `self` is representable in `of`, so converting
    /// needs neither rounding nor saturation.
    ///
    /// Each type is a subset of itself, the 8-bit integers are subsets of
    /// `s32`, and every integral type is treated as a subset of `f32`.
    pub const fn is_subset(self, of: Dtype) -> bool {
        use Dtype::*;
        matches!(
            (self, of),
            (S8, S8) | (U8, U8) | (S32, S32) | (F32, F32) | (BF16, BF16) | (F16, F16)
                | (S8, S32) | (U8, S32)
                | (S8, F32) | (U8, F32) | (S32, F32)
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            Dtype::S8 => "s8",
            Dtype::U8 => "u8",
            Dtype::S32 => "s32",
            Dtype::F32 => "f32",
            Dtype::BF16 => "bf16",
            Dtype::F16 => "f16",
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dtype {
    type Err = ParseDtypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s8" | "i8" | "int8" => Ok(Dtype::S8),
            "u8" | "uint8" => Ok(Dtype::U8),
            "s32" | "i32" | "int32" => Ok(Dtype::S32),
            "f32" | "float" => Ok(Dtype::F32),
            "bf16" => Ok(Dtype::BF16),
            "f16" | "half" => Ok(Dtype::F16),
            _ => Err(ParseDtypeError(s.to_string())),
        }
    }
}
