//! Caller-side control of the rounding-control register.
//!
//! The kernels only read the rounding mode. Code that needs a different mode
//! around a batch of kernel calls (or a test that checks the kernels follow
//! the mode) switches it here for the current thread and restores it when the
//! guard drops. MXCSR is per thread, so the guard is `!Send`.
//!
//! Switching the mode is `unsafe`: the compiler folds and reorders floating
//! point on the assumption that round-to-nearest is in effect, so only code
//! that tolerates another mode may run while a guard is alive.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round to nearest, ties to even (the power-on default).
    Nearest,
    /// Toward negative infinity.
    Down,
    /// Toward positive infinity.
    Up,
    TowardZero,
}

#[derive(Debug, Error)]
pub enum FpEnvError {
    #[error("rounding-mode control is not available on this target")]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown rounding mode `{0}` (expected nearest, down, up or toward_zero)")]
pub struct ParseRoundingModeError(pub String);

impl RoundingMode {
    pub const ALL: [RoundingMode; 4] = [
        RoundingMode::Nearest,
        RoundingMode::Down,
        RoundingMode::Up,
        RoundingMode::TowardZero,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            RoundingMode::Nearest => "nearest",
            RoundingMode::Down => "down",
            RoundingMode::Up => "up",
            RoundingMode::TowardZero => "toward_zero",
        }
    }

    /// Reference rounding of `f` in this mode, for comparing against the
    /// kernels' rounding primitive.
    pub fn apply(self, f: f32) -> f32 {
        match self {
            RoundingMode::Nearest => f.round_ties_even(),
            RoundingMode::Down => f.floor(),
            RoundingMode::Up => f.ceil(),
            RoundingMode::TowardZero => f.trunc(),
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RoundingMode {
    type Err = ParseRoundingModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" | "rne" => Ok(RoundingMode::Nearest),
            "down" | "floor" => Ok(RoundingMode::Down),
            "up" | "ceil" => Ok(RoundingMode::Up),
            "toward_zero" | "zero" | "trunc" => Ok(RoundingMode::TowardZero),
            _ => Err(ParseRoundingModeError(s.to_string())),
        }
    }
}

/// Restores the thread's previous rounding mode on drop.
#[must_use = "the previous rounding mode is restored when the guard is dropped"]
pub struct RoundingModeGuard {
    saved: u32,
    _thread_bound: PhantomData<*const ()>,
}

impl RoundingModeGuard {
    /// Switches the calling thread to `mode`.
    ///
    /// # Safety
    ///
    /// While the guard is alive the thread may only run the quantization
    /// kernels, exact operations (integer arithmetic, `floor`/`ceil`/`trunc`,
    /// comparisons), or other code written to tolerate a non-default rounding
    /// mode. Anything else may observe results the compiler computed under
    /// round-to-nearest. The guard must be dropped on the thread that created
    /// it, in reverse order of creation when guards nest.
    pub unsafe fn set(mode: RoundingMode) -> Result<Self, FpEnvError> {
        let saved = mxcsr::read()?;
        mxcsr::write((saved & !mxcsr::RC_MASK) | mxcsr::rc_bits(mode))?;
        debug!("rounding mode set to {} (mxcsr {:#06x})", mode, saved);
        Ok(Self { saved, _thread_bound: PhantomData })
    }
}

impl Drop for RoundingModeGuard {
    fn drop(&mut self) {
        if mxcsr::write(self.saved).is_ok() {
            debug!("rounding mode restored (mxcsr {:#06x})", self.saved);
        }
    }
}

impl fmt::Debug for RoundingModeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundingModeGuard")
            .field("saved", &format_args!("{:#06x}", self.saved))
            .finish()
    }
}

/// The calling thread's active rounding mode.
pub fn current_rounding_mode() -> Result<RoundingMode, FpEnvError> {
    Ok(mxcsr::mode_of(mxcsr::read()?))
}

/// The mode a run will execute under: `requested` if the target can switch
/// to it, otherwise the current mode. Targets without rounding-mode control
/// only ever run round-to-nearest, so `None` resolves to `Nearest` there,
/// while an explicit request is an error.
pub fn effective_rounding_mode(requested: Option<RoundingMode>) -> Result<RoundingMode, FpEnvError> {
    match requested {
        Some(mode) => {
            mxcsr::read()?;
            Ok(mode)
        }
        None => match current_rounding_mode() {
            Ok(mode) => Ok(mode),
            Err(FpEnvError::Unsupported) => {
                debug!("no rounding-mode control on this target, assuming nearest");
                Ok(RoundingMode::Nearest)
            }
        },
    }
}

#[cfg(target_arch = "x86_64")]
mod mxcsr {
    use super::{FpEnvError, RoundingMode};

    // Bits 13..=14 of MXCSR select the rounding mode.
    pub const RC_SHIFT: u32 = 13;
    pub const RC_MASK: u32 = 0b11 << RC_SHIFT;

    pub const fn rc_bits(mode: RoundingMode) -> u32 {
        let rc = match mode {
            RoundingMode::Nearest => 0b00,
            RoundingMode::Down => 0b01,
            RoundingMode::Up => 0b10,
            RoundingMode::TowardZero => 0b11,
        };
        rc << RC_SHIFT
    }

    pub const fn mode_of(csr: u32) -> RoundingMode {
        match (csr & RC_MASK) >> RC_SHIFT {
            0b00 => RoundingMode::Nearest,
            0b01 => RoundingMode::Down,
            0b10 => RoundingMode::Up,
            _ => RoundingMode::TowardZero,
        }
    }

    #[allow(deprecated, unused_unsafe)]
    pub fn read() -> Result<u32, FpEnvError> {
        Ok(unsafe { std::arch::x86_64::_mm_getcsr() })
    }

    #[allow(deprecated, unused_unsafe)]
    pub fn write(csr: u32) -> Result<(), FpEnvError> {
        unsafe { std::arch::x86_64::_mm_setcsr(csr) };
        Ok(())
    }
}

#[cfg(not(target_arch = "x86_64"))]
mod mxcsr {
    use super::{FpEnvError, RoundingMode};

    pub const RC_MASK: u32 = 0;

    pub const fn rc_bits(_mode: RoundingMode) -> u32 {
        0
    }

    pub const fn mode_of(_csr: u32) -> RoundingMode {
        RoundingMode::Nearest
    }

    pub fn read() -> Result<u32, FpEnvError> {
        Err(FpEnvError::Unsupported)
    }

    pub fn write(_csr: u32) -> Result<(), FpEnvError> {
        Err(FpEnvError::Unsupported)
    }
}
