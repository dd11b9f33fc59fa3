//! Trace and span identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TraceError;

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fills `buf` with random bytes.
///
/// Uses the operating system's cryptographically secure source. If that is
/// unavailable, falls back to a PRNG seeded from the clock and a process-wide
/// counter; bytes from the fallback path are unique but guessable.
pub fn fill_random(buf: &mut [u8]) {
    if let Err(err) = OsRng.try_fill_bytes(buf) {
        warn!(error = %err, "OS random source unavailable, using seeded fallback");
        fallback_rng().fill_bytes(buf);
    }
}

fn fallback_rng() -> StdRng {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    #[allow(clippy::cast_possible_truncation)]
    let seed = (nanos as u64) ^ count.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    StdRng::seed_from_u64(seed)
}

fn random_non_zero<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    loop {
        fill_random(&mut bytes);
        if bytes.iter().any(|b| *b != 0) {
            return bytes;
        }
    }
}

fn decode_hex<const N: usize>(kind: &'static str, value: &str) -> Result<[u8; N], TraceError> {
    let invalid = |reason: String| TraceError::InvalidId {
        kind,
        value: value.to_string(),
        reason,
    };

    if value.len() != N * 2 {
        return Err(invalid(format!(
            "expected {} hex characters, got {}",
            N * 2,
            value.len()
        )));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    {
        return Err(invalid("expected lowercase hex characters".to_string()));
    }

    let mut bytes = [0u8; N];
    hex::decode_to_slice(value, &mut bytes).map_err(|e| invalid(e.to_string()))?;

    if bytes.iter().all(|b| *b == 0) {
        return Err(invalid("all-zero identifiers are invalid".to_string()));
    }
    Ok(bytes)
}

macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident, $len:expr, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; $len]);

        impl $name {
            /// Generates a fresh random, non-zero identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(random_non_zero::<$len>())
            }

            /// Builds an identifier from raw bytes, rejecting all-zero values.
            #[must_use]
            pub fn from_bytes(bytes: [u8; $len]) -> Option<Self> {
                bytes.iter().any(|b| *b != 0).then_some(Self(bytes))
            }

            /// Returns the raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl FromStr for $name {
            type Err = TraceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_hex::<$len>($kind, s).map(Self)
            }
        }

        impl TryFrom<String> for $name {
            type Error = TraceError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }
    };
}

hex_id!(
    /// A 128-bit trace identifier, shared by every span of one logical request.
    ///
    /// Rendered as 32 lowercase hex characters.
    TraceId,
    16,
    "trace"
);

hex_id!(
    /// A 64-bit span identifier, unique per sub-operation.
    ///
    /// Rendered as 16 lowercase hex characters.
    SpanId,
    8,
    "span"
);

/// Generates a new trace ID.
#[must_use]
pub fn generate_trace_id() -> TraceId {
    TraceId::generate()
}

/// Generates a new span ID.
#[must_use]
pub fn generate_span_id() -> SpanId {
    SpanId::generate()
}
