//! Trace and span identifiers in W3C Trace Context form

use crate::error::{Result, TelemetryError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// 128-bit trace id shared by every span of one logical trace. Never zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId(u128);

/// 64-bit span id, unique per span. Never zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId(u64);

impl TraceId {
    pub fn generate() -> Self {
        loop {
            let id = rand::random::<u128>();
            if id != 0 {
                return Self(id);
            }
        }
    }

    /// Parse 32 lowercase or uppercase hex digits; the all-zero id is invalid
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 32 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u128::from_str_radix(hex, 16)
            .ok()
            .filter(|id| *id != 0)
            .map(Self)
    }

    pub fn to_hex(&self) -> String {
        format!("{:032x}", self.0)
    }
}

impl SpanId {
    pub fn generate() -> Self {
        loop {
            let id = rand::random::<u64>();
            if id != 0 {
                return Self(id);
            }
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 16 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16)
            .ok()
            .filter(|id| *id != 0)
            .map(Self)
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }
}

macro_rules! hex_id_impls {
    ($ty:ident, $width:literal, $what:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:0width$x}", self.0, width = $width)
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($ty), self)
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let hex = String::deserialize(deserializer)?;
                Self::from_hex(&hex)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid {}: {hex}", $what)))
            }
        }
    };
}

hex_id_impls!(TraceId, 32, "trace id");
hex_id_impls!(SpanId, 16, "span id");

/// Identity of one span, enough to correlate logs or propagate a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanContext {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub sampled: bool,
}

impl SpanContext {
    pub fn new(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            trace_id,
            span_id,
            sampled: true,
        }
    }

    /// Render as a `traceparent` header value (`00-{trace}-{span}-{flags}`)
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { "01" } else { "00" };
        format!("00-{}-{}-{flags}", self.trace_id, self.span_id)
    }

    /// Parse a `traceparent` header value.
    ///
    /// Accepts any version except the invalid `ff`; versions above `00` may
    /// carry extra trailing fields, which are ignored.
    pub fn from_traceparent(value: &str) -> Result<Self> {
        let invalid = || TelemetryError::InvalidTraceparent {
            value: value.to_string(),
        };
        let mut parts = value.trim().split('-');
        let (Some(version), Some(trace), Some(span), Some(flags)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let version = u8::from_str_radix(version, 16)
            .ok()
            .filter(|_| is_hex_pair(version))
            .ok_or_else(invalid)?;
        if version == 0xff || (version == 0 && parts.next().is_some()) {
            return Err(invalid());
        }
        let flags = u8::from_str_radix(flags, 16)
            .ok()
            .filter(|_| is_hex_pair(flags))
            .ok_or_else(invalid)?;

        Ok(Self {
            trace_id: TraceId::from_hex(trace).ok_or_else(invalid)?,
            span_id: SpanId::from_hex(span).ok_or_else(invalid)?,
            sampled: flags & 0x01 == 0x01,
        })
    }
}

fn is_hex_pair(field: &str) -> bool {
    field.len() == 2 && field.bytes().all(|b| b.is_ascii_hexdigit())
}
