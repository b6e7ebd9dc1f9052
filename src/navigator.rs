//! "Jump to offset": parse user text, validate against the loaded buffer and
//! resolve the scroll position that brings the offset into view.

use crate::buffer::ByteBuffer;
use crate::error::NavigationError;
use crate::row_math::scroll_target_of;
use std::num::IntErrorKind;
use std::time::{Duration, Instant};

/// How long a jump confirmation stays visible.
pub const NOTICE_DURATION: Duration = Duration::from_secs(3);

/// Successful navigation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Jump {
    pub offset: u64,
    pub scroll_target_px: f64,
}

impl Jump {
    pub fn confirmation(&self) -> String {
        format!("Jumped to offset 0x{:X}", self.offset)
    }
}

pub type NavigationResult = Result<Jump, NavigationError>;

/// The jump trigger is only enabled for non-blank input.
pub fn can_jump(input: &str) -> bool {
    !input.trim().is_empty()
}

/// Parse `input` as `0x`/`0X`-prefixed hex or plain decimal.
///
/// Negative or oversized literals parse successfully into an out-of-range
/// error; anything that is not a whole integer literal is a parse error.
pub fn parse_offset(input: &str) -> Result<i64, NavigationError> {
    let text = input.trim();
    let parse_error = || NavigationError::Parse {
        input: input.to_string(),
    };

    let (digits, radix) = match text.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("0x") => (&text[2..], 16),
        _ => (text, 10),
    };

    // from_str_radix accepts a leading '+', which no user means in an offset.
    if digits.starts_with('+') {
        return Err(parse_error());
    }

    match i64::from_str_radix(digits, radix) {
        Ok(value) => Ok(value),
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                Err(NavigationError::OutOfRange { length: 0 })
            }
            _ => Err(parse_error()),
        },
    }
}

/// Resolve `input` against `buffer`. Valid offsets are `[0, len - 1]`; with no
/// buffer loaded every offset is out of range.
pub fn resolve(input: &str, buffer: Option<&ByteBuffer>) -> NavigationResult {
    let length = buffer.map(ByteBuffer::len).unwrap_or(0);
    let out_of_range = NavigationError::OutOfRange { length };

    let value = match parse_offset(input) {
        Ok(v) => v,
        Err(NavigationError::OutOfRange { .. }) => return Err(out_of_range),
        Err(e) => return Err(e),
    };

    if value < 0 || value as u64 >= length {
        return Err(out_of_range);
    }

    let offset = value as u64;
    Ok(Jump {
        offset,
        scroll_target_px: scroll_target_of(offset),
    })
}

/// Message next to the offset input. Confirmations clear themselves after
/// [`NOTICE_DURATION`]; a rejection stays until the input is edited or the
/// next jump is attempted.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub message: String,
    pub is_error: bool,
    pub expires_at: Option<Instant>,
}

impl Notice {
    pub fn info(message: impl Into<String>, now: Instant) -> Self {
        Self {
            message: message.into(),
            is_error: false,
            expires_at: Some(now + NOTICE_DURATION),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}
