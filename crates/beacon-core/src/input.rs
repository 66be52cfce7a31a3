//! Keystroke assembly for keyboard-wedge barcode scanners.
//!
//! Scanners type a token one key at a time and finish with Enter. The buffer
//! turns that stream into complete [`BarcodeScan`] values so the session only
//! ever sees whole tokens.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::MAX_IDENTIFIER_LEN;

/// A single key event from the station terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    /// Shift, Tab, CapsLock, Alt and friends.
    Modifier,
}

impl FromStr for Key {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Enter" => Ok(Key::Enter),
            "Backspace" => Ok(Key::Backspace),
            "Shift" | "Tab" | "CapsLock" | "Alt" | "Control" | "Meta" => Ok(Key::Modifier),
            _ => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if !c.is_control() => Ok(Key::Char(c)),
                    _ => Err(ValidationError::InvalidFormat {
                        field: "key".to_string(),
                        reason: format!("unsupported key '{}'", s),
                    }),
                }
            }
        }
    }
}

/// A complete token read from the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeScan {
    pub token: String,
}

/// Per-station accumulation of typed characters.
///
/// Characters past [`MAX_IDENTIFIER_LEN`] are not kept but are counted, so
/// an over-long token is refused on Enter instead of being cut short.
#[derive(Debug, Clone, Default)]
pub struct ScanBuffer {
    buf: String,
    dropped: usize,
}

impl ScanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one key. Returns a scan when Enter completes a non-empty token.
    pub fn push(&mut self, key: Key) -> Result<Option<BarcodeScan>, ValidationError> {
        match key {
            Key::Char(c) => {
                if self.dropped == 0 && self.buf.chars().count() < MAX_IDENTIFIER_LEN {
                    self.buf.push(c);
                } else {
                    self.dropped += 1;
                }
                Ok(None)
            }
            Key::Backspace => {
                if self.dropped > 0 {
                    self.dropped -= 1;
                } else {
                    self.buf.pop();
                }
                Ok(None)
            }
            Key::Enter => {
                let overflow = std::mem::take(&mut self.dropped) > 0;
                let token = std::mem::take(&mut self.buf);
                if overflow {
                    return Err(ValidationError::TooLong {
                        field: "scan".to_string(),
                        max: MAX_IDENTIFIER_LEN,
                    });
                }
                let token = token.trim();
                Ok((!token.is_empty()).then(|| BarcodeScan {
                    token: token.to_string(),
                }))
            }
            Key::Modifier => Ok(None),
        }
    }

    pub fn pending(&self) -> &str {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.dropped = 0;
    }
}
