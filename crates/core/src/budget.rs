use serde::Deserialize;

use crate::error::{CoreError, Result};

/// Static limits of the target completion model. All token-budget
/// arithmetic in the engine goes through this type so the constants are
/// subtracted in exactly one place.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ModelLimits {
    pub context_window: usize,
    pub max_output_tokens: usize,
    pub safety_buffer: usize,
}

impl Default for ModelLimits {
    fn default() -> Self {
        Self {
            context_window: 8192,
            max_output_tokens: 4000,
            safety_buffer: 50,
        }
    }
}

impl ModelLimits {
    /// Budget available to one chunk of input once the system message and
    /// the output reservation are accounted for.
    pub fn chunk_budget(&self, system_tokens: usize) -> Result<usize> {
        let reserved = system_tokens + self.max_output_tokens + self.safety_buffer;
        match self.context_window.checked_sub(reserved) {
            Some(budget) if budget > 0 => Ok(budget),
            _ => Err(CoreError::Budget(format!(
                "context window {} cannot fit {} reserved tokens",
                self.context_window, reserved
            ))),
        }
    }

    /// `max_tokens` to request for a completion whose input occupies
    /// `input_tokens`: the smaller of the requested maximum and the
    /// remaining headroom, floored at 1. `None` means the input leaves no
    /// headroom at all and must be truncated first.
    pub fn output_allowance(&self, input_tokens: usize) -> Option<usize> {
        let headroom = self
            .context_window
            .checked_sub(input_tokens + self.safety_buffer)?;
        if headroom == 0 {
            return None;
        }
        Some(headroom.min(self.max_output_tokens).max(1))
    }

    /// Largest input size that still leaves the full output reservation.
    pub fn input_budget(&self, fixed_tokens: usize) -> usize {
        self.context_window
            .saturating_sub(fixed_tokens + self.max_output_tokens + self.safety_buffer)
            .max(1)
    }
}
