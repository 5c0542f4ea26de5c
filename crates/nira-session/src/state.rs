//! Model lifecycle state machine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Where the session is in acquiring its model.
///
/// ```text
/// Unstarted ──▶ Loading ──▶ Ready
///                 ▲  │        │
///                 │  ▼        │ reload
///               Error ◀───────┘ (via Loading)
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unstarted,
    Loading,
    Ready,
    Error,
}

impl SessionState {
    /// A first load or a retry is allowed
    pub fn can_start_load(&self) -> bool {
        matches!(self, SessionState::Unstarted | SessionState::Error)
    }

    /// A reload of a ready model is allowed
    pub fn can_reload(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    /// Chat submission is allowed
    pub fn can_send(&self) -> bool {
        matches!(self, SessionState::Ready)
    }

    /// Enter `Loading`.
    pub fn begin_load(&mut self) -> Result<()> {
        if !self.can_start_load() && !self.can_reload() {
            return Err(Error::InvalidTransition {
                from: *self,
                action: "begin loading",
            });
        }
        *self = SessionState::Loading;
        Ok(())
    }

    /// Leave `Loading` for `Ready` or `Error`.
    pub fn complete_load(&mut self, success: bool) -> Result<()> {
        if *self != SessionState::Loading {
            return Err(Error::InvalidTransition {
                from: *self,
                action: "complete loading",
            });
        }
        *self = if success {
            SessionState::Ready
        } else {
            SessionState::Error
        };
        Ok(())
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Unstarted => "unstarted",
            SessionState::Loading => "loading",
            SessionState::Ready => "ready",
            SessionState::Error => "error",
        };
        f.write_str(s)
    }
}
