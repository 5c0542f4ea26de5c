//! Generation-tagged assembly of one streamed assistant turn.
//!
//! Every turn is tagged with a [`Generation`] when it begins. Opening a new
//! turn, or invalidating the current one, makes every earlier generation
//! stale: its deltas are ignored, its usage is dropped and finalizing it
//! yields [`Error::Discarded`]. This is what keeps a slow, abandoned stream
//! from writing into a newer conversation.

use std::fmt;

use nira_engine::Usage;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Monotonic turn sequence number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The result of finalizing a current turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalTurn {
    pub generation: Generation,
    pub text: String,
    pub usage: Option<Usage>,
}

#[derive(Debug)]
struct Turn {
    generation: Generation,
    text: String,
    usage: Option<Usage>,
    cancel: CancellationToken,
}

/// Accumulates deltas for the current turn only
#[derive(Debug, Default)]
pub struct StreamAssembler {
    counter: u64,
    turn: Option<Turn>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new turn, superseding any turn still in flight.
    pub fn begin_turn(&mut self) -> Generation {
        let generation = self.advance();
        self.turn = Some(Turn {
            generation,
            text: String::new(),
            usage: None,
            cancel: CancellationToken::new(),
        });
        tracing::debug!("Opened turn {}", generation);
        generation
    }

    /// Make the in-flight turn (if any) stale without opening a new one.
    pub fn invalidate(&mut self) -> Generation {
        let generation = self.advance();
        tracing::debug!("Invalidated turns before {}", generation);
        generation
    }

    /// The latest issued generation
    pub fn current(&self) -> Generation {
        Generation(self.counter)
    }

    /// Whether `generation` still owns an open turn
    pub fn is_current(&self, generation: Generation) -> bool {
        self.turn
            .as_ref()
            .is_some_and(|t| t.generation == generation)
    }

    /// Token cancelled once `generation` goes stale.
    ///
    /// A stale generation gets an already-cancelled token.
    pub fn cancellation(&self, generation: Generation) -> CancellationToken {
        match &self.turn {
            Some(turn) if turn.generation == generation => turn.cancel.clone(),
            _ => {
                let token = CancellationToken::new();
                token.cancel();
                token
            }
        }
    }

    /// Append `delta` if `generation` is current; returns the running text.
    pub fn consume(&mut self, delta: &str, generation: Generation) -> Option<&str> {
        let turn = self.turn_mut(generation)?;
        turn.text.push_str(delta);
        Some(turn.text.as_str())
    }

    /// Record usage if `generation` is current. The last report wins.
    pub fn apply_usage(&mut self, usage: Usage, generation: Generation) -> bool {
        match self.turn_mut(generation) {
            Some(turn) => {
                turn.usage = Some(usage);
                true
            }
            None => false,
        }
    }

    /// Close the turn and hand back its text, or `Discarded` if stale.
    pub fn finalize(&mut self, generation: Generation) -> Result<FinalTurn> {
        if !self.is_current(generation) {
            tracing::debug!("Discarding stale turn {} (current {})", generation, self.current());
            return Err(Error::Discarded);
        }
        match self.turn.take() {
            Some(turn) => Ok(FinalTurn {
                generation: turn.generation,
                text: turn.text,
                usage: turn.usage,
            }),
            None => Err(Error::Discarded),
        }
    }

    fn advance(&mut self) -> Generation {
        if let Some(stale) = self.turn.take() {
            stale.cancel.cancel();
        }
        self.counter += 1;
        Generation(self.counter)
    }

    fn turn_mut(&mut self, generation: Generation) -> Option<&mut Turn> {
        self.turn.as_mut().filter(|t| t.generation == generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generations_increase() {
        let mut a = StreamAssembler::new();
        let g1 = a.begin_turn();
        let g2 = a.begin_turn();
        let g3 = a.invalidate();
        assert!(g1 < g2 && g2 < g3);
        assert_eq!(a.current(), g3);
    }

    #[test]
    fn test_consume_and_finalize() {
        let mut a = StreamAssembler::new();
        let g = a.begin_turn();
        assert_eq!(a.consume("Hel", g), Some("Hel"));
        assert_eq!(a.consume("lo", g), Some("Hello"));
        assert!(a.apply_usage(Usage::new(5, 2), g));

        let turn = a.finalize(g).unwrap();
        assert_eq!(turn.text, "Hello");
        assert_eq!(turn.usage, Some(Usage::new(5, 2)));
        assert!(!a.is_current(g));
    }

    #[test]
    fn test_new_turn_discards_old() {
        let mut a = StreamAssembler::new();
        let g1 = a.begin_turn();
        a.consume("old", g1);
        let g2 = a.begin_turn();

        assert_eq!(a.consume("late", g1), None);
        assert!(!a.apply_usage(Usage::new(1, 1), g1));
        assert!(matches!(a.finalize(g1), Err(Error::Discarded)));

        // The new turn does not see the old text
        assert_eq!(a.consume("new", g2), Some("new"));
        assert_eq!(a.finalize(g2).unwrap().text, "new");
    }

    #[test]
    fn test_invalidate_discards_in_flight_turn() {
        let mut a = StreamAssembler::new();
        let g = a.begin_turn();
        a.consume("partial", g);
        a.invalidate();
        assert_eq!(a.consume("late", g), None);
        assert!(matches!(a.finalize(g), Err(Error::Discarded)));
    }

    #[test]
    fn test_finalize_twice_is_discarded() {
        let mut a = StreamAssembler::new();
        let g = a.begin_turn();
        a.finalize(g).unwrap();
        assert!(matches!(a.finalize(g), Err(Error::Discarded)));
    }

    #[test]
    fn test_usage_last_report_wins() {
        let mut a = StreamAssembler::new();
        let g = a.begin_turn();
        a.apply_usage(Usage::new(1, 1), g);
        a.apply_usage(Usage::new(7, 3), g);
        assert_eq!(a.finalize(g).unwrap().usage, Some(Usage::new(7, 3)));
    }

    #[test]
    fn test_cancellation_follows_staleness() {
        let mut a = StreamAssembler::new();
        let g1 = a.begin_turn();
        let token = a.cancellation(g1);
        assert!(!token.is_cancelled());

        let g2 = a.begin_turn();
        assert!(token.is_cancelled());
        assert!(a.cancellation(g1).is_cancelled());
        assert!(!a.cancellation(g2).is_cancelled());

        // Finalizing normally does not cancel
        let token = a.cancellation(g2);
        a.finalize(g2).unwrap();
        assert!(!token.is_cancelled());
    }
}
