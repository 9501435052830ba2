//! Completion Request Coalescing
//!
//! The editor fires a completion request on nearly every keystroke, so
//! several requests are routinely in flight at once. Only the most recently
//! *issued* request's result may ever reach the UI — and "most recent" means
//! issuance order, never network arrival order.
//!
//! The coalescer holds every completed result until the in-flight count
//! returns to zero, then applies the one with the maximum generation and
//! discards the rest. An older request whose response arrives last can
//! therefore never clobber a newer one.

use std::collections::BTreeMap;

use super::CompletionItem;

/// Monotonic request-issuance counter value
pub type Generation = u64;

/// Coalesces overlapping completion requests by generation
///
/// Driven from the host loop: `begin` when a request is issued, `finish`
/// when its worker reports back. State is host-owned; workers communicate
/// through events.
#[derive(Debug, Default)]
pub struct CompletionCoalescer {
    next_generation: Generation,
    in_flight: usize,
    completed: BTreeMap<Generation, Vec<CompletionItem>>,
}

impl CompletionCoalescer {
    /// Create an idle coalescer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly issued request and return its generation
    pub fn begin(&mut self) -> Generation {
        self.next_generation += 1;
        self.in_flight += 1;
        self.next_generation
    }

    /// Number of requests issued but not yet finished
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Record the outcome of request `generation`
    ///
    /// `outcome` is `None` for failed requests; failures still count toward
    /// draining the in-flight set. Returns the batch to apply once every
    /// outstanding request has finished: the successful result with the
    /// highest generation, tagged with that generation. All other stored
    /// results are discarded.
    pub fn finish(
        &mut self,
        generation: Generation,
        outcome: Option<Vec<CompletionItem>>,
    ) -> Option<(Generation, Vec<CompletionItem>)> {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some(items) = outcome {
            self.completed.insert(generation, items);
        }

        if self.in_flight > 0 {
            return None;
        }

        let winner = self.completed.pop_last();
        let discarded = self.completed.len();
        self.completed.clear();

        if let Some((generation, items)) = winner {
            tracing::debug!(generation, discarded, "applying coalesced completion batch");
            Some((generation, items))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(tag: &str) -> Vec<CompletionItem> {
        vec![CompletionItem {
            insert_text: tag.to_string(),
            ..CompletionItem::default()
        }]
    }

    #[test]
    fn test_single_request_applies() {
        let mut coalescer = CompletionCoalescer::new();
        let g = coalescer.begin();
        let (winner, applied) = coalescer.finish(g, Some(batch("only"))).unwrap();
        assert_eq!(winner, g);
        assert_eq!(applied[0].insert_text, "only");
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[test]
    fn test_issuance_order_wins_over_arrival_order() {
        // Generations 1, 2, 3 issued; responses arrive 3, 1, 2.
        let mut coalescer = CompletionCoalescer::new();
        let g1 = coalescer.begin();
        let g2 = coalescer.begin();
        let g3 = coalescer.begin();

        assert!(coalescer.finish(g3, Some(batch("three"))).is_none());
        assert!(coalescer.finish(g1, Some(batch("one"))).is_none());
        let (winner, applied) = coalescer.finish(g2, Some(batch("two"))).unwrap();

        assert_eq!(winner, g3);
        assert_eq!(applied[0].insert_text, "three");
    }

    #[test]
    fn test_nothing_applied_before_all_finish() {
        let mut coalescer = CompletionCoalescer::new();
        let g1 = coalescer.begin();
        let _g2 = coalescer.begin();

        assert!(coalescer.finish(g1, Some(batch("early"))).is_none());
        assert_eq!(coalescer.in_flight(), 1);
    }

    #[test]
    fn test_failures_drain_without_result() {
        let mut coalescer = CompletionCoalescer::new();
        let g1 = coalescer.begin();
        let g2 = coalescer.begin();

        assert!(coalescer.finish(g2, None).is_none());
        // The newest request failed; the older success is all that's left.
        let (winner, applied) = coalescer.finish(g1, Some(batch("older"))).unwrap();
        assert_eq!(winner, g1);
        assert_eq!(applied[0].insert_text, "older");
    }

    #[test]
    fn test_all_failures_yield_nothing() {
        let mut coalescer = CompletionCoalescer::new();
        let g1 = coalescer.begin();
        let g2 = coalescer.begin();
        assert!(coalescer.finish(g1, None).is_none());
        assert!(coalescer.finish(g2, None).is_none());
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[test]
    fn test_later_rounds_start_clean() {
        let mut coalescer = CompletionCoalescer::new();
        let g1 = coalescer.begin();
        coalescer.finish(g1, Some(batch("round one"))).unwrap();

        let g2 = coalescer.begin();
        let (_, applied) = coalescer.finish(g2, Some(batch("round two"))).unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].insert_text, "round two");
        assert!(g2 > g1);
    }
}
