//! Call-ID indexed dialog storage.
//!
//! The store is split by concern:
//! - `mod.rs`: ownership, lookup, capacity rotation, removal, change flag
//!   and filter control
//! - `ingest`: classification of raw payloads into stored messages
//! - `query`: sorted and filtered views for renderers
//!
//! Calls are keyed by their store index, which is assigned sequentially
//! starting at 1 and never reused, so index order is creation order.

mod ingest;
mod query;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::call::Call;
use crate::config::{ConfigError, SortOptions, StoreConfig};
use crate::filter::{FilterKind, FilterSet, FilterState, LineRenderer};
use crate::matcher::{CompileError, MatchExpression};
use crate::packet::Packet;

pub use ingest::{IngestOutcome, RejectReason, Stored};

/// Totals reported to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Every stored call.
    pub total: usize,
    /// Calls passing the current filters.
    pub displayed: usize,
}

/// Exclusive owner of every call.
#[derive(Debug)]
pub struct CallStore {
    config: StoreConfig,
    match_expr: Option<MatchExpression>,
    filters: FilterSet,
    sort: SortOptions,
    calls: BTreeMap<u64, Call>,
    call_ids: HashMap<String, u64>,
    active: BTreeSet<u64>,
    last_index: u64,
    changed: AtomicBool,
}

impl CallStore {
    /// Build a store, compiling the match expression and configured filters.
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        let match_expr = match &config.match_opts.expression {
            Some(pattern) if !pattern.is_empty() => Some(MatchExpression::new(
                pattern,
                config.match_opts.ignore_case,
                config.match_opts.invert,
            )?),
            _ => None,
        };
        let mut filters = FilterSet::new();
        for (kind, expression) in &config.filters {
            filters.set(*kind, Some(expression))?;
        }

        Ok(Self {
            sort: config.sort,
            config,
            match_expr,
            filters,
            calls: BTreeMap::new(),
            call_ids: HashMap::new(),
            active: BTreeSet::new(),
            last_index: 0,
            changed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn match_expression(&self) -> Option<&MatchExpression> {
        self.match_expr.as_ref()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Every call in creation order.
    pub fn calls(&self) -> impl Iterator<Item = &Call> {
        self.calls.values()
    }

    /// Calls in setup or in conversation, in creation order.
    pub fn active_calls(&self) -> Vec<&Call> {
        self.active
            .iter()
            .filter_map(|index| self.calls.get(index))
            .collect()
    }

    /// Lookup by store index (the value shown in the index column).
    pub fn find_by_index(&self, index: u64) -> Option<&Call> {
        self.calls.get(&index)
    }

    pub fn find_by_call_id(&self, call_id: &str) -> Option<&Call> {
        self.calls.get(self.call_ids.get(call_id)?)
    }

    /// Index of the call for `call_id`, creating it when absent.
    ///
    /// Creation honors the capacity limit; the boolean tells whether the
    /// call is new.
    pub fn find_or_create(
        &mut self,
        call_id: &str,
        x_call_id: Option<&str>,
    ) -> Result<(u64, bool), RejectReason> {
        if let Some(&index) = self.call_ids.get(call_id) {
            return Ok((index, false));
        }
        self.rotate_if_needed()?;

        self.last_index += 1;
        let index = self.last_index;
        self.call_ids.insert(call_id.to_string(), index);
        self.calls.insert(
            index,
            Call::new(index, call_id.to_string(), x_call_id.map(str::to_string)),
        );

        if let Some(parent) = x_call_id
            .and_then(|x| self.call_ids.get(x).copied())
            .filter(|&parent| parent != index)
        {
            if let Some(parent) = self.calls.get_mut(&parent) {
                parent.add_correlated(index);
            }
        }

        self.mark_changed();
        Ok((index, true))
    }

    /// Make room for one more call.
    ///
    /// With rotation enabled the oldest unlocked call is evicted; otherwise a
    /// full store refuses new calls.
    pub fn rotate_if_needed(&mut self) -> Result<(), RejectReason> {
        let limit = self.config.capture.limit;
        if limit == 0 || self.calls.len() < limit {
            return Ok(());
        }
        if !self.config.capture.rotate {
            return Err(RejectReason::CapacityExceeded);
        }
        let oldest = self
            .calls
            .values()
            .find(|call| !call.is_locked())
            .map(Call::index);
        match oldest {
            Some(index) => {
                debug!(index, limit, "rotating oldest call out of the store");
                self.remove(index);
                Ok(())
            }
            None => Err(RejectReason::CapacityExceeded),
        }
    }

    /// Drop one call and every reference to it.
    pub fn remove(&mut self, index: u64) -> Option<Call> {
        let call = self.calls.remove(&index)?;
        self.call_ids.remove(call.call_id());
        self.active.remove(&index);
        if let Some(parent) = call
            .x_call_id()
            .and_then(|x| self.call_ids.get(x).copied())
        {
            if let Some(parent) = self.calls.get_mut(&parent) {
                parent.remove_correlated(index);
            }
        }
        self.mark_changed();
        Some(call)
    }

    pub fn clear(&mut self) {
        if self.calls.is_empty() {
            return;
        }
        debug!(calls = self.calls.len(), "clearing call store");
        self.calls.clear();
        self.call_ids.clear();
        self.active.clear();
        self.mark_changed();
    }

    /// Remove calls whose cached verdict is `Fail`.
    ///
    /// Passing and not yet evaluated calls are kept. Returns how many calls
    /// were removed.
    pub fn clear_non_matching(&mut self) -> usize {
        let failing: Vec<u64> = self
            .calls
            .values()
            .filter(|call| call.filter_state() == FilterState::Fail)
            .map(Call::index)
            .collect();
        for &index in &failing {
            self.remove(index);
        }
        if !failing.is_empty() {
            debug!(removed = failing.len(), "cleared calls failing the filters");
        }
        failing.len()
    }

    /// Whether calls or messages were added or removed since the last check.
    ///
    /// Reading the flag clears it.
    pub fn has_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn mark_changed(&self) {
        self.changed.store(true, Ordering::Release);
    }

    pub fn stats(&self) -> StoreStats {
        let displayed = self
            .calls
            .values()
            .filter(|call| self.filters.evaluate(call) == FilterState::Pass)
            .count();
        StoreStats {
            total: self.calls.len(),
            displayed,
        }
    }

    /// Lock or unlock a call against rotation. Returns false for unknown
    /// indexes.
    pub fn set_locked(&mut self, index: u64, locked: bool) -> bool {
        match self.calls.get_mut(&index) {
            Some(call) => {
                call.set_locked(locked);
                true
            }
            None => false,
        }
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Install or clear one view filter.
    ///
    /// Every cached verdict is reset on success; a compile error leaves both
    /// the previous expression and the cached verdicts untouched.
    pub fn set_filter(
        &mut self,
        kind: FilterKind,
        expression: Option<&str>,
    ) -> Result<(), CompileError> {
        self.filters.set(kind, expression)?;
        self.reset_filters();
        Ok(())
    }

    pub fn get_filter(&self, kind: FilterKind) -> Option<&str> {
        self.filters.get(kind)
    }

    /// Mark every call as not yet evaluated.
    pub fn reset_filters(&self) {
        for call in self.calls.values() {
            call.filter_cell().reset();
        }
    }

    /// Swap the renderer behind the rendered-line filter.
    pub fn set_line_renderer(&mut self, renderer: Arc<dyn LineRenderer>) {
        self.filters.set_renderer(renderer);
        self.reset_filters();
    }

    /// Count a non-SIP datagram against the active call announcing its
    /// destination (or source) as a media endpoint.
    ///
    /// Returns the index of the call it was counted on. Does nothing unless
    /// RTP accounting is enabled.
    pub fn record_rtp(&mut self, packet: &Packet) -> Option<u64> {
        if !self.config.capture.rtp {
            return None;
        }
        let index = self.active.iter().copied().find(|index| {
            self.calls.get(index).is_some_and(|call| {
                call.media().any(|media| {
                    media.has_endpoint(packet.dst.ip(), packet.dst.port())
                        || media.has_endpoint(packet.src.ip(), packet.src.port())
                })
            })
        })?;
        let call = self.calls.get_mut(&index)?;
        call.count_rtp(packet.payload.len());
        Some(index)
    }

    fn refresh_active(&mut self, index: u64) {
        let active = self.calls.get(&index).is_some_and(Call::is_active);
        if active {
            self.active.insert(index);
        } else {
            self.active.remove(&index);
        }
    }
}
