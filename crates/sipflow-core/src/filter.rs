//! Per-field view filters with per-call verdict caching.
//!
//! A [`FilterSet`] holds at most one compiled expression per [`FilterKind`].
//! Evaluation walks the kinds in a fixed order and stops at the first
//! expression that does not match. The verdict is cached on the call until
//! the store resets it, so repeated queries do not re-run the expressions.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::call::Call;
use crate::config::ConfigError;
use crate::matcher::{CompileError, Matcher};

/// Field a view filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// SIP From of the first message.
    From,
    /// SIP To of the first message.
    To,
    /// Source address of the first message.
    Source,
    /// Destination address of the first message.
    Destination,
    /// Method or response text of the first message.
    Method,
    /// Any message payload of the call.
    Payload,
    /// The call's rendered list line.
    #[serde(rename = "line")]
    RenderedLine,
}

impl FilterKind {
    /// Kinds in evaluation order.
    pub const ALL: [FilterKind; 7] = [
        FilterKind::From,
        FilterKind::To,
        FilterKind::Source,
        FilterKind::Destination,
        FilterKind::Method,
        FilterKind::Payload,
        FilterKind::RenderedLine,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterKind::From => "from",
            FilterKind::To => "to",
            FilterKind::Source => "source",
            FilterKind::Destination => "destination",
            FilterKind::Method => "method",
            FilterKind::Payload => "payload",
            FilterKind::RenderedLine => "line",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }

    fn matches(self, call: &Call, matcher: &Matcher, renderer: &dyn LineRenderer) -> bool {
        let field = |attr: Attribute| call.attribute(attr).unwrap_or_default();
        match self {
            FilterKind::From => matcher.is_match(&field(Attribute::SipFrom)),
            FilterKind::To => matcher.is_match(&field(Attribute::SipTo)),
            FilterKind::Source => matcher.is_match(&field(Attribute::Src)),
            FilterKind::Destination => matcher.is_match(&field(Attribute::Dst)),
            FilterKind::Method => matcher.is_match(&field(Attribute::Method)),
            FilterKind::Payload => call.messages().iter().any(|m| matcher.is_match(m.payload())),
            FilterKind::RenderedLine => matcher.is_match(&renderer.render_line(call)),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "from" | "sipfrom" => Ok(FilterKind::From),
            "to" | "sipto" => Ok(FilterKind::To),
            "source" | "src" => Ok(FilterKind::Source),
            "destination" | "dst" => Ok(FilterKind::Destination),
            "method" => Ok(FilterKind::Method),
            "payload" => Ok(FilterKind::Payload),
            "line" | "callslist" => Ok(FilterKind::RenderedLine),
            _ => Err(ConfigError::UnknownFilterKind(s.to_string())),
        }
    }
}

/// Cached filter verdict of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    Unevaluated,
    Pass,
    Fail,
}

#[derive(Debug)]
pub(crate) struct FilterCell(AtomicU8);

impl FilterCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    pub(crate) fn get(&self) -> FilterState {
        match self.0.load(Ordering::Acquire) {
            1 => FilterState::Pass,
            2 => FilterState::Fail,
            _ => FilterState::Unevaluated,
        }
    }

    pub(crate) fn set(&self, state: FilterState) {
        let raw = match state {
            FilterState::Unevaluated => 0,
            FilterState::Pass => 1,
            FilterState::Fail => 2,
        };
        self.0.store(raw, Ordering::Release);
    }

    pub(crate) fn reset(&self) {
        self.set(FilterState::Unevaluated);
    }
}

/// Produces the one-line text a list view shows for a call.
pub trait LineRenderer: Send + Sync {
    fn render_line(&self, call: &Call) -> String;
}

/// Space-separated attribute columns.
#[derive(Debug, Clone)]
pub struct DefaultLineRenderer {
    columns: Vec<Attribute>,
}

impl DefaultLineRenderer {
    pub fn new(columns: Vec<Attribute>) -> Self {
        Self { columns }
    }
}

impl Default for DefaultLineRenderer {
    fn default() -> Self {
        Self::new(vec![
            Attribute::CallIndex,
            Attribute::Method,
            Attribute::SipFrom,
            Attribute::SipTo,
            Attribute::MsgCount,
            Attribute::Src,
            Attribute::Dst,
            Attribute::CallState,
        ])
    }
}

impl LineRenderer for DefaultLineRenderer {
    fn render_line(&self, call: &Call) -> String {
        self.columns
            .iter()
            .map(|&attr| call.attribute(attr).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Active view filters.
pub struct FilterSet {
    filters: [Option<Matcher>; 7],
    renderer: Arc<dyn LineRenderer>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::with_renderer(Arc::new(DefaultLineRenderer::default()))
    }

    pub fn with_renderer(renderer: Arc<dyn LineRenderer>) -> Self {
        Self {
            filters: Default::default(),
            renderer,
        }
    }

    pub fn renderer(&self) -> &dyn LineRenderer {
        self.renderer.as_ref()
    }

    pub(crate) fn set_renderer(&mut self, renderer: Arc<dyn LineRenderer>) {
        self.renderer = renderer;
    }

    /// Install or clear the expression for `kind`.
    ///
    /// Expressions are compiled case-insensitively. On a compile error the
    /// previous expression stays installed.
    pub fn set(&mut self, kind: FilterKind, expression: Option<&str>) -> Result<(), CompileError> {
        let matcher = match expression {
            Some(expression) if !expression.is_empty() => Some(Matcher::compile(expression, true)?),
            _ => None,
        };
        self.filters[kind.slot()] = matcher;
        Ok(())
    }

    pub fn get(&self, kind: FilterKind) -> Option<&str> {
        self.filters[kind.slot()].as_ref().map(Matcher::pattern)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.iter().all(Option::is_none)
    }

    /// Filter verdict for `call`, cached on the call.
    ///
    /// A call without messages always fails and is never cached.
    pub fn evaluate(&self, call: &Call) -> FilterState {
        if call.message_count() == 0 {
            return FilterState::Fail;
        }
        let cached = call.filter_cell().get();
        if cached != FilterState::Unevaluated {
            return cached;
        }

        call.note_filter_evaluation();
        let state = self.compute(call);
        call.filter_cell().set(state);
        state
    }

    fn compute(&self, call: &Call) -> FilterState {
        for kind in FilterKind::ALL {
            let Some(matcher) = &self.filters[kind.slot()] else {
                continue;
            };
            if !kind.matches(call, matcher, self.renderer.as_ref()) {
                return FilterState::Fail;
            }
        }
        FilterState::Pass
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in FilterKind::ALL {
            if let Some(pattern) = self.get(kind) {
                map.entry(&kind.name(), &pattern);
            }
        }
        map.finish()
    }
}
