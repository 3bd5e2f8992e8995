use thiserror::Error;
use tracing::{debug, trace};

use super::CallStore;
use crate::message::Message;
use crate::packet::Packet;
use crate::sip::layout::MAX_SIP_PAYLOAD;
use crate::sip::{
    Method, Validation, extract_call_id, extract_x_call_id, parse_request_response, validate,
};

/// Why a SIP payload was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("payload exceeds {MAX_SIP_PAYLOAD} bytes")]
    TooLarge,
    #[error("no Call-ID header")]
    MissingCallId,
    #[error("payload does not pass the match expression")]
    MatchExpression,
    #[error("dialog does not start with INVITE")]
    InviteOnly,
    #[error("dialog does not start with an initial request")]
    CompleteOnly,
    #[error("call store is at capacity")]
    CapacityExceeded,
}

/// Where a stored message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stored {
    pub call_index: u64,
    /// Position of the message within the call.
    pub position: usize,
    pub new_call: bool,
}

/// Result of handing one payload to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Not a SIP message; nothing was kept.
    NotSip,
    /// Stream payload is an incomplete message; the caller keeps buffering.
    Partial,
    /// Stream payload holds a complete message of `length` bytes followed by
    /// more data; the caller splits and re-submits.
    Multiple { length: usize },
    Stored(Stored),
    Rejected(RejectReason),
}

impl IngestOutcome {
    pub fn stored(&self) -> Option<Stored> {
        match self {
            IngestOutcome::Stored(stored) => Some(*stored),
            _ => None,
        }
    }
}

impl CallStore {
    /// Classify and store one SIP payload.
    ///
    /// Stream payloads are checked for completeness first. Datagram payloads
    /// are complete by construction and only need a SIP start line.
    ///
    /// Admission policies (match expression, INVITE-only, complete-only and
    /// capacity) are applied when a payload would open a new dialog; payloads
    /// for known Call-IDs are always appended.
    pub fn ingest(&mut self, packet: &Packet) -> IngestOutcome {
        if packet.transport.is_stream() {
            match validate(&packet.payload) {
                Validation::Complete => {}
                Validation::NotSip => return IngestOutcome::NotSip,
                Validation::Partial => return IngestOutcome::Partial,
                Validation::Multiple { length } => return IngestOutcome::Multiple { length },
            }
        } else if packet.payload.len() > MAX_SIP_PAYLOAD {
            if parse_request_response(&String::from_utf8_lossy(&packet.payload)).is_some() {
                debug!(len = packet.payload.len(), "dropping oversized SIP datagram");
                return IngestOutcome::Rejected(RejectReason::TooLarge);
            }
            return IngestOutcome::NotSip;
        }

        let Ok(text) = std::str::from_utf8(&packet.payload) else {
            return IngestOutcome::NotSip;
        };
        let Some(start_line) = parse_request_response(text) else {
            return IngestOutcome::NotSip;
        };
        let Some(call_id) = extract_call_id(text) else {
            debug!(src = %packet.src, "dropping SIP message without Call-ID");
            return IngestOutcome::Rejected(RejectReason::MissingCallId);
        };

        let message = Message::new(
            packet.src,
            packet.dst,
            packet.transport,
            packet.timestamp,
            text.to_string(),
            start_line,
        );

        let x_call_id = if self.call_ids.contains_key(&call_id) {
            None
        } else {
            if let Err(reason) = self.admit(&message) {
                debug!(%call_id, %reason, "dialog not admitted");
                return IngestOutcome::Rejected(reason);
            }
            extract_x_call_id(text)
        };

        let (call_index, new_call) = match self.find_or_create(&call_id, x_call_id.as_deref()) {
            Ok(found) => found,
            Err(reason) => {
                debug!(%call_id, %reason, "dialog not admitted");
                return IngestOutcome::Rejected(reason);
            }
        };
        let Some(call) = self.calls.get_mut(&call_index) else {
            return IngestOutcome::Rejected(RejectReason::CapacityExceeded);
        };

        let position = call.push_message(message);
        if call.is_invite() {
            call.update_state(position);
            call.update_extra_headers(position);
        }
        self.refresh_active(call_index);
        self.mark_changed();

        trace!(call_index, position, new_call, "stored SIP message");
        IngestOutcome::Stored(Stored {
            call_index,
            position,
            new_call,
        })
    }

    /// Policies for the first message of a new dialog.
    fn admit(&self, message: &Message) -> Result<(), RejectReason> {
        if let Some(expr) = &self.match_expr {
            if !expr.accepts(message.payload()) {
                return Err(RejectReason::MatchExpression);
            }
        }
        let opts = &self.config.match_opts;
        if opts.invite && message.method() != Some(&Method::Invite) {
            return Err(RejectReason::InviteOnly);
        }
        if opts.complete {
            let initial = message.method().is_some_and(Method::starts_dialog);
            if !initial || message.headers().to_tag.is_some() {
                return Err(RejectReason::CompleteOnly);
            }
        }
        Ok(())
    }
}
