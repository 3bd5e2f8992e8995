use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::attribute::{Attribute, format_duration};
use crate::filter::{FilterCell, FilterState};
use crate::message::Message;
use crate::sip::{Method, SdpMedia};

/// Progress of an INVITE dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    CallSetup,
    InCall,
    Cancelled,
    Rejected,
    Busy,
    Diverted,
    Completed,
}

impl CallState {
    pub fn as_str(self) -> &'static str {
        match self {
            CallState::CallSetup => "CALL SETUP",
            CallState::InCall => "IN CALL",
            CallState::Cancelled => "CANCELLED",
            CallState::Rejected => "REJECTED",
            CallState::Busy => "BUSY",
            CallState::Diverted => "DIVERTED",
            CallState::Completed => "COMPLETED",
        }
    }

    /// Setup or in progress.
    pub fn is_active(self) -> bool {
        matches!(self, CallState::CallSetup | CallState::InCall)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RTP/RTCP traffic seen towards a call's media endpoints.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RtpCounters {
    pub packets: u64,
    pub bytes: u64,
}

/// A SIP dialog: every message sharing one Call-ID, in arrival order.
#[derive(Debug)]
pub struct Call {
    index: u64,
    call_id: String,
    x_call_id: Option<String>,
    messages: Vec<Message>,
    filter: FilterCell,
    evaluations: AtomicU32,
    state: Option<CallState>,
    invite_cseq: Option<u32>,
    conversation_start: Option<usize>,
    conversation_end: Option<usize>,
    reason_text: Option<String>,
    warning: Option<u16>,
    correlated: Vec<u64>,
    locked: bool,
    rtp: RtpCounters,
    changed: AtomicBool,
}

impl Call {
    pub(crate) fn new(index: u64, call_id: String, x_call_id: Option<String>) -> Self {
        Self {
            index,
            call_id,
            x_call_id,
            messages: Vec::new(),
            filter: FilterCell::new(),
            evaluations: AtomicU32::new(0),
            state: None,
            invite_cseq: None,
            conversation_start: None,
            conversation_end: None,
            reason_text: None,
            warning: None,
            correlated: Vec::new(),
            locked: false,
            rtp: RtpCounters::default(),
            changed: AtomicBool::new(false),
        }
    }

    /// Store-assigned index, starting at 1.
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn x_call_id(&self) -> Option<&str> {
        self.x_call_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn first_message(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn message(&self, position: usize) -> Option<&Message> {
        self.messages.get(position)
    }

    /// `None` until the dialog sees an INVITE.
    pub fn state(&self) -> Option<CallState> {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some_and(CallState::is_active)
    }

    /// Whether the dialog was started by an INVITE.
    pub fn is_invite(&self) -> bool {
        self.first_message()
            .and_then(Message::method)
            .is_some_and(|method| *method == Method::Invite)
    }

    pub fn reason_text(&self) -> Option<&str> {
        self.reason_text.as_deref()
    }

    pub fn warning(&self) -> Option<u16> {
        self.warning
    }

    /// Indexes of calls whose X-Call-ID points at this call.
    pub fn correlated(&self) -> &[u64] {
        &self.correlated
    }

    /// Locked calls survive rotation.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn rtp(&self) -> RtpCounters {
        self.rtp
    }

    pub fn retransmission_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_retransmission()).count()
    }

    /// Media descriptors announced by any message of the call.
    pub fn media(&self) -> impl Iterator<Item = &SdpMedia> {
        self.messages.iter().flat_map(|m| m.media().iter())
    }

    /// Cached filter verdict, without evaluating.
    pub fn filter_state(&self) -> FilterState {
        self.filter.get()
    }

    /// How many times the filters were actually evaluated for this call.
    pub fn filter_evaluations(&self) -> u32 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub(crate) fn filter_cell(&self) -> &FilterCell {
        &self.filter
    }

    pub(crate) fn note_filter_evaluation(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub(crate) fn add_correlated(&mut self, index: u64) {
        if !self.correlated.contains(&index) {
            self.correlated.push(index);
            self.changed.store(true, Ordering::Release);
        }
    }

    pub(crate) fn remove_correlated(&mut self, index: u64) {
        self.correlated.retain(|&i| i != index);
    }

    pub(crate) fn count_rtp(&mut self, bytes: usize) {
        self.rtp.packets += 1;
        self.rtp.bytes += bytes as u64;
        self.changed.store(true, Ordering::Release);
    }

    /// Whether messages or media were added since the last call, clearing
    /// the flag.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }

    /// Append a message and return its position.
    ///
    /// A message with the same addresses and the same payload (ignoring
    /// ASCII case) as an earlier one is flagged as a retransmission.
    pub(crate) fn push_message(&mut self, mut message: Message) -> usize {
        let position = self.messages.len();
        message.attach(self.index, position);
        let original = self.messages.iter().rev().find(|prev| {
            prev.src() == message.src()
                && prev.dst() == message.dst()
                && prev.payload().eq_ignore_ascii_case(message.payload())
        });
        if let Some(original) = original {
            message.mark_retransmission_of(original.position());
        }
        self.messages.push(message);
        self.changed.store(true, Ordering::Release);
        position
    }

    /// Advance the dialog state with the message at `position`.
    pub(crate) fn update_state(&mut self, position: usize) {
        let Some(msg) = self.messages.get(position) else {
            return;
        };
        let cseq = msg.cseq();
        let method = msg.method().cloned();
        let code = msg.code();

        match self.state {
            None | Some(CallState::Cancelled)
            | Some(CallState::Rejected)
            | Some(CallState::Busy)
            | Some(CallState::Diverted)
            | Some(CallState::Completed) => {
                if method == Some(Method::Invite) {
                    self.invite_cseq = cseq;
                    self.state = Some(CallState::CallSetup);
                    self.conversation_start = None;
                    self.conversation_end = None;
                }
            }
            Some(CallState::CallSetup) => match (method, code) {
                (Some(Method::Ack), _) if cseq == self.invite_cseq => {
                    self.state = Some(CallState::InCall);
                    self.conversation_start = Some(position);
                }
                (Some(Method::Cancel), _) => self.state = Some(CallState::Cancelled),
                (_, Some(480 | 486 | 600)) => self.state = Some(CallState::Busy),
                (_, Some(code)) if code > 400 && cseq == self.invite_cseq => {
                    self.state = Some(CallState::Rejected)
                }
                (_, Some(code)) if code > 300 => self.state = Some(CallState::Diverted),
                _ => {}
            },
            Some(CallState::InCall) => {
                if method == Some(Method::Bye) {
                    self.state = Some(CallState::Completed);
                    self.conversation_end = Some(position);
                }
            }
        }
    }

    /// Keep the latest Reason text and Warning code seen in the dialog.
    pub(crate) fn update_extra_headers(&mut self, position: usize) {
        let Some(msg) = self.messages.get(position) else {
            return;
        };
        let headers = msg.headers();
        if let Some(reason) = &headers.reason {
            self.reason_text = Some(reason.clone());
        }
        if let Some(warning) = headers.warning {
            self.warning = Some(warning);
        }
    }

    fn timestamp_at(&self, position: Option<usize>) -> Option<f64> {
        self.messages.get(position?)?.timestamp()
    }

    /// Attribute value; message-level attributes come from the first message.
    pub fn attribute(&self, attr: Attribute) -> Option<String> {
        match attr {
            Attribute::CallIndex => Some(self.index.to_string()),
            Attribute::CallId => Some(self.call_id.clone()),
            Attribute::XCallId => self.x_call_id.clone(),
            Attribute::MsgCount => Some(self.messages.len().to_string()),
            Attribute::CallState => self.state.map(|s| s.as_str().to_string()),
            Attribute::Transport => self.first_message().map(|m| m.transport().to_string()),
            Attribute::ConvDuration => {
                let start = self.timestamp_at(self.conversation_start)?;
                let end = self.timestamp_at(self.conversation_end)?;
                Some(format_duration(start, end))
            }
            Attribute::TotalDuration => {
                let start = self.first_message()?.timestamp()?;
                let end = self.messages.last()?.timestamp()?;
                Some(format_duration(start, end))
            }
            Attribute::ReasonText => self.reason_text.clone(),
            Attribute::Warning => self.warning.map(|w| w.to_string()),
            _ => self.first_message()?.attribute(attr),
        }
    }
}
