use crate::attribute::Attribute;
use crate::call::Call;
use crate::capture::ts_to_rfc3339;
use crate::message::Message;
use crate::packet::format_endpoint;
use crate::sip::SdpMedia;
use crate::store::CallStore;
use crate::{
    CallReport, CallSummary, CaptureSummary, DEFAULT_GENERATED_AT, MediaSummary, MessageSummary,
    RtpSummary, StatsSummary, make_stub_report,
};

/// What goes into a call report.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    /// Only calls still in setup or in conversation.
    pub active_only: bool,
    /// Leave out per-message summaries.
    pub omit_messages: bool,
}

/// Report of the calls visible in `store`, in its current sort order.
pub fn build_call_report(
    input_path: &str,
    input_bytes: u64,
    store: &CallStore,
    capture_summary: Option<CaptureSummary>,
    options: ReportOptions,
) -> CallReport {
    let mut report = make_stub_report(input_path, input_bytes);
    report.generated_at = capture_summary
        .as_ref()
        .and_then(|summary| summary.time_end.clone().or(summary.time_start.clone()))
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
    report.capture_summary = capture_summary;

    let stats = store.stats();
    report.stats = StatsSummary {
        total: stats.total,
        displayed: stats.displayed,
        active: store.active_calls().len(),
    };
    report.calls = store
        .visible_calls()
        .into_iter()
        .filter(|call| !options.active_only || call.is_active())
        .map(|call| call_summary(call, options))
        .collect();
    report
}

fn call_summary(call: &Call, options: ReportOptions) -> CallSummary {
    let rtp = call.rtp();
    CallSummary {
        index: call.index(),
        call_id: call.call_id().to_string(),
        x_call_id: call.x_call_id().map(str::to_string),
        state: call.state().map(|state| state.as_str().to_string()),
        method: call.attribute(Attribute::Method).unwrap_or_default(),
        from: call.attribute(Attribute::SipFrom),
        to: call.attribute(Attribute::SipTo),
        src: call.attribute(Attribute::Src).unwrap_or_default(),
        dst: call.attribute(Attribute::Dst).unwrap_or_default(),
        transport: call.attribute(Attribute::Transport).unwrap_or_default(),
        message_count: call.message_count(),
        retransmissions: call.retransmission_count(),
        started_at: ts_to_rfc3339(call.first_message().and_then(Message::timestamp)),
        total_duration: call.attribute(Attribute::TotalDuration),
        conversation_duration: call.attribute(Attribute::ConvDuration),
        reason: call.reason_text().map(str::to_string),
        warning: call.warning(),
        correlated: call.correlated().to_vec(),
        rtp: (rtp.packets > 0).then_some(RtpSummary {
            packets: rtp.packets,
            bytes: rtp.bytes,
        }),
        media: call.media().map(media_summary).collect(),
        messages: if options.omit_messages {
            Vec::new()
        } else {
            call.messages().iter().map(message_summary).collect()
        },
    }
}

fn message_summary(message: &Message) -> MessageSummary {
    MessageSummary {
        position: message.position(),
        timestamp: ts_to_rfc3339(message.timestamp()),
        src: format_endpoint(&message.src()),
        dst: format_endpoint(&message.dst()),
        method: message.method_text(),
        request: message.is_request(),
        cseq: message.cseq(),
        retransmission_of: message.retransmission_of(),
    }
}

fn media_summary(media: &SdpMedia) -> MediaSummary {
    MediaSummary {
        media_type: media.media_type.clone(),
        address: media.address.map(|ip| ip.to_string()),
        port: media.port,
        protocol: media.protocol.clone(),
        format: media.preferred_format_name(),
    }
}
