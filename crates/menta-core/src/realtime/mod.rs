//! ============================================================================
//! Realtime Module - Broadcast Channel Carrying Call Ids
//! ============================================================================
//! The call-booking backend announces each new call on a realtime channel
//! (`call-created` with `{callId}`). This is the second source racing the
//! call client's `call-start` event for the session's correlation id.
//! ============================================================================

pub mod protocol;
mod supabase;

pub use protocol::{PhoenixFrame, CALL_CREATED_EVENT};
pub use supabase::{realtime_event_channel, RealtimeHandle, SupabaseRealtime, REALTIME_EVENT_BUFFER};
