//! Network Layer
//!
//! Everything that talks to an RGS. Nothing here knows about round phases;
//! sequencing lives in `session/` and `round/`.

pub mod client;
pub mod http;
pub mod local;
pub mod protocol;
pub mod transport;

pub use client::{CallKind, RgsClient};
pub use http::{HttpTransport, IDEMPOTENCY_HEADER};
pub use local::{LocalRgs, LocalRgsConfig};
pub use protocol::{
    AckStatus, BetHistoryResponse, BonusOptionInfo, BonusRequest, GameInfoResponse, JackpotTierInfo,
    RoundInputs, RoundRecord, SessionSnapshot, SubmitRoundRequest,
};
pub use transport::{Backend, RgsTransport};
