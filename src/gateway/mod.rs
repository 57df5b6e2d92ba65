//! Discord gateway subsystem: the REST client, the WebSocket event listener,
//! and the [`Gateway`] trait the rest of the crate is written against.

pub mod rest;
pub mod traits;
pub mod ws;

pub use rest::RestGateway;
pub use traits::{
    ApiError, ButtonSpec, ButtonStyle, ChannelInfo, ChannelKind, EmbedSpec, Gateway,
    InteractionResponse, MemberInfo, MessageInfo, MessageRef, ModalInput, ModalSpec,
    OutboundMessage, UserInfo, CODE_CANNOT_MESSAGE_USER, CODE_INVALID_RECIPIENT,
    CODE_MISSING_ACCESS, CODE_MISSING_PERMISSIONS,
};
