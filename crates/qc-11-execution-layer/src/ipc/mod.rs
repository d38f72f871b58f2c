//! IPC: message decoding and the per-message handler.

pub mod handler;
pub mod payloads;

pub use handler::ExecutionLayerHandler;
pub use payloads::{
    Event, ExecutionMsg, MessageResult, MsgExecute, MsgTransfer, RawMessage, ResultCode,
    EXECUTE_TYPE, ROUTER_KEY, TRANSFER_TYPE,
};
