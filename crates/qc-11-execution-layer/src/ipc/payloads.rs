//! IPC message payloads
//!
//! Messages arrive from the transaction router as a type tag plus a JSON body.
//! Each recognized message becomes exactly one deploy.

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::domain::deploy::{ContractCode, DeployDescriptor, Program};
use crate::domain::errors::ExecutionLayerError;
use crate::domain::value_objects::StateHash;

/// Route every execution-layer message is addressed to.
pub const ROUTER_KEY: &str = "executionlayer";

pub const EXECUTE_TYPE: &str = "executionengine/Execute";
pub const TRANSFER_TYPE: &str = "executionengine/Transfer";

/// Named payment contract used for transfers.
pub const STANDARD_PAYMENT: &str = "standard_payment";

const ACCOUNT_KEY_LENGTH: usize = 32;

/// A message as delivered by the router, before decoding.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub route: String,
    pub msg_type: String,
    /// JSON body
    #[serde_as(as = "Hex")]
    pub value: Vec<u8>,
}

impl RawMessage {
    pub fn new(msg_type: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            route: ROUTER_KEY.to_string(),
            msg_type: msg_type.into(),
            value,
        }
    }

    /// Wrap a typed message with its route and tag.
    pub fn encode(msg: &ExecutionMsg) -> Result<Self, ExecutionLayerError> {
        let (msg_type, value) = match msg {
            ExecutionMsg::Execute(m) => (EXECUTE_TYPE, serde_json::to_vec(m)),
            ExecutionMsg::Transfer(m) => (TRANSFER_TYPE, serde_json::to_vec(m)),
        };
        let value = value.map_err(|e| ExecutionLayerError::InvalidMessage(e.to_string()))?;
        Ok(Self::new(msg_type, value))
    }
}

/// Run arbitrary session code, paid for by the payment program.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgExecute {
    /// Free-form label of the contract being called
    #[serde(default)]
    pub contract_address: String,
    /// Public key of the deploying account
    #[serde_as(as = "Hex")]
    pub exec_address: Vec<u8>,
    pub session: Program,
    pub payment: Program,
    pub gas_price: u64,
}

/// Move tokens between two accounts through a stored transfer contract.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgTransfer {
    #[serde_as(as = "Hex")]
    pub contract_address: Vec<u8>,
    #[serde_as(as = "Hex")]
    pub from_address: Vec<u8>,
    #[serde_as(as = "Hex")]
    pub to_address: Vec<u8>,
    pub amount: u64,
    pub fee: u64,
    pub gas_price: u64,
}

#[serde_as]
#[derive(Serialize)]
struct TransferArgs<'a> {
    #[serde_as(as = "Hex")]
    to: &'a [u8],
    amount: u64,
}

#[derive(Serialize)]
struct PaymentArgs {
    fee: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionMsg {
    Execute(MsgExecute),
    Transfer(MsgTransfer),
}

impl ExecutionMsg {
    pub fn decode(raw: &RawMessage) -> Result<Self, ExecutionLayerError> {
        if raw.route != ROUTER_KEY {
            return Err(ExecutionLayerError::UnrecognizedMessage(format!(
                "route {:?}",
                raw.route
            )));
        }
        let invalid = |e: serde_json::Error| ExecutionLayerError::InvalidMessage(e.to_string());
        match raw.msg_type.as_str() {
            EXECUTE_TYPE => serde_json::from_slice(&raw.value)
                .map(Self::Execute)
                .map_err(invalid),
            TRANSFER_TYPE => serde_json::from_slice(&raw.value)
                .map(Self::Transfer)
                .map_err(invalid),
            other => Err(ExecutionLayerError::UnrecognizedMessage(other.to_string())),
        }
    }

    pub fn msg_type(&self) -> &'static str {
        match self {
            Self::Execute(_) => EXECUTE_TYPE,
            Self::Transfer(_) => TRANSFER_TYPE,
        }
    }

    /// Stateless checks.
    pub fn validate_basic(&self) -> Result<(), ExecutionLayerError> {
        match self {
            Self::Execute(m) => check_account("exec_address", &m.exec_address),
            Self::Transfer(m) => {
                check_account("from_address", &m.from_address)?;
                check_account("to_address", &m.to_address)?;
                if m.contract_address.is_empty() {
                    return Err(ExecutionLayerError::InvalidMessage(
                        "contract_address is empty".into(),
                    ));
                }
                if m.amount == 0 {
                    return Err(ExecutionLayerError::InvalidMessage(
                        "transfer amount is zero".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Account that signs the resulting deploy.
    pub fn account(&self) -> &[u8] {
        match self {
            Self::Execute(m) => &m.exec_address,
            Self::Transfer(m) => &m.from_address,
        }
    }

    /// The deploy this message turns into. The block time is the deploy timestamp.
    pub fn into_deploy(
        self,
        block_time: u64,
        chain_name: &str,
    ) -> Result<DeployDescriptor, ExecutionLayerError> {
        match self {
            Self::Execute(m) => Ok(DeployDescriptor {
                account: m.exec_address,
                timestamp: block_time,
                gas_price: m.gas_price,
                chain_name: chain_name.to_string(),
                session: m.session,
                payment: m.payment,
            }),
            Self::Transfer(m) => {
                let session_args = json_args(&TransferArgs {
                    to: &m.to_address,
                    amount: m.amount,
                })?;
                let payment_args = json_args(&PaymentArgs { fee: m.fee })?;
                Ok(DeployDescriptor {
                    account: m.from_address,
                    timestamp: block_time,
                    gas_price: m.gas_price,
                    chain_name: chain_name.to_string(),
                    session: Program {
                        code: ContractCode::Hash(m.contract_address),
                        args: session_args,
                    },
                    payment: Program {
                        code: ContractCode::Name(STANDARD_PAYMENT.to_string()),
                        args: payment_args,
                    },
                })
            }
        }
    }

    /// Event attributes describing the message.
    pub fn attributes(&self) -> Vec<(String, String)> {
        let mut attrs = vec![("msg_type".to_string(), self.msg_type().to_string())];
        match self {
            Self::Execute(m) => {
                attrs.push(("contract_address".into(), m.contract_address.clone()));
                attrs.push(("exec_address".into(), hex::encode(&m.exec_address)));
                attrs.push(("gas_price".into(), m.gas_price.to_string()));
            }
            Self::Transfer(m) => {
                attrs.push(("contract_address".into(), hex::encode(&m.contract_address)));
                attrs.push(("from_address".into(), hex::encode(&m.from_address)));
                attrs.push(("to_address".into(), hex::encode(&m.to_address)));
                attrs.push(("amount".into(), m.amount.to_string()));
                attrs.push(("fee".into(), m.fee.to_string()));
                attrs.push(("gas_price".into(), m.gas_price.to_string()));
            }
        }
        attrs
    }
}

fn json_args<T: Serialize>(args: &T) -> Result<Vec<u8>, ExecutionLayerError> {
    serde_json::to_vec(args).map_err(|e| ExecutionLayerError::InvalidMessage(e.to_string()))
}

fn check_account(field: &str, bytes: &[u8]) -> Result<(), ExecutionLayerError> {
    if bytes.is_empty() {
        return Err(ExecutionLayerError::InvalidMessage(format!("{field} is empty")));
    }
    if bytes.len() != ACCOUNT_KEY_LENGTH {
        return Err(ExecutionLayerError::InvalidMessage(format!(
            "{field} must be {ACCOUNT_KEY_LENGTH} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

/// Result codes reported back to the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ResultCode {
    Ok = 0,
    /// Bookkeeping failure, timeout or abandoned block
    Internal = 1,
    /// Undecodable, unknown or invalid message
    UnknownRequest = 6,
    /// The engine rejected or failed the deploy
    ExecutionFailed = 101,
}

impl ResultCode {
    pub fn for_error(err: &ExecutionLayerError) -> Self {
        match err {
            ExecutionLayerError::UnrecognizedMessage(_) | ExecutionLayerError::InvalidMessage(_) => {
                Self::UnknownRequest
            }
            ExecutionLayerError::Engine(_) | ExecutionLayerError::MissingPreState(_) => {
                Self::ExecutionFailed
            }
            _ => Self::Internal,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

/// What the handler reports for one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResult {
    pub code: ResultCode,
    pub log: String,
    pub events: Vec<Event>,
    pub post_state_hash: Option<StateHash>,
}

impl MessageResult {
    pub fn success(post_state_hash: StateHash, attributes: Vec<(String, String)>) -> Self {
        Self {
            code: ResultCode::Ok,
            log: String::new(),
            events: vec![Event {
                kind: ROUTER_KEY.to_string(),
                attributes,
            }],
            post_state_hash: Some(post_state_hash),
        }
    }

    pub fn failure(err: &ExecutionLayerError) -> Self {
        Self {
            code: ResultCode::for_error(err),
            log: err.to_string(),
            events: Vec::new(),
            post_state_hash: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code.is_ok()
    }
}
