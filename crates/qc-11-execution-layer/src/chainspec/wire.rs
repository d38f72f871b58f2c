//! Genesis request as sent to the execution engine

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use super::accounts::{Amount, GenesisAccount, PublicKey, AMOUNT_BIT_WIDTH};
use super::{DeployConfig, GenesisConfig, WasmCosts};
use crate::domain::errors::ChainSpecError;
use crate::domain::value_objects::ProtocolVersion;

/// Decimal big integer with an explicit bit width.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigInt {
    pub value: String,
    pub bit_width: u32,
}

impl From<Amount> for BigInt {
    fn from(amount: Amount) -> Self {
        Self {
            value: amount.to_string(),
            bit_width: AMOUNT_BIT_WIDTH,
        }
    }
}

impl TryFrom<BigInt> for Amount {
    type Error = ChainSpecError;

    fn try_from(value: BigInt) -> Result<Self, Self::Error> {
        if value.bit_width != AMOUNT_BIT_WIDTH {
            return Err(ChainSpecError::InvalidAmount {
                value: value.value,
                reason: format!("unsupported bit width {}", value.bit_width),
            });
        }
        value.value.parse()
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireGenesisAccount {
    #[serde_as(as = "Hex")]
    pub public_key: Vec<u8>,
    pub balance: BigInt,
    pub bonded_amount: BigInt,
}

/// Engine-side names of the wasm cost fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmCostTable {
    pub regular: u32,
    pub div: u32,
    pub mul: u32,
    pub mem: u32,
    pub initial_mem: u32,
    pub grow_mem: u32,
    pub memcpy: u32,
    pub max_stack_height: u32,
    pub opcodes_mul: u32,
    pub opcodes_div: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTable {
    pub wasm: WasmCostTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDeployConfig {
    pub max_ttl_millis: u64,
    pub max_dependencies: u32,
}

/// `ee_runGenesis` request body.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpecGenesisConfig {
    pub name: String,
    pub timestamp: u64,
    pub protocol_version: ProtocolVersion,
    #[serde_as(as = "Hex")]
    pub mint_installer: Vec<u8>,
    #[serde_as(as = "Hex")]
    pub pos_installer: Vec<u8>,
    pub accounts: Vec<WireGenesisAccount>,
    pub costs: CostTable,
    pub deploy_config: WireDeployConfig,
}

impl From<WasmCosts> for CostTable {
    fn from(c: WasmCosts) -> Self {
        Self {
            wasm: WasmCostTable {
                regular: c.regular,
                div: c.div_multiplier,
                mul: c.mul_multiplier,
                mem: c.mem_multiplier,
                initial_mem: c.mem_initial_pages,
                grow_mem: c.mem_grow_per_page,
                memcpy: c.mem_copy_per_byte,
                max_stack_height: c.max_stack_height,
                opcodes_mul: c.opcodes_multiplier,
                opcodes_div: c.opcodes_divisor,
            },
        }
    }
}

impl From<CostTable> for WasmCosts {
    fn from(table: CostTable) -> Self {
        let w = table.wasm;
        Self {
            regular: w.regular,
            div_multiplier: w.div,
            mul_multiplier: w.mul,
            mem_multiplier: w.mem,
            mem_initial_pages: w.initial_mem,
            mem_grow_per_page: w.grow_mem,
            mem_copy_per_byte: w.memcpy,
            max_stack_height: w.max_stack_height,
            opcodes_multiplier: w.opcodes_mul,
            opcodes_divisor: w.opcodes_div,
        }
    }
}

impl GenesisConfig {
    /// Engine wire form. Account order is preserved.
    pub fn to_wire(&self) -> ChainSpecGenesisConfig {
        ChainSpecGenesisConfig {
            name: self.name.clone(),
            timestamp: self.timestamp,
            protocol_version: self.protocol_version,
            mint_installer: self.mint_installer.clone(),
            pos_installer: self.pos_installer.clone(),
            accounts: self
                .accounts
                .iter()
                .map(|account| WireGenesisAccount {
                    public_key: account.public_key.as_bytes().to_vec(),
                    balance: account.balance.into(),
                    bonded_amount: account.bonded_amount.into(),
                })
                .collect(),
            costs: self.wasm_costs.into(),
            deploy_config: WireDeployConfig {
                max_ttl_millis: self.deploy_config.max_ttl_millis,
                max_dependencies: self.deploy_config.max_dependencies,
            },
        }
    }
}

impl TryFrom<ChainSpecGenesisConfig> for GenesisConfig {
    type Error = ChainSpecError;

    fn try_from(wire: ChainSpecGenesisConfig) -> Result<Self, Self::Error> {
        let accounts = wire
            .accounts
            .into_iter()
            .map(|account| -> Result<GenesisAccount, ChainSpecError> {
                Ok(GenesisAccount {
                    public_key: PublicKey::from_bytes(&account.public_key)?,
                    balance: account.balance.try_into()?,
                    bonded_amount: account.bonded_amount.try_into()?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: wire.name,
            timestamp: wire.timestamp,
            protocol_version: wire.protocol_version,
            mint_installer: wire.mint_installer,
            pos_installer: wire.pos_installer,
            accounts,
            wasm_costs: wire.costs.into(),
            deploy_config: DeployConfig {
                max_ttl_millis: wire.deploy_config.max_ttl_millis,
                max_dependencies: wire.deploy_config.max_dependencies,
            },
        })
    }
}
