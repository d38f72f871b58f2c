//! # Integration Fixtures
//!
//! A node wired over the in-memory store and the deterministic engine, plus
//! chain-spec files on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use node_runtime::handlers::ConsensusBridge;
use qc_11_execution_layer::domain::deploy::{ContractCode, Program};
use qc_11_execution_layer::ipc::{ExecutionMsg, MsgExecute, MsgTransfer};
use qc_11_execution_layer::{
    BlockHeader, BlockId, DeterministicEngine, ExecutionLayerConfig, ExecutionLayerHandler,
    ExecutionLayerService, InMemoryKVStore, RawMessage, StateHashKeeper,
};

pub const MANIFEST: &str = r#"
[genesis]
name = "integration-chain"
timestamp = 1568805354071
protocol-version = "1.0.0"
mint-code-path = "mint_install.wasm"
pos-code-path = "pos_install.wasm"
initial-accounts-path = "accounts.csv"

[wasm-costs]
regular = 1
div-multiplier = 16
mul-multiplier = 4
mem-multiplier = 2
mem-initial-pages = 4096
mem-grow-per-page = 8192
mem-copy-per-byte = 1
max-stack-height = 65536
opcodes-multiplier = 3
opcodes-divisor = 8

[deploys]
max-ttl-millis = 86400000
max-dependencies = 10
"#;

/// Account [1; 32] with 500000000 and account [2; 32] with 1000000.
pub const ACCOUNTS: &str = "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=,500000000,0\n\
                            \n\
                            AgICAgICAgICAgICAgICAgICAgICAgICAgICAgICAgI=,1000000,0\n";

/// Write the manifest, the installers and the accounts file into `dir`.
pub fn write_chain_spec(dir: &Path) -> std::io::Result<PathBuf> {
    std::fs::write(dir.join("mint_install.wasm"), b"\0asm mint")?;
    std::fs::write(dir.join("pos_install.wasm"), b"\0asm pos")?;
    std::fs::write(dir.join("accounts.csv"), ACCOUNTS)?;
    let path = dir.join("manifest.toml");
    std::fs::write(&path, MANIFEST)?;
    Ok(path)
}

pub struct TestNode {
    pub engine: Arc<DeterministicEngine>,
    pub service: Arc<ExecutionLayerService<InMemoryKVStore>>,
    pub handler: Arc<ExecutionLayerHandler<InMemoryKVStore>>,
    pub bridge: ConsensusBridge<InMemoryKVStore>,
}

impl TestNode {
    pub fn new(config: ExecutionLayerConfig) -> Result<Self, qc_11_execution_layer::ExecutionLayerError> {
        let engine = Arc::new(DeterministicEngine::new());
        let keeper = Arc::new(StateHashKeeper::new(InMemoryKVStore::new()));
        let service = Arc::new(ExecutionLayerService::new(config, engine.clone(), keeper)?);
        let handler = Arc::new(ExecutionLayerHandler::new(Arc::clone(&service)));
        let bridge = ConsensusBridge::new(Arc::clone(&service), Arc::clone(&handler));
        Ok(Self {
            engine,
            service,
            handler,
            bridge,
        })
    }

    pub fn keeper(&self) -> &Arc<StateHashKeeper<InMemoryKVStore>> {
        self.service.keeper()
    }
}

pub fn header(id: &[u8], parent: &[u8], height: u64) -> BlockHeader {
    BlockHeader {
        block_id: BlockId::new(id.to_vec()),
        parent_id: BlockId::new(parent.to_vec()),
        height,
        time: 1_568_805_354_071 + height * 1_000,
    }
}

pub fn execute_msg(label: &str) -> RawMessage {
    let msg = ExecutionMsg::Execute(MsgExecute {
        contract_address: label.to_string(),
        exec_address: vec![1; 32],
        session: Program {
            code: ContractCode::Name(label.to_string()),
            args: vec![],
        },
        payment: Program {
            code: ContractCode::Name("standard_payment".to_string()),
            args: vec![],
        },
        gas_price: 1,
    });
    RawMessage::encode(&msg).unwrap_or_else(|e| panic!("encode {label}: {e}"))
}

pub fn transfer_msg(amount: u64) -> RawMessage {
    let msg = ExecutionMsg::Transfer(MsgTransfer {
        contract_address: vec![7; 32],
        from_address: vec![1; 32],
        to_address: vec![2; 32],
        amount,
        fee: 10,
        gas_price: 1,
    });
    RawMessage::encode(&msg).unwrap_or_else(|e| panic!("encode transfer: {e}"))
}

/// The `deploy_hash` attribute of a successful message result.
pub fn deploy_hash_attr(result: &qc_11_execution_layer::MessageResult) -> Option<String> {
    result
        .events
        .iter()
        .flat_map(|event| event.attributes.iter())
        .find(|(key, _)| key == "deploy_hash")
        .map(|(_, value)| value.clone())
}
