//! Chain specification
//!
//! Loads the genesis chain-spec TOML and turns it into a [`GenesisConfig`]:
//!
//! ```toml
//! [genesis]
//! name = "test-chain"
//! timestamp = 1568805354071
//! protocol-version = "1.0.0"
//! mint-code-path = "mint_install.wasm"
//! pos-code-path = "pos_install.wasm"
//! initial-accounts-path = "accounts.csv"
//!
//! [wasm-costs]
//! regular = 1
//! # ... nine more fields
//!
//! [deploys]
//! max-ttl-millis = 86400000
//! max-dependencies = 10
//! ```
//!
//! Relative paths are resolved against the directory of the chain-spec file.

pub mod accounts;
pub mod wire;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};
use std::path::{Path, PathBuf};
use toml::{Table, Value};

use crate::domain::errors::ChainSpecError;
use crate::domain::value_objects::ProtocolVersion;

pub use accounts::{parse_accounts, render_accounts, Amount, GenesisAccount, PublicKey};
pub use wire::ChainSpecGenesisConfig;

/// Wasm execution cost table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WasmCosts {
    pub regular: u32,
    pub div_multiplier: u32,
    pub mul_multiplier: u32,
    pub mem_multiplier: u32,
    pub mem_initial_pages: u32,
    pub mem_grow_per_page: u32,
    pub mem_copy_per_byte: u32,
    pub max_stack_height: u32,
    pub opcodes_multiplier: u32,
    pub opcodes_divisor: u32,
}

/// Deploy acceptance limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeployConfig {
    pub max_ttl_millis: u64,
    pub max_dependencies: u32,
}

/// The `[genesis]` table with paths already resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisTable {
    pub name: String,
    pub timestamp: u64,
    pub protocol_version: ProtocolVersion,
    pub mint_code_path: PathBuf,
    pub pos_code_path: PathBuf,
    pub initial_accounts_path: PathBuf,
}

/// A parsed chain-spec file. Installer programs and accounts are not read yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainSpec {
    pub genesis: GenesisTable,
    pub wasm_costs: WasmCosts,
    pub deploys: DeployConfig,
}

/// Everything the engine needs to create the genesis state.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub name: String,
    pub timestamp: u64,
    pub protocol_version: ProtocolVersion,
    #[serde_as(as = "Hex")]
    pub mint_installer: Vec<u8>,
    #[serde_as(as = "Hex")]
    pub pos_installer: Vec<u8>,
    pub accounts: Vec<GenesisAccount>,
    pub wasm_costs: WasmCosts,
    pub deploy_config: DeployConfig,
}

impl ChainSpec {
    /// Read and parse a chain-spec file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ChainSpecError> {
        let path = path.as_ref();
        let content = read_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base_dir)
    }

    /// Parse chain-spec TOML, resolving relative paths against `base_dir`.
    pub fn parse(content: &str, base_dir: &Path) -> Result<Self, ChainSpecError> {
        let root: Table =
            toml::from_str(content).map_err(|e| ChainSpecError::Toml(e.to_string()))?;

        let genesis = table(&root, "genesis")?;
        let protocol_version = string(genesis, "protocol-version")?.parse::<ProtocolVersion>()?;
        let genesis = GenesisTable {
            name: string(genesis, "name")?.to_string(),
            timestamp: unsigned(genesis, "timestamp")?,
            protocol_version,
            mint_code_path: resolve(base_dir, string(genesis, "mint-code-path")?),
            pos_code_path: resolve(base_dir, string(genesis, "pos-code-path")?),
            initial_accounts_path: resolve(base_dir, string(genesis, "initial-accounts-path")?),
        };

        let costs = table(&root, "wasm-costs")?;
        let wasm_costs = WasmCosts {
            regular: narrow(costs, "regular")?,
            div_multiplier: narrow(costs, "div-multiplier")?,
            mul_multiplier: narrow(costs, "mul-multiplier")?,
            mem_multiplier: narrow(costs, "mem-multiplier")?,
            mem_initial_pages: narrow(costs, "mem-initial-pages")?,
            mem_grow_per_page: narrow(costs, "mem-grow-per-page")?,
            mem_copy_per_byte: narrow(costs, "mem-copy-per-byte")?,
            max_stack_height: narrow(costs, "max-stack-height")?,
            opcodes_multiplier: narrow(costs, "opcodes-multiplier")?,
            opcodes_divisor: narrow(costs, "opcodes-divisor")?,
        };

        let deploys = table(&root, "deploys")?;
        let deploys = DeployConfig {
            max_ttl_millis: unsigned(deploys, "max-ttl-millis")?,
            max_dependencies: narrow(deploys, "max-dependencies")?,
        };

        Ok(Self {
            genesis,
            wasm_costs,
            deploys,
        })
    }

    /// Read installer programs and accounts into a full genesis configuration.
    pub fn into_genesis_config(self) -> Result<GenesisConfig, ChainSpecError> {
        let mint_installer = read_bytes(&self.genesis.mint_code_path)?;
        let pos_installer = read_bytes(&self.genesis.pos_code_path)?;
        let accounts = parse_accounts(&read_string(&self.genesis.initial_accounts_path)?)?;

        Ok(GenesisConfig {
            name: self.genesis.name,
            timestamp: self.genesis.timestamp,
            protocol_version: self.genesis.protocol_version,
            mint_installer,
            pos_installer,
            accounts,
            wasm_costs: self.wasm_costs,
            deploy_config: self.deploys,
        })
    }
}

impl GenesisConfig {
    /// Load a chain-spec file and everything it points at.
    pub fn from_chain_spec(path: impl AsRef<Path>) -> Result<Self, ChainSpecError> {
        ChainSpec::load(path)?.into_genesis_config()
    }
}

fn table<'a>(root: &'a Table, name: &str) -> Result<&'a Table, ChainSpecError> {
    match root.get(name) {
        None => Err(ChainSpecError::MissingKey(name.to_string())),
        Some(value) => value.as_table().ok_or_else(|| invalid(name, "expected a table")),
    }
}

fn field<'a>(table: &'a Table, key: &str) -> Result<&'a Value, ChainSpecError> {
    table
        .get(key)
        .ok_or_else(|| ChainSpecError::MissingKey(key.to_string()))
}

fn string<'a>(table: &'a Table, key: &str) -> Result<&'a str, ChainSpecError> {
    field(table, key)?
        .as_str()
        .ok_or_else(|| invalid(key, "expected a string"))
}

fn unsigned(table: &Table, key: &str) -> Result<u64, ChainSpecError> {
    let value = field(table, key)?
        .as_integer()
        .ok_or_else(|| invalid(key, "expected an integer"))?;
    u64::try_from(value).map_err(|_| invalid(key, "must not be negative"))
}

fn narrow(table: &Table, key: &str) -> Result<u32, ChainSpecError> {
    u32::try_from(unsigned(table, key)?).map_err(|_| invalid(key, "does not fit in 32 bits"))
}

fn invalid(key: &str, message: &str) -> ChainSpecError {
    ChainSpecError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn resolve(base_dir: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, ChainSpecError> {
    std::fs::read(path).map_err(|e| ChainSpecError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn read_string(path: &Path) -> Result<String, ChainSpecError> {
    std::fs::read_to_string(path).map_err(|e| ChainSpecError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manifest() {
        let spec = ChainSpec::parse(fixtures::MANIFEST, Path::new("/etc/chain")).unwrap();
        assert_eq!(spec.genesis.name, "test-chain");
        assert_eq!(spec.genesis.timestamp, 1568805354071);
        assert_eq!(spec.genesis.protocol_version, ProtocolVersion::new(1, 0, 0));
        assert_eq!(
            spec.genesis.mint_code_path,
            PathBuf::from("/etc/chain/mint_install.wasm")
        );
        assert_eq!(
            spec.wasm_costs,
            WasmCosts {
                regular: 1,
                div_multiplier: 2,
                mul_multiplier: 3,
                mem_multiplier: 4,
                mem_initial_pages: 5,
                mem_grow_per_page: 6,
                mem_copy_per_byte: 7,
                max_stack_height: 8,
                opcodes_multiplier: 9,
                opcodes_divisor: 10,
            }
        );
        assert_eq!(spec.deploys.max_dependencies, 10);
    }

    #[test]
    fn test_missing_key_is_named() {
        let content = fixtures::MANIFEST.replace("opcodes-divisor = 10\n", "");
        assert_eq!(
            ChainSpec::parse(&content, Path::new(".")),
            Err(ChainSpecError::MissingKey("opcodes-divisor".into()))
        );

        let content = fixtures::MANIFEST.replace("[deploys]", "[other]");
        assert_eq!(
            ChainSpec::parse(&content, Path::new(".")),
            Err(ChainSpecError::MissingKey("deploys".into()))
        );
    }

    #[test]
    fn test_bad_protocol_version() {
        let content = fixtures::MANIFEST.replace("\"1.0.0\"", "\"1.0\"");
        assert!(matches!(
            ChainSpec::parse(&content, Path::new(".")),
            Err(ChainSpecError::InvalidProtocolVersion { .. })
        ));
    }

    #[test]
    fn test_negative_cost_rejected() {
        let content = fixtures::MANIFEST.replace("regular = 1", "regular = -1");
        assert!(matches!(
            ChainSpec::parse(&content, Path::new(".")),
            Err(ChainSpecError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_absolute_paths_kept() {
        let content = fixtures::MANIFEST.replace("\"pos_install.wasm\"", "\"/opt/pos.wasm\"");
        let spec = ChainSpec::parse(&content, Path::new("/etc/chain")).unwrap();
        assert_eq!(spec.genesis.pos_code_path, PathBuf::from("/opt/pos.wasm"));
    }

    #[test]
    fn test_full_genesis_config_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_chain_spec(dir.path());
        let config = GenesisConfig::from_chain_spec(&path).unwrap();
        assert_eq!(config.mint_installer, b"mint contract bytes");
        assert_eq!(config.pos_installer, b"pos contract bytes");
        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].balance.to_string(), "500000000");
    }

    #[test]
    fn test_missing_installer_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::write_chain_spec(dir.path());
        std::fs::remove_file(dir.path().join("pos_install.wasm")).unwrap();
        match GenesisConfig::from_chain_spec(&path) {
            Err(ChainSpecError::Io { path, .. }) => assert!(path.ends_with("pos_install.wasm")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}
