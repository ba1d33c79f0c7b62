//! Compiled contract artifacts (Truffle/Hardhat JSON: `abi` + `bytecode`).

use alloy_dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::{Function, JsonAbi};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::ContractCall;
use crate::error::{BenchError, BenchResult, LedgerError};

#[derive(Debug, Clone, Deserialize)]
struct RawArtifact {
    #[serde(rename = "contractName", default)]
    contract_name: String,
    abi: JsonAbi,
    bytecode: String,
}

/// Deployable contract: creation bytecode plus its JSON ABI.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub name: String,
    pub bytecode: Vec<u8>,
    abi: JsonAbi,
}

impl ContractArtifact {
    pub fn load(path: &Path) -> BenchResult<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            BenchError::InvalidParameter(format!(
                "cannot read contract artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> BenchResult<Self> {
        let artifact: RawArtifact = serde_json::from_str(raw).map_err(|e| {
            BenchError::InvalidParameter(format!("malformed contract artifact: {}", e))
        })?;

        let bytecode = hex::decode(artifact.bytecode.trim_start_matches("0x")).map_err(|e| {
            BenchError::InvalidParameter(format!("artifact bytecode is not hex: {}", e))
        })?;
        if bytecode.is_empty() {
            return Err(BenchError::InvalidParameter(format!(
                "artifact {} has no creation bytecode",
                artifact.contract_name
            )));
        }

        Ok(Self {
            name: artifact.contract_name,
            bytecode,
            abi: artifact.abi,
        })
    }

    /// Looks up `name` taking `arity` arguments, so overloads resolve by
    /// argument count.
    pub fn function(&self, name: &str, arity: usize) -> BenchResult<&Function> {
        self.abi
            .function(name)
            .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
            .ok_or_else(|| {
                LedgerError::Abi {
                    function: name.to_string(),
                    reason: format!("no function with {} inputs in {}", arity, self.name),
                }
                .into()
            })
    }

    /// Selector followed by the encoded arguments of `call`.
    pub fn encode_call(&self, call: &ContractCall) -> BenchResult<Vec<u8>> {
        let function = self.function(call.method, call.args.len())?;
        let abi_error = |reason: String| LedgerError::Abi {
            function: function.signature(),
            reason,
        };

        let mut values = Vec::with_capacity(call.args.len());
        for (param, arg) in function.inputs.iter().zip(&call.args) {
            let ty = param.resolve().map_err(|e| abi_error(e.to_string()))?;
            values.push(narrow(&ty, arg.clone()).map_err(abi_error)?);
        }
        Ok(function
            .abi_encode_input(&values)
            .map_err(|e| abi_error(e.to_string()))?)
    }
}

/// Fits `value` to the slot type `ty`: integers take the slot's width and
/// decimal strings in numeric slots are parsed, the way web3 accepts them.
fn narrow(ty: &DynSolType, value: DynSolValue) -> Result<DynSolValue, String> {
    match (ty, value) {
        (DynSolType::Uint(bits), DynSolValue::Uint(v, _)) if v.bit_len() <= *bits => {
            Ok(DynSolValue::Uint(v, *bits))
        }
        (DynSolType::Uint(_) | DynSolType::Int(_), DynSolValue::String(s)) => {
            ty.coerce_str(&s).map_err(|e| e.to_string())
        }
        (DynSolType::Array(inner), DynSolValue::Array(items)) => items
            .into_iter()
            .map(|item| narrow(inner, item))
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Array),
        (DynSolType::FixedArray(inner, len), DynSolValue::Array(items) | DynSolValue::FixedArray(items))
            if items.len() == *len =>
        {
            items
                .into_iter()
                .map(|item| narrow(inner, item))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        (DynSolType::Tuple(types), DynSolValue::Tuple(items)) if types.len() == items.len() => types
            .iter()
            .zip(items)
            .map(|(ty, item)| narrow(ty, item))
            .collect::<Result<Vec<_>, _>>()
            .map(DynSolValue::Tuple),
        (ty, value) if ty.matches(&value) => Ok(value),
        (ty, value) => Err(format!("{:?} cannot encode as {}", value, ty.sol_type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{keccak256, U256};

    const ARTIFACT: &str = r#"{
        "contractName": "Brick",
        "bytecode": "0x6080604052",
        "abi": [
            {"type": "constructor", "inputs": [], "stateMutability": "nonpayable"},
            {"type": "function", "name": "fundWatchtower",
             "inputs": [{"name": "idx", "type": "uint8"}],
             "outputs": [], "stateMutability": "payable"},
            {"type": "function", "name": "watchtowerClaimState",
             "inputs": [
                {"name": "claim", "type": "tuple", "components": [
                    {"name": "autoIncrement", "type": "uint16"},
                    {"name": "aliceSig", "type": "bytes"},
                    {"name": "ingridSig", "type": "bytes"}
                ]},
                {"name": "idx", "type": "uint256"}
             ],
             "outputs": [], "stateMutability": "nonpayable"},
            {"type": "event", "name": "Opened", "inputs": [], "anonymous": false}
        ]
    }"#;

    fn uint(value: u64) -> DynSolValue {
        DynSolValue::Uint(U256::from(value), 256)
    }

    fn brick() -> ContractArtifact {
        ContractArtifact::from_json(ARTIFACT).unwrap()
    }

    #[test]
    fn resolves_functions_and_signatures() {
        let artifact = brick();
        assert_eq!(artifact.name, "Brick");
        assert_eq!(artifact.bytecode, vec![0x60, 0x80, 0x60, 0x40, 0x52]);

        let claim = artifact.function("watchtowerClaimState", 2).unwrap();
        assert_eq!(claim.signature(), "watchtowerClaimState((uint16,bytes,bytes),uint256)");
        assert!(artifact.function("Opened", 0).is_err());
        assert!(artifact.function("fundWatchtower", 2).is_err());
    }

    #[test]
    fn calldata_starts_with_selector() {
        let call = ContractCall::new("fundWatchtower", vec![uint(4)]);
        let data = brick().encode_call(&call).unwrap();
        assert_eq!(&data[..4], &keccak256("fundWatchtower(uint8)")[..4]);
        assert_eq!(data.len(), 36);
        assert_eq!(data[35], 4);
    }

    #[test]
    fn claim_tuple_is_encoded_behind_an_offset() {
        let claim = DynSolValue::Tuple(vec![
            uint(3),
            DynSolValue::Bytes(vec![1; 65]),
            DynSolValue::Bytes(vec![2; 65]),
        ]);
        let call = ContractCall::new("watchtowerClaimState", vec![claim, uint(2)]);
        let data = brick().encode_call(&call).unwrap();

        // head: tuple offset then index; tail: sequence, two offsets, two
        // length-prefixed 65-byte signatures padded to 96 bytes
        assert_eq!(data[35], 0x40);
        assert_eq!(data[67], 2);
        assert_eq!(data[99], 3);
        assert_eq!(data.len(), 4 + 2 * 32 + 3 * 32 + 2 * (32 + 96));
    }

    #[test]
    fn decimal_strings_fill_numeric_slots() {
        let artifact = brick();
        let from_string = ContractCall::new("fundWatchtower", vec![DynSolValue::String("4".into())]);
        let from_number = ContractCall::new("fundWatchtower", vec![uint(4)]);
        assert_eq!(
            artifact.encode_call(&from_string).unwrap(),
            artifact.encode_call(&from_number).unwrap()
        );
    }

    #[test]
    fn values_wider_than_the_slot_are_rejected() {
        let call = ContractCall::new("fundWatchtower", vec![uint(256)]);
        assert!(matches!(
            brick().encode_call(&call),
            Err(BenchError::Ledger(LedgerError::Abi { .. }))
        ));
    }

    #[test]
    fn tuple_arity_must_match_components() {
        let claim = DynSolValue::Tuple(vec![uint(3), DynSolValue::Bytes(vec![])]);
        let call = ContractCall::new("watchtowerClaimState", vec![claim, uint(0)]);
        let err = brick().encode_call(&call).unwrap_err();
        assert!(err.to_string().contains("watchtowerClaimState((uint16,bytes,bytes),uint256)"));
    }

    #[test]
    fn rejects_artifact_without_bytecode() {
        let raw = r#"{"contractName": "Empty", "abi": [], "bytecode": "0x"}"#;
        assert!(matches!(
            ContractArtifact::from_json(raw),
            Err(BenchError::InvalidParameter(_))
        ));
    }
}
