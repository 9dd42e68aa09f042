#![no_main]

use heirloom_core::{Address, Digest};
use heirloom_oracle::OracleRegistry;
use libfuzzer_sys::fuzz_target;
use secp256k1::{Secp256k1, SecretKey};

const ADMIN: Address = Address::from_low_u8(0xAD);
const ORACLE: Address = Address::from_low_u8(0x0C);

fuzz_target!(|data: &[u8]| {
    // Arbitrary signature bytes must be rejected cleanly, never panic.
    let secp = Secp256k1::new();
    let sk = SecretKey::from_slice(&[0x01; 32]).unwrap();
    let mut registry = OracleRegistry::new(ADMIN);
    registry
        .add_oracle(ADMIN, ORACLE, sk.public_key(&secp), 0)
        .unwrap();

    let proof = Digest::sha256(data);
    let _ = registry.attest(1, ORACLE, proof, data, 0);
});
