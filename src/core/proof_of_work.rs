use crate::core::Block;
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::{debug, info};
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

/// Leading zero bits a block hash must carry
pub const TARGET_BITS: u32 = 16;

const MAX_NONCE: i64 = i64::MAX;

pub struct ProofOfWork<'a> {
    block: &'a Block,
    tx_digest: Vec<u8>,
    target: BigInt,
}

impl<'a> ProofOfWork<'a> {
    pub fn new_proof_of_work(block: &'a Block) -> ProofOfWork<'a> {
        ProofOfWork {
            block,
            tx_digest: block.hash_transactions(),
            target: Self::target(),
        }
    }

    /// `2^(256 - TARGET_BITS)`; a hash is accepted when strictly below it
    pub fn target() -> BigInt {
        let mut target = BigInt::from(1);
        target.shl_assign(256 - TARGET_BITS);
        target
    }

    /// Recomputes the digest for the block's own nonce and checks it against
    /// both the stored hash and the target.
    pub fn validate(block: &Block) -> bool {
        let pow = ProofOfWork::new_proof_of_work(block);
        let hash = sha256_digest(pow.prepare_data(block.get_nonce()).as_slice());
        hash.as_slice() == block.get_hash() && pow.meets_target(&hash)
    }

    fn meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    /// `prev_hash || tx_digest || difficulty (u32 BE) || nonce (i64 BE)`
    pub fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let pre_block_hash = self.block.get_pre_block_hash();
        let mut data_bytes = Vec::with_capacity(pre_block_hash.len() + self.tx_digest.len() + 12);
        data_bytes.extend(pre_block_hash);
        data_bytes.extend(self.tx_digest.as_slice());
        data_bytes.extend(TARGET_BITS.to_be_bytes());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    /// Searches nonces upward from zero and returns the first `(nonce, hash)`
    /// below the target, or `None` if the nonce space runs out.
    pub fn run(&self) -> Option<(i64, Vec<u8>)> {
        debug!(
            "Mining block with {} transactions",
            self.block.get_transactions().len()
        );
        let mut nonce = 0;
        while nonce < MAX_NONCE {
            let hash = sha256_digest(self.prepare_data(nonce).as_slice());
            if self.meets_target(&hash) {
                info!(
                    "Found nonce {nonce} for hash {}",
                    HEXLOWER.encode(hash.as_slice())
                );
                return Some((nonce, hash));
            }
            nonce += 1;
        }
        None
    }
}
