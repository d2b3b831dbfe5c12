//! Chip metadata collaborator contract (§4.5, §6).
//!
//! Chip/DA lookup tables are explicitly out of scope (§1) — this crate
//! depends only on the shape of the data, mirroring how
//! [`crate::firehose::vip::VipTableSource`] keeps file sourcing external to
//! the protocol engine.

/// Per-chip defaults the bootloader session needs to drive a handshake it
/// cannot infer from the wire alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipMeta {
    pub fdl1_load_addr: u32,
    pub fdl2_load_addr: u32,
    pub signature_bypass_exec_addr: Option<u32>,
}

/// A pure lookup from hardware code to [`ChipMeta`]. No implementation
/// beyond a trivial test double ships in this crate.
pub trait ChipMetaProvider {
    fn meta(&self, hw_code: u32) -> Option<ChipMeta>;
}

/// A fixed single-entry provider, useful for tests and as a minimal
/// reference implementation of the trait.
pub struct StaticChipMeta {
    pub hw_code: u32,
    pub meta: ChipMeta,
}

impl ChipMetaProvider for StaticChipMeta {
    fn meta(&self, hw_code: u32) -> Option<ChipMeta> {
        if hw_code == self.hw_code {
            Some(self.meta)
        } else {
            None
        }
    }
}
