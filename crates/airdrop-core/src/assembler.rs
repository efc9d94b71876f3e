//! Greedy first-fit packing of compiled instructions into envelopes.
//!
//! Sizes are measured, not estimated: each candidate envelope is compiled
//! and serialized with a placeholder anchor and empty signature slots, which
//! have the same width as the real ones.

use chain_sol::transaction::{
    compile_legacy_message, compile_v0_message, serialize_transaction, MessageVersion,
    SolInstruction, SolMessage, SolTransaction,
};
use tracing::{debug, warn};

use crate::compiler::CompiledItem;
use crate::config::TransactionLimits;
use crate::error::AirdropError;
use crate::registry::CompactionTable;
use crate::types::{Rejection, RejectionKind};

/// Instructions that travel together in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub index: usize,
    pub fee_payer: [u8; 32],
    pub instructions: Vec<SolInstruction>,
    /// Batch indices of the items carried, in placement order.
    pub items: Vec<usize>,
    pub table: Option<CompactionTable>,
    pub serialized_size: usize,
    pub account_count: usize,
}

impl Envelope {
    pub fn version(&self) -> MessageVersion {
        match self.table {
            Some(_) => MessageVersion::V0,
            None => MessageVersion::Legacy,
        }
    }
}

/// Size and lock count of a fully serialized candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub size: usize,
    pub accounts: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub envelopes: Vec<Envelope>,
    pub rejections: Vec<Rejection>,
}

pub struct BatchAssembler {
    limits: TransactionLimits,
    fee_payer: [u8; 32],
    table: Option<CompactionTable>,
}

impl BatchAssembler {
    pub fn new(limits: TransactionLimits, fee_payer: [u8; 32], table: Option<CompactionTable>) -> Self {
        Self {
            limits,
            fee_payer,
            table,
        }
    }

    /// Compile `instructions` for `fee_payer` against the optional table.
    pub fn compile_message(
        instructions: &[SolInstruction],
        fee_payer: &[u8; 32],
        table: Option<&CompactionTable>,
        anchor: &[u8; 32],
    ) -> Result<SolMessage, AirdropError> {
        let message = match table {
            Some(table) => {
                compile_v0_message(instructions, fee_payer, anchor, &[table.to_lookup_account()])?
            }
            None => compile_legacy_message(instructions, fee_payer, anchor)?,
        };
        Ok(message)
    }

    pub fn measure(&self, instructions: &[SolInstruction]) -> Result<Measurement, AirdropError> {
        let message =
            Self::compile_message(instructions, &self.fee_payer, self.table.as_ref(), &[0u8; 32])?;
        let accounts = message.total_account_count();
        let size = serialize_transaction(&SolTransaction::new_unsigned(message))?.len();
        Ok(Measurement { size, accounts })
    }

    fn fits(&self, m: &Measurement) -> bool {
        m.size <= self.limits.max_transaction_size && m.accounts <= self.limits.max_account_locks
    }

    /// Pack `items` in order. Same input and table, same partition.
    pub fn assemble(&self, items: Vec<CompiledItem>) -> Assembly {
        let mut assembly = Assembly::default();
        let mut open: Vec<CompiledItem> = Vec::new();
        let mut open_measure: Option<Measurement> = None;

        for item in items {
            let mut candidate: Vec<SolInstruction> =
                open.iter().map(|c| c.instruction.clone()).collect();
            candidate.push(item.instruction.clone());

            if let Some(m) = self.try_measure(&candidate) {
                open.push(item);
                open_measure = Some(m);
                continue;
            }

            // Does not fit next to the open envelope. Either it fits alone
            // and starts a fresh one, or it can never be sent.
            match self.try_measure(std::slice::from_ref(&item.instruction)) {
                Some(alone) => {
                    self.close(&mut assembly, std::mem::take(&mut open), open_measure);
                    open.push(item);
                    open_measure = Some(alone);
                }
                None => {
                    let reason = self.too_large_reason(&item.instruction);
                    warn!(index = item.index, %reason, "instruction exceeds envelope limits");
                    assembly.rejections.push(Rejection {
                        index: item.index,
                        address: String::new(),
                        kind: RejectionKind::InstructionTooLarge,
                        reason,
                    });
                }
            }
        }
        self.close(&mut assembly, open, open_measure);

        debug!(
            envelopes = assembly.envelopes.len(),
            rejected = assembly.rejections.len(),
            "assembled envelopes"
        );
        assembly
    }

    /// `Some` when the candidate compiles and stays within both ceilings.
    fn try_measure(&self, instructions: &[SolInstruction]) -> Option<Measurement> {
        self.measure(instructions).ok().filter(|m| self.fits(m))
    }

    fn too_large_reason(&self, instruction: &SolInstruction) -> String {
        match self.measure(std::slice::from_ref(instruction)) {
            Ok(m) => format!(
                "alone it needs {} bytes and {} accounts, limits are {} bytes and {} accounts",
                m.size, m.accounts, self.limits.max_transaction_size, self.limits.max_account_locks
            ),
            Err(e) => e.to_string(),
        }
    }

    fn close(&self, assembly: &mut Assembly, items: Vec<CompiledItem>, measure: Option<Measurement>) {
        let Some(measure) = measure else {
            return;
        };
        if items.is_empty() {
            return;
        }
        let index = assembly.envelopes.len();
        let (indices, instructions): (Vec<usize>, Vec<SolInstruction>) =
            items.into_iter().map(|c| (c.index, c.instruction)).unzip();

        debug!(
            envelope = index,
            items = indices.len(),
            size = measure.size,
            accounts = measure.accounts,
            "closed envelope"
        );

        assembly.envelopes.push(Envelope {
            index,
            fee_payer: self.fee_payer,
            instructions,
            items: indices,
            table: self.table.clone(),
            serialized_size: measure.size,
            account_count: measure.accounts,
        });
    }
}
