use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AirdropError;

/// One logical "mint into collection for recipient" request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationDescriptor {
    pub collection_mint: String,
    pub recipient: String,
    pub royalty_bps: u16,
    pub collection_authority: String,
    /// Position of the item in the batch; drives the minted name.
    pub sequence_index: u32,
}

/// Batch-wide accounts shared by every mint: the tree and the fee payer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintTarget {
    pub merkle_tree: String,
    pub payer: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectionKind {
    InvalidAddress,
    InvalidOperation,
    InstructionTooLarge,
}

/// Why a single item was left out of every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub index: usize,
    /// The recipient of the rejected item, as submitted.
    pub address: String,
    pub kind: RejectionKind,
    pub reason: String,
}

/// Per-item lifecycle.
///
/// `Pending -> Validated -> Compiled -> Assigned`; any non-terminal state
/// may move to `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemStatus {
    Pending,
    Validated,
    Compiled,
    Assigned { envelope: usize },
    Rejected,
}

impl ItemStatus {
    fn can_advance_to(&self, next: &ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Pending, ItemStatus::Validated)
                | (ItemStatus::Validated, ItemStatus::Compiled)
                | (ItemStatus::Compiled, ItemStatus::Assigned { .. })
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Assigned { .. } | ItemStatus::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub index: usize,
    pub descriptor: OperationDescriptor,
    status: ItemStatus,
    rejection: Option<Rejection>,
}

impl BatchItem {
    pub fn new(index: usize, descriptor: OperationDescriptor) -> Self {
        Self {
            index,
            descriptor,
            status: ItemStatus::Pending,
            rejection: None,
        }
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        self.rejection.as_ref()
    }

    /// Move one step forward in the lifecycle.
    pub fn advance(&mut self, next: ItemStatus) -> Result<(), AirdropError> {
        if !self.status.can_advance_to(&next) {
            return Err(AirdropError::Lifecycle {
                index: self.index,
                from: format!("{:?}", self.status),
                to: format!("{next:?}"),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark the item rejected. Terminal items are left untouched.
    pub fn reject(&mut self, kind: RejectionKind, reason: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = ItemStatus::Rejected;
        self.rejection = Some(Rejection {
            index: self.index,
            address: self.descriptor.recipient.clone(),
            kind,
            reason: reason.into(),
        });
        true
    }
}

/// An ordered set of items built for one request and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: String,
    items: Vec<BatchItem>,
}

impl Batch {
    pub fn new(descriptors: Vec<OperationDescriptor>) -> Self {
        let id = batch_id(&descriptors);
        let items = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, d)| BatchItem::new(index, d))
            .collect();
        Self { id, items }
    }

    /// Short content hash used to correlate log lines for one batch.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn item_mut(&mut self, index: usize) -> Option<&mut BatchItem> {
        self.items.get_mut(index)
    }

    pub fn rejections(&self) -> Vec<Rejection> {
        self.items
            .iter()
            .filter_map(|item| item.rejection.clone())
            .collect()
    }
}

fn batch_id(descriptors: &[OperationDescriptor]) -> String {
    let mut hasher = Sha256::new();
    for d in descriptors {
        hasher.update(d.collection_mint.as_bytes());
        hasher.update(d.recipient.as_bytes());
        hasher.update(d.sequence_index.to_le_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(seq: u32) -> OperationDescriptor {
        OperationDescriptor {
            collection_mint: "mint".into(),
            recipient: format!("recipient-{seq}"),
            royalty_bps: 500,
            collection_authority: "authority".into(),
            sequence_index: seq,
        }
    }

    #[test]
    fn lifecycle_advances_in_order() {
        let mut item = BatchItem::new(0, descriptor(0));
        item.advance(ItemStatus::Validated).unwrap();
        item.advance(ItemStatus::Compiled).unwrap();
        item.advance(ItemStatus::Assigned { envelope: 2 }).unwrap();
        assert_eq!(item.status(), ItemStatus::Assigned { envelope: 2 });
    }

    #[test]
    fn lifecycle_rejects_skipped_steps() {
        let mut item = BatchItem::new(0, descriptor(0));
        let err = item.advance(ItemStatus::Compiled).unwrap_err();
        assert!(matches!(
            err,
            AirdropError::Lifecycle { index: 0, ref from, ref to } if from == "Pending" && to == "Compiled"
        ));
        assert_eq!(err.status_code(), 500);
        assert!(item.advance(ItemStatus::Assigned { envelope: 0 }).is_err());
        assert_eq!(item.status(), ItemStatus::Pending);
    }

    #[test]
    fn rejected_is_terminal() {
        let mut item = BatchItem::new(3, descriptor(3));
        assert!(item.reject(RejectionKind::InvalidAddress, "bad base58"));
        assert!(!item.reject(RejectionKind::InvalidOperation, "second"));
        assert!(item.advance(ItemStatus::Validated).is_err());

        let rejection = item.rejection().unwrap();
        assert_eq!(rejection.index, 3);
        assert_eq!(rejection.address, "recipient-3");
        assert_eq!(rejection.kind, RejectionKind::InvalidAddress);
    }

    #[test]
    fn batch_id_is_stable_for_same_input() {
        let a = Batch::new(vec![descriptor(0), descriptor(1)]);
        let b = Batch::new(vec![descriptor(0), descriptor(1)]);
        let c = Batch::new(vec![descriptor(1)]);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().len(), 12);
    }

    #[test]
    fn rejections_are_listed_in_item_order() {
        let mut batch = Batch::new((0..4).map(descriptor).collect());
        batch
            .item_mut(2)
            .unwrap()
            .reject(RejectionKind::InvalidAddress, "x");
        batch
            .item_mut(0)
            .unwrap()
            .reject(RejectionKind::InvalidOperation, "y");
        let indices: Vec<usize> = batch.rejections().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn descriptor_uses_camel_case_on_the_wire() {
        let json = serde_json::to_value(descriptor(7)).unwrap();
        assert_eq!(json["collectionMint"], "mint");
        assert_eq!(json["sequenceIndex"], 7);
    }
}
