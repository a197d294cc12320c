#![forbid(unsafe_code)]

//! FNV-1a state hashing for operation logs and replay diagnostics.

use crate::column::ColumnWidth;
use crate::node::{ContainerRole, FieldNode};

const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0001_0000_01b3;

fn mix(hash: &mut u64, byte: u8) {
    *hash ^= u64::from(byte);
    *hash = hash.wrapping_mul(PRIME);
}

fn mix_bytes(hash: &mut u64, bytes: &[u8]) {
    for byte in bytes {
        mix(hash, *byte);
    }
}

fn mix_u64(hash: &mut u64, value: u64) {
    mix_bytes(hash, &value.to_le_bytes());
}

fn mix_bool(hash: &mut u64, value: bool) {
    mix(hash, u8::from(value));
}

fn mix_str(hash: &mut u64, value: &str) {
    mix_u64(hash, value.len() as u64);
    mix_bytes(hash, value.as_bytes());
}

/// Serialized form of the opaque parts; structural parts are mixed directly.
fn mix_json<T: serde::Serialize>(hash: &mut u64, value: &T) {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            mix(hash, 1);
            mix_u64(hash, bytes.len() as u64);
            mix_bytes(hash, &bytes);
        }
        Err(_) => mix(hash, 0),
    }
}

fn role_byte(role: Option<ContainerRole>) -> u8 {
    match role {
        None => 0,
        Some(ContainerRole::Row) => 1,
        Some(ContainerRole::Column) => 2,
        Some(ContainerRole::PlainContainer) => 3,
    }
}

fn width_byte(width: ColumnWidth) -> u8 {
    width.units()
}

/// Deterministic hash over nodes in the given order.
pub(crate) fn nodes_state_hash<'a>(nodes: impl IntoIterator<Item = &'a FieldNode>) -> u64 {
    let mut hash = OFFSET_BASIS;
    let mut count = 0u64;
    for node in nodes {
        count += 1;
        mix_str(&mut hash, node.id.as_str());
        mix_str(&mut hash, node.kind().as_str());
        mix(&mut hash, role_byte(node.container_role()));
        mix_u64(&mut hash, node.child_ids().len() as u64);
        for child in node.child_ids() {
            mix_str(&mut hash, child.as_str());
        }
        match node.column_hint {
            Some(hint) => {
                mix(&mut hash, 1);
                mix(&mut hash, width_byte(hint.width));
                mix_bool(&mut hash, hint.pinned);
            }
            None => mix(&mut hash, 0),
        }
        mix_json(&mut hash, &node.payload);
        mix_json(&mut hash, &node.attributes);
    }
    mix_u64(&mut hash, count);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnHint;
    use crate::node::FieldKind;
    use formkit_core::FieldId;

    fn text(raw: &str) -> FieldNode {
        FieldNode::from_palette(FieldKind::Text, FieldId::new(raw).expect("valid id"))
    }

    #[test]
    fn order_changes_hash() {
        let a = text("a");
        let b = text("b");
        assert_ne!(nodes_state_hash([&a, &b]), nodes_state_hash([&b, &a]));
    }

    #[test]
    fn pin_flag_changes_hash() {
        let auto = text("a").with_column_hint(ColumnHint::auto(ColumnWidth::Half));
        let pinned = text("a").with_column_hint(ColumnHint::pinned(ColumnWidth::Half));
        assert_ne!(nodes_state_hash([&auto]), nodes_state_hash([&pinned]));
    }

    #[test]
    fn hash_is_stable() {
        let a = text("a");
        assert_eq!(nodes_state_hash([&a]), nodes_state_hash([&a.clone()]));
        assert_ne!(nodes_state_hash([&a]), nodes_state_hash(std::iter::empty()));
    }
}
