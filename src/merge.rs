use crate::node::Node;

/// Deep-merge `overlay` on top of `base`.
/// If both sides have a `Map` for the same key, recurse.
/// Otherwise, `overlay`'s value wins; `Null` in the overlay keeps the base.
///
/// Keys match ASCII case-insensitively and keep the base's spelling, so a
/// decoded `pool_size` lands on a declared `pool_size` whatever case the
/// input used.
pub fn deep_merge(base: Node, overlay: Node) -> Node {
    match (base, overlay) {
        (Node::Map(mut entries), Node::Map(overlay)) => {
            for (key, overlay_val) in overlay {
                match entries
                    .iter()
                    .position(|(k, _)| k.eq_ignore_ascii_case(&key))
                {
                    Some(pos) => {
                        let base_val = std::mem::replace(&mut entries[pos].1, Node::Null);
                        entries[pos].1 = deep_merge(base_val, overlay_val);
                    }
                    None => entries.push((key, overlay_val)),
                }
            }
            Node::Map(entries)
        }
        (base, Node::Null) => base,
        (_, overlay) => overlay,
    }
}
