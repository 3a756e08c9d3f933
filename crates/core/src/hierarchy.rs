use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::HierarchyError;
use crate::model::*;

/// Id given to the synthetic root produced for an empty record list.
pub const SYNTHETIC_ROOT: &str = "__root__";

/// Builds an arena tree from flat parent-linked records.
///
/// Leaf aggregates are the raw record values; internal nodes sum their
/// children. Children are ordered by descending height, then descending
/// aggregate, keeping input order on ties.
pub fn build(records: &[RawRecord]) -> Result<Tree, HierarchyError> {
    if records.is_empty() {
        return Ok(synthetic_root());
    }

    let mut index: HashMap<&RecordId, usize> = HashMap::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        if !r.value.is_finite() {
            return Err(HierarchyError::InvalidValue {
                id: r.id.clone(),
                value: r.value,
            });
        }
        if index.insert(&r.id, i).is_some() {
            return Err(HierarchyError::DuplicateId(r.id.clone()));
        }
    }

    let mut root: Option<usize> = None;
    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    for (i, r) in records.iter().enumerate() {
        match &r.parent_id {
            None => {
                if let Some(first) = root {
                    return Err(HierarchyError::MultipleRoots {
                        first: records[first].id.clone(),
                        second: r.id.clone(),
                    });
                }
                root = Some(i);
            }
            Some(pid) => {
                let Some(&p) = index.get(pid) else {
                    return Err(HierarchyError::OrphanParent {
                        id: r.id.clone(),
                        parent: pid.clone(),
                    });
                };
                children_of[p].push(i);
            }
        }
    }

    // Every parent resolves, so a missing root or unreachable records mean a cycle.
    let Some(root) = root else {
        return Err(HierarchyError::Cycle(records[0].id.clone()));
    };

    let mut nodes: Vec<HierarchyNode> = Vec::with_capacity(records.len());
    let mut by_record = HashMap::with_capacity(records.len());
    let mut queue = vec![(root, None::<NodeId>, 0u32)];
    let mut head = 0;
    while head < queue.len() {
        let (ri, parent, depth) = queue[head];
        head += 1;
        let id = NodeId(nodes.len() as u32);
        let rec = &records[ri];
        nodes.push(HierarchyNode {
            id,
            record: rec.id.clone(),
            parent,
            children: Vec::new(),
            depth,
            height: 0,
            value: rec.value,
            aggregate: 0.0,
            attributes: rec.attributes.clone(),
        });
        by_record.insert(rec.id.clone(), id);
        if let Some(p) = parent {
            nodes[p.index()].children.push(id);
        }
        for &c in &children_of[ri] {
            queue.push((c, Some(id), depth + 1));
        }
    }

    if nodes.len() != records.len() {
        let stray = records
            .iter()
            .find(|r| !by_record.contains_key(&r.id))
            .map(|r| r.id.clone())
            .unwrap_or_else(|| records[0].id.clone());
        return Err(HierarchyError::Cycle(stray));
    }

    // Breadth-first insertion means children always sit after their parent.
    for i in (0..nodes.len()).rev() {
        if nodes[i].children.is_empty() {
            nodes[i].aggregate = nodes[i].value;
            continue;
        }
        let (mut sum, mut height) = (0.0, 0);
        for c in &nodes[i].children {
            let child = &nodes[c.index()];
            sum += child.aggregate;
            height = height.max(child.height + 1);
        }
        nodes[i].aggregate = sum;
        nodes[i].height = height;
    }

    for i in 0..nodes.len() {
        let mut children = std::mem::take(&mut nodes[i].children);
        children.sort_by(|a, b| sibling_order(&nodes[a.index()], &nodes[b.index()]));
        nodes[i].children = children;
    }

    tracing::debug!(
        nodes = nodes.len(),
        total = nodes[0].aggregate,
        height = nodes[0].height,
        "hierarchy built"
    );

    Ok(Tree {
        root: NodeId(0),
        nodes,
        by_record,
    })
}

fn sibling_order(a: &HierarchyNode, b: &HierarchyNode) -> Ordering {
    b.height.cmp(&a.height).then_with(|| {
        b.aggregate
            .partial_cmp(&a.aggregate)
            .unwrap_or(Ordering::Equal)
    })
}

fn synthetic_root() -> Tree {
    let record = RecordId::new(SYNTHETIC_ROOT);
    let mut by_record = HashMap::new();
    by_record.insert(record.clone(), NodeId(0));
    Tree {
        root: NodeId(0),
        nodes: vec![HierarchyNode {
            id: NodeId(0),
            record,
            parent: None,
            children: Vec::new(),
            depth: 0,
            height: 0,
            value: 0.0,
            aggregate: 0.0,
            attributes: Attributes::default(),
        }],
        by_record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: u64, parent: Option<u64>, value: f64) -> RawRecord {
        RawRecord::new(id, parent.map(RecordId::from), value)
    }

    fn population() -> Vec<RawRecord> {
        vec![
            rec(1, None, 0.0),
            rec(2, Some(1), 10.0),
            rec(3, Some(1), 30.0),
            rec(4, Some(3), 30.0),
        ]
    }

    #[test]
    fn aggregates_only_leaf_values() {
        let mut records = population();
        // Declared value on an internal node is ignored.
        records[2].value = 1000.0;
        let tree = build(&records).unwrap();
        assert_eq!(tree.root().aggregate, 40.0);
        let b = tree.find_node(&"3".into()).unwrap();
        assert_eq!(b.aggregate, 30.0);
        assert_eq!(b.value, 1000.0);
    }

    #[test]
    fn depth_and_height_follow_nesting() {
        let tree = build(&population()).unwrap();
        let root = tree.root();
        assert_eq!((root.depth, root.height), (0, 2));
        let c = tree.find_node(&"4".into()).unwrap();
        assert_eq!((c.depth, c.height), (2, 0));
        assert_eq!(tree.parent(c.id).unwrap().record, RecordId::from("3"));
    }

    #[test]
    fn children_sorted_by_height_then_value() {
        let records = vec![
            rec(1, None, 0.0),
            rec(2, Some(1), 50.0),
            rec(3, Some(1), 5.0),
            rec(4, Some(3), 5.0),
            rec(5, Some(1), 80.0),
        ];
        let tree = build(&records).unwrap();
        let order: Vec<_> = tree
            .root()
            .children
            .iter()
            .map(|c| tree.node(*c).record.0.clone())
            .collect();
        assert_eq!(order, ["3", "5", "2"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let records = vec![
            rec(1, None, 0.0),
            rec(7, Some(1), 1.0),
            rec(3, Some(1), 1.0),
            rec(5, Some(1), 1.0),
        ];
        let tree = build(&records).unwrap();
        let order: Vec<_> = tree
            .root()
            .children
            .iter()
            .map(|c| tree.node(*c).record.0.clone())
            .collect();
        assert_eq!(order, ["7", "3", "5"]);
    }

    #[test]
    fn empty_input_yields_synthetic_root() {
        let tree = build(&[]).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root().aggregate, 0.0);
        assert_eq!(tree.root().record.as_str(), SYNTHETIC_ROOT);
    }

    #[test]
    fn orphan_parent_is_rejected() {
        let records = vec![rec(1, None, 0.0), rec(2, Some(9), 1.0)];
        assert_eq!(
            build(&records).unwrap_err(),
            HierarchyError::OrphanParent {
                id: "2".into(),
                parent: "9".into()
            }
        );
    }

    #[test]
    fn cycle_is_rejected() {
        let records = vec![
            rec(1, None, 0.0),
            rec(2, Some(3), 1.0),
            rec(3, Some(2), 1.0),
        ];
        assert!(matches!(build(&records), Err(HierarchyError::Cycle(_))));

        let no_root = vec![rec(1, Some(1), 1.0)];
        assert_eq!(
            build(&no_root).unwrap_err(),
            HierarchyError::Cycle("1".into())
        );
    }

    #[test]
    fn multiple_roots_and_duplicates_are_rejected() {
        let records = vec![rec(1, None, 0.0), rec(2, None, 1.0)];
        assert!(matches!(
            build(&records),
            Err(HierarchyError::MultipleRoots { .. })
        ));

        let dup = vec![rec(1, None, 0.0), rec(1, None, 1.0)];
        assert_eq!(build(&dup).unwrap_err(), HierarchyError::DuplicateId("1".into()));
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let records = vec![rec(1, None, f64::NAN)];
        assert!(matches!(
            build(&records),
            Err(HierarchyError::InvalidValue { .. })
        ));
    }
}
