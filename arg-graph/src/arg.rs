use crate::node::{Event, Node};
use crate::ArgError;
use arg_common::{NodeName, Position, Time};
use hashbrown::{HashMap, HashSet};
use nohash_hasher::BuildNoHashHasher;

pub(crate) type NodeMap = HashMap<NodeName, Node, BuildNoHashHasher<NodeName>>;
pub(crate) type NameSet = HashSet<NodeName, BuildNoHashHasher<NodeName>>;

/// The ancestral recombination graph.
///
/// Owns every node in an arena keyed by stable integer names; parent/child
/// links are name lists into the same arena, so the non-tree topology needs
/// no shared ownership.
#[derive(Clone)]
pub struct Arg {
    pub start: Position,
    pub end: Position,
    pub root: Option<NodeName>,
    nodes: NodeMap,
    next_name: NodeName,
}

impl Arg {
    pub fn new(start: Position, end: Position) -> Result<Self, ArgError> {
        if start < end {
            Ok(Self {
                start,
                end,
                root: None,
                nodes: NodeMap::default(),
                next_name: 0,
            })
        } else {
            Err(ArgError::InvalidInterval { start, end })
        }
    }

    /// Allocate the next free name and insert a fresh, unlinked node.
    pub fn new_node(&mut self, age: Time, event: Event) -> NodeName {
        let name = self.next_name;
        self.next_name += 1;
        self.nodes.insert(name, Node::new(name, age, event));
        name
    }

    /// Insert a caller-built node under its own name.
    pub fn add(&mut self, node: Node) -> Result<NodeName, ArgError> {
        let name = node.name;
        if self.nodes.contains_key(&name) {
            return Err(ArgError::DuplicateName { name });
        }
        if name >= self.next_name {
            self.next_name = name + 1;
        }
        self.nodes.insert(name, node);
        Ok(name)
    }

    pub fn get(&self, name: NodeName) -> Option<&Node> {
        self.nodes.get(&name)
    }

    pub fn get_mut(&mut self, name: NodeName) -> Option<&mut Node> {
        self.nodes.get_mut(&name)
    }

    pub fn node(&self, name: NodeName) -> Result<&Node, ArgError> {
        self.nodes.get(&name).ok_or(ArgError::UnknownName { name })
    }

    pub fn node_mut(&mut self, name: NodeName) -> Result<&mut Node, ArgError> {
        self.nodes
            .get_mut(&name)
            .ok_or(ArgError::UnknownName { name })
    }

    pub fn contains(&self, name: NodeName) -> bool {
        self.nodes.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All names in ascending order.  Hash-map iteration order is not
    /// deterministic, so anything order-sensitive goes through here.
    pub fn sorted_names(&self) -> Vec<NodeName> {
        let mut names: Vec<NodeName> = self.nodes.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Link `child` under `parent`: one new edge, both directions.
    pub fn link(&mut self, parent: NodeName, child: NodeName) -> Result<(), ArgError> {
        if !self.contains(parent) {
            return Err(ArgError::UnknownName { name: parent });
        }
        self.node_mut(child)?.parents.push(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    /// Unlink and delete a node.  Every incident link is removed first,
    /// including duplicated links from self-coalescences.
    pub fn remove(&mut self, name: NodeName) -> Result<Node, ArgError> {
        let node = self
            .nodes
            .remove(&name)
            .ok_or(ArgError::UnknownName { name })?;
        for parent in node.parents.iter() {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != name);
            }
        }
        for child in node.children.iter() {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parents.retain(|p| *p != name);
            }
        }
        if self.root == Some(name) {
            self.root = None;
        }
        Ok(node)
    }

    /// Delete a node whose incident links the caller has already rewired.
    pub(crate) fn take(&mut self, name: NodeName) -> Option<Node> {
        if self.root == Some(name) {
            self.root = None;
        }
        self.nodes.remove(&name)
    }

    pub fn rename(&mut self, old: NodeName, new: NodeName) -> Result<(), ArgError> {
        if self.nodes.contains_key(&new) {
            return Err(ArgError::DuplicateName { name: new });
        }
        let mut node = self
            .nodes
            .remove(&old)
            .ok_or(ArgError::UnknownName { name: old })?;
        for parent in node.parents.iter() {
            if let Some(p) = self.nodes.get_mut(parent) {
                for c in p.children.iter_mut() {
                    if *c == old {
                        *c = new;
                    }
                }
            }
        }
        for child in node.children.iter() {
            if let Some(c) = self.nodes.get_mut(child) {
                for p in c.parents.iter_mut() {
                    if *p == old {
                        *p = new;
                    }
                }
            }
        }
        node.name = new;
        self.nodes.insert(new, node);
        if self.root == Some(old) {
            self.root = Some(new);
        }
        if new >= self.next_name {
            self.next_name = new + 1;
        }
        Ok(())
    }

    /// `root` and everything reachable from it through child links.
    fn descendant_set(&self, root: NodeName) -> Result<NameSet, ArgError> {
        if !self.contains(root) {
            return Err(ArgError::UnknownName { name: root });
        }
        let mut seen = NameSet::default();
        let mut stack = vec![root];
        while let Some(name) = stack.pop() {
            if !seen.insert(name) {
                continue;
            }
            if let Some(node) = self.nodes.get(&name) {
                stack.extend(node.distinct_children());
            }
        }
        Ok(seen)
    }

    /// Names of the childless nodes, optionally restricted to the
    /// descendants of `root`, in ascending name order.
    pub fn leaf_names(&self, root: Option<NodeName>) -> Result<Vec<NodeName>, ArgError> {
        let mut names = match root {
            None => self
                .nodes
                .values()
                .filter(|n| n.is_leaf())
                .map(|n| n.name)
                .collect::<Vec<_>>(),
            Some(root) => {
                let set = self.descendant_set(root)?;
                set.iter()
                    .copied()
                    .filter(|n| self.nodes[n].is_leaf())
                    .collect()
            }
        };
        names.sort_unstable();
        Ok(names)
    }

    pub fn leaves(
        &self,
        root: Option<NodeName>,
    ) -> Result<impl Iterator<Item = &Node> + '_, ArgError> {
        let names = self.leaf_names(root)?;
        Ok(names.into_iter().filter_map(move |n| self.nodes.get(&n)))
    }

    /// Children-before-parents traversal over the whole graph, or over the
    /// descendants of `root`.  A node with several parents is emitted once,
    /// when the last of its children has been emitted.
    pub fn postorder(&self, root: Option<NodeName>) -> Result<Postorder<'_>, ArgError> {
        let set = match root {
            None => {
                let mut set = NameSet::default();
                set.extend(self.nodes.keys().copied());
                set
            }
            Some(root) => self.descendant_set(root)?,
        };
        let mut remaining: HashMap<NodeName, usize, BuildNoHashHasher<NodeName>> =
            HashMap::default();
        let mut ready = vec![];
        for name in set.iter() {
            let n = self.nodes[name].distinct_children().len();
            if n == 0 {
                ready.push(*name);
            } else {
                remaining.insert(*name, n);
            }
        }
        ready.sort_unstable();
        Ok(Postorder {
            arg: self,
            set,
            remaining,
            ready: ready.into(),
        })
    }

    /// Breadth-first traversal along child links from `root` (default: the
    /// designated root), yielding each node at most once.
    pub fn preorder(&self, root: Option<NodeName>) -> Result<Preorder<'_>, ArgError> {
        let root = match root.or(self.root) {
            Some(r) => r,
            None => return Err(ArgError::NoRoot),
        };
        if !self.contains(root) {
            return Err(ArgError::UnknownName { name: root });
        }
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(root);
        let mut seen = NameSet::default();
        seen.insert(root);
        Ok(Preorder {
            arg: self,
            queue,
            seen,
        })
    }

    /// All names in ascending `(age, name)` order.  Ages strictly increase
    /// along every edge, so this is also a valid postorder; the region
    /// engine replays history through it.
    pub fn names_by_age(&self) -> Vec<NodeName> {
        let mut names = self.sorted_names();
        names.sort_by(|a, b| self.nodes[a].age.total_cmp(&self.nodes[b].age));
        names
    }
}

pub struct Postorder<'a> {
    arg: &'a Arg,
    set: NameSet,
    remaining: HashMap<NodeName, usize, BuildNoHashHasher<NodeName>>,
    ready: std::collections::VecDeque<NodeName>,
}

impl<'a> Iterator for Postorder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.ready.pop_front()?;
        let node = &self.arg.nodes[&name];
        let mut parents = node.parents.clone();
        parents.sort_unstable();
        parents.dedup();
        for p in parents {
            if !self.set.contains(&p) {
                continue;
            }
            if let Some(n) = self.remaining.get_mut(&p) {
                *n -= 1;
                if *n == 0 {
                    self.remaining.remove(&p);
                    self.ready.push_back(p);
                }
            }
        }
        Some(node)
    }
}

pub struct Preorder<'a> {
    arg: &'a Arg,
    queue: std::collections::VecDeque<NodeName>,
    seen: NameSet,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.queue.pop_front()?;
        let node = &self.arg.nodes[&name];
        for c in node.distinct_children() {
            if self.seen.insert(c) {
                self.queue.push_back(c);
            }
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_leaf_coal() -> Arg {
        let mut arg = Arg::new(0.0, 1.0).unwrap();
        let a = arg.new_node(0.0, Event::Sample);
        let b = arg.new_node(0.0, Event::Sample);
        let c = arg.new_node(1.5, Event::Coal);
        arg.link(c, a).unwrap();
        arg.link(c, b).unwrap();
        arg.root = Some(c);
        arg
    }

    #[test]
    fn test_bad_interval() {
        assert_eq!(
            Arg::new(1.0, 1.0).err(),
            Some(ArgError::InvalidInterval {
                start: 1.0,
                end: 1.0
            })
        );
    }

    #[test]
    fn test_add_duplicate() {
        let mut arg = Arg::new(0.0, 1.0).unwrap();
        let a = arg.new_node(0.0, Event::Sample);
        let node = Node::new(a, 0.0, Event::Sample);
        assert_eq!(arg.add(node).err(), Some(ArgError::DuplicateName { name: a }));
    }

    #[test]
    fn test_remove_unlinks() {
        let mut arg = two_leaf_coal();
        arg.remove(0).unwrap();
        assert!(!arg.contains(0));
        assert_eq!(arg.node(2).unwrap().children, vec![1]);
        assert_eq!(
            arg.remove(0).err(),
            Some(ArgError::UnknownName { name: 0 })
        );
    }

    #[test]
    fn test_remove_root_clears_root() {
        let mut arg = two_leaf_coal();
        arg.remove(2).unwrap();
        assert_eq!(arg.root, None);
        assert!(arg.node(0).unwrap().parents.is_empty());
    }

    #[test]
    fn test_rename() {
        let mut arg = two_leaf_coal();
        arg.rename(2, 7).unwrap();
        assert!(arg.contains(7));
        assert_eq!(arg.node(0).unwrap().parents, vec![7]);
        assert_eq!(arg.root, Some(7));
        assert_eq!(arg.rename(7, 0).err(), Some(ArgError::DuplicateName { name: 0 }));
        // freshly allocated names never collide with the renamed node
        let next = arg.new_node(0.0, Event::Sample);
        assert!(next > 7);
    }

    #[test]
    fn test_leaves() {
        let arg = two_leaf_coal();
        assert_eq!(arg.leaf_names(None).unwrap(), vec![0, 1]);
        assert_eq!(arg.leaf_names(Some(2)).unwrap(), vec![0, 1]);
        assert!(arg.leaf_names(Some(99)).is_err());
    }

    #[test]
    fn test_postorder_order() {
        let arg = two_leaf_coal();
        let order: Vec<NodeName> = arg.postorder(None).unwrap().map(|n| n.name).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_postorder_duplicated_child_link() {
        // leaf -> recomb -> self-coalescence; the coal node lists the
        // recombination twice but each node is emitted exactly once
        let mut arg = Arg::new(0.0, 1.0).unwrap();
        let leaf = arg.new_node(0.0, Event::Sample);
        let r = arg.new_node(1.0, Event::Recomb);
        let c = arg.new_node(2.0, Event::Coal);
        arg.link(r, leaf).unwrap();
        arg.link(c, r).unwrap();
        arg.link(c, r).unwrap();
        arg.root = Some(c);
        let order: Vec<NodeName> = arg.postorder(None).unwrap().map(|n| n.name).collect();
        assert_eq!(order, vec![leaf, r, c]);
        let order: Vec<NodeName> = arg.preorder(None).unwrap().map(|n| n.name).collect();
        assert_eq!(order, vec![c, r, leaf]);
    }

    #[test]
    fn test_preorder_missing_root() {
        let arg = two_leaf_coal();
        assert!(arg.preorder(Some(42)).is_err());
    }

    #[test]
    fn test_names_by_age() {
        let mut arg = two_leaf_coal();
        let d = arg.new_node(0.75, Event::Coal);
        assert_eq!(arg.names_by_age(), vec![0, 1, d, 2]);
    }
}
