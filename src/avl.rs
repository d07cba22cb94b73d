use std::borrow::Borrow;
use std::cmp::{max, Ordering};

type Link<T> = Option<Box<Node<T>>>;

#[derive(Debug)]
struct Node<T> {
    value: T,
    left: Link<T>,
    right: Link<T>,
    height: i32,
}

impl<T> Node<T> {
    fn leaf(value: T) -> Box<Self> {
        Box::new(Node {
            value,
            left: None,
            right: None,
            height: 1,
        })
    }

    fn fix_height(&mut self) {
        self.height = max(height(&self.left), height(&self.right)) + 1;
    }

    fn balance_factor(&self) -> i32 {
        height(&self.right) - height(&self.left)
    }
}

fn height<T>(link: &Link<T>) -> i32 {
    link.as_ref().map_or(0, |node| node.height)
}

fn rotate_left<T>(mut q: Box<Node<T>>) -> Box<Node<T>> {
    match q.right.take() {
        Some(mut p) => {
            q.right = p.left.take();
            q.fix_height();
            p.left = Some(q);
            p.fix_height();
            p
        }
        None => q,
    }
}

fn rotate_right<T>(mut p: Box<Node<T>>) -> Box<Node<T>> {
    match p.left.take() {
        Some(mut q) => {
            p.left = q.right.take();
            p.fix_height();
            q.right = Some(p);
            q.fix_height();
            q
        }
        None => p,
    }
}

fn rebalance<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    node.fix_height();
    match node.balance_factor() {
        2 => {
            if node.right.as_ref().map_or(0, |r| r.balance_factor()) < 0 {
                node.right = node.right.take().map(rotate_right);
            }
            rotate_left(node)
        }
        -2 => {
            if node.left.as_ref().map_or(0, |l| l.balance_factor()) > 0 {
                node.left = node.left.take().map(rotate_left);
            }
            rotate_right(node)
        }
        _ => node,
    }
}

// Equal keys descend left, so duplicates are kept.
fn insert_at<T: Ord>(link: Link<T>, value: T, comparisons: &mut usize) -> Box<Node<T>> {
    match link {
        None => Node::leaf(value),
        Some(mut node) => {
            *comparisons += 1;
            if value <= node.value {
                node.left = Some(insert_at(node.left.take(), value, comparisons));
            } else {
                node.right = Some(insert_at(node.right.take(), value, comparisons));
            }
            rebalance(node)
        }
    }
}

/// Self-balancing binary search tree that counts the key comparisons of its last
/// insert and last search.
#[derive(Debug)]
pub struct AvlTree<T> {
    root: Link<T>,
    len: usize,
    insert_comparisons: usize,
    search_comparisons: usize,
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        AvlTree {
            root: None,
            len: 0,
            insert_comparisons: 0,
            search_comparisons: 0,
        }
    }
}

impl<T: Ord> AvlTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) {
        let mut comparisons = 0;
        self.root = Some(insert_at(self.root.take(), value, &mut comparisons));
        self.insert_comparisons = comparisons;
        self.len += 1;
    }

    /// One comparison per visited node, a three-way compare counts once.
    pub fn search<Q>(&mut self, key: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut comparisons = 0;
        let mut current = self.root.as_deref();
        let mut found = None;
        while let Some(node) = current {
            comparisons += 1;
            match Ord::cmp(key, node.value.borrow()) {
                Ordering::Equal => {
                    found = Some(&node.value);
                    break;
                }
                Ordering::Less => current = node.left.as_deref(),
                Ordering::Greater => current = node.right.as_deref(),
            }
        }
        self.search_comparisons = comparisons;
        found
    }

    pub fn insert_comparisons(&self) -> usize {
        self.insert_comparisons
    }

    pub fn search_comparisons(&self) -> usize {
        self.search_comparisons
    }

    pub fn reset_counters(&mut self) {
        self.insert_comparisons = 0;
        self.search_comparisons = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn height(&self) -> i32 {
        height(&self.root)
    }

    /// Values in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut stack = Vec::new();
        let mut current = self.root.as_deref();
        std::iter::from_fn(move || {
            while let Some(node) = current {
                stack.push(node);
                current = node.left.as_deref();
            }
            let node = stack.pop()?;
            current = node.right.as_deref();
            Some(&node.value)
        })
    }
}

#[cfg(test)]
fn assert_balanced<T: Ord>(link: &Link<T>) -> i32 {
    match link {
        None => 0,
        Some(node) => {
            let lh = assert_balanced(&node.left);
            let rh = assert_balanced(&node.right);
            assert!((rh - lh).abs() <= 1, "unbalanced node");
            assert_eq!(node.height, max(lh, rh) + 1);
            if let Some(left) = &node.left {
                assert!(left.value <= node.value);
            }
            if let Some(right) = &node.right {
                assert!(right.value > node.value);
            }
            node.height
        }
    }
}

#[test]
fn ascending_inserts_rotate_left() {
    let mut tree = AvlTree::new();
    for v in [1, 2, 3] {
        tree.insert(v);
    }
    assert_eq!(tree.root.as_ref().unwrap().value, 2);
    assert_eq!(tree.height(), 2);
    assert_balanced(&tree.root);
}

#[test]
fn double_rotations_keep_balance() {
    let mut tree = AvlTree::new();
    for v in [3, 1, 2] {
        tree.insert(v);
    }
    assert_eq!(tree.root.as_ref().unwrap().value, 2);

    let mut tree = AvlTree::new();
    for v in [1, 3, 2] {
        tree.insert(v);
    }
    assert_eq!(tree.root.as_ref().unwrap().value, 2);
    assert_balanced(&tree.root);
}

#[test]
fn many_inserts_stay_logarithmic() {
    let mut tree = AvlTree::new();
    for v in 0..1000 {
        tree.insert((v * 7919) % 1000);
    }
    assert_eq!(tree.len(), 1000);
    assert_balanced(&tree.root);
    // An AVL tree of 1000 nodes is at most 1.44 * log2(1002) high.
    assert!(tree.height() <= 14);
    let sorted: Vec<_> = tree.iter().copied().collect();
    assert_eq!(sorted, (0..1000).collect::<Vec<_>>());
}

#[test]
fn insert_counts_path_length() {
    let mut tree = AvlTree::new();
    tree.insert(2);
    assert_eq!(tree.insert_comparisons(), 0);
    tree.insert(1);
    assert_eq!(tree.insert_comparisons(), 1);
    tree.insert(3);
    assert_eq!(tree.insert_comparisons(), 1);
    tree.insert(4);
    assert_eq!(tree.insert_comparisons(), 2);
}

#[test]
fn search_counts_visited_nodes() {
    let mut tree = AvlTree::new();
    for v in [4, 2, 6, 1, 3, 5, 7] {
        tree.insert(v);
    }
    assert_eq!(tree.search(&4), Some(&4));
    assert_eq!(tree.search_comparisons(), 1);
    assert_eq!(tree.search(&5), Some(&5));
    assert_eq!(tree.search_comparisons(), 3);
    assert_eq!(tree.search(&8), None);
    assert_eq!(tree.search_comparisons(), 3);

    tree.reset_counters();
    assert_eq!(tree.search_comparisons(), 0);
    assert_eq!(tree.insert_comparisons(), 0);
}

#[test]
fn search_on_empty_tree() {
    let mut tree: AvlTree<String> = AvlTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.search("term"), None);
    assert_eq!(tree.search_comparisons(), 0);
}
