//! Red-black tree buckets.
//!
//! A tree bucket holds two views over the same nodes:
//! - a red-black tree through `parent/left/right`, ordered by cached hash,
//!   then by the map's [`KeyOrder`], then by arena key identity;
//! - a doubly-linked list through `prev/next` that fixes iteration order and
//!   lets the bucket turn back into a plain chain without reallocating.
//!
//! All functions here operate on node keys inside the shared arena; the table
//! owns the `Bucket` slot and writes back whatever these functions return.
//! Every "movable" mutation finishes by moving the root to the front of the
//! list, so a bucket's structural head is normally its root.

use core::borrow::Borrow;
use core::cmp::Ordering;

use crate::node::{Arena, Bucket, NodeKey, TreeBin, TreeLinks};
use crate::order::KeyOrder;
use crate::table::UNTREEIFY_THRESHOLD;

#[inline]
fn links<K, V>(arena: &Arena<K, V>, n: NodeKey) -> TreeLinks {
    arena[n].links
}

#[inline]
fn links_mut<K, V>(arena: &mut Arena<K, V>, n: NodeKey) -> &mut TreeLinks {
    &mut arena[n].links
}

#[inline]
fn is_red<K, V>(arena: &Arena<K, V>, n: Option<NodeKey>) -> bool {
    n.map_or(false, |n| arena[n].links.red)
}

/// Deterministic last-resort order for keys that tie on hash and key order.
/// Never returns `Equal`.
#[inline]
fn tie_break_order(a: NodeKey, b: NodeKey) -> Ordering {
    if a <= b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Search the subtree rooted at `start`.
///
/// When hashes tie and the key order has no opinion, both subtrees must be
/// searched: the right one recursively, the left one by continuing the loop.
pub(crate) fn find<K, V, Q, O>(
    arena: &Arena<K, V>,
    start: Option<NodeKey>,
    hash: u32,
    key: &Q,
    order: &O,
) -> Option<NodeKey>
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
    O: KeyOrder<Q>,
{
    let mut p = start;
    while let Some(n) = p {
        let node = &arena[n];
        let (pl, pr) = (node.links.left, node.links.right);
        if node.hash > hash {
            p = pl;
        } else if node.hash < hash {
            p = pr;
        } else if node.key.borrow() == key {
            return Some(n);
        } else if pl.is_none() {
            p = pr;
        } else if pr.is_none() {
            p = pl;
        } else {
            match order.compare(key, node.key.borrow()) {
                Ordering::Less => p = pl,
                Ordering::Greater => p = pr,
                Ordering::Equal => {
                    if let Some(q) = find(arena, pr, hash, key, order) {
                        return Some(q);
                    }
                    p = pl;
                }
            }
        }
    }
    None
}

/// Outcome of descending a tree bucket to insert `key`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TreeSlot {
    /// The key is already present in this node.
    Occupied(NodeKey),
    /// A new leaf belongs under `parent`, on its left when `left` is set.
    Vacant { parent: NodeKey, left: bool },
}

/// Find `key` or the leaf position where it would be inserted.
///
/// The first hash-and-order tie triggers a full search of both subtrees, so a
/// duplicate hidden on the other side of the tie is never inserted twice.
/// Ties that remain send the pending key right; it has no arena identity yet.
pub(crate) fn slot_for<K, V, O>(
    arena: &Arena<K, V>,
    root: NodeKey,
    hash: u32,
    key: &K,
    order: &O,
) -> TreeSlot
where
    K: Eq,
    O: KeyOrder<K>,
{
    let mut searched = false;
    let mut p = root;
    loop {
        let node = &arena[p];
        let dir = if node.hash > hash {
            Ordering::Less
        } else if node.hash < hash {
            Ordering::Greater
        } else if node.key == *key {
            return TreeSlot::Occupied(p);
        } else {
            match order.compare(key, &node.key) {
                Ordering::Equal => {
                    if !searched {
                        searched = true;
                        for child in [node.links.left, node.links.right] {
                            if let Some(q) = find(arena, child, hash, key, order) {
                                return TreeSlot::Occupied(q);
                            }
                        }
                    }
                    Ordering::Greater
                }
                dir => dir,
            }
        };
        let left = dir != Ordering::Greater;
        let next = if left {
            node.links.left
        } else {
            node.links.right
        };
        match next {
            Some(n) => p = n,
            None => return TreeSlot::Vacant { parent: p, left },
        }
    }
}

/// Attach a freshly allocated node `x` as a leaf under `parent`, link it into
/// the bucket list right after `parent`, and rebalance.
pub(crate) fn link_leaf<K, V>(
    arena: &mut Arena<K, V>,
    bin: &mut TreeBin,
    parent: NodeKey,
    left: bool,
    x: NodeKey,
) {
    let parent_next = arena[parent].next;
    {
        let pl = links_mut(arena, parent);
        if left {
            pl.left = Some(x);
        } else {
            pl.right = Some(x);
        }
    }
    arena[parent].next = Some(x);
    {
        let node = &mut arena[x];
        node.next = parent_next;
        node.links = TreeLinks {
            parent: Some(parent),
            prev: Some(parent),
            ..TreeLinks::default()
        };
    }
    if let Some(pn) = parent_next {
        links_mut(arena, pn).prev = Some(x);
    }
    let root = balance_insertion(arena, bin.root, x);
    move_root_to_front(arena, bin, root);
}

/// Make `root` the bin's root and the first node of its list.
pub(crate) fn move_root_to_front<K, V>(arena: &mut Arena<K, V>, bin: &mut TreeBin, root: NodeKey) {
    let first = bin.first;
    if root != first {
        let rn = arena[root].next;
        let rp = links(arena, root).prev;
        if let Some(rn) = rn {
            links_mut(arena, rn).prev = rp;
        }
        if let Some(rp) = rp {
            arena[rp].next = rn;
        }
        links_mut(arena, first).prev = Some(root);
        arena[root].next = Some(first);
        links_mut(arena, root).prev = None;
        bin.first = root;
    }
    bin.root = root;
    debug_assert_eq!(check_invariants(arena, *bin), Ok(()));
}

/// Build a tree over the list starting at `first`, in list order.
pub(crate) fn treeify<K, V, O>(arena: &mut Arena<K, V>, first: NodeKey, order: &O) -> TreeBin
where
    O: KeyOrder<K>,
{
    arena[first].links = TreeLinks::default();
    let mut root = first;
    let mut prev = first;
    let mut cur = arena[first].next;
    while let Some(x) = cur {
        cur = arena[x].next;
        arena[x].links = TreeLinks {
            prev: Some(prev),
            ..TreeLinks::default()
        };
        prev = x;

        let mut p = root;
        loop {
            let dir = {
                let (xn, pn) = (&arena[x], &arena[p]);
                if pn.hash > xn.hash {
                    Ordering::Less
                } else if pn.hash < xn.hash {
                    Ordering::Greater
                } else {
                    match order.compare(&xn.key, &pn.key) {
                        Ordering::Equal => tie_break_order(x, p),
                        dir => dir,
                    }
                }
            };
            let pl = links(arena, p);
            let next = if dir == Ordering::Greater {
                pl.right
            } else {
                pl.left
            };
            match next {
                Some(n) => p = n,
                None => {
                    links_mut(arena, x).parent = Some(p);
                    if dir == Ordering::Greater {
                        links_mut(arena, p).right = Some(x);
                    } else {
                        links_mut(arena, p).left = Some(x);
                    }
                    root = balance_insertion(arena, root, x);
                    break;
                }
            }
        }
    }
    let mut bin = TreeBin { root, first };
    move_root_to_front(arena, &mut bin, root);
    bin
}

/// Strip tree links from every node of the list starting at `first`. The
/// `next` chain is kept, so the list becomes a plain bucket chain.
pub(crate) fn untreeify<K, V>(arena: &mut Arena<K, V>, first: NodeKey) {
    let mut cur = Some(first);
    while let Some(n) = cur {
        let node = &mut arena[n];
        node.links = TreeLinks::default();
        cur = node.next;
    }
}

/// Count the nodes in the list starting at `first`.
pub(crate) fn list_len<K, V>(arena: &Arena<K, V>, first: NodeKey) -> usize {
    let mut n = 0;
    let mut cur = Some(first);
    while let Some(k) = cur {
        n += 1;
        cur = arena[k].next;
    }
    n
}

/// Split a tree bucket for a table doubling. `bit` is the old capacity.
/// Returns the buckets for the low (`index`) and high (`index + bit`) slots.
///
/// A half with at most `UNTREEIFY_THRESHOLD` nodes becomes a list. A half
/// that received every node keeps the existing tree as is.
pub(crate) fn split<K, V, O>(arena: &mut Arena<K, V>, bin: TreeBin, bit: u32, order: &O) -> (Bucket, Bucket)
where
    O: KeyOrder<K>,
{
    let (mut lo_head, mut lo_tail) = (None, None);
    let (mut hi_head, mut hi_tail) = (None, None);
    let (mut lc, mut hc) = (0usize, 0usize);

    let mut cur = Some(bin.first);
    while let Some(e) = cur {
        cur = arena[e].next;
        arena[e].next = None;
        let (head, tail, count) = if arena[e].hash & bit == 0 {
            (&mut lo_head, &mut lo_tail, &mut lc)
        } else {
            (&mut hi_head, &mut hi_tail, &mut hc)
        };
        links_mut(arena, e).prev = *tail;
        match *tail {
            None => *head = Some(e),
            Some(t) => arena[t].next = Some(e),
        }
        *tail = Some(e);
        *count += 1;
    }

    let lo = half_bucket(arena, bin, lo_head, lc, hi_head.is_some(), order);
    let hi = half_bucket(arena, bin, hi_head, hc, lo_head.is_some(), order);
    (lo, hi)
}

fn half_bucket<K, V, O>(
    arena: &mut Arena<K, V>,
    old: TreeBin,
    head: Option<NodeKey>,
    count: usize,
    other_half_used: bool,
    order: &O,
) -> Bucket
where
    O: KeyOrder<K>,
{
    match head {
        None => Bucket::Empty,
        Some(head) if count <= UNTREEIFY_THRESHOLD => {
            untreeify(arena, head);
            Bucket::List { head }
        }
        Some(head) if other_half_used => Bucket::Tree(treeify(arena, head, order)),
        Some(head) => Bucket::Tree(TreeBin {
            root: old.root,
            first: head,
        }),
    }
}

/// Unlink `p` from a tree bucket and return the bucket's new state.
///
/// The list unlink happens first. A movable removal from a tree whose shape
/// is already too shallow (no root, no right child of the root, no left child
/// of the root, or no left-left grandchild) turns the remaining nodes back
/// into a list without touching the tree. Non-movable removals never
/// untreeify and never reorder the list.
pub(crate) fn remove_tree_node<K, V>(arena: &mut Arena<K, V>, bin: TreeBin, p: NodeKey, movable: bool) -> Bucket {
    let succ = arena[p].next;
    let pred = links(arena, p).prev;
    let mut first = bin.first;
    match pred {
        None => match succ {
            Some(s) => first = s,
            None => return Bucket::Empty,
        },
        Some(pr) => arena[pr].next = succ,
    }
    if let Some(s) = succ {
        links_mut(arena, s).prev = pred;
    }

    let mut root = bin.root;
    if movable {
        let rl = links(arena, root);
        let shallow = rl.right.is_none()
            || match rl.left {
                None => true,
                Some(l) => links(arena, l).left.is_none(),
            };
        if shallow {
            untreeify(arena, first);
            #[cfg(feature = "logging")]
            log::trace!("untreeified bucket after removal");
            return Bucket::List { head: first };
        }
    }

    let pl = links(arena, p);
    let replacement = match (pl.left, pl.right) {
        (Some(l), Some(r)) => {
            // Swap p's structural slot with its in-order successor s.
            let mut s = r;
            while let Some(sl) = links(arena, s).left {
                s = sl;
            }
            let s_red = links(arena, s).red;
            links_mut(arena, s).red = pl.red;
            links_mut(arena, p).red = s_red;

            let sr = links(arena, s).right;
            let pp = pl.parent;
            if s == r {
                links_mut(arena, p).parent = Some(s);
                links_mut(arena, s).right = Some(p);
            } else {
                let sp = links(arena, s).parent;
                links_mut(arena, p).parent = sp;
                if let Some(sp) = sp {
                    if links(arena, sp).left == Some(s) {
                        links_mut(arena, sp).left = Some(p);
                    } else {
                        links_mut(arena, sp).right = Some(p);
                    }
                }
                links_mut(arena, s).right = Some(r);
                links_mut(arena, r).parent = Some(s);
            }
            links_mut(arena, p).left = None;
            links_mut(arena, p).right = sr;
            if let Some(sr) = sr {
                links_mut(arena, sr).parent = Some(p);
            }
            links_mut(arena, s).left = Some(l);
            links_mut(arena, l).parent = Some(s);
            links_mut(arena, s).parent = pp;
            match pp {
                None => root = s,
                Some(pp) => {
                    if links(arena, pp).left == Some(p) {
                        links_mut(arena, pp).left = Some(s);
                    } else {
                        links_mut(arena, pp).right = Some(s);
                    }
                }
            }
            sr.unwrap_or(p)
        }
        (Some(l), None) => l,
        (None, Some(r)) => r,
        (None, None) => p,
    };

    if replacement != p {
        let pp = links(arena, p).parent;
        links_mut(arena, replacement).parent = pp;
        match pp {
            None => {
                root = replacement;
                links_mut(arena, replacement).red = false;
            }
            Some(pp) => {
                if links(arena, pp).left == Some(p) {
                    links_mut(arena, pp).left = Some(replacement);
                } else {
                    links_mut(arena, pp).right = Some(replacement);
                }
            }
        }
        let l = links_mut(arena, p);
        l.left = None;
        l.right = None;
        l.parent = None;
    }

    let root = if links(arena, p).red {
        root
    } else {
        balance_deletion(arena, root, replacement)
    };

    if replacement == p {
        // Detach the leaf only after the fix-up used it as its starting point.
        let pp = links(arena, p).parent;
        links_mut(arena, p).parent = None;
        if let Some(pp) = pp {
            let ppl = links_mut(arena, pp);
            if ppl.left == Some(p) {
                ppl.left = None;
            } else if ppl.right == Some(p) {
                ppl.right = None;
            }
        }
    }

    let mut bin = TreeBin { root, first };
    if movable {
        move_root_to_front(arena, &mut bin, root);
    } else {
        debug_assert_eq!(check_invariants(arena, bin), Ok(()));
    }
    Bucket::Tree(bin)
}

fn rotate_left<K, V>(arena: &mut Arena<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let Some(r) = links(arena, p).right else {
        return root;
    };
    let rl = links(arena, r).left;
    links_mut(arena, p).right = rl;
    if let Some(rl) = rl {
        links_mut(arena, rl).parent = Some(p);
    }
    let pp = links(arena, p).parent;
    links_mut(arena, r).parent = pp;
    match pp {
        None => {
            root = r;
            links_mut(arena, r).red = false;
        }
        Some(pp) => {
            if links(arena, pp).left == Some(p) {
                links_mut(arena, pp).left = Some(r);
            } else {
                links_mut(arena, pp).right = Some(r);
            }
        }
    }
    links_mut(arena, r).left = Some(p);
    links_mut(arena, p).parent = Some(r);
    root
}

fn rotate_right<K, V>(arena: &mut Arena<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let Some(l) = links(arena, p).left else {
        return root;
    };
    let lr = links(arena, l).right;
    links_mut(arena, p).left = lr;
    if let Some(lr) = lr {
        links_mut(arena, lr).parent = Some(p);
    }
    let pp = links(arena, p).parent;
    links_mut(arena, l).parent = pp;
    match pp {
        None => {
            root = l;
            links_mut(arena, l).red = false;
        }
        Some(pp) => {
            if links(arena, pp).right == Some(p) {
                links_mut(arena, pp).right = Some(l);
            } else {
                links_mut(arena, pp).left = Some(l);
            }
        }
    }
    links_mut(arena, l).right = Some(p);
    links_mut(arena, p).parent = Some(l);
    root
}

fn balance_insertion<K, V>(arena: &mut Arena<K, V>, mut root: NodeKey, mut x: NodeKey) -> NodeKey {
    links_mut(arena, x).red = true;
    loop {
        let Some(xp) = links(arena, x).parent else {
            links_mut(arena, x).red = false;
            return x;
        };
        if !links(arena, xp).red {
            return root;
        }
        let Some(xpp) = links(arena, xp).parent else {
            return root;
        };
        let gl = links(arena, xpp);
        if gl.left == Some(xp) {
            let uncle = gl.right;
            if let Some(u) = uncle.filter(|&u| arena[u].links.red) {
                links_mut(arena, u).red = false;
                links_mut(arena, xp).red = false;
                links_mut(arena, xpp).red = true;
                x = xpp;
            } else {
                let (mut parent, mut grand) = (Some(xp), Some(xpp));
                if links(arena, xp).right == Some(x) {
                    x = xp;
                    root = rotate_left(arena, root, x);
                    parent = links(arena, x).parent;
                    grand = parent.and_then(|p| links(arena, p).parent);
                }
                if let Some(parent) = parent {
                    links_mut(arena, parent).red = false;
                    if let Some(grand) = grand {
                        links_mut(arena, grand).red = true;
                        root = rotate_right(arena, root, grand);
                    }
                }
            }
        } else {
            let uncle = gl.left;
            if let Some(u) = uncle.filter(|&u| arena[u].links.red) {
                links_mut(arena, u).red = false;
                links_mut(arena, xp).red = false;
                links_mut(arena, xpp).red = true;
                x = xpp;
            } else {
                let (mut parent, mut grand) = (Some(xp), Some(xpp));
                if links(arena, xp).left == Some(x) {
                    x = xp;
                    root = rotate_right(arena, root, x);
                    parent = links(arena, x).parent;
                    grand = parent.and_then(|p| links(arena, p).parent);
                }
                if let Some(parent) = parent {
                    links_mut(arena, parent).red = false;
                    if let Some(grand) = grand {
                        links_mut(arena, grand).red = true;
                        root = rotate_left(arena, root, grand);
                    }
                }
            }
        }
    }
}

fn balance_deletion<K, V>(arena: &mut Arena<K, V>, mut root: NodeKey, x: NodeKey) -> NodeKey {
    let mut x = Some(x);
    loop {
        let Some(cur) = x else {
            return root;
        };
        if cur == root {
            return root;
        }
        let Some(xp0) = links(arena, cur).parent else {
            links_mut(arena, cur).red = false;
            return cur;
        };
        if links(arena, cur).red {
            links_mut(arena, cur).red = false;
            return root;
        }

        let mut xp = Some(xp0);
        if links(arena, xp0).left == Some(cur) {
            let mut sib = links(arena, xp0).right;
            if let Some(s) = sib.filter(|&s| arena[s].links.red) {
                links_mut(arena, s).red = false;
                links_mut(arena, xp0).red = true;
                root = rotate_left(arena, root, xp0);
                xp = links(arena, cur).parent;
                sib = xp.and_then(|p| links(arena, p).right);
            }
            let Some(s) = sib else {
                x = xp;
                continue;
            };
            let (sl, sr) = (links(arena, s).left, links(arena, s).right);
            if !is_red(arena, sr) && !is_red(arena, sl) {
                links_mut(arena, s).red = true;
                x = xp;
                continue;
            }
            let mut sib = Some(s);
            if !is_red(arena, sr) {
                if let Some(sl) = sl {
                    links_mut(arena, sl).red = false;
                }
                links_mut(arena, s).red = true;
                root = rotate_right(arena, root, s);
                xp = links(arena, cur).parent;
                sib = xp.and_then(|p| links(arena, p).right);
            }
            if let Some(s) = sib {
                let parent_red = is_red(arena, xp);
                links_mut(arena, s).red = parent_red;
                if let Some(sr) = links(arena, s).right {
                    links_mut(arena, sr).red = false;
                }
            }
            if let Some(p) = xp {
                links_mut(arena, p).red = false;
                root = rotate_left(arena, root, p);
            }
            x = Some(root);
        } else {
            let mut sib = links(arena, xp0).left;
            if let Some(s) = sib.filter(|&s| arena[s].links.red) {
                links_mut(arena, s).red = false;
                links_mut(arena, xp0).red = true;
                root = rotate_right(arena, root, xp0);
                xp = links(arena, cur).parent;
                sib = xp.and_then(|p| links(arena, p).left);
            }
            let Some(s) = sib else {
                x = xp;
                continue;
            };
            let (sl, sr) = (links(arena, s).left, links(arena, s).right);
            if !is_red(arena, sl) && !is_red(arena, sr) {
                links_mut(arena, s).red = true;
                x = xp;
                continue;
            }
            let mut sib = Some(s);
            if !is_red(arena, sl) {
                if let Some(sr) = sr {
                    links_mut(arena, sr).red = false;
                }
                links_mut(arena, s).red = true;
                root = rotate_left(arena, root, s);
                xp = links(arena, cur).parent;
                sib = xp.and_then(|p| links(arena, p).left);
            }
            if let Some(s) = sib {
                let parent_red = is_red(arena, xp);
                links_mut(arena, s).red = parent_red;
                if let Some(sl) = links(arena, s).left {
                    links_mut(arena, sl).red = false;
                }
            }
            if let Some(p) = xp {
                links_mut(arena, p).red = false;
                root = rotate_right(arena, root, p);
            }
            x = Some(root);
        }
    }
}

/// Verify the red-black and list invariants of one tree bucket.
pub(crate) fn check_invariants<K, V>(arena: &Arena<K, V>, bin: TreeBin) -> Result<(), &'static str> {
    let root = links(arena, bin.root);
    if root.parent.is_some() {
        return Err("tree root has a parent");
    }
    if root.red {
        return Err("tree root is red");
    }
    if links(arena, bin.first).prev.is_some() {
        return Err("first list node has a predecessor");
    }

    let mut listed = std::collections::HashSet::new();
    let mut cur = Some(bin.first);
    while let Some(n) = cur {
        if !listed.insert(n) {
            return Err("bucket list contains a cycle");
        }
        let next = arena[n].next;
        if let Some(nx) = next {
            if links(arena, nx).prev != Some(n) {
                return Err("list prev/next links disagree");
            }
        }
        cur = next;
    }

    let mut in_tree = 0usize;
    black_height(arena, bin.root, &listed, &mut in_tree)?;
    if in_tree != listed.len() {
        return Err("tree and list views hold different node counts");
    }
    Ok(())
}

fn black_height<K, V>(
    arena: &Arena<K, V>,
    t: NodeKey,
    listed: &std::collections::HashSet<NodeKey>,
    count: &mut usize,
) -> Result<usize, &'static str> {
    if !listed.contains(&t) {
        return Err("tree node missing from bucket list");
    }
    *count += 1;
    let tl = links(arena, t);
    let hash = arena[t].hash;
    let mut heights = [1usize; 2];
    for (i, child) in [tl.left, tl.right].into_iter().enumerate() {
        let Some(c) = child else { continue };
        if links(arena, c).parent != Some(t) {
            return Err("child does not point back to its parent");
        }
        let ch = arena[c].hash;
        if (i == 0 && ch > hash) || (i == 1 && ch < hash) {
            return Err("tree is not ordered by hash");
        }
        if tl.red && links(arena, c).red {
            return Err("red node has a red child");
        }
        heights[i] = black_height(arena, c, listed, count)?;
    }
    if heights[0] != heights[1] {
        return Err("unequal black height");
    }
    Ok(heights[0] + usize::from(!tl.red))
}
