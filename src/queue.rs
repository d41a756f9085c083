//! Linked-list queues
//!
//! A [`Queue`] orders nodes inside caller-owned storage and keeps their links
//! consistent. The channel walks the queue by following those links, so the
//! storage must outlive any transfer that uses the queue.
//!
//! Queues are built in *static* format, where every node holds every
//! register. Before a transfer, [`Queue::convert_to_dynamic`] can compact
//! the queue so that each node only holds the registers that differ from the
//! node before it. [`Queue::convert_to_static`] expands the nodes back so
//! that the queue can be edited again.

use crate::node::{update_bit, Node, NodeKind, CSAR_IDX, LINK_ADDRESS};
use crate::ral::gpdma::ch::CLLR;
use crate::{Error, Result};

/// Storage format of the nodes in a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueFormat {
    /// Every node holds all of its registers
    Static,
    /// Nodes only hold the registers that the previous link reloads
    Dynamic,
}

/// A linked-list queue over caller-owned node storage
///
/// Nodes are copied into `storage` in queue order. The queue links each node
/// to the next one, and links the tail back to the first circular node when
/// the queue is circular.
///
/// All nodes must live in one 64 KiB window, since the channel combines the
/// upper address half from its base register with the lower half from each
/// link. Insertions that would place a node outside of the head's window
/// fail with [`Error::AddressWindow`].
///
/// Structural edits are only allowed on static, non-circular queues.
pub struct Queue<'a> {
    nodes: &'a mut [Node],
    len: usize,
    first_circular: Option<usize>,
    format: QueueFormat,
}

impl<'a> Queue<'a> {
    /// Create an empty queue that stores its nodes in `storage`
    pub fn new(storage: &'a mut [Node]) -> Self {
        Queue {
            nodes: storage,
            len: 0,
            first_circular: None,
            format: QueueFormat::Static,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of nodes that the storage can hold
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn format(&self) -> QueueFormat {
        self.format
    }

    /// The node kind shared by every node in the queue
    pub fn kind(&self) -> Option<NodeKind> {
        self.head().map(Node::kind)
    }

    /// Position of the node that the tail loops back to
    pub fn first_circular(&self) -> Option<usize> {
        self.first_circular
    }

    pub fn is_circular(&self) -> bool {
        self.first_circular.is_some()
    }

    pub fn head(&self) -> Option<&Node> {
        self.as_slice().first()
    }

    pub fn tail(&self) -> Option<&Node> {
        self.as_slice().last()
    }

    /// The node at `position`
    ///
    /// In dynamic format, the node is compacted and its register words
    /// are not in their static positions.
    pub fn get(&self, position: usize) -> Option<&Node> {
        self.as_slice().get(position)
    }

    /// The queued nodes, in order
    pub fn as_slice(&self) -> &[Node] {
        &self.nodes[..self.len]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.as_slice().iter()
    }

    /// Returns the values that start the channel on this queue
    ///
    /// These are the link base (CLBAR) and the initial link (CLLR) which
    /// loads the full head node.
    pub(crate) fn head_link(&self) -> Option<(u32, u32)> {
        self.head().map(|head| {
            let address = head.address();
            (
                address & !LINK_ADDRESS,
                (address & LINK_ADDRESS) | head.kind().update_all(),
            )
        })
    }

    pub fn push_back(&mut self, node: Node) -> Result<()> {
        self.insert(self.len, node)
    }

    pub fn push_front(&mut self, node: Node) -> Result<()> {
        self.insert(0, node)
    }

    /// Insert `node` at `position`, shifting later nodes back
    ///
    /// `position` may equal the length, which appends the node.
    pub fn insert(&mut self, position: usize, node: Node) -> Result<()> {
        self.check_editable()?;
        if position > self.len {
            return Err(Error::InvalidParameter);
        }
        if self.len == self.nodes.len() {
            return Err(Error::QueueFull);
        }
        if self.len > 0 {
            self.check_kind(&node)?;
        }
        self.check_window(self.len)?;

        self.nodes.copy_within(position..self.len, position + 1);
        self.nodes[position] = node;
        self.len += 1;
        self.relink();
        Ok(())
    }

    /// Remove and return the node at `position`
    pub fn remove(&mut self, position: usize) -> Result<Node> {
        self.check_editable()?;
        if position >= self.len {
            return Err(Error::InvalidParameter);
        }
        let mut node = self.nodes[position];
        self.nodes.copy_within(position + 1..self.len, position);
        self.len -= 1;
        self.relink();
        node.set_link(0);
        Ok(node)
    }

    pub fn pop_front(&mut self) -> Result<Node> {
        self.remove(0)
    }

    pub fn pop_back(&mut self) -> Result<Node> {
        match self.len {
            0 => Err(Error::InvalidParameter),
            len => self.remove(len - 1),
        }
    }

    /// Replace the node at `position`, returning the old node
    ///
    /// The only node of a queue may be replaced by a node of another kind.
    pub fn replace(&mut self, position: usize, node: Node) -> Result<Node> {
        self.check_editable()?;
        if position >= self.len {
            return Err(Error::InvalidParameter);
        }
        if self.len > 1 {
            self.check_kind(&node)?;
        }
        let mut old = core::mem::replace(&mut self.nodes[position], node);
        self.relink();
        old.set_link(0);
        Ok(old)
    }

    /// Loop the tail back to the node at `position`
    pub fn set_circular(&mut self, position: usize) -> Result<()> {
        if self.format != QueueFormat::Static || position >= self.len {
            return Err(Error::InvalidParameter);
        }
        self.first_circular = Some(position);
        self.relink();
        Ok(())
    }

    /// Loop the tail back to the head
    pub fn set_circular_head(&mut self) -> Result<()> {
        self.set_circular(0)
    }

    /// Loop the tail back to itself
    pub fn set_circular_tail(&mut self) -> Result<()> {
        match self.len {
            0 => Err(Error::InvalidParameter),
            len => self.set_circular(len - 1),
        }
    }

    /// Terminate the queue at its tail
    pub fn clear_circular(&mut self) -> Result<()> {
        if self.format != QueueFormat::Static || self.is_empty() {
            return Err(Error::InvalidParameter);
        }
        self.first_circular = None;
        self.relink();
        Ok(())
    }

    /// Compact every node after the head
    ///
    /// Each register that holds the same value as in the previous node is
    /// dropped from the node, and the previous node's link stops asking the
    /// hardware to reload it. The source address and the link are always
    /// kept.
    ///
    /// In a circular queue, the first circular node stays complete so that
    /// the tail can jump back to it. When the first circular node is the
    /// tail itself, the tail is compacted against the node before it, and it
    /// keeps reloading the same registers while it loops. Duplicating the
    /// tail before converting gives better compaction in that case.
    ///
    /// Returns [`Error::InvalidParameter`] if the queue is already dynamic.
    pub fn convert_to_dynamic(&mut self) -> Result<()> {
        if self.format != QueueFormat::Static {
            log::error!("queue is already dynamic");
            return Err(Error::InvalidParameter);
        }
        if self.is_empty() {
            self.format = QueueFormat::Dynamic;
            return Ok(());
        }

        let kind = self.nodes[0].kind();
        let word_count = kind.word_count();
        let link_idx = kind.link_index();
        let tail = self.len - 1;

        if self.first_circular == Some(tail) {
            log::warn!(
                "first circular node is the tail; duplicate it for full compaction ({} nodes)",
                self.len
            );
        }
        let bypass = self.first_circular.filter(|&first| first != tail);

        let mut context = [0u32; 8];
        context[..word_count].copy_from_slice(self.nodes[0].words());
        let mut prev_link_idx = link_idx;

        for position in 1..self.len {
            let (before, after) = self.nodes.split_at_mut(position);
            let prev = &mut before[position - 1];
            let node = &mut after[0];

            let (update, node_link_idx) = if bypass == Some(position) {
                context[..word_count].copy_from_slice(node.words());
                (kind.update_all(), link_idx)
            } else {
                compact(node, &mut context)
            };

            let prev_words = prev.words_mut();
            prev_words[prev_link_idx] = (prev_words[prev_link_idx] & LINK_ADDRESS) | update;
            prev_link_idx = node_link_idx;
        }

        let tail_link = match self.first_circular {
            None => 0,
            Some(first) if first != tail => {
                (self.nodes[first].address() & LINK_ADDRESS) | kind.update_all()
            }
            Some(_) => self.nodes[tail].words()[prev_link_idx] & !CLLR::ULL::mask,
        };
        self.nodes[tail].words_mut()[prev_link_idx] = tail_link;

        self.format = QueueFormat::Dynamic;
        log::debug!("queue converted to dynamic ({} nodes)", self.len);
        Ok(())
    }

    /// Expand every node back to its complete register image
    ///
    /// Registers that a node doesn't hold are restored from the node before
    /// it. All links are rewritten to reload every register.
    ///
    /// Returns [`Error::InvalidParameter`] if the queue is already static.
    pub fn convert_to_static(&mut self) -> Result<()> {
        if self.format != QueueFormat::Dynamic {
            log::error!("queue is already static");
            return Err(Error::InvalidParameter);
        }
        if self.is_empty() {
            self.format = QueueFormat::Static;
            return Ok(());
        }

        let kind = self.nodes[0].kind();
        let word_count = kind.word_count();
        let link_idx = kind.link_index();

        let mut context = [0u32; 8];
        context[..word_count].copy_from_slice(self.nodes[0].words());

        for node in &mut self.nodes[1..self.len] {
            let update = context[link_idx] & !LINK_ADDRESS;
            let words = node.words_mut();
            let mut packed = 0;
            let mut full = [0u32; 8];
            for (idx, word) in full[..word_count].iter_mut().enumerate() {
                if update & update_bit(kind, idx) != 0 {
                    *word = words[packed];
                    packed += 1;
                } else {
                    *word = context[idx];
                }
            }
            words.copy_from_slice(&full[..word_count]);
            context = full;
        }

        self.format = QueueFormat::Static;
        self.relink();
        log::debug!("queue converted to static ({} nodes)", self.len);
        Ok(())
    }

    fn check_editable(&self) -> Result<()> {
        if self.format != QueueFormat::Static || self.first_circular.is_some() {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    fn check_kind(&self, node: &Node) -> Result<()> {
        match self.kind() {
            Some(kind) if kind != node.kind() => Err(Error::InvalidParameter),
            _ => Ok(()),
        }
    }

    /// Storage is contiguous, so the head's slot and the last slot bound
    /// every address in between.
    fn check_window(&self, last: usize) -> Result<()> {
        let first = self.nodes[0].address();
        let last = self.nodes[last].address();
        if first & !LINK_ADDRESS != last & !LINK_ADDRESS {
            return Err(Error::AddressWindow);
        }
        Ok(())
    }

    /// Rewrite every link in static form
    fn relink(&mut self) {
        let Some(kind) = self.kind() else {
            return;
        };
        let update = kind.update_all();
        for position in 0..self.len {
            let next = if position + 1 < self.len {
                Some(position + 1)
            } else {
                self.first_circular
            };
            let link = match next {
                Some(next) => (self.nodes[next].address() & LINK_ADDRESS) | update,
                None => 0,
            };
            self.nodes[position].set_link(link);
        }
    }
}

/// Drop the words of `node` that match `context`
///
/// Returns the update bits that load the compacted node, and the position
/// of its link word.
fn compact(node: &mut Node, context: &mut [u32; 8]) -> (u32, usize) {
    let kind = node.kind();
    let link_idx = kind.link_index();
    let words = node.words_mut();

    let mut packed = [0u32; 8];
    let mut count = 0;
    let mut update = 0;
    for (idx, &word) in words.iter().enumerate() {
        if word == context[idx] && idx != CSAR_IDX && idx != link_idx {
            continue;
        }
        context[idx] = word;
        packed[count] = word;
        count += 1;
        update |= update_bit(kind, idx);
    }
    // The link is always kept, and it's always last.
    packed[count - 1] = (packed[count - 1] & LINK_ADDRESS) | update;
    words.copy_from_slice(&packed[..words.len()]);
    (update, count - 1)
}
