use std::collections::VecDeque;

/// What to discard when pushing into a full queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    DropNewest,
    DropOldest,
}

/// A bounded FIFO modeling one of the controller's frame buffers.
#[derive(Clone, Debug)]
pub struct FrameQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
    policy: OverflowPolicy,
}

impl<T> FrameQueue<T> {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        FrameQueue {
            items: VecDeque::with_capacity(capacity),
            capacity,
            policy,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Appends `item`, returning whichever item had to be discarded to respect the capacity.
    pub fn push(&mut self, item: T) -> Option<T> {
        if !self.is_full() {
            self.items.push_back(item);
            return None;
        }
        match self.policy {
            OverflowPolicy::DropNewest => Some(item),
            OverflowPolicy::DropOldest => match self.items.pop_front() {
                Some(dropped) => {
                    self.items.push_back(item);
                    Some(dropped)
                }
                None => Some(item),
            },
        }
    }

    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// Keeps only the items for which `f` returns `true`, preserving their order.
    pub fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        self.items.retain(f);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
