use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueChannel {
    /// Spawn, update and remove traffic, flushed once per tick.
    ClientEntity,
}

/// Opaque, already encoded fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub opcode: u8,
    pub data: Vec<u8>,
}

impl QueuedMessage {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            opcode: data.first().copied().unwrap_or(0),
            data,
        }
    }
}

/// Per-player outgoing queue. Any thread may enqueue; the flush drains.
/// FIFO per channel.
#[derive(Debug, Default)]
pub struct MessageQueue {
    channels: Mutex<HashMap<QueueChannel, VecDeque<QueuedMessage>>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, channel: QueueChannel, message: QueuedMessage) {
        self.channels
            .lock()
            .entry(channel)
            .or_default()
            .push_back(message);
    }

    pub fn dequeue(&self, channel: QueueChannel) -> Option<QueuedMessage> {
        self.channels
            .lock()
            .get_mut(&channel)
            .and_then(VecDeque::pop_front)
    }

    /// Takes everything queued on `channel` in one lock acquisition.
    pub fn drain(&self, channel: QueueChannel) -> Vec<QueuedMessage> {
        self.channels
            .lock()
            .get_mut(&channel)
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, channel: QueueChannel) -> usize {
        self.channels
            .lock()
            .get_mut(&channel)
            .map(|queue| {
                let dropped = queue.len();
                queue.clear();
                dropped
            })
            .unwrap_or(0)
    }

    pub fn len(&self, channel: QueueChannel) -> usize {
        self.channels
            .lock()
            .get(&channel)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    pub fn is_empty(&self, channel: QueueChannel) -> bool {
        self.len(channel) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn fifo_per_channel() {
        let queue = MessageQueue::new();
        queue.enqueue(QueueChannel::ClientEntity, QueuedMessage::new(vec![1]));
        queue.enqueue(QueueChannel::ClientEntity, QueuedMessage::new(vec![2]));
        assert_eq!(queue.len(QueueChannel::ClientEntity), 2);
        assert_eq!(
            queue.dequeue(QueueChannel::ClientEntity).map(|m| m.data),
            Some(vec![1])
        );
        let rest = queue.drain(QueueChannel::ClientEntity);
        assert_eq!(rest, vec![QueuedMessage::new(vec![2])]);
        assert!(queue.is_empty(QueueChannel::ClientEntity));
        assert_eq!(queue.dequeue(QueueChannel::ClientEntity), None);
    }

    #[test]
    fn clear_reports_dropped() {
        let queue = MessageQueue::new();
        assert_eq!(queue.clear(QueueChannel::ClientEntity), 0);
        for i in 0..3 {
            queue.enqueue(QueueChannel::ClientEntity, QueuedMessage::new(vec![i]));
        }
        assert_eq!(queue.clear(QueueChannel::ClientEntity), 3);
        assert!(queue.is_empty(QueueChannel::ClientEntity));
    }

    #[test]
    fn opcode_is_first_byte() {
        assert_eq!(QueuedMessage::new(vec![0x35, 1]).opcode, 0x35);
        assert_eq!(QueuedMessage::new(Vec::new()).opcode, 0);
    }

    #[test]
    fn producers_keep_their_own_order() {
        let queue = Arc::new(MessageQueue::new());
        let handles: Vec<_> = (0u8..4)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for seq in 0u8..100 {
                        queue.enqueue(
                            QueueChannel::ClientEntity,
                            QueuedMessage::new(vec![producer, seq]),
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let drained = queue.drain(QueueChannel::ClientEntity);
        assert_eq!(drained.len(), 400);
        for producer in 0u8..4 {
            let seqs: Vec<u8> = drained
                .iter()
                .filter(|m| m.data[0] == producer)
                .map(|m| m.data[1])
                .collect();
            assert_eq!(seqs, (0u8..100).collect::<Vec<_>>());
        }
    }
}
