use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Allocates dense numeric ids, recycling freed ones smallest-first. Ids
/// ride on every message, so keeping the id space compact keeps the varint
/// encoding short.
pub struct KeyGenerator {
    next: u32,
    freed: BinaryHeap<Reverse<u32>>,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self {
            next: 0,
            freed: BinaryHeap::new(),
        }
    }

    /// Pop the smallest freed id if any, else the next fresh one.
    pub fn generate(&mut self) -> u32 {
        if let Some(Reverse(id)) = self.freed.pop() {
            return id;
        }
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn recycle(&mut self, id: u32) {
        self.freed.push(Reverse(id));
    }
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_dense_ids_from_zero() {
        let mut generator = KeyGenerator::new();
        assert_eq!(generator.generate(), 0);
        assert_eq!(generator.generate(), 1);
        assert_eq!(generator.generate(), 2);
    }

    #[test]
    fn recycled_ids_are_reused_smallest_first() {
        let mut generator = KeyGenerator::new();
        for _ in 0..5 {
            generator.generate();
        }
        generator.recycle(3);
        generator.recycle(1);
        generator.recycle(4);

        assert_eq!(generator.generate(), 1);
        assert_eq!(generator.generate(), 3);
        assert_eq!(generator.generate(), 4);
        assert_eq!(generator.generate(), 5);
    }
}
