// Sequential host port allocation for deployments

use std::sync::atomic::{AtomicU16, Ordering};

/// Hands out ports starting at a base, one per call, shared across plans.
/// After 65535 it starts over at the base instead of wrapping to 0.
#[derive(Debug)]
pub struct PortAllocator {
    base: u16,
    next: AtomicU16,
}

impl PortAllocator {
    pub fn new(base: u16) -> Self {
        Self {
            base,
            next: AtomicU16::new(base),
        }
    }

    pub fn next_port(&self) -> u16 {
        let base = self.base;
        let previous = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |port| {
                Some(port.checked_add(1).unwrap_or(base))
            });
        // the closure always returns Some
        match previous {
            Ok(port) | Err(port) => port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ports() {
        let ports = PortAllocator::new(5000);
        assert_eq!(ports.next_port(), 5000);
        assert_eq!(ports.next_port(), 5001);
    }

    #[test]
    fn test_exhausted_range_restarts_at_base() {
        let ports = PortAllocator::new(5000);
        ports.next.store(65534, Ordering::SeqCst);

        assert_eq!(ports.next_port(), 65534);
        assert_eq!(ports.next_port(), 65535);
        assert_eq!(ports.next_port(), 5000);
        assert_eq!(ports.next_port(), 5001);
    }
}
