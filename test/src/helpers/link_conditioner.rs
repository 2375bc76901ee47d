use crate::local_socket::SentPacket;

/// Simulates an unreliable link: unreliable packets may be dropped,
/// duplicated, held back to a later delivery, and arrive in any order.
/// Reliable packets always arrive, in order, ahead of the rest.
pub struct LinkConditioner {
    rng: fastrand::Rng,
    loss: f32,
    duplicate: f32,
    delay: f32,
    held: Vec<SentPacket>,
}

impl LinkConditioner {
    pub fn new(seed: u64, loss: f32, duplicate: f32, delay: f32) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            loss,
            duplicate,
            delay,
            held: Vec::new(),
        }
    }

    /// Delivers nothing unreliable
    pub fn blackhole() -> Self {
        Self::new(0, 1.0, 0.0, 0.0)
    }

    pub fn condition(&mut self, packets: Vec<SentPacket>) -> Vec<SentPacket> {
        let mut reliable = Vec::new();
        let mut unreliable = std::mem::take(&mut self.held);

        for packet in packets {
            if packet.reliable {
                reliable.push(packet);
                continue;
            }
            if self.rng.f32() < self.loss {
                continue;
            }
            if self.rng.f32() < self.delay {
                self.held.push(packet);
                continue;
            }
            if self.rng.f32() < self.duplicate {
                unreliable.push(packet.clone());
            }
            unreliable.push(packet);
        }

        self.rng.shuffle(&mut unreliable);
        reliable.extend(unreliable);
        reliable
    }

    /// Packets held back for a later delivery
    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}
