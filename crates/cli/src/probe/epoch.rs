/// Issue-time stamp carried by every in-flight probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub seq: u64,
}

/// Per-entity ordering guard: only results from the current epoch that are
/// newer than the last committed one may touch the entity's history.
#[derive(Debug, Clone, Default)]
pub struct SeqGuard {
    epoch: u64,
    issued: u64,
    committed: u64,
}

impl SeqGuard {
    pub fn new(epoch: u64) -> Self {
        Self {
            epoch,
            ..Self::default()
        }
    }

    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket {
            epoch: self.epoch,
            seq: self.issued,
        }
    }

    /// Moves to a new generation; everything issued earlier becomes stale.
    pub fn advance(&mut self, epoch: u64) {
        self.epoch = epoch;
        self.committed = self.issued;
    }

    /// Records the ticket as committed when it is acceptable.
    pub fn accept(&mut self, ticket: Ticket) -> bool {
        if ticket.epoch != self.epoch || ticket.seq <= self.committed {
            return false;
        }
        self.committed = ticket.seq;
        true
    }
}
