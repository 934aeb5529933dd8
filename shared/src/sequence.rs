//! Last-request-wins sequencing for asynchronous lookups
//!
//! Each request takes a ticket. A response is applied only if its ticket is
//! still the newest one issued; anything older has been superseded.

/// Ticket for one issued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn sequence(&self) -> u64 {
        self.0
    }

    pub fn from_sequence(sequence: u64) -> Self {
        Self(sequence)
    }
}

/// Monotonic request counter
#[derive(Debug, Default, Clone)]
pub struct RequestSequencer {
    latest: u64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestTicket {
        self.latest += 1;
        RequestTicket(self.latest)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.latest
    }
}
