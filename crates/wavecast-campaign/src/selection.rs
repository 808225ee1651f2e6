//! Next-wave selection.

use wavecast_core::types::{Message, Recipient};

/// Whether non-priority messages are held back from recipients that are not high intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityGate {
    /// Every message is eligible for every recipient.
    #[default]
    Off,
    /// A message passes if it is high priority or the recipient is high intensity.
    On,
}

impl PriorityGate {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled { Self::On } else { Self::Off }
    }

    pub fn admits(self, message: &Message, recipient: &Recipient) -> bool {
        match self {
            Self::Off => true,
            Self::On => message.high_priority || recipient.high_intensity,
        }
    }
}

/// The first catalog entry, in catalog order, that is active, lies past the
/// recipient's last wave and passes the gate. `messages` must already be
/// sorted ascending by wave.
pub fn select_next<'a>(
    recipient: &Recipient,
    messages: &'a [Message],
    gate: PriorityGate,
) -> Option<&'a Message> {
    if !recipient.active {
        return None;
    }
    messages
        .iter()
        .find(|m| m.active && m.wave > recipient.last_wave && gate.admits(m, recipient))
}
