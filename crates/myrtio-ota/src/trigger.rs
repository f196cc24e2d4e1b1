/// Remote commands accepted by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCommand {
    /// Download a new image into the inactive slot
    Update,
    /// Boot the other slot
    Revert,
}

impl TriggerCommand {
    pub const UPDATE_TOPIC: &'static str = "esp/update";
    pub const REVERT_TOPIC: &'static str = "esp/revert";

    /// Parses a topic name, surrounding whitespace is ignored.
    pub fn from_topic(topic: &str) -> Option<Self> {
        match topic.trim() {
            Self::UPDATE_TOPIC => Some(Self::Update),
            Self::REVERT_TOPIC => Some(Self::Revert),
            _ => None,
        }
    }

    pub fn topic(self) -> &'static str {
        match self {
            Self::Update => Self::UPDATE_TOPIC,
            Self::Revert => Self::REVERT_TOPIC,
        }
    }
}
