use serde_derive::{Deserialize, Serialize};

/// The information of a chromosome
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Chrom {
    /// The human-readable name for this chromosome
    pub name: String,
    /// The size of current chromosome
    pub size: u64,
    /// Position of this chromosome on the global coordinate line. Assigned
    /// once at registration time: the sum of the sizes of every chromosome
    /// registered before this one.
    pub offset: u64,
}

impl Chrom {
    /// Map a chromosome-local coordinate to the global coordinate line
    pub fn to_abs(&self, pos: u64) -> u64 {
        self.offset + pos
    }
}
