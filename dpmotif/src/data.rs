pub mod partition;
pub mod range;
pub mod sequences;

pub use partition::{BaselineTag, Cluster, ClusterTag, OccupancyStats, Partition};
pub use range::{Range, RangeSet};
pub use sequences::SequenceData;
