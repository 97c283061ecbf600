//! Reference block streams.
//!
//! Small operators that exercise the stream contract end to end. Each one
//! embeds a [`StreamCore`](crate::stream::StreamCore) and implements
//! [`BlockInputStream`](crate::stream::BlockInputStream).
//!
//! | Stream | Children | Blocking | Notes |
//! |--------|----------|----------|-------|
//! | `BlocksList` | 0 | No | Replays a list of blocks |
//! | `Null` | 0 | No | Produces nothing |
//! | `Limit` | 1 | No | Limit/offset with slicing |
//! | `Projection` | 1 | No | Keeps a subset of columns |
//! | `Concat` | N | No | Children one after another |
//! | `Union` | N | No | Children in parallel worker threads |
//! | `MergeSorting` | 1 | **Yes** | Full sort of the input |

mod blocks_list;
mod concat;
mod limit;
mod null;
mod projection;
mod sorting;
mod union;

pub use blocks_list::BlocksListInputStream;
pub use concat::ConcatBlockInputStream;
pub use limit::LimitBlockInputStream;
pub use null::NullBlockInputStream;
pub use projection::ProjectionBlockInputStream;
pub use sorting::SortingBlockInputStream;
pub use union::UnionBlockInputStream;
